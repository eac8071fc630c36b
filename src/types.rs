//! Shared identifiers and the cargo model used across the system.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::gate::ReadinessGate;

/// Globally unique, totally ordered identity of a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(Uuid);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unit of cargo. Not `Clone`: a block can only ever be moved.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Block {
    id: BlockId,
}

impl Block {
    /// Create a block with a fresh identity.
    pub fn new() -> Self {
        Self {
            id: BlockId(Uuid::new_v4()),
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }
}

/// Identities of a slice of blocks, in slice order.
pub fn block_ids(blocks: &[Block]) -> Vec<BlockId> {
    blocks.iter().map(Block::id).collect()
}

/// A truck presenting itself to a warehouse.
///
/// The hold travels inside the visit, so the servicing warehouse owns it
/// until it hands it back through the gate.
pub struct Visit {
    pub truck: String,
    pub capacity: usize,
    /// Gate serial for this visit; signals for any other serial are stale.
    pub serial: u64,
    pub cargo: Vec<Block>,
    pub gate: Arc<ReadinessGate>,
}

impl fmt::Debug for Visit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Visit")
            .field("truck", &self.truck)
            .field("capacity", &self.capacity)
            .field("serial", &self.serial)
            .field("cargo", &self.cargo.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn fresh_blocks_have_distinct_ids() {
        let ids: HashSet<BlockId> = (0..1000).map(|_| Block::new().id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn block_order_follows_identity() {
        let a = Block::new();
        let b = Block::new();
        assert_eq!(a.cmp(&b), a.id().cmp(&b.id()));
        assert_ne!(a, b);
    }
}
