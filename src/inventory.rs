//! Warehouse stock guarded by a single mutex.

use std::sync::Mutex;

use crate::types::{Block, BlockId, block_ids};

/// Block store with transactional withdraw/deposit operations.
pub struct Inventory {
    blocks: Mutex<Vec<Block>>,
}

impl Inventory {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            blocks: Mutex::new(blocks),
        }
    }

    /// Remove up to `max` blocks; fewer if stock is short.
    pub fn withdraw(&self, max: usize) -> Vec<Block> {
        let mut guard = self.blocks.lock().expect("inventory mutex poisoned");
        let take = max.min(guard.len());
        let start = guard.len() - take;
        guard.split_off(start)
    }

    /// Append every block in `blocks`.
    pub fn deposit(&self, mut blocks: Vec<Block>) {
        let mut guard = self.blocks.lock().expect("inventory mutex poisoned");
        guard.append(&mut blocks);
    }

    /// Point-in-time view of the stocked identities.
    pub fn snapshot(&self) -> Vec<BlockId> {
        let guard = self.blocks.lock().expect("inventory mutex poisoned");
        block_ids(&guard)
    }

    pub fn len(&self) -> usize {
        let guard = self.blocks.lock().expect("inventory mutex poisoned");
        guard.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn stocked(count: usize) -> Inventory {
        Inventory::new((0..count).map(|_| Block::new()).collect())
    }

    #[test]
    fn withdraw_is_capped_by_stock() {
        let inventory = stocked(3);
        let before: HashSet<BlockId> = inventory.snapshot().into_iter().collect();
        let taken = inventory.withdraw(5);
        assert_eq!(taken.len(), 3);
        assert_eq!(inventory.len(), 0);
        let taken: HashSet<BlockId> = block_ids(&taken).into_iter().collect();
        assert_eq!(taken, before);
    }

    #[test]
    fn withdraw_from_empty_yields_nothing() {
        let inventory = stocked(0);
        assert!(inventory.withdraw(10).is_empty());
    }

    #[test]
    fn concurrent_withdrawals_never_share_blocks() {
        let inventory = Arc::new(stocked(400));
        let workers = 8;
        let barrier = Arc::new(Barrier::new(workers));
        let mut handles = Vec::new();
        for _ in 0..workers {
            let inventory = Arc::clone(&inventory);
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                barrier.wait();
                block_ids(&inventory.withdraw(50))
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().expect("withdraw thread panicked") {
                assert!(seen.insert(id), "block {id} withdrawn twice");
            }
        }
        assert_eq!(seen.len(), 400);
        assert_eq!(inventory.len(), 0);
    }

    #[test]
    fn deposit_appends_all() {
        let inventory = stocked(2);
        let incoming: Vec<Block> = (0..3).map(|_| Block::new()).collect();
        let incoming_ids = block_ids(&incoming);
        inventory.deposit(incoming);
        let snapshot = inventory.snapshot();
        assert_eq!(snapshot.len(), 5);
        assert!(incoming_ids.iter().all(|id| snapshot.contains(id)));
    }
}
