//! Error types for configuration, the truck/warehouse hand-off, and runs.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::types::{Block, BlockId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("truck count must be > 0")]
    NoTrucks,
    #[error("truck capacity must be > 0")]
    ZeroCapacity,
    #[error("laps must be > 0")]
    NoLaps,
    #[error("{blocks} blocks leave a truck empty across {pickups} pickups of {capacity}")]
    IdleTrucks {
        blocks: usize,
        pickups: usize,
        capacity: usize,
    },
    #[error("travel range is inverted: min {min_ms}ms > max {max_ms}ms")]
    InvertedTravel { min_ms: u64, max_ms: u64 },
    #[error("truck {truck} starts with {cargo} blocks but holds at most {capacity}")]
    Overloaded {
        truck: String,
        cargo: usize,
        capacity: usize,
    },
}

/// Why a warehouse refused to enqueue an arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Closed,
    Full { capacity: usize },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Full { capacity } => write!(f, "queue full ({capacity} pending)"),
        }
    }
}

/// Failures of a single truck/warehouse round-trip.
///
/// Variants that carry `cargo` hand the truck's hold back to it.
#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("wait cancelled")]
    Cancelled,
    #[error("warehouse {warehouse} rejected arrival: {reason}")]
    ArrivalRejected {
        warehouse: String,
        reason: RejectReason,
        cargo: Vec<Block>,
    },
    #[error("warehouse stopped before servicing the truck")]
    ServiceAborted { cargo: Vec<Block> },
    #[error("visit {serial} was superseded by visit {current}")]
    Superseded { serial: u64, current: u64 },
}

impl HandoffError {
    /// Take back any cargo carried by the error.
    pub fn take_cargo(&mut self) -> Vec<Block> {
        match self {
            Self::Cancelled | Self::Superseded { .. } => Vec::new(),
            Self::ArrivalRejected { cargo, .. } | Self::ServiceAborted { cargo } => {
                std::mem::take(cargo)
            }
        }
    }
}

/// Completion signal for a visit that is not the one currently armed.
#[derive(Debug, Error)]
#[error("stale readiness signal for visit {serial} (armed: {armed:?})")]
pub struct StaleSignal {
    pub serial: u64,
    pub armed: Option<u64>,
    pub cargo: Vec<Block>,
}

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to spawn worker {name}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("worker {0} already started")]
    AlreadyStarted(String),
    #[error("worker {0} was never started")]
    NotStarted(String),
    #[error("worker {0} panicked")]
    WorkerPanicked(String),
}

/// Verification failure: cargo was lost, duplicated, or invented.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryMismatch {
    #[error("expected {expected} blocks, found {found}")]
    Count { expected: usize, found: usize },
    #[error("block {0} appears more than once")]
    Duplicate(BlockId),
    #[error("block {0} is missing")]
    Missing(BlockId),
    #[error("block {0} was never issued")]
    Unexpected(BlockId),
}
