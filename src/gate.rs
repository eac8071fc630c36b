//! Per-truck readiness gate.
//!
//! One gate lives for the whole life of a truck and is re-armed for every
//! visit. The truck arms it before arriving, the servicing warehouse signals
//! it exactly once with the (possibly changed) hold, and the truck waits on
//! the predicate "an outcome for this serial is present" rather than on a
//! single notification, so early, late, and spurious wakeups are all harmless.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::error::{HandoffError, StaleSignal};
use crate::types::{Block, BlockId, block_ids};

enum Outcome {
    Serviced(Vec<Block>),
    Aborted(Vec<Block>),
}

struct GateState {
    serial: u64,
    armed: bool,
    /// Resolution tagged with the serial it was issued for.
    outcome: Option<(u64, Outcome)>,
    cancelled: bool,
}

pub struct ReadinessGate {
    state: Mutex<GateState>,
    signal: Condvar,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                serial: 0,
                armed: false,
                outcome: None,
                cancelled: false,
            }),
            signal: Condvar::new(),
        }
    }

    /// Mark the truck not-ready for a new visit and return the visit serial.
    pub fn arm(&self) -> u64 {
        let mut guard = self.state.lock().expect("gate mutex poisoned");
        debug_assert!(guard.outcome.is_none(), "arming with an unclaimed outcome");
        guard.serial += 1;
        guard.armed = true;
        guard.serial
    }

    /// Hand the serviced hold back; accepted once, for the armed serial only.
    pub fn complete(&self, serial: u64, cargo: Vec<Block>) -> Result<(), StaleSignal> {
        self.resolve(serial, cargo, Outcome::Serviced)
    }

    /// Hand the hold back untouched because the visit will never be serviced.
    pub fn abort(&self, serial: u64, cargo: Vec<Block>) -> Result<(), StaleSignal> {
        self.resolve(serial, cargo, Outcome::Aborted)
    }

    fn resolve(
        &self,
        serial: u64,
        cargo: Vec<Block>,
        outcome: fn(Vec<Block>) -> Outcome,
    ) -> Result<(), StaleSignal> {
        let mut guard = self.state.lock().expect("gate mutex poisoned");
        if !guard.armed || guard.serial != serial {
            return Err(StaleSignal {
                serial,
                armed: guard.armed.then_some(guard.serial),
                cargo,
            });
        }
        guard.armed = false;
        guard.outcome = Some((serial, outcome(cargo)));
        self.signal.notify_all();
        Ok(())
    }

    /// Block until visit `serial` is resolved or the gate is cancelled.
    ///
    /// A delivered outcome wins over cancellation so cargo is never dropped.
    pub fn wait(&self, serial: u64) -> Result<Vec<Block>, HandoffError> {
        let mut guard = self.state.lock().expect("gate mutex poisoned");
        loop {
            match guard.outcome.take() {
                Some((resolved, Outcome::Serviced(cargo))) if resolved == serial => {
                    return Ok(cargo);
                }
                Some((resolved, Outcome::Aborted(cargo))) if resolved == serial => {
                    return Err(HandoffError::ServiceAborted { cargo });
                }
                other => guard.outcome = other,
            }
            if guard.serial != serial {
                return Err(HandoffError::Superseded {
                    serial,
                    current: guard.serial,
                });
            }
            if guard.cancelled {
                return Err(HandoffError::Cancelled);
            }
            guard = self.signal.wait(guard).expect("condvar wait failed");
        }
    }

    /// Sleep for `duration` unless the gate is cancelled first.
    pub fn pause(&self, duration: Duration) -> Result<(), HandoffError> {
        let guard = self.state.lock().expect("gate mutex poisoned");
        let (guard, _) = self
            .signal
            .wait_timeout_while(guard, duration, |state| !state.cancelled)
            .expect("condvar wait failed");
        if guard.cancelled {
            return Err(HandoffError::Cancelled);
        }
        Ok(())
    }

    /// Wake every waiter; the gate stays cancelled.
    pub fn cancel(&self) {
        let mut guard = self.state.lock().expect("gate mutex poisoned");
        guard.cancelled = true;
        self.signal.notify_all();
    }

    /// Cargo resolved after its truck stopped waiting.
    pub fn parked_cargo(&self) -> Vec<BlockId> {
        let guard = self.state.lock().expect("gate mutex poisoned");
        match &guard.outcome {
            Some((_, Outcome::Serviced(cargo) | Outcome::Aborted(cargo))) => block_ids(cargo),
            None => Vec::new(),
        }
    }
}
