//! Truck worker: travels its route and waits at each stop for service.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, info_span, warn};

use crate::config::TravelTiming;
use crate::error::{ConfigError, HandoffError, SimError};
use crate::gate::ReadinessGate;
use crate::types::{Block, BlockId, Visit, block_ids};
use crate::warehouse::Warehouse;

/// How a truck's worker ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TruckReport {
    pub name: String,
    pub stops_completed: usize,
    /// The route was abandoned (cancellation or a refused arrival).
    pub stopped_early: bool,
}

pub struct Truck {
    name: String,
    capacity: usize,
    travel: TravelTiming,
    hold: Mutex<Vec<Block>>,
    route: Mutex<VecDeque<Arc<Warehouse>>>,
    gate: Arc<ReadinessGate>,
    stops_completed: AtomicUsize,
    started: AtomicBool,
    worker: Mutex<Option<JoinHandle<TruckReport>>>,
}

impl Truck {
    /// Create an empty truck that will visit `route` front to back.
    pub fn new(
        name: impl Into<String>,
        capacity: usize,
        route: &[Arc<Warehouse>],
        travel: TravelTiming,
    ) -> Result<Self, ConfigError> {
        Self::with_cargo(name, capacity, route, travel, Vec::new())
    }

    /// Create a truck that starts its route already holding `cargo`.
    pub fn with_cargo(
        name: impl Into<String>,
        capacity: usize,
        route: &[Arc<Warehouse>],
        travel: TravelTiming,
        cargo: Vec<Block>,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if cargo.len() > capacity {
            return Err(ConfigError::Overloaded {
                truck: name,
                cargo: cargo.len(),
                capacity,
            });
        }
        Ok(Self {
            name,
            capacity,
            travel,
            hold: Mutex::new(cargo),
            route: Mutex::new(route.iter().cloned().collect()),
            gate: Arc::new(ReadinessGate::new()),
            stops_completed: AtomicUsize::new(0),
            started: AtomicBool::new(false),
            worker: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawn the worker thread.
    pub fn start(self: &Arc<Self>) -> Result<(), SimError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(SimError::AlreadyStarted(self.name.clone()));
        }
        let truck = Arc::clone(self);
        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || truck.run())
            .map_err(|source| SimError::Spawn {
                name: self.name.clone(),
                source,
            })?;
        *self.worker.lock().expect("worker mutex poisoned") = Some(handle);
        Ok(())
    }

    /// Block until the worker has exhausted (or abandoned) its route.
    pub fn join(&self) -> Result<TruckReport, SimError> {
        let handle = self.worker.lock().expect("worker mutex poisoned").take();
        let handle = handle.ok_or_else(|| SimError::NotStarted(self.name.clone()))?;
        handle
            .join()
            .map_err(|_| SimError::WorkerPanicked(self.name.clone()))
    }

    /// Interrupt travel or a pending wait; the worker exits cleanly.
    pub fn cancel(&self) {
        self.gate.cancel();
    }

    fn run(&self) -> TruckReport {
        let span = info_span!("truck", name = %self.name);
        let _enter = span.enter();
        info!(capacity = self.capacity, "started");

        let mut stopped_early = false;
        loop {
            let next = self.route.lock().expect("route mutex poisoned").pop_front();
            let Some(warehouse) = next else {
                break;
            };
            match self.visit(&warehouse) {
                Ok(()) => {
                    self.stops_completed.fetch_add(1, Ordering::SeqCst);
                }
                Err(HandoffError::Cancelled) => {
                    info!(warehouse = %warehouse.name(), "cancelled");
                    stopped_early = true;
                    break;
                }
                Err(err) => {
                    warn!(warehouse = %warehouse.name(), error = %err, "route abandoned");
                    stopped_early = true;
                    break;
                }
            }
        }

        let stops_completed = self.stops_completed.load(Ordering::SeqCst);
        info!(stops = stops_completed, "finished");
        TruckReport {
            name: self.name.clone(),
            stops_completed,
            stopped_early,
        }
    }

    fn visit(&self, warehouse: &Warehouse) -> Result<(), HandoffError> {
        let serial = self.gate.arm();
        debug!(warehouse = %warehouse.name(), "traveling");
        self.gate.pause(self.travel.sample())?;
        debug!(warehouse = %warehouse.name(), "arrived");

        // The hold belongs to the warehouse until the gate hands it back.
        let cargo = std::mem::take(&mut *self.hold.lock().expect("hold mutex poisoned"));
        let visit = Visit {
            truck: self.name.clone(),
            capacity: self.capacity,
            serial,
            cargo,
            gate: Arc::clone(&self.gate),
        };
        match warehouse.arrive(visit) {
            Ok(cargo) => {
                *self.hold.lock().expect("hold mutex poisoned") = cargo;
                Ok(())
            }
            Err(mut err) => {
                self.hold
                    .lock()
                    .expect("hold mutex poisoned")
                    .append(&mut err.take_cargo());
                Err(err)
            }
        }
    }

    pub fn stops_completed(&self) -> usize {
        self.stops_completed.load(Ordering::SeqCst)
    }

    /// Blocks this truck is responsible for, including any parked at its gate.
    pub fn hold_snapshot(&self) -> Vec<BlockId> {
        let mut ids = block_ids(&self.hold.lock().expect("hold mutex poisoned"));
        ids.extend(self.gate.parked_cargo());
        ids
    }
}
