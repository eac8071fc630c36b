//! Warehouse worker: serially services arrived trucks from its own stock.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, info_span, warn};

use crate::arrival_queue::{ArrivalQueue, PushError};
use crate::config::ServiceTiming;
use crate::error::{HandoffError, RejectReason, SimError};
use crate::inventory::Inventory;
use crate::types::{Block, BlockId, Visit};

/// Counters of completed service cycles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WarehouseStats {
    pub loads: usize,
    pub unloads: usize,
    pub blocks_out: usize,
    pub blocks_in: usize,
}

#[derive(Default)]
struct ServiceCounters {
    loads: AtomicUsize,
    unloads: AtomicUsize,
    blocks_out: AtomicUsize,
    blocks_in: AtomicUsize,
}

pub struct Warehouse {
    name: String,
    inventory: Inventory,
    arrivals: ArrivalQueue<Visit>,
    timing: ServiceTiming,
    counters: ServiceCounters,
    started: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Warehouse {
    /// Create a warehouse with an unbounded arrival queue and default timing.
    pub fn new(name: impl Into<String>, inventory: Vec<Block>) -> Self {
        Self {
            name: name.into(),
            inventory: Inventory::new(inventory),
            arrivals: ArrivalQueue::unbounded(),
            timing: ServiceTiming::default(),
            counters: ServiceCounters::default(),
            started: AtomicBool::new(false),
            worker: Mutex::new(None),
        }
    }

    /// Bound the arrival queue; arrivals beyond it are rejected, not blocked.
    pub fn with_arrival_capacity(mut self, capacity: usize) -> Self {
        self.arrivals = ArrivalQueue::bounded(capacity);
        self
    }

    pub fn with_timing(mut self, timing: ServiceTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawn the worker thread.
    pub fn start(self: &Arc<Self>) -> Result<(), SimError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(SimError::AlreadyStarted(self.name.clone()));
        }
        let warehouse = Arc::clone(self);
        let handle = thread::Builder::new()
            .name(format!("warehouse-{}", self.name))
            .spawn(move || warehouse.run())
            .map_err(|source| SimError::Spawn {
                name: self.name.clone(),
                source,
            })?;
        *self.worker.lock().expect("worker mutex poisoned") = Some(handle);
        Ok(())
    }

    fn run(&self) {
        let span = info_span!("warehouse", name = %self.name);
        let _enter = span.enter();
        info!(stock = self.inventory.len(), "open for arrivals");
        while let Some(visit) = self.arrivals.pop_blocking_or_closed() {
            self.service(visit);
        }
        info!(stock = self.inventory.len(), "closed");
    }

    fn service(&self, visit: Visit) {
        let Visit {
            truck,
            capacity,
            serial,
            cargo,
            gate,
        } = visit;

        let cargo = if cargo.is_empty() {
            // Count is fixed by the withdrawal; the delay runs outside the lock.
            let loaded = self.inventory.withdraw(capacity);
            let count = loaded.len();
            debug!(truck = %truck, blocks = count, "loading");
            thread::sleep(self.timing.load(count));
            self.counters.loads.fetch_add(1, Ordering::SeqCst);
            self.counters.blocks_out.fetch_add(count, Ordering::SeqCst);
            info!(truck = %truck, blocks = count, "truck loaded");
            loaded
        } else {
            let count = cargo.len();
            debug!(truck = %truck, blocks = count, "unloading");
            self.inventory.deposit(cargo);
            thread::sleep(self.timing.unload(count));
            self.counters.unloads.fetch_add(1, Ordering::SeqCst);
            self.counters.blocks_in.fetch_add(count, Ordering::SeqCst);
            info!(truck = %truck, blocks = count, "truck unloaded");
            Vec::new()
        };

        if let Err(stale) = gate.complete(serial, cargo) {
            error!(truck = %truck, error = %stale, "readiness signal rejected, restocking cargo");
            self.inventory.deposit(stale.cargo);
        }
    }

    /// Queue `visit` and block until this warehouse has serviced it.
    ///
    /// Returns the truck's hold as left by the service cycle.
    pub fn arrive(&self, visit: Visit) -> Result<Vec<Block>, HandoffError> {
        let gate = Arc::clone(&visit.gate);
        let serial = visit.serial;
        debug!(
            warehouse = %self.name,
            truck = %visit.truck,
            queued = self.pending_arrivals(),
            "arrival"
        );
        if let Err(err) = self.arrivals.push(visit) {
            let (reason, visit) = match err {
                PushError::Closed(visit) => (RejectReason::Closed, visit),
                PushError::Full(visit) => (
                    RejectReason::Full {
                        capacity: self.arrivals.capacity().unwrap_or_default(),
                    },
                    visit,
                ),
            };
            return Err(HandoffError::ArrivalRejected {
                warehouse: self.name.clone(),
                reason,
                cargo: visit.cargo,
            });
        }
        gate.wait(serial)
    }

    /// Stop accepting arrivals, release queued trucks, and join the worker.
    ///
    /// A service cycle already in progress runs to completion.
    pub fn cancel(&self) -> Result<(), SimError> {
        for visit in self.arrivals.close() {
            warn!(warehouse = %self.name, truck = %visit.truck, "arrival dropped by shutdown");
            if let Err(stale) = visit.gate.abort(visit.serial, visit.cargo) {
                error!(warehouse = %self.name, error = %stale, "abort rejected, restocking cargo");
                self.inventory.deposit(stale.cargo);
            }
        }
        let handle = self.worker.lock().expect("worker mutex poisoned").take();
        if let Some(handle) = handle {
            handle
                .join()
                .map_err(|_| SimError::WorkerPanicked(self.name.clone()))?;
        }
        Ok(())
    }

    pub fn inventory_snapshot(&self) -> Vec<BlockId> {
        self.inventory.snapshot()
    }

    pub fn pending_arrivals(&self) -> usize {
        self.arrivals.len()
    }

    pub fn stats(&self) -> WarehouseStats {
        WarehouseStats {
            loads: self.counters.loads.load(Ordering::SeqCst),
            unloads: self.counters.unloads.load(Ordering::SeqCst),
            blocks_out: self.counters.blocks_out.load(Ordering::SeqCst),
            blocks_in: self.counters.blocks_in.load(Ordering::SeqCst),
        }
    }
}
