//! Delivery runs, verification, and benchmark/stress runners.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::SimConfig;
use crate::error::{DeliveryMismatch, SimError};
use crate::truck::Truck;
use crate::types::{Block, BlockId, block_ids};
use crate::warehouse::{Warehouse, WarehouseStats};

pub const SOURCE: &str = "fabric";
pub const DESTINATION: &str = "retail";

const CSV_HEADER: &str = "trucks,capacity,blocks,laps,elapsed_ms,throughput_blocks_per_s,cpu_user_s,cpu_sys_s,conserved,delivered";

/// Best-effort CPU user/system time snapshot (seconds) on Unix platforms.
#[cfg(unix)]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    // SAFETY: rusage is plain old data and getrusage only writes into it.
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return None;
    }
    let seconds = |tv: libc::timeval| tv.tv_sec as f64 + tv.tv_usec as f64 / 1_000_000.0;
    Some((seconds(usage.ru_utime), seconds(usage.ru_stime)))
}

#[cfg(not(unix))]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    None
}

/// Outcome of one delivery run.
#[derive(Debug)]
pub struct DeliveryReport {
    pub config: SimConfig,
    pub issued: usize,
    pub delivered: usize,
    pub left_at_source: usize,
    pub trucks_stopped_early: usize,
    pub source: WarehouseStats,
    pub destination: WarehouseStats,
    pub elapsed: Duration,
    pub cpu_user_s: Option<f64>,
    pub cpu_sys_s: Option<f64>,
    /// Every issued block is somewhere, exactly once.
    pub conservation: Result<(), DeliveryMismatch>,
    /// Every issued block ended at the destination.
    pub delivery: Result<(), DeliveryMismatch>,
}

impl DeliveryReport {
    pub fn is_correct(&self) -> bool {
        self.conservation.is_ok() && self.delivery.is_ok()
    }

    fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.delivered as f64 / secs
        } else {
            0.0
        }
    }
}

/// Compare two identity collections as multisets.
pub fn verify_delivery(issued: &[BlockId], found: &[BlockId]) -> Result<(), DeliveryMismatch> {
    let mut expected = issued.to_vec();
    let mut found = found.to_vec();
    expected.sort_unstable();
    found.sort_unstable();

    if let Some(pair) = found.windows(2).find(|pair| pair[0] == pair[1]) {
        return Err(DeliveryMismatch::Duplicate(pair[0]));
    }
    if expected.len() != found.len() {
        return Err(DeliveryMismatch::Count {
            expected: expected.len(),
            found: found.len(),
        });
    }
    for (want, got) in expected.iter().zip(&found) {
        if want != got {
            return Err(if found.binary_search(want).is_err() {
                DeliveryMismatch::Missing(*want)
            } else {
                DeliveryMismatch::Unexpected(*got)
            });
        }
    }
    Ok(())
}

/// Check that the issued blocks are spread over warehouses and trucks exactly once.
///
/// Only meaningful at a quiescent point (no service cycle in flight).
pub fn check_conservation(
    issued: &[BlockId],
    warehouses: &[Arc<Warehouse>],
    trucks: &[Arc<Truck>],
) -> Result<(), DeliveryMismatch> {
    let mut everywhere = Vec::with_capacity(issued.len());
    for warehouse in warehouses {
        everywhere.extend(warehouse.inventory_snapshot());
    }
    for truck in trucks {
        everywhere.extend(truck.hold_snapshot());
    }
    verify_delivery(issued, &everywhere)
}

/// Start every truck and wait for all of them; returns how many stopped early.
fn drive_fleet(trucks: &[Arc<Truck>]) -> Result<usize, SimError> {
    for truck in trucks {
        truck.start()?;
    }
    let mut stopped_early = 0;
    for truck in trucks {
        let report = truck.join()?;
        if report.stopped_early {
            warn!(truck = %truck.name(), stops = report.stops_completed, "route not completed");
            stopped_early += 1;
        } else {
            debug!(truck = %report.name, stops = report.stops_completed, "route completed");
        }
    }
    Ok(stopped_early)
}

/// Run the fleet against the warehouses, then shut every warehouse down.
///
/// Warehouses are always cancelled, even when starting one of them or the
/// fleet fails; the first error is returned once all of them have stopped.
fn operate(warehouses: &[Arc<Warehouse>], trucks: &[Arc<Truck>]) -> Result<usize, SimError> {
    let driven = warehouses
        .iter()
        .try_for_each(|warehouse| warehouse.start())
        .and_then(|()| drive_fleet(trucks));
    if driven.is_err() {
        for truck in trucks {
            truck.cancel();
            match truck.join() {
                Ok(_) | Err(SimError::NotStarted(_)) => {}
                Err(err) => {
                    warn!(truck = %truck.name(), error = %err, "truck lost during shutdown");
                }
            }
        }
    }

    let mut shutdown = Ok(());
    for warehouse in warehouses {
        if let Err(err) = warehouse.cancel() {
            error!(warehouse = %warehouse.name(), error = %err, "warehouse shutdown failed");
            if shutdown.is_ok() {
                shutdown = Err(err);
            }
        }
    }
    let stopped_early = driven?;
    shutdown?;
    Ok(stopped_early)
}

/// Issue `config.blocks` blocks at the source and haul them to the destination.
pub fn run_delivery(config: &SimConfig) -> Result<DeliveryReport, SimError> {
    config.validate()?;

    let stock: Vec<Block> = (0..config.blocks).map(|_| Block::new()).collect();
    let issued = block_ids(&stock);

    // Each truck has at most one pending arrival per warehouse.
    let source = Arc::new(
        Warehouse::new(SOURCE, stock)
            .with_arrival_capacity(config.trucks)
            .with_timing(config.service),
    );
    let destination = Arc::new(
        Warehouse::new(DESTINATION, Vec::new())
            .with_arrival_capacity(config.trucks)
            .with_timing(config.service),
    );
    let warehouses = [Arc::clone(&source), Arc::clone(&destination)];
    let route: Vec<Arc<Warehouse>> = (0..config.laps)
        .flat_map(|_| warehouses.iter().cloned())
        .collect();

    let mut trucks = Vec::with_capacity(config.trucks);
    for id in 0..config.trucks {
        let truck = Truck::new(format!("truck-{id}"), config.capacity, &route, config.travel)?;
        trucks.push(Arc::new(truck));
    }

    info!(
        trucks = config.trucks,
        capacity = config.capacity,
        blocks = config.blocks,
        laps = config.laps,
        "delivery started"
    );
    let cpu_start = cpu_times_seconds();
    let start = Instant::now();
    let trucks_stopped_early = operate(&warehouses, &trucks)?;
    let elapsed = start.elapsed();

    let (cpu_user_s, cpu_sys_s) = match (cpu_start, cpu_times_seconds()) {
        (Some((user_start, sys_start)), Some((user_end, sys_end))) => {
            (Some(user_end - user_start), Some(sys_end - sys_start))
        }
        _ => (None, None),
    };

    let delivered = destination.inventory_snapshot();
    let conservation = check_conservation(&issued, &warehouses, &trucks);
    let delivery = verify_delivery(&issued, &delivered);
    match (&conservation, &delivery) {
        (Ok(()), Ok(())) => info!(blocks = delivered.len(), "correct delivery"),
        (Err(err), _) => error!(error = %err, "cargo conservation violated"),
        (Ok(()), Err(err)) => error!(error = %err, "error in delivery"),
    }

    Ok(DeliveryReport {
        config: config.clone(),
        issued: issued.len(),
        delivered: delivered.len(),
        left_at_source: source.inventory_snapshot().len(),
        trucks_stopped_early,
        source: source.stats(),
        destination: destination.stats(),
        elapsed,
        cpu_user_s,
        cpu_sys_s,
        conservation,
        delivery,
    })
}

pub fn print_summary(report: &DeliveryReport) {
    let config = &report.config;
    println!("DELIVERY SUMMARY");
    println!(
        "trucks={} capacity={} laps={} blocks_issued={}",
        config.trucks, config.capacity, config.laps, report.issued
    );
    println!("blocks_delivered={}", report.delivered);
    println!("blocks_left_at_source={}", report.left_at_source);
    for (name, stats) in [(SOURCE, &report.source), (DESTINATION, &report.destination)] {
        println!(
            "{name}: loads={} unloads={} blocks_out={} blocks_in={}",
            stats.loads, stats.unloads, stats.blocks_out, stats.blocks_in
        );
    }
    println!("trucks_stopped_early={}", report.trucks_stopped_early);
    println!("conserved={}", report.conservation.is_ok());
    match &report.delivery {
        Ok(()) => println!("delivery=correct"),
        Err(err) => println!("delivery=incorrect ({err})"),
    }
    println!("elapsed_ms={}", report.elapsed.as_millis());
}

fn csv_row(report: &DeliveryReport) -> String {
    let cpu = |value: Option<f64>| {
        value
            .map(|v| format!("{v:.4}"))
            .unwrap_or_else(|| "NA".to_string())
    };
    format!(
        "{},{},{},{},{:.2},{:.2},{},{},{},{}",
        report.config.trucks,
        report.config.capacity,
        report.issued,
        report.config.laps,
        report.elapsed.as_secs_f64() * 1000.0,
        report.throughput(),
        cpu(report.cpu_user_s),
        cpu(report.cpu_sys_s),
        report.conservation.is_ok(),
        report.delivery.is_ok(),
    )
}

/// Run one delivery and print it as a CSV row.
pub fn run_benchmark(config: &SimConfig) -> Result<bool, SimError> {
    let report = run_delivery(config)?;
    println!("{CSV_HEADER}");
    println!("{}", csv_row(&report));
    Ok(report.is_correct())
}

/// Sweep fleet sizes and capacities; blocks are sized to the fleet.
pub fn run_stress(
    truck_sets: &[usize],
    capacity_sets: &[usize],
    base: &SimConfig,
) -> Result<bool, SimError> {
    println!("{CSV_HEADER}");
    let mut all_correct = true;
    for &trucks in truck_sets {
        for &capacity in capacity_sets {
            let mut config = SimConfig {
                trucks,
                capacity,
                ..base.clone()
            };
            config.blocks = config.fleet_throughput();
            let report = run_delivery(&config)?;
            println!("{}", csv_row(&report));
            if !report.is_correct() {
                eprintln!("# violation,trucks={trucks},capacity={capacity}");
                all_correct = false;
            }
        }
    }
    Ok(all_correct)
}
