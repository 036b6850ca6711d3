//! Demo, benchmark, and stress-test runners for the order dispatcher.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::DispatchConfig;
use crate::dispatcher::{Dispatcher, Snapshot};
use crate::error::DispatchError;
use crate::service::DispatchService;
use crate::types::{ItemId, Priority, millis_u64};

const CSV_HEADER: &str = "workers,items,vip_percent,processing_ms,elapsed_ms,virtual_ms,throughput_items_per_s,avg_latency_ms,cpu_user_s,cpu_sys_s,requeued,leftover,duplicate_items,conserved";

/// Best-effort CPU user/system time snapshot (seconds) on Unix platforms.
#[cfg(unix)]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    // SAFETY: rusage is plain old data and getrusage only writes into it.
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return None;
    }
    let user = usage.ru_utime.tv_sec as f64 + (usage.ru_utime.tv_usec as f64 / 1_000_000.0);
    let sys = usage.ru_stime.tv_sec as f64 + (usage.ru_stime.tv_usec as f64 / 1_000_000.0);
    Some((user, sys))
}

/// Stub on non-Unix platforms.
#[cfg(not(unix))]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    None
}

/// True for an evenly spread `vip_percent` share of item indexes.
fn is_vip(index: usize, vip_percent: u8) -> bool {
    let percent = usize::from(vip_percent.min(100));
    (index * percent) / 100 != ((index + 1) * percent) / 100
}

fn priority_for(config: &DispatchConfig, index: usize, vip_percent: u8) -> Priority {
    if is_vip(index, vip_percent) {
        config.vip()
    } else {
        config.normal()
    }
}

/// Parameters for one benchmark run.
#[derive(Debug, Clone)]
pub struct BenchParams {
    pub workers: usize,
    pub items: usize,
    pub vip_percent: u8,
    /// Remove a busy worker mid-run and add a fresh one.
    pub churn: bool,
    /// Track duplicate completions.
    pub validate: bool,
}

/// Aggregated metrics from a single benchmark run.
#[derive(Debug, Clone)]
pub struct BenchResult {
    pub workers: usize,
    pub items: usize,
    pub vip_percent: u8,
    pub processing_ms: u64,
    pub elapsed_ms: f64,
    pub virtual_ms: u64,
    pub throughput: f64,
    pub avg_latency_ms: f64,
    pub cpu_user_s: Option<f64>,
    pub cpu_sys_s: Option<f64>,
    pub requeued: u64,
    pub leftover: usize,
    pub duplicate_items: bool,
    pub conserved: bool,
}

impl BenchResult {
    fn csv_row(&self) -> String {
        let cpu_user = self
            .cpu_user_s
            .map(|v| format!("{v:.4}"))
            .unwrap_or_else(|| "NA".to_string());
        let cpu_sys = self
            .cpu_sys_s
            .map(|v| format!("{v:.4}"))
            .unwrap_or_else(|| "NA".to_string());
        format!(
            "{},{},{},{},{:.2},{},{:.2},{:.2},{},{},{},{},{},{}",
            self.workers,
            self.items,
            self.vip_percent,
            self.processing_ms,
            self.elapsed_ms,
            self.virtual_ms,
            self.throughput,
            self.avg_latency_ms,
            cpu_user,
            cpu_sys,
            self.requeued,
            self.leftover,
            self.duplicate_items,
            self.conserved
        )
    }

    fn report_warnings(&self, validate: bool) {
        if self.leftover > 0 {
            eprintln!("# warning,leftover_items,{}", self.leftover);
        }
        if validate {
            if self.duplicate_items {
                eprintln!("# violation,duplicate_items");
            }
            if !self.conserved {
                eprintln!("# violation,conservation");
            }
        }
    }
}

/// Run one simulation in virtual time and measure the host cost of it.
pub fn benchmark_once(
    config: &DispatchConfig,
    params: &BenchParams,
) -> Result<BenchResult, DispatchError> {
    let mut dispatcher = Dispatcher::new(&DispatchConfig {
        initial_workers: 0,
        ..config.clone()
    })?;

    let cpu_start = cpu_times_seconds();
    let start = Instant::now();

    dispatcher.add_workers(params.workers);
    for index in 0..params.items {
        dispatcher.submit(priority_for(config, index, params.vip_percent));
    }
    if params.churn && params.workers > 0 {
        // Midway through the first batch every worker is busy.
        dispatcher.advance(config.processing_time() / 2);
        dispatcher.remove_worker();
        dispatcher.add_worker();
    }
    dispatcher.run_until_idle();

    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    let (cpu_user_s, cpu_sys_s) = match (cpu_start, cpu_times_seconds()) {
        (Some((user_start, sys_start)), Some((user_end, sys_end))) => {
            (Some(user_end - user_start), Some(sys_end - sys_start))
        }
        _ => (None, None),
    };

    let completed = dispatcher.completed_items();
    let duplicate_items = if params.validate {
        let mut seen: HashSet<ItemId> = HashSet::new();
        !completed.iter().all(|item| seen.insert(item.id))
    } else {
        false
    };
    let avg_latency_ms = if completed.is_empty() {
        0.0
    } else {
        let total: Duration = completed
            .iter()
            .filter_map(|item| item.completed_at.map(|done| done - item.submitted_at))
            .sum();
        total.as_secs_f64() * 1000.0 / completed.len() as f64
    };
    let throughput = if elapsed_ms > 0.0 {
        completed.len() as f64 / (elapsed_ms / 1000.0)
    } else {
        0.0
    };

    Ok(BenchResult {
        workers: params.workers,
        items: params.items,
        vip_percent: params.vip_percent,
        processing_ms: config.processing_ms,
        elapsed_ms,
        virtual_ms: millis_u64(dispatcher.now()),
        throughput,
        avg_latency_ms,
        cpu_user_s,
        cpu_sys_s,
        requeued: dispatcher.requeued_count(),
        leftover: dispatcher.queue_len(),
        duplicate_items,
        conserved: dispatcher.snapshot().is_conserved(),
    })
}

/// Outcome of the scripted demo, printed by [`run_demo`].
#[derive(Debug, Clone)]
pub struct DemoReport {
    pub workers: usize,
    pub completion_order: Vec<ItemId>,
    pub snapshot: Snapshot,
}

/// Scripted scenario: mixed normal/VIP orders and a busy worker removed mid-run.
pub fn demo_scenario(config: &DispatchConfig) -> Result<DemoReport, DispatchError> {
    let mut dispatcher = Dispatcher::new(&DispatchConfig {
        initial_workers: 0,
        ..config.clone()
    })?;
    dispatcher.add_workers(2);
    dispatcher.submit_normal();
    dispatcher.submit_normal();
    dispatcher.submit_vip();
    dispatcher.submit_normal();
    dispatcher.submit_vip();
    info!(queued = dispatcher.queue_len(), "[DEMO] orders loaded");

    dispatcher.advance(config.processing_time() / 2);
    if let Some(worker) = dispatcher.remove_worker() {
        info!(worker, "[DEMO] removed busy worker");
    }
    let replacement = dispatcher.add_worker();
    info!(worker = replacement, "[DEMO] added replacement worker");
    dispatcher.run_until_idle();

    Ok(DemoReport {
        workers: dispatcher.worker_count(),
        completion_order: dispatcher.completed_items().iter().map(|i| i.id).collect(),
        snapshot: dispatcher.snapshot(),
    })
}

/// Run the default demo and print its summary.
pub fn run_demo(config: &DispatchConfig) -> Result<(), DispatchError> {
    let report = demo_scenario(config)?;
    let snapshot = &report.snapshot;
    println!("DEMO SUMMARY");
    println!(
        "workers={} items_total={}",
        report.workers, snapshot.total_submitted
    );
    println!("completion_order={:?}", report.completion_order);
    println!("requeued={}", snapshot.requeued);
    println!("pending_left={}", snapshot.queued.len());
    println!("makespan_ms={}", snapshot.now_ms);
    println!("conservation={}", snapshot.is_conserved());
    Ok(())
}

/// Run a single benchmark and print one CSV row.
pub fn run_benchmark(config: &DispatchConfig, params: &BenchParams) -> Result<(), DispatchError> {
    if params.workers == 0 {
        warn!("benchmark with zero workers leaves every item queued");
    }
    let result = benchmark_once(config, params)?;
    println!("{CSV_HEADER}");
    println!("{}", result.csv_row());
    result.report_warnings(params.validate);
    Ok(())
}

/// Sweep worker and item counts and print CSV output.
pub fn run_stress(
    config: &DispatchConfig,
    worker_sets: &[usize],
    item_sets: &[usize],
    vip_percent: u8,
    churn: bool,
    validate: bool,
) -> Result<(), DispatchError> {
    let mut worker_sets = worker_sets.to_vec();
    let before = worker_sets.len();
    worker_sets.retain(|&workers| workers > 0);
    let dropped = before - worker_sets.len();
    if dropped > 0 {
        eprintln!("stress warning: ignored {dropped} worker set(s) == 0");
    }

    println!("{CSV_HEADER}");
    for &workers in &worker_sets {
        for &items in item_sets {
            let params = BenchParams {
                workers,
                items,
                vip_percent,
                churn,
                validate,
            };
            let result = benchmark_once(config, &params)?;
            println!("{}", result.csv_row());
            result.report_warnings(validate);
        }
    }
    Ok(())
}

/// Drive the threaded service against the wall clock and print its final state.
pub fn run_live(
    config: &DispatchConfig,
    workers: usize,
    items: usize,
    vip_percent: u8,
    timeout: Duration,
    json: bool,
) -> Result<(), DispatchError> {
    let service = DispatchService::spawn(config)?;
    for _ in 0..workers {
        service.add_worker(None)?;
    }
    for index in 0..items {
        service.submit(priority_for(config, index, vip_percent))?;
    }
    let finished = service.wait_for(timeout, |s| {
        s.completed.len() as u64 == s.total_submitted
    })?;
    info!(completed = finished.completed.len(), "[LIVE] wait finished");
    let snapshot = service.shutdown()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!("LIVE SUMMARY");
        println!("elapsed_ms={}", snapshot.now_ms);
        println!(
            "completed={} queued={} in_flight={}",
            snapshot.completed.len(),
            snapshot.queued.len(),
            snapshot.in_flight.len()
        );
        println!("conservation={}", snapshot.is_conserved());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(processing_ms: u64) -> DispatchConfig {
        DispatchConfig {
            processing_ms,
            ..DispatchConfig::default()
        }
    }

    #[test]
    fn vip_share_is_spread_evenly() {
        let vips = (0..100).filter(|&i| is_vip(i, 20)).count();
        assert_eq!(vips, 20);
        assert!(!(0..10).any(|i| is_vip(i, 0)));
        assert!((0..10).all(|i| is_vip(i, 100)));
    }

    #[test]
    fn demo_serves_vips_first_and_requeues() {
        let report = demo_scenario(&config(1000)).expect("demo runs");
        // Items 1 and 2 start at once; item 2's worker is removed and it comes back
        // ahead of the normals but behind both VIPs.
        assert_eq!(report.completion_order, vec![1, 3, 5, 2, 4]);
        assert_eq!(report.snapshot.requeued, 1);
        assert_eq!(report.workers, 2);
        assert!(report.snapshot.is_conserved());
        assert!(report.snapshot.queued.is_empty());
    }

    #[test]
    fn benchmark_completes_everything() {
        let params = BenchParams {
            workers: 3,
            items: 30,
            vip_percent: 25,
            churn: true,
            validate: true,
        };
        let result = benchmark_once(&config(100), &params).expect("bench runs");
        assert_eq!(result.leftover, 0);
        assert!(!result.duplicate_items);
        assert!(result.conserved);
        assert_eq!(result.requeued, 1);
    }

    #[test]
    fn benchmark_without_workers_leaves_queue() {
        let params = BenchParams {
            workers: 0,
            items: 4,
            vip_percent: 0,
            churn: false,
            validate: false,
        };
        let result = benchmark_once(&config(100), &params).expect("bench runs");
        assert_eq!(result.leftover, 4);
        assert!(result.conserved);
    }

    #[test]
    fn stress_skips_empty_worker_sets() {
        run_stress(&config(10), &[0, 0], &[5], 0, false, false).expect("zero sets are skipped");
        run_stress(&config(10), &[0, 1], &[3], 50, false, true).expect("sweep runs");
    }
}
