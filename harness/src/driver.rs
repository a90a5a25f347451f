//! Starts the callers, collects their reports and counts the computations.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use anyhow::Context;
use crossbeam_channel::{bounded, unbounded};
use tracing::{info, warn};
use ttl_dedup::{Coalescer, ResolveError};

use crate::config::HarnessConfig;
use crate::statistics::{Outcome, Report, Statistics};
use crate::thread_pool::ThreadPool;
use crate::workload::Workload;

/// Result of a harness run.
#[derive(Debug)]
pub struct Summary {
    /// Callers that were started. Less than configured if the run was interrupted.
    pub callers: usize,
    /// Times the underlying computation ran.
    pub compute_calls: usize,
    /// What the callers reported.
    pub statistics: Statistics,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} callers", self.callers)?;
        write!(f, "{}", self.statistics)?;
        write!(f, "Calls to compute: {}", self.compute_calls)
    }
}

/// Runs the harness described by `config`.
///
/// Callers are started `config.spawn_interval` apart on a thread pool and all resolve through
/// one shared cache. Once `cancelled` is set no further callers are started; the ones already
/// running are waited for.
pub fn run(config: &HarnessConfig, cancelled: &AtomicBool) -> anyhow::Result<Summary> {
    config.validate().context("invalid harness configuration")?;

    let workload =
        Workload::new(config.max_delay, config.failure_rate).with_min_delay(config.min_delay);
    let cache = Arc::new(Coalescer::new(config.ttl, {
        let workload = workload.clone();
        move |key: &String| workload.compute(key)
    }));

    // The callers plus the reporter.
    let pool = ThreadPool::new(config.workers() + 1);

    // The (MPSC) channel of reports between callers and the reporter.
    let (report_sender, report_receiver) = unbounded::<Report>();

    // The (SPSC one-shot) channel of stats between the reporter and this thread.
    let (stat_sender, stat_receiver) = bounded(0);

    pool.execute(move || {
        let mut stats = Statistics::default();
        for report in report_receiver {
            info!(caller = report.id(), outcome = ?report.outcome(), "report");
            stats.add_report(report);
        }
        let _ = stat_sender.send(stats);
    });

    let mut callers = 0;
    for id in 0..config.callers {
        if cancelled.load(Ordering::Acquire) {
            warn!(remaining = config.callers - id, "interrupted, not starting remaining callers");
            break;
        }
        if id > 0 {
            thread::sleep(config.spawn_interval);
        }

        let key = config.key_for(id).to_string();
        info!(caller = id, %key, "starting caller");
        let cache = cache.clone();
        let report_sender = report_sender.clone();
        let timeout = config.timeout;
        pool.execute(move || {
            let start = Instant::now();
            let result = match timeout {
                Some(timeout) => cache.resolve_timeout(key.clone(), timeout),
                None => cache.resolve(key.clone()).map_err(ResolveError::Compute),
            };
            let outcome = match result {
                Ok(_) => Outcome::Resolved,
                Err(ResolveError::Compute(err)) => {
                    warn!(caller = id, %err, "computation failed");
                    Outcome::Failed
                }
                Err(ResolveError::Timeout(_)) => Outcome::TimedOut,
            };
            let elapsed = start.elapsed();
            info!(caller = id, ?elapsed, "done resolving");
            if report_sender
                .send(Report::new(id, key, outcome, elapsed))
                .is_err()
            {
                warn!(caller = id, "reporter is gone, dropping report");
            }
        });
        callers += 1;
    }

    // The reporter finishes once every caller dropped its sender.
    drop(report_sender);
    let statistics = stat_receiver
        .recv()
        .context("the reporter exited without sending statistics")?;
    info!("all callers done");

    Ok(Summary {
        callers,
        compute_calls: workload.invocations(),
        statistics,
    })
    // When the pool is dropped, all worker threads are joined.
}
