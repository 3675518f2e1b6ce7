//! Fixed-duration concurrency benchmark.
//!
//! A pool of tokio tasks, each owning one connection, repeats a single read
//! query until the deadline. Samples are merged once every worker has joined.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dbparity_core::config::StressConfig;
use dbparity_core::{stats, TargetRole};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::executor::close_quietly;
use crate::target::TargetConnector;

/// Aggregate outcome of one stress run against one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressSummary {
    pub target: TargetRole,
    pub workers: u32,
    pub duration_secs: f64,
    pub requests: u64,
    pub errors: u64,
    /// Successful requests per second of configured duration.
    pub tps: f64,
    pub mean_latency_ms: f64,
    pub p95_latency_ms: f64,
}

impl StressSummary {
    /// Fold per-request samples (milliseconds, any order) into a summary.
    pub fn from_samples(
        target: TargetRole,
        workers: u32,
        duration: Duration,
        mut samples: Vec<f64>,
        errors: u64,
    ) -> Self {
        samples.sort_by(|a, b| a.total_cmp(b));
        let secs = duration.as_secs_f64();
        let requests = samples.len() as u64;
        Self {
            target,
            workers,
            duration_secs: secs,
            requests,
            errors,
            tps: if secs > 0.0 { requests as f64 / secs } else { 0.0 },
            mean_latency_ms: stats::mean(&samples),
            p95_latency_ms: stats::percentile_sorted(&samples, 95),
        }
    }
}

#[derive(Default)]
struct WorkerOutcome {
    samples: Vec<f64>,
    errors: u64,
}

pub struct StressRunner {
    workers: u32,
    duration: Duration,
    query: String,
}

impl StressRunner {
    pub fn new(workers: u32, duration: Duration, query: impl Into<String>) -> Self {
        Self {
            workers: workers.max(1),
            duration,
            query: query.into(),
        }
    }

    pub fn from_config(config: &StressConfig) -> Self {
        Self::new(
            config.workers,
            Duration::from_secs(config.duration_secs),
            config.query.clone(),
        )
    }

    /// Run the pool against one endpoint. Worker failures are counted,
    /// never propagated.
    pub async fn run(&self, connector: Arc<dyn TargetConnector>) -> StressSummary {
        let role = connector.role();
        info!(
            target_role = %role,
            workers = self.workers,
            duration_secs = self.duration.as_secs_f64(),
            "stress run starting"
        );

        let deadline = Instant::now() + self.duration;
        let mut handles = Vec::with_capacity(self.workers as usize);
        for worker_id in 0..self.workers {
            let connector = Arc::clone(&connector);
            let query = self.query.clone();
            handles.push(tokio::spawn(async move {
                worker_loop(worker_id, connector, query, deadline).await
            }));
        }

        let mut samples = Vec::new();
        let mut errors = 0u64;
        for handle in handles {
            match handle.await {
                Ok(outcome) => {
                    samples.extend(outcome.samples);
                    errors += outcome.errors;
                }
                Err(e) => {
                    warn!(target_role = %role, error = %e, "stress worker panicked");
                    errors += 1;
                }
            }
        }

        let summary =
            StressSummary::from_samples(role, self.workers, self.duration, samples, errors);
        info!(
            target_role = %role,
            requests = summary.requests,
            errors = summary.errors,
            tps = summary.tps,
            p95_ms = summary.p95_latency_ms,
            "stress run finished"
        );
        summary
    }
}

async fn worker_loop(
    worker_id: u32,
    connector: Arc<dyn TargetConnector>,
    query: String,
    deadline: Instant,
) -> WorkerOutcome {
    let mut outcome = WorkerOutcome::default();

    let mut conn = match connector.connect().await {
        Ok(c) => c,
        Err(e) => {
            warn!(worker_id, error = %e, "stress worker could not connect");
            outcome.errors = 1;
            return outcome;
        }
    };

    while Instant::now() < deadline {
        let start = Instant::now();
        match conn.fetch_count(&query).await {
            Ok(_) => {
                outcome
                    .samples
                    .push(start.elapsed().as_secs_f64() * 1000.0);
                let _ = conn.commit().await;
            }
            Err(_) => {
                outcome.errors += 1;
                let _ = conn.rollback().await;
            }
        }
    }

    close_quietly(conn.as_mut()).await;
    outcome
}
