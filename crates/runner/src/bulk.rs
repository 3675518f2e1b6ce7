//! Bulk insert benchmark: time a batch of multi-row INSERTs into a scratch
//! table and commit them as one transaction.

use std::time::Instant;

use dbparity_core::config::BulkConfig;
use dbparity_core::TargetRole;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::executor::close_quietly;
use crate::target::{SqlTarget, TargetConnector, TargetError};

pub const BULK_TABLE: &str = "bulk_test";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkSummary {
    pub target: TargetRole,
    pub rows: u32,
    pub chunk_size: u32,
    /// Insert + commit wall time; zero when the run failed.
    pub duration_ms: f64,
    pub rows_per_sec: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BulkSummary {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

pub struct BulkInsertBench {
    rows: u32,
    chunk_size: u32,
}

impl BulkInsertBench {
    pub fn new(rows: u32, chunk_size: u32) -> Self {
        Self {
            rows,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn from_config(config: &BulkConfig) -> Self {
        Self::new(config.batch_size, config.chunk_size)
    }

    /// Open a dedicated connection and run the benchmark on it. A failure at
    /// any step is recorded in the summary.
    pub async fn run(&self, connector: &dyn TargetConnector) -> BulkSummary {
        let role = connector.role();
        let mut conn = match connector.connect().await {
            Ok(c) => c,
            Err(e) => return self.failed(role, &e),
        };
        let summary = self.run_on(conn.as_mut()).await;
        close_quietly(conn.as_mut()).await;
        summary
    }

    pub async fn run_on(&self, target: &mut dyn SqlTarget) -> BulkSummary {
        let role = target.role();
        match self.timed_insert(target).await {
            Ok(duration_ms) => {
                let rows_per_sec = if duration_ms > 0.0 {
                    f64::from(self.rows) / (duration_ms / 1000.0)
                } else {
                    0.0
                };
                info!(target_role = %role, rows = self.rows, duration_ms, rows_per_sec, "bulk insert finished");
                if let Err(e) = drop_table(target).await {
                    warn!(target_role = %role, error = %e, "could not drop bulk table");
                }
                BulkSummary {
                    target: role,
                    rows: self.rows,
                    chunk_size: self.chunk_size,
                    duration_ms,
                    rows_per_sec,
                    error: None,
                }
            }
            Err(e) => {
                let _ = target.rollback().await;
                warn!(target_role = %role, error = %e, "bulk insert failed");
                self.failed(role, &e)
            }
        }
    }

    async fn timed_insert(&self, target: &mut dyn SqlTarget) -> Result<f64, TargetError> {
        drop_table(target).await?;
        target
            .execute(&format!("CREATE TABLE {} (id INT, val VARCHAR(50))", BULK_TABLE))
            .await?;
        target.commit().await?;

        let statements = insert_statements(self.rows, self.chunk_size);
        let start = Instant::now();
        for stmt in &statements {
            target.execute(stmt).await?;
        }
        target.commit().await?;
        Ok(start.elapsed().as_secs_f64() * 1000.0)
    }

    fn failed(&self, role: TargetRole, err: &TargetError) -> BulkSummary {
        BulkSummary {
            target: role,
            rows: self.rows,
            chunk_size: self.chunk_size,
            duration_ms: 0.0,
            rows_per_sec: 0.0,
            error: Some(err.to_string()),
        }
    }
}

async fn drop_table(target: &mut dyn SqlTarget) -> Result<(), TargetError> {
    target
        .execute(&format!("DROP TABLE IF EXISTS {}", BULK_TABLE))
        .await?;
    target.commit().await
}

/// Multi-row INSERT statements covering ids `0..rows` in chunks.
pub fn insert_statements(rows: u32, chunk_size: u32) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let mut out = Vec::new();
    let mut next = 0;
    while next < rows {
        let end = (next + chunk_size).min(rows);
        let values: Vec<String> = (next..end).map(|i| format!("({}, 'val_{}')", i, i)).collect();
        out.push(format!(
            "INSERT INTO {} (id, val) VALUES {}",
            BULK_TABLE,
            values.join(", ")
        ));
        next = end;
    }
    out
}
