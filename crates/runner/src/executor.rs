//! Sends each catalog query to both targets and records one [`QueryResult`]
//! per target.
//!
//! Targets run strictly one after the other (primary, then reference). Every
//! path through [`DualExecutor::run_query`] ends with the target's implicit
//! transaction committed or rolled back.

use std::time::{Duration, Instant};

use dbparity_catalog::CatalogQuery;
use dbparity_core::config::BenchConfig;
use dbparity_core::{stats, QueryResult, ResultLog};
use tracing::{debug, warn};

use crate::classify::{classify_latency, ErrorClassifier};
use crate::target::{SqlTarget, TargetError};

/// Statement prefixes treated as reads.
const READ_PREFIXES: [&str; 6] = ["SELECT", "WITH", "SHOW", "DESCRIBE", "CALL", "CHECK"];

/// Whether `sql` returns rows and may be repeated safely.
pub fn is_read_statement(sql: &str) -> bool {
    let upper = sql.trim().to_uppercase();
    let head = upper.trim_start_matches('(').trim_start();
    READ_PREFIXES.iter().any(|p| head.starts_with(p))
}

/// Replaced with the server's `secure_file_priv` directory (trailing `/`).
pub const EXPORT_DIR_PLACEHOLDER: &str = "{export_dir}";
/// Replaced with [`ExecutorSettings::run_tag`].
pub const RUN_TAG_PLACEHOLDER: &str = "{run_tag}";
/// Export directory when the server imposes none or cannot be asked.
pub const FALLBACK_EXPORT_DIR: &str = "/tmp/";

/// Whether `sql` writes a server-side file, which fails if repeated.
pub fn writes_file(sql: &str) -> bool {
    let upper = sql.to_uppercase();
    upper.contains("INTO OUTFILE") || upper.contains("INTO DUMPFILE")
}

/// Normalize a `secure_file_priv` value into a directory prefix.
/// Empty or missing means the server allows any path.
pub fn export_dir(secure_file_priv: Option<&str>) -> String {
    match secure_file_priv.map(str::trim).filter(|d| !d.is_empty()) {
        Some(dir) => {
            let dir = dir.replace('\\', "/");
            if dir.ends_with('/') {
                dir
            } else {
                format!("{}/", dir)
            }
        }
        None => FALLBACK_EXPORT_DIR.to_string(),
    }
}

/// The warm-up form of a read: `SELECT`/`WITH` without a LIMIT get
/// `LIMIT 1` appended; everything else runs verbatim.
pub fn warmup_statement(sql: &str) -> String {
    let upper = sql.trim().to_uppercase();
    let head = upper.trim_start_matches('(').trim_start();
    let limitable = head.starts_with("SELECT") || head.starts_with("WITH");
    if limitable && !upper.contains("LIMIT") {
        format!("{} LIMIT 1;", sql.trim().trim_end_matches(';').trim_end())
    } else {
        sql.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Timed executions per read (writes always run once).
    pub iterations: u32,
    /// Untimed warm-up runs per read.
    pub warmup: u32,
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    /// Substituted for `{run_tag}` so file names differ between runs.
    pub run_tag: String,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            iterations: 3,
            warmup: 1,
            reconnect_attempts: 3,
            reconnect_delay: Duration::from_secs(1),
            run_tag: "run".to_string(),
        }
    }
}

impl From<&BenchConfig> for ExecutorSettings {
    fn from(bench: &BenchConfig) -> Self {
        Self {
            iterations: bench.iterations.max(1),
            warmup: bench.warmup,
            ..Self::default()
        }
    }
}

pub struct DualExecutor {
    primary: Box<dyn SqlTarget>,
    reference: Option<Box<dyn SqlTarget>>,
    classifier: ErrorClassifier,
    settings: ExecutorSettings,
    log: ResultLog,
}

impl DualExecutor {
    /// `reference` is `None` for a single-target run.
    pub fn new(
        primary: Box<dyn SqlTarget>,
        reference: Option<Box<dyn SqlTarget>>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            primary,
            reference,
            classifier: ErrorClassifier::default(),
            settings,
            log: ResultLog::new(),
        }
    }

    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn has_reference(&self) -> bool {
        self.reference.is_some()
    }

    pub fn log(&self) -> &ResultLog {
        &self.log
    }

    /// Run one query on every connected target and append the results.
    /// Returns the results produced by this call, in target order.
    pub async fn run_query(&mut self, query: &CatalogQuery) -> Vec<QueryResult> {
        let mut produced = Vec::with_capacity(2);

        let result = attempt(self.primary.as_mut(), query, &self.settings, &self.classifier).await;
        produced.push(result);

        if let Some(reference) = self.reference.as_deref_mut() {
            let result = attempt(reference, query, &self.settings, &self.classifier).await;
            produced.push(result);
        }

        for r in &produced {
            self.log.push(r.clone());
        }
        produced
    }

    /// Run every query in order, calling `on_result` after each attempt.
    pub async fn run_all<F>(&mut self, queries: &[CatalogQuery], mut on_result: F)
    where
        F: FnMut(&CatalogQuery, &QueryResult),
    {
        for query in queries {
            for result in self.run_query(query).await {
                on_result(query, &result);
            }
        }
    }

    /// Close both connections independently and hand back the results.
    pub async fn shutdown(mut self) -> ResultLog {
        close_quietly(self.primary.as_mut()).await;
        if let Some(reference) = self.reference.as_deref_mut() {
            close_quietly(reference).await;
        }
        self.log
    }

    /// Give the connections back (e.g. to reuse them for other workloads).
    pub fn into_parts(self) -> (ResultLog, Box<dyn SqlTarget>, Option<Box<dyn SqlTarget>>) {
        (self.log, self.primary, self.reference)
    }
}

pub async fn close_quietly(target: &mut dyn SqlTarget) {
    if let Err(e) = target.close().await {
        warn!(target_role = %target.role(), error = %e, "close failed");
    }
}

/// Best-effort liveness check: ping, reconnecting between failed attempts.
/// Never fails; a dead connection surfaces on the next real statement.
pub async fn ensure_alive(target: &mut dyn SqlTarget, attempts: u32, delay: Duration) {
    for attempt in 1..=attempts.max(1) {
        match target.ping().await {
            Ok(()) => return,
            Err(e) => {
                warn!(target_role = %target.role(), attempt, error = %e, "ping failed, reconnecting");
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if let Err(e) = target.reconnect().await {
                    debug!(target_role = %target.role(), error = %e, "reconnect failed");
                }
            }
        }
    }
}

async fn attempt(
    target: &mut dyn SqlTarget,
    query: &CatalogQuery,
    settings: &ExecutorSettings,
    classifier: &ErrorClassifier,
) -> QueryResult {
    let role = target.role();
    if query.is_skipped(role) {
        debug!(query_id = %query.id, target_role = %role, "skipped");
        return QueryResult::skipped(role, &query.id, &query.category);
    }

    ensure_alive(target, settings.reconnect_attempts, settings.reconnect_delay).await;

    for stmt in &query.prepare {
        match target.execute(stmt).await {
            Ok(_) => {
                let _ = target.commit().await;
            }
            Err(e) => {
                debug!(query_id = %query.id, target_role = %role, error = %e, "prepare statement failed");
                let _ = target.rollback().await;
            }
        }
    }

    let sql = resolve_placeholders(target, query.sql_for(role), settings).await;
    let outcome = if !is_read_statement(&sql) {
        run_write(target, &sql).await
    } else if query.once || writes_file(&sql) {
        run_read(target, &sql, 1, 0).await
    } else {
        run_read(target, &sql, settings.iterations, settings.warmup).await
    };

    match outcome {
        Ok((timings, row_count)) => {
            let tier = classify_latency(stats::mean(&timings));
            QueryResult::measured(role, &query.id, &query.category, timings, row_count, tier)
        }
        Err(e) => {
            if let Err(rb) = target.rollback().await {
                debug!(query_id = %query.id, target_role = %role, error = %rb, "rollback after failure failed");
            }
            let kind = classifier.classify(&e);
            QueryResult::failed(role, &query.id, &query.category, kind, e.to_string())
        }
    }
}

/// Fill `{export_dir}` from the target's `secure_file_priv` and `{run_tag}`
/// from the settings. SQL without placeholders is returned as is.
async fn resolve_placeholders(
    target: &mut dyn SqlTarget,
    sql: &str,
    settings: &ExecutorSettings,
) -> String {
    let mut resolved = sql.replace(RUN_TAG_PLACEHOLDER, &settings.run_tag);
    if resolved.contains(EXPORT_DIR_PLACEHOLDER) {
        let priv_dir = match target.fetch_scalar("SELECT @@secure_file_priv").await {
            Ok(value) => {
                let _ = target.commit().await;
                value
            }
            Err(e) => {
                debug!(target_role = %target.role(), error = %e, "secure_file_priv lookup failed");
                let _ = target.rollback().await;
                None
            }
        };
        let dir = export_dir(priv_dir.as_deref());
        debug!(target_role = %target.role(), dir = %dir, "export directory resolved");
        resolved = resolved.replace(EXPORT_DIR_PLACEHOLDER, &dir);
    }
    resolved
}

async fn run_read(
    target: &mut dyn SqlTarget,
    sql: &str,
    iterations: u32,
    warmup: u32,
) -> Result<(Vec<f64>, u64), TargetError> {
    if warmup > 0 {
        let warm = warmup_statement(sql);
        for _ in 0..warmup {
            match target.fetch_count(&warm).await {
                Ok(_) => {
                    let _ = target.commit().await;
                }
                Err(_) => {
                    let _ = target.rollback().await;
                }
            }
        }
    }

    let iterations = iterations.max(1);
    let mut timings = Vec::with_capacity(iterations as usize);
    let mut row_count = 0;
    for i in 0..iterations {
        let start = Instant::now();
        let rows = target.fetch_count(sql).await?;
        timings.push(start.elapsed().as_secs_f64() * 1000.0);
        if i == 0 {
            row_count = rows;
        }
        target.commit().await?;
    }
    Ok((timings, row_count))
}

async fn run_write(target: &mut dyn SqlTarget, sql: &str) -> Result<(Vec<f64>, u64), TargetError> {
    let start = Instant::now();
    let affected = target.execute(sql).await?;
    target.commit().await?;
    let elapsed = start.elapsed().as_secs_f64() * 1000.0;
    debug!(affected, "write committed");
    Ok((vec![elapsed], 0))
}
