use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::result::TargetRole;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64_opt(profile: &str, key: &str) -> Option<u64> {
    profiled_env_opt(profile, key).and_then(|v| v.parse().ok())
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.as_str(), "true" | "1"),
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Active profile name (empty = default).
    pub profile: String,
    pub primary: TargetConfig,
    pub reference: TargetConfig,
    pub bench: BenchConfig,
    pub stress: StressConfig,
    pub bulk: BulkConfig,
    pub output: OutputConfig,
}

impl HarnessConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `DBPARITY_PROFILE`. When set (e.g. `DOCKER`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("DBPARITY_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            primary: TargetConfig::from_env_profiled(p, TargetRole::Primary),
            reference: TargetConfig::from_env_profiled(p, TargetRole::Reference),
            bench: BenchConfig::from_env_profiled(p),
            stress: StressConfig::from_env_profiled(p),
            bulk: BulkConfig::from_env_profiled(p),
            output: OutputConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    pub fn target(&self, role: TargetRole) -> &TargetConfig {
        match role {
            TargetRole::Primary => &self.primary,
            TargetRole::Reference => &self.reference,
        }
    }

    /// Reject settings that would make a run meaningless.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.bench.iterations == 0 {
            return Err(CoreError::Config("BENCH_ITERATIONS must be at least 1".into()));
        }
        if self.stress.workers == 0 {
            return Err(CoreError::Config("STRESS_WORKERS must be at least 1".into()));
        }
        if self.stress.duration_secs == 0 {
            return Err(CoreError::Config("STRESS_DURATION_SECS must be at least 1".into()));
        }
        if self.primary.host.is_empty() {
            return Err(CoreError::Config("PRIMARY_DB_HOST is empty".into()));
        }
        Ok(())
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  primary:     {} at {}:{}/{}",
            self.primary.name, self.primary.host, self.primary.port, self.primary.database
        );
        if self.reference.enabled {
            tracing::info!(
                "  reference:   {} at {}:{}/{}",
                self.reference.name, self.reference.host, self.reference.port, self.reference.database
            );
        } else {
            tracing::info!("  reference:   disabled");
        }
        tracing::info!(
            "  bench:       iterations={}, warmup={}, seed={}",
            self.bench.iterations,
            self.bench.warmup,
            self.bench.seed.map(|s| s.to_string()).as_deref().unwrap_or("(random)")
        );
        tracing::info!(
            "  stress:      workers={}, duration={}s, enabled={}",
            self.stress.workers, self.stress.duration_secs, self.stress.enabled
        );
        tracing::info!("  bulk:        batch_size={}, enabled={}", self.bulk.batch_size, self.bulk.enabled);
        tracing::info!("  output:      report_dir={}", self.output.report_dir.display());
    }

    /// Return a redacted view safe for embedding in reports (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "primary": self.primary.redacted(),
            "reference": self.reference.redacted(),
            "iterations": self.bench.iterations,
            "warmup": self.bench.warmup,
        })
    }
}

// ── Target connection ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Display name used in console output and reports.
    pub name: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Only meaningful for the reference target; the primary is always required.
    pub enabled: bool,
    pub connect_timeout_secs: u32,
}

impl TargetConfig {
    fn from_env_profiled(p: &str, role: TargetRole) -> Self {
        let (prefix, name, port) = match role {
            TargetRole::Primary => ("PRIMARY_DB", "OpenHalo", 3306),
            TargetRole::Reference => ("REFERENCE_DB", "MySQL", 3309),
        };
        let key = |k: &str| format!("{}_{}", prefix, k);
        Self {
            name: profiled_env_or(p, &key("NAME"), name),
            host: profiled_env_or(p, &key("HOST"), "localhost"),
            port: profiled_env_u16(p, &key("PORT"), port),
            user: profiled_env_or(p, &key("USER"), "halo"),
            password: profiled_env_or(p, &key("PASSWORD"), "halo"),
            database: profiled_env_or(p, &key("DATABASE"), "testdb"),
            enabled: match role {
                TargetRole::Primary => true,
                TargetRole::Reference => profiled_env_bool(p, &key("ENABLED"), true),
            },
            connect_timeout_secs: profiled_env_u32(p, &key("CONNECT_TIMEOUT_SECS"), 10),
        }
    }

    pub fn redacted(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "host": self.host,
            "port": self.port,
            "database": self.database,
            "enabled": self.enabled,
        })
    }
}

// ── Compatibility suite ───────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Timed executions per read statement.
    pub iterations: u32,
    /// Warm-up executions per read statement (0 disables warm-up).
    pub warmup: u32,
    /// Seed for the query generator; `None` draws one at startup.
    pub seed: Option<u64>,
    /// Rows shown in the "slowest" and "wins" tables.
    pub top_n: usize,
    /// Optional YAML catalog replacing the built-in one.
    pub catalog_path: Option<PathBuf>,
}

impl BenchConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            iterations: profiled_env_u32(p, "BENCH_ITERATIONS", 3),
            warmup: profiled_env_u32(p, "BENCH_WARMUP", 1),
            seed: profiled_env_u64_opt(p, "BENCH_SEED"),
            top_n: profiled_env_u32(p, "BENCH_TOP_N", 10) as usize,
            catalog_path: profiled_env_opt(p, "CATALOG_PATH").map(PathBuf::from),
        }
    }
}

// ── Stress run ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressConfig {
    pub enabled: bool,
    pub workers: u32,
    pub duration_secs: u64,
    pub query: String,
}

impl StressConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            enabled: profiled_env_bool(p, "STRESS_ENABLED", true),
            workers: profiled_env_u32(p, "STRESS_WORKERS", 10),
            duration_secs: u64::from(profiled_env_u32(p, "STRESS_DURATION_SECS", 5)),
            query: profiled_env_or(
                p,
                "STRESS_QUERY",
                "SELECT * FROM name_basics WHERE primaryprofession = 'actor' LIMIT 1",
            ),
        }
    }
}

// ── Bulk insert ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkConfig {
    pub enabled: bool,
    pub batch_size: u32,
    /// Rows per multi-row INSERT statement.
    pub chunk_size: u32,
}

impl BulkConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            enabled: profiled_env_bool(p, "BULK_ENABLED", true),
            batch_size: profiled_env_u32(p, "BULK_BATCH_SIZE", 5000),
            chunk_size: profiled_env_u32(p, "BULK_CHUNK_SIZE", 1000).max(1),
        }
    }
}

// ── Output ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub report_dir: PathBuf,
    pub report_file: String,
}

impl OutputConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            report_dir: PathBuf::from(profiled_env_or(p, "REPORT_DIR", "reports")),
            report_file: profiled_env_or(
                p,
                "REPORT_FILE",
                "full_compatibility_report.json",
            ),
        }
    }
}
