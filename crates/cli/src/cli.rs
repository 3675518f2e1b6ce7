use std::path::PathBuf;

use clap::Parser;
use dbparity_core::HarnessConfig;

/// Compatibility and performance harness for MySQL-protocol databases.
///
/// Runs the query catalog against a primary target and, optionally, a
/// reference target, then writes a JSON report and chart datasets.
/// Every flag falls back to the environment (`.env` supported).
#[derive(Parser, Debug, Default)]
#[command(name = "dbparity", about = "Compare a MySQL-compatible database against MySQL")]
pub struct CliArgs {
    /// Config profile; `X_KEY` env vars take precedence over `KEY`.
    #[arg(long, env = "DBPARITY_PROFILE")]
    pub profile: Option<String>,

    /// YAML catalog replacing the built-in query battery.
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Timed executions per read query.
    #[arg(long)]
    pub iterations: Option<u32>,

    /// Untimed warm-up executions per read query.
    #[arg(long)]
    pub warmup: Option<u32>,

    /// Seed for generated queries (random when unset).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Rows in the slowest / wins tables.
    #[arg(long)]
    pub top_n: Option<usize>,

    /// Directory for the report and chart datasets.
    #[arg(long)]
    pub report_dir: Option<PathBuf>,

    /// Run against the primary only.
    #[arg(long)]
    pub no_reference: bool,

    /// Skip the concurrency stress run.
    #[arg(long)]
    pub no_stress: bool,

    /// Skip the bulk insert benchmark.
    #[arg(long)]
    pub no_bulk: bool,

    /// Stress worker count.
    #[arg(long)]
    pub workers: Option<u32>,

    /// Stress run length in seconds.
    #[arg(long)]
    pub duration: Option<u64>,
}

impl CliArgs {
    /// Resolve the effective config: env (for the chosen profile), then flags.
    pub fn resolve(&self) -> HarnessConfig {
        let mut config = match &self.profile {
            Some(p) => HarnessConfig::for_profile(p),
            None => HarnessConfig::from_env(),
        };
        self.apply(&mut config);
        config
    }

    pub fn apply(&self, config: &mut HarnessConfig) {
        if let Some(path) = &self.catalog {
            config.bench.catalog_path = Some(path.clone());
        }
        if let Some(n) = self.iterations {
            config.bench.iterations = n;
        }
        if let Some(n) = self.warmup {
            config.bench.warmup = n;
        }
        if self.seed.is_some() {
            config.bench.seed = self.seed;
        }
        if let Some(n) = self.top_n {
            config.bench.top_n = n;
        }
        if let Some(dir) = &self.report_dir {
            config.output.report_dir = dir.clone();
        }
        if self.no_reference {
            config.reference.enabled = false;
        }
        if self.no_stress {
            config.stress.enabled = false;
        }
        if self.no_bulk {
            config.bulk.enabled = false;
        }
        if let Some(n) = self.workers {
            config.stress.workers = n;
        }
        if let Some(secs) = self.duration {
            config.stress.duration_secs = secs;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_env_config() {
        let args = CliArgs::parse_from([
            "dbparity",
            "--iterations",
            "7",
            "--seed",
            "99",
            "--no-reference",
            "--no-bulk",
            "--report-dir",
            "/tmp/out",
        ]);
        let mut config = HarnessConfig::for_profile("CLITEST_UNUSED");
        args.apply(&mut config);

        assert_eq!(config.bench.iterations, 7);
        assert_eq!(config.bench.seed, Some(99));
        assert!(!config.reference.enabled);
        assert!(!config.bulk.enabled);
        assert!(config.stress.enabled);
        assert_eq!(config.output.report_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn absent_flags_leave_config_alone() {
        let mut config = HarnessConfig::for_profile("CLITEST_UNUSED");
        let before = config.clone();
        CliArgs::default().apply(&mut config);
        assert_eq!(config.bench.iterations, before.bench.iterations);
        assert_eq!(config.bench.seed, before.bench.seed);
        assert_eq!(config.reference.enabled, before.reference.enabled);
        assert_eq!(config.stress.enabled, before.stress.enabled);
    }
}
