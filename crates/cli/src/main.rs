mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};

use dbparity_catalog::{Catalog, PlanManifest, QueryGenerator};
use dbparity_core::config::load_dotenv;
use dbparity_core::{HarnessConfig, QueryResult, TargetRole};
use dbparity_report::{
    build_charts, render_summary, render_workloads, Comparison, ReportDocument, ReportStore,
    RunMeta, SummaryOptions, TargetNames,
};
use dbparity_runner::{
    BulkInsertBench, BulkSummary, DualExecutor, ExecutorSettings, MySqlConnector, MySqlTarget,
    SqlTarget, StressRunner, StressSummary,
};

use crate::cli::CliArgs;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    load_dotenv();
    let args = CliArgs::parse();
    let config = args.resolve();
    config.validate().context("invalid configuration")?;
    config.log_summary();
    debug!(config = %config.redacted_summary(), "effective configuration");

    let catalog = Catalog::load_or_builtin(config.bench.catalog_path.as_deref())
        .context("failed to load query catalog")?;
    let seed = config.bench.seed.unwrap_or_else(rand::random);
    let mut generator = QueryGenerator::from_seed(seed);
    let plan = catalog.plan(&mut generator).context("failed to plan catalog")?;
    let manifest = PlanManifest::new(&plan, seed);
    info!(queries = plan.len(), seed, digest = %manifest.digest, "catalog planned");

    let mut meta = RunMeta::start(
        config.profile_label(),
        config.primary.name.clone(),
        None,
        config.bench.iterations,
        config.bench.warmup,
        manifest,
    );

    let primary = MySqlTarget::connect(TargetRole::Primary, &config.primary)
        .await
        .with_context(|| {
            format!(
                "cannot connect to primary {} at {}:{}",
                config.primary.name, config.primary.host, config.primary.port
            )
        })?;
    let reference = connect_reference(&config).await;
    if reference.is_some() {
        meta.reference = Some(config.reference.name.clone());
    }

    let names = TargetNames {
        primary: config.primary.name.clone(),
        reference: config.reference.name.clone(),
    };
    let mut active = vec![TargetRole::Primary];
    if reference.is_some() {
        active.push(TargetRole::Reference);
    }

    let settings = ExecutorSettings {
        run_tag: meta.run_id.simple().to_string(),
        ..ExecutorSettings::from(&config.bench)
    };
    let mut executor = DualExecutor::new(
        Box::new(primary),
        reference.map(|r| Box::new(r) as Box<dyn SqlTarget>),
        settings,
    );
    let mut current: Option<String> = None;
    executor
        .run_all(&plan, |query, result| {
            if current.as_deref() != Some(query.id.as_str()) {
                println!("\n[{}] {}", query.id, query.category);
                current = Some(query.id.clone());
            }
            println!("{}", status_line(names.get(result.target), result));
        })
        .await;
    let log = executor.shutdown().await;
    info!(results = log.len(), "compatibility suite finished");

    let bulk = run_bulk(&config, &active).await;
    let stress = run_stress(&config, &active).await;

    let doc = ReportDocument::new(meta, log)
        .with_stress(stress)
        .with_bulk(bulk);
    let store = ReportStore::new(&config.output.report_dir).with_context(|| {
        format!(
            "cannot create report directory {}",
            config.output.report_dir.display()
        )
    })?;
    let cmp = Comparison::new(&doc.queries);
    let charts = build_charts(&cmp, &doc.stress, &catalog.charts.heavy_queries, &names);
    store.save_charts(&charts).context("failed to write chart datasets")?;
    let path = store
        .save_report(&config.output.report_file, &doc)
        .context("failed to write report")?;

    print!("{}", render_workloads(&doc.stress, &doc.bulk, &names));
    let opts = SummaryOptions {
        top_n: config.bench.top_n,
        ..SummaryOptions::default()
    };
    print!("{}", render_summary(&cmp, &catalog.categories, &names, &opts));
    println!("\nReport saved: {}", path.display());
    Ok(())
}

/// A failed reference connection downgrades the run to single-target.
async fn connect_reference(config: &HarnessConfig) -> Option<MySqlTarget> {
    if !config.reference.enabled {
        info!("reference target disabled, running single-target");
        return None;
    }
    match MySqlTarget::connect(TargetRole::Reference, &config.reference).await {
        Ok(target) => Some(target),
        Err(e) => {
            warn!(
                name = %config.reference.name,
                host = %config.reference.host,
                port = config.reference.port,
                error = %e,
                "reference unavailable, continuing with primary only"
            );
            None
        }
    }
}

async fn run_bulk(config: &HarnessConfig, active: &[TargetRole]) -> Vec<BulkSummary> {
    if !config.bulk.enabled {
        return Vec::new();
    }
    let bench = BulkInsertBench::from_config(&config.bulk);
    let mut out = Vec::with_capacity(active.len());
    for &role in active {
        let connector = MySqlConnector::new(role, config.target(role).clone());
        out.push(bench.run(&connector).await);
    }
    out
}

async fn run_stress(config: &HarnessConfig, active: &[TargetRole]) -> Vec<StressSummary> {
    if !config.stress.enabled {
        return Vec::new();
    }
    let runner = StressRunner::from_config(&config.stress);
    let mut out = Vec::with_capacity(active.len());
    for &role in active {
        let connector = Arc::new(MySqlConnector::new(role, config.target(role).clone()));
        out.push(runner.run(connector).await);
    }
    out
}

fn status_line(name: &str, result: &QueryResult) -> String {
    if result.status.is_failure() {
        let headline = result.error_headline(120).unwrap_or_default();
        format!("  [{}] ✗ {}: {}", name, result.status, headline)
    } else if result.has_timing() {
        format!(
            "  [{}] Mean: {:.2}ms, Rows: {}, Status: {}",
            name, result.mean_time, result.row_count, result.status
        )
    } else {
        format!("  [{}] Status: {}", name, result.status)
    }
}
