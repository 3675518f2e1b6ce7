//! End-of-run text summary.

use std::fmt::{self, Write};

use dbparity_catalog::CategorySpec;
use dbparity_core::TargetRole;
use dbparity_runner::{BulkSummary, StressSummary};

use crate::aggregate::Comparison;
use crate::charts::TargetNames;

const RULE: &str = "============================================================";
const THIN_RULE: &str = "-----------------------------------------------------------------";

#[derive(Debug, Clone)]
pub struct SummaryOptions {
    /// Rows in the slowest and wins tables.
    pub top_n: usize,
    /// Minimum absolute gap for the "reference leads" section.
    pub lead_threshold_ms: f64,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            top_n: 10,
            lead_threshold_ms: 5.0,
        }
    }
}

pub fn render_summary(
    cmp: &Comparison<'_>,
    categories: &[CategorySpec],
    names: &TargetNames,
    opts: &SummaryOptions,
) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_summary(&mut out, cmp, categories, names, opts);
    out
}

fn write_summary(
    out: &mut String,
    cmp: &Comparison<'_>,
    categories: &[CategorySpec],
    names: &TargetNames,
    opts: &SummaryOptions,
) -> fmt::Result {
    let p = names.primary.as_str();
    let r = names.reference.as_str();
    let dual = cmp.has_results(TargetRole::Reference);

    writeln!(out, "\n{}", RULE)?;
    writeln!(out, "SYNTHESIS REPORT")?;
    writeln!(out, "{}", RULE)?;

    for role in TargetRole::ALL {
        if !cmp.has_results(role) {
            continue;
        }
        let c = cmp.counts(role);
        writeln!(out, "\n{} execution summary", names.get(role))?;
        writeln!(out, "  Total queries tested : {}", c.total)?;
        writeln!(out, "  OK                   : {}", c.ok)?;
        writeln!(out, "  Warning              : {}", c.warning)?;
        writeln!(out, "  Problem              : {}", c.problem)?;
        writeln!(out, "  Errors               : {}", c.errors)?;
        writeln!(out, "  Skipped              : {}", c.skipped)?;
    }

    writeln!(out, "\nTOP {} SLOWEST QUERIES ON {} (vs {})", opts.top_n, p, r)?;
    writeln!(out, "  {:<14} | {:>15} | {:>15} | {:>12}", "ID", format!("{} (ms)", p), format!("{} (ms)", r), "Difference")?;
    writeln!(out, "{}", THIN_RULE)?;
    for s in cmp.slowest(opts.top_n) {
        writeln!(
            out,
            "  {:<14} | {:>15.2} | {:>15.2} | {}",
            s.query_id,
            s.primary_ms,
            s.reference_ms.unwrap_or(0.0),
            s.delta.describe()
        )?;
    }

    if dual {
        for role in TargetRole::ALL {
            let wins = cmp.wins_for(role);
            writeln!(out, "\nQUERIES WHERE {} BEATS {}", names.get(role), names.get(role.other()))?;
            writeln!(out, "  {:<14} | {:>15} | {:>15} | {:>12}", "ID", format!("{} (ms)", names.get(role)), format!("{} (ms)", names.get(role.other())), "Saved")?;
            writeln!(out, "{}", THIN_RULE)?;
            if wins.is_empty() {
                writeln!(out, "  No significant win on this dataset.")?;
            }
            for w in wins.iter().take(opts.top_n) {
                let other = if w.other_ms > 0.0 {
                    format!("{:.2}", w.other_ms)
                } else {
                    "failed".to_string()
                };
                writeln!(
                    out,
                    "  {:<14} | {:>15.2} | {:>15} | -{:.1}ms",
                    w.query_id, w.winner_ms, other, w.saved_ms
                )?;
            }
        }

        writeln!(out, "\nQueries faster on {} than {}", r, p)?;
        for lead in cmp.reference_leads(opts.lead_threshold_ms) {
            writeln!(
                out,
                "  {:<15} {}={:>7.2} ms | {}={:>7.2} ms -> delta {:.2} ms",
                lead.query_id, p, lead.primary_ms, r, lead.reference_ms, lead.delta_ms
            )?;
        }
    }

    writeln!(out, "\nUnsupported / failing features")?;
    let gaps = cmp.compat_gaps();
    if gaps.is_empty() {
        writeln!(out, "  none")?;
    }
    for g in &gaps {
        writeln!(
            out,
            "  [{}] {:<15} {} -> {}",
            names.get(g.target),
            g.query_id,
            g.category,
            g.status
        )?;
    }

    writeln!(out, "\nAverage execution time")?;
    for role in TargetRole::ALL {
        if let Some(avg) = cmp.average_time(role) {
            writeln!(out, "  {:<10}: {:.2} ms", names.get(role), avg)?;
        }
    }

    if !categories.is_empty() {
        writeln!(out, "\nPERFORMANCE BY CATEGORY")?;
        writeln!(out, "  {:<25} | {:>12} | {:>12}", "Category", format!("{} avg", p), format!("{} avg", r))?;
        writeln!(out, "{}", THIN_RULE)?;
        for row in cmp.category_breakdown(categories) {
            writeln!(
                out,
                "  {:<25} | {:>12} | {:>12}",
                row.name,
                fmt_ms(row.primary_ms),
                fmt_ms(row.reference_ms)
            )?;
        }
    }

    Ok(())
}

/// One block for the stress results and one for the bulk insert results.
pub fn render_workloads(stress: &[StressSummary], bulk: &[BulkSummary], names: &TargetNames) -> String {
    let mut out = String::new();
    let _ = write_workloads(&mut out, stress, bulk, names);
    out
}

fn write_workloads(
    out: &mut String,
    stress: &[StressSummary],
    bulk: &[BulkSummary],
    names: &TargetNames,
) -> fmt::Result {
    if !bulk.is_empty() {
        writeln!(out, "\nBULK INSERT")?;
        for b in bulk {
            match &b.error {
                None => writeln!(
                    out,
                    "  {:<10} {} rows in {:.2} ms ({:.0} rows/sec)",
                    names.get(b.target),
                    b.rows,
                    b.duration_ms,
                    b.rows_per_sec
                )?,
                Some(e) => writeln!(out, "  {:<10} failed: {}", names.get(b.target), e)?,
            }
        }
    }
    if !stress.is_empty() {
        writeln!(out, "\nCONCURRENCY STRESS")?;
        for s in stress {
            writeln!(
                out,
                "  {:<10} {} workers, {:.0}s: {:.1} TPS, mean {:.2} ms, p95 {:.2} ms, {} errors",
                names.get(s.target),
                s.workers,
                s.duration_secs,
                s.tps,
                s.mean_latency_ms,
                s.p95_latency_ms,
                s.errors
            )?;
        }
    }
    Ok(())
}

fn fmt_ms(v: Option<f64>) -> String {
    match v {
        Some(ms) => format!("{:.2} ms", ms),
        None => "N/A".to_string(),
    }
}
