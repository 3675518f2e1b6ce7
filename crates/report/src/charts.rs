//! Chart datasets. Each chart is a plain JSON document a plotting tool can
//! render directly; nothing here draws pixels.

use dbparity_core::TargetRole;
use dbparity_runner::StressSummary;
use serde::Serialize;

use crate::aggregate::Comparison;

/// Pairs where either side is at or above this are left off the scatter.
pub const SCATTER_CUTOFF_MS: f64 = 2000.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThroughputBar {
    pub target: TargetRole,
    pub label: String,
    pub tps: f64,
    pub p95_latency_ms: f64,
}

/// Stress-run throughput and tail latency, one bar per target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThroughputChart {
    pub title: String,
    pub bars: Vec<ThroughputBar>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub target: TargetRole,
    pub label: String,
    pub values: Vec<f64>,
}

/// Mean latency of selected queries, grouped by query id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedBarChart {
    pub title: String,
    pub query_ids: Vec<String>,
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub query_id: String,
    pub reference_ms: f64,
    pub primary_ms: f64,
}

/// Paired latencies; points below the `y = x` diagonal favour the primary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<ScatterPoint>,
    /// Extent of the diagonal, `max(1, largest coordinate)`.
    pub limit: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartSet {
    pub throughput: Option<ThroughputChart>,
    pub heavy_queries: Option<GroupedBarChart>,
    pub scatter: Option<ScatterChart>,
}

/// Display names for the two targets.
#[derive(Debug, Clone)]
pub struct TargetNames {
    pub primary: String,
    pub reference: String,
}

impl TargetNames {
    pub fn get(&self, role: TargetRole) -> &str {
        match role {
            TargetRole::Primary => &self.primary,
            TargetRole::Reference => &self.reference,
        }
    }
}

pub fn throughput_chart(stress: &[StressSummary], names: &TargetNames) -> Option<ThroughputChart> {
    if stress.is_empty() {
        return None;
    }
    Some(ThroughputChart {
        title: "Throughput (TPS) and p95 latency".into(),
        bars: stress
            .iter()
            .map(|s| ThroughputBar {
                target: s.target,
                label: names.get(s.target).to_string(),
                tps: s.tps,
                p95_latency_ms: s.p95_latency_ms,
            })
            .collect(),
    })
}

/// Grouped bars for `query_ids` that have a result on both targets.
pub fn heavy_query_chart(
    cmp: &Comparison<'_>,
    query_ids: &[String],
    names: &TargetNames,
) -> Option<GroupedBarChart> {
    let mut ids = Vec::new();
    let mut primary = Vec::new();
    let mut reference = Vec::new();
    for id in query_ids {
        if let (Some(p), Some(r)) = (
            cmp.lookup(TargetRole::Primary, id),
            cmp.lookup(TargetRole::Reference, id),
        ) {
            ids.push(id.clone());
            primary.push(p.mean_time);
            reference.push(r.mean_time);
        }
    }
    if ids.is_empty() {
        return None;
    }
    Some(GroupedBarChart {
        title: "Complex query performance (mean latency)".into(),
        query_ids: ids,
        series: vec![
            Series {
                target: TargetRole::Primary,
                label: names.primary.clone(),
                values: primary,
            },
            Series {
                target: TargetRole::Reference,
                label: names.reference.clone(),
                values: reference,
            },
        ],
    })
}

pub fn scatter_chart(cmp: &Comparison<'_>, names: &TargetNames) -> Option<ScatterChart> {
    if !cmp.has_results(TargetRole::Reference) {
        return None;
    }

    let points: Vec<ScatterPoint> = cmp
        .results(TargetRole::Primary)
        .filter_map(|p| {
            let r = cmp.lookup(TargetRole::Reference, &p.query_id)?;
            let both_timed = p.has_timing() && r.has_timing();
            let in_range = p.mean_time < SCATTER_CUTOFF_MS && r.mean_time < SCATTER_CUTOFF_MS;
            (both_timed && in_range).then(|| ScatterPoint {
                query_id: p.query_id.clone(),
                reference_ms: r.mean_time,
                primary_ms: p.mean_time,
            })
        })
        .collect();

    let limit = points
        .iter()
        .flat_map(|p| [p.reference_ms, p.primary_ms])
        .fold(1.0_f64, f64::max);

    Some(ScatterChart {
        title: "Direct execution time comparison".into(),
        x_label: format!("{} time (ms)", names.reference),
        y_label: format!("{} time (ms)", names.primary),
        points,
        limit,
    })
}

/// Build every chart the available data supports.
pub fn build_charts(
    cmp: &Comparison<'_>,
    stress: &[StressSummary],
    heavy_ids: &[String],
    names: &TargetNames,
) -> ChartSet {
    ChartSet {
        throughput: throughput_chart(stress, names),
        heavy_queries: heavy_query_chart(cmp, heavy_ids, names),
        scatter: scatter_chart(cmp, names),
    }
}
