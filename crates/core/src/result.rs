use std::fmt;

use serde::{Deserialize, Serialize};

use crate::stats;

/// Which of the two endpoints a result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetRole {
    /// The compatibility-layer server under test.
    Primary,
    /// The reference database the primary is compared against.
    Reference,
}

impl TargetRole {
    pub const ALL: [TargetRole; 2] = [TargetRole::Primary, TargetRole::Reference];

    pub fn other(self) -> Self {
        match self {
            TargetRole::Primary => TargetRole::Reference,
            TargetRole::Reference => TargetRole::Primary,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TargetRole::Primary => "primary",
            TargetRole::Reference => "reference",
        }
    }
}

impl fmt::Display for TargetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Status taxonomy ───────────────────────────────────────────

/// Outcome of one (query, target) attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryStatus {
    #[serde(rename = "OK")]
    Ok,
    Warning,
    Problem,
    Error,
    SyntaxError,
    MissingFeature,
    Unsupported,
    Skipped,
}

impl QueryStatus {
    /// Executed successfully (any latency tier).
    pub fn is_success(self) -> bool {
        matches!(self, QueryStatus::Ok | QueryStatus::Warning | QueryStatus::Problem)
    }

    /// Executed and failed.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            QueryStatus::Error
                | QueryStatus::SyntaxError
                | QueryStatus::MissingFeature
                | QueryStatus::Unsupported
        )
    }

    /// Failure that points at a feature gap rather than a runtime error.
    pub fn is_compat_gap(self) -> bool {
        matches!(self, QueryStatus::MissingFeature | QueryStatus::SyntaxError)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueryStatus::Ok => "OK",
            QueryStatus::Warning => "Warning",
            QueryStatus::Problem => "Problem",
            QueryStatus::Error => "Error",
            QueryStatus::SyntaxError => "SyntaxError",
            QueryStatus::MissingFeature => "MissingFeature",
            QueryStatus::Unsupported => "Unsupported",
            QueryStatus::Skipped => "Skipped",
        }
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latency tier of a successful execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyTier {
    Ok,
    Warning,
    Problem,
}

impl From<LatencyTier> for QueryStatus {
    fn from(tier: LatencyTier) -> Self {
        match tier {
            LatencyTier::Ok => QueryStatus::Ok,
            LatencyTier::Warning => QueryStatus::Warning,
            LatencyTier::Problem => QueryStatus::Problem,
        }
    }
}

/// Kind of a failed execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    Error,
    SyntaxError,
    MissingFeature,
    Unsupported,
}

impl From<FailureKind> for QueryStatus {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Error => QueryStatus::Error,
            FailureKind::SyntaxError => QueryStatus::SyntaxError,
            FailureKind::MissingFeature => QueryStatus::MissingFeature,
            FailureKind::Unsupported => QueryStatus::Unsupported,
        }
    }
}

// ── QueryResult ───────────────────────────────────────────────

/// One execution attempt of one catalog query against one target.
///
/// Only constructible through [`QueryResult::measured`], [`QueryResult::failed`]
/// and [`QueryResult::skipped`], which keep `timings`, the derived averages and
/// `status` consistent: timings are non-empty exactly for the success tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub target: TargetRole,
    pub query_id: String,
    pub category: String,
    /// Elapsed milliseconds, one per timed execution.
    pub timings: Vec<f64>,
    pub mean_time: f64,
    pub median_time: f64,
    pub row_count: u64,
    pub status: QueryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl QueryResult {
    /// A successful attempt. An empty sample set cannot carry a latency tier,
    /// so it is recorded as a generic error instead.
    pub fn measured(
        target: TargetRole,
        query_id: impl Into<String>,
        category: impl Into<String>,
        timings: Vec<f64>,
        row_count: u64,
        tier: LatencyTier,
    ) -> Self {
        if timings.is_empty() {
            return Self::failed(
                target,
                query_id,
                category,
                FailureKind::Error,
                "no timing samples recorded",
            );
        }
        Self {
            target,
            query_id: query_id.into(),
            category: category.into(),
            mean_time: stats::mean(&timings),
            median_time: stats::median(&timings),
            timings,
            row_count,
            status: tier.into(),
            error_detail: None,
        }
    }

    pub fn failed(
        target: TargetRole,
        query_id: impl Into<String>,
        category: impl Into<String>,
        kind: FailureKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            target,
            query_id: query_id.into(),
            category: category.into(),
            timings: Vec::new(),
            mean_time: 0.0,
            median_time: 0.0,
            row_count: 0,
            status: kind.into(),
            error_detail: Some(detail.into()),
        }
    }

    pub fn skipped(
        target: TargetRole,
        query_id: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            target,
            query_id: query_id.into(),
            category: category.into(),
            timings: Vec::new(),
            mean_time: 0.0,
            median_time: 0.0,
            row_count: 0,
            status: QueryStatus::Skipped,
            error_detail: None,
        }
    }

    /// Has a usable latency measurement.
    pub fn has_timing(&self) -> bool {
        self.mean_time > 0.0
    }

    /// First line of the error detail, capped at `max` characters.
    pub fn error_headline(&self, max: usize) -> Option<String> {
        self.error_detail
            .as_deref()
            .map(|d| d.lines().next().unwrap_or("").chars().take(max).collect())
    }
}

// ── ResultLog ─────────────────────────────────────────────────

/// Append-only, ordered collection of results for a single run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultLog {
    results: Vec<QueryResult>,
}

impl ResultLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: QueryResult) {
        self.results.push(result);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryResult> {
        self.results.iter()
    }

    pub fn for_target(&self, target: TargetRole) -> impl Iterator<Item = &QueryResult> {
        self.results.iter().filter(move |r| r.target == target)
    }

    pub fn as_slice(&self) -> &[QueryResult] {
        &self.results
    }
}

impl From<Vec<QueryResult>> for ResultLog {
    fn from(results: Vec<QueryResult>) -> Self {
        Self { results }
    }
}
