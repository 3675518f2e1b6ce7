//! Cross-target aggregation over a run's [`ResultLog`].
//!
//! Results are indexed by `query_id` per target. When an id appears more than
//! once for the same target the later result replaces the earlier one.

use std::collections::{HashMap, HashSet};

use dbparity_catalog::CategorySpec;
use dbparity_core::{stats, QueryResult, QueryStatus, ResultLog, TargetRole};
use serde::Serialize;

/// Ratio above which the primary is labelled slower.
pub const SLOWER_RATIO: f64 = 1.5;
/// Ratio below which the primary is labelled faster.
pub const FASTER_RATIO: f64 = 0.7;
/// A target wins when its mean is below this fraction of the other's.
pub const WIN_FRACTION: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "label", content = "ratio", rename_all = "snake_case")]
pub enum DeltaLabel {
    /// primary / reference > 1.5
    Slower(f64),
    /// primary / reference < 0.7
    Faster(f64),
    Similar(f64),
    NotApplicable,
}

impl DeltaLabel {
    /// Compare a primary mean against an optional reference mean.
    pub fn between(primary_ms: f64, reference_ms: Option<f64>) -> Self {
        match reference_ms {
            Some(r) if r > 0.0 && primary_ms > 0.0 => {
                let ratio = primary_ms / r;
                if ratio > SLOWER_RATIO {
                    DeltaLabel::Slower(ratio)
                } else if ratio < FASTER_RATIO {
                    DeltaLabel::Faster(ratio)
                } else {
                    DeltaLabel::Similar(ratio)
                }
            }
            _ => DeltaLabel::NotApplicable,
        }
    }

    pub fn ratio(&self) -> Option<f64> {
        match self {
            DeltaLabel::Slower(r) | DeltaLabel::Faster(r) | DeltaLabel::Similar(r) => Some(*r),
            DeltaLabel::NotApplicable => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            DeltaLabel::Slower(r) => format!("x{:.1} slower", r),
            DeltaLabel::Faster(r) => format!("x{:.1} faster", 1.0 / r),
            DeltaLabel::Similar(_) => "similar".to_string(),
            DeltaLabel::NotApplicable => "N/A".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionCounts {
    pub total: usize,
    pub ok: usize,
    pub warning: usize,
    pub problem: usize,
    /// Every failure status (Error, SyntaxError, MissingFeature, Unsupported).
    pub errors: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlowQuery {
    pub query_id: String,
    pub primary_ms: f64,
    pub reference_ms: Option<f64>,
    pub delta: DeltaLabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WinBasis {
    /// Both succeeded and the winner was at least 10% faster.
    Faster,
    /// The other target failed outright; the whole mean counts as saved.
    OtherFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Win {
    pub query_id: String,
    pub winner: TargetRole,
    pub winner_ms: f64,
    pub other_ms: f64,
    pub saved_ms: f64,
    pub basis: WinBasis,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lead {
    pub query_id: String,
    pub primary_ms: f64,
    pub reference_ms: f64,
    pub delta_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRow {
    pub name: String,
    pub primary_ms: Option<f64>,
    pub reference_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompatGap {
    pub target: TargetRole,
    pub query_id: String,
    pub category: String,
    pub status: QueryStatus,
    pub detail: Option<String>,
}

/// Read-only view over a run's results, keyed by target and query id.
pub struct Comparison<'a> {
    order: Vec<&'a str>,
    primary: HashMap<&'a str, &'a QueryResult>,
    reference: HashMap<&'a str, &'a QueryResult>,
}

impl<'a> Comparison<'a> {
    pub fn new(log: &'a ResultLog) -> Self {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut primary = HashMap::new();
        let mut reference = HashMap::new();

        for r in log.iter() {
            let id = r.query_id.as_str();
            if seen.insert(id) {
                order.push(id);
            }
            match r.target {
                TargetRole::Primary => primary.insert(id, r),
                TargetRole::Reference => reference.insert(id, r),
            };
        }

        Self {
            order,
            primary,
            reference,
        }
    }

    pub fn lookup(&self, role: TargetRole, query_id: &str) -> Option<&'a QueryResult> {
        self.map(role).get(query_id).copied()
    }

    fn map(&self, role: TargetRole) -> &HashMap<&'a str, &'a QueryResult> {
        match role {
            TargetRole::Primary => &self.primary,
            TargetRole::Reference => &self.reference,
        }
    }

    /// Results for `role` in first-seen query order.
    pub fn results(&self, role: TargetRole) -> impl Iterator<Item = &'a QueryResult> + '_ {
        self.order.iter().filter_map(move |id| self.lookup(role, id))
    }

    pub fn has_results(&self, role: TargetRole) -> bool {
        !self.map(role).is_empty()
    }

    pub fn counts(&self, role: TargetRole) -> ExecutionCounts {
        let mut c = ExecutionCounts::default();
        for r in self.results(role) {
            c.total += 1;
            match r.status {
                QueryStatus::Ok => c.ok += 1,
                QueryStatus::Warning => c.warning += 1,
                QueryStatus::Problem => c.problem += 1,
                QueryStatus::Skipped => c.skipped += 1,
                s if s.is_failure() => c.errors += 1,
                _ => {}
            }
        }
        c
    }

    /// Slowest timed primary queries, each paired with the reference.
    pub fn slowest(&self, top_n: usize) -> Vec<SlowQuery> {
        let mut timed: Vec<&QueryResult> =
            self.results(TargetRole::Primary).filter(|r| r.has_timing()).collect();
        timed.sort_by(|a, b| b.mean_time.total_cmp(&a.mean_time));

        timed
            .into_iter()
            .take(top_n)
            .map(|r| {
                let reference_ms = self
                    .lookup(TargetRole::Reference, &r.query_id)
                    .map(|m| m.mean_time);
                SlowQuery {
                    query_id: r.query_id.clone(),
                    primary_ms: r.mean_time,
                    reference_ms,
                    delta: DeltaLabel::between(r.mean_time, reference_ms),
                }
            })
            .collect()
    }

    /// Per-query wins for either target, largest saving first.
    pub fn wins(&self) -> Vec<Win> {
        let mut wins = Vec::new();
        for id in &self.order {
            for role in TargetRole::ALL {
                let (Some(me), Some(other)) =
                    (self.lookup(role, id), self.lookup(role.other(), id))
                else {
                    continue;
                };
                if !me.has_timing() {
                    continue;
                }
                let win = if other.has_timing() && me.mean_time < other.mean_time * WIN_FRACTION {
                    Some((other.mean_time - me.mean_time, WinBasis::Faster))
                } else if other.status.is_failure() && other.mean_time == 0.0 {
                    Some((me.mean_time, WinBasis::OtherFailed))
                } else {
                    None
                };
                if let Some((saved_ms, basis)) = win {
                    wins.push(Win {
                        query_id: id.to_string(),
                        winner: role,
                        winner_ms: me.mean_time,
                        other_ms: other.mean_time,
                        saved_ms,
                        basis,
                    });
                }
            }
        }
        wins.sort_by(|a, b| b.saved_ms.total_cmp(&a.saved_ms));
        wins
    }

    pub fn wins_for(&self, role: TargetRole) -> Vec<Win> {
        self.wins().into_iter().filter(|w| w.winner == role).collect()
    }

    /// Queries where the primary trails the reference by more than
    /// `min_delta_ms`, largest gap first.
    pub fn reference_leads(&self, min_delta_ms: f64) -> Vec<Lead> {
        let mut leads: Vec<Lead> = self
            .results(TargetRole::Primary)
            .filter(|p| p.has_timing())
            .filter_map(|p| {
                let r = self.lookup(TargetRole::Reference, &p.query_id)?;
                if !r.has_timing() {
                    return None;
                }
                let delta_ms = p.mean_time - r.mean_time;
                (delta_ms > min_delta_ms).then(|| Lead {
                    query_id: p.query_id.clone(),
                    primary_ms: p.mean_time,
                    reference_ms: r.mean_time,
                    delta_ms,
                })
            })
            .collect();
        leads.sort_by(|a, b| b.delta_ms.total_cmp(&a.delta_ms));
        leads
    }

    /// Mean of per-query means for each category, per target.
    pub fn category_breakdown(&self, categories: &[CategorySpec]) -> Vec<CategoryRow> {
        categories
            .iter()
            .map(|cat| CategoryRow {
                name: cat.name.clone(),
                primary_ms: self.category_mean(TargetRole::Primary, &cat.prefixes),
                reference_ms: self.category_mean(TargetRole::Reference, &cat.prefixes),
            })
            .collect()
    }

    fn category_mean(&self, role: TargetRole, prefixes: &[String]) -> Option<f64> {
        let means: Vec<f64> = self
            .results(role)
            .filter(|r| r.has_timing())
            .filter(|r| prefixes.iter().any(|p| r.query_id.starts_with(p.as_str())))
            .map(|r| r.mean_time)
            .collect();
        (!means.is_empty()).then(|| stats::mean(&means))
    }

    /// `MissingFeature` and `SyntaxError` results of both targets.
    pub fn compat_gaps(&self) -> Vec<CompatGap> {
        let mut gaps = Vec::new();
        for role in TargetRole::ALL {
            for r in self.results(role).filter(|r| r.status.is_compat_gap()) {
                gaps.push(CompatGap {
                    target: role,
                    query_id: r.query_id.clone(),
                    category: r.category.clone(),
                    status: r.status,
                    detail: r.error_detail.clone(),
                });
            }
        }
        gaps
    }

    /// Mean of the timed per-query means for `role`.
    pub fn average_time(&self, role: TargetRole) -> Option<f64> {
        let means: Vec<f64> = self
            .results(role)
            .filter(|r| r.has_timing())
            .map(|r| r.mean_time)
            .collect();
        (!means.is_empty()).then(|| stats::mean(&means))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbparity_core::{FailureKind, LatencyTier};

    fn ok(role: TargetRole, id: &str, ms: f64) -> QueryResult {
        QueryResult::measured(role, id, "cat", vec![ms], 1, LatencyTier::Ok)
    }

    fn err(role: TargetRole, id: &str, kind: FailureKind) -> QueryResult {
        QueryResult::failed(role, id, "cat", kind, "boom")
    }

    #[test]
    fn delta_labels() {
        let d = DeltaLabel::between(100.0, Some(50.0));
        assert_eq!(d, DeltaLabel::Slower(2.0));
        assert!(matches!(DeltaLabel::between(100.0, Some(90.0)), DeltaLabel::Similar(_)));
        assert!(matches!(DeltaLabel::between(30.0, Some(100.0)), DeltaLabel::Faster(_)));
        assert_eq!(DeltaLabel::between(10.0, None), DeltaLabel::NotApplicable);
        assert_eq!(DeltaLabel::between(10.0, Some(0.0)), DeltaLabel::NotApplicable);
        assert_eq!(DeltaLabel::Slower(2.0).describe(), "x2.0 slower");
        assert_eq!(DeltaLabel::Faster(0.5).describe(), "x2.0 faster");
    }

    #[test]
    fn lookup_is_last_write_wins() {
        let log = ResultLog::from(vec![
            ok(TargetRole::Primary, "a", 10.0),
            ok(TargetRole::Primary, "a", 30.0),
        ]);
        let cmp = Comparison::new(&log);
        assert_eq!(cmp.lookup(TargetRole::Primary, "a").unwrap().mean_time, 30.0);
        assert_eq!(cmp.counts(TargetRole::Primary).total, 1);
    }

    #[test]
    fn slowest_pairs_with_reference() {
        let log = ResultLog::from(vec![
            ok(TargetRole::Primary, "a", 10.0),
            ok(TargetRole::Reference, "a", 10.0),
            ok(TargetRole::Primary, "b", 100.0),
            ok(TargetRole::Reference, "b", 50.0),
            err(TargetRole::Primary, "c", FailureKind::Error),
        ]);
        let cmp = Comparison::new(&log);
        let slow = cmp.slowest(10);
        assert_eq!(slow.len(), 2);
        assert_eq!(slow[0].query_id, "b");
        assert_eq!(slow[0].delta, DeltaLabel::Slower(2.0));
        assert_eq!(slow[1].query_id, "a");
        assert_eq!(cmp.slowest(1).len(), 1);
    }

    #[test]
    fn wins_cover_both_bases() {
        let log = ResultLog::from(vec![
            ok(TargetRole::Primary, "fast", 10.0),
            ok(TargetRole::Reference, "fast", 40.0),
            ok(TargetRole::Primary, "close", 95.0),
            ok(TargetRole::Reference, "close", 100.0),
            ok(TargetRole::Primary, "only", 12.0),
            err(TargetRole::Reference, "only", FailureKind::SyntaxError),
            QueryResult::skipped(TargetRole::Primary, "skip", "cat"),
            ok(TargetRole::Reference, "skip", 5.0),
        ]);
        let cmp = Comparison::new(&log);
        let wins = cmp.wins();
        assert_eq!(wins.len(), 2);
        assert_eq!(wins[0].query_id, "fast");
        assert_eq!(wins[0].basis, WinBasis::Faster);
        assert!((wins[0].saved_ms - 30.0).abs() < 1e-9);
        assert_eq!(wins[1].query_id, "only");
        assert_eq!(wins[1].basis, WinBasis::OtherFailed);
        assert!((wins[1].saved_ms - 12.0).abs() < 1e-9);
    }

    #[test]
    fn reference_leads_need_more_than_five_ms() {
        let log = ResultLog::from(vec![
            ok(TargetRole::Primary, "a", 20.0),
            ok(TargetRole::Reference, "a", 10.0),
            ok(TargetRole::Primary, "b", 15.0),
            ok(TargetRole::Reference, "b", 10.0),
        ]);
        let leads = Comparison::new(&log).reference_leads(5.0);
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].query_id, "a");
    }

    #[test]
    fn categories_without_samples_are_none() {
        let log = ResultLog::from(vec![
            ok(TargetRole::Primary, "md_1.1", 10.0),
            ok(TargetRole::Primary, "dyn_sel_01", 30.0),
            err(TargetRole::Reference, "md_1.1", FailureKind::Error),
            ok(TargetRole::Primary, "md_10.1", 500.0),
        ]);
        let cats = vec![
            CategorySpec {
                name: "Simple SELECT".into(),
                prefixes: vec!["md_1.".into(), "dyn_sel".into()],
            },
            CategorySpec {
                name: "Joins".into(),
                prefixes: vec!["md_6.".into()],
            },
        ];
        let rows = Comparison::new(&log).category_breakdown(&cats);
        assert_eq!(rows[0].primary_ms, Some(20.0));
        assert_eq!(rows[0].reference_ms, None);
        assert_eq!(rows[1].primary_ms, None);
    }

    #[test]
    fn counts_and_gaps() {
        let log = ResultLog::from(vec![
            ok(TargetRole::Primary, "a", 10.0),
            QueryResult::measured(TargetRole::Primary, "b", "c", vec![300.0], 0, LatencyTier::Problem),
            err(TargetRole::Primary, "c", FailureKind::MissingFeature),
            err(TargetRole::Primary, "d", FailureKind::Unsupported),
            QueryResult::skipped(TargetRole::Primary, "e", "c"),
            err(TargetRole::Reference, "c", FailureKind::SyntaxError),
        ]);
        let cmp = Comparison::new(&log);
        let c = cmp.counts(TargetRole::Primary);
        assert_eq!(
            c,
            ExecutionCounts {
                total: 5,
                ok: 1,
                warning: 0,
                problem: 1,
                errors: 2,
                skipped: 1,
            }
        );
        let gaps = cmp.compat_gaps();
        assert_eq!(gaps.len(), 2);
        assert_eq!(gaps[0].target, TargetRole::Primary);
        assert_eq!(gaps[1].target, TargetRole::Reference);
        assert_eq!(gaps[1].status, QueryStatus::SyntaxError);
        assert_eq!(cmp.average_time(TargetRole::Primary), Some(155.0));
        assert_eq!(cmp.average_time(TargetRole::Reference), None);
    }
}
