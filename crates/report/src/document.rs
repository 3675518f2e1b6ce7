use chrono::{DateTime, Utc};
use dbparity_catalog::PlanManifest;
use dbparity_core::ResultLog;
use dbparity_runner::{BulkSummary, StressSummary};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ReportError;

/// Run metadata, captured when the run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub profile: String,
    pub primary: String,
    /// `None` for a single-target run.
    pub reference: Option<String>,
    pub iterations: u32,
    pub warmup: u32,
    pub seed: u64,
    pub plan: PlanManifest,
}

impl RunMeta {
    pub fn start(
        profile: impl Into<String>,
        primary: impl Into<String>,
        reference: Option<String>,
        iterations: u32,
        warmup: u32,
        plan: PlanManifest,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            profile: profile.into(),
            primary: primary.into(),
            reference,
            iterations,
            warmup,
            seed: plan.seed,
            plan,
        }
    }
}

/// The persisted report: metadata, every per-query result in run order, and
/// the optional workload sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub meta: RunMeta,
    pub queries: ResultLog,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stress: Vec<StressSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bulk: Vec<BulkSummary>,
}

impl ReportDocument {
    pub fn new(meta: RunMeta, queries: ResultLog) -> Self {
        Self {
            meta,
            queries,
            stress: Vec::new(),
            bulk: Vec::new(),
        }
    }

    pub fn with_stress(mut self, stress: Vec<StressSummary>) -> Self {
        self.stress = stress;
        self
    }

    pub fn with_bulk(mut self, bulk: Vec<BulkSummary>) -> Self {
        self.bulk = bulk;
        self
    }

    /// Pretty-printed JSON. Field order is fixed by the struct layout, so the
    /// same document always serializes to the same bytes.
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ReportError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbparity_catalog::CatalogQuery;
    use dbparity_core::{FailureKind, LatencyTier, QueryResult, TargetRole};
    use std::time::Duration;

    fn sample() -> ReportDocument {
        let plan = PlanManifest::new(&[CatalogQuery::new("md_1.1", "Simple", "SELECT 1;")], 42);
        let meta = RunMeta::start("", "OpenHalo", Some("MySQL".into()), 3, 1, plan);
        let log = ResultLog::from(vec![
            QueryResult::measured(
                TargetRole::Primary,
                "md_1.1",
                "Simple",
                vec![1.25, 2.5, 3.75],
                4,
                LatencyTier::Ok,
            ),
            QueryResult::failed(
                TargetRole::Reference,
                "md_1.1",
                "Simple",
                FailureKind::MissingFeature,
                "1146 (42S02): Table 'testdb.x' doesn't exist",
            ),
        ]);
        let stress = StressSummary::from_samples(
            TargetRole::Primary,
            2,
            Duration::from_secs(1),
            vec![1.0, 2.0],
            0,
        );
        ReportDocument::new(meta, log).with_stress(vec![stress])
    }

    #[test]
    fn serialization_is_byte_identical() {
        let doc = sample();
        assert_eq!(doc.to_json().unwrap(), doc.to_json().unwrap());
    }

    #[test]
    fn json_carries_every_result_field() {
        let json = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["meta"]["seed"], 42);
        assert_eq!(value["meta"]["iterations"], 3);
        assert_eq!(value["meta"]["reference"], "MySQL");

        let first = &value["queries"][0];
        for field in [
            "target",
            "query_id",
            "category",
            "timings",
            "mean_time",
            "median_time",
            "row_count",
            "status",
        ] {
            assert!(first.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(first["status"], "OK");
        assert!(first.get("error_detail").is_none());
        assert_eq!(value["queries"][1]["status"], "MissingFeature");
        assert!(value["queries"][1]["error_detail"].is_string());

        assert_eq!(value["stress"][0]["requests"], 2);
        assert!(value.get("bulk").is_none());
    }

    #[test]
    fn parses_back() {
        let doc = sample();
        let back = ReportDocument::from_json(&doc.to_json().unwrap()).unwrap();
        assert_eq!(back.meta.run_id, doc.meta.run_id);
        assert_eq!(back.queries.len(), 2);
        assert_eq!(back.stress.len(), 1);
    }
}
