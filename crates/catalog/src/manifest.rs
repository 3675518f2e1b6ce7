use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::catalog::CatalogQuery;

/// Fingerprint of a planned query list.
///
/// `digest` is a SHA-256 hex digest over every query's id and per-target SQL
/// in plan order, so two reports with equal fingerprints ran the same
/// statements (including generated ones).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanManifest {
    pub query_count: usize,
    pub digest: String,
    pub seed: u64,
}

impl PlanManifest {
    pub fn new(queries: &[CatalogQuery], seed: u64) -> Self {
        Self {
            query_count: queries.len(),
            digest: compute_plan_digest(queries),
            seed,
        }
    }

    /// Whether `queries` still hash to this manifest's digest.
    pub fn matches(&self, queries: &[CatalogQuery]) -> bool {
        self.query_count == queries.len() && self.digest == compute_plan_digest(queries)
    }
}

fn compute_plan_digest(queries: &[CatalogQuery]) -> String {
    let mut hasher = Sha256::new();
    for q in queries {
        hasher.update(q.id.as_bytes());
        hasher.update(b"\0");
        hasher.update(q.sql.as_bytes());
        hasher.update(b"\0");
        if let Some(r) = &q.reference_sql {
            hasher.update(r.as_bytes());
        }
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}
