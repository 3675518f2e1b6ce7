use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::charts::ChartSet;
use crate::document::ReportDocument;
use crate::error::ReportError;

/// Filesystem-backed report output.
///
/// ```text
/// reports/
///   full_compatibility_report.json
///   charts/
///     throughput.json
///     heavy_queries.json
///     latency_scatter.json
/// ```
pub struct ReportStore {
    base_dir: PathBuf,
}

impl ReportStore {
    /// Create the store, ensuring the directory structure exists.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, ReportError> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(base_dir.join("charts"))?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn save_report(&self, file_name: &str, doc: &ReportDocument) -> Result<PathBuf, ReportError> {
        let path = self.base_dir.join(file_name);
        std::fs::write(&path, doc.to_json()?)?;
        info!(path = %path.display(), queries = doc.queries.len(), "report saved");
        Ok(path)
    }

    pub fn load_report(&self, file_name: &str) -> Result<Option<ReportDocument>, ReportError> {
        let path = self.base_dir.join(file_name);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(path)?;
        Ok(Some(ReportDocument::from_json(&json)?))
    }

    /// Write each available chart to its own file; returns the paths written.
    pub fn save_charts(&self, charts: &ChartSet) -> Result<Vec<PathBuf>, ReportError> {
        let mut written = Vec::new();
        if let Some(c) = &charts.throughput {
            written.push(self.save_chart("throughput.json", c)?);
        }
        if let Some(c) = &charts.heavy_queries {
            written.push(self.save_chart("heavy_queries.json", c)?);
        }
        if let Some(c) = &charts.scatter {
            written.push(self.save_chart("latency_scatter.json", c)?);
        }
        Ok(written)
    }

    fn save_chart<T: Serialize>(&self, file_name: &str, chart: &T) -> Result<PathBuf, ReportError> {
        let path = self.base_dir.join("charts").join(file_name);
        std::fs::write(&path, serde_json::to_string_pretty(chart)?)?;
        info!(path = %path.display(), "chart dataset saved");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::{ScatterChart, ScatterPoint};

    #[test]
    fn creates_directories_and_writes_charts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path().join("out")).unwrap();
        assert!(store.base_dir().join("charts").is_dir());

        let charts = ChartSet {
            scatter: Some(ScatterChart {
                title: "t".into(),
                x_label: "x".into(),
                y_label: "y".into(),
                points: vec![ScatterPoint {
                    query_id: "a".into(),
                    reference_ms: 1.0,
                    primary_ms: 2.0,
                }],
                limit: 2.0,
            }),
            ..ChartSet::default()
        };
        let written = store.save_charts(&charts).unwrap();
        assert_eq!(written.len(), 1);
        assert!(written[0].ends_with("charts/latency_scatter.json"));
    }

    #[test]
    fn missing_report_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path()).unwrap();
        assert!(store.load_report("nope.json").unwrap().is_none());
    }
}
