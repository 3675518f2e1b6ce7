//! Aggregation and output: the cross-target comparison, the text summary,
//! the JSON report document and chart datasets.

pub mod aggregate;
pub mod charts;
pub mod document;
pub mod error;
pub mod store;
pub mod summary;

pub use aggregate::{CategoryRow, Comparison, CompatGap, DeltaLabel, ExecutionCounts, Lead, SlowQuery, Win, WinBasis};
pub use charts::{build_charts, ChartSet, TargetNames};
pub use document::{ReportDocument, RunMeta};
pub use error::ReportError;
pub use store::ReportStore;
pub use summary::{render_summary, render_workloads, SummaryOptions};
