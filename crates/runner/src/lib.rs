//! Execution layer: connections, the dual executor, and the stress and bulk
//! workloads.

pub mod bulk;
pub mod classify;
pub mod executor;
pub mod mysql;
pub mod stress;
pub mod target;

pub use bulk::{BulkInsertBench, BulkSummary};
pub use classify::{classify_latency, ClassifierRule, ErrorClassifier, ErrorPredicate};
pub use executor::{DualExecutor, ExecutorSettings, EXPORT_DIR_PLACEHOLDER, RUN_TAG_PLACEHOLDER};
pub use mysql::{MySqlConnector, MySqlTarget};
pub use stress::{StressRunner, StressSummary};
pub use target::{SqlTarget, TargetConnector, TargetError};
