pub mod catalog;
pub mod error;
pub mod generator;
pub mod manifest;
pub mod schema;

pub use catalog::{Catalog, CatalogQuery, CategorySpec, ChartSpec, EntrySpec, GenerateSpec, Section};
pub use error::CatalogError;
pub use generator::{GeneratedQuery, GeneratorKind, QueryGenerator, SelectMode};
pub use manifest::PlanManifest;
pub use schema::TableSchema;
