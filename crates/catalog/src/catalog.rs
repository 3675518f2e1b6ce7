use std::collections::HashSet;
use std::path::Path;

use dbparity_core::TargetRole;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::CatalogError;
use crate::generator::{GeneratorKind, QueryGenerator};
use crate::schema::TableSchema;

const BUILTIN_CATALOG: &str = include_str!("../data/default.yml");

// ── Declarative model (YAML) ──────────────────────────────────

/// A query catalog as authored in YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Tables available to `generate` blocks. Empty means the built-in set.
    #[serde(default)]
    pub tables: Vec<TableSchema>,
    /// Category label -> query id prefixes, used by the per-category breakdown.
    #[serde(default)]
    pub categories: Vec<CategorySpec>,
    #[serde(default)]
    pub charts: ChartSpec,
    #[serde(default)]
    pub sections: Vec<Section>,
}

fn default_version() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySpec {
    pub name: String,
    pub prefixes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSpec {
    /// Query ids plotted in the grouped per-query bar chart.
    #[serde(default = "default_heavy_queries")]
    pub heavy_queries: Vec<String>,
}

impl Default for ChartSpec {
    fn default() -> Self {
        Self {
            heavy_queries: default_heavy_queries(),
        }
    }
}

fn default_heavy_queries() -> Vec<String> {
    ["md_6.1", "md_6.2", "md_11.2", "md_3.4", "md_10.1"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    #[serde(default)]
    pub entries: Vec<EntrySpec>,
    #[serde(default, alias = "generated")]
    pub generate: Vec<GenerateSpec>,
}

/// A statically authored catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySpec {
    pub id: String,
    pub category: String,
    pub sql: String,
    /// Replacement text sent to the reference target only.
    #[serde(default)]
    pub reference_sql: Option<String>,
    /// Targets that must not execute this entry.
    #[serde(default)]
    pub skip: Vec<TargetRole>,
    /// Best-effort setup statements run on each target before the entry.
    #[serde(default)]
    pub prepare: Vec<String>,
    /// Execute exactly once per target: no warm-up, one timed run.
    #[serde(default)]
    pub once: bool,
}

/// A block of generator-synthesized entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateSpec {
    pub kind: GeneratorKind,
    pub table: String,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub id_prefix: Option<String>,
}

fn default_count() -> u32 {
    1
}

impl GenerateSpec {
    fn prefix(&self) -> &str {
        if let Some(p) = &self.id_prefix {
            return p;
        }
        match self.kind {
            GeneratorKind::Select => "dyn_sel",
            GeneratorKind::Aggregation => "dyn_agg",
            GeneratorKind::ComplexWhere => "dyn_cplx",
            GeneratorKind::ScalarFunction => "dyn_func",
            GeneratorKind::Subquery => "dyn_sub",
            GeneratorKind::DmlLifecycle => "dyn_dml",
        }
    }
}

// ── Planned queries ───────────────────────────────────────────

/// One concrete query ready for the dual executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogQuery {
    pub id: String,
    pub category: String,
    pub sql: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_sql: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skip: Vec<TargetRole>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prepare: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub once: bool,
}

impl CatalogQuery {
    pub fn new(id: impl Into<String>, category: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            sql: sql.into(),
            reference_sql: None,
            skip: Vec::new(),
            prepare: Vec::new(),
            once: false,
        }
    }

    pub fn run_once(mut self) -> Self {
        self.once = true;
        self
    }

    pub fn skip_on(mut self, role: TargetRole) -> Self {
        if !self.skip.contains(&role) {
            self.skip.push(role);
        }
        self
    }

    /// SQL text to send to `role`.
    pub fn sql_for(&self, role: TargetRole) -> &str {
        match (role, &self.reference_sql) {
            (TargetRole::Reference, Some(sql)) => sql,
            _ => &self.sql,
        }
    }

    pub fn is_skipped(&self, role: TargetRole) -> bool {
        self.skip.contains(&role)
    }
}

impl From<&EntrySpec> for CatalogQuery {
    fn from(e: &EntrySpec) -> Self {
        Self {
            id: e.id.clone(),
            category: e.category.clone(),
            sql: e.sql.clone(),
            reference_sql: e.reference_sql.clone(),
            skip: e.skip.clone(),
            prepare: e.prepare.clone(),
            once: e.once,
        }
    }
}

// ── Loading & planning ────────────────────────────────────────

impl Catalog {
    /// The catalog shipped with the binary.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_yaml_str(BUILTIN_CATALOG)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_yaml::from_str(yaml)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let yaml = std::fs::read_to_string(path)?;
        let catalog = Self::from_yaml_str(&yaml)?;
        info!(path = %path.display(), sections = catalog.sections.len(), "loaded query catalog");
        Ok(catalog)
    }

    /// Load `path` if given, otherwise the built-in catalog.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            Some(p) => Self::load(p),
            None => Self::builtin(),
        }
    }

    /// Static checks: known tables, non-empty entries, no duplicate static ids.
    pub fn validate(&self) -> Result<(), CatalogError> {
        for table in &self.tables {
            table.validate()?;
        }

        let mut seen = HashSet::new();
        for section in &self.sections {
            for entry in &section.entries {
                if entry.id.trim().is_empty() {
                    return Err(CatalogError::InvalidEntry {
                        id: entry.id.clone(),
                        reason: "empty id".into(),
                    });
                }
                if entry.sql.trim().is_empty() {
                    return Err(CatalogError::InvalidEntry {
                        id: entry.id.clone(),
                        reason: "empty sql".into(),
                    });
                }
                if !seen.insert(entry.id.as_str()) {
                    return Err(CatalogError::DuplicateId(entry.id.clone()));
                }
            }
            for block in &section.generate {
                self.table(&block.table)?;
            }
        }
        Ok(())
    }

    /// Resolve a table by name, falling back to the built-in schemas.
    pub fn table(&self, name: &str) -> Result<TableSchema, CatalogError> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .cloned()
            .or_else(|| TableSchema::builtin().into_iter().find(|t| t.name == name))
            .ok_or_else(|| CatalogError::UnknownTable(name.to_string()))
    }

    /// Expand the catalog into concrete queries in authored order.
    ///
    /// Generated ids are `{prefix}_{nn}`; each DML lifecycle step adds a
    /// `_{step}` suffix.
    pub fn plan(&self, generator: &mut QueryGenerator) -> Result<Vec<CatalogQuery>, CatalogError> {
        let mut queries = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        let mut push = |q: CatalogQuery, queries: &mut Vec<CatalogQuery>| {
            if !seen.insert(q.id.clone()) {
                return Err(CatalogError::DuplicateId(q.id));
            }
            queries.push(q);
            Ok(())
        };

        for section in &self.sections {
            debug!(section = %section.title, "planning section");
            for entry in &section.entries {
                push(CatalogQuery::from(entry), &mut queries)?;
            }

            for block in &section.generate {
                let table = self.table(&block.table)?;
                let prefix = block.prefix();
                for i in 1..=block.count {
                    let generated = generator.generate(block.kind, &table)?;
                    let multi_step = generated.len() > 1;
                    for (step, g) in generated.into_iter().enumerate() {
                        let id = if multi_step {
                            format!("{}_{:02}_{}", prefix, i, step + 1)
                        } else {
                            format!("{}_{:02}", prefix, i)
                        };
                        push(CatalogQuery::new(id, g.label, g.sql), &mut queries)?;
                    }
                }
            }
        }

        info!(
            queries = queries.len(),
            seed = generator.seed(),
            "catalog planned"
        );
        Ok(queries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"
version: 1
categories:
  - name: Simple SELECT
    prefixes: ["md_1.", "dyn_sel"]
sections:
  - title: Basic
    entries:
      - id: md_1.1
        category: Simple Field Query
        sql: SELECT nconst FROM name_basics LIMIT 10;
      - id: prob_8
        category: HANDLER OPEN
        sql: HANDLER name_basics OPEN;
        skip: [primary]
      - id: md_12.1
        category: Export
        sql: SELECT * FROM name_basics LIMIT 5;
        reference_sql: SELECT * FROM mydb.name_basics LIMIT 5;
        prepare: ["DROP INDEX idx_x ON name_basics;"]
        once: true
    generate:
      - kind: select
        table: name_basics
        count: 3
      - kind: dml_lifecycle
        table: films
"#;

    #[test]
    fn plan_expands_entries_and_generators_in_order() {
        let catalog = Catalog::from_yaml_str(SMALL).unwrap();
        let mut g = QueryGenerator::from_seed(5);
        let plan = catalog.plan(&mut g).unwrap();

        let ids: Vec<&str> = plan.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "md_1.1", "prob_8", "md_12.1", "dyn_sel_01", "dyn_sel_02", "dyn_sel_03",
                "dyn_dml_01_1", "dyn_dml_01_2", "dyn_dml_01_3", "dyn_dml_01_4",
            ]
        );
        assert!(plan[1].is_skipped(TargetRole::Primary));
        assert!(!plan[1].is_skipped(TargetRole::Reference));
        assert_eq!(plan[2].sql_for(TargetRole::Primary), "SELECT * FROM name_basics LIMIT 5;");
        assert_eq!(
            plan[2].sql_for(TargetRole::Reference),
            "SELECT * FROM mydb.name_basics LIMIT 5;"
        );
        assert_eq!(plan[2].prepare.len(), 1);
        assert!(plan[2].once);
        assert!(!plan[0].once);
        assert_eq!(catalog.charts.heavy_queries.len(), 5);
    }

    #[test]
    fn plan_is_reproducible_for_a_seed() {
        let catalog = Catalog::from_yaml_str(SMALL).unwrap();
        let a = catalog.plan(&mut QueryGenerator::from_seed(9)).unwrap();
        let b = catalog.plan(&mut QueryGenerator::from_seed(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn duplicate_static_ids_are_rejected() {
        let yaml = r#"
sections:
  - title: Dupes
    entries:
      - { id: a, category: x, sql: "SELECT 1;" }
      - { id: a, category: y, sql: "SELECT 2;" }
"#;
        match Catalog::from_yaml_str(yaml) {
            Err(CatalogError::DuplicateId(id)) => assert_eq!(id, "a"),
            other => panic!("expected duplicate id error, got {:?}", other),
        }
    }

    #[test]
    fn generated_ids_colliding_with_static_are_rejected() {
        let yaml = r#"
sections:
  - title: Clash
    entries:
      - { id: dyn_sub_01, category: x, sql: "SELECT 1;" }
    generate:
      - { kind: subquery, table: name_basics }
"#;
        let catalog = Catalog::from_yaml_str(yaml).unwrap();
        let err = catalog.plan(&mut QueryGenerator::from_seed(1)).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateId(_)));
    }

    #[test]
    fn unknown_generator_table_is_rejected() {
        let yaml = r#"
sections:
  - title: Missing
    generate:
      - { kind: select, table: nope }
"#;
        assert!(matches!(
            Catalog::from_yaml_str(yaml),
            Err(CatalogError::UnknownTable(_))
        ));
    }

    #[test]
    fn builtin_catalog_loads_and_plans() {
        let catalog = Catalog::builtin().unwrap();
        let plan = catalog.plan(&mut QueryGenerator::from_seed(2025)).unwrap();
        assert!(plan.len() > 90);
        assert!(plan.iter().any(|q| q.id == "md_1.1"));
        assert!(plan.iter().any(|q| q.id.starts_with("prob_")));
        assert!(plan.iter().any(|q| q.id.starts_with("dyn_dml")));
        assert!(!catalog.categories.is_empty());
        for id in &catalog.charts.heavy_queries {
            assert!(plan.iter().any(|q| &q.id == id), "missing chart query {}", id);
        }
    }

    #[test]
    fn builtin_export_runs_once_into_a_resolved_directory() {
        let catalog = Catalog::builtin().unwrap();
        let plan = catalog.plan(&mut QueryGenerator::from_seed(1)).unwrap();
        let export = plan.iter().find(|q| q.id == "md_12.1").unwrap();
        assert!(export.once);
        for role in TargetRole::ALL {
            let sql = export.sql_for(role);
            assert!(sql.contains("INTO OUTFILE '{export_dir}"), "{}", sql);
            assert!(sql.contains("{run_tag}"), "{}", sql);
        }
    }
}
