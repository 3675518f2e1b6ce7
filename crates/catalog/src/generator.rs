//! Seeded random query generation.
//!
//! Every random choice goes through the generator's own [`StdRng`], so a run
//! driven by the same seed and catalog produces the same SQL text. The seed is
//! recorded in the report to make synthetic runs reproducible.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::schema::TableSchema;

/// Default LIMIT for generated filters, functions and subqueries.
const DEFAULT_LIMIT: u32 = 10;

/// Scenario families the generator knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKind {
    Select,
    Aggregation,
    ComplexWhere,
    ScalarFunction,
    Subquery,
    /// INSERT -> UPDATE -> SELECT -> DELETE on one generated key.
    DmlLifecycle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectMode {
    Star,
    Single,
    Multi,
    Random,
}

impl SelectMode {
    fn label(self) -> &'static str {
        match self {
            SelectMode::Star => "star",
            SelectMode::Single => "single",
            SelectMode::Multi => "multi",
            SelectMode::Random => "random",
        }
    }
}

/// A generated statement with a human-readable description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedQuery {
    pub label: String,
    pub sql: String,
}

impl GeneratedQuery {
    fn new(label: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            sql: sql.into(),
        }
    }
}

pub struct QueryGenerator {
    rng: StdRng,
    seed: u64,
}

impl QueryGenerator {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Produce one scenario of `kind`. Most kinds yield a single statement;
    /// the DML lifecycle yields its four ordered steps.
    pub fn generate(
        &mut self,
        kind: GeneratorKind,
        table: &TableSchema,
    ) -> Result<Vec<GeneratedQuery>, CatalogError> {
        table.validate()?;
        let q = match kind {
            GeneratorKind::Select => {
                let limit = self.rng.gen_range(5..=50);
                self.select(table, SelectMode::Random, limit)
            }
            GeneratorKind::Aggregation => self.aggregation(table),
            GeneratorKind::ComplexWhere => self.complex_where(table, DEFAULT_LIMIT),
            GeneratorKind::ScalarFunction => self.scalar_function(table, DEFAULT_LIMIT),
            GeneratorKind::Subquery => self.subquery(table, DEFAULT_LIMIT),
            GeneratorKind::DmlLifecycle => return self.dml_lifecycle(table),
        };
        Ok(vec![q])
    }

    pub fn select(&mut self, table: &TableSchema, mode: SelectMode, limit: u32) -> GeneratedQuery {
        let mode = match mode {
            SelectMode::Random => {
                *pick(&mut self.rng, &[SelectMode::Star, SelectMode::Single, SelectMode::Multi])
            }
            other => other,
        };

        let selected = match mode {
            SelectMode::Single => pick(&mut self.rng, &table.columns).clone(),
            SelectMode::Multi => {
                let n = self.rng.gen_range(2..=table.columns.len().max(2));
                table
                    .columns
                    .choose_multiple(&mut self.rng, n)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            }
            _ => "*".to_string(),
        };

        let mut sql = format!("SELECT {} FROM {}", selected, table.name);
        if self.rng.gen::<f64>() > 0.7 {
            sql.push_str(&self.where_clause(table));
        }
        if self.rng.gen::<f64>() > 0.7 {
            let col = pick(&mut self.rng, &table.columns).clone();
            let dir = *pick(&mut self.rng, &["ASC", "DESC"]);
            sql.push_str(&format!(" ORDER BY {} {}", col, dir));
        }
        sql.push_str(&format!(" LIMIT {};", limit));

        GeneratedQuery::new(format!("Dynamic SELECT ({})", mode.label()), sql)
    }

    pub fn aggregation(&mut self, table: &TableSchema) -> GeneratedQuery {
        let func = *pick(&mut self.rng, &["COUNT", "MIN", "MAX"]);
        let col = pick(&mut self.rng, &table.columns).clone();
        let group_col = pick(&mut self.rng, &table.string).clone();

        if self.rng.gen_bool(0.5) {
            let sql = format!(
                "SELECT {g}, {f}({c}) FROM {t} GROUP BY {g} ORDER BY {f}({c}) DESC LIMIT 10;",
                g = group_col,
                f = func,
                c = col,
                t = table.name
            );
            GeneratedQuery::new(format!("Dynamic AGG ({} by {})", func, group_col), sql)
        } else {
            let sql = format!("SELECT {}({}) FROM {};", func, col, table.name);
            GeneratedQuery::new(format!("Dynamic AGG Simple ({})", func), sql)
        }
    }

    pub fn complex_where(&mut self, table: &TableSchema, limit: u32) -> GeneratedQuery {
        let col = pick(&mut self.rng, &table.columns).clone();
        let mode = *pick(&mut self.rng, &["IN", "BETWEEN", "OR_MIX"]);

        let (label, predicate) = match mode {
            "IN" => {
                let vals: Vec<String> = (0..3).map(|_| self.literal_for(table, &col)).collect();
                ("IN", format!("{} IN ({})", col, vals.join(", ")))
            }
            "BETWEEN" if table.is_numeric(&col) => {
                let start = self.rng.gen_range(1900..=1980);
                let end = start + self.rng.gen_range(5..=20);
                ("BETWEEN", format!("{} BETWEEN {} AND {}", col, start, end))
            }
            _ => {
                let col2 = pick(&mut self.rng, &table.columns).clone();
                let v1 = self.literal_for(table, &col);
                let v2 = self.literal_for(table, &col2);
                ("OR_MIX", format!("({} = {} OR {} = {})", col, v1, col2, v2))
            }
        };

        let sql = format!("SELECT * FROM {} WHERE {} LIMIT {};", table.name, predicate, limit);
        GeneratedQuery::new(format!("Dyn Complex Filter ({})", label), sql)
    }

    pub fn scalar_function(&mut self, table: &TableSchema, limit: u32) -> GeneratedQuery {
        let str_col = pick(&mut self.rng, &table.string).clone();
        let num_col = pick(&mut self.rng, &table.numeric).clone();

        let (label, sql) = if self.rng.gen_bool(0.5) {
            let funcs = [
                format!("LENGTH({})", str_col),
                format!("LOWER({})", str_col),
                format!("CONCAT({}, '_test')", str_col),
                format!("LEFT({}, 3)", str_col),
            ];
            let func = pick(&mut self.rng, &funcs);
            (
                "STRING",
                format!(
                    "SELECT {c}, {f} as res FROM {t} WHERE {c} IS NOT NULL LIMIT {l};",
                    c = str_col,
                    f = func,
                    t = table.name,
                    l = limit
                ),
            )
        } else {
            let calcs = [
                format!("({} * 2)", num_col),
                format!("({} % 10)", num_col),
                format!("ABS({} - 2000)", num_col),
            ];
            let calc = pick(&mut self.rng, &calcs);
            (
                "MATH",
                format!(
                    "SELECT {c}, {f} as math_res FROM {t} WHERE {c} IS NOT NULL LIMIT {l};",
                    c = num_col,
                    f = calc,
                    t = table.name,
                    l = limit
                ),
            )
        };

        GeneratedQuery::new(format!("Dyn Scalar Func ({})", label), sql)
    }

    pub fn subquery(&mut self, table: &TableSchema, limit: u32) -> GeneratedQuery {
        let col = pick(&mut self.rng, &table.numeric).clone();
        let sql = format!(
            "SELECT * FROM {t} WHERE {c} > (SELECT AVG({c}) FROM {t} WHERE {c} IS NOT NULL) LIMIT {l};",
            t = table.name,
            c = col,
            l = limit
        );
        GeneratedQuery::new("Dyn Subquery (Compare to AVG)", sql)
    }

    /// INSERT, UPDATE, SELECT and DELETE on a freshly generated key so the
    /// cycle never touches existing rows.
    pub fn dml_lifecycle(&mut self, table: &TableSchema) -> Result<Vec<GeneratedQuery>, CatalogError> {
        let key_col = table.key_column.as_deref().ok_or_else(|| CatalogError::InvalidTable {
            table: table.name.clone(),
            reason: "DML lifecycle requires a key_column".into(),
        })?;
        let name_col = table.string.iter().find(|c| c.as_str() != key_col);
        let year_col = &table.numeric[0];

        let key = format!("{}{}", table.key_prefix, self.rng.gen_range(10000..=99999));
        let name = format!("AutoTest_{}", self.rng.gen_range(1..=999));

        let (cols, vals) = match name_col {
            Some(n) => (
                format!("{}, {}, {}", key_col, n, year_col),
                format!("'{}', '{}', 2025", key, name),
            ),
            None => (format!("{}, {}", key_col, year_col), format!("'{}', 2025", key)),
        };

        Ok(vec![
            GeneratedQuery::new(
                format!("Dyn DML 1: INSERT {}", key),
                format!("INSERT INTO {} ({}) VALUES ({});", table.name, cols, vals),
            ),
            GeneratedQuery::new(
                format!("Dyn DML 2: UPDATE {}", key),
                format!(
                    "UPDATE {} SET {} = 2026 WHERE {} = '{}';",
                    table.name, year_col, key_col, key
                ),
            ),
            GeneratedQuery::new(
                format!("Dyn DML 3: SELECT {}", key),
                format!("SELECT * FROM {} WHERE {} = '{}';", table.name, key_col, key),
            ),
            GeneratedQuery::new(
                format!("Dyn DML 4: DELETE {}", key),
                format!("DELETE FROM {} WHERE {} = '{}';", table.name, key_col, key),
            ),
        ])
    }

    fn where_clause(&mut self, table: &TableSchema) -> String {
        let col = pick(&mut self.rng, &table.columns).clone();
        let op = if table.is_numeric(&col) {
            *pick(&mut self.rng, &[">", "<", "=", ">=", "<=", "!="])
        } else {
            *pick(&mut self.rng, &["=", "!=", "LIKE"])
        };
        let val = self.literal_for(table, &col);
        format!(" WHERE {} {} {}", col, op, val)
    }

    /// A plausible literal for a WHERE clause on `column`.
    fn literal_for(&mut self, table: &TableSchema, column: &str) -> String {
        if table.is_numeric(column) {
            self.rng.gen_range(1950..=2020).to_string()
        } else if column.contains("profession") {
            "'%actor%'".to_string()
        } else {
            "'TestValue'".to_string()
        }
    }
}

/// Uniform pick from a slice the caller has validated as non-empty.
fn pick<'a, T>(rng: &mut StdRng, items: &'a [T]) -> &'a T {
    &items[rng.gen_range(0..items.len())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sql() {
        let table = TableSchema::name_basics();
        let mut a = QueryGenerator::from_seed(42);
        let mut b = QueryGenerator::from_seed(42);
        for kind in [
            GeneratorKind::Select,
            GeneratorKind::Aggregation,
            GeneratorKind::ComplexWhere,
            GeneratorKind::ScalarFunction,
            GeneratorKind::Subquery,
            GeneratorKind::DmlLifecycle,
        ] {
            for _ in 0..5 {
                assert_eq!(
                    a.generate(kind, &table).unwrap(),
                    b.generate(kind, &table).unwrap()
                );
            }
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let table = TableSchema::name_basics();
        let mut a = QueryGenerator::from_seed(1);
        let mut b = QueryGenerator::from_seed(2);
        let sa: Vec<_> = (0..10).map(|_| a.select(&table, SelectMode::Random, 10).sql).collect();
        let sb: Vec<_> = (0..10).map(|_| b.select(&table, SelectMode::Random, 10).sql).collect();
        assert_ne!(sa, sb);
    }

    #[test]
    fn select_respects_mode_and_limit() {
        let table = TableSchema::films();
        let mut g = QueryGenerator::from_seed(7);
        let q = g.select(&table, SelectMode::Star, 25);
        assert!(q.sql.starts_with("SELECT * FROM films"));
        assert!(q.sql.ends_with(" LIMIT 25;"));
        assert_eq!(q.label, "Dynamic SELECT (star)");
    }

    #[test]
    fn generated_select_limit_in_range() {
        let table = TableSchema::name_basics();
        let mut g = QueryGenerator::from_seed(99);
        for _ in 0..50 {
            let q = g.generate(GeneratorKind::Select, &table).unwrap().remove(0);
            let limit: u32 = q
                .sql
                .rsplit("LIMIT ")
                .next()
                .unwrap()
                .trim_end_matches(';')
                .parse()
                .unwrap();
            assert!((5..=50).contains(&limit), "limit {} out of range", limit);
        }
    }

    #[test]
    fn subquery_uses_numeric_column() {
        let table = TableSchema::name_basics();
        let mut g = QueryGenerator::from_seed(3);
        let q = g.subquery(&table, 10);
        assert!(q.sql.contains("birthyear") || q.sql.contains("deathyear"));
        assert!(q.sql.contains("(SELECT AVG("));
    }

    #[test]
    fn dml_lifecycle_shares_one_key() {
        let table = TableSchema::name_basics();
        let mut g = QueryGenerator::from_seed(11);
        let steps = g.dml_lifecycle(&table).unwrap();
        assert_eq!(steps.len(), 4);
        assert!(steps[0].sql.starts_with("INSERT INTO name_basics"));
        assert!(steps[1].sql.starts_with("UPDATE"));
        assert!(steps[2].sql.starts_with("SELECT"));
        assert!(steps[3].sql.starts_with("DELETE"));

        let key = steps[0].label.rsplit(' ').next().unwrap();
        assert!(key.starts_with("nm99"));
        for step in &steps {
            assert!(step.sql.contains(key));
        }
    }

    #[test]
    fn dml_lifecycle_requires_key() {
        let mut table = TableSchema::films();
        table.key_column = None;
        let mut g = QueryGenerator::from_seed(0);
        assert!(g.dml_lifecycle(&table).is_err());
    }
}
