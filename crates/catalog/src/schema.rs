use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Column layout of a table the generator is allowed to target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<String>,
    /// Subset of `columns` holding numbers (years, ratings).
    pub numeric: Vec<String>,
    /// Subset of `columns` holding text.
    pub string: Vec<String>,
    /// String primary key used by the DML lifecycle generator.
    #[serde(default)]
    pub key_column: Option<String>,
    /// Prefix for generated key values, e.g. `nm99` -> `nm9912345`.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_key_prefix() -> String {
    "id99".to_string()
}

impl TableSchema {
    /// Check the invariants the generator relies on.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let fail = |reason: &str| {
            Err(CatalogError::InvalidTable {
                table: self.name.clone(),
                reason: reason.to_string(),
            })
        };
        if self.columns.is_empty() {
            return fail("no columns");
        }
        if self.numeric.is_empty() {
            return fail("no numeric columns");
        }
        if self.string.is_empty() {
            return fail("no string columns");
        }
        for col in self.numeric.iter().chain(&self.string) {
            if !self.columns.contains(col) {
                return fail(&format!("typed column '{}' is not in columns", col));
            }
        }
        if let Some(key) = &self.key_column {
            if !self.string.contains(key) {
                return fail("key_column must be a string column");
            }
        }
        Ok(())
    }

    pub fn is_numeric(&self, column: &str) -> bool {
        self.numeric.iter().any(|c| c == column)
    }

    /// The IMDb-style people table every built-in scenario targets.
    pub fn name_basics() -> Self {
        Self {
            name: "name_basics".into(),
            columns: strings(&[
                "nconst",
                "primaryname",
                "birthyear",
                "deathyear",
                "primaryprofession",
                "knownfortitles",
            ]),
            numeric: strings(&["birthyear", "deathyear"]),
            string: strings(&["nconst", "primaryname", "primaryprofession", "knownfortitles"]),
            key_column: Some("nconst".into()),
            key_prefix: "nm99".into(),
        }
    }

    pub fn films() -> Self {
        Self {
            name: "films".into(),
            columns: strings(&["film_id", "title", "release_year", "rating", "genre"]),
            numeric: strings(&["release_year", "rating"]),
            string: strings(&["film_id", "title", "genre"]),
            key_column: Some("film_id".into()),
            key_prefix: "tt99".into(),
        }
    }

    pub fn builtin() -> Vec<Self> {
        vec![Self::name_basics(), Self::films()]
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_tables_are_valid() {
        for table in TableSchema::builtin() {
            table.validate().expect("builtin table should validate");
        }
    }

    #[test]
    fn typed_column_must_exist() {
        let mut t = TableSchema::films();
        t.numeric.push("budget".into());
        let err = t.validate().unwrap_err();
        assert!(err.to_string().contains("budget"));
    }

    #[test]
    fn key_column_must_be_string() {
        let mut t = TableSchema::films();
        t.key_column = Some("rating".into());
        assert!(t.validate().is_err());
    }
}
