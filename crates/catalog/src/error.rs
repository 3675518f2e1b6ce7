use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("duplicate query id '{0}'")]
    DuplicateId(String),

    #[error("unknown table '{0}' in generate block")]
    UnknownTable(String),

    #[error("table '{table}' is invalid: {reason}")]
    InvalidTable { table: String, reason: String },

    #[error("entry '{id}' is invalid: {reason}")]
    InvalidEntry { id: String, reason: String },
}
