//! The seam between the harness and a SQL endpoint.
//!
//! [`SqlTarget`] is one open connection with autocommit disabled. The dual
//! executor, the stress run and the bulk benchmark only talk to this trait,
//! so they run unchanged against MySQL ([`crate::mysql`]) or test doubles.

use dbparity_core::TargetRole;

/// Errors raised by a target connection.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TargetError {
    /// The server rejected the statement with a MySQL error number.
    #[error("{code} ({sqlstate}): {message}")]
    Database {
        code: u16,
        sqlstate: String,
        message: String,
    },

    /// Could not reach the server, or the connection was lost or closed.
    #[error("connection error: {0}")]
    Connection(String),

    /// Any other driver failure (protocol, decoding, unexpected state).
    #[error("{0}")]
    Driver(String),
}

impl TargetError {
    /// MySQL error number, when the server supplied one.
    pub fn code(&self) -> Option<u16> {
        match self {
            TargetError::Database { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Build a server error from its parts.
    pub fn database(code: u16, sqlstate: impl Into<String>, message: impl Into<String>) -> Self {
        TargetError::Database {
            code,
            sqlstate: sqlstate.into(),
            message: message.into(),
        }
    }
}

/// One open connection to a SQL endpoint.
///
/// Implementations keep autocommit disabled: every statement runs in an
/// implicit transaction that the caller closes with [`commit`](Self::commit)
/// or [`rollback`](Self::rollback).
#[async_trait::async_trait]
pub trait SqlTarget: Send {
    /// Which side of the comparison this connection serves.
    fn role(&self) -> TargetRole;

    /// Display name of the endpoint (e.g. "OpenHalo", "MySQL").
    fn name(&self) -> &str;

    /// Cheap liveness check.
    async fn ping(&mut self) -> Result<(), TargetError>;

    /// Drop the current session (if any) and open a fresh one.
    async fn reconnect(&mut self) -> Result<(), TargetError>;

    /// Run a statement, materialize every returned row and report how many
    /// there were. Statements without a result set report zero.
    async fn fetch_count(&mut self, sql: &str) -> Result<u64, TargetError>;

    /// First column of the first row as text; `None` for no row or NULL.
    async fn fetch_scalar(&mut self, _sql: &str) -> Result<Option<String>, TargetError> {
        Ok(None)
    }

    /// Run a statement for its side effects; returns the affected row count.
    async fn execute(&mut self, sql: &str) -> Result<u64, TargetError>;

    async fn commit(&mut self) -> Result<(), TargetError>;

    async fn rollback(&mut self) -> Result<(), TargetError>;

    /// Close the session. Closing an already-closed target is not an error.
    async fn close(&mut self) -> Result<(), TargetError>;
}

/// Opens new connections to one endpoint. Used by workloads that need a
/// connection per worker.
#[async_trait::async_trait]
pub trait TargetConnector: Send + Sync {
    fn role(&self) -> TargetRole;

    async fn connect(&self) -> Result<Box<dyn SqlTarget>, TargetError>;
}
