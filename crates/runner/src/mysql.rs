//! MySQL-protocol target backed by a single `sqlx` connection.
//!
//! Statements are passed to the connection as bare `&str` with no bound
//! arguments, which sqlx sends over the text protocol (no prepare step), so
//! the server sees the SQL exactly as authored in the catalog.

use std::time::Duration;

use async_trait::async_trait;
use dbparity_core::config::TargetConfig;
use dbparity_core::TargetRole;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlDatabaseError};
use sqlx::{Connection, Executor, Row};
use tracing::{debug, info, warn};

use crate::target::{SqlTarget, TargetConnector, TargetError};

impl From<sqlx::Error> for TargetError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => match db.try_downcast_ref::<MySqlDatabaseError>() {
                Some(my) => TargetError::Database {
                    code: my.number(),
                    sqlstate: my.code().unwrap_or("HY000").to_string(),
                    message: my.message().to_string(),
                },
                None => TargetError::Driver(db.message().to_string()),
            },
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => TargetError::Connection(err.to_string()),
            _ => TargetError::Driver(err.to_string()),
        }
    }
}

pub struct MySqlTarget {
    role: TargetRole,
    config: TargetConfig,
    conn: Option<MySqlConnection>,
}

impl MySqlTarget {
    /// Open a session and disable autocommit on it.
    pub async fn connect(role: TargetRole, config: &TargetConfig) -> Result<Self, TargetError> {
        let conn = open_session(config).await?;
        info!(
            target_role = %role,
            name = %config.name,
            host = %config.host,
            port = config.port,
            database = %config.database,
            "connected"
        );
        Ok(Self {
            role,
            config: config.clone(),
            conn: Some(conn),
        })
    }

    fn conn(&mut self) -> Result<&mut MySqlConnection, TargetError> {
        self.conn
            .as_mut()
            .ok_or_else(|| TargetError::Connection("connection is closed".into()))
    }
}

async fn open_session(config: &TargetConfig) -> Result<MySqlConnection, TargetError> {
    let options = MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.database);

    let timeout = Duration::from_secs(u64::from(config.connect_timeout_secs));
    let mut conn = tokio::time::timeout(timeout, MySqlConnection::connect_with(&options))
        .await
        .map_err(|_| {
            TargetError::Connection(format!(
                "timed out after {}s connecting to {}:{}",
                config.connect_timeout_secs, config.host, config.port
            ))
        })??;

    conn.execute("SET autocommit=0").await?;
    Ok(conn)
}

#[async_trait]
impl SqlTarget for MySqlTarget {
    fn role(&self) -> TargetRole {
        self.role
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    async fn ping(&mut self) -> Result<(), TargetError> {
        self.conn()?.ping().await?;
        Ok(())
    }

    async fn reconnect(&mut self) -> Result<(), TargetError> {
        if let Some(old) = self.conn.take() {
            // The old session is usually dead already.
            let _ = old.close().await;
        }
        self.conn = Some(open_session(&self.config).await?);
        debug!(target_role = %self.role, "reconnected");
        Ok(())
    }

    async fn fetch_count(&mut self, sql: &str) -> Result<u64, TargetError> {
        let rows = self.conn()?.fetch_all(sql).await?;
        Ok(rows.len() as u64)
    }

    async fn fetch_scalar(&mut self, sql: &str) -> Result<Option<String>, TargetError> {
        let row = self.conn()?.fetch_optional(sql).await?;
        let Some(row) = row else {
            return Ok(None);
        };
        // System variables come back as either VARCHAR or binary strings.
        let raw: Option<Vec<u8>> = row.try_get(0)?;
        Ok(raw.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    async fn execute(&mut self, sql: &str) -> Result<u64, TargetError> {
        let done = self.conn()?.execute(sql).await?;
        Ok(done.rows_affected())
    }

    async fn commit(&mut self) -> Result<(), TargetError> {
        self.conn()?.execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), TargetError> {
        self.conn()?.execute("ROLLBACK").await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TargetError> {
        match self.conn.take() {
            Some(conn) => {
                if let Err(e) = conn.close().await {
                    warn!(target_role = %self.role, error = %e, "error while closing connection");
                }
                info!(target_role = %self.role, name = %self.config.name, "connection closed");
            }
            None => debug!(target_role = %self.role, "already closed"),
        }
        Ok(())
    }
}

/// Opens fresh [`MySqlTarget`] sessions for one endpoint.
pub struct MySqlConnector {
    role: TargetRole,
    config: TargetConfig,
}

impl MySqlConnector {
    pub fn new(role: TargetRole, config: TargetConfig) -> Self {
        Self { role, config }
    }
}

#[async_trait]
impl TargetConnector for MySqlConnector {
    fn role(&self) -> TargetRole {
        self.role
    }

    async fn connect(&self) -> Result<Box<dyn SqlTarget>, TargetError> {
        let target = MySqlTarget::connect(self.role, &self.config).await?;
        Ok(Box::new(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_map_to_connection_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = TargetError::from(sqlx::Error::Io(io));
        assert!(matches!(err, TargetError::Connection(ref m) if m.contains("refused")), "{:?}", err);
        assert_eq!(err.code(), None);
    }

    #[test]
    fn pool_timeouts_map_to_connection_errors() {
        assert!(matches!(
            TargetError::from(sqlx::Error::PoolTimedOut),
            TargetError::Connection(_)
        ));
    }

    #[test]
    fn protocol_errors_map_to_driver_errors() {
        let err = TargetError::from(sqlx::Error::Protocol("unexpected packet".into()));
        assert!(matches!(err, TargetError::Driver(ref m) if m.contains("unexpected packet")), "{:?}", err);
    }

    #[test]
    fn closed_target_reports_connection_error() {
        let mut target = MySqlTarget {
            role: TargetRole::Primary,
            config: TargetConfig {
                name: "OpenHalo".into(),
                host: "localhost".into(),
                port: 3306,
                user: "halo".into(),
                password: "halo".into(),
                database: "testdb".into(),
                enabled: true,
                connect_timeout_secs: 1,
            },
            conn: None,
        };
        assert!(matches!(target.conn(), Err(TargetError::Connection(_))));
    }
}
