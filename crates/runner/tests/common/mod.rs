#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dbparity_core::TargetRole;
use dbparity_runner::{SqlTarget, TargetConnector, TargetError};

pub type Journal = Arc<Mutex<Vec<String>>>;

/// In-memory target that records every call and fails statements whose text
/// contains a configured needle.
pub struct ScriptedTarget {
    pub role: TargetRole,
    pub journal: Journal,
    pub failures: Vec<(String, TargetError)>,
    pub rows: u64,
    pub delay: Duration,
    pub ping_failures: u32,
    pub fail_close: bool,
    pub scalar: Option<String>,
}

impl ScriptedTarget {
    pub fn new(role: TargetRole) -> Self {
        Self {
            role,
            journal: Arc::new(Mutex::new(Vec::new())),
            failures: Vec::new(),
            rows: 0,
            delay: Duration::ZERO,
            ping_failures: 0,
            fail_close: false,
            scalar: None,
        }
    }

    pub fn scalar(mut self, value: &str) -> Self {
        self.scalar = Some(value.to_string());
        self
    }

    pub fn rows(mut self, rows: u64) -> Self {
        self.rows = rows;
        self
    }

    pub fn fail_when(mut self, needle: &str, err: TargetError) -> Self {
        self.failures.push((needle.to_string(), err));
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn journal(&self) -> Journal {
        Arc::clone(&self.journal)
    }

    fn record(&self, entry: String) {
        self.journal.lock().unwrap().push(entry);
    }

    fn check(&self, sql: &str) -> Result<(), TargetError> {
        match self.failures.iter().find(|(needle, _)| sql.contains(needle.as_str())) {
            Some((_, err)) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl SqlTarget for ScriptedTarget {
    fn role(&self) -> TargetRole {
        self.role
    }

    fn name(&self) -> &str {
        match self.role {
            TargetRole::Primary => "Primary",
            TargetRole::Reference => "Reference",
        }
    }

    async fn ping(&mut self) -> Result<(), TargetError> {
        self.record("ping".into());
        if self.ping_failures > 0 {
            self.ping_failures -= 1;
            return Err(TargetError::Connection("gone away".into()));
        }
        Ok(())
    }

    async fn reconnect(&mut self) -> Result<(), TargetError> {
        self.record("reconnect".into());
        Ok(())
    }

    async fn fetch_count(&mut self, sql: &str) -> Result<u64, TargetError> {
        self.record(format!("fetch:{}", sql));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.check(sql)?;
        Ok(self.rows)
    }

    async fn fetch_scalar(&mut self, sql: &str) -> Result<Option<String>, TargetError> {
        self.record(format!("scalar:{}", sql));
        self.check(sql)?;
        Ok(self.scalar.clone())
    }

    async fn execute(&mut self, sql: &str) -> Result<u64, TargetError> {
        self.record(format!("exec:{}", sql));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.check(sql)?;
        Ok(1)
    }

    async fn commit(&mut self) -> Result<(), TargetError> {
        self.record("commit".into());
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), TargetError> {
        self.record("rollback".into());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TargetError> {
        self.record("close".into());
        if self.fail_close {
            return Err(TargetError::Connection("already gone".into()));
        }
        Ok(())
    }
}

/// Hands out [`ScriptedTarget`]s; the first `refuse` connects fail.
pub struct ScriptedConnector {
    pub role: TargetRole,
    pub refuse: AtomicU32,
    pub delay: Duration,
    pub connects: AtomicU32,
}

impl ScriptedConnector {
    pub fn new(role: TargetRole, refuse: u32, delay: Duration) -> Self {
        Self {
            role,
            refuse: AtomicU32::new(refuse),
            delay,
            connects: AtomicU32::new(0),
        }
    }
}

#[async_trait::async_trait]
impl TargetConnector for ScriptedConnector {
    fn role(&self) -> TargetRole {
        self.role
    }

    async fn connect(&self) -> Result<Box<dyn SqlTarget>, TargetError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TargetError::Connection("connection refused".into()));
        }
        Ok(Box::new(ScriptedTarget::new(self.role).rows(1).delay(self.delay)))
    }
}

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}
