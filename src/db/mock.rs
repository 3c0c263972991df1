//! Mock connector for testing.
//!
//! Produces in-memory handles that record how often they were opened and
//! closed, with scripted failures at each stage.

use super::{Connector, DatabaseHandle, Engine, RawResultSet, Row, Schema};
use crate::classify::RawDbError;
use crate::config::ConnectionParameters;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared counters for handles produced by a [`MockConnector`].
#[derive(Debug, Clone, Default)]
pub struct MockStats {
    connect_attempts: Arc<AtomicUsize>,
    opens: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    executions: Arc<AtomicUsize>,
}

impl MockStats {
    /// Number of connect calls, successful or not.
    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    /// Number of handles handed out.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Number of handles closed (first close only).
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Number of statements executed.
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

/// Scripted outcomes for one mock connector.
#[derive(Debug, Default)]
struct Script {
    connect_failures: VecDeque<RawDbError>,
    probe_failures: VecDeque<RawDbError>,
    execute_failure: Option<RawDbError>,
    result: Option<RawResultSet>,
    schema: Option<Schema>,
}

/// A connector that returns in-memory handles.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    script: Arc<Mutex<Script>>,
    stats: MockStats,
}

impl MockConnector {
    /// Creates a connector whose handles echo the SQL back as a single row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the shared counters.
    pub fn stats(&self) -> MockStats {
        self.stats.clone()
    }

    /// Every execution returns this result set.
    pub fn with_result(self, result: RawResultSet) -> Self {
        self.script.lock().result = Some(result);
        self
    }

    /// Introspection returns this schema.
    pub fn with_schema(self, schema: Schema) -> Self {
        self.script.lock().schema = Some(schema);
        self
    }

    /// The next `times` connect calls fail with `error`.
    pub fn failing_connect(self, times: usize, error: RawDbError) -> Self {
        self.script
            .lock()
            .connect_failures
            .extend(std::iter::repeat(error).take(times));
        self
    }

    /// The next `times` probes fail with `error`.
    pub fn failing_probe(self, times: usize, error: RawDbError) -> Self {
        self.script
            .lock()
            .probe_failures
            .extend(std::iter::repeat(error).take(times));
        self
    }

    /// Every execution fails with `error`.
    pub fn failing_execute(self, error: RawDbError) -> Self {
        self.script.lock().execute_failure = Some(error);
        self
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        params: &ConnectionParameters,
    ) -> Result<Box<dyn DatabaseHandle>, RawDbError> {
        self.stats.connect_attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.script.lock().connect_failures.pop_front() {
            return Err(error);
        }

        self.stats.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockHandle {
            engine: params.engine(),
            script: Arc::clone(&self.script),
            stats: self.stats.clone(),
            closed: false,
        }))
    }
}

struct MockHandle {
    engine: Engine,
    script: Arc<Mutex<Script>>,
    stats: MockStats,
    closed: bool,
}

impl MockHandle {
    fn ensure_open(&self) -> Result<(), RawDbError> {
        if self.closed {
            Err(RawDbError::new(
                Some("PROTOCOL_CONNECTION_LOST"),
                "Handle already closed",
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DatabaseHandle for MockHandle {
    fn engine(&self) -> Engine {
        self.engine
    }

    async fn probe(&mut self) -> Result<(), RawDbError> {
        self.ensure_open()?;
        match self.script.lock().probe_failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn execute(&mut self, sql: &str) -> Result<RawResultSet, RawDbError> {
        self.ensure_open()?;
        self.stats.executions.fetch_add(1, Ordering::SeqCst);

        let script = self.script.lock();
        if let Some(error) = &script.execute_failure {
            return Err(error.clone());
        }
        if let Some(result) = &script.result {
            return Ok(result.clone());
        }

        let mut row = Row::new();
        row.insert(
            "result".to_string(),
            serde_json::Value::String(format!("Mock result for: {sql}")),
        );
        Ok(RawResultSet::new(vec![row], Some(vec!["result".to_string()])))
    }

    async fn introspect_schema(&mut self, database: &str) -> Result<Schema, RawDbError> {
        self.ensure_open()?;
        let schema = self.script.lock().schema.clone();
        Ok(schema.unwrap_or_else(|| Schema::new(database, self.engine)))
    }

    async fn close(&mut self) -> Result<(), RawDbError> {
        if !self.closed {
            self.closed = true;
            self.stats.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
