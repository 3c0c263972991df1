//! Connection factory with bounded retry.
//!
//! Every request that touches a database opens a fresh handle here. A handle
//! only leaves the factory after it has answered a liveness probe.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::classify::{classify, RawDbError};
use crate::config::{ConnectionParameters, RuntimeSettings};
use crate::db::{Connector, DatabaseHandle};
use crate::error::{GateError, Result};

/// Pause between failed connection attempts.
#[async_trait]
pub trait Backoff: Send + Sync {
    /// Waits before attempt `next_attempt` (2-based: there is no wait before the first).
    async fn wait(&self, next_attempt: u32);
}

/// Constant delay between attempts.
#[derive(Debug, Clone, Copy)]
pub struct FixedBackoff(pub Duration);

#[async_trait]
impl Backoff for FixedBackoff {
    async fn wait(&self, _next_attempt: u32) {
        if !self.0.is_zero() {
            tokio::time::sleep(self.0).await;
        }
    }
}

/// Opens probed database handles.
#[derive(Clone)]
pub struct ConnectionFactory {
    connector: Arc<dyn Connector>,
    backoff: Arc<dyn Backoff>,
    max_attempts: u32,
}

impl ConnectionFactory {
    /// Creates a factory. `max_attempts` below 1 is treated as 1.
    pub fn new(connector: Arc<dyn Connector>, backoff: Arc<dyn Backoff>, max_attempts: u32) -> Self {
        Self {
            connector,
            backoff,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Creates a factory using the configured attempt count and fixed delay.
    pub fn from_settings(connector: Arc<dyn Connector>, settings: &RuntimeSettings) -> Self {
        Self::new(
            connector,
            Arc::new(FixedBackoff(settings.retry_delay())),
            settings.max_attempts,
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Opens a handle using the configured number of attempts.
    pub async fn open(&self, params: &ConnectionParameters) -> Result<Box<dyn DatabaseHandle>> {
        self.open_with_attempts(params, self.max_attempts).await
    }

    /// Opens a handle, trying up to `attempts` times.
    ///
    /// An attempt fails if either the connect or the probe fails; a handle
    /// whose probe failed is closed before the next attempt. After the last
    /// failure the most recent driver error is classified and returned.
    pub async fn open_with_attempts(
        &self,
        params: &ConnectionParameters,
        attempts: u32,
    ) -> Result<Box<dyn DatabaseHandle>> {
        let attempts = attempts.max(1);
        let mut last_error: Option<RawDbError> = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                self.backoff.wait(attempt).await;
            }

            debug!(
                "Connecting to {} (attempt {}/{})",
                params.display_string(),
                attempt,
                attempts
            );

            match self.try_open(params).await {
                Ok(handle) => {
                    info!(
                        "Connected to {} on attempt {}",
                        params.display_string(),
                        attempt
                    );
                    return Ok(handle);
                }
                Err(e) => {
                    warn!("Connection attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = Some(e);
                }
            }
        }

        let raw = last_error
            .unwrap_or_else(|| RawDbError::new(None, "No connection attempt was made"));
        Err(GateError::Connection(classify(&raw)))
    }

    async fn try_open(
        &self,
        params: &ConnectionParameters,
    ) -> std::result::Result<Box<dyn DatabaseHandle>, RawDbError> {
        let mut handle = self.connector.connect(params).await?;

        if let Err(e) = handle.probe().await {
            if let Err(close_err) = handle.close().await {
                debug!("Closing unprobed handle failed: {}", close_err);
            }
            return Err(e);
        }

        Ok(handle)
    }
}

impl std::fmt::Debug for ConnectionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionFactory")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}
