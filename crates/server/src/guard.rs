//! Bounded-time wrapper around every store and notification call.
//!
//! Reads are retried at most once after a transient failure; writes are never retried so a
//! slow commit cannot be applied twice.

use std::future::Future;
use std::time::Duration;

use quoteflow_core::config::ServicesConfig;
use quoteflow_core::errors::ApplicationError;
use tokio::time::timeout;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServiceGuard {
    timeout: Duration,
    read_retries: u32,
}

impl Default for ServiceGuard {
    fn default() -> Self {
        Self::from_config(&ServicesConfig { timeout_ms: 5_000, read_retries: 1 })
    }
}

impl ServiceGuard {
    pub fn new(timeout: Duration, read_retries: u32) -> Self {
        Self { timeout, read_retries: read_retries.min(1) }
    }

    pub fn from_config(config: &ServicesConfig) -> Self {
        Self::new(Duration::from_millis(config.timeout_ms), config.read_retries)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn read<T, E, F, Fut>(
        &self,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, ApplicationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<ApplicationError>,
    {
        let mut attempt = 0;
        loop {
            match self.bounded(operation, call()).await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_external() && attempt < self.read_retries => {
                    attempt += 1;
                    warn!(
                        event_name = "service.read.retry",
                        operation,
                        attempt,
                        error = %error,
                        "retrying read after transient failure"
                    );
                }
                Err(error) => return Err(error),
            }
        }
    }

    pub async fn write<T, E, Fut>(
        &self,
        operation: &'static str,
        call: Fut,
    ) -> Result<T, ApplicationError>
    where
        Fut: Future<Output = Result<T, E>>,
        E: Into<ApplicationError>,
    {
        self.bounded(operation, call).await
    }

    async fn bounded<T, E, Fut>(
        &self,
        operation: &'static str,
        call: Fut,
    ) -> Result<T, ApplicationError>
    where
        Fut: Future<Output = Result<T, E>>,
        E: Into<ApplicationError>,
    {
        match timeout(self.timeout, call).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(ApplicationError::Timeout {
                operation: operation.to_string(),
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}
