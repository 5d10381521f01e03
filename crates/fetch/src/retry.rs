//! Retry policy for transient fetch failures

use crate::{FetchRequest, Fetcher};
use async_trait::async_trait;
use prefetch_config::NetworkConfig;
use prefetch_errors::{Error, FetchError};
use prefetch_events::{AppEvent, CorrelatedEmitter, EventEmitter, FailureContext, FetchEvent};
use prefetch_root::{Sandbox, SandboxedPath};
use std::time::Duration;

/// Retry configuration for fetches
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Initial backoff delay
    pub initial_delay: Duration,
    /// Maximum backoff delay
    pub max_delay: Duration,
    /// Backoff multiplier
    pub backoff_multiplier: f64,
    /// Limit for a single attempt; exceeding it counts as transient
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            attempt_timeout: None,
        }
    }
}

impl From<&NetworkConfig> for RetryConfig {
    fn from(network: &NetworkConfig) -> Self {
        Self {
            max_retries: network.retries,
            initial_delay: network.retry_delay(),
            max_delay: network.max_retry_delay(),
            attempt_timeout: Some(network.timeout()),
            ..Self::default()
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `retry` (1-based), capped at `max_delay`
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let seconds = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(seconds)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Fetcher wrapper that retries transient failures with exponential backoff
///
/// Final failures pass through untouched. Partial output of a failed
/// attempt is cleared before the next attempt starts.
pub struct RetryingFetcher<F> {
    inner: F,
    config: RetryConfig,
    events: CorrelatedEmitter,
}

impl<F: Fetcher> RetryingFetcher<F> {
    pub fn new(inner: F, config: RetryConfig) -> Self {
        Self {
            inner,
            config,
            events: CorrelatedEmitter::disabled(),
        }
    }

    #[must_use]
    pub fn with_events(mut self, events: CorrelatedEmitter) -> Self {
        self.events = events;
        self
    }

    async fn attempt(
        &self,
        request: &FetchRequest,
        output: &Sandbox,
        destination: &SandboxedPath,
    ) -> Result<(), Error> {
        let fetch = self.inner.fetch(request, output, destination);
        match self.config.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, fetch).await.map_err(|_| {
                Error::from(FetchError::Timeout {
                    name: request.name.clone(),
                    seconds: limit.as_secs(),
                })
            })?,
            None => fetch.await,
        }
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for RetryingFetcher<F> {
    async fn fetch(
        &self,
        request: &FetchRequest,
        output: &Sandbox,
        destination: &SandboxedPath,
    ) -> Result<(), Error> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.events.emit(AppEvent::Fetch(FetchEvent::Started {
                module: request.name.clone(),
                version: request.version.clone(),
                attempt,
            }));

            let err = match self.attempt(request, output, destination).await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };

            if !matches!(&err, Error::Fetch(fetch) if fetch.is_transient()) {
                return Err(err);
            }

            if attempt > self.config.max_retries {
                return Err(FetchError::RetriesExhausted {
                    name: request.name.clone(),
                    version: request.version.clone(),
                    attempts: attempt,
                    message: err.to_string(),
                }
                .into());
            }

            let delay = self.config.delay_for(attempt);
            self.events.emit(AppEvent::Fetch(FetchEvent::Retrying {
                module: request.name.clone(),
                version: request.version.clone(),
                attempt,
                delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                failure: FailureContext::from_error(&err),
            }));
            tokio::time::sleep(delay).await;

            output.ensure_empty_dir(destination.relative()).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_and_caps() {
        let config = RetryConfig {
            max_retries: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            attempt_timeout: None,
        };

        assert_eq!(config.delay_for(1), Duration::from_millis(100));
        assert_eq!(config.delay_for(2), Duration::from_millis(200));
        assert_eq!(config.delay_for(3), Duration::from_millis(400));
        assert_eq!(config.delay_for(4), Duration::from_millis(500));
        assert_eq!(config.delay_for(60), Duration::from_millis(500));
    }

    #[test]
    fn test_from_network_config() {
        let config = RetryConfig::from(&NetworkConfig::default());
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_delay, Duration::from_millis(500));
        assert_eq!(config.attempt_timeout, Some(Duration::from_secs(300)));
    }
}
