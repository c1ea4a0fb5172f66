//! The client-facing rate limiter.

use std::sync::Arc;
use std::time::Duration;

use tracing::{trace, warn};

use super::algorithm::Algorithm;
use super::response::{LimitResponse, RemainingResponse};
use crate::clock::{Clock, SystemClock};
use crate::config::RatelimitConfig;
use crate::error::{RatelimitError, Result};
use crate::store::{ConnectionStatus, Context, Store};

/// Default key prefix isolating this engine's keys from other users of the
/// same store.
pub const DEFAULT_PREFIX: &str = "@hummn/ratelimit";

/// Default watchdog timeout before a decision fails open.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Options for constructing a [`RateLimiter`].
#[derive(Debug, Clone)]
pub struct RateLimiterOptions {
    /// Key prefix joined to every identifier.
    pub prefix: String,
    /// Watchdog timeout; `None` disables fail-open and lets transport
    /// errors propagate.
    pub timeout: Option<Duration>,
    /// Time source for deadline bookkeeping in `block_until_ready`.
    pub clock: Arc<dyn Clock>,
}

impl Default for RateLimiterOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            timeout: Some(DEFAULT_TIMEOUT),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Distributed rate limiter over a shared key/value store.
///
/// Holds no mutable state beyond configuration; all accounting lives in the
/// store and is mutated atomically by server-side scripts, so any number of
/// processes sharing a store and a prefix enforce one combined limit.
pub struct RateLimiter {
    algorithm: Box<dyn Algorithm>,
    ctx: Context,
    prefix: String,
    timeout: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a rate limiter with default prefix and timeout.
    pub fn new(store: Arc<dyn Store>, algorithm: Box<dyn Algorithm>) -> Self {
        Self::with_options(store, algorithm, RateLimiterOptions::default())
    }

    /// Create a rate limiter with explicit options.
    pub fn with_options(
        store: Arc<dyn Store>,
        algorithm: Box<dyn Algorithm>,
        options: RateLimiterOptions,
    ) -> Self {
        Self {
            algorithm,
            ctx: Context::new(store),
            prefix: options.prefix,
            timeout: options.timeout,
            clock: options.clock,
        }
    }

    /// Build a rate limiter from loaded settings.
    pub fn from_config(store: Arc<dyn Store>, config: &RatelimitConfig) -> Result<Self> {
        let algorithm = config.build_algorithm()?;
        let options = RateLimiterOptions {
            prefix: config.prefix.clone(),
            timeout: config.timeout()?,
            ..RateLimiterOptions::default()
        };
        Ok(Self::with_options(store, algorithm, options))
    }

    /// Decide whether one request for `identifier` may proceed.
    pub async fn limit(&self, identifier: &str) -> Result<LimitResponse> {
        self.limit_with_rate(identifier, 1).await
    }

    /// Decide whether a request consuming `rate` tokens may proceed.
    ///
    /// A `rate` of zero is treated as one. When the watchdog is armed and
    /// the store does not answer in time, the decision fails open with
    /// [`Reason::Timeout`](super::Reason::Timeout); the request already sent
    /// to the store is not revoked.
    pub async fn limit_with_rate(&self, identifier: &str, rate: u64) -> Result<LimitResponse> {
        let key = self.key_for(identifier);
        trace!(key = %key, rate, "checking rate limit");

        let decision = self.algorithm.limit(&self.ctx, &key, rate);
        match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, decision).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        key = %key,
                        timeout_ms = timeout.as_millis() as u64,
                        "store did not answer before the watchdog, failing open"
                    );
                    Ok(LimitResponse::timed_out())
                }
            },
            None => decision.await,
        }
    }

    /// Read the tokens still available for `identifier` without consuming
    /// any. No watchdog applies.
    pub async fn get_remaining(&self, identifier: &str) -> Result<RemainingResponse> {
        self.algorithm
            .get_remaining(&self.ctx, &self.key_for(identifier))
            .await
    }

    /// Drop all stored state for `identifier`, restoring its full budget.
    pub async fn reset_used_tokens(&self, identifier: &str) -> Result<()> {
        self.algorithm
            .reset_tokens(&self.ctx, &self.key_for(identifier))
            .await
    }

    /// Wait until a request for `identifier` is admitted, up to `max_wait`.
    ///
    /// Retries are spaced to the predicted reset moment rather than
    /// busy-polling. Returns the last observed response: a successful one
    /// if capacity freed up in time, the last rejection once the deadline
    /// passes. A zero `max_wait` is rejected immediately.
    pub async fn block_until_ready(
        &self,
        identifier: &str,
        max_wait: Duration,
    ) -> Result<LimitResponse> {
        if max_wait.is_zero() {
            return Err(RatelimitError::NonPositiveTimeout);
        }

        let deadline = self
            .clock
            .now_millis()
            .saturating_add(max_wait.as_millis() as u64);

        loop {
            let response = self.limit(identifier).await?;
            if response.success {
                return Ok(response);
            }
            if response.reset == 0 {
                return Err(RatelimitError::InvalidReset);
            }

            let now = self.clock.now_millis();
            let wake_at = response.reset.min(deadline);
            if wake_at > now {
                tokio::time::sleep(Duration::from_millis(wake_at - now)).await;
            }
            if self.clock.now_millis() >= deadline {
                return Ok(response);
            }
        }
    }

    /// Connection state of the underlying store, informational only.
    pub fn status(&self) -> ConnectionStatus {
        self.ctx.status()
    }

    /// The key prefix in use.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn key_for(&self, identifier: &str) -> String {
        format!("{}:{}", self.prefix, identifier)
    }
}
