//! Token bucket algorithm.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};

use super::algorithm::{reset_pattern, Algorithm};
use super::response::{LimitResponse, Pending, RemainingResponse};
use crate::clock::{Clock, SystemClock};
use crate::duration::parse_duration;
use crate::error::{RatelimitError, Result};
use crate::script;
use crate::store::Context;

/// Bucket of up to `max_tokens`, refilled by `refill_rate` every interval.
///
/// State is a single hash per identifier (`refilledAt`, `tokens`); refill is
/// amortised into the consuming write, so an idle identifier costs nothing.
/// Bursts are capped at `max_tokens`.
pub struct TokenBucket {
    refill_rate: u64,
    interval_ms: u64,
    max_tokens: u64,
    clock: Arc<dyn Clock>,
}

impl TokenBucket {
    /// Create a token bucket that refills `refill_rate` tokens every
    /// `interval` up to `max_tokens`, e.g. `TokenBucket::new(5, "1s", 10)`.
    pub fn new(refill_rate: u64, interval: &str, max_tokens: u64) -> Result<Self> {
        Ok(Self::from_millis(
            refill_rate,
            parse_duration(interval)?.as_millis() as u64,
            max_tokens,
        ))
    }

    /// Create a token bucket from an interval length in milliseconds.
    pub fn from_millis(refill_rate: u64, interval_ms: u64, max_tokens: u64) -> Self {
        Self {
            refill_rate,
            interval_ms,
            max_tokens,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait]
impl Algorithm for TokenBucket {
    async fn limit(&self, ctx: &Context, key: &str, rate: u64) -> Result<LimitResponse> {
        let increment = rate.max(1);
        let now = self.clock.now_millis();

        trace!(key = %key, increment, "checking token bucket");

        let reply = script::eval(
            ctx.store.as_ref(),
            &script::TOKEN_BUCKET_LIMIT,
            &[key.to_string()],
            &[
                self.max_tokens.to_string(),
                self.interval_ms.to_string(),
                self.refill_rate.to_string(),
                now.to_string(),
                increment.to_string(),
            ],
        )
        .await?;

        // contract: [success, limit, remaining, delta-ms until reset]
        let items = reply.as_array()?;
        if items.len() != 4 {
            return Err(RatelimitError::UnexpectedReply(format!(
                "token bucket script returned {} values",
                items.len()
            )));
        }
        let success = items[0].as_i64()? == 1;
        let limit = items[1].as_u64()?;
        let remaining = items[2].as_u64()?;
        let delta = items[3].as_i64()?.max(0) as u64;

        if !success {
            debug!(key = %key, limit, "token bucket empty");
        }

        Ok(LimitResponse {
            success,
            limit,
            remaining,
            reset: now + delta,
            reason: None,
            pending: Pending::ready(),
        })
    }

    async fn get_remaining(&self, ctx: &Context, key: &str) -> Result<RemainingResponse> {
        let now = self.clock.now_millis();

        let reply = script::eval(
            ctx.store.as_ref(),
            &script::TOKEN_BUCKET_REMAINING,
            &[key.to_string()],
            &[self.max_tokens.to_string()],
        )
        .await?;

        let items = reply.as_array()?;
        if items.len() != 2 {
            return Err(RatelimitError::UnexpectedReply(format!(
                "token bucket state is {} values",
                items.len()
            )));
        }
        let tokens = items[0].as_i64()?;
        let refilled_at = items[1].as_i64()?;

        // -1 marks an identifier with no stored bucket yet
        let reset = if refilled_at < 0 {
            now + self.interval_ms
        } else {
            refilled_at as u64 + self.interval_ms
        };

        Ok(RemainingResponse {
            remaining: u64::try_from(tokens).unwrap_or(0).min(self.max_tokens),
            reset,
        })
    }

    async fn reset_tokens(&self, ctx: &Context, key: &str) -> Result<()> {
        // the bucket key carries no suffix, so the pattern is the key itself
        reset_pattern(ctx, key).await
    }
}
