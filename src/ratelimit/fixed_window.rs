//! Fixed window algorithm.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};

use super::algorithm::{reset_pattern, Algorithm};
use super::response::{LimitResponse, Pending, RemainingResponse};
use crate::clock::{Clock, SystemClock};
use crate::duration::parse_duration;
use crate::error::Result;
use crate::script;
use crate::store::Context;

/// Counts requests in fixed, aligned windows of `window_ms`.
///
/// Each window gets its own counter key (`{key}:{bucket}`), expired by the
/// store one window after its first write. Cheap and predictable, at the
/// cost of admitting up to `2 * tokens - 1` requests across one window
/// boundary in the worst case.
pub struct FixedWindow {
    tokens: u64,
    window_ms: u64,
    clock: Arc<dyn Clock>,
}

impl FixedWindow {
    /// Create a fixed window limiter allowing `tokens` requests per
    /// `window`, e.g. `FixedWindow::new(10, "10s")`.
    pub fn new(tokens: u64, window: &str) -> Result<Self> {
        Ok(Self::from_millis(
            tokens,
            parse_duration(window)?.as_millis() as u64,
        ))
    }

    /// Create a fixed window limiter from a window length in milliseconds.
    pub fn from_millis(tokens: u64, window_ms: u64) -> Self {
        Self {
            tokens,
            window_ms,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn bucket(&self, now: u64) -> u64 {
        now / self.window_ms
    }
}

#[async_trait]
impl Algorithm for FixedWindow {
    async fn limit(&self, ctx: &Context, key: &str, rate: u64) -> Result<LimitResponse> {
        let increment = rate.max(1);
        let now = self.clock.now_millis();
        let bucket = self.bucket(now);
        let full_key = format!("{}:{}", key, bucket);

        trace!(key = %full_key, increment, "checking fixed window");

        let reply = script::eval(
            ctx.store.as_ref(),
            &script::FIXED_WINDOW_LIMIT,
            std::slice::from_ref(&full_key),
            &[self.window_ms.to_string(), increment.to_string()],
        )
        .await?;
        let count = reply.as_u64()?;

        let success = count <= self.tokens;
        if !success {
            debug!(key = %full_key, count, limit = self.tokens, "fixed window limit exceeded");
        }

        Ok(LimitResponse {
            success,
            limit: self.tokens,
            remaining: self.tokens.saturating_sub(count),
            reset: (bucket + 1) * self.window_ms,
            reason: None,
            pending: Pending::ready(),
        })
    }

    async fn get_remaining(&self, ctx: &Context, key: &str) -> Result<RemainingResponse> {
        let now = self.clock.now_millis();
        let bucket = self.bucket(now);
        let full_key = format!("{}:{}", key, bucket);

        let reply = script::eval(
            ctx.store.as_ref(),
            &script::FIXED_WINDOW_REMAINING,
            std::slice::from_ref(&full_key),
            &[],
        )
        .await?;
        let count = reply.as_u64()?;

        Ok(RemainingResponse {
            remaining: self.tokens.saturating_sub(count),
            reset: (bucket + 1) * self.window_ms,
        })
    }

    async fn reset_tokens(&self, ctx: &Context, key: &str) -> Result<()> {
        reset_pattern(ctx, &format!("{}:*", key)).await
    }
}
