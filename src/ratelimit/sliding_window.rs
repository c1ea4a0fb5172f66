//! Sliding window algorithm.

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

/// Rolling-window admission using two adjacent fixed-window counters.
///
/// The previous window's count is weighted by the fraction of it still
/// inside the rolling window, which smooths out the boundary burst a pure
/// fixed window allows while keeping storage at two counters per
/// identifier.
pub struct SlidingWindow {
    tokens: u64,
    window_ms: u64,
    clock: Arc<dyn Clock>,
}

impl SlidingWindow {
    /// Create a sliding window limiter allowing `tokens` requests per
    /// rolling `window`, e.g. `SlidingWindow::new(10, "10s")`.
    pub fn new(tokens: u64, window: &str) -> Result<Self> {
        Ok(Self::from_millis(
            tokens,
            parse_duration(window)?.as_millis() as u64,
        ))
    }

    /// Create a sliding window limiter from a window length in milliseconds.
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

    fn keys_for(&self, key: &str, now: u64) -> (u64, [String; 2]) {
        let bucket = now / self.window_ms;
        let previous = bucket.wrapping_sub(1);
        (
            bucket,
            [
                format!("{}:{}", key, bucket),
                format!("{}:{}", key, previous),
            ],
        )
    }
}

#[async_trait]
impl Algorithm for SlidingWindow {
    async fn limit(&self, ctx: &Context, key: &str, rate: u64) -> Result<LimitResponse> {
        let increment = rate.max(1);
        let now = self.clock.now_millis();
        let (bucket, keys) = self.keys_for(key, now);

        trace!(key = %keys[0], increment, "checking sliding window");

        let reply = script::eval(
            ctx.store.as_ref(),
            &script::SLIDING_WINDOW_LIMIT,
            &keys,
            &[
                self.tokens.to_string(),
                now.to_string(),
                self.window_ms.to_string(),
                increment.to_string(),
            ],
        )
        .await?;
        let left = reply.as_i64()?;

        let success = left >= 0;
        if !success {
            debug!(key = %keys[0], limit = self.tokens, "sliding window limit exceeded");
        }

        Ok(LimitResponse {
            success,
            limit: self.tokens,
            remaining: u64::try_from(left).unwrap_or(0),
            reset: (bucket + 1) * self.window_ms,
            reason: None,
            pending: Pending::ready(),
        })
    }

    async fn get_remaining(&self, ctx: &Context, key: &str) -> Result<RemainingResponse> {
        let now = self.clock.now_millis();
        let (bucket, keys) = self.keys_for(key, now);

        let reply = script::eval(
            ctx.store.as_ref(),
            &script::SLIDING_WINDOW_REMAINING,
            &keys,
            &[
                self.tokens.to_string(),
                now.to_string(),
                self.window_ms.to_string(),
            ],
        )
        .await?;
        let left = reply.as_i64()?;

        Ok(RemainingResponse {
            remaining: u64::try_from(left).unwrap_or(0),
            reset: (bucket + 1) * self.window_ms,
        })
    }

    async fn reset_tokens(&self, ctx: &Context, key: &str) -> Result<()> {
        reset_pattern(ctx, &format!("{}:*", key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_current_and_previous_keys() {
        let algorithm = SlidingWindow::from_millis(5, 1_000);
        let (bucket, keys) = algorithm.keys_for("p:id", 10_500);
        assert_eq!(bucket, 10);
        assert_eq!(keys[0], "p:id:10");
        assert_eq!(keys[1], "p:id:9");
    }

    #[test]
    fn parses_window_from_duration_string() {
        let algorithm = SlidingWindow::new(3, "2s").unwrap();
        assert_eq!(algorithm.window_ms, 2_000);
    }
}
