//! The capability bundle every admission algorithm implements.

use async_trait::async_trait;
use tracing::debug;

use super::response::{LimitResponse, RemainingResponse};
use crate::error::Result;
use crate::script;
use crate::store::Context;

/// An interchangeable admission algorithm.
///
/// Implementations receive the already-prefixed key and mutate shared state
/// through a single atomic script invocation per call. They hold only
/// configuration; all mutable state lives in the store.
#[async_trait]
pub trait Algorithm: Send + Sync {
    /// Try to consume `max(1, rate)` tokens for `key`.
    async fn limit(&self, ctx: &Context, key: &str, rate: u64) -> Result<LimitResponse>;

    /// Read the currently available tokens for `key` without consuming any.
    ///
    /// Not atomic with respect to a following `limit`; never use it for
    /// enforcement.
    async fn get_remaining(&self, ctx: &Context, key: &str) -> Result<RemainingResponse>;

    /// Drop all stored state for `key`.
    async fn reset_tokens(&self, ctx: &Context, key: &str) -> Result<()>;
}

const RESET_BATCH_SIZE: u64 = 100;
const RESET_MAX_DELETES: u64 = 1000;

/// Scan-and-unlink every key matching `pattern`.
///
/// Runs the shared reset script once; a non-zero returned cursor is logged
/// and left for the caller to chase, which in practice never happens since
/// an identifier owns at most two live keys.
pub(super) async fn reset_pattern(ctx: &Context, pattern: &str) -> Result<()> {
    let reply = script::eval(
        ctx.store.as_ref(),
        &script::RESET,
        &[],
        &[
            pattern.to_string(),
            "0".to_string(),
            RESET_BATCH_SIZE.to_string(),
            RESET_MAX_DELETES.to_string(),
        ],
    )
    .await?;

    let items = reply.as_array()?;
    let deleted = items.first().map(|r| r.as_u64()).transpose()?.unwrap_or(0);
    let cursor = match items.get(1) {
        Some(crate::store::Reply::Bulk(c)) => c.clone(),
        _ => "0".to_string(),
    };

    debug!(pattern = %pattern, deleted, cursor = %cursor, "reset state");
    Ok(())
}
