//! Responses returned to callers.

use tokio::task::JoinHandle;

/// Why a decision was made without consulting the store.
///
/// Only [`Reason::Timeout`] is produced by this crate. The other variants
/// keep the response vocabulary stable for callers that layer a local cache
/// or a deny list in front of the limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// The store did not answer before the watchdog fired; the request was
    /// admitted without consuming tokens.
    Timeout,
    /// Decision served from a cache tier in front of the store.
    CacheBlock,
    /// The identifier is on a deny list.
    DenyList,
}

/// Post-decision work still in flight.
///
/// The engine completes every decision synchronously, so this is always
/// immediately ready here. It exists so variants that return a background
/// task (analytics, multi-region sync) can do so without changing the
/// response shape.
#[derive(Debug, Default)]
pub struct Pending(Option<JoinHandle<()>>);

impl Pending {
    /// A pending handle that is already complete.
    pub fn ready() -> Self {
        Self(None)
    }

    /// Wrap a spawned follow-up task.
    pub fn from_task(handle: JoinHandle<()>) -> Self {
        Self(Some(handle))
    }

    /// Wait for any post-decision work to finish.
    pub async fn wait(self) {
        if let Some(handle) = self.0 {
            let _ = handle.await;
        }
    }
}

/// The outcome of a `limit` call.
#[derive(Debug)]
pub struct LimitResponse {
    /// Whether the request may proceed.
    pub success: bool,
    /// The configured capacity (`tokens` or `max_tokens`).
    pub limit: u64,
    /// Tokens left after this decision, clamped to `0..=limit`.
    pub remaining: u64,
    /// Wall-clock millisecond timestamp at which capacity renews. Zero only
    /// in the synthetic fail-open response.
    pub reset: u64,
    /// Set when the decision did not come from the store.
    pub reason: Option<Reason>,
    /// Post-decision work; always ready in this crate.
    pub pending: Pending,
}

impl LimitResponse {
    /// The fail-open response returned when the watchdog fires.
    pub(crate) fn timed_out() -> Self {
        Self {
            success: true,
            limit: 0,
            remaining: 0,
            reset: 0,
            reason: Some(Reason::Timeout),
            pending: Pending::ready(),
        }
    }
}

/// The outcome of a `get_remaining` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemainingResponse {
    /// Tokens currently available.
    pub remaining: u64,
    /// Wall-clock millisecond timestamp at which capacity renews.
    pub reset: u64,
}
