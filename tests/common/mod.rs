#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use hummn_ratelimit::clock::{Clock, ManualClock};
use hummn_ratelimit::ratelimit::{Algorithm, RateLimiter, RateLimiterOptions};
use hummn_ratelimit::store::MemoryStore;

/// Start timestamp for manual-clock tests. Window-aligned for the window
/// sizes used in the tests, so bucket boundaries are predictable.
pub const START_MILLIS: u64 = 1_700_000_000_000;

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
    pub limiter: RateLimiter,
}

/// Build a limiter over a `MemoryStore`, with a shared `ManualClock` driving
/// the algorithm, the store's key expiry, and the orchestrator.
pub fn manual_harness(build: impl FnOnce(Arc<dyn Clock>) -> Box<dyn Algorithm>) -> Harness {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let clock = Arc::new(ManualClock::new(START_MILLIS));
    let clock_dyn: Arc<dyn Clock> = clock.clone();
    let store = Arc::new(MemoryStore::with_clock(clock_dyn.clone()));
    let limiter = RateLimiter::with_options(
        store.clone(),
        build(clock_dyn.clone()),
        RateLimiterOptions {
            prefix: format!("test:{}", uuid::Uuid::new_v4()),
            timeout: None,
            clock: clock_dyn,
        },
    );

    Harness {
        clock,
        store,
        limiter,
    }
}

/// Build a limiter over a `MemoryStore` on the real wall clock, for tests
/// that exercise actual waiting.
pub fn realtime_harness(algorithm: Box<dyn Algorithm>, timeout: Option<Duration>) -> RateLimiter {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let store = Arc::new(MemoryStore::new());
    RateLimiter::with_options(
        store,
        algorithm,
        RateLimiterOptions {
            prefix: format!("test:{}", uuid::Uuid::new_v4()),
            timeout,
            ..RateLimiterOptions::default()
        },
    )
}
