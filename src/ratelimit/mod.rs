//! Rate limiting algorithms and the client-facing orchestrator.

mod algorithm;
mod fixed_window;
mod limiter;
mod response;
mod sliding_window;
mod token_bucket;

pub use algorithm::Algorithm;
pub use fixed_window::FixedWindow;
pub use limiter::{RateLimiter, RateLimiterOptions, DEFAULT_PREFIX, DEFAULT_TIMEOUT};
pub use response::{LimitResponse, Pending, Reason, RemainingResponse};
pub use sliding_window::SlidingWindow;
pub use token_bucket::TokenBucket;
