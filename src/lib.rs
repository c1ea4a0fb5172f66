//! Hummn Ratelimit - Distributed Rate Limiting
//!
//! This crate implements distributed rate limiting on top of a shared
//! key/value store speaking the Redis wire protocol (Redis, Valkey). Three
//! interchangeable algorithms — fixed window, sliding window, token bucket —
//! mutate store-side state through atomic server scripts, so any number of
//! processes sharing a store enforce one combined limit per identifier.
//!
//! ```no_run
//! use std::sync::Arc;
//! use hummn_ratelimit::ratelimit::{FixedWindow, RateLimiter};
//! use hummn_ratelimit::store::ValkeyStore;
//!
//! # async fn demo() -> hummn_ratelimit::error::Result<()> {
//! let store = Arc::new(ValkeyStore::connect("redis://localhost:6379").await?);
//! let limiter = RateLimiter::new(store, Box::new(FixedWindow::new(10, "10s")?));
//!
//! let response = limiter.limit("user-42").await?;
//! if !response.success {
//!     // reject with Retry-After derived from response.reset
//! }
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod duration;
pub mod error;
pub mod ratelimit;
pub mod script;
pub mod store;
