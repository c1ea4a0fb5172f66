//! Server-side script registry.
//!
//! Each algorithm mutates its state through a Lua script executed atomically
//! by the store. The script texts live next to this module and are embedded
//! at compile time; their SHA-1 hashes are computed once per process so
//! every invocation, including the very first, goes out as `EVALSHA`.

mod executor;

pub use executor::eval;

use std::sync::LazyLock;

use sha1::{Digest, Sha1};

/// A script together with its precomputed content hash.
#[derive(Debug)]
pub struct ScriptInfo {
    script: &'static str,
    hash: String,
}

impl ScriptInfo {
    fn new(script: &'static str) -> Self {
        Self {
            script,
            hash: sha1_hex(script),
        }
    }

    /// The script source, sent on `SCRIPT LOAD` after a cache miss.
    pub fn script(&self) -> &'static str {
        self.script
    }

    /// Lowercase SHA-1 hex of the script source, as Redis computes it.
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

/// SHA-1 of `input` as lowercase hex, matching the store's script hashing.
pub(crate) fn sha1_hex(input: &str) -> String {
    let digest = Sha1::digest(input.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

pub static FIXED_WINDOW_LIMIT: LazyLock<ScriptInfo> =
    LazyLock::new(|| ScriptInfo::new(include_str!("lua/fixed_window_limit.lua")));

pub static FIXED_WINDOW_REMAINING: LazyLock<ScriptInfo> =
    LazyLock::new(|| ScriptInfo::new(include_str!("lua/fixed_window_remaining.lua")));

pub static SLIDING_WINDOW_LIMIT: LazyLock<ScriptInfo> =
    LazyLock::new(|| ScriptInfo::new(include_str!("lua/sliding_window_limit.lua")));

pub static SLIDING_WINDOW_REMAINING: LazyLock<ScriptInfo> =
    LazyLock::new(|| ScriptInfo::new(include_str!("lua/sliding_window_remaining.lua")));

pub static TOKEN_BUCKET_LIMIT: LazyLock<ScriptInfo> =
    LazyLock::new(|| ScriptInfo::new(include_str!("lua/token_bucket_limit.lua")));

pub static TOKEN_BUCKET_REMAINING: LazyLock<ScriptInfo> =
    LazyLock::new(|| ScriptInfo::new(include_str!("lua/token_bucket_remaining.lua")));

pub static RESET: LazyLock<ScriptInfo> =
    LazyLock::new(|| ScriptInfo::new(include_str!("lua/reset.lua")));

/// All registered scripts, in no particular order.
pub fn all() -> [&'static ScriptInfo; 7] {
    [
        &*FIXED_WINDOW_LIMIT,
        &*FIXED_WINDOW_REMAINING,
        &*SLIDING_WINDOW_LIMIT,
        &*SLIDING_WINDOW_REMAINING,
        &*TOKEN_BUCKET_LIMIT,
        &*TOKEN_BUCKET_REMAINING,
        &*RESET,
    ]
}
