//! In-process store for hermetic tests.
//!
//! Emulates the command surface the engine uses against a real store:
//! `SCRIPT LOAD` into a hash-keyed script cache, `EVALSHA` dispatching on
//! the registry hashes and reproducing each script's semantics over an
//! expiring keyspace. A fresh instance has an empty script cache, so the
//! executor's `NOSCRIPT` reload path runs exactly as it would after a store
//! restart.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ConnectionStatus, Reply, Store};
use crate::clock::{Clock, SystemClock};
use crate::error::{RatelimitError, Result};
use crate::script;

#[derive(Debug, Clone)]
enum Entry {
    Counter(i64),
    Bucket { refilled_at: i64, tokens: i64 },
}

#[derive(Debug, Clone)]
struct Stored {
    entry: Entry,
    expires_at: Option<u64>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Stored>,
    loaded: HashSet<String>,
}

/// An in-memory stand-in for a Redis-protocol store.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a store using the system wall clock for key expiry.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a store whose expiry follows the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            clock,
        }
    }

    /// Load every registry script into the cache up front.
    pub fn preload_scripts(&self) {
        let mut inner = self.inner.lock();
        for info in script::all() {
            inner.loaded.insert(info.hash().to_string());
        }
    }

    /// Number of live (unexpired) keys.
    pub fn key_count(&self) -> usize {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();
        inner
            .entries
            .retain(|_, stored| !is_expired(stored, now));
        inner.entries.len()
    }

    /// Drop all keys, keeping the script cache.
    pub fn flush(&self) {
        self.inner.lock().entries.clear();
    }

    fn run_script(
        &self,
        inner: &mut Inner,
        hash: &str,
        keys: &[String],
        argv: &[String],
    ) -> Result<Reply> {
        let now = self.clock.now_millis();

        if hash == script::FIXED_WINDOW_LIMIT.hash() {
            fixed_window_limit(inner, now, keys, argv)
        } else if hash == script::FIXED_WINDOW_REMAINING.hash() {
            Ok(Reply::Integer(counter(inner, now, &keys[0]).unwrap_or(0)))
        } else if hash == script::SLIDING_WINDOW_LIMIT.hash() {
            sliding_window_limit(inner, now, keys, argv)
        } else if hash == script::SLIDING_WINDOW_REMAINING.hash() {
            sliding_window_remaining(inner, now, keys, argv)
        } else if hash == script::TOKEN_BUCKET_LIMIT.hash() {
            token_bucket_limit(inner, now, keys, argv)
        } else if hash == script::TOKEN_BUCKET_REMAINING.hash() {
            token_bucket_remaining(inner, now, keys, argv)
        } else if hash == script::RESET.hash() {
            reset(inner, argv)
        } else {
            Err(RatelimitError::Store(format!(
                "ERR no emulation for script {}",
                hash
            )))
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn send_command(&self, cmd: &'static str, args: Vec<String>) -> Result<Reply> {
        match cmd {
            "SCRIPT" => {
                match args.first().map(String::as_str) {
                    Some("LOAD") => {
                        let source = args.get(1).ok_or_else(|| {
                            RatelimitError::Store("ERR wrong number of arguments".to_string())
                        })?;
                        let hash = script::sha1_hex(source);
                        self.inner.lock().loaded.insert(hash.clone());
                        Ok(Reply::Bulk(hash))
                    }
                    other => Err(RatelimitError::Store(format!(
                        "ERR unknown SCRIPT subcommand {:?}",
                        other
                    ))),
                }
            }
            "EVALSHA" => {
                let hash = args
                    .first()
                    .ok_or_else(|| RatelimitError::Store("ERR missing hash".to_string()))?
                    .clone();
                let numkeys: usize = args
                    .get(1)
                    .and_then(|n| n.parse().ok())
                    .ok_or_else(|| RatelimitError::Store("ERR invalid numkeys".to_string()))?;

                if args.len() < 2 + numkeys {
                    return Err(RatelimitError::Store(
                        "ERR Number of keys can't be greater than number of args".to_string(),
                    ));
                }

                let mut inner = self.inner.lock();
                if !inner.loaded.contains(&hash) {
                    return Err(RatelimitError::Store(
                        "NOSCRIPT No matching script. Please use EVAL.".to_string(),
                    ));
                }

                let keys = args[2..2 + numkeys].to_vec();
                let argv = args[2 + numkeys..].to_vec();
                self.run_script(&mut inner, &hash, &keys, &argv)
            }
            other => Err(RatelimitError::Store(format!(
                "ERR unknown command '{}'",
                other
            ))),
        }
    }

    fn status(&self) -> ConnectionStatus {
        ConnectionStatus::Connected
    }
}

fn is_expired(stored: &Stored, now: u64) -> bool {
    stored.expires_at.is_some_and(|at| now >= at)
}

fn live<'a>(inner: &'a mut Inner, now: u64, key: &str) -> Option<&'a Stored> {
    if inner.entries.get(key).is_some_and(|s| is_expired(s, now)) {
        inner.entries.remove(key);
    }
    inner.entries.get(key)
}

fn counter(inner: &mut Inner, now: u64, key: &str) -> Option<i64> {
    match live(inner, now, key) {
        Some(Stored {
            entry: Entry::Counter(v),
            ..
        }) => Some(*v),
        _ => None,
    }
}

fn bucket(inner: &mut Inner, now: u64, key: &str) -> Option<(i64, i64)> {
    match live(inner, now, key) {
        Some(Stored {
            entry: Entry::Bucket { refilled_at, tokens },
            ..
        }) => Some((*refilled_at, *tokens)),
        _ => None,
    }
}

fn num(argv: &[String], index: usize) -> Result<i64> {
    argv.get(index)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| RatelimitError::Store(format!("ERR argument {} is not a number", index)))
}

fn div_ceil(a: i64, b: i64) -> i64 {
    (a + b - 1) / b
}

fn fixed_window_limit(inner: &mut Inner, now: u64, keys: &[String], argv: &[String]) -> Result<Reply> {
    let window = num(argv, 0)?;
    let increment = num(argv, 1)?;
    if window <= 0 {
        return Err(RatelimitError::Store(
            "window must be a positive number of milliseconds".to_string(),
        ));
    }

    let existing = counter(inner, now, &keys[0]);
    let count = existing.unwrap_or(0) + increment;
    let expires_at = match existing {
        Some(_) => inner.entries[&keys[0]].expires_at,
        None => Some(now + window as u64),
    };
    inner.entries.insert(
        keys[0].clone(),
        Stored {
            entry: Entry::Counter(count),
            expires_at,
        },
    );

    Ok(Reply::Integer(count))
}

fn weighted_previous(previous: i64, now_arg: i64, window: i64) -> i64 {
    let elapsed = (now_arg % window) as f64 / window as f64;
    ((1.0 - elapsed) * previous as f64).floor() as i64
}

fn sliding_window_limit(
    inner: &mut Inner,
    now: u64,
    keys: &[String],
    argv: &[String],
) -> Result<Reply> {
    let tokens = num(argv, 0)?;
    let now_arg = num(argv, 1)?;
    let window = num(argv, 2)?;
    let increment = num(argv, 3)?;

    let current = counter(inner, now, &keys[0]);
    let previous = counter(inner, now, &keys[1]).unwrap_or(0);
    let weighted = weighted_previous(previous, now_arg, window);

    if current.unwrap_or(0) + weighted >= tokens {
        return Ok(Reply::Integer(-1));
    }

    let new_current = current.unwrap_or(0) + increment;
    let expires_at = match current {
        Some(_) => inner.entries[&keys[0]].expires_at,
        None => Some(now + (2 * window + 1000) as u64),
    };
    inner.entries.insert(
        keys[0].clone(),
        Stored {
            entry: Entry::Counter(new_current),
            expires_at,
        },
    );

    Ok(Reply::Integer(tokens - (new_current + weighted)))
}

fn sliding_window_remaining(
    inner: &mut Inner,
    now: u64,
    keys: &[String],
    argv: &[String],
) -> Result<Reply> {
    let tokens = num(argv, 0)?;
    let now_arg = num(argv, 1)?;
    let window = num(argv, 2)?;

    let current = counter(inner, now, &keys[0]).unwrap_or(0);
    let previous = counter(inner, now, &keys[1]).unwrap_or(0);
    let weighted = weighted_previous(previous, now_arg, window);

    Ok(Reply::Integer(tokens - (current + weighted)))
}

fn token_bucket_limit(
    inner: &mut Inner,
    now: u64,
    keys: &[String],
    argv: &[String],
) -> Result<Reply> {
    let max_tokens = num(argv, 0)?;
    let interval = num(argv, 1)?;
    let refill_rate = num(argv, 2)?;
    let now_arg = num(argv, 3)?;
    let increment = num(argv, 4)?;

    let (mut refilled_at, mut tokens) =
        bucket(inner, now, &keys[0]).unwrap_or((now_arg, max_tokens));

    if now_arg >= refilled_at + interval {
        let num_refills = (now_arg - refilled_at) / interval;
        tokens = (tokens + num_refills * refill_rate).min(max_tokens);
        refilled_at += num_refills * interval;
    }

    if tokens < increment {
        let intervals_needed = div_ceil(increment - tokens, refill_rate);
        let retry_at = refilled_at + intervals_needed * interval;
        return Ok(Reply::Array(vec![
            Reply::Integer(0),
            Reply::Integer(max_tokens),
            Reply::Integer(0),
            Reply::Integer(retry_at - now_arg),
        ]));
    }

    let remaining = tokens - increment;
    let expire = div_ceil(max_tokens - remaining, refill_rate) * interval * 2;
    inner.entries.insert(
        keys[0].clone(),
        Stored {
            entry: Entry::Bucket {
                refilled_at,
                tokens: remaining,
            },
            expires_at: Some(now + expire as u64),
        },
    );

    Ok(Reply::Array(vec![
        Reply::Integer(1),
        Reply::Integer(max_tokens),
        Reply::Integer(remaining),
        Reply::Integer(refilled_at + interval - now_arg),
    ]))
}

fn token_bucket_remaining(
    inner: &mut Inner,
    now: u64,
    keys: &[String],
    argv: &[String],
) -> Result<Reply> {
    let max_tokens = num(argv, 0)?;

    Ok(match bucket(inner, now, &keys[0]) {
        None => Reply::Array(vec![Reply::Integer(max_tokens), Reply::Integer(-1)]),
        // hash fields come back as bulk strings from a real store
        Some((refilled_at, tokens)) => Reply::Array(vec![
            Reply::Bulk(tokens.to_string()),
            Reply::Bulk(refilled_at.to_string()),
        ]),
    })
}

fn reset(inner: &mut Inner, argv: &[String]) -> Result<Reply> {
    let pattern = argv
        .first()
        .ok_or_else(|| RatelimitError::Store("ERR missing pattern".to_string()))?;

    let matches = |key: &str| match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    };

    let before = inner.entries.len();
    inner.entries.retain(|key, _| !matches(key));
    let deleted = (before - inner.entries.len()) as i64;

    Ok(Reply::Array(vec![
        Reply::Integer(deleted),
        Reply::Bulk("0".to_string()),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    async fn load_and_run(
        store: &MemoryStore,
        info: &script::ScriptInfo,
        keys: &[&str],
        argv: &[&str],
    ) -> Result<Reply> {
        let mut args = vec![info.hash().to_string(), keys.len().to_string()];
        args.extend(keys.iter().map(|k| k.to_string()));
        args.extend(argv.iter().map(|a| a.to_string()));
        store.send_command("EVALSHA", args).await
    }

    #[tokio::test]
    async fn evalsha_without_load_reports_noscript() {
        let store = MemoryStore::new();
        let err = load_and_run(&store, &script::FIXED_WINDOW_LIMIT, &["k"], &["1000", "1"])
            .await
            .unwrap_err();
        assert!(matches!(err, RatelimitError::Store(msg) if msg.contains("NOSCRIPT")));
    }

    #[tokio::test]
    async fn script_load_fills_the_cache() {
        let store = MemoryStore::new();
        let reply = store
            .send_command(
                "SCRIPT",
                vec![
                    "LOAD".to_string(),
                    script::FIXED_WINDOW_LIMIT.script().to_string(),
                ],
            )
            .await
            .unwrap();
        assert_eq!(
            reply,
            Reply::Bulk(script::FIXED_WINDOW_LIMIT.hash().to_string())
        );

        let reply = load_and_run(&store, &script::FIXED_WINDOW_LIMIT, &["k"], &["1000", "1"])
            .await
            .unwrap();
        assert_eq!(reply, Reply::Integer(1));
    }

    #[tokio::test]
    async fn counters_expire_with_the_clock() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let store = MemoryStore::with_clock(clock.clone());
        store.preload_scripts();

        load_and_run(&store, &script::FIXED_WINDOW_LIMIT, &["k"], &["1000", "1"])
            .await
            .unwrap();
        assert_eq!(store.key_count(), 1);

        clock.advance(1_000);
        assert_eq!(store.key_count(), 0);

        let reply = load_and_run(&store, &script::FIXED_WINDOW_LIMIT, &["k"], &["1000", "1"])
            .await
            .unwrap();
        assert_eq!(reply, Reply::Integer(1));
    }

    #[tokio::test]
    async fn reset_matches_glob_and_exact_patterns() {
        let store = MemoryStore::new();
        store.preload_scripts();

        load_and_run(&store, &script::FIXED_WINDOW_LIMIT, &["p:a:1"], &["60000", "1"])
            .await
            .unwrap();
        load_and_run(&store, &script::FIXED_WINDOW_LIMIT, &["p:a:2"], &["60000", "1"])
            .await
            .unwrap();
        load_and_run(&store, &script::FIXED_WINDOW_LIMIT, &["p:b:1"], &["60000", "1"])
            .await
            .unwrap();

        let reply = load_and_run(&store, &script::RESET, &[], &["p:a:*", "0", "100", "1000"])
            .await
            .unwrap();
        assert_eq!(
            reply,
            Reply::Array(vec![Reply::Integer(2), Reply::Bulk("0".to_string())])
        );
        assert_eq!(store.key_count(), 1);

        let reply = load_and_run(&store, &script::RESET, &[], &["p:b:1", "0", "100", "1000"])
            .await
            .unwrap();
        assert_eq!(
            reply,
            Reply::Array(vec![Reply::Integer(1), Reply::Bulk("0".to_string())])
        );
        assert_eq!(store.key_count(), 0);
    }

    #[tokio::test]
    async fn unknown_commands_are_rejected() {
        let store = MemoryStore::new();
        let err = store
            .send_command("GET", vec!["k".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, RatelimitError::Store(msg) if msg.contains("unknown command")));
    }
}
