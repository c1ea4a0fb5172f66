//! Script execution with transparent cache-miss recovery.

use tracing::debug;

use super::ScriptInfo;
use crate::error::{RatelimitError, Result};
use crate::store::{Reply, Store};

/// Run a script by hash, reloading it once on a store cache miss.
///
/// The common path is a single `EVALSHA` round-trip. When the store answers
/// with a `NOSCRIPT` error (restart, script-cache eviction), the script text
/// is loaded and the `EVALSHA` retried once with the original arguments.
/// Every other error is surfaced unchanged.
pub async fn eval(
    store: &dyn Store,
    script: &ScriptInfo,
    keys: &[String],
    args: &[String],
) -> Result<Reply> {
    let mut command_args = Vec::with_capacity(2 + keys.len() + args.len());
    command_args.push(script.hash().to_string());
    command_args.push(keys.len().to_string());
    command_args.extend_from_slice(keys);
    command_args.extend_from_slice(args);

    match store.send_command("EVALSHA", command_args.clone()).await {
        Err(err) if is_noscript(&err) => {
            debug!(hash = script.hash(), "script missing from store cache, loading");
            store
                .send_command("SCRIPT", vec!["LOAD".to_string(), script.script().to_string()])
                .await?;
            store.send_command("EVALSHA", command_args).await
        }
        other => other,
    }
}

fn is_noscript(err: &RatelimitError) -> bool {
    matches!(err, RatelimitError::Store(msg) if msg.to_ascii_uppercase().contains("NOSCRIPT"))
}
