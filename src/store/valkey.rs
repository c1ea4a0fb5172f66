//! Redis/Valkey-backed store using `fred`.

use async_trait::async_trait;
use fred::prelude::*;

use super::{ConnectionStatus, Reply, Store};
use crate::error::{RatelimitError, Result};

/// Store implementation over a `fred` connection pool.
pub struct ValkeyStore {
    pool: fred::clients::Pool,
}

impl ValkeyStore {
    /// Connect to the store at `url` (e.g. `redis://localhost:6379`).
    pub async fn connect(url: &str) -> Result<Self> {
        let config = fred::types::config::Config::from_url(url)?;
        let pool = fred::clients::Pool::new(config, None, None, None, 4)?;
        pool.init().await?;

        tracing::info!("connected to rate limit store");
        Ok(Self { pool })
    }

    /// Wrap a pre-built connection pool.
    pub fn from_pool(pool: fred::clients::Pool) -> Self {
        Self { pool }
    }
}

impl From<fred::error::Error> for RatelimitError {
    fn from(err: fred::error::Error) -> Self {
        RatelimitError::Store(err.to_string())
    }
}

#[async_trait]
impl Store for ValkeyStore {
    async fn send_command(&self, cmd: &'static str, args: Vec<String>) -> Result<Reply> {
        let command = fred::types::CustomCommand::new_static(cmd, None, false);
        let args: Vec<fred::types::Value> =
            args.into_iter().map(fred::types::Value::from).collect();

        let value: fred::types::Value = self.pool.custom(command, args).await?;
        reply_from_value(value)
    }

    fn status(&self) -> ConnectionStatus {
        match self.pool.state() {
            fred::types::ClientState::Connected => ConnectionStatus::Connected,
            _ => ConnectionStatus::Disconnected,
        }
    }
}

fn reply_from_value(value: fred::types::Value) -> Result<Reply> {
    use fred::types::Value;

    Ok(match value {
        Value::Null => Reply::Nil,
        Value::Integer(i) => Reply::Integer(i),
        Value::Boolean(b) => Reply::Integer(i64::from(b)),
        Value::Double(d) => Reply::Bulk(d.to_string()),
        Value::String(s) => Reply::Bulk(s.to_string()),
        Value::Bytes(b) => Reply::Bulk(String::from_utf8_lossy(&b).into_owned()),
        Value::Array(values) => Reply::Array(
            values
                .into_iter()
                .map(reply_from_value)
                .collect::<Result<Vec<_>>>()?,
        ),
        other => {
            return Err(RatelimitError::UnexpectedReply(format!(
                "unsupported value type: {:?}",
                other
            )))
        }
    })
}
