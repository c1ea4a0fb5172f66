//! Store abstraction: the command-level seam between the engine and the
//! key/value store.
//!
//! The engine consumes a single capability: send a command, get a reply.
//! `valkey` provides the production implementation over a Redis-protocol
//! server; `memory` provides a hermetic in-process implementation for tests.

mod memory;
mod valkey;

pub use memory::MemoryStore;
pub use valkey::ValkeyStore;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{RatelimitError, Result};

/// A reply from the store, reduced to the shapes the engine consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// RESP integer
    Integer(i64),
    /// RESP bulk string
    Bulk(String),
    /// RESP array
    Array(Vec<Reply>),
    /// RESP null
    Nil,
}

impl Reply {
    /// Read the reply as a signed integer.
    ///
    /// Scripts return numbers either as RESP integers or as numeric bulk
    /// strings (hash fields come back as strings), so both are accepted.
    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Reply::Integer(i) => Ok(*i),
            Reply::Bulk(s) => s
                .parse()
                .map_err(|_| RatelimitError::UnexpectedReply(format!("non-numeric bulk '{}'", s))),
            other => Err(RatelimitError::UnexpectedReply(format!(
                "expected integer, got {:?}",
                other
            ))),
        }
    }

    /// Read the reply as an unsigned integer, rejecting negative values.
    pub fn as_u64(&self) -> Result<u64> {
        let value = self.as_i64()?;
        u64::try_from(value).map_err(|_| {
            RatelimitError::UnexpectedReply(format!("expected unsigned integer, got {}", value))
        })
    }

    /// Read the reply as an array.
    pub fn as_array(&self) -> Result<&[Reply]> {
        match self {
            Reply::Array(items) => Ok(items),
            other => Err(RatelimitError::UnexpectedReply(format!(
                "expected array, got {:?}",
                other
            ))),
        }
    }
}

/// Connection state of the store, informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// The capability the engine consumes from the backing store.
///
/// One method is sufficient: issue a command by name with string arguments
/// and surface the reply. Implementations are shared across all callers and
/// must be safe for concurrent use.
#[async_trait]
pub trait Store: Send + Sync {
    /// Issue a command and return its reply.
    async fn send_command(&self, cmd: &'static str, args: Vec<String>) -> Result<Reply>;

    /// Current connection state. Purely informational; the engine never
    /// gates calls on it.
    fn status(&self) -> ConnectionStatus {
        ConnectionStatus::Connected
    }
}

/// Execution context handed to every algorithm call.
#[derive(Clone)]
pub struct Context {
    /// The shared store client.
    pub store: Arc<dyn Store>,
}

impl Context {
    /// Create a context around a store.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Connection state of the underlying store.
    pub fn status(&self) -> ConnectionStatus {
        self.store.status()
    }
}
