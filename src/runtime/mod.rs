//! # Streaming Runtime
//!
//! The contract compiled nodes use to talk to the event log.
//!
//! Every producer owns one append-only stream whose key is
//! `"<fullTypeName>:<uuid>"` (see [`crate::port::stream_key`]). Messages carry a
//! log-assigned id, ordered per stream, and a body mapping attribute names to
//! text. Consumers read strictly after an offset and advance their
//! [`crate::offset::OffsetCursor`] themselves.
//!
//! ## Implementations
//!
//! - [`InMemoryStreamRuntime`]: process-local log, used by tests and the
//!   single-process engine.
//! - `RedisStreamRuntime` (feature `redis`): XREAD/XADD against a Redis server.
//!
//! ## Tracing
//!
//! [`StreamingRuntime::standard_out`] returns the [`TraceSink`] sinks write
//! their per-message output to. Nodes never print directly.

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

#[cfg(test)]
mod memory_test;

pub use memory::InMemoryStreamRuntime;
#[cfg(feature = "redis")]
pub use redis::RedisStreamRuntime;

use crate::error::ProcessingError;
use crate::event::{Body, Event};
use async_trait::async_trait;
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// One message as read from the log. A `None` body marks a message whose
/// payload could not be recovered; consumers log and skip it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
  /// Log-assigned id, `"<ms>-<seq>"`.
  pub id: String,
  /// Attribute map, if present.
  pub body: Option<Body>,
}

impl StreamMessage {
  /// Creates a message.
  pub fn new(id: impl Into<String>, body: Option<Body>) -> Self {
    Self {
      id: id.into(),
      body,
    }
  }

  /// The body as an [`Event`].
  pub fn event(&self) -> Option<Event> {
    self.body.clone().map(Event::new)
  }
}

/// Destination for human-readable node output.
pub trait TraceSink: Send + Sync {
  /// Emits one line.
  fn emit(&self, line: &str);
}

/// Forwards every line to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TraceSink for TracingSink {
  fn emit(&self, line: &str) {
    info!(target: "logweave::stdout", "{}", line);
  }
}

/// Captures lines in memory.
#[derive(Debug, Default)]
pub struct BufferedSink {
  lines: Mutex<Vec<String>>,
}

impl BufferedSink {
  /// Creates an empty sink.
  pub fn new() -> Self {
    Self::default()
  }

  /// Lines emitted so far.
  pub fn lines(&self) -> Vec<String> {
    match self.lines.lock() {
      Ok(lines) => lines.clone(),
      Err(poisoned) => poisoned.into_inner().clone(),
    }
  }
}

impl TraceSink for BufferedSink {
  fn emit(&self, line: &str) {
    match self.lines.lock() {
      Ok(mut lines) => lines.push(line.to_string()),
      Err(poisoned) => poisoned.into_inner().push(line.to_string()),
    }
  }
}

/// Abstract read/write access to the event log.
///
/// Calls are awaited one at a time by each node's loop; there is no built-in
/// timeout.
#[async_trait]
pub trait StreamingRuntime: Send + Sync {
  /// Prepares the transport (connects, allocates).
  async fn start(&self) -> Result<(), ProcessingError>;

  /// Releases the transport.
  async fn shutdown(&self) -> Result<(), ProcessingError>;

  /// Reads messages of producer `producer_type:producer_id` with ids strictly
  /// after `offset`, oldest first, at most `page_size` of them when given.
  async fn read_events(
    &self,
    producer_type: &str,
    producer_id: Uuid,
    offset: &str,
    page_size: Option<usize>,
  ) -> Result<Vec<StreamMessage>, ProcessingError>;

  /// Appends `body` to the producer's stream, returning the assigned id.
  async fn write_events(
    &self,
    body: Body,
    producer_type: &str,
    producer_id: Uuid,
  ) -> Result<String, ProcessingError>;

  /// Sink for per-message trace output.
  fn standard_out(&self) -> &dyn TraceSink;
}
