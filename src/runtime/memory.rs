//! Process-local event log.

use super::{StreamMessage, StreamingRuntime, TraceSink, TracingSink};
use crate::error::ProcessingError;
use crate::event::Body;
use crate::offset::MessageId;
use crate::port::stream_key;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace};
use uuid::Uuid;

#[derive(Debug, Default)]
struct LogState {
  streams: HashMap<String, Vec<(MessageId, Option<Body>)>>,
  last: u64,
}

/// An append-only, offset-addressable log held in memory.
///
/// Ids are `"<n>-0"` with `n` increasing across the whole log, so they are
/// ordered within each stream the way a Redis stream's are. Reads do not require
/// [`StreamingRuntime::start`].
pub struct InMemoryStreamRuntime {
  state: Mutex<LogState>,
  running: AtomicBool,
  out: Arc<dyn TraceSink>,
}

impl Default for InMemoryStreamRuntime {
  fn default() -> Self {
    Self::new()
  }
}

impl InMemoryStreamRuntime {
  /// Creates an empty log tracing to [`TracingSink`].
  pub fn new() -> Self {
    Self::with_sink(Arc::new(TracingSink))
  }

  /// Creates an empty log tracing to `out`.
  pub fn with_sink(out: Arc<dyn TraceSink>) -> Self {
    Self {
      state: Mutex::new(LogState::default()),
      running: AtomicBool::new(false),
      out,
    }
  }

  fn lock(&self) -> Result<MutexGuard<'_, LogState>, ProcessingError> {
    self
      .state
      .lock()
      .map_err(|e| ProcessingError::Transport(format!("log lock poisoned: {}", e)))
  }

  /// Appends a message, possibly without a body, and returns its id.
  pub fn append(
    &self,
    producer_type: &str,
    producer_id: Uuid,
    body: Option<Body>,
  ) -> Result<String, ProcessingError> {
    let mut state = self.lock()?;
    state.last += 1;
    let id = MessageId::new(state.last, 0);
    state
      .streams
      .entry(stream_key(producer_type, producer_id))
      .or_default()
      .push((id, body));
    Ok(id.to_string())
  }

  /// Every message of a stream, oldest first.
  pub fn messages(&self, producer_type: &str, producer_id: Uuid) -> Vec<StreamMessage> {
    let Ok(state) = self.lock() else {
      return Vec::new();
    };
    state
      .streams
      .get(&stream_key(producer_type, producer_id))
      .map(|entries| {
        entries
          .iter()
          .map(|(id, body)| StreamMessage::new(id.to_string(), body.clone()))
          .collect()
      })
      .unwrap_or_default()
  }

  /// Number of messages in a stream.
  pub fn stream_len(&self, producer_type: &str, producer_id: Uuid) -> usize {
    self
      .lock()
      .ok()
      .and_then(|state| {
        state
          .streams
          .get(&stream_key(producer_type, producer_id))
          .map(Vec::len)
      })
      .unwrap_or(0)
  }

  /// Whether `start` was called without a later `shutdown`.
  pub fn is_running(&self) -> bool {
    self.running.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl StreamingRuntime for InMemoryStreamRuntime {
  async fn start(&self) -> Result<(), ProcessingError> {
    debug!("InMemoryStreamRuntime::start");
    self.running.store(true, Ordering::SeqCst);
    Ok(())
  }

  async fn shutdown(&self) -> Result<(), ProcessingError> {
    debug!("InMemoryStreamRuntime::shutdown");
    self.running.store(false, Ordering::SeqCst);
    Ok(())
  }

  async fn read_events(
    &self,
    producer_type: &str,
    producer_id: Uuid,
    offset: &str,
    page_size: Option<usize>,
  ) -> Result<Vec<StreamMessage>, ProcessingError> {
    let after: MessageId = offset
      .parse()
      .map_err(|e| ProcessingError::Transport(format!("{}", e)))?;
    let state = self.lock()?;
    let key = stream_key(producer_type, producer_id);
    let limit = page_size.unwrap_or(usize::MAX);
    let batch: Vec<StreamMessage> = state
      .streams
      .get(&key)
      .map(|entries| {
        entries
          .iter()
          .filter(|(id, _)| *id > after)
          .take(limit)
          .map(|(id, body)| StreamMessage::new(id.to_string(), body.clone()))
          .collect()
      })
      .unwrap_or_default();
    trace!(stream = %key, offset = %offset, count = batch.len(), "InMemoryStreamRuntime::read_events");
    Ok(batch)
  }

  async fn write_events(
    &self,
    body: Body,
    producer_type: &str,
    producer_id: Uuid,
  ) -> Result<String, ProcessingError> {
    self.append(producer_type, producer_id, Some(body))
  }

  fn standard_out(&self) -> &dyn TraceSink {
    self.out.as_ref()
  }
}
