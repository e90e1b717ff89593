//! Redis Streams backed runtime.
//!
//! Each producer stream is a Redis stream named by its stream key. Reads use
//! `XREAD COUNT n STREAMS key offset` (non-blocking: an exhausted stream returns
//! an empty batch, which completes the reading node). Writes use `XADD key *`.

use super::{StreamMessage, StreamingRuntime, TraceSink, TracingSink};
use crate::config::RedisRuntimeConfig;
use crate::error::ProcessingError;
use crate::event::Body;
use crate::port::stream_key;
use async_trait::async_trait;
use redis::{AsyncCommands, Client, RedisResult, aio::ConnectionManager, streams::StreamReadReply};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, trace};
use uuid::Uuid;

/// Streaming runtime over a Redis server.
///
/// Connects lazily on first use when [`StreamingRuntime::start`] was not called.
pub struct RedisStreamRuntime {
  config: RedisRuntimeConfig,
  connection: Mutex<Option<ConnectionManager>>,
  out: Arc<dyn TraceSink>,
}

impl RedisStreamRuntime {
  /// Creates an unconnected runtime tracing to [`TracingSink`].
  pub fn new(config: RedisRuntimeConfig) -> Self {
    Self::with_sink(config, Arc::new(TracingSink))
  }

  /// Creates an unconnected runtime tracing to `out`.
  pub fn with_sink(config: RedisRuntimeConfig, out: Arc<dyn TraceSink>) -> Self {
    Self {
      config,
      connection: Mutex::new(None),
      out,
    }
  }

  /// The runtime configuration.
  pub fn config(&self) -> &RedisRuntimeConfig {
    &self.config
  }

  async fn connection(&self) -> Result<ConnectionManager, ProcessingError> {
    let mut slot = self.connection.lock().await;
    if let Some(connection) = slot.as_ref() {
      return Ok(connection.clone());
    }
    let client = Client::open(self.config.connection_url.as_str()).map_err(|e| {
      error!(url = %self.config.connection_url, error = %e, "Failed to create Redis client");
      ProcessingError::Transport(e.to_string())
    })?;
    let connection = client.get_connection_manager().await.map_err(|e| {
      error!(url = %self.config.connection_url, error = %e, "Failed to connect to Redis");
      ProcessingError::Transport(e.to_string())
    })?;
    *slot = Some(connection.clone());
    Ok(connection)
  }
}

#[async_trait]
impl StreamingRuntime for RedisStreamRuntime {
  async fn start(&self) -> Result<(), ProcessingError> {
    debug!(url = %self.config.connection_url, "RedisStreamRuntime::start");
    self.connection().await.map(|_| ())
  }

  async fn shutdown(&self) -> Result<(), ProcessingError> {
    debug!(url = %self.config.connection_url, "RedisStreamRuntime::shutdown");
    self.connection.lock().await.take();
    Ok(())
  }

  async fn read_events(
    &self,
    producer_type: &str,
    producer_id: Uuid,
    offset: &str,
    page_size: Option<usize>,
  ) -> Result<Vec<StreamMessage>, ProcessingError> {
    let mut connection = self.connection().await?;
    let key = stream_key(producer_type, producer_id);

    let mut command = redis::cmd("XREAD");
    if let Some(count) = page_size.or(self.config.default_page_size) {
      command.arg("COUNT").arg(count);
    }
    command.arg("STREAMS").arg(&key).arg(offset);

    // A nil reply (nothing after offset) decodes to an empty reply.
    let reply: RedisResult<Option<StreamReadReply>> = command.query_async(&mut connection).await;
    let reply = reply.map_err(|e| {
      error!(stream = %key, offset = %offset, error = %e, "XREAD failed");
      ProcessingError::Transport(e.to_string())
    })?;

    let mut batch = Vec::new();
    for stream in reply.map(|r| r.keys).unwrap_or_default() {
      for entry in stream.ids {
        let body = if entry.map.is_empty() {
          None
        } else {
          let mut body = Body::new();
          for (field, value) in &entry.map {
            let text: String = redis::from_redis_value(value)
              .map_err(|e| ProcessingError::Serialization(e.to_string()))?;
            body.insert(field.clone(), text);
          }
          Some(body)
        };
        batch.push(StreamMessage::new(entry.id, body));
      }
    }
    trace!(stream = %key, offset = %offset, count = batch.len(), "RedisStreamRuntime::read_events");
    Ok(batch)
  }

  async fn write_events(
    &self,
    body: Body,
    producer_type: &str,
    producer_id: Uuid,
  ) -> Result<String, ProcessingError> {
    let mut connection = self.connection().await?;
    let key = stream_key(producer_type, producer_id);
    let fields: Vec<(String, String)> = body.into_iter().collect();
    let result: RedisResult<String> = connection.xadd(&key, "*", &fields).await;
    result.map_err(|e| {
      error!(stream = %key, error = %e, "XADD failed");
      ProcessingError::Transport(e.to_string())
    })
  }

  fn standard_out(&self) -> &dyn TraceSink {
    self.out.as_ref()
  }
}
