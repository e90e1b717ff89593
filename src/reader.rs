//! Offset-cursor reads of one upstream stream.

use crate::error::{Error, ProcessingError};
use crate::offset::{OffsetCursor, OffsetStore, store_key};
use crate::port::{Input, StreamReference};
use crate::runtime::{StreamMessage, StreamingRuntime};
use std::sync::Arc;
use tracing::trace;
use uuid::Uuid;

/// Reads a producer's stream batch by batch, each message at most once.
///
/// The cursor passed to the next read is always the id of the previous
/// non-empty batch's last message; an empty batch leaves it where it was.
/// With a store attached the position is committed after every batch, unless
/// the reader was switched to [`StreamReader::with_manual_commit`].
pub struct StreamReader {
  consumer: Uuid,
  consumer_key: String,
  reference: StreamReference,
  attribute: String,
  cursor: OffsetCursor,
  page_size: Option<usize>,
  store: Option<Arc<dyn OffsetStore>>,
  auto_commit: bool,
}

impl StreamReader {
  /// Creates a reader for a connected input, positioned at the origin.
  pub fn for_input(component: &str, consumer: Uuid, input: &Input) -> Result<Self, ProcessingError> {
    let missing = || ProcessingError::MissingReference {
      component: component.to_string(),
      input: input.name().to_string(),
    };
    let reference = input.reference().cloned().ok_or_else(missing)?;
    let attribute = input.source_attribute().ok_or_else(missing)?.to_string();
    Ok(Self {
      consumer,
      consumer_key: consumer.to_string(),
      cursor: OffsetCursor::new(reference.stream_key()),
      reference,
      attribute,
      page_size: None,
      store: None,
      auto_commit: true,
    })
  }

  /// Creates a reader for a connected input, resuming from `store` when given.
  pub fn open(
    component: &str,
    consumer: Uuid,
    input: &Input,
    store: Option<Arc<dyn OffsetStore>>,
  ) -> Result<Self, ProcessingError> {
    let mut reader = Self::for_input(component, consumer, input)?;
    if let Some(store) = store {
      reader.attach_store(store)?;
    }
    Ok(reader)
  }

  /// Bounds every read to `page_size` messages.
  #[must_use]
  pub fn with_page_size(mut self, page_size: Option<usize>) -> Self {
    self.page_size = page_size;
    self
  }

  /// Keys committed positions by consumer and input name, for consumers with
  /// several inputs that may share a producer. Call before attaching a store.
  #[must_use]
  pub fn keyed_by_input(mut self, input: &str) -> Self {
    self.consumer_key = format!("{}/{}", self.consumer, input);
    self
  }

  /// Leaves committing to [`StreamReader::commit_through`].
  #[must_use]
  pub fn with_manual_commit(mut self) -> Self {
    self.auto_commit = false;
    self
  }

  /// Resumes from, and commits to, `store`.
  pub fn attach_store(&mut self, store: Arc<dyn OffsetStore>) -> Result<(), ProcessingError> {
    self.cursor = OffsetCursor::from_store(
      store.as_ref(),
      &self.consumer_key,
      &self.reference.stream_key(),
    )
    .map_err(|e| ProcessingError::Transport(e.to_string()))?;
    self.store = Some(store);
    Ok(())
  }

  /// The producer attribute this reader's consumer uses.
  pub fn attribute(&self) -> &str {
    &self.attribute
  }

  /// The bound producer.
  pub fn reference(&self) -> &StreamReference {
    &self.reference
  }

  /// Offset the next read will use.
  pub fn position(&self) -> &str {
    self.cursor.position()
  }

  /// Reads the next batch and advances past it.
  pub async fn next_batch(
    &mut self,
    runtime: &dyn StreamingRuntime,
  ) -> Result<Vec<StreamMessage>, Error> {
    let batch = runtime
      .read_events(
        &self.reference.producer_type,
        self.reference.producer_id,
        self.cursor.position(),
        self.page_size,
      )
      .await?;
    trace!(
      consumer = %self.consumer,
      stream = %self.cursor.stream(),
      offset = %self.cursor.position(),
      count = batch.len(),
      "StreamReader::next_batch"
    );
    if self.cursor.advance(&batch) && self.auto_commit {
      if let Some(store) = &self.store {
        self
          .cursor
          .commit(store.as_ref(), &self.consumer_key)
          .map_err(|e| ProcessingError::Transport(e.to_string()))?;
      }
    }
    Ok(batch)
  }

  /// Commits `offset`, an id this reader has already returned, as the
  /// consumed position. A no-op without a store.
  pub fn commit_through(&self, offset: &str) -> Result<(), ProcessingError> {
    let Some(store) = &self.store else {
      return Ok(());
    };
    trace!(
      consumer = %self.consumer_key,
      stream = %self.cursor.stream(),
      offset,
      "StreamReader::commit_through"
    );
    store
      .commit(&store_key(&self.consumer_key, self.cursor.stream()), offset.to_string())
      .map_err(|e| ProcessingError::Transport(e.to_string()))
  }
}
