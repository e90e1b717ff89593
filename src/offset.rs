//! Offset tracking for log reads.
//!
//! A compiled node reads each upstream stream through an [`OffsetCursor`]. The
//! cursor starts at [`ORIGIN`] and, after every non-empty batch, moves to the id
//! of the batch's last message. An empty batch never moves it.
//!
//! Hosts that want to resume a node across restarts hand it an [`OffsetStore`];
//! the node then starts from the committed position and commits after each batch.
//! Without a store every run re-reads from the origin.

use crate::runtime::StreamMessage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::trace;

/// Position before the first message of any stream.
pub const ORIGIN: &str = "0";

/// A log-assigned message id of the form `"<ms>-<seq>"`.
///
/// A bare `"<ms>"` is accepted with sequence `0`, so [`ORIGIN`] parses as `0-0`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct MessageId {
  /// Millisecond part.
  pub ms: u64,
  /// Sequence within the millisecond.
  pub seq: u64,
}

impl MessageId {
  /// Creates an id.
  pub fn new(ms: u64, seq: u64) -> Self {
    Self { ms, seq }
  }

  /// The smallest id strictly greater than this one.
  pub fn next(self) -> Self {
    match self.seq.checked_add(1) {
      Some(seq) => Self { ms: self.ms, seq },
      None => Self {
        ms: self.ms + 1,
        seq: 0,
      },
    }
  }
}

impl Display for MessageId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-{}", self.ms, self.seq)
  }
}

impl FromStr for MessageId {
  type Err = OffsetError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let invalid = || OffsetError::InvalidOffset(s.to_string());
    let (ms, seq) = match s.split_once('-') {
      Some((ms, seq)) => (ms, seq),
      None => (s, "0"),
    };
    Ok(Self {
      ms: ms.parse().map_err(|_| invalid())?,
      seq: seq.parse().map_err(|_| invalid())?,
    })
  }
}

/// Why a position could not be parsed, loaded or committed.
#[derive(Error, Debug)]
pub enum OffsetError {
  /// The offset file could not be read or written.
  #[error("offset file: {0}")]
  Io(#[from] io::Error),
  /// The offset file is not a JSON object of positions.
  #[error("offset encoding: {0}")]
  Serialization(String),
  /// A store lock was poisoned.
  #[error("offset store lock: {0}")]
  Lock(String),
  /// Not a `"<ms>-<seq>"` id.
  #[error("invalid offset '{0}'")]
  InvalidOffset(String),
}

/// Result alias for offset operations.
pub type OffsetResult<T> = Result<T, OffsetError>;

/// Last-consumed message id for one (consumer, stream) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetCursor {
  stream: String,
  position: String,
}

impl OffsetCursor {
  /// Creates a cursor at [`ORIGIN`].
  pub fn new(stream: impl Into<String>) -> Self {
    Self::resume(stream, ORIGIN)
  }

  /// Creates a cursor at a previously committed position.
  pub fn resume(stream: impl Into<String>, position: impl Into<String>) -> Self {
    Self {
      stream: stream.into(),
      position: position.into(),
    }
  }

  /// Creates a cursor from the store's committed position, or the origin.
  pub fn from_store(store: &dyn OffsetStore, consumer: &str, stream: &str) -> OffsetResult<Self> {
    let key = store_key(consumer, stream);
    Ok(match store.committed(&key)? {
      Some(position) => Self::resume(stream, position),
      None => Self::new(stream),
    })
  }

  /// Stream key this cursor reads.
  pub fn stream(&self) -> &str {
    &self.stream
  }

  /// The offset to pass to the next read.
  pub fn position(&self) -> &str {
    &self.position
  }

  /// True while nothing has been consumed.
  pub fn at_origin(&self) -> bool {
    self.position == ORIGIN
  }

  /// Moves to the id of the batch's last message. Returns `false`, leaving the
  /// cursor untouched, for an empty batch.
  pub fn advance(&mut self, batch: &[StreamMessage]) -> bool {
    match batch.last() {
      Some(last) => {
        trace!(stream = %self.stream, from = %self.position, to = %last.id, "OffsetCursor::advance");
        self.position = last.id.clone();
        true
      }
      None => false,
    }
  }

  /// Writes the current position to `store` under `consumer`.
  pub fn commit(&self, store: &dyn OffsetStore, consumer: &str) -> OffsetResult<()> {
    store.commit(&store_key(consumer, &self.stream), self.position.clone())
  }

  /// Returns to the origin.
  pub fn reset(&mut self) {
    self.position = ORIGIN.to_string();
  }
}

/// Store key for one consumer's cursor over one stream.
pub fn store_key(consumer: &str, stream: &str) -> String {
  format!("{}@{}", consumer, stream)
}

/// Durable home for committed cursor positions, keyed by [`store_key`].
pub trait OffsetStore: Send + Sync + fmt::Debug {
  /// Position committed under `key`, if any.
  fn committed(&self, key: &str) -> OffsetResult<Option<String>>;

  /// Records `offset` under `key`, replacing any earlier position.
  fn commit(&self, key: &str, offset: String) -> OffsetResult<()>;

  /// Every committed position.
  fn positions(&self) -> OffsetResult<HashMap<String, String>>;

  /// Drops the position under `key`; the next reader starts at the origin.
  fn forget(&self, key: &str) -> OffsetResult<()>;
}

fn lock_error<E: Display>(e: E) -> OffsetError {
  OffsetError::Lock(e.to_string())
}

/// Positions held in memory; they survive re-running a node within one
/// process, not a restart.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOffsetStore {
  positions: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryOffsetStore {
  /// Creates an empty store.
  pub fn new() -> Self {
    Self::default()
  }
}

impl OffsetStore for InMemoryOffsetStore {
  fn committed(&self, key: &str) -> OffsetResult<Option<String>> {
    Ok(self.positions.read().map_err(lock_error)?.get(key).cloned())
  }

  fn commit(&self, key: &str, offset: String) -> OffsetResult<()> {
    self
      .positions
      .write()
      .map_err(lock_error)?
      .insert(key.to_string(), offset);
    Ok(())
  }

  fn positions(&self) -> OffsetResult<HashMap<String, String>> {
    Ok(self.positions.read().map_err(lock_error)?.clone())
  }

  fn forget(&self, key: &str) -> OffsetResult<()> {
    self.positions.write().map_err(lock_error)?.remove(key);
    Ok(())
  }
}

/// Positions mirrored to a JSON object on disk, rewritten on every change.
#[derive(Debug, Clone)]
pub struct FileOffsetStore {
  path: PathBuf,
  positions: Arc<RwLock<HashMap<String, String>>>,
}

impl FileOffsetStore {
  /// Opens the store at `path`. A missing or blank file starts empty.
  pub fn new<P: AsRef<Path>>(path: P) -> OffsetResult<Self> {
    let path = path.as_ref().to_path_buf();
    let text = match fs::read_to_string(&path) {
      Ok(text) => text,
      Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
      Err(e) => return Err(e.into()),
    };
    let positions = if text.trim().is_empty() {
      HashMap::new()
    } else {
      serde_json::from_str(&text).map_err(|e| OffsetError::Serialization(e.to_string()))?
    };
    trace!(path = %path.display(), count = positions.len(), "FileOffsetStore::new");
    Ok(Self {
      path,
      positions: Arc::new(RwLock::new(positions)),
    })
  }

  /// Location of the backing file.
  pub fn path(&self) -> &Path {
    &self.path
  }

  fn update<F>(&self, change: F) -> OffsetResult<()>
  where
    F: FnOnce(&mut HashMap<String, String>),
  {
    let mut positions = self.positions.write().map_err(lock_error)?;
    change(&mut positions);
    if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
      fs::create_dir_all(dir)?;
    }
    let text = serde_json::to_string_pretty(&*positions)
      .map_err(|e| OffsetError::Serialization(e.to_string()))?;
    fs::write(&self.path, text)?;
    Ok(())
  }
}

impl OffsetStore for FileOffsetStore {
  fn committed(&self, key: &str) -> OffsetResult<Option<String>> {
    Ok(self.positions.read().map_err(lock_error)?.get(key).cloned())
  }

  fn commit(&self, key: &str, offset: String) -> OffsetResult<()> {
    self.update(|positions| {
      positions.insert(key.to_string(), offset);
    })
  }

  fn positions(&self) -> OffsetResult<HashMap<String, String>> {
    Ok(self.positions.read().map_err(lock_error)?.clone())
  }

  fn forget(&self, key: &str) -> OffsetResult<()> {
    self.update(|positions| {
      positions.remove(key);
    })
  }
}
