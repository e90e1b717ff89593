use crate::event::Body;
use crate::offset::{
  FileOffsetStore, InMemoryOffsetStore, MessageId, ORIGIN, OffsetCursor, OffsetError, OffsetStore,
  store_key,
};
use crate::runtime::StreamMessage;
use tempfile::TempDir;

fn message(id: &str) -> StreamMessage {
  StreamMessage::new(id, Some(Body::new()))
}

// ============================================================================
// MessageId
// ============================================================================

#[test]
fn test_message_id_parse_and_display() {
  let id: MessageId = "1526919030474-55".parse().unwrap();
  assert_eq!(id, MessageId::new(1526919030474, 55));
  assert_eq!(id.to_string(), "1526919030474-55");
}

#[test]
fn test_origin_parses_as_zero() {
  let id: MessageId = ORIGIN.parse().unwrap();
  assert_eq!(id, MessageId::new(0, 0));
}

#[test]
fn test_message_id_ordering() {
  let a = MessageId::new(5, 9);
  let b = MessageId::new(6, 0);
  assert!(a < b);
  assert!(a.next() > a);
  assert_eq!(MessageId::new(1, u64::MAX).next(), MessageId::new(2, 0));
}

#[test]
fn test_message_id_rejects_garbage() {
  let result = "abc-1".parse::<MessageId>();
  assert!(matches!(result, Err(OffsetError::InvalidOffset(ref s)) if s == "abc-1"));
}

// ============================================================================
// OffsetCursor
// ============================================================================

#[test]
fn test_cursor_starts_at_origin() {
  let cursor = OffsetCursor::new("stream");
  assert!(cursor.at_origin());
  assert_eq!(cursor.position(), "0");
  assert_eq!(cursor.stream(), "stream");
}

#[test]
fn test_cursor_moves_to_last_id_of_batch() {
  let mut cursor = OffsetCursor::new("stream");
  assert!(cursor.advance(&[message("1-0"), message("2-0"), message("3-0")]));
  assert_eq!(cursor.position(), "3-0");
}

#[test]
fn test_cursor_ignores_empty_batch() {
  let mut cursor = OffsetCursor::new("stream");
  cursor.advance(&[message("4-0")]);
  assert!(!cursor.advance(&[]));
  assert_eq!(cursor.position(), "4-0");
}

#[test]
fn test_cursor_reset() {
  let mut cursor = OffsetCursor::resume("stream", "9-0");
  cursor.reset();
  assert!(cursor.at_origin());
}

#[test]
fn test_cursor_commit_and_resume() {
  let store = InMemoryOffsetStore::new();
  let mut cursor = OffsetCursor::from_store(&store, "consumer", "stream").unwrap();
  assert!(cursor.at_origin());

  cursor.advance(&[message("7-1")]);
  cursor.commit(&store, "consumer").unwrap();

  let resumed = OffsetCursor::from_store(&store, "consumer", "stream").unwrap();
  assert_eq!(resumed.position(), "7-1");

  let other = OffsetCursor::from_store(&store, "someone-else", "stream").unwrap();
  assert!(other.at_origin());
}

// ============================================================================
// Stores
// ============================================================================

#[test]
fn test_in_memory_store_roundtrip() {
  let store = InMemoryOffsetStore::new();
  assert_eq!(store.committed("a").unwrap(), None);
  store.commit("a", "1-0".to_string()).unwrap();
  store.commit("b", "2-0".to_string()).unwrap();
  store.commit("a", "3-0".to_string()).unwrap();
  assert_eq!(store.committed("a").unwrap(), Some("3-0".to_string()));
  assert_eq!(store.positions().unwrap().len(), 2);
  store.forget("a").unwrap();
  assert_eq!(store.committed("a").unwrap(), None);
  assert_eq!(store.positions().unwrap().len(), 1);
}

#[test]
fn test_in_memory_store_clones_share_state() {
  let store = InMemoryOffsetStore::new();
  let clone = store.clone();
  store.commit("k", "5-0".to_string()).unwrap();
  assert_eq!(clone.committed("k").unwrap(), Some("5-0".to_string()));
}

#[test]
fn test_file_store_persists_across_instances() {
  let dir = TempDir::new().unwrap();
  let path = dir.path().join("nested").join("offsets.json");

  {
    let store = FileOffsetStore::new(&path).unwrap();
    store
      .commit(&store_key("sink", "src:1"), "12-3".to_string())
      .unwrap();
  }

  let reopened = FileOffsetStore::new(&path).unwrap();
  assert_eq!(reopened.path(), path.as_path());
  assert_eq!(
    reopened.committed(&store_key("sink", "src:1")).unwrap(),
    Some("12-3".to_string())
  );

  reopened.forget(&store_key("sink", "src:1")).unwrap();
  assert!(FileOffsetStore::new(&path).unwrap().positions().unwrap().is_empty());
}

#[test]
fn test_file_store_empty_file_is_empty_store() {
  let dir = TempDir::new().unwrap();
  let path = dir.path().join("offsets.json");
  std::fs::write(&path, "").unwrap();
  let store = FileOffsetStore::new(&path).unwrap();
  assert!(store.positions().unwrap().is_empty());
}

#[test]
fn test_file_store_corrupt_file_is_error() {
  let dir = TempDir::new().unwrap();
  let path = dir.path().join("offsets.json");
  std::fs::write(&path, "{not json").unwrap();
  assert!(matches!(
    FileOffsetStore::new(&path),
    Err(OffsetError::Serialization(_))
  ));
}
