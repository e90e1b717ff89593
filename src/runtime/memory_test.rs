use crate::event::Body;
use crate::runtime::{BufferedSink, InMemoryStreamRuntime, StreamingRuntime, TraceSink};
use std::sync::Arc;
use uuid::Uuid;

const TYPE: &str = "logweave::sources::TestSource";

fn body(value: &str) -> Body {
  let mut body = Body::new();
  body.insert("Att".to_string(), value.to_string());
  body
}

#[tokio::test]
async fn test_write_then_read_from_origin() {
  let runtime = InMemoryStreamRuntime::new();
  let id = Uuid::new_v4();
  let first = runtime.write_events(body("1"), TYPE, id).await.unwrap();
  let second = runtime.write_events(body("2"), TYPE, id).await.unwrap();
  assert_eq!(first, "1-0");
  assert_eq!(second, "2-0");

  let batch = runtime.read_events(TYPE, id, "0", None).await.unwrap();
  assert_eq!(batch.len(), 2);
  assert_eq!(batch[0].id, "1-0");
  assert_eq!(batch[1].body, Some(body("2")));
}

#[tokio::test]
async fn test_read_is_strictly_after_offset() {
  let runtime = InMemoryStreamRuntime::new();
  let id = Uuid::new_v4();
  for v in ["a", "b", "c"] {
    runtime.write_events(body(v), TYPE, id).await.unwrap();
  }
  let batch = runtime.read_events(TYPE, id, "2-0", None).await.unwrap();
  assert_eq!(batch.len(), 1);
  assert_eq!(batch[0].id, "3-0");

  let empty = runtime.read_events(TYPE, id, "3-0", None).await.unwrap();
  assert!(empty.is_empty());
}

#[tokio::test]
async fn test_page_size_bounds_batch() {
  let runtime = InMemoryStreamRuntime::new();
  let id = Uuid::new_v4();
  for v in 0..5 {
    runtime.write_events(body(&v.to_string()), TYPE, id).await.unwrap();
  }
  let batch = runtime.read_events(TYPE, id, "0", Some(2)).await.unwrap();
  let ids: Vec<_> = batch.iter().map(|m| m.id.as_str()).collect();
  assert_eq!(ids, vec!["1-0", "2-0"]);
}

#[tokio::test]
async fn test_streams_are_isolated() {
  let runtime = InMemoryStreamRuntime::new();
  let a = Uuid::new_v4();
  let b = Uuid::new_v4();
  runtime.write_events(body("x"), TYPE, a).await.unwrap();
  runtime.write_events(body("y"), TYPE, b).await.unwrap();

  assert_eq!(runtime.stream_len(TYPE, a), 1);
  let batch = runtime.read_events(TYPE, b, "0", None).await.unwrap();
  assert_eq!(batch.len(), 1);
  assert_eq!(batch[0].id, "2-0");
  assert!(runtime.read_events("other", a, "0", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_null_bodies_are_readable() {
  let runtime = InMemoryStreamRuntime::new();
  let id = Uuid::new_v4();
  runtime.append(TYPE, id, None).unwrap();
  let batch = runtime.read_events(TYPE, id, "0", None).await.unwrap();
  assert_eq!(batch[0].body, None);
  assert!(batch[0].event().is_none());
}

#[tokio::test]
async fn test_invalid_offset_is_transport_error() {
  let runtime = InMemoryStreamRuntime::new();
  let result = runtime.read_events(TYPE, Uuid::new_v4(), "nope", None).await;
  assert!(result.is_err());
}

#[tokio::test]
async fn test_start_and_shutdown() {
  let runtime = InMemoryStreamRuntime::new();
  assert!(!runtime.is_running());
  runtime.start().await.unwrap();
  assert!(runtime.is_running());
  runtime.shutdown().await.unwrap();
  assert!(!runtime.is_running());
}

#[test]
fn test_standard_out_goes_to_injected_sink() {
  let sink = Arc::new(BufferedSink::new());
  let runtime = InMemoryStreamRuntime::with_sink(sink.clone());
  runtime.standard_out().emit("hello");
  assert_eq!(sink.lines(), vec!["hello".to_string()]);
}
