use crate::attribute::{Attribute, EventType};
use crate::component::{Compilable, Component, Connectable, NodeOutcome, RunState};
use crate::error::{Error, ProcessingError, Violation};
use crate::event::Body;
use crate::offset::{InMemoryOffsetStore, OffsetStore, store_key};
use crate::port::StreamReference;
use crate::processors::sma::{self, Sma};
use crate::runtime::{InMemoryStreamRuntime, StreamMessage, StreamingRuntime, TraceSink};
use crate::value::ValueType;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const UPSTREAM: &str = "test::Values";

fn upstream(runtime: &InMemoryStreamRuntime, values: &[&str]) -> StreamReference {
  let id = Uuid::new_v4();
  for v in values {
    let mut body = Body::new();
    body.insert("value".to_string(), v.to_string());
    runtime.append(UPSTREAM, id, Some(body)).unwrap();
  }
  StreamReference::new(
    UPSTREAM,
    id,
    EventType::new().with(Attribute::new("value", ValueType::Double)),
  )
}

fn connected_sma(reference: StreamReference, window: i64) -> Sma {
  let mut sma = Sma::new_template();
  sma.window_length_mut().set(window).unwrap();
  sma.input_mut("Input").unwrap().connect(reference, None).unwrap();
  sma
}

fn averages(runtime: &InMemoryStreamRuntime, sma: &Sma) -> Vec<f64> {
  runtime
    .messages(sma::TYPE_NAME, sma.id())
    .iter()
    .map(|m| m.event().unwrap().get_f64("average").unwrap())
    .collect()
}

#[tokio::test]
async fn test_window_of_three_over_one_to_five() {
  let runtime = InMemoryStreamRuntime::new();
  let reference = upstream(&runtime, &["1", "2", "3", "4", "5"]);
  let sma = connected_sma(reference, 3);

  let mut node = sma.compile().unwrap();
  let outcome = node.run(&runtime, &CancellationToken::new()).await.unwrap();
  assert_eq!(outcome, NodeOutcome::State(RunState::Complete));

  let out = averages(&runtime, &sma);
  assert_eq!(out, vec![1.0, 1.5, 2.0, 3.0, 4.0]);
  assert_eq!(&out[2..], &[2.0, 3.0, 4.0]);
}

#[tokio::test]
async fn test_null_and_non_numeric_values_are_skipped() {
  let runtime = InMemoryStreamRuntime::new();
  let reference = upstream(&runtime, &["2", "oops"]);
  runtime
    .append(UPSTREAM, reference.producer_id, None)
    .unwrap();
  let mut last = Body::new();
  last.insert("value".to_string(), "4".to_string());
  runtime
    .append(UPSTREAM, reference.producer_id, Some(last))
    .unwrap();
  let sma = connected_sma(reference, 2);

  let mut node = sma.compile().unwrap();
  node.run(&runtime, &CancellationToken::new()).await.unwrap();
  assert_eq!(averages(&runtime, &sma), vec![2.0, 3.0]);
}

#[test]
fn test_unconnected_sma_does_not_compile() {
  let sma = Sma::new_template();
  let err = sma.compile().unwrap_err();
  assert_eq!(
    err.violations(),
    &[Violation::UnconnectedInput {
      component: "SMA".to_string(),
      input: "Input".to_string(),
    }]
  );
}

#[test]
fn test_window_length_rejects_zero() {
  let mut sma = Sma::new_template();
  assert!(sma.window_length_mut().set(0).is_err());
  assert_eq!(sma.window_length().value(), Some(&10));
}

#[tokio::test]
async fn test_compiled_snapshot_ignores_later_template_changes() {
  let runtime = InMemoryStreamRuntime::new();
  let reference = upstream(&runtime, &["1", "2", "3"]);
  let mut sma = connected_sma(reference, 1);
  let mut node = sma.compile().unwrap();

  sma.window_length_mut().set(3).unwrap();
  sma.input_mut("Input").unwrap().disconnect();

  node.run(&runtime, &CancellationToken::new()).await.unwrap();
  assert_eq!(averages(&runtime, &sma), vec![1.0, 2.0, 3.0]);
}

#[tokio::test]
async fn test_cancelled_before_first_read() {
  let runtime = InMemoryStreamRuntime::new();
  let reference = upstream(&runtime, &["1"]);
  let sma = connected_sma(reference, 2);
  let cancel = CancellationToken::new();
  cancel.cancel();

  let mut node = sma.compile().unwrap();
  let outcome = node.run(&runtime, &cancel).await.unwrap();
  assert_eq!(outcome, NodeOutcome::State(RunState::Cancelled));
  assert_eq!(runtime.stream_len(sma::TYPE_NAME, sma.id()), 0);
}

#[tokio::test]
async fn test_resumes_from_offset_store() {
  let runtime = InMemoryStreamRuntime::new();
  let reference = upstream(&runtime, &["1", "2", "3"]);
  let sma = connected_sma(reference.clone(), 5);
  let store: Arc<dyn OffsetStore> = Arc::new(InMemoryOffsetStore::new());
  store
    .commit(
      &store_key(&sma.id().to_string(), &reference.stream_key()),
      "2-0".to_string(),
    )
    .unwrap();

  let mut node = sma.compile().unwrap();
  node.attach_offset_store(store.clone());
  node.run(&runtime, &CancellationToken::new()).await.unwrap();

  assert_eq!(averages(&runtime, &sma), vec![3.0]);
  assert_eq!(
    store
      .committed(&store_key(&sma.id().to_string(), &reference.stream_key()))
      .unwrap()
      .as_deref(),
    Some("3-0")
  );
}

/// Records every offset passed to `read_events`.
struct RecordingRuntime {
  inner: InMemoryStreamRuntime,
  offsets: Mutex<Vec<String>>,
  fail_reads: bool,
}

impl RecordingRuntime {
  fn new(inner: InMemoryStreamRuntime) -> Self {
    Self {
      inner,
      offsets: Mutex::new(Vec::new()),
      fail_reads: false,
    }
  }

  fn offsets(&self) -> Vec<String> {
    self.offsets.lock().unwrap().clone()
  }
}

#[async_trait]
impl StreamingRuntime for RecordingRuntime {
  async fn start(&self) -> Result<(), ProcessingError> {
    self.inner.start().await
  }

  async fn shutdown(&self) -> Result<(), ProcessingError> {
    self.inner.shutdown().await
  }

  async fn read_events(
    &self,
    producer_type: &str,
    producer_id: Uuid,
    offset: &str,
    page_size: Option<usize>,
  ) -> Result<Vec<StreamMessage>, ProcessingError> {
    self.offsets.lock().unwrap().push(offset.to_string());
    if self.fail_reads {
      return Err(ProcessingError::Transport("connection refused".to_string()));
    }
    self
      .inner
      .read_events(producer_type, producer_id, offset, page_size.or(Some(2)))
      .await
  }

  async fn write_events(
    &self,
    body: Body,
    producer_type: &str,
    producer_id: Uuid,
  ) -> Result<String, ProcessingError> {
    self.inner.write_events(body, producer_type, producer_id).await
  }

  fn standard_out(&self) -> &dyn TraceSink {
    self.inner.standard_out()
  }
}

#[tokio::test]
async fn test_cursor_follows_last_message_of_each_batch() {
  let log = InMemoryStreamRuntime::new();
  let reference = upstream(&log, &["1", "2", "3", "4", "5"]);
  let sma = connected_sma(reference, 2);
  let runtime = RecordingRuntime::new(log);

  let mut node = sma.compile().unwrap();
  node.run(&runtime, &CancellationToken::new()).await.unwrap();

  // Pages of two: [1,2] [3,4] [5] [].
  assert_eq!(runtime.offsets(), vec!["0", "2-0", "4-0", "5-0"]);
}

#[tokio::test]
async fn test_transport_failure_cancels_and_propagates() {
  let log = InMemoryStreamRuntime::new();
  let reference = upstream(&log, &["1"]);
  let sma = connected_sma(reference, 2);
  let mut runtime = RecordingRuntime::new(log);
  runtime.fail_reads = true;

  let mut node = sma.compile().unwrap();
  let err = node.run(&runtime, &CancellationToken::new()).await.unwrap_err();
  assert!(matches!(err, Error::Processing(ProcessingError::Transport(_))));
}
