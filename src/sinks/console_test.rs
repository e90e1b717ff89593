use crate::attribute::{Attribute, EventType};
use crate::component::{Compilable, Connectable, NodeOutcome, SinkStatus};
use crate::event::Body;
use crate::port::StreamReference;
use crate::runtime::{BufferedSink, InMemoryStreamRuntime};
use crate::sinks::ConsoleSink;
use crate::value::ValueType;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const UPSTREAM: &str = "test::Readings";

fn setup(count: usize) -> (Arc<BufferedSink>, InMemoryStreamRuntime, StreamReference) {
  let out = Arc::new(BufferedSink::new());
  let runtime = InMemoryStreamRuntime::with_sink(out.clone());
  let id = Uuid::new_v4();
  for n in 0..count {
    let mut body = Body::new();
    body.insert("temp".to_string(), n.to_string());
    body.insert("unit".to_string(), "C".to_string());
    runtime.append(UPSTREAM, id, Some(body)).unwrap();
  }
  let reference = StreamReference::new(
    UPSTREAM,
    id,
    EventType::new()
      .with(Attribute::new("temp", ValueType::Integer))
      .with(Attribute::new("unit", ValueType::String)),
  );
  (out, runtime, reference)
}

fn connected(reference: StreamReference) -> ConsoleSink {
  let mut sink = ConsoleSink::new_template();
  sink
    .input_mut("Input")
    .unwrap()
    .connect(reference, Some("temp"))
    .unwrap();
  sink
}

#[tokio::test]
async fn test_traces_every_message_and_completes() {
  let (out, runtime, reference) = setup(3);
  let sink = connected(reference);

  let mut node = sink.compile().unwrap();
  let outcome = node.run(&runtime, &CancellationToken::new()).await.unwrap();
  assert_eq!(outcome, NodeOutcome::Sink(SinkStatus::Complete));
  assert_eq!(
    out.lines(),
    vec!["1-0 temp=0 unit=C", "2-0 temp=1 unit=C", "3-0 temp=2 unit=C"]
  );
}

#[tokio::test]
async fn test_attribute_filter() {
  let (out, runtime, reference) = setup(1);
  let mut sink = connected(reference);
  sink.show_attributes_mut().set(" unit ,".to_string()).unwrap();

  let mut node = sink.compile().unwrap();
  node.run(&runtime, &CancellationToken::new()).await.unwrap();
  assert_eq!(out.lines(), vec!["1-0 unit=C"]);
}

#[tokio::test]
async fn test_back_log_resumes_on_next_run() {
  let (out, runtime, reference) = setup(5);
  let mut sink = connected(reference);
  sink.page_size_mut().set(2).unwrap();
  sink.max_batches_mut().set(1).unwrap();

  let mut node = sink.compile().unwrap();
  let mut statuses = Vec::new();
  for _ in 0..5 {
    let outcome = node.run(&runtime, &CancellationToken::new()).await.unwrap();
    statuses.push(outcome);
    if outcome == NodeOutcome::Sink(SinkStatus::Complete) {
      break;
    }
  }

  assert_eq!(
    statuses,
    vec![
      NodeOutcome::Sink(SinkStatus::BackLog),
      NodeOutcome::Sink(SinkStatus::BackLog),
      NodeOutcome::Sink(SinkStatus::BackLog),
      NodeOutcome::Sink(SinkStatus::Complete),
    ]
  );
  assert_eq!(
    out.lines(),
    vec![
      "1-0 temp=0 unit=C",
      "2-0 temp=1 unit=C",
      "3-0 temp=2 unit=C",
      "4-0 temp=3 unit=C",
      "5-0 temp=4 unit=C",
    ]
  );
}

#[tokio::test]
async fn test_back_log_picks_up_late_appends() {
  let (out, runtime, reference) = setup(2);
  let producer = reference.producer_id;
  let mut sink = connected(reference);
  sink.page_size_mut().set(2).unwrap();

  let mut node = sink.compile().unwrap();
  node.run(&runtime, &CancellationToken::new()).await.unwrap();
  let mut body = Body::new();
  body.insert("temp".to_string(), "9".to_string());
  body.insert("unit".to_string(), "C".to_string());
  runtime.append(UPSTREAM, producer, Some(body)).unwrap();

  let outcome = node.run(&runtime, &CancellationToken::new()).await.unwrap();
  assert_eq!(outcome, NodeOutcome::Sink(SinkStatus::Complete));
  assert_eq!(
    out.lines(),
    vec!["1-0 temp=0 unit=C", "2-0 temp=1 unit=C", "3-0 temp=9 unit=C"]
  );
}

#[tokio::test]
async fn test_null_bodies_are_skipped() {
  let (out, runtime, reference) = setup(1);
  runtime.append(UPSTREAM, reference.producer_id, None).unwrap();
  let sink = connected(reference);

  let mut node = sink.compile().unwrap();
  let outcome = node.run(&runtime, &CancellationToken::new()).await.unwrap();
  assert_eq!(outcome, NodeOutcome::Sink(SinkStatus::Complete));
  assert_eq!(out.lines(), vec!["1-0 temp=0 unit=C"]);
}

#[tokio::test]
async fn test_cancelled_sink_reads_nothing() {
  let (out, runtime, reference) = setup(2);
  let sink = connected(reference);
  let cancel = CancellationToken::new();
  cancel.cancel();

  let mut node = sink.compile().unwrap();
  let outcome = node.run(&runtime, &cancel).await.unwrap();
  assert_eq!(outcome, NodeOutcome::Sink(SinkStatus::Cancelled));
  assert!(out.lines().is_empty());
}

#[test]
fn test_negative_page_size_rejected() {
  let mut sink = ConsoleSink::new_template();
  assert!(sink.page_size_mut().set(0).is_err());
  assert!(sink.max_batches_mut().set(-1).is_err());
  assert!(sink.max_batches_mut().set(0).is_ok());
}
