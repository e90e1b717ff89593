use crate::component::{Component, NodeOutcome, RunState, SinkStatus};
use crate::engine::Engine;
use crate::error::{Error, Violation};
use crate::graph::{Gnode, Graph};
use crate::model::ProcessingModel;
use crate::offset::{InMemoryOffsetStore, OffsetStore};
use crate::processors::Sma;
use crate::registry::ComponentRegistry;
use crate::runtime::{BufferedSink, InMemoryStreamRuntime, StreamingRuntime};
use crate::sinks::ConsoleSink;
use crate::sources::TestSource;
use std::sync::Arc;
use uuid::Uuid;

struct Pipeline {
  graph: Graph,
  source: Uuid,
  sma: Uuid,
  sink: Uuid,
}

fn pipeline(events: i64, window: i64) -> Pipeline {
  let mut model = ProcessingModel::new("engine");
  let mut source = TestSource::new_template();
  source.number_of_events_mut().set(events).unwrap();
  let source = model.add(Box::new(source)).unwrap();
  let mut sma = Sma::new_template();
  sma.window_length_mut().set(window).unwrap();
  let sma = model.add(Box::new(sma)).unwrap();
  let sink = model.add(Box::new(ConsoleSink::new_template())).unwrap();
  model.connect(source, sma, "Input", None).unwrap();
  model.connect(sma, sink, "Input", None).unwrap();
  Pipeline {
    graph: model.compile_graph().unwrap(),
    source,
    sma,
    sink,
  }
}

fn engine(out: Arc<BufferedSink>) -> (Engine, Arc<InMemoryStreamRuntime>) {
  let runtime = Arc::new(InMemoryStreamRuntime::with_sink(out));
  let engine = Engine::new(Arc::new(ComponentRegistry::with_builtins()), runtime.clone());
  (engine, runtime)
}

#[tokio::test]
async fn test_runs_graph_end_to_end() {
  let out = Arc::new(BufferedSink::new());
  let (engine, runtime) = engine(out.clone());
  let p = pipeline(5, 3);

  let report = engine.run(&p.graph).await.unwrap();

  assert_eq!(report.graph_id, p.graph.id);
  assert_eq!(report.nodes.len(), 3);
  assert_eq!(report.nodes[0].id, p.source);
  assert_eq!(report.outcome(p.source), Some(NodeOutcome::State(RunState::Complete)));
  assert_eq!(report.outcome(p.sma), Some(NodeOutcome::State(RunState::Complete)));
  assert_eq!(report.outcome(p.sink), Some(NodeOutcome::Sink(SinkStatus::Complete)));
  assert!(!report.cancelled());
  assert!(report.finished_at >= report.started_at);

  assert_eq!(runtime.stream_len("logweave::sources::TestSource", p.source), 5);
  assert_eq!(
    out.lines(),
    vec![
      "6-0 average=0",
      "7-0 average=0.5",
      "8-0 average=1",
      "9-0 average=2",
      "10-0 average=3",
    ]
  );
  assert!(!runtime.is_running());
}

#[tokio::test]
async fn test_json_graph_runs_the_same() {
  let out = Arc::new(BufferedSink::new());
  let (engine, _) = engine(out.clone());
  let p = pipeline(2, 2);
  let graph = Graph::from_json(&p.graph.to_json().unwrap()).unwrap();

  engine.run(&graph).await.unwrap();
  assert_eq!(out.lines(), vec!["3-0 average=0", "4-0 average=0.5"]);
}

#[tokio::test]
async fn test_invalid_graph_fails_before_start() {
  let out = Arc::new(BufferedSink::new());
  let (engine, runtime) = engine(out.clone());
  let mut p = pipeline(3, 3);
  p.graph.edges.retain(|e| e.target_id() != Some(p.sink));
  for node in &mut p.graph.nodes {
    if node.id == p.sink {
      node.input.clear();
    }
  }

  match engine.run(&p.graph).await {
    Err(Error::Validation(e)) => assert!(e
      .violations()
      .iter()
      .any(|v| matches!(v, Violation::UnconnectedInput { input, .. } if input == "Input"))),
    other => panic!("expected validation failure, got {:?}", other.map(|r| r.nodes.len())),
  }
  assert_eq!(runtime.stream_len("logweave::sources::TestSource", p.source), 0);
  assert!(out.lines().is_empty());
}

#[tokio::test]
async fn test_cancelled_engine_reports_cancelled_nodes() {
  let out = Arc::new(BufferedSink::new());
  let (engine, runtime) = engine(out.clone());
  let p = pipeline(4, 2);
  engine.cancellation_token().cancel();

  let report = engine.run(&p.graph).await.unwrap();
  assert!(report.cancelled());
  assert_eq!(report.outcome(p.source), Some(NodeOutcome::State(RunState::Cancelled)));
  assert_eq!(report.outcome(p.sink), Some(NodeOutcome::Sink(SinkStatus::Cancelled)));
  assert_eq!(runtime.stream_len("logweave::sources::TestSource", p.source), 0);
}

#[tokio::test]
async fn test_offset_store_resumes_second_run() {
  let out = Arc::new(BufferedSink::new());
  let runtime = Arc::new(InMemoryStreamRuntime::with_sink(out.clone()));
  let store = Arc::new(InMemoryOffsetStore::new());
  let engine = Engine::new(Arc::new(ComponentRegistry::with_builtins()), runtime.clone())
    .with_offset_store(store.clone());
  let p = pipeline(2, 1);

  engine.run(&p.graph).await.unwrap();
  assert_eq!(out.lines().len(), 2);

  engine.run(&p.graph).await.unwrap();
  // Source re-emits two events; SMA and sink only see what is new to them.
  assert_eq!(runtime.stream_len("logweave::sources::TestSource", p.source), 4);
  assert_eq!(runtime.stream_len("logweave::processors::Sma", p.sma), 4);
  assert_eq!(out.lines().len(), 4);
  assert!(store.positions().unwrap().len() >= 2);
}

#[tokio::test]
async fn test_run_node_against_existing_log() {
  let out = Arc::new(BufferedSink::new());
  let (engine, runtime) = engine(out.clone());
  let source = TestSource::new_template();
  let source_node = Gnode::from_component(&source);

  runtime.start().await.unwrap();
  assert_eq!(
    engine.run_node(&source_node).await.unwrap(),
    NodeOutcome::State(RunState::Complete)
  );
  assert_eq!(runtime.stream_len("logweave::sources::TestSource", source.id()), 10);

  let mut unknown = source_node.clone();
  unknown.type_name = "com.example.Missing".to_string();
  assert!(matches!(engine.run_node(&unknown).await, Err(Error::Validation(_))));
  runtime.shutdown().await.unwrap();
}

#[test]
fn test_compile_attaches_every_node() {
  let out = Arc::new(BufferedSink::new());
  let (engine, _) = engine(out);
  let p = pipeline(1, 1);
  let nodes = engine.compile(&p.graph).unwrap();
  let ids: Vec<Uuid> = nodes.iter().map(|n| n.id()).collect();
  assert_eq!(ids, vec![p.source, p.sma, p.sink]);
  assert!(engine.registry().contains("logweave::sinks::ConsoleSink"));
}
