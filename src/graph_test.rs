//! # Graph Test Suite
//!
//! Covers the JSON form of [`Graph`], structural validation and ordering.

use crate::attribute::{Attribute, EventType};
use crate::component::{Component, Connectable, NodeKind};
use crate::error::Violation;
use crate::graph::{Edge, Gnode, Graph, SCHEMA_VERSION, SCHEMA_VERSION_KEY};
use crate::model::ProcessingModel;
use crate::port::StreamReference;
use crate::processors::Sma;
use crate::sinks::ConsoleSink;
use crate::sources::TestSource;
use crate::value::{ParamValue, ValueType};
use uuid::Uuid;

fn pipeline() -> (ProcessingModel, Uuid, Uuid, Uuid) {
  let mut model = ProcessingModel::new("pipeline");
  let source = model.add(Box::new(TestSource::new_template())).unwrap();
  let mut sma = Sma::new_template();
  sma.window_length_mut().set(3).unwrap();
  let sma = model.add(Box::new(sma)).unwrap();
  let sink = model.add(Box::new(ConsoleSink::new_template())).unwrap();
  model.connect(source, sma, "Input", None).unwrap();
  model.connect(sma, sink, "Input", None).unwrap();
  (model, source, sma, sink)
}

// ============================================================================
// Round trip
// ============================================================================

#[test]
fn test_json_round_trip_preserves_everything() {
  let (model, _, sma, _) = pipeline();
  let graph = model.compile_graph().unwrap();
  let text = graph.to_json().unwrap();
  let parsed = Graph::from_json(&text).unwrap();

  assert_eq!(parsed, graph);
  assert_eq!(parsed.properties.get(SCHEMA_VERSION_KEY).map(String::as_str), Some(SCHEMA_VERSION));
  let node = parsed.node(sma).unwrap();
  assert_eq!(node.label, NodeKind::Processor);
  assert_eq!(node.params["Window length"].value, ParamValue::Integer(3));
  assert_eq!(node.input["Input"].attribute.as_deref(), Some("Att"));
}

#[test]
fn test_serialization_is_deterministic() {
  let (model, _, _, _) = pipeline();
  let first = model.compile_graph().unwrap().to_json().unwrap();
  let second = model.compile_graph().unwrap().to_json().unwrap();
  assert_eq!(first, second);
}

#[test]
fn test_edges_point_producer_to_consumer() {
  let (model, source, sma, sink) = pipeline();
  let graph = model.compile_graph().unwrap();
  assert_eq!(graph.edges.len(), 2);

  let into_sma: Vec<&Edge> = graph.incoming(sma).collect();
  assert_eq!(into_sma.len(), 1);
  assert_eq!(into_sma[0].source_id(), Some(source));
  assert_eq!(into_sma[0].label, "SOURCE->PROCESSOR");
  assert_eq!(into_sma[0].relation, "Input");
  assert_eq!(graph.incoming(sink).next().unwrap().label, "PROCESSOR->SINK");
}

#[test]
fn test_wire_field_names() {
  let (model, _, _, _) = pipeline();
  let value: serde_json::Value =
    serde_json::from_str(&model.compile_graph().unwrap().to_json().unwrap()).unwrap();
  let node = &value["nodes"][1];
  assert_eq!(node["type"], "logweave::processors::Sma");
  assert_eq!(node["label"], "PROCESSOR");
  assert!(node.get("transportUrl").is_some());
  assert_eq!(node["params"]["Window length"]["type"], "integer");
  assert_eq!(value["properties"]["schemaVersion"], "1");
}

#[test]
fn test_malformed_and_future_versions_rejected() {
  let err = Graph::from_json("{ not json").unwrap_err();
  assert!(matches!(err.violations()[0], Violation::Malformed(_)));

  let mut graph = Graph::new(Uuid::new_v4(), "future");
  graph
    .properties
    .insert(SCHEMA_VERSION_KEY.to_string(), "2".to_string());
  let err = Graph::from_json(&graph.to_json().unwrap()).unwrap_err();
  assert!(err.messages()[0].contains("unsupported schema version"));
}

// ============================================================================
// Validation and ordering
// ============================================================================

#[test]
fn test_topological_sort_orders_producers_first() {
  let (model, source, sma, sink) = pipeline();
  let mut graph = model.compile_graph().unwrap();
  graph.nodes.reverse();
  assert_eq!(graph.topological_sort().unwrap(), vec![source, sma, sink]);
}

#[test]
fn test_cycle_detected() {
  let mut a = Sma::new_template();
  let mut b = Sma::new_template();
  let attributes = EventType::new().with(Attribute::new("average", ValueType::Double));
  a.input_mut("Input")
    .unwrap()
    .connect(StreamReference::new(b.type_name(), b.id(), attributes.clone()), None)
    .unwrap();
  b.input_mut("Input")
    .unwrap()
    .connect(StreamReference::new(a.type_name(), a.id(), attributes), None)
    .unwrap();
  let ga = Gnode::from_component(&a);
  let gb = Gnode::from_component(&b);

  let mut graph = Graph::new(Uuid::new_v4(), "loop");
  graph.edges = vec![Edge::new(&ga, &gb, "Input"), Edge::new(&gb, &ga, "Input")];
  graph.nodes = vec![ga, gb];

  let err = graph.validate().unwrap_err();
  assert_eq!(
    err.violations(),
    &[Violation::InvalidGraph("Graph contains cycles".to_string())]
  );
}

#[test]
fn test_dangling_edge_and_unknown_relation() {
  let (model, _, sma, _) = pipeline();
  let mut graph = model.compile_graph().unwrap();
  let stray = Gnode::from_component(&TestSource::new_template());
  let target = graph.node(sma).unwrap().clone();
  graph.edges.push(Edge::new(&stray, &target, "Input"));
  graph.edges[0].relation = "Nope".to_string();

  let err = graph.validate().unwrap_err();
  assert_eq!(err.violations().len(), 2);
  assert!(err
    .violations()
    .iter()
    .any(|v| matches!(v, Violation::UnknownInput { input, .. } if input == "Nope")));
}

#[test]
fn test_duplicate_ids_rejected() {
  let source = TestSource::new_template();
  let mut graph = Graph::new(Uuid::new_v4(), "dupes");
  graph.nodes = vec![Gnode::from_component(&source), Gnode::from_component(&source)];
  assert!(graph.validate().is_err());
}
