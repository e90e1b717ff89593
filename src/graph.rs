//! # Graph Model
//!
//! The portable form of a processing model: [`Gnode`] vertices, [`Edge`]s and
//! the enclosing [`Graph`].
//!
//! ## Text format
//!
//! Graphs serialize to JSON:
//!
//! ```json
//! {
//!   "id": "…", "label": "SMA demo", "type": "logweave::ProcessingModel",
//!   "directed": true, "properties": { "schemaVersion": "1" },
//!   "nodes": [ { "id": "…", "label": "PROCESSOR", "type": "logweave::processors::Sma",
//!                "name": "SMA", "transportUrl": "redis://localhost",
//!                "params": { "Window length": { "id": 1, "type": "integer", "value": 3 } },
//!                "input": { "Input": { "id": 1, "type": "double", "attribute": "Att",
//!                                      "source": "logweave::sources::TestSource:…",
//!                                      "attributes": [ { "name": "Att", "type": "integer" } ] } },
//!                "output": { "id": 1, "name": "Output",
//!                            "attributes": [ { "name": "average", "type": "double" } ] } } ],
//!   "edges": [ { "label": "SOURCE->PROCESSOR", "relation": "Input", "directed": true,
//!                "source": "logweave::sources::TestSource:…",
//!                "target": "logweave::processors::Sma:…" } ]
//! }
//! ```
//!
//! Parameters and inputs are keyed by name in sorted maps, so serialization is
//! deterministic. Edges always point producer to consumer.

use crate::attribute::EventType;
use crate::component::{Component, NodeKind};
use crate::error::{ValidationError, Violation};
use crate::port::{Output, StreamReference, parse_stream_key, stream_key};
use crate::value::{ParamValue, ValueType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use tracing::trace;
use uuid::Uuid;

/// Version written to `properties.schemaVersion`.
pub const SCHEMA_VERSION: &str = "1";

/// Property key holding the schema version.
pub const SCHEMA_VERSION_KEY: &str = "schemaVersion";

/// Graph type written by [`crate::model::ProcessingModel::compile_graph`].
pub const MODEL_GRAPH_TYPE: &str = "logweave::ProcessingModel";

/// Serialized parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamEntry {
  /// Parameter id.
  pub id: u32,
  /// Declared type.
  #[serde(rename = "type")]
  pub value_type: ValueType,
  /// Value; `null` when unset.
  #[serde(default = "null_value")]
  pub value: ParamValue,
}

fn null_value() -> ParamValue {
  ParamValue::Null
}

/// Serialized input binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEntry {
  /// Input id.
  pub id: u32,
  /// Expected value type.
  #[serde(rename = "type")]
  pub value_type: ValueType,
  /// Producer attribute consumed.
  #[serde(default)]
  pub attribute: Option<String>,
  /// Producer stream key, `"<fullTypeName>:<uuid>"`.
  #[serde(default)]
  pub source: Option<String>,
  /// Producer output attributes at connection time.
  #[serde(default)]
  pub attributes: EventType,
}

/// Portable vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gnode {
  /// Instance id, stable across compile/decompile.
  pub id: Uuid,
  /// SOURCE, PROCESSOR or SINK.
  pub label: NodeKind,
  /// Full type identifier resolved by the registry.
  #[serde(rename = "type")]
  pub type_name: String,
  /// Display name.
  #[serde(default)]
  pub name: String,
  /// Transport locator.
  #[serde(default)]
  pub transport_url: Option<String>,
  /// Parameters keyed by name.
  #[serde(default)]
  pub params: BTreeMap<String, ParamEntry>,
  /// Input bindings keyed by input name.
  #[serde(default)]
  pub input: BTreeMap<String, InputEntry>,
  /// Output schema; absent for sinks.
  #[serde(default)]
  pub output: Option<Output>,
}

impl Gnode {
  /// Captures a live component.
  pub fn from_component(component: &dyn Component) -> Self {
    let params = component
      .parameter_records()
      .into_iter()
      .map(|record| {
        (
          record.name,
          ParamEntry {
            id: record.id,
            value_type: record.value_type,
            value: record.value,
          },
        )
      })
      .collect();
    let input = component
      .inputs()
      .iter()
      .map(|i| {
        let reference = i.reference();
        (
          i.name().to_string(),
          InputEntry {
            id: i.id(),
            value_type: i.value_type(),
            attribute: i.source_attribute().map(str::to_string),
            source: reference.map(StreamReference::stream_key),
            attributes: reference.map(|r| r.attributes.clone()).unwrap_or_default(),
          },
        )
      })
      .collect();
    Self {
      id: component.id(),
      label: component.kind(),
      type_name: component.type_name().to_string(),
      name: component.name().to_string(),
      transport_url: component.transport_url().map(str::to_string),
      params,
      input,
      output: component.output().cloned(),
    }
  }

  /// The log stream key of this node's output.
  pub fn stream_key(&self) -> String {
    stream_key(&self.type_name, self.id)
  }

  /// Populates a freshly constructed component from this node.
  ///
  /// Every problem is collected; the component may be partially updated when
  /// an error is returned and should be discarded.
  pub fn apply_to(&self, component: &mut dyn Component) -> Result<(), Vec<String>> {
    let mut problems = Vec::new();
    if component.kind() != self.label {
      problems.push(format!(
        "label {} does not match component kind {}",
        self.label,
        component.kind()
      ));
    }

    component.set_id(self.id);
    component.set_transport_url(self.transport_url.clone());
    if !self.name.is_empty() {
      component.core_mut().name = self.name.clone();
    }

    for (name, entry) in &self.params {
      match component.set_parameter(name, &entry.value) {
        Ok(true) => {}
        Ok(false) => problems.push(format!("unknown parameter '{}'", name)),
        Err(e) => problems.push(format!("parameter '{}': {}", name, e)),
      }
    }

    for (name, entry) in &self.input {
      let reference = match entry.source.as_deref().map(parse_stream_key) {
        None => None,
        Some(Some((producer_type, producer_id))) => Some(StreamReference::new(
          producer_type,
          producer_id,
          entry.attributes.clone(),
        )),
        Some(None) => {
          problems.push(format!("input '{}': malformed source key", name));
          continue;
        }
      };
      match component.input_mut(name) {
        Some(input) => input.restore(reference, entry.attribute.clone()),
        None => problems.push(format!("unknown input '{}'", name)),
      }
    }

    match (&self.output, component.output_mut()) {
      (Some(output), Some(target)) => *target = output.clone(),
      (Some(_), None) => problems.push("component has no output".to_string()),
      (None, _) => {}
    }

    if problems.is_empty() {
      Ok(())
    } else {
      Err(problems)
    }
  }
}

/// Directed producer to consumer link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
  /// `"<producer label>-><consumer label>"`.
  pub label: String,
  /// Name of the consuming input.
  pub relation: String,
  /// Always `true`.
  pub directed: bool,
  /// Producer stream key.
  pub source: String,
  /// Consumer key, `"<fullTypeName>:<uuid>"`.
  pub target: String,
}

impl Edge {
  /// Links `producer` to the `relation` input of `consumer`.
  pub fn new(producer: &Gnode, consumer: &Gnode, relation: impl Into<String>) -> Self {
    Self {
      label: format!("{}->{}", producer.label, consumer.label),
      relation: relation.into(),
      directed: true,
      source: producer.stream_key(),
      target: consumer.stream_key(),
    }
  }

  /// Producer id, if the source key is well formed.
  pub fn source_id(&self) -> Option<Uuid> {
    parse_stream_key(&self.source).map(|(_, id)| id)
  }

  /// Consumer id, if the target key is well formed.
  pub fn target_id(&self) -> Option<Uuid> {
    parse_stream_key(&self.target).map(|(_, id)| id)
  }
}

/// Portable processing graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
  /// Graph id.
  pub id: Uuid,
  /// Display label.
  pub label: String,
  /// Graph type identifier.
  #[serde(rename = "type")]
  pub graph_type: String,
  /// Always `true`.
  pub directed: bool,
  /// Free-form metadata; carries `schemaVersion`.
  #[serde(default)]
  pub properties: BTreeMap<String, String>,
  /// Vertices in model order.
  #[serde(default)]
  pub nodes: Vec<Gnode>,
  /// Producer to consumer links.
  #[serde(default)]
  pub edges: Vec<Edge>,
}

impl Graph {
  /// Creates an empty graph at the current schema version.
  pub fn new(id: Uuid, label: impl Into<String>) -> Self {
    let mut properties = BTreeMap::new();
    properties.insert(SCHEMA_VERSION_KEY.to_string(), SCHEMA_VERSION.to_string());
    Self {
      id,
      label: label.into(),
      graph_type: MODEL_GRAPH_TYPE.to_string(),
      directed: true,
      properties,
      nodes: Vec::new(),
      edges: Vec::new(),
    }
  }

  /// Serializes to pretty JSON.
  pub fn to_json(&self) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(self)
  }

  /// Parses JSON produced by [`Graph::to_json`].
  ///
  /// A missing `schemaVersion` is read as the current version; any other
  /// version is rejected.
  pub fn from_json(text: &str) -> Result<Self, ValidationError> {
    let graph: Graph =
      serde_json::from_str(text).map_err(|e| Violation::Malformed(e.to_string()))?;
    match graph.properties.get(SCHEMA_VERSION_KEY).map(String::as_str) {
      None | Some(SCHEMA_VERSION) => Ok(graph),
      Some(other) => Err(Violation::Malformed(format!("unsupported schema version '{}'", other)).into()),
    }
  }

  /// Vertex by id.
  pub fn node(&self, id: Uuid) -> Option<&Gnode> {
    self.nodes.iter().find(|n| n.id == id)
  }

  /// Edges feeding `id`.
  pub fn incoming(&self, id: Uuid) -> impl Iterator<Item = &Edge> {
    self.edges.iter().filter(move |e| e.target_id() == Some(id))
  }

  /// Checks ids are unique, every edge joins two nodes of this graph through a
  /// declared input, and the graph is acyclic. Reports every problem found.
  pub fn validate(&self) -> Result<(), ValidationError> {
    let mut violations = Vec::new();
    let mut seen = HashSet::new();
    for node in &self.nodes {
      if !seen.insert(node.id) {
        violations.push(Violation::InvalidGraph(format!("duplicate node id {}", node.id)));
      }
    }

    for edge in &self.edges {
      let source = edge.source_id().and_then(|id| self.node(id));
      let target = edge.target_id().and_then(|id| self.node(id));
      match (source, target) {
        (Some(source), Some(target)) => {
          if source.stream_key() != edge.source || target.stream_key() != edge.target {
            violations.push(Violation::InvalidGraph(format!(
              "edge {} -> {} names the wrong node type",
              edge.source, edge.target
            )));
          }
          if !target.input.contains_key(&edge.relation) {
            violations.push(Violation::UnknownInput {
              component: target.name.clone(),
              input: edge.relation.clone(),
            });
          }
        }
        _ => violations.push(Violation::InvalidGraph(format!(
          "edge {} -> {} references a node outside the graph",
          edge.source, edge.target
        ))),
      }
    }

    if violations.is_empty() {
      if let Err(e) = self.topological_sort() {
        violations.extend(e.into_violations());
      }
    }
    ValidationError::check(violations)
  }

  /// Node ids ordered so every producer precedes its consumers. Ties keep
  /// node list order.
  pub fn topological_sort(&self) -> Result<Vec<Uuid>, ValidationError> {
    let mut in_degree: HashMap<Uuid, usize> = HashMap::new();
    let mut adjacency: HashMap<Uuid, Vec<Uuid>> = HashMap::new();

    for node in &self.nodes {
      in_degree.insert(node.id, 0);
      adjacency.insert(node.id, Vec::new());
    }

    for edge in &self.edges {
      let (Some(source), Some(target)) = (edge.source_id(), edge.target_id()) else {
        continue;
      };
      if let (Some(neighbors), true) = (adjacency.get_mut(&source), in_degree.contains_key(&target)) {
        neighbors.push(target);
        *in_degree.entry(target).or_default() += 1;
      }
    }

    // Kahn's algorithm
    let mut queue: VecDeque<Uuid> = self
      .nodes
      .iter()
      .map(|n| n.id)
      .filter(|id| in_degree.get(id) == Some(&0))
      .collect();

    let mut result = Vec::new();
    while let Some(id) = queue.pop_front() {
      result.push(id);
      if let Some(neighbors) = adjacency.get(&id) {
        for neighbor in neighbors {
          if let Some(degree) = in_degree.get_mut(neighbor) {
            *degree -= 1;
            if *degree == 0 {
              queue.push_back(*neighbor);
            }
          }
        }
      }
    }

    if result.len() != self.nodes.len() {
      return Err(Violation::InvalidGraph("Graph contains cycles".to_string()).into());
    }
    trace!(graph = %self.id, order = ?result, "Graph::topological_sort");
    Ok(result)
  }
}
