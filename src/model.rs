//! # Processing Model
//!
//! The mutable working set of live components and their wiring.
//!
//! A model compiles into a portable [`Graph`] with
//! [`ProcessingModel::compile_graph`] and is rebuilt from one with
//! [`ProcessingModel::from_graph`]. Wiring lives on the consumers' inputs; the
//! graph's edges are derived from it, and on the way back in the edges are
//! authoritative.
//!
//! ```rust
//! use logweave::model::ProcessingModel;
//! use logweave::processors::Sma;
//! use logweave::sources::TestSource;
//!
//! let mut model = ProcessingModel::new("demo");
//! let source = model.add(Box::new(TestSource::new_template())).unwrap();
//! let sma = model.add(Box::new(Sma::new_template())).unwrap();
//! model.connect(source, sma, "Input", None).unwrap();
//!
//! let graph = model.compile_graph().unwrap();
//! assert_eq!(graph.nodes.len(), 2);
//! assert_eq!(graph.edges[0].relation, "Input");
//! ```

use crate::component::{CompiledNode, Component};
use crate::error::{ValidationError, Violation};
use crate::graph::{Edge, Gnode, Graph};
use crate::port::StreamReference;
use crate::registry::ComponentRegistry;
use std::collections::HashMap;
use tracing::{debug, trace};
use uuid::Uuid;

/// Live components plus their input bindings.
#[derive(Debug)]
pub struct ProcessingModel {
  id: Uuid,
  name: String,
  components: Vec<Box<dyn Component>>,
}

impl ProcessingModel {
  /// Creates an empty model with a fresh id.
  pub fn new(name: impl Into<String>) -> Self {
    Self::with_id(Uuid::new_v4(), name)
  }

  /// Creates an empty model with a known id.
  pub fn with_id(id: Uuid, name: impl Into<String>) -> Self {
    Self {
      id,
      name: name.into(),
      components: Vec::new(),
    }
  }

  /// Model id; also the compiled graph's id.
  pub fn id(&self) -> Uuid {
    self.id
  }

  /// Model name; also the compiled graph's label.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Components in insertion order.
  pub fn components(&self) -> &[Box<dyn Component>] {
    &self.components
  }

  /// Number of components.
  pub fn len(&self) -> usize {
    self.components.len()
  }

  /// True when the model holds no components.
  pub fn is_empty(&self) -> bool {
    self.components.is_empty()
  }

  /// Adds a component, returning its id. Ids must be unique.
  pub fn add(&mut self, component: Box<dyn Component>) -> Result<Uuid, ValidationError> {
    let id = component.id();
    if self.get(id).is_some() {
      return Err(Violation::InvalidGraph(format!("duplicate node id {}", id)).into());
    }
    trace!(model = %self.id, node = %id, type_name = component.type_name(), "ProcessingModel::add");
    self.components.push(component);
    Ok(id)
  }

  /// Removes a component and every binding to its output.
  pub fn remove(&mut self, id: Uuid) -> Option<Box<dyn Component>> {
    let index = self.components.iter().position(|c| c.id() == id)?;
    let removed = self.components.remove(index);
    for component in &mut self.components {
      for input in component.inputs_mut() {
        if input.is_connected_to(id) {
          input.disconnect();
        }
      }
    }
    Some(removed)
  }

  /// Component by id.
  pub fn get(&self, id: Uuid) -> Option<&dyn Component> {
    self
      .components
      .iter()
      .find(|c| c.id() == id)
      .map(|c| c.as_ref())
  }

  /// Mutable component by id.
  pub fn get_mut(&mut self, id: Uuid) -> Option<&mut (dyn Component + 'static)> {
    self
      .components
      .iter_mut()
      .find(|c| c.id() == id)
      .map(|c| c.as_mut())
  }

  /// Binds `input` of `consumer` to the output of `producer`.
  ///
  /// `attribute` names the producer attribute to consume; see
  /// [`crate::port::Input::connect`] for how it is chosen when omitted.
  pub fn connect(
    &mut self,
    producer: Uuid,
    consumer: Uuid,
    input: &str,
    attribute: Option<&str>,
  ) -> Result<(), ValidationError> {
    let reference = self.reference_to(producer)?;
    let component = self
      .get_mut(consumer)
      .ok_or_else(|| Violation::InvalidGraph(format!("no component {}", consumer)))?;
    let name = component.name().to_string();
    let port = component
      .input_mut(input)
      .ok_or_else(|| Violation::UnknownInput {
        component: name.clone(),
        input: input.to_string(),
      })?;
    port
      .connect(reference, attribute)
      .map_err(|e| e.into_violation(&name, input))?;
    debug!(producer = %producer, consumer = %consumer, input, "ProcessingModel::connect");
    Ok(())
  }

  /// Unbinds `input` of `consumer`.
  pub fn disconnect(&mut self, consumer: Uuid, input: &str) -> Result<(), ValidationError> {
    let component = self
      .get_mut(consumer)
      .ok_or_else(|| Violation::InvalidGraph(format!("no component {}", consumer)))?;
    let name = component.name().to_string();
    component
      .input_mut(input)
      .ok_or_else(|| Violation::UnknownInput {
        component: name,
        input: input.to_string(),
      })?
      .disconnect();
    Ok(())
  }

  fn reference_to(&self, producer: Uuid) -> Result<StreamReference, ValidationError> {
    let component = self
      .get(producer)
      .ok_or_else(|| Violation::InvalidGraph(format!("no component {}", producer)))?;
    let output = component.output().ok_or_else(|| {
      Violation::InvalidGraph(format!("{} has no output to connect", component.name()))
    })?;
    Ok(StreamReference::new(
      component.type_name(),
      component.id(),
      output.attributes.clone(),
    ))
  }

  /// Every violation of every component, in model order.
  pub fn validate(&self) -> Result<(), ValidationError> {
    ValidationError::check(
      self
        .components
        .iter()
        .flat_map(|c| c.violations())
        .collect(),
    )
  }

  /// Captures the model as a [`Graph`]: one Gnode per component and one edge
  /// per bound input.
  pub fn compile_graph(&self) -> Result<Graph, ValidationError> {
    let mut graph = Graph::new(self.id, self.name.clone());
    graph.nodes = self
      .components
      .iter()
      .map(|c| Gnode::from_component(c.as_ref()))
      .collect();

    let index: HashMap<Uuid, usize> = graph
      .nodes
      .iter()
      .enumerate()
      .map(|(i, n)| (n.id, i))
      .collect();
    let mut violations = Vec::new();
    let mut edges = Vec::new();
    for component in &self.components {
      for input in component.inputs() {
        let Some(reference) = input.reference() else {
          continue;
        };
        match (index.get(&reference.producer_id), index.get(&component.id())) {
          (Some(&source), Some(&target)) => {
            edges.push(Edge::new(&graph.nodes[source], &graph.nodes[target], input.name()));
          }
          _ => violations.push(Violation::InvalidGraph(format!(
            "{}: input '{}' is bound to {}, which is not in the model",
            component.name(),
            input.name(),
            reference
          ))),
        }
      }
    }
    ValidationError::check(violations)?;
    graph.edges = edges;
    graph.validate()?;
    debug!(model = %self.id, nodes = graph.nodes.len(), edges = graph.edges.len(), "ProcessingModel::compile_graph");
    Ok(graph)
  }

  /// Rebuilds live components from `graph` through `registry`.
  ///
  /// Every unresolvable or malformed node is reported in one error. Each edge
  /// (re)binds its consumer's input to the producer's current output, keeping
  /// the attribute the node recorded.
  pub fn from_graph(graph: &Graph, registry: &ComponentRegistry) -> Result<Self, ValidationError> {
    graph.validate()?;
    let mut model = Self::with_id(graph.id, graph.label.clone());
    let mut violations = Vec::new();
    for node in &graph.nodes {
      match registry.instantiate(node) {
        Ok(component) => model.components.push(component),
        Err(e) => violations.push(e.into_violation()),
      }
    }
    ValidationError::check(violations)?;

    let mut violations = Vec::new();
    for edge in &graph.edges {
      let (Some(source), Some(target)) = (edge.source_id(), edge.target_id()) else {
        continue;
      };
      let bound = model
        .get(target)
        .and_then(|c| c.input(&edge.relation))
        .is_some_and(|i| i.is_connected_to(source));
      if bound {
        continue;
      }
      if let Err(e) = model.connect(source, target, &edge.relation, None) {
        violations.extend(e.into_violations());
      }
    }
    ValidationError::check(violations)?;
    debug!(model = %model.id, nodes = model.len(), "ProcessingModel::from_graph");
    Ok(model)
  }

  /// Validates every component, then compiles them producers first.
  ///
  /// Nothing is compiled unless the whole model is valid.
  pub fn compile(&self) -> Result<Vec<CompiledNode>, ValidationError> {
    self.validate()?;
    let graph = self.compile_graph()?;
    let mut compiled = Vec::with_capacity(self.components.len());
    for id in graph.topological_sort()? {
      if let Some(component) = self.get(id) {
        compiled.push(component.compile()?);
      }
    }
    Ok(compiled)
  }
}
