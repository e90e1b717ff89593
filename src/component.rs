//! # Components
//!
//! Sources, processors and sinks are live, mutable templates. Each concrete type
//! implements three small interfaces:
//!
//! - [`Parameterized`]: exposes its typed parameters through [`DynParameter`].
//! - [`Connectable`]: exposes its input ports and optional output.
//! - [`Compilable`]: validates and freezes itself into a [`CompiledNode`].
//!
//! [`Component`] ties them together with identity (id, type identifier, node
//! kind, transport locator) and the copy operations the model and registry need.
//!
//! ## Lifecycle
//!
//! A template is created with defaults and no connections, mutated only through
//! validated setters, then compiled. Compiling deep-copies parameters, inputs and
//! output into an immutable snapshot, so mutating the template afterwards does
//! not affect the compiled node. An invalid template never yields a partial
//! compiled node; validation reports every violation at once.

use crate::error::{ProgrammerError, ValidationError, Violation};
use crate::offset::OffsetStore;
use crate::parameter::{DynParameter, ParameterError, ParameterRecord};
use crate::port::{Input, Output};
use crate::runtime::StreamingRuntime;
use crate::value::ParamValue;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::trace;
use uuid::Uuid;

/// Kind of graph vertex; also the Gnode label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeKind {
  /// Originates a stream.
  Source,
  /// Transforms one or more streams.
  Processor,
  /// Terminally consumes a stream.
  Sink,
}

impl fmt::Display for NodeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      NodeKind::Source => write!(f, "SOURCE"),
      NodeKind::Processor => write!(f, "PROCESSOR"),
      NodeKind::Sink => write!(f, "SINK"),
    }
  }
}

/// Execution state of a compiled source or processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunState {
  /// Compiled, not yet run.
  Idle,
  /// Inside its loop.
  Running,
  /// Input exhausted.
  Complete,
  /// Interrupted or failed.
  Cancelled,
}

impl RunState {
  /// Whether moving from `self` to `next` is a legal transition.
  pub fn can_transition_to(&self, next: RunState) -> bool {
    matches!(
      (self, next),
      (RunState::Idle, RunState::Running)
        | (RunState::Idle, RunState::Cancelled)
        | (RunState::Running, RunState::Complete)
        | (RunState::Running, RunState::Cancelled)
    )
  }

  /// True for `Complete` and `Cancelled`.
  pub fn is_terminal(&self) -> bool {
    matches!(self, RunState::Complete | RunState::Cancelled)
  }
}

impl fmt::Display for RunState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RunState::Idle => write!(f, "IDLE"),
      RunState::Running => write!(f, "RUNNING"),
      RunState::Complete => write!(f, "COMPLETE"),
      RunState::Cancelled => write!(f, "CANCELLED"),
    }
  }
}

/// Completion status of a sink's drain loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SinkStatus {
  /// The log is exhausted.
  Complete,
  /// More data may exist; re-invoke the sink.
  BackLog,
  /// Interrupted or failed.
  Cancelled,
}

impl fmt::Display for SinkStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SinkStatus::Complete => write!(f, "COMPLETE"),
      SinkStatus::BackLog => write!(f, "BACK_LOG"),
      SinkStatus::Cancelled => write!(f, "CANCELLED"),
    }
  }
}

/// Final result of running any compiled node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeOutcome {
  /// A source or processor finished in this state.
  State(RunState),
  /// A sink finished with this status.
  Sink(SinkStatus),
}

impl NodeOutcome {
  /// True when the node was interrupted or failed.
  pub fn is_cancelled(&self) -> bool {
    matches!(
      self,
      NodeOutcome::State(RunState::Cancelled) | NodeOutcome::Sink(SinkStatus::Cancelled)
    )
  }
}

impl fmt::Display for NodeOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      NodeOutcome::State(state) => state.fmt(f),
      NodeOutcome::Sink(status) => status.fmt(f),
    }
  }
}

/// Guards the [`RunState`] machine of one compiled node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lifecycle {
  node: Uuid,
  state: RunState,
}

impl Lifecycle {
  /// Starts in [`RunState::Idle`].
  pub fn new(node: Uuid) -> Self {
    Self {
      node,
      state: RunState::Idle,
    }
  }

  /// Current state.
  pub fn state(&self) -> RunState {
    self.state
  }

  /// Moves to `next`. An illegal transition is an internal invariant violation.
  pub fn enter(&mut self, next: RunState) -> Result<(), ProgrammerError> {
    if !self.state.can_transition_to(next) {
      return Err(ProgrammerError(format!(
        "node {} cannot move from {} to {}",
        self.node, self.state, next
      )));
    }
    trace!(node = %self.node, from = %self.state, to = %next, "Lifecycle::enter");
    self.state = next;
    Ok(())
  }

  /// Moves to [`RunState::Cancelled`] unless already terminal.
  pub fn cancel(&mut self) {
    if !self.state.is_terminal() {
      self.state = RunState::Cancelled;
    }
  }
}

/// Identity shared by every component, held by composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentCore {
  /// Instance id, stable across compile/decompile.
  pub id: Uuid,
  /// Display name.
  pub name: String,
  /// Free-text description.
  pub description: String,
  /// Transport locator, e.g. `redis://localhost`.
  pub transport_url: Option<String>,
}

impl ComponentCore {
  /// Creates a core with a fresh id.
  pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
    Self {
      id: Uuid::new_v4(),
      name: name.into(),
      description: description.into(),
      transport_url: None,
    }
  }
}

/// Access to a component's typed parameters.
pub trait Parameterized {
  /// Parameters in declaration order.
  fn parameters(&self) -> Vec<&dyn DynParameter>;

  /// Mutable parameters in declaration order.
  fn parameters_mut(&mut self) -> Vec<&mut dyn DynParameter>;

  /// Table form of every parameter.
  fn parameter_records(&self) -> Vec<ParameterRecord> {
    self.parameters().iter().map(|p| p.record()).collect()
  }

  /// Sets a parameter by name. Returns `Ok(false)` when no parameter has that name.
  fn set_parameter(&mut self, name: &str, value: &ParamValue) -> Result<bool, ParameterError> {
    match self.parameters_mut().into_iter().find(|p| p.name() == name) {
      Some(parameter) => parameter.set_value(value).map(|_| true),
      None => Ok(false),
    }
  }
}

/// Access to a component's ports.
pub trait Connectable {
  /// Inputs in declaration order; empty for sources.
  fn inputs(&self) -> &[Input];

  /// Mutable inputs.
  fn inputs_mut(&mut self) -> &mut [Input];

  /// The output; `None` for sinks.
  fn output(&self) -> Option<&Output>;

  /// Mutable output.
  fn output_mut(&mut self) -> Option<&mut Output>;

  /// Input by name.
  fn input(&self, name: &str) -> Option<&Input> {
    self.inputs().iter().find(|i| i.name() == name)
  }

  /// Mutable input by name.
  fn input_mut(&mut self, name: &str) -> Option<&mut Input> {
    self.inputs_mut().iter_mut().find(|i| i.name() == name)
  }
}

/// Turns a valid template into an executable snapshot.
pub trait Compilable {
  /// Validates, then deep-copies configuration into a [`CompiledNode`].
  fn compile(&self) -> Result<CompiledNode, ValidationError>;
}

/// A live source, processor or sink template.
pub trait Component: Parameterized + Connectable + Compilable + Send + Sync {
  /// Shared identity.
  fn core(&self) -> &ComponentCore;

  /// Mutable shared identity.
  fn core_mut(&mut self) -> &mut ComponentCore;

  /// Vertex kind.
  fn kind(&self) -> NodeKind;

  /// Full type identifier the registry resolves.
  fn type_name(&self) -> &'static str;

  /// Deep copy with the same id.
  fn copy_of(&self) -> Box<dyn Component>;

  /// Deep copy with a fresh id.
  fn new_instance(&self) -> Box<dyn Component>;

  /// Instance id.
  fn id(&self) -> Uuid {
    self.core().id
  }

  /// Replaces the instance id.
  fn set_id(&mut self, id: Uuid) {
    self.core_mut().id = id;
  }

  /// Display name.
  fn name(&self) -> &str {
    &self.core().name
  }

  /// Transport locator, if set.
  fn transport_url(&self) -> Option<&str> {
    self.core().transport_url.as_deref()
  }

  /// Sets or clears the transport locator.
  fn set_transport_url(&mut self, url: Option<String>) {
    self.core_mut().transport_url = url;
  }

  /// Every problem preventing compilation, in declaration order.
  fn violations(&self) -> Vec<Violation> {
    port_and_parameter_violations(self)
  }

  /// Fails with every violation when the template cannot compile.
  fn validate(&self) -> Result<(), ValidationError> {
    ValidationError::check(self.violations())
  }
}

/// Parameter problems followed by input binding problems.
pub fn port_and_parameter_violations<C: Component + ?Sized>(component: &C) -> Vec<Violation> {
  let name = component.name();
  let mut violations: Vec<Violation> = component
    .parameters()
    .iter()
    .filter_map(|p| p.problem().map(|e| e.into_violation(name, p.name())))
    .collect();
  violations.extend(
    component
      .inputs()
      .iter()
      .filter_map(|i| i.check().err().map(|e| e.into_violation(name, i.name()))),
  );
  violations
}

impl fmt::Debug for dyn Component {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Component")
      .field("id", &self.id())
      .field("name", &self.name())
      .field("type", &self.type_name())
      .finish()
  }
}

/// Executable snapshot of a source.
#[async_trait]
pub trait CompiledSource: Send + Sync {
  /// Instance id.
  fn id(&self) -> Uuid;
  /// Current state.
  fn state(&self) -> RunState;
  /// Writes the source's events to its stream.
  async fn run(
    &mut self,
    runtime: &dyn StreamingRuntime,
    cancel: &CancellationToken,
  ) -> crate::error::Result<RunState>;
}

/// Executable snapshot of a processor.
#[async_trait]
pub trait CompiledProcessor: Send + Sync {
  /// Instance id.
  fn id(&self) -> Uuid;
  /// Current state.
  fn state(&self) -> RunState;
  /// Resumes every input cursor from `store` and commits to it after each batch.
  fn attach_offset_store(&mut self, store: Arc<dyn OffsetStore>);
  /// Consumes upstream streams until exhausted, writing results to its own stream.
  async fn run(
    &mut self,
    runtime: &dyn StreamingRuntime,
    cancel: &CancellationToken,
  ) -> crate::error::Result<RunState>;
}

/// Executable snapshot of a sink.
#[async_trait]
pub trait CompiledSink: Send + Sync {
  /// Instance id.
  fn id(&self) -> Uuid;
  /// Resumes the input cursor from `store` and commits to it after each batch.
  fn attach_offset_store(&mut self, store: Arc<dyn OffsetStore>);
  /// Drains its input, performing a side effect per message.
  async fn run(
    &mut self,
    runtime: &dyn StreamingRuntime,
    cancel: &CancellationToken,
  ) -> crate::error::Result<SinkStatus>;
}

/// Any compiled node.
pub enum CompiledNode {
  /// Compiled source.
  Source(Box<dyn CompiledSource>),
  /// Compiled processor.
  Processor(Box<dyn CompiledProcessor>),
  /// Compiled sink.
  Sink(Box<dyn CompiledSink>),
}

impl CompiledNode {
  /// Instance id.
  pub fn id(&self) -> Uuid {
    match self {
      CompiledNode::Source(node) => node.id(),
      CompiledNode::Processor(node) => node.id(),
      CompiledNode::Sink(node) => node.id(),
    }
  }

  /// Vertex kind.
  pub fn kind(&self) -> NodeKind {
    match self {
      CompiledNode::Source(_) => NodeKind::Source,
      CompiledNode::Processor(_) => NodeKind::Processor,
      CompiledNode::Sink(_) => NodeKind::Sink,
    }
  }

  /// Attaches an offset store to nodes that read streams. Sources ignore it.
  pub fn attach_offset_store(&mut self, store: Arc<dyn OffsetStore>) {
    match self {
      CompiledNode::Source(_) => {}
      CompiledNode::Processor(node) => node.attach_offset_store(store),
      CompiledNode::Sink(node) => node.attach_offset_store(store),
    }
  }

  /// Runs the node to completion.
  pub async fn run(
    &mut self,
    runtime: &dyn StreamingRuntime,
    cancel: &CancellationToken,
  ) -> crate::error::Result<NodeOutcome> {
    Ok(match self {
      CompiledNode::Source(node) => NodeOutcome::State(node.run(runtime, cancel).await?),
      CompiledNode::Processor(node) => NodeOutcome::State(node.run(runtime, cancel).await?),
      CompiledNode::Sink(node) => NodeOutcome::Sink(node.run(runtime, cancel).await?),
    })
  }
}

impl fmt::Debug for CompiledNode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CompiledNode")
      .field("id", &self.id())
      .field("kind", &self.kind())
      .finish()
  }
}
