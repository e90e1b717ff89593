//! Deterministic test data source.

use super::emit_events;
use crate::attribute::{Attribute, EventType};
use crate::component::{
  Compilable, CompiledNode, CompiledSource, Component, ComponentCore, Connectable, Lifecycle,
  NodeKind, Parameterized, RunState, port_and_parameter_violations,
};
use crate::error::{Result, ValidationError, Violation};
use crate::event::Body;
use crate::parameter::{Constraint, DynParameter, Parameter};
use crate::port::{Input, Output};
use crate::registry::ComponentRegistration;
use crate::runtime::StreamingRuntime;
use crate::value::ValueType;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::trace;
use uuid::Uuid;

/// Registry type identifier.
pub const TYPE_NAME: &str = "logweave::sources::TestSource";

const DEFAULT_NAME: &str = "Test data source";
const DEFAULT_DESCRIPTION: &str = "Source for generating test data.";

/// Emits "Number of Events" events, one sample value per output attribute.
///
/// Event `n` (counting from zero) carries [`Attribute::sample_value`]`(n)` for
/// every attribute. The template's output holds a single integer attribute
/// `Att`; callers may add more.
#[derive(Debug, Clone)]
pub struct TestSource {
  core: ComponentCore,
  number_of_events: Parameter<i64>,
  output: Output,
}

impl TestSource {
  /// A template with ten events and the `Att` attribute.
  pub fn new_template() -> Self {
    Self {
      core: ComponentCore::new(DEFAULT_NAME, DEFAULT_DESCRIPTION),
      number_of_events: Parameter::new(1, "Number of Events")
        .default_value(10)
        .required(true)
        .constraint(Constraint::min_integer(
          1,
          "Number of events has to be greater than zero.",
        )),
      output: Output::new(1, "Output").with_attribute(Attribute::new("Att", ValueType::Integer)),
    }
  }

  /// The number-of-events parameter.
  pub fn number_of_events(&self) -> &Parameter<i64> {
    &self.number_of_events
  }

  /// Mutable number-of-events parameter.
  pub fn number_of_events_mut(&mut self) -> &mut Parameter<i64> {
    &mut self.number_of_events
  }

  /// Mutable output attributes.
  pub fn attributes_mut(&mut self) -> &mut EventType {
    &mut self.output.attributes
  }
}

impl Parameterized for TestSource {
  fn parameters(&self) -> Vec<&dyn DynParameter> {
    vec![&self.number_of_events as &dyn DynParameter]
  }

  fn parameters_mut(&mut self) -> Vec<&mut dyn DynParameter> {
    vec![&mut self.number_of_events as &mut dyn DynParameter]
  }
}

impl Connectable for TestSource {
  fn inputs(&self) -> &[Input] {
    &[]
  }

  fn inputs_mut(&mut self) -> &mut [Input] {
    &mut []
  }

  fn output(&self) -> Option<&Output> {
    Some(&self.output)
  }

  fn output_mut(&mut self) -> Option<&mut Output> {
    Some(&mut self.output)
  }
}

impl Compilable for TestSource {
  fn compile(&self) -> std::result::Result<CompiledNode, ValidationError> {
    self.validate()?;
    let count = self.number_of_events.value_or_default().copied().unwrap_or_default().max(0) as u64;
    Ok(CompiledNode::Source(Box::new(CompiledTestSource {
      id: self.id(),
      count,
      attributes: self.output.attributes.clone(),
      lifecycle: Lifecycle::new(self.id()),
    })))
  }
}

impl Component for TestSource {
  fn core(&self) -> &ComponentCore {
    &self.core
  }

  fn core_mut(&mut self) -> &mut ComponentCore {
    &mut self.core
  }

  fn kind(&self) -> NodeKind {
    NodeKind::Source
  }

  fn type_name(&self) -> &'static str {
    TYPE_NAME
  }

  fn copy_of(&self) -> Box<dyn Component> {
    Box::new(self.clone())
  }

  fn violations(&self) -> Vec<Violation> {
    let mut violations = port_and_parameter_violations(self);
    if self.output.attributes.is_empty() {
      violations.push(Violation::ConstraintViolated {
        component: self.name().to_string(),
        parameter: "Output".to_string(),
        message: "at least one output attribute is needed".to_string(),
      });
    }
    violations
  }

  fn new_instance(&self) -> Box<dyn Component> {
    let mut copy = self.clone();
    copy.set_id(Uuid::new_v4());
    Box::new(copy)
  }
}

fn factory() -> Box<dyn Component> {
  Box::new(TestSource::new_template())
}

pub(crate) const REGISTRATION: ComponentRegistration = ComponentRegistration::new(TYPE_NAME, factory);

/// Compiled snapshot of a [`TestSource`].
#[derive(Debug)]
pub struct CompiledTestSource {
  id: Uuid,
  count: u64,
  attributes: EventType,
  lifecycle: Lifecycle,
}

fn sample(attributes: &EventType, n: u64) -> Body {
  attributes
    .attributes()
    .iter()
    .map(|a| (a.name.clone(), a.sample_value(n)))
    .collect()
}

#[async_trait]
impl CompiledSource for CompiledTestSource {
  fn id(&self) -> Uuid {
    self.id
  }

  fn state(&self) -> RunState {
    self.lifecycle.state()
  }

  async fn run(
    &mut self,
    runtime: &dyn StreamingRuntime,
    cancel: &CancellationToken,
  ) -> Result<RunState> {
    trace!(node = %self.id, count = self.count, "CompiledTestSource::run");
    let attributes = &self.attributes;
    emit_events(
      &mut self.lifecycle,
      runtime,
      cancel,
      TYPE_NAME,
      self.id,
      self.count,
      |n| sample(attributes, n),
    )
    .await
  }
}
