//! Random 0/1 source.

use super::emit_events;
use crate::attribute::{Attribute, EventType};
use crate::component::{
  Compilable, CompiledNode, CompiledSource, Component, ComponentCore, Connectable, Lifecycle,
  NodeKind, Parameterized, RunState,
};
use crate::error::{Result, ValidationError};
use crate::parameter::{Constraint, DynParameter, Parameter};
use crate::port::{Input, Output};
use crate::registry::ComponentRegistration;
use crate::runtime::StreamingRuntime;
use crate::value::ValueType;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;
use tracing::trace;
use uuid::Uuid;

/// Registry type identifier.
pub const TYPE_NAME: &str = "logweave::sources::RandomBinarySource";

/// Emits events whose attributes are all `0` or `1`.
///
/// For each event a uniform draw in `[0, 1)` below "Break Point" yields `0`,
/// otherwise `1`. The value is rendered through [`Attribute::sample_value`], so
/// a boolean attribute carries `false`/`true`.
#[derive(Debug, Clone)]
pub struct RandomBinarySource {
  core: ComponentCore,
  number_of_events: Parameter<i64>,
  break_point: Parameter<f64>,
  seed: Parameter<i64>,
  output: Output,
}

impl RandomBinarySource {
  /// A template with ten events, break point 0.5 and an integer `Binary` attribute.
  pub fn new_template() -> Self {
    Self {
      core: ComponentCore::new("Test Random Binary", "Generates random 0/1 test data."),
      number_of_events: Parameter::new(1, "Number of Events")
        .default_value(10)
        .required(true)
        .constraint(Constraint::min_integer(
          1,
          "Number of events has to be greater than zero.",
        )),
      break_point: Parameter::new(2, "Break Point")
        .default_value(0.5)
        .required(true)
        .constraint(Constraint::range_double(
          0.0,
          1.0,
          "Break point has to be in the interval [0, 1].",
        )),
      seed: Parameter::new(3, "Seed"),
      output: Output::new(1, "Output")
        .with_attribute(Attribute::new("Binary", ValueType::Integer)),
    }
  }

  /// Mutable number-of-events parameter.
  pub fn number_of_events_mut(&mut self) -> &mut Parameter<i64> {
    &mut self.number_of_events
  }

  /// Mutable break-point parameter.
  pub fn break_point_mut(&mut self) -> &mut Parameter<f64> {
    &mut self.break_point
  }

  /// Mutable seed parameter.
  pub fn seed_mut(&mut self) -> &mut Parameter<i64> {
    &mut self.seed
  }
}

impl Parameterized for RandomBinarySource {
  fn parameters(&self) -> Vec<&dyn DynParameter> {
    vec![
      &self.number_of_events as &dyn DynParameter,
      &self.break_point as &dyn DynParameter,
      &self.seed as &dyn DynParameter,
    ]
  }

  fn parameters_mut(&mut self) -> Vec<&mut dyn DynParameter> {
    vec![
      &mut self.number_of_events as &mut dyn DynParameter,
      &mut self.break_point as &mut dyn DynParameter,
      &mut self.seed as &mut dyn DynParameter,
    ]
  }
}

impl Connectable for RandomBinarySource {
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

impl Compilable for RandomBinarySource {
  fn compile(&self) -> std::result::Result<CompiledNode, ValidationError> {
    self.validate()?;
    Ok(CompiledNode::Source(Box::new(CompiledRandomBinarySource {
      id: self.id(),
      count: self.number_of_events.value_or_default().copied().unwrap_or_default().max(0) as u64,
      break_point: self.break_point.value_or_default().copied().unwrap_or(0.5),
      seed: self.seed.value().map(|s| *s as u64),
      attributes: self.output.attributes.clone(),
      lifecycle: Lifecycle::new(self.id()),
    })))
  }
}

impl Component for RandomBinarySource {
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

  fn new_instance(&self) -> Box<dyn Component> {
    let mut copy = self.clone();
    copy.set_id(Uuid::new_v4());
    Box::new(copy)
  }
}

fn factory() -> Box<dyn Component> {
  Box::new(RandomBinarySource::new_template())
}

pub(crate) const REGISTRATION: ComponentRegistration = ComponentRegistration::new(TYPE_NAME, factory);

/// Compiled snapshot of a [`RandomBinarySource`].
#[derive(Debug)]
pub struct CompiledRandomBinarySource {
  id: Uuid,
  count: u64,
  break_point: f64,
  seed: Option<u64>,
  attributes: EventType,
  lifecycle: Lifecycle,
}

#[async_trait]
impl CompiledSource for CompiledRandomBinarySource {
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
    trace!(node = %self.id, count = self.count, break_point = self.break_point, "CompiledRandomBinarySource::run");
    let mut rng = match self.seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_entropy(),
    };
    let break_point = self.break_point;
    let attributes = &self.attributes;
    emit_events(
      &mut self.lifecycle,
      runtime,
      cancel,
      TYPE_NAME,
      self.id,
      self.count,
      move |_| {
        let bit = if rng.gen_range(0.0..1.0) < break_point { 0 } else { 1 };
        attributes
          .attributes()
          .iter()
          .map(|a| (a.name.clone(), a.sample_value(bit)))
          .collect()
      },
    )
    .await
  }
}
