//! Simple moving average.

use super::{drive_single_input, output_violation};
use crate::attribute::Attribute;
use crate::component::{
  Compilable, CompiledNode, CompiledProcessor, Component, ComponentCore, Connectable, Lifecycle,
  NodeKind, Parameterized, RunState, port_and_parameter_violations,
};
use crate::error::{Result, ValidationError, Violation};
use crate::event::Body;
use crate::memory::Memory;
use crate::offset::OffsetStore;
use crate::parameter::{Constraint, DynParameter, Parameter};
use crate::port::{Input, Output};
use crate::reader::StreamReader;
use crate::registry::ComponentRegistration;
use crate::runtime::StreamingRuntime;
use crate::value::ValueType;
use async_trait::async_trait;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};
use uuid::Uuid;

/// Registry type identifier.
pub const TYPE_NAME: &str = "logweave::processors::Sma";

/// Name of the window-length parameter.
pub const WINDOW_LENGTH: &str = "Window length";

/// Arithmetic mean of the last "Window length" input values.
///
/// Every consumed value is pushed into a ring buffer of the window length and
/// the mean of the buffer is emitted as `average`. Before the window fills, the
/// mean covers the values seen so far.
#[derive(Debug, Clone)]
pub struct Sma {
  core: ComponentCore,
  window_length: Parameter<i64>,
  inputs: [Input; 1],
  output: Output,
}

impl Sma {
  /// A template with window length 10, unconnected.
  pub fn new_template() -> Self {
    Self {
      core: ComponentCore::new(
        "SMA",
        "Simple Moving Average that operates over a window of a specified length.",
      ),
      window_length: Parameter::new(1, WINDOW_LENGTH)
        .default_value(10)
        .required(true)
        .constraint(Constraint::min_integer(
          1,
          "Window length has to be greater than zero.",
        )),
      inputs: [Input::new(1, "Input", ValueType::Double)
        .description("Value to average over the window.")],
      output: Output::new(1, "Output").with_attribute(Attribute::new("average", ValueType::Double)),
    }
  }

  /// The window-length parameter.
  pub fn window_length(&self) -> &Parameter<i64> {
    &self.window_length
  }

  /// Mutable window-length parameter.
  pub fn window_length_mut(&mut self) -> &mut Parameter<i64> {
    &mut self.window_length
  }
}

impl Parameterized for Sma {
  fn parameters(&self) -> Vec<&dyn DynParameter> {
    vec![&self.window_length as &dyn DynParameter]
  }

  fn parameters_mut(&mut self) -> Vec<&mut dyn DynParameter> {
    vec![&mut self.window_length as &mut dyn DynParameter]
  }
}

impl Connectable for Sma {
  fn inputs(&self) -> &[Input] {
    &self.inputs
  }

  fn inputs_mut(&mut self) -> &mut [Input] {
    &mut self.inputs
  }

  fn output(&self) -> Option<&Output> {
    Some(&self.output)
  }

  fn output_mut(&mut self) -> Option<&mut Output> {
    Some(&mut self.output)
  }
}

impl Compilable for Sma {
  fn compile(&self) -> std::result::Result<CompiledNode, ValidationError> {
    self.validate()?;
    let window = self
      .window_length
      .value_or_default()
      .and_then(|w| usize::try_from(*w).ok())
      .and_then(NonZeroUsize::new)
      .ok_or_else(|| Violation::ConstraintViolated {
        component: self.name().to_string(),
        parameter: WINDOW_LENGTH.to_string(),
        message: "Window length has to be greater than zero.".to_string(),
      })?;
    let [input] = self.inputs.clone();
    Ok(CompiledNode::Processor(Box::new(CompiledSma {
      id: self.id(),
      name: self.name().to_string(),
      input,
      output_attribute: self.output.primary_attribute().unwrap_or("average").to_string(),
      memory: Memory::new(window),
      lifecycle: Lifecycle::new(self.id()),
      store: None,
    })))
  }
}

impl Component for Sma {
  fn core(&self) -> &ComponentCore {
    &self.core
  }

  fn core_mut(&mut self) -> &mut ComponentCore {
    &mut self.core
  }

  fn kind(&self) -> NodeKind {
    NodeKind::Processor
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

  fn violations(&self) -> Vec<Violation> {
    let mut violations = port_and_parameter_violations(self);
    violations.extend(output_violation(self.name(), &self.output));
    violations
  }
}

fn factory() -> Box<dyn Component> {
  Box::new(Sma::new_template())
}

pub(crate) const REGISTRATION: ComponentRegistration = ComponentRegistration::new(TYPE_NAME, factory);

/// Compiled snapshot of an [`Sma`].
pub struct CompiledSma {
  id: Uuid,
  name: String,
  input: Input,
  output_attribute: String,
  memory: Memory<f64>,
  lifecycle: Lifecycle,
  store: Option<Arc<dyn OffsetStore>>,
}

#[async_trait]
impl CompiledProcessor for CompiledSma {
  fn id(&self) -> Uuid {
    self.id
  }

  fn state(&self) -> RunState {
    self.lifecycle.state()
  }

  fn attach_offset_store(&mut self, store: Arc<dyn OffsetStore>) {
    self.store = Some(store);
  }

  async fn run(
    &mut self,
    runtime: &dyn StreamingRuntime,
    cancel: &CancellationToken,
  ) -> Result<RunState> {
    trace!(node = %self.id, window = self.memory.capacity(), "CompiledSma::run");
    let mut reader = match StreamReader::open(&self.name, self.id, &self.input, self.store.clone()) {
      Ok(reader) => reader,
      Err(e) => {
        self.lifecycle.cancel();
        return Err(e.into());
      }
    };

    let id = self.id;
    let attribute = reader.attribute().to_string();
    let output_attribute = self.output_attribute.clone();
    let memory = &mut self.memory;
    drive_single_input(
      &mut self.lifecycle,
      runtime,
      cancel,
      &mut reader,
      TYPE_NAME,
      id,
      |event| {
        let Some(value) = event.get_f64(&attribute) else {
          warn!(node = %id, attribute = %attribute, "non-numeric value, skipping");
          return None;
        };
        memory.push(value);
        let mean = memory.mean()?;
        let mut body = Body::new();
        body.insert(output_attribute.clone(), mean.to_string());
        Some(body)
      },
    )
    .await
  }
}
