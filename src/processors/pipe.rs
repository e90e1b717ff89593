//! String to double conversion.

use super::{drive_single_input, output_violation};
use crate::attribute::Attribute;
use crate::component::{
  Compilable, CompiledNode, CompiledProcessor, Component, ComponentCore, Connectable, Lifecycle,
  NodeKind, Parameterized, RunState, port_and_parameter_violations,
};
use crate::error::{Result, ValidationError, Violation};
use crate::event::Body;
use crate::offset::OffsetStore;
use crate::parameter::DynParameter;
use crate::port::{Input, Output};
use crate::reader::StreamReader;
use crate::registry::ComponentRegistration;
use crate::runtime::StreamingRuntime;
use crate::value::ValueType;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};
use uuid::Uuid;

/// Registry type identifier.
pub const TYPE_NAME: &str = "logweave::processors::Pipe";

/// Re-emits one attribute of any type as a double named `output`.
///
/// Values that do not parse as a number are logged and skipped.
#[derive(Debug, Clone)]
pub struct Pipe {
  core: ComponentCore,
  inputs: [Input; 1],
  output: Output,
}

impl Pipe {
  /// An unconnected template.
  pub fn new_template() -> Self {
    Self {
      core: ComponentCore::new("Pipe", "Converts a text attribute to a double."),
      inputs: [Input::new(1, "Input", ValueType::Any).description("Value to convert.")],
      output: Output::new(1, "Output").with_attribute(Attribute::new("output", ValueType::Double)),
    }
  }
}

impl Parameterized for Pipe {
  fn parameters(&self) -> Vec<&dyn DynParameter> {
    Vec::new()
  }

  fn parameters_mut(&mut self) -> Vec<&mut dyn DynParameter> {
    Vec::new()
  }
}

impl Connectable for Pipe {
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

impl Compilable for Pipe {
  fn compile(&self) -> std::result::Result<CompiledNode, ValidationError> {
    self.validate()?;
    let [input] = self.inputs.clone();
    Ok(CompiledNode::Processor(Box::new(CompiledPipe {
      id: self.id(),
      name: self.name().to_string(),
      input,
      output_attribute: self.output.primary_attribute().unwrap_or("output").to_string(),
      lifecycle: Lifecycle::new(self.id()),
      store: None,
    })))
  }
}

impl Component for Pipe {
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
  Box::new(Pipe::new_template())
}

pub(crate) const REGISTRATION: ComponentRegistration = ComponentRegistration::new(TYPE_NAME, factory);

/// Compiled snapshot of a [`Pipe`].
pub struct CompiledPipe {
  id: Uuid,
  name: String,
  input: Input,
  output_attribute: String,
  lifecycle: Lifecycle,
  store: Option<Arc<dyn OffsetStore>>,
}

#[async_trait]
impl CompiledProcessor for CompiledPipe {
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
    trace!(node = %self.id, "CompiledPipe::run");
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
    drive_single_input(
      &mut self.lifecycle,
      runtime,
      cancel,
      &mut reader,
      TYPE_NAME,
      id,
      |event| {
        let Some(raw) = event.get(&attribute) else {
          warn!(node = %id, attribute = %attribute, "attribute missing, skipping");
          return None;
        };
        match raw.trim().parse::<f64>() {
          Ok(value) => {
            let mut body = Body::new();
            body.insert(output_attribute.clone(), value.to_string());
            Some(body)
          }
          Err(e) => {
            warn!(node = %id, value = %raw, error = %e, "malformed number, skipping");
            None
          }
        }
      },
    )
    .await
  }
}
