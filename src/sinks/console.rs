//! Trace output sink.

use crate::component::{
  Compilable, CompiledNode, CompiledSink, Component, ComponentCore, Connectable, NodeKind,
  Parameterized, SinkStatus,
};
use crate::error::{Result, ValidationError};
use crate::event::Body;
use crate::offset::OffsetStore;
use crate::parameter::{Constraint, DynParameter, Parameter};
use crate::port::{Input, Output};
use crate::reader::StreamReader;
use crate::registry::ComponentRegistration;
use crate::runtime::StreamingRuntime;
use crate::value::ValueType;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

/// Registry type identifier.
pub const TYPE_NAME: &str = "logweave::sinks::ConsoleSink";

/// Writes one line per message to the runtime's standard out.
///
/// A line is the message id followed by `name=value` pairs. "Show Attributes"
/// restricts the pairs to a comma-separated list of names; unset, every
/// attribute is shown. "Max batches" caps the batches drained per run, with
/// `0` meaning no cap.
#[derive(Debug, Clone)]
pub struct ConsoleSink {
  core: ComponentCore,
  show_attributes: Parameter<String>,
  page_size: Parameter<i64>,
  max_batches: Parameter<i64>,
  inputs: [Input; 1],
}

impl ConsoleSink {
  /// An unconnected template showing every attribute, 100 messages per read.
  pub fn new_template() -> Self {
    Self {
      core: ComponentCore::new("Console", "Traces every message it reads."),
      show_attributes: Parameter::new(1, "Show Attributes"),
      page_size: Parameter::new(2, "Page size")
        .default_value(100)
        .required(true)
        .constraint(Constraint::min_integer(1, "Page size has to be greater than zero.")),
      max_batches: Parameter::new(3, "Max batches")
        .default_value(0)
        .required(true)
        .constraint(Constraint::min_integer(0, "Max batches cannot be negative.")),
      inputs: [Input::new(1, "Input", ValueType::Any).description("Stream to trace.")],
    }
  }

  /// Mutable attribute filter.
  pub fn show_attributes_mut(&mut self) -> &mut Parameter<String> {
    &mut self.show_attributes
  }

  /// Mutable page size.
  pub fn page_size_mut(&mut self) -> &mut Parameter<i64> {
    &mut self.page_size
  }

  /// Mutable batch cap.
  pub fn max_batches_mut(&mut self) -> &mut Parameter<i64> {
    &mut self.max_batches
  }
}

impl Parameterized for ConsoleSink {
  fn parameters(&self) -> Vec<&dyn DynParameter> {
    vec![
      &self.show_attributes as &dyn DynParameter,
      &self.page_size as &dyn DynParameter,
      &self.max_batches as &dyn DynParameter,
    ]
  }

  fn parameters_mut(&mut self) -> Vec<&mut dyn DynParameter> {
    vec![
      &mut self.show_attributes as &mut dyn DynParameter,
      &mut self.page_size as &mut dyn DynParameter,
      &mut self.max_batches as &mut dyn DynParameter,
    ]
  }
}

impl Connectable for ConsoleSink {
  fn inputs(&self) -> &[Input] {
    &self.inputs
  }

  fn inputs_mut(&mut self) -> &mut [Input] {
    &mut self.inputs
  }

  fn output(&self) -> Option<&Output> {
    None
  }

  fn output_mut(&mut self) -> Option<&mut Output> {
    None
  }
}

impl Compilable for ConsoleSink {
  fn compile(&self) -> std::result::Result<CompiledNode, ValidationError> {
    self.validate()?;
    let filter = self
      .show_attributes
      .value()
      .map(|list| {
        list
          .split(',')
          .map(str::trim)
          .filter(|name| !name.is_empty())
          .map(str::to_string)
          .collect::<Vec<_>>()
      })
      .unwrap_or_default();
    let [input] = self.inputs.clone();
    Ok(CompiledNode::Sink(Box::new(CompiledConsoleSink {
      id: self.id(),
      name: self.name().to_string(),
      input,
      filter,
      page_size: self
        .page_size
        .value_or_default()
        .and_then(|p| usize::try_from(*p).ok())
        .unwrap_or(100),
      max_batches: self
        .max_batches
        .value_or_default()
        .and_then(|m| usize::try_from(*m).ok())
        .unwrap_or(0),
      store: None,
      reader: None,
    })))
  }
}

impl Component for ConsoleSink {
  fn core(&self) -> &ComponentCore {
    &self.core
  }

  fn core_mut(&mut self) -> &mut ComponentCore {
    &mut self.core
  }

  fn kind(&self) -> NodeKind {
    NodeKind::Sink
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
  Box::new(ConsoleSink::new_template())
}

pub(crate) const REGISTRATION: ComponentRegistration = ComponentRegistration::new(TYPE_NAME, factory);

/// Compiled snapshot of a [`ConsoleSink`].
pub struct CompiledConsoleSink {
  id: Uuid,
  name: String,
  input: Input,
  filter: Vec<String>,
  page_size: usize,
  max_batches: usize,
  store: Option<Arc<dyn OffsetStore>>,
  reader: Option<StreamReader>,
}

impl CompiledConsoleSink {
  fn format_line(&self, message_id: &str, body: &Body) -> String {
    let pairs: Vec<String> = body
      .iter()
      .filter(|(name, _)| self.filter.is_empty() || self.filter.iter().any(|f| f == *name))
      .map(|(name, value)| format!("{}={}", name, value))
      .collect();
    format!("{} {}", message_id, pairs.join(" "))
  }

  async fn drain(
    &self,
    runtime: &dyn StreamingRuntime,
    cancel: &CancellationToken,
    reader: &mut StreamReader,
  ) -> Result<SinkStatus> {
    let mut batches = 0usize;
    loop {
      if cancel.is_cancelled() {
        debug!(node = %self.id, offset = %reader.position(), "sink cancelled");
        return Ok(SinkStatus::Cancelled);
      }

      let batch = reader.next_batch(runtime).await?;
      if batch.is_empty() {
        debug!(node = %self.id, batches, "sink complete");
        return Ok(SinkStatus::Complete);
      }

      for message in &batch {
        match &message.body {
          Some(body) => runtime
            .standard_out()
            .emit(&self.format_line(&message.id, body)),
          None => warn!(node = %self.id, message = %message.id, "event is null"),
        }
      }

      batches += 1;
      if self.max_batches > 0 && batches >= self.max_batches {
        debug!(node = %self.id, batches, offset = %reader.position(), "sink back log");
        return Ok(SinkStatus::BackLog);
      }
    }
  }
}

#[async_trait]
impl CompiledSink for CompiledConsoleSink {
  fn id(&self) -> Uuid {
    self.id
  }

  fn attach_offset_store(&mut self, store: Arc<dyn OffsetStore>) {
    self.store = Some(store);
    self.reader = None;
  }

  async fn run(
    &mut self,
    runtime: &dyn StreamingRuntime,
    cancel: &CancellationToken,
  ) -> Result<SinkStatus> {
    trace!(node = %self.id, page_size = self.page_size, "CompiledConsoleSink::run");
    // The cursor survives between invocations so a back log resumes where it stopped.
    let mut reader = match self.reader.take() {
      Some(reader) => reader,
      None => StreamReader::open(&self.name, self.id, &self.input, self.store.clone())?
        .with_page_size(Some(self.page_size)),
    };
    let result = self.drain(runtime, cancel, &mut reader).await;
    self.reader = Some(reader);
    if let Err(e) = &result {
      error!(node = %self.id, error = %e, "sink failed");
    }
    result
  }
}
