//! Two-series crossing detector.
//!
//! Values from the "First" and "Second" inputs are joined pairwise in arrival
//! order. Each joined pair goes into a two-slot [`Memory`]; once two pairs are
//! held, the detector compares their relative order and emits `crossed=true`
//! when it flipped in the configured [`Direction`]. Every joined pair produces
//! one event, so the first pair always yields `crossed=false`.
//!
//! The join completes when one round of reads comes back empty on both inputs.
//! Operands still waiting for a partner at that point are logged and left
//! uncommitted: each input's stored position only moves past the last operand
//! that was paired, so a resumed run reads the waiting operands again.

use super::output_violation;
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
use crate::runtime::{StreamMessage, StreamingRuntime};
use crate::value::ValueType;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

/// Registry type identifier.
pub const TYPE_NAME: &str = "logweave::processors::Crossing";

/// Name of the direction parameter.
pub const DIRECTION: &str = "Direction";

const DIRECTIONS: &[&str] = &["above", "below"];

const PAIR_WINDOW: NonZeroUsize = NonZeroUsize::MIN.saturating_add(1);

/// Which flip of the relative order raises the signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
  /// First moves from below Second to at or above it.
  Above,
  /// First moves from at or above Second to below it.
  Below,
}

impl Direction {
  /// Whether the move from `older` to `newer` is a crossing in this direction.
  ///
  /// Each pair is `(first, second)`.
  pub fn crossed(self, older: (f64, f64), newer: (f64, f64)) -> bool {
    match self {
      Direction::Above => older.0 < older.1 && newer.0 >= newer.1,
      Direction::Below => older.0 >= older.1 && newer.0 < newer.1,
    }
  }
}

impl fmt::Display for Direction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Direction::Above => write!(f, "above"),
      Direction::Below => write!(f, "below"),
    }
  }
}

impl FromStr for Direction {
  type Err = String;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "above" => Ok(Direction::Above),
      "below" => Ok(Direction::Below),
      other => Err(format!("unknown direction '{}'", other)),
    }
  }
}

/// Signals when the first series crosses the second.
#[derive(Debug, Clone)]
pub struct Crossing {
  core: ComponentCore,
  direction: Parameter<String>,
  inputs: [Input; 2],
  output: Output,
}

impl Crossing {
  /// An unconnected template detecting upward crossings.
  pub fn new_template() -> Self {
    Self {
      core: ComponentCore::new(
        "Crossing",
        "Signals when the first series crosses the second in the given direction.",
      ),
      direction: Parameter::new(1, DIRECTION)
        .default_value(Direction::Above.to_string())
        .required(true)
        .constraint(Constraint::one_of(
          DIRECTIONS,
          "Direction has to be 'above' or 'below'.",
        )),
      inputs: [
        Input::new(1, "First", ValueType::Double).description("Series that crosses."),
        Input::new(2, "Second", ValueType::Double).description("Series being crossed."),
      ],
      output: Output::new(1, "Output").with_attribute(Attribute::new("crossed", ValueType::Boolean)),
    }
  }

  /// The direction parameter.
  pub fn direction(&self) -> &Parameter<String> {
    &self.direction
  }

  /// Mutable direction parameter.
  pub fn direction_mut(&mut self) -> &mut Parameter<String> {
    &mut self.direction
  }
}

impl Parameterized for Crossing {
  fn parameters(&self) -> Vec<&dyn DynParameter> {
    vec![&self.direction as &dyn DynParameter]
  }

  fn parameters_mut(&mut self) -> Vec<&mut dyn DynParameter> {
    vec![&mut self.direction as &mut dyn DynParameter]
  }
}

impl Connectable for Crossing {
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

impl Compilable for Crossing {
  fn compile(&self) -> std::result::Result<CompiledNode, ValidationError> {
    self.validate()?;
    let direction = self
      .direction
      .value_or_default()
      .map(|d| d.parse::<Direction>())
      .transpose()
      .map_err(|message| Violation::ConstraintViolated {
        component: self.name().to_string(),
        parameter: DIRECTION.to_string(),
        message,
      })?
      .unwrap_or(Direction::Above);
    let [first, second] = self.inputs.clone();
    Ok(CompiledNode::Processor(Box::new(CompiledCrossing {
      id: self.id(),
      name: self.name().to_string(),
      direction,
      first,
      second,
      output_attribute: self.output.primary_attribute().unwrap_or("crossed").to_string(),
      memory: Memory::new(PAIR_WINDOW),
      lifecycle: Lifecycle::new(self.id()),
      store: None,
    })))
  }
}

impl Component for Crossing {
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
  Box::new(Crossing::new_template())
}

pub(crate) const REGISTRATION: ComponentRegistration = ComponentRegistration::new(TYPE_NAME, factory);

/// Compiled snapshot of a [`Crossing`].
pub struct CompiledCrossing {
  id: Uuid,
  name: String,
  direction: Direction,
  first: Input,
  second: Input,
  output_attribute: String,
  memory: Memory<(f64, f64)>,
  lifecycle: Lifecycle,
  store: Option<Arc<dyn OffsetStore>>,
}

/// Numeric operands of a batch with their message ids, in order; null and
/// non-numeric bodies are skipped.
fn operands(
  node: Uuid,
  attribute: &str,
  batch: Vec<StreamMessage>,
) -> impl Iterator<Item = (String, f64)> {
  let attribute = attribute.to_string();
  batch.into_iter().filter_map(move |message| {
    let Some(event) = message.event() else {
      warn!(node = %node, message = %message.id, "event is null");
      return None;
    };
    let value = event.get_f64(&attribute);
    if value.is_none() {
      warn!(node = %node, message = %message.id, attribute = %attribute, "non-numeric value, skipping");
    }
    value.map(|value| (message.id, value))
  })
}

impl CompiledCrossing {
  fn reader(&self, input: &Input) -> Result<StreamReader> {
    let mut reader = StreamReader::for_input(&self.name, self.id, input)?
      .keyed_by_input(input.name())
      .with_manual_commit();
    if let Some(store) = &self.store {
      reader.attach_store(store.clone())?;
    }
    Ok(reader)
  }

  fn readers(&self) -> Result<(StreamReader, StreamReader)> {
    Ok((self.reader(&self.first)?, self.reader(&self.second)?))
  }

  async fn join(
    &mut self,
    runtime: &dyn StreamingRuntime,
    cancel: &CancellationToken,
    first: &mut StreamReader,
    second: &mut StreamReader,
  ) -> Result<RunState> {
    let mut pending_first: VecDeque<(String, f64)> = VecDeque::new();
    let mut pending_second: VecDeque<(String, f64)> = VecDeque::new();
    loop {
      if cancel.is_cancelled() {
        debug!(node = %self.id, "crossing cancelled");
        self.lifecycle.enter(RunState::Cancelled)?;
        return Ok(RunState::Cancelled);
      }

      let first_batch = first.next_batch(runtime).await?;
      let second_batch = second.next_batch(runtime).await?;
      if first_batch.is_empty() && second_batch.is_empty() {
        if !pending_first.is_empty() || !pending_second.is_empty() {
          warn!(
            node = %self.id,
            first = pending_first.len(),
            second = pending_second.len(),
            "unpaired operands left uncommitted"
          );
        }
        debug!(node = %self.id, "crossing complete");
        self.lifecycle.enter(RunState::Complete)?;
        return Ok(RunState::Complete);
      }

      pending_first.extend(operands(self.id, first.attribute(), first_batch));
      pending_second.extend(operands(self.id, second.attribute(), second_batch));

      let ready = pending_first.len().min(pending_second.len());
      if ready == 0 {
        continue;
      }
      let joined: Vec<((String, f64), (String, f64))> = pending_first
        .drain(..ready)
        .zip(pending_second.drain(..ready))
        .collect();
      let mut paired_through = None;
      for ((first_id, a), (second_id, b)) in joined {
        let crossed = self.observe((a, b));
        let mut body = Body::new();
        body.insert(self.output_attribute.clone(), crossed.to_string());
        runtime.write_events(body, TYPE_NAME, self.id).await?;
        paired_through = Some((first_id, second_id));
      }
      if let Some((first_id, second_id)) = paired_through {
        first.commit_through(&first_id)?;
        second.commit_through(&second_id)?;
      }
    }
  }

  /// Pushes a joined pair and reports whether it completes a crossing.
  fn observe(&mut self, pair: (f64, f64)) -> bool {
    self.memory.push(pair);
    match (self.memory.oldest(), self.memory.newest()) {
      (Some(older), Some(newer)) if self.memory.is_full() => self.direction.crossed(*older, *newer),
      _ => false,
    }
  }
}

#[async_trait]
impl CompiledProcessor for CompiledCrossing {
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
    trace!(node = %self.id, direction = %self.direction, "CompiledCrossing::run");
    let (mut first, mut second) = match self.readers() {
      Ok(readers) => readers,
      Err(e) => {
        self.lifecycle.cancel();
        return Err(e);
      }
    };
    self.lifecycle.enter(RunState::Running)?;
    let result = self.join(runtime, cancel, &mut first, &mut second).await;
    if let Err(e) = &result {
      error!(node = %self.id, error = %e, "crossing failed");
      self.lifecycle.cancel();
    }
    result
  }
}
