//! Input and output ports, and the stream references that bind them.
//!
//! An [`Input`] is wired to a producer by a [`StreamReference`]: the producer's
//! type identifier and instance id (which together name the producer's stream on
//! the event log) plus the producer's output attributes. The input also records
//! which of those attributes it consumes.

use crate::attribute::{Attribute, EventType};
use crate::error::Violation;
use crate::value::ValueType;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Formats the log stream key of a producer: `"<fullTypeName>:<uuid>"`.
pub fn stream_key(type_name: &str, id: Uuid) -> String {
  format!("{}:{}", type_name, id)
}

/// Splits a stream key into its type name and id.
///
/// Type names may contain `::`, so the split happens at the last `:`.
pub fn parse_stream_key(key: &str) -> Option<(&str, Uuid)> {
  let (type_name, id) = key.rsplit_once(':')?;
  if type_name.is_empty() {
    return None;
  }
  Uuid::parse_str(id).ok().map(|id| (type_name, id))
}

/// Compile-time binding telling a consumer which stream and attributes to read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamReference {
  /// Producer's full type identifier.
  pub producer_type: String,
  /// Producer instance id.
  pub producer_id: Uuid,
  /// Producer's output attributes.
  pub attributes: EventType,
}

impl StreamReference {
  /// Creates a reference.
  pub fn new(producer_type: impl Into<String>, producer_id: Uuid, attributes: EventType) -> Self {
    Self {
      producer_type: producer_type.into(),
      producer_id,
      attributes,
    }
  }

  /// The producer's stream key on the log.
  pub fn stream_key(&self) -> String {
    stream_key(&self.producer_type, self.producer_id)
  }
}

impl fmt::Display for StreamReference {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.stream_key())
  }
}

/// Why an input could not be bound to a producer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
  /// Required input has no producer.
  #[error("not connected")]
  Unconnected,
  /// The named attribute is not produced.
  #[error("producer {producer} has no attribute '{attribute}'")]
  MissingAttribute {
    /// Producer stream key.
    producer: String,
    /// Requested attribute.
    attribute: String,
  },
  /// No attribute named and the producer offers several.
  #[error("producer {producer} offers {count} attributes; one must be named")]
  Ambiguous {
    /// Producer stream key.
    producer: String,
    /// Number of attributes offered.
    count: usize,
  },
  /// Attribute type does not fit the input.
  #[error("attribute '{attribute}' is {found}, input expects {expected}")]
  Incompatible {
    /// Attribute name.
    attribute: String,
    /// Type the input expects.
    expected: ValueType,
    /// Type produced.
    found: ValueType,
  },
}

impl BindingError {
  /// Attaches component and input names.
  pub fn into_violation(self, component: &str, input: &str) -> Violation {
    match self {
      BindingError::Unconnected => Violation::UnconnectedInput {
        component: component.to_string(),
        input: input.to_string(),
      },
      other => Violation::IncompatibleInput {
        component: component.to_string(),
        input: input.to_string(),
        reason: other.to_string(),
      },
    }
  }
}

/// A consuming port of a processor or sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
  id: u32,
  name: String,
  description: String,
  value_type: ValueType,
  required: bool,
  source_attribute: Option<String>,
  reference: Option<StreamReference>,
}

impl Input {
  /// Creates a required, unconnected input accepting `value_type`.
  pub fn new(id: u32, name: impl Into<String>, value_type: ValueType) -> Self {
    Self {
      id,
      name: name.into(),
      description: String::new(),
      value_type,
      required: true,
      source_attribute: None,
      reference: None,
    }
  }

  /// Sets the description.
  #[must_use]
  pub fn description(mut self, description: impl Into<String>) -> Self {
    self.description = description.into();
    self
  }

  /// Sets whether the input must be connected at compile time.
  #[must_use]
  pub fn required(mut self, required: bool) -> Self {
    self.required = required;
    self
  }

  /// Input id, unique within the component.
  pub fn id(&self) -> u32 {
    self.id
  }

  /// Input name; also the relation label of edges feeding it.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Expected value type.
  pub fn value_type(&self) -> ValueType {
    self.value_type
  }

  /// Whether the input must be connected.
  pub fn is_required(&self) -> bool {
    self.required
  }

  /// The producer attribute this input consumes.
  pub fn source_attribute(&self) -> Option<&str> {
    self.source_attribute.as_deref()
  }

  /// The bound producer, if connected.
  pub fn reference(&self) -> Option<&StreamReference> {
    self.reference.as_ref()
  }

  /// True when bound to the producer with `producer_id`.
  pub fn is_connected_to(&self, producer_id: Uuid) -> bool {
    self
      .reference
      .as_ref()
      .is_some_and(|r| r.producer_id == producer_id)
  }

  /// Binds this input to a producer.
  ///
  /// When `attribute` is `None`, a previously chosen attribute is kept; failing
  /// that, a producer with a single attribute supplies it. The binding is only
  /// stored when the attribute exists and its type is compatible.
  pub fn connect(
    &mut self,
    reference: StreamReference,
    attribute: Option<&str>,
  ) -> Result<(), BindingError> {
    let chosen = match attribute.map(str::to_string).or_else(|| self.source_attribute.clone()) {
      Some(name) => name,
      None => match reference.attributes.attributes() {
        [only] => only.name.clone(),
        others => {
          return Err(BindingError::Ambiguous {
            producer: reference.stream_key(),
            count: others.len(),
          });
        }
      },
    };
    self.check_attribute(&reference, &chosen)?;
    self.source_attribute = Some(chosen);
    self.reference = Some(reference);
    Ok(())
  }

  /// Restores a serialized binding without checking it. [`Input::check`] reports
  /// any problem later.
  pub fn restore(&mut self, reference: Option<StreamReference>, attribute: Option<String>) {
    self.reference = reference;
    self.source_attribute = attribute;
  }

  /// Removes the producer binding, keeping the chosen attribute name.
  pub fn disconnect(&mut self) {
    self.reference = None;
  }

  /// Checks the binding is present (when required) and still compatible.
  pub fn check(&self) -> Result<(), BindingError> {
    match (&self.reference, &self.source_attribute) {
      (None, _) if self.required => Err(BindingError::Unconnected),
      (None, _) => Ok(()),
      (Some(reference), Some(attribute)) => self.check_attribute(reference, attribute),
      (Some(reference), None) => Err(BindingError::Ambiguous {
        producer: reference.stream_key(),
        count: reference.attributes.len(),
      }),
    }
  }

  fn check_attribute(&self, reference: &StreamReference, name: &str) -> Result<(), BindingError> {
    let Attribute { value_type, .. } =
      reference
        .attributes
        .get(name)
        .ok_or_else(|| BindingError::MissingAttribute {
          producer: reference.stream_key(),
          attribute: name.to_string(),
        })?;
    if self.value_type.accepts(*value_type) {
      Ok(())
    } else {
      Err(BindingError::Incompatible {
        attribute: name.to_string(),
        expected: self.value_type,
        found: *value_type,
      })
    }
  }
}

/// The single event-type-bearing output of a source or processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
  /// Output id.
  pub id: u32,
  /// Display name.
  pub name: String,
  /// Attributes written by the node.
  pub attributes: EventType,
}

impl Output {
  /// Creates an output with no attributes.
  pub fn new(id: u32, name: impl Into<String>) -> Self {
    Self {
      id,
      name: name.into(),
      attributes: EventType::new(),
    }
  }

  /// Adds an attribute (duplicates ignored).
  #[must_use]
  pub fn with_attribute(mut self, attribute: Attribute) -> Self {
    self.attributes.add(attribute);
    self
  }

  /// Name of the first attribute, the one single-valued processors write.
  pub fn primary_attribute(&self) -> Option<&str> {
    self.attributes.attributes().first().map(|a| a.name.as_str())
  }
}
