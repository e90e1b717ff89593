//! Output schemas: [`Attribute`] and the ordered [`EventType`].

use crate::value::ValueType;
use serde::{Deserialize, Serialize};

/// A named, typed field of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
  /// Unique within its event type.
  pub name: String,
  /// Value type.
  #[serde(rename = "type")]
  pub value_type: ValueType,
}

impl Attribute {
  /// Creates an attribute.
  pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
    Self {
      name: name.into(),
      value_type,
    }
  }

  /// Deterministic sample value for the `n`-th generated event.
  pub fn sample_value(&self, n: u64) -> String {
    match self.value_type {
      ValueType::Integer => n.to_string(),
      ValueType::Double => (n as f64).to_string(),
      ValueType::Boolean => (n % 2 == 1).to_string(),
      ValueType::String | ValueType::Any => format!("{}_{}", self.name, n),
    }
  }
}

/// Ordered set of attributes describing a node's output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType {
  attributes: Vec<Attribute>,
}

impl EventType {
  /// Creates an empty event type.
  pub fn new() -> Self {
    Self::default()
  }

  /// Appends an attribute. Returns `false` (and leaves the type untouched) when
  /// the name is already taken.
  pub fn add(&mut self, attribute: Attribute) -> bool {
    if self.contains(&attribute.name) {
      return false;
    }
    self.attributes.push(attribute);
    true
  }

  /// Builder form of [`EventType::add`]; duplicates are ignored.
  #[must_use]
  pub fn with(mut self, attribute: Attribute) -> Self {
    self.add(attribute);
    self
  }

  /// Removes an attribute by name.
  pub fn remove(&mut self, name: &str) -> Option<Attribute> {
    let index = self.attributes.iter().position(|a| a.name == name)?;
    Some(self.attributes.remove(index))
  }

  /// Looks an attribute up by name.
  pub fn get(&self, name: &str) -> Option<&Attribute> {
    self.attributes.iter().find(|a| a.name == name)
  }

  /// Whether an attribute with `name` exists.
  pub fn contains(&self, name: &str) -> bool {
    self.get(name).is_some()
  }

  /// Attributes in declaration order.
  pub fn attributes(&self) -> &[Attribute] {
    &self.attributes
  }

  /// Number of attributes.
  pub fn len(&self) -> usize {
    self.attributes.len()
  }

  /// True when there are no attributes.
  pub fn is_empty(&self) -> bool {
    self.attributes.is_empty()
  }
}
