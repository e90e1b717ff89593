//! Immutable attribute maps passed between nodes through the event log.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Message body as stored on the log: attribute name to text value.
pub type Body = BTreeMap<String, String>;

/// An immutable attribute-name to value map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event {
  data: Body,
}

impl Event {
  /// Wraps a body.
  pub fn new(data: Body) -> Self {
    Self { data }
  }

  /// Builds an event from `(name, value)` pairs.
  pub fn from_pairs<I, K, V>(pairs: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    Self {
      data: pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect(),
    }
  }

  /// Raw text value of an attribute.
  pub fn get(&self, name: &str) -> Option<&str> {
    self.data.get(name).map(String::as_str)
  }

  /// Attribute parsed as a double. `None` when absent or not numeric.
  pub fn get_f64(&self, name: &str) -> Option<f64> {
    self.get(name).and_then(|v| v.trim().parse().ok())
  }

  /// Attribute parsed as an integer.
  pub fn get_i64(&self, name: &str) -> Option<i64> {
    self.get(name).and_then(|v| v.trim().parse().ok())
  }

  /// Attribute parsed as a boolean.
  pub fn get_bool(&self, name: &str) -> Option<bool> {
    self.get(name).and_then(|v| v.trim().parse().ok())
  }

  /// The underlying body.
  pub fn body(&self) -> &Body {
    &self.data
  }

  /// Consumes the event, returning its body.
  pub fn into_body(self) -> Body {
    self.data
  }

  /// Number of attributes.
  pub fn len(&self) -> usize {
    self.data.len()
  }

  /// True when the event carries no attributes.
  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }
}

impl From<Body> for Event {
  fn from(data: Body) -> Self {
    Self::new(data)
  }
}
