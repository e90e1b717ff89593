//! Scalar value types shared by parameters, attributes and ports.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type tag for parameter values and event attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
  /// Signed 64-bit integer.
  Integer,
  /// 64-bit float.
  Double,
  /// UTF-8 text.
  String,
  /// `true` / `false`.
  Boolean,
  /// Accepts any attribute type. Only meaningful on the consuming side.
  Any,
}

impl ValueType {
  /// Whether a producer attribute of type `produced` can feed an input expecting `self`.
  ///
  /// Integers widen to doubles; `Any` accepts everything.
  pub fn accepts(self, produced: ValueType) -> bool {
    match (self, produced) {
      (ValueType::Any, _) => true,
      (ValueType::Double, ValueType::Integer) => true,
      (expected, produced) => expected == produced,
    }
  }
}

impl fmt::Display for ValueType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      ValueType::Integer => "integer",
      ValueType::Double => "double",
      ValueType::String => "string",
      ValueType::Boolean => "boolean",
      ValueType::Any => "any",
    };
    f.write_str(name)
  }
}

/// A dynamically typed parameter value as it appears at the serialization boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
  /// No value set.
  Null,
  /// Boolean value.
  Boolean(bool),
  /// Integer value.
  Integer(i64),
  /// Floating point value.
  Double(f64),
  /// Text value.
  String(String),
}

impl ParamValue {
  /// True for [`ParamValue::Null`].
  pub fn is_null(&self) -> bool {
    matches!(self, ParamValue::Null)
  }
}

impl fmt::Display for ParamValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ParamValue::Null => f.write_str("null"),
      ParamValue::Boolean(b) => write!(f, "{}", b),
      ParamValue::Integer(i) => write!(f, "{}", i),
      ParamValue::Double(d) => write!(f, "{}", d),
      ParamValue::String(s) => f.write_str(s),
    }
  }
}

/// Rust types that can back a [`crate::parameter::Parameter`].
pub trait ParameterType: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
  /// The type tag written to the serialized parameter table.
  const VALUE_TYPE: ValueType;

  /// Converts into the boundary representation.
  fn to_value(&self) -> ParamValue;

  /// Converts from the boundary representation, `None` on a type mismatch.
  fn from_value(value: &ParamValue) -> Option<Self>;
}

impl ParameterType for i64 {
  const VALUE_TYPE: ValueType = ValueType::Integer;

  fn to_value(&self) -> ParamValue {
    ParamValue::Integer(*self)
  }

  fn from_value(value: &ParamValue) -> Option<Self> {
    match value {
      ParamValue::Integer(i) => Some(*i),
      ParamValue::Double(d) if d.fract() == 0.0 => Some(*d as i64),
      ParamValue::String(s) => s.trim().parse().ok(),
      _ => None,
    }
  }
}

impl ParameterType for f64 {
  const VALUE_TYPE: ValueType = ValueType::Double;

  fn to_value(&self) -> ParamValue {
    ParamValue::Double(*self)
  }

  fn from_value(value: &ParamValue) -> Option<Self> {
    match value {
      ParamValue::Double(d) => Some(*d),
      ParamValue::Integer(i) => Some(*i as f64),
      ParamValue::String(s) => s.trim().parse().ok(),
      _ => None,
    }
  }
}

impl ParameterType for String {
  const VALUE_TYPE: ValueType = ValueType::String;

  fn to_value(&self) -> ParamValue {
    ParamValue::String(self.clone())
  }

  fn from_value(value: &ParamValue) -> Option<Self> {
    match value {
      ParamValue::String(s) => Some(s.clone()),
      ParamValue::Integer(i) => Some(i.to_string()),
      ParamValue::Double(d) => Some(d.to_string()),
      ParamValue::Boolean(b) => Some(b.to_string()),
      ParamValue::Null => None,
    }
  }
}

impl ParameterType for bool {
  const VALUE_TYPE: ValueType = ValueType::Boolean;

  fn to_value(&self) -> ParamValue {
    ParamValue::Boolean(*self)
  }

  fn from_value(value: &ParamValue) -> Option<Self> {
    match value {
      ParamValue::Boolean(b) => Some(*b),
      ParamValue::String(s) => s.trim().parse().ok(),
      _ => None,
    }
  }
}
