//! Typed, validated configuration values.
//!
//! Each component keeps its parameters as typed [`Parameter<T>`] fields. The
//! `(id, name, type, value)` table form ([`ParameterRecord`]) only exists at the
//! serialization boundary, produced and consumed through [`DynParameter`].

use crate::error::Violation;
use crate::value::{ParamValue, ParameterType, ValueType};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Why a parameter value was rejected or is unusable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParameterError {
  /// Required and unset.
  #[error("required value is missing")]
  Missing,
  /// Constraint predicate failed; carries the constraint message.
  #[error("{0}")]
  Constraint(String),
  /// Value of the wrong type.
  #[error("expected a value of type {0}")]
  Type(ValueType),
}

impl ParameterError {
  /// Attaches component and parameter names.
  pub fn into_violation(self, component: &str, parameter: &str) -> Violation {
    let component = component.to_string();
    let parameter = parameter.to_string();
    match self {
      ParameterError::Missing => Violation::MissingParameter {
        component,
        parameter,
      },
      ParameterError::Constraint(message) => Violation::ConstraintViolated {
        component,
        parameter,
        message,
      },
      ParameterError::Type(expected) => Violation::ParameterType {
        component,
        parameter,
        expected: expected.to_string(),
      },
    }
  }
}

type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Predicate plus the message reported when it fails.
#[derive(Clone)]
pub struct Constraint<T> {
  predicate: Predicate<T>,
  message: String,
}

impl<T> Constraint<T> {
  /// Creates a constraint from an arbitrary predicate.
  pub fn new<F>(predicate: F, message: impl Into<String>) -> Self
  where
    F: Fn(&T) -> bool + Send + Sync + 'static,
  {
    Self {
      predicate: Arc::new(predicate),
      message: message.into(),
    }
  }

  /// Returns the failure message if `value` does not satisfy the predicate.
  pub fn check(&self, value: &T) -> Result<(), String> {
    if (self.predicate)(value) {
      Ok(())
    } else {
      Err(self.message.clone())
    }
  }

  /// The message reported on failure.
  pub fn message(&self) -> &str {
    &self.message
  }
}

impl Constraint<i64> {
  /// Integer must be `>= minimum`.
  pub fn min_integer(minimum: i64, message: impl Into<String>) -> Self {
    Self::new(move |v: &i64| *v >= minimum, message)
  }
}

impl Constraint<f64> {
  /// Double must lie in `[low, high]`.
  pub fn range_double(low: f64, high: f64, message: impl Into<String>) -> Self {
    Self::new(move |v: &f64| *v >= low && *v <= high, message)
  }
}

impl Constraint<String> {
  /// Text must not be blank.
  pub fn non_empty(message: impl Into<String>) -> Self {
    Self::new(|v: &String| !v.trim().is_empty(), message)
  }

  /// Text must be one of `choices` (case-insensitive).
  pub fn one_of(choices: &'static [&'static str], message: impl Into<String>) -> Self {
    Self::new(
      move |v: &String| choices.iter().any(|c| c.eq_ignore_ascii_case(v.trim())),
      message,
    )
  }
}

impl<T> fmt::Debug for Constraint<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Constraint")
      .field("message", &self.message)
      .finish()
  }
}

/// A typed configuration value belonging to one component.
///
/// Created by a component's template factory, mutated through validated
/// setters before compilation, and deep-copied into compiled snapshots.
#[derive(Debug, Clone)]
pub struct Parameter<T: ParameterType> {
  id: u32,
  name: String,
  value: Option<T>,
  default: Option<T>,
  required: bool,
  constraint: Option<Constraint<T>>,
}

impl<T: ParameterType> Parameter<T> {
  /// Creates an optional, unset parameter.
  pub fn new(id: u32, name: impl Into<String>) -> Self {
    Self {
      id,
      name: name.into(),
      value: None,
      default: None,
      required: false,
      constraint: None,
    }
  }

  /// Sets the default, which also becomes the current value.
  #[must_use]
  pub fn default_value(mut self, value: T) -> Self {
    self.value = Some(value.clone());
    self.default = Some(value);
    self
  }

  /// Marks the parameter as required at compile time.
  #[must_use]
  pub fn required(mut self, required: bool) -> Self {
    self.required = required;
    self
  }

  /// Attaches a constraint.
  #[must_use]
  pub fn constraint(mut self, constraint: Constraint<T>) -> Self {
    self.constraint = Some(constraint);
    self
  }

  /// Current value, if any.
  pub fn value(&self) -> Option<&T> {
    self.value.as_ref()
  }

  /// Current value, falling back to the default when the value was cleared.
  pub fn value_or_default(&self) -> Option<&T> {
    self.value.as_ref().or(self.default.as_ref())
  }

  /// Whether a value is required at compile time.
  pub fn is_required(&self) -> bool {
    self.required
  }

  /// Sets the value after checking the constraint. On rejection the previous value is kept.
  pub fn set(&mut self, value: T) -> Result<(), ParameterError> {
    if let Some(constraint) = &self.constraint {
      constraint.check(&value).map_err(ParameterError::Constraint)?;
    }
    self.value = Some(value);
    Ok(())
  }

  /// Clears the value.
  pub fn clear(&mut self) {
    self.value = None;
  }

  /// The first problem with the current value, if any.
  pub fn check(&self) -> Result<(), ParameterError> {
    match &self.value {
      None if self.required => Err(ParameterError::Missing),
      None => Ok(()),
      Some(value) => match &self.constraint {
        Some(constraint) => constraint.check(value).map_err(ParameterError::Constraint),
        None => Ok(()),
      },
    }
  }
}

/// One row of a component's parameter table.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterRecord {
  /// Unique within the owning component.
  pub id: u32,
  /// Display name, also the key in serialized form.
  pub name: String,
  /// Declared type.
  pub value_type: ValueType,
  /// Current value.
  pub value: ParamValue,
}

/// Object-safe view over a [`Parameter<T>`] used by generic component code.
pub trait DynParameter: Send + Sync {
  /// Parameter id.
  fn id(&self) -> u32;
  /// Parameter name.
  fn name(&self) -> &str;
  /// Declared type.
  fn value_type(&self) -> ValueType;
  /// Table form of the current value.
  fn record(&self) -> ParameterRecord;
  /// Sets from a boundary value; `Null` clears the value.
  fn set_value(&mut self, value: &ParamValue) -> Result<(), ParameterError>;
  /// First problem with the current value, if any.
  fn problem(&self) -> Option<ParameterError>;
}

impl<T: ParameterType> DynParameter for Parameter<T> {
  fn id(&self) -> u32 {
    self.id
  }

  fn name(&self) -> &str {
    &self.name
  }

  fn value_type(&self) -> ValueType {
    T::VALUE_TYPE
  }

  fn record(&self) -> ParameterRecord {
    ParameterRecord {
      id: self.id,
      name: self.name.clone(),
      value_type: T::VALUE_TYPE,
      value: self
        .value
        .as_ref()
        .map(ParameterType::to_value)
        .unwrap_or(ParamValue::Null),
    }
  }

  fn set_value(&mut self, value: &ParamValue) -> Result<(), ParameterError> {
    if value.is_null() {
      self.clear();
      return Ok(());
    }
    let typed = T::from_value(value).ok_or(ParameterError::Type(T::VALUE_TYPE))?;
    self.set(typed)
  }

  fn problem(&self) -> Option<ParameterError> {
    self.check().err()
  }
}
