//! # Error Handling
//!
//! Error kinds raised while building, compiling and running stream graphs.
//!
//! ## Overview
//!
//! - **ValidationError**: Raised before compilation. Carries every [`Violation`]
//!   found, never just the first one, and never leaves a partially built node.
//! - **ProcessingError**: Raised while a compiled node runs (transport failure,
//!   missing stream reference, serialization failure). It cancels the affected
//!   node's loop and propagates to the host.
//! - **ProgrammerError**: An internal invariant was broken. Always fatal.
//!
//! Malformed individual messages are not errors: compiled nodes log and skip them.
//!
//! ## Example
//!
//! ```rust
//! use logweave::error::{ValidationError, Violation};
//!
//! let error = ValidationError::from_violations(vec![
//!   Violation::MissingParameter {
//!     component: "SMA".to_string(),
//!     parameter: "Window length".to_string(),
//!   },
//!   Violation::UnconnectedInput {
//!     component: "SMA".to_string(),
//!     input: "Input".to_string(),
//!   },
//! ]);
//! assert_eq!(error.violations().len(), 2);
//! ```

use std::fmt;
use thiserror::Error;

/// A single reason a component, Gnode or Graph failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
  /// A required parameter has no value.
  MissingParameter {
    /// Component display name.
    component: String,
    /// Parameter name.
    parameter: String,
  },
  /// A parameter value does not satisfy its constraint.
  ConstraintViolated {
    /// Component display name.
    component: String,
    /// Parameter name.
    parameter: String,
    /// Constraint message.
    message: String,
  },
  /// A parameter value has the wrong type.
  ParameterType {
    /// Component display name.
    component: String,
    /// Parameter name.
    parameter: String,
    /// Expected value type.
    expected: String,
  },
  /// A required input has no producer bound to it.
  UnconnectedInput {
    /// Component display name.
    component: String,
    /// Input name.
    input: String,
  },
  /// An input is bound to a producer attribute that is missing or of an incompatible type.
  IncompatibleInput {
    /// Component display name.
    component: String,
    /// Input name.
    input: String,
    /// Why the binding was rejected.
    reason: String,
  },
  /// An input name is not declared by the component.
  UnknownInput {
    /// Component display name.
    component: String,
    /// Input name.
    input: String,
  },
  /// No constructor is registered for a type identifier.
  UnknownType {
    /// The unresolved type identifier.
    type_name: String,
  },
  /// A constructor was found but populating the component failed.
  ConstructionFailed {
    /// The type identifier.
    type_name: String,
    /// What went wrong.
    reason: String,
  },
  /// Graph-level structural problem (dangling edge, cycle, duplicate id).
  InvalidGraph(String),
  /// Text could not be parsed.
  Malformed(String),
}

impl fmt::Display for Violation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Violation::MissingParameter {
        component,
        parameter,
      } => write!(f, "{}: required parameter '{}' is missing", component, parameter),
      Violation::ConstraintViolated {
        component,
        parameter,
        message,
      } => write!(f, "{}: parameter '{}': {}", component, parameter, message),
      Violation::ParameterType {
        component,
        parameter,
        expected,
      } => write!(
        f,
        "{}: parameter '{}' expects a value of type {}",
        component, parameter, expected
      ),
      Violation::UnconnectedInput { component, input } => {
        write!(f, "{}: input '{}' is not connected", component, input)
      }
      Violation::IncompatibleInput {
        component,
        input,
        reason,
      } => write!(f, "{}: input '{}': {}", component, input, reason),
      Violation::UnknownInput { component, input } => {
        write!(f, "{}: unknown input '{}'", component, input)
      }
      Violation::UnknownType { type_name } => write!(f, "unknown component type '{}'", type_name),
      Violation::ConstructionFailed { type_name, reason } => {
        write!(f, "failed to construct '{}': {}", type_name, reason)
      }
      Violation::InvalidGraph(msg) => write!(f, "invalid graph: {}", msg),
      Violation::Malformed(msg) => write!(f, "malformed input: {}", msg),
    }
  }
}

/// Validation failure listing every violation found.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("validation failed: {}", join_violations(.violations))]
pub struct ValidationError {
  violations: Vec<Violation>,
}

fn join_violations(violations: &[Violation]) -> String {
  violations
    .iter()
    .map(|v| v.to_string())
    .collect::<Vec<_>>()
    .join("; ")
}

impl ValidationError {
  /// Creates an error from a single violation.
  pub fn new(violation: Violation) -> Self {
    Self {
      violations: vec![violation],
    }
  }

  /// Creates an error from a list of violations.
  ///
  /// Callers check emptiness first; see [`ValidationError::check`].
  pub fn from_violations(violations: Vec<Violation>) -> Self {
    Self { violations }
  }

  /// Returns `Ok(())` when `violations` is empty, otherwise an error carrying all of them.
  pub fn check(violations: Vec<Violation>) -> std::result::Result<(), ValidationError> {
    if violations.is_empty() {
      Ok(())
    } else {
      Err(Self { violations })
    }
  }

  /// All violations, in discovery order.
  pub fn violations(&self) -> &[Violation] {
    &self.violations
  }

  /// Consumes the error, returning its violations.
  pub fn into_violations(self) -> Vec<Violation> {
    self.violations
  }

  /// Human readable messages, one per violation.
  pub fn messages(&self) -> Vec<String> {
    self.violations.iter().map(|v| v.to_string()).collect()
  }
}

impl From<Violation> for ValidationError {
  fn from(violation: Violation) -> Self {
    Self::new(violation)
  }
}

/// Failure while a compiled node is running.
#[derive(Error, Debug)]
pub enum ProcessingError {
  /// The event log transport failed.
  #[error("transport error: {0}")]
  Transport(String),
  /// A compiled node has no stream reference for one of its inputs.
  #[error("no stream reference bound for input '{input}' of {component}")]
  MissingReference {
    /// Component display name.
    component: String,
    /// Input name.
    input: String,
  },
  /// Body could not be encoded or decoded.
  #[error("serialization error: {0}")]
  Serialization(String),
}

/// An internal invariant was violated. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("internal invariant violated: {0}")]
pub struct ProgrammerError(pub String);

/// Crate-wide error type.
#[derive(Error, Debug)]
pub enum Error {
  /// See [`ValidationError`].
  #[error(transparent)]
  Validation(#[from] ValidationError),
  /// See [`ProcessingError`].
  #[error(transparent)]
  Processing(#[from] ProcessingError),
  /// See [`ProgrammerError`].
  #[error(transparent)]
  Programmer(#[from] ProgrammerError),
}

impl Error {
  /// HTTP status the compute boundary reports for this error.
  ///
  /// Validation failures map to 400; everything else is left at 200 and the
  /// failure is reported through logging.
  pub fn status_code(&self) -> u16 {
    match self {
      Error::Validation(_) => 400,
      Error::Processing(_) | Error::Programmer(_) => 200,
    }
  }
}

/// Result alias using the crate-wide [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
