//! # Component Registry
//!
//! Maps a Gnode's type identifier to a constructor producing a fresh,
//! unconnected template, then populates that template from the Gnode.
//!
//! [`ComponentRegistry::with_builtins`] holds the crate's own components plus
//! every [`ComponentRegistration`] submitted with [`inventory::submit!`] by
//! crates linked into the final binary. Hosts can also add implementations at
//! run time with [`ComponentRegistry::register`]; neither path touches this
//! crate.
//!
//! ```rust
//! use logweave::registry::ComponentRegistry;
//!
//! let registry = ComponentRegistry::with_builtins();
//! let sma = registry.resolve("logweave::processors::Sma").unwrap();
//! assert_eq!(sma.type_name(), "logweave::processors::Sma");
//! assert!(registry.resolve("com.example.Missing").is_err());
//! ```

use crate::component::Component;
use crate::error::{ValidationError, Violation};
use crate::graph::Gnode;
use crate::{processors, sinks, sources};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Constructor of a default template.
pub type ComponentFactory = fn() -> Box<dyn Component>;

type Constructor = Arc<dyn Fn() -> Box<dyn Component> + Send + Sync>;

/// Registration of a component type; submit one with `inventory::submit!`.
pub struct ComponentRegistration {
  type_name: &'static str,
  factory: ComponentFactory,
}

impl ComponentRegistration {
  /// Creates a registration.
  pub const fn new(type_name: &'static str, factory: ComponentFactory) -> Self {
    Self { type_name, factory }
  }

  /// The registered type identifier.
  pub fn type_name(&self) -> &'static str {
    self.type_name
  }
}

inventory::collect!(ComponentRegistration);

static BUILTINS: [ComponentRegistration; 6] = [
  sources::test_source::REGISTRATION,
  sources::random_binary::REGISTRATION,
  processors::sma::REGISTRATION,
  processors::crossing::REGISTRATION,
  processors::pipe::REGISTRATION,
  sinks::console::REGISTRATION,
];

/// Why a type identifier could not become a live component.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
  /// No constructor is registered under this name.
  #[error("unknown component type '{0}'")]
  UnknownType(String),
  /// A constructor exists but populating the component failed.
  #[error("failed to construct '{type_name}': {}", .reasons.join("; "))]
  Construction {
    /// Type identifier.
    type_name: String,
    /// Every problem found.
    reasons: Vec<String>,
  },
}

impl RegistryError {
  /// The equivalent validation violation.
  pub fn into_violation(self) -> Violation {
    match self {
      RegistryError::UnknownType(type_name) => Violation::UnknownType { type_name },
      RegistryError::Construction { type_name, reasons } => Violation::ConstructionFailed {
        type_name,
        reason: reasons.join("; "),
      },
    }
  }
}

impl From<RegistryError> for ValidationError {
  fn from(error: RegistryError) -> Self {
    ValidationError::new(error.into_violation())
  }
}

/// Type-name to constructor table.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
  constructors: HashMap<String, Constructor>,
}

impl ComponentRegistry {
  /// Creates an empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// Creates a registry holding the built-in components and every component
  /// submitted through `inventory`.
  pub fn with_builtins() -> Self {
    let mut registry = Self::new();
    for registration in BUILTINS.iter().chain(inventory::iter::<ComponentRegistration>) {
      registry.register(registration.type_name, registration.factory);
    }
    debug!(count = registry.len(), "ComponentRegistry::with_builtins");
    registry
  }

  /// Registers (or replaces) the constructor for `type_name`.
  pub fn register<F>(&mut self, type_name: impl Into<String>, constructor: F)
  where
    F: Fn() -> Box<dyn Component> + Send + Sync + 'static,
  {
    let type_name = type_name.into();
    if self
      .constructors
      .insert(type_name.clone(), Arc::new(constructor))
      .is_some()
    {
      warn!(type_name = %type_name, "replacing registered component constructor");
    }
  }

  /// Whether `type_name` is registered.
  pub fn contains(&self, type_name: &str) -> bool {
    self.constructors.contains_key(type_name)
  }

  /// Registered type identifiers, sorted.
  pub fn type_names(&self) -> Vec<&str> {
    let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
  }

  /// Number of registered types.
  pub fn len(&self) -> usize {
    self.constructors.len()
  }

  /// True when nothing is registered.
  pub fn is_empty(&self) -> bool {
    self.constructors.is_empty()
  }

  /// Constructs a default template of `type_name`.
  pub fn resolve(&self, type_name: &str) -> Result<Box<dyn Component>, RegistryError> {
    let constructor = self
      .constructors
      .get(type_name)
      .ok_or_else(|| RegistryError::UnknownType(type_name.to_string()))?;
    let component = constructor();
    if component.type_name() != type_name {
      return Err(RegistryError::Construction {
        type_name: type_name.to_string(),
        reasons: vec![format!(
          "constructor produced a '{}'",
          component.type_name()
        )],
      });
    }
    Ok(component)
  }

  /// Constructs the component a Gnode describes, with its id, parameters,
  /// input bindings and output.
  pub fn instantiate(&self, gnode: &Gnode) -> Result<Box<dyn Component>, RegistryError> {
    let mut component = self.resolve(&gnode.type_name)?;
    gnode
      .apply_to(component.as_mut())
      .map_err(|reasons| RegistryError::Construction {
        type_name: gnode.type_name.clone(),
        reasons,
      })?;
    debug!(node = %gnode.id, type_name = %gnode.type_name, "ComponentRegistry::instantiate");
    Ok(component)
  }
}

impl fmt::Debug for ComponentRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ComponentRegistry")
      .field("types", &self.type_names())
      .finish()
  }
}
