//! Host configuration.
//!
//! Components are configured through their typed parameters; the structs here
//! only configure the process hosting them: the HTTP boundary and the Redis
//! transport.

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use thiserror::Error;

/// Default HTTP port of the compute boundary.
pub const DEFAULT_PORT: u16 = 4567;

/// Transport locator handed back to callers when a node names none.
pub const DEFAULT_TRANSPORT_URL: &str = "redis://localhost";

/// An environment variable held an unusable value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid value '{value}' for {variable}")]
pub struct ConfigError {
  /// Variable name.
  pub variable: String,
  /// Offending value.
  pub value: String,
}

/// Configuration for the HTTP compute boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
  /// Address to bind (default: 0.0.0.0)
  pub bind_address: IpAddr,
  /// Port to listen on (default: 4567)
  pub port: u16,
  /// Prefix prepended to every route, e.g. `/k-octopus` (default: empty)
  pub endpoint_prefix: String,
  /// Transport locator reported for nodes without one
  pub default_transport_url: String,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
      port: DEFAULT_PORT,
      endpoint_prefix: String::new(),
      default_transport_url: DEFAULT_TRANSPORT_URL.to_string(),
    }
  }
}

impl ServerConfig {
  /// Reads `LOGWEAVE_BIND`, `LOGWEAVE_PORT`, `LOGWEAVE_PREFIX` and
  /// `LOGWEAVE_TRANSPORT_URL`, falling back to defaults for unset variables.
  pub fn from_env() -> Result<Self, ConfigError> {
    Self::from_lookup(|key| env::var(key).ok())
  }

  /// Like [`ServerConfig::from_env`] with an arbitrary variable source.
  pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let mut config = Self::default();
    if let Some(value) = lookup("LOGWEAVE_BIND") {
      config.bind_address = value.parse().map_err(|_| ConfigError {
        variable: "LOGWEAVE_BIND".to_string(),
        value: value.clone(),
      })?;
    }
    if let Some(value) = lookup("LOGWEAVE_PORT") {
      config.port = value.parse().map_err(|_| ConfigError {
        variable: "LOGWEAVE_PORT".to_string(),
        value: value.clone(),
      })?;
    }
    if let Some(value) = lookup("LOGWEAVE_PREFIX") {
      config = config.with_endpoint_prefix(value);
    }
    if let Some(value) = lookup("LOGWEAVE_TRANSPORT_URL") {
      config.default_transport_url = value;
    }
    Ok(config)
  }

  /// Sets the bind address.
  #[must_use]
  pub fn with_bind_address(mut self, address: IpAddr) -> Self {
    self.bind_address = address;
    self
  }

  /// Sets the port.
  #[must_use]
  pub fn with_port(mut self, port: u16) -> Self {
    self.port = port;
    self
  }

  /// Sets the route prefix. A missing leading `/` is added and a trailing one
  /// dropped.
  #[must_use]
  pub fn with_endpoint_prefix(mut self, prefix: impl Into<String>) -> Self {
    let prefix = prefix.into();
    let trimmed = prefix.trim_matches('/');
    self.endpoint_prefix = if trimmed.is_empty() {
      String::new()
    } else {
      format!("/{}", trimmed)
    };
    self
  }

  /// Sets the default transport locator.
  #[must_use]
  pub fn with_default_transport_url(mut self, url: impl Into<String>) -> Self {
    self.default_transport_url = url.into();
    self
  }

  /// Socket address to listen on.
  pub fn socket_addr(&self) -> SocketAddr {
    SocketAddr::new(self.bind_address, self.port)
  }

  /// Full path of a route under the configured prefix.
  pub fn route(&self, path: &str) -> String {
    format!("{}{}", self.endpoint_prefix, path)
  }
}

/// Configuration for the Redis-backed streaming runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisRuntimeConfig {
  /// Redis connection URL (default: "redis://localhost")
  pub connection_url: String,
  /// `COUNT` used when a read names no page size (None: unbounded)
  pub default_page_size: Option<usize>,
}

impl Default for RedisRuntimeConfig {
  fn default() -> Self {
    Self {
      connection_url: DEFAULT_TRANSPORT_URL.to_string(),
      default_page_size: None,
    }
  }
}

impl RedisRuntimeConfig {
  /// Sets the Redis connection URL.
  #[must_use]
  pub fn with_connection_url(mut self, url: impl Into<String>) -> Self {
    self.connection_url = url.into();
    self
  }

  /// Sets the page size used when a read names none.
  #[must_use]
  pub fn with_default_page_size(mut self, page_size: usize) -> Self {
    self.default_page_size = Some(page_size);
    self
  }
}
