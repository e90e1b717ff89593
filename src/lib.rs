//! # logweave
//!
//! Graphs of stream sources, processors and sinks, compiled into immutable
//! snapshots and executed against an ordered, offset-addressable event log.
//!
//! ## Flow
//!
//! A [`model::ProcessingModel`] of live, wired components compiles into a
//! portable [`graph::Graph`], which serializes to JSON and back. Each Gnode is
//! resolved by type name through the [`registry::ComponentRegistry`], expanded
//! into a live component, and compiled into a [`component::CompiledNode`]. The
//! [`engine::Engine`] drives compiled nodes against a
//! [`runtime::StreamingRuntime`]; processors keep windowed and joined state in
//! an owned [`memory::Memory`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use logweave::engine::Engine;
//! use logweave::model::ProcessingModel;
//! use logweave::processors::Sma;
//! use logweave::registry::ComponentRegistry;
//! use logweave::runtime::InMemoryStreamRuntime;
//! use logweave::sinks::ConsoleSink;
//! use logweave::sources::TestSource;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut model = ProcessingModel::new("moving average");
//! let source = model.add(Box::new(TestSource::new_template()))?;
//! let sma = model.add(Box::new(Sma::new_template()))?;
//! let sink = model.add(Box::new(ConsoleSink::new_template()))?;
//! model.connect(source, sma, "Input", None)?;
//! model.connect(sma, sink, "Input", None)?;
//!
//! let text = model.compile_graph()?.to_json()?;
//! let graph = logweave::graph::Graph::from_json(&text)?;
//!
//! let engine = Engine::new(
//!   Arc::new(ComponentRegistry::with_builtins()),
//!   Arc::new(InMemoryStreamRuntime::new()),
//! );
//! let report = engine.run(&graph).await?;
//! assert!(!report.cancelled());
//! # Ok(())
//! # }
//! ```

// Documentation enforcement - treat missing docs as errors
#![deny(missing_docs)]

/// Typed output schemas and sample data.
pub mod attribute;
/// Component templates, lifecycle states and compiled node interfaces.
pub mod component;
/// HTTP boundary accepting Gnodes for execution.
pub mod compute;
/// Host configuration.
pub mod config;
/// Graph execution.
pub mod engine;
/// Error kinds.
pub mod error;
/// Immutable attribute maps.
pub mod event;
/// Portable graph model and its JSON form.
pub mod graph;
/// Fixed-capacity ring buffer.
pub mod memory;
/// Live components and wiring.
pub mod model;
/// Offset cursors, message ids and offset stores.
pub mod offset;
/// Typed, validated component configuration.
pub mod parameter;
/// Input and output ports.
pub mod port;
/// Built-in processors.
pub mod processors;
/// Offset-cursor stream reads.
pub mod reader;
/// Type-name to constructor registry.
pub mod registry;
/// Event log contract and implementations.
pub mod runtime;
/// Built-in sinks.
pub mod sinks;
/// Built-in sources.
pub mod sources;
/// Parameter values and value types.
pub mod value;

#[cfg(test)]
mod compute_test;
#[cfg(test)]
mod engine_test;
#[cfg(test)]
mod error_test;
#[cfg(test)]
mod graph_test;
#[cfg(test)]
mod offset_test;

pub use error::{Error, Result};
