//! # Graph Engine
//!
//! Drives a [`Graph`] end to end against a [`StreamingRuntime`].
//!
//! ## Execution flow
//!
//! 1. **Expansion**: every Gnode is resolved through the [`ComponentRegistry`]
//!    and populated into a live component.
//! 2. **Compilation**: every component is validated before anything runs; one
//!    invalid node fails the whole graph with every violation listed.
//! 3. **Execution**: compiled nodes run one after another, producers before
//!    consumers, each until its loop completes. A node whose reads come back
//!    empty completes, so upstream nodes finish writing before downstream nodes
//!    start reading.
//! 4. **Shutdown**: the runtime is shut down whether or not a node failed.
//!
//! Nodes communicate only through the log, so a host wanting concurrent
//! placement can run [`Engine::run_node`] per node instead.

use crate::component::{CompiledNode, NodeKind, NodeOutcome};
use crate::error::{Result, ValidationError};
use crate::graph::{Gnode, Graph};
use crate::model::ProcessingModel;
use crate::offset::OffsetStore;
use crate::registry::ComponentRegistry;
use crate::runtime::StreamingRuntime;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace};
use uuid::Uuid;

/// Final outcome of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeReport {
  /// Node id.
  pub id: Uuid,
  /// Vertex kind.
  pub kind: NodeKind,
  /// Final state or sink status.
  pub outcome: NodeOutcome,
}

/// Summary of one [`Engine::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
  /// Graph id.
  pub graph_id: Uuid,
  /// When execution started.
  pub started_at: DateTime<Utc>,
  /// When the last node finished.
  pub finished_at: DateTime<Utc>,
  /// Per-node outcomes in execution order.
  pub nodes: Vec<NodeReport>,
}

impl RunReport {
  /// Outcome of the node with `id`.
  pub fn outcome(&self, id: Uuid) -> Option<NodeOutcome> {
    self.nodes.iter().find(|n| n.id == id).map(|n| n.outcome)
  }

  /// True when any node was cancelled.
  pub fn cancelled(&self) -> bool {
    self.nodes.iter().any(|n| n.outcome.is_cancelled())
  }
}

/// Expands, compiles and runs graphs.
pub struct Engine {
  registry: Arc<ComponentRegistry>,
  runtime: Arc<dyn StreamingRuntime>,
  offset_store: Option<Arc<dyn OffsetStore>>,
  cancel: CancellationToken,
}

impl Engine {
  /// Creates an engine. Nodes start from the origin of every stream.
  pub fn new(registry: Arc<ComponentRegistry>, runtime: Arc<dyn StreamingRuntime>) -> Self {
    Self {
      registry,
      runtime,
      offset_store: None,
      cancel: CancellationToken::new(),
    }
  }

  /// Resumes every reading node from, and commits to, `store`.
  #[must_use]
  pub fn with_offset_store(mut self, store: Arc<dyn OffsetStore>) -> Self {
    self.offset_store = Some(store);
    self
  }

  /// The registry used to expand Gnodes.
  pub fn registry(&self) -> &ComponentRegistry {
    &self.registry
  }

  /// The runtime nodes read from and write to.
  pub fn runtime(&self) -> &Arc<dyn StreamingRuntime> {
    &self.runtime
  }

  /// Token that cancels every node this engine runs. Cancelling it is
  /// cooperative: a node stops at its next loop iteration.
  pub fn cancellation_token(&self) -> CancellationToken {
    self.cancel.clone()
  }

  /// Compiles `graph` into nodes ready to run, producers first.
  pub fn compile(&self, graph: &Graph) -> Result<Vec<CompiledNode>> {
    let model = ProcessingModel::from_graph(graph, &self.registry)?;
    let mut nodes = model.compile()?;
    if let Some(store) = &self.offset_store {
      for node in &mut nodes {
        node.attach_offset_store(store.clone());
      }
    }
    Ok(nodes)
  }

  /// Runs every node of `graph` to completion.
  ///
  /// Validation problems fail before the runtime is started. A processing
  /// failure stops the run at the failing node and is returned after shutdown.
  pub async fn run(&self, graph: &Graph) -> Result<RunReport> {
    trace!(graph = %graph.id, "Engine::run");
    let nodes = self.compile(graph)?;

    self.runtime.start().await?;
    let started_at = Utc::now();
    let result = self.drive(nodes).await;
    if let Err(e) = self.runtime.shutdown().await {
      error!(graph = %graph.id, error = %e, "runtime shutdown failed");
    }

    let nodes = result?;
    let report = RunReport {
      graph_id: graph.id,
      started_at,
      finished_at: Utc::now(),
      nodes,
    };
    info!(
      graph = %graph.id,
      nodes = report.nodes.len(),
      cancelled = report.cancelled(),
      "graph run finished"
    );
    Ok(report)
  }

  async fn drive(&self, nodes: Vec<CompiledNode>) -> Result<Vec<NodeReport>> {
    let mut reports = Vec::with_capacity(nodes.len());
    for mut node in nodes {
      let outcome = self.run_compiled(&mut node).await?;
      reports.push(NodeReport {
        id: node.id(),
        kind: node.kind(),
        outcome,
      });
    }
    Ok(reports)
  }

  async fn run_compiled(&self, node: &mut CompiledNode) -> Result<NodeOutcome> {
    match node.run(self.runtime.as_ref(), &self.cancel).await {
      Ok(outcome) => {
        info!(node = %node.id(), kind = %node.kind(), outcome = %outcome, "node finished");
        Ok(outcome)
      }
      Err(e) => {
        error!(node = %node.id(), kind = %node.kind(), error = %e, "node failed");
        Err(e)
      }
    }
  }

  /// Builds and compiles one Gnode.
  pub fn prepare_node(&self, gnode: &Gnode) -> Result<CompiledNode> {
    let component = self.registry.instantiate(gnode).map_err(ValidationError::from)?;
    let mut node = component.compile()?;
    if let Some(store) = &self.offset_store {
      node.attach_offset_store(store.clone());
    }
    Ok(node)
  }

  /// Builds, compiles and runs one Gnode. The runtime must already be started.
  pub async fn run_node(&self, gnode: &Gnode) -> Result<NodeOutcome> {
    trace!(node = %gnode.id, type_name = %gnode.type_name, "Engine::run_node");
    let mut node = self.prepare_node(gnode)?;
    self.run_compiled(&mut node).await
  }
}
