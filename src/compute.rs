//! # Compute Boundary
//!
//! HTTP front end accepting single Gnodes for execution.
//!
//! ## Routes
//!
//! - `POST {prefix}/compute`: body is one Gnode as JSON. The node is resolved,
//!   compiled and started in the background. Responds `200` with
//!   `{"transportUrl", "className", "Id"}`, or `400` listing every validation
//!   violation.
//! - `GET {prefix}/health`: responds `{"status":"UP"}`.
//!
//! Anything else is `404`.

use crate::component::CompiledNode;
use crate::config::ServerConfig;
use crate::error::{Error, Result, ValidationError, Violation};
use crate::graph::Gnode;
use crate::registry::ComponentRegistry;
use crate::runtime::StreamingRuntime;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Acknowledgement of an accepted Gnode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeResponse {
  /// Transport the node writes to.
  #[serde(rename = "transportUrl")]
  pub transport_url: String,
  /// Full type identifier of the node.
  #[serde(rename = "className")]
  pub class_name: String,
  /// Node id.
  #[serde(rename = "Id")]
  pub id: Uuid,
}

/// Turns request bodies into compiled nodes.
#[derive(Debug, Clone)]
pub struct ComputeService {
  registry: Arc<ComponentRegistry>,
  config: ServerConfig,
}

impl ComputeService {
  /// Creates a service resolving types through `registry`.
  pub fn new(registry: Arc<ComponentRegistry>, config: ServerConfig) -> Self {
    Self { registry, config }
  }

  /// The server configuration.
  pub fn config(&self) -> &ServerConfig {
    &self.config
  }

  /// Parses, resolves and compiles one Gnode.
  pub fn prepare(&self, body: &[u8]) -> Result<(ComputeResponse, CompiledNode)> {
    let gnode: Gnode = serde_json::from_slice(body)
      .map_err(|e| ValidationError::from(Violation::Malformed(e.to_string())))?;
    let component = self
      .registry
      .instantiate(&gnode)
      .map_err(ValidationError::from)?;
    let node = component.compile()?;
    let response = ComputeResponse {
      transport_url: gnode
        .transport_url
        .clone()
        .unwrap_or_else(|| self.config.default_transport_url.clone()),
      class_name: gnode.type_name.clone(),
      id: gnode.id,
    };
    debug!(node = %gnode.id, type_name = %gnode.type_name, "ComputeService::prepare");
    Ok((response, node))
  }
}

/// Routes requests to a [`ComputeService`] and runs accepted nodes.
#[derive(Clone)]
pub struct ComputeServer {
  service: Arc<ComputeService>,
  runtime: Arc<dyn StreamingRuntime>,
  cancel: CancellationToken,
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Full<Bytes>> {
  let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
  *response.status_mut() = status;
  response
    .headers_mut()
    .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
  response
}

fn error_body(error: &Error) -> serde_json::Value {
  match error {
    Error::Validation(e) => json!({ "errors": e.messages() }),
    other => json!({ "errors": [other.to_string()] }),
  }
}

impl ComputeServer {
  /// Creates a server. Accepted nodes run against `runtime` until `cancel`
  /// fires or they complete.
  pub fn new(
    service: ComputeService,
    runtime: Arc<dyn StreamingRuntime>,
    cancel: CancellationToken,
  ) -> Self {
    Self {
      service: Arc::new(service),
      runtime,
      cancel,
    }
  }

  /// Answers one request. Accepted nodes are spawned onto the Tokio runtime.
  pub async fn handle(&self, method: &Method, path: &str, body: Bytes) -> Response<Full<Bytes>> {
    let config = self.service.config();
    if *method == Method::GET && path == config.route("/health") {
      return json_response(StatusCode::OK, json!({ "status": "UP" }));
    }
    if path != config.route("/compute") {
      return json_response(StatusCode::NOT_FOUND, json!({ "errors": ["not found"] }));
    }
    if *method != Method::POST {
      return json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        json!({ "errors": ["use POST"] }),
      );
    }

    match self.service.prepare(&body) {
      Ok((response, node)) => {
        self.spawn(node);
        match serde_json::to_value(&response) {
          Ok(value) => json_response(StatusCode::OK, value),
          Err(e) => json_response(StatusCode::OK, json!({ "errors": [e.to_string()] })),
        }
      }
      Err(e) => {
        warn!(error = %e, "compute request rejected");
        let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::OK);
        json_response(status, error_body(&e))
      }
    }
  }

  fn spawn(&self, mut node: CompiledNode) {
    let runtime = self.runtime.clone();
    let cancel = self.cancel.clone();
    tokio::spawn(async move {
      let id = node.id();
      match node.run(runtime.as_ref(), &cancel).await {
        Ok(outcome) => info!(node = %id, outcome = %outcome, "compute node finished"),
        Err(e) => error!(node = %id, error = %e, "compute node failed"),
      }
    });
  }

  async fn serve_request(&self, request: Request<Incoming>) -> Response<Full<Bytes>> {
    let (parts, body) = request.into_parts();
    match body.collect().await {
      Ok(collected) => {
        self
          .handle(&parts.method, parts.uri.path(), collected.to_bytes())
          .await
      }
      Err(e) => json_response(
        StatusCode::BAD_REQUEST,
        json!({ "errors": [format!("unreadable body: {}", e)] }),
      ),
    }
  }

  /// Accepts connections on `listener` until the cancellation token fires.
  pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
    info!(address = %listener.local_addr()?, "compute server listening");
    loop {
      let (stream, peer) = tokio::select! {
        accepted = listener.accept() => accepted?,
        _ = self.cancel.cancelled() => {
          info!("compute server stopping");
          return Ok(());
        }
      };
      let server = self.clone();
      tokio::spawn(async move {
        let service = service_fn(move |request| {
          let server = server.clone();
          async move { Ok::<_, Infallible>(server.serve_request(request).await) }
        });
        if let Err(e) = http1::Builder::new()
          .serve_connection(TokioIo::new(stream), service)
          .await
        {
          debug!(peer = %peer, error = %e, "connection closed with error");
        }
      });
    }
  }
}
