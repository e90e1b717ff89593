use crate::component::Component;
use crate::compute::{ComputeResponse, ComputeServer, ComputeService};
use crate::config::ServerConfig;
use crate::graph::Gnode;
use crate::registry::ComponentRegistry;
use crate::runtime::InMemoryStreamRuntime;
use crate::sources::TestSource;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Response, StatusCode};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn server(runtime: Arc<InMemoryStreamRuntime>) -> ComputeServer {
  let config = ServerConfig::default()
    .with_endpoint_prefix("/k-octopus")
    .with_default_transport_url("redis://logs:6379");
  let service = ComputeService::new(Arc::new(ComponentRegistry::with_builtins()), config);
  ComputeServer::new(service, runtime, CancellationToken::new())
}

async fn json(response: Response<Full<Bytes>>) -> serde_json::Value {
  let bytes = response.into_body().collect().await.unwrap().to_bytes();
  serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
  let server = server(Arc::new(InMemoryStreamRuntime::new()));
  let response = server.handle(&Method::GET, "/k-octopus/health", Bytes::new()).await;
  assert_eq!(response.status(), StatusCode::OK);
  assert_eq!(json(response).await["status"], "UP");
}

#[tokio::test]
async fn test_unknown_route_and_method() {
  let server = server(Arc::new(InMemoryStreamRuntime::new()));
  let missing = server.handle(&Method::POST, "/compute", Bytes::new()).await;
  assert_eq!(missing.status(), StatusCode::NOT_FOUND);
  let wrong = server.handle(&Method::GET, "/k-octopus/compute", Bytes::new()).await;
  assert_eq!(wrong.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_accepts_and_runs_node() {
  let runtime = Arc::new(InMemoryStreamRuntime::new());
  let server = server(runtime.clone());
  let source = TestSource::new_template();
  let body = serde_json::to_vec(&Gnode::from_component(&source)).unwrap();

  let response = server
    .handle(&Method::POST, "/k-octopus/compute", Bytes::from(body))
    .await;
  assert_eq!(response.status(), StatusCode::OK);
  let accepted: ComputeResponse = serde_json::from_value(json(response).await).unwrap();
  assert_eq!(
    accepted,
    ComputeResponse {
      transport_url: "redis://logs:6379".to_string(),
      class_name: "logweave::sources::TestSource".to_string(),
      id: source.id(),
    }
  );

  for _ in 0..100 {
    if runtime.stream_len("logweave::sources::TestSource", source.id()) == 10 {
      break;
    }
    tokio::task::yield_now().await;
  }
  assert_eq!(runtime.stream_len("logweave::sources::TestSource", source.id()), 10);
}

#[tokio::test]
async fn test_rejects_malformed_and_invalid_nodes() {
  let runtime = Arc::new(InMemoryStreamRuntime::new());
  let server = server(runtime.clone());

  let garbage = server
    .handle(&Method::POST, "/k-octopus/compute", Bytes::from_static(b"{ nope"))
    .await;
  assert_eq!(garbage.status(), StatusCode::BAD_REQUEST);
  let errors = json(garbage).await;
  assert!(errors["errors"][0].as_str().unwrap().starts_with("malformed input"));

  let mut gnode = Gnode::from_component(&TestSource::new_template());
  gnode.type_name = "com.example.Missing".to_string();
  let unknown = server
    .handle(
      &Method::POST,
      "/k-octopus/compute",
      Bytes::from(serde_json::to_vec(&gnode).unwrap()),
    )
    .await;
  assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
  assert_eq!(
    json(unknown).await["errors"][0],
    "unknown component type 'com.example.Missing'"
  );
}

#[test]
fn test_prepare_prefers_node_transport() {
  let service = ComputeService::new(Arc::new(ComponentRegistry::with_builtins()), ServerConfig::default());
  let mut source = TestSource::new_template();
  source.set_transport_url(Some("redis://own:6379".to_string()));
  let body = serde_json::to_vec(&Gnode::from_component(&source)).unwrap();
  let (response, node) = service.prepare(&body).unwrap();
  assert_eq!(response.transport_url, "redis://own:6379");
  assert_eq!(node.id(), source.id());
}
