use logweave::compute::{ComputeServer, ComputeService};
use logweave::config::ServerConfig;
use logweave::registry::ComponentRegistry;
use logweave::runtime::StreamingRuntime;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[cfg(feature = "redis")]
fn build_runtime(config: &ServerConfig) -> Arc<dyn StreamingRuntime> {
  use logweave::config::RedisRuntimeConfig;
  use logweave::runtime::RedisStreamRuntime;
  Arc::new(RedisStreamRuntime::new(
    RedisRuntimeConfig::default().with_connection_url(config.default_transport_url.clone()),
  ))
}

#[cfg(not(feature = "redis"))]
fn build_runtime(_config: &ServerConfig) -> Arc<dyn StreamingRuntime> {
  Arc::new(logweave::runtime::InMemoryStreamRuntime::new())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt::init();

  let config = ServerConfig::from_env()?;
  let registry = Arc::new(ComponentRegistry::with_builtins());
  info!(types = ?registry.type_names(), "registered components");

  let runtime = build_runtime(&config);
  runtime.start().await?;

  let cancel = CancellationToken::new();
  let shutdown = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      info!("interrupt received");
      shutdown.cancel();
    }
  });

  let listener = TcpListener::bind(config.socket_addr()).await?;
  let server = ComputeServer::new(
    ComputeService::new(registry, config),
    runtime.clone(),
    cancel,
  );
  let served = server.serve(listener).await;

  if let Err(e) = runtime.shutdown().await {
    error!(error = %e, "runtime shutdown failed");
  }
  served?;
  Ok(())
}
