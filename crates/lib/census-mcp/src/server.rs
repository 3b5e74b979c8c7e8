//! MCP server runners for the census tools.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use census_core::control::CensusControlPlane;
use census_core::services::CensusSource;
use rmcp::serve_server;
use rmcp::transport::io::stdio;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig,
    StreamableHttpService,
    session::local::LocalSessionManager,
};
use tracing::{info, warn};

use crate::CensusMcp;

/// Mount point of the streamable HTTP transport.
pub const MCP_PATH: &str = "/mcp";
/// Mount point of the session-based event-stream transport.
pub const SSE_PATH: &str = "/sse";

pub type ServeResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Configuration for the MCP HTTP transports.
#[derive(Debug, Clone)]
pub struct McpHttpServerConfig {
    pub addr: SocketAddr,
    pub stateful_mode: bool,
    pub sse_keep_alive: Option<Duration>,
    pub sse_retry: Option<Duration>,
}

impl McpHttpServerConfig {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            stateful_mode: false,
            sse_keep_alive: Some(Duration::from_secs(15)),
            sse_retry: Some(Duration::from_secs(3)),
        }
    }

    #[must_use]
    pub const fn with_stateful_mode(mut self, stateful_mode: bool) -> Self {
        self.stateful_mode = stateful_mode;
        self
    }

    #[must_use]
    pub const fn with_sse_keep_alive(mut self, sse_keep_alive: Option<Duration>) -> Self {
        self.sse_keep_alive = sse_keep_alive;
        self
    }

    #[must_use]
    pub const fn with_sse_retry(mut self, sse_retry: Option<Duration>) -> Self {
        self.sse_retry = sse_retry;
        self
    }
}

impl Default for McpHttpServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([0, 0, 0, 0], 3001)))
    }
}

/// Serves the MCP server over stdio.
///
/// # Errors
/// Returns any transport or server error.
pub async fn serve_stdio<S: CensusSource>(control: CensusControlPlane<S>) -> ServeResult {
    info!(transport = "stdio", "starting MCP server");
    let service = CensusMcp::new(control);
    let running = serve_server(service, stdio()).await?;
    let reason = running.waiting().await?;
    info!(transport = "stdio", ?reason, "MCP server stopped");
    Ok(())
}

/// Serves the MCP server using streamable HTTP at `/mcp`.
///
/// # Errors
/// Returns any listener or server error.
pub async fn serve_streamable_http<S: CensusSource>(
    control: CensusControlPlane<S>,
    config: McpHttpServerConfig,
) -> ServeResult {
    serve_http(control, config, MCP_PATH, "http").await
}

/// Serves the MCP server with per-session event streams at `/sse`.
///
/// # Errors
/// Returns any listener or server error.
pub async fn serve_sse<S: CensusSource>(
    control: CensusControlPlane<S>,
    config: McpHttpServerConfig,
) -> ServeResult {
    serve_http(control, config.with_stateful_mode(true), SSE_PATH, "sse").await
}

/// Builds the axum router hosting the MCP service at `path` plus `/health`.
pub fn router<S: CensusSource>(
    control: CensusControlPlane<S>,
    config: &McpHttpServerConfig,
    path: &str,
) -> Router {
    let service: StreamableHttpService<CensusMcp<S>, LocalSessionManager> =
        StreamableHttpService::new(
            move || Ok(CensusMcp::new(control.clone())),
            Arc::new(LocalSessionManager::default()),
            StreamableHttpServerConfig {
                sse_keep_alive: config.sse_keep_alive,
                sse_retry: config.sse_retry,
                stateful_mode: config.stateful_mode,
                ..Default::default()
            },
        );

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest_service(path, service)
}

async fn serve_http<S: CensusSource>(
    control: CensusControlPlane<S>,
    config: McpHttpServerConfig,
    path: &str,
    transport: &'static str,
) -> ServeResult {
    let app = router(control, &config, path);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(
        transport,
        addr = %config.addr,
        path,
        stateful = config.stateful_mode,
        "listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!(transport, "MCP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_listens_on_all_interfaces() {
        let config = McpHttpServerConfig::default();
        assert_eq!(config.addr.port(), 3001);
        assert!(config.addr.ip().is_unspecified());
        assert!(!config.stateful_mode);
    }

    #[test]
    fn builders_override_stream_hints() {
        let config = McpHttpServerConfig::default()
            .with_stateful_mode(true)
            .with_sse_keep_alive(None)
            .with_sse_retry(Some(Duration::from_secs(1)));
        assert!(config.stateful_mode);
        assert_eq!(config.sse_keep_alive, None);
        assert_eq!(config.sse_retry, Some(Duration::from_secs(1)));
    }
}
