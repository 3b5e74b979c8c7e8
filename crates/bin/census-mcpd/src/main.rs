//! Daemon entry point for the CELLxGENE Census MCP server.
//!
//! Loads configuration from the command line and environment, builds the
//! snapshot-backed control plane, and serves MCP over the selected transport.

mod config;

use census_core::control::CensusControlPlane;
use census_core::release::RemoteReleaseDirectory;
use census_core::store::SnapshotSource;
use census_mcp::server::{self, McpHttpServerConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{CensusConfig, PUBLIC_RELEASE_DIRECTORY, Transport};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // stdout carries JSON-RPC for the stdio transport.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = CensusConfig::from_args()?;
    let control = build_control_plane(&config)?;
    info!(
        transport = %config.transport,
        census_version = %config.census_version,
        snapshot_dir = %config.snapshot_dir.display(),
        "starting census-mcpd"
    );

    let http_config = McpHttpServerConfig::new(config.addr);
    match config.transport {
        Transport::Stdio => server::serve_stdio(control).await,
        Transport::Http => server::serve_streamable_http(control, http_config).await,
        Transport::Sse => server::serve_sse(control, http_config).await,
    }
}

fn build_control_plane(
    config: &CensusConfig,
) -> Result<CensusControlPlane<SnapshotSource>, Box<dyn std::error::Error + Send + Sync>> {
    let mut source = SnapshotSource::new(&config.snapshot_dir);
    if let Some(url) = &config.release_directory_url {
        let remote = if url == PUBLIC_RELEASE_DIRECTORY {
            RemoteReleaseDirectory::public(config.upstream_timeout)?
        } else {
            RemoteReleaseDirectory::new(url.as_str(), config.upstream_timeout)?
        };
        info!(url = remote.url(), "listing releases from remote directory");
        source = source.with_remote_directory(remote);
    }
    Ok(CensusControlPlane::new(source, config.census_version.as_str()).with_limits(config.limits))
}
