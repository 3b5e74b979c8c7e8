//! MCP server implementation for the CELLxGENE Census.
//!
//! This crate wires the census control plane into rmcp tool handlers, exposes
//! the static census-info resource, and runs the stdio and HTTP transports.

mod helpers;
mod resources;
mod tools;
pub mod server;

use census_core::control::CensusControlPlane;
use census_core::services::CensusSource;
use rmcp::{
    ErrorData,
    RoleServer,
    ServerHandler,
    handler::server::tool::ToolRouter,
    service::RequestContext,
    tool_handler,
};
#[allow(deprecated)]
use rmcp::model::{
    ListResourcesResult,
    PaginatedRequestParam,
    ReadResourceRequestParam,
    ReadResourceResult,
    ServerCapabilities,
    ServerInfo,
};

pub use resources::CENSUS_INFO_URI;
pub use tools::data::DataSliceParams;
pub use tools::metadata::{CellTypesParams, MetadataParams};

const SERVER_INSTRUCTIONS: &str = r#"cellxgene-mcp answers questions about the CZ CELLxGENE Census, a collection of single-cell RNA sequencing data.

Workflow:
1. Call `cellxgene_get_census_info` to see the available Census versions, organisms and per-organism sizes.
2. Explore metadata:
   - `cellxgene_get_obs_metadata` for cell (observation) annotations such as cell_type, tissue and disease.
   - `cellxgene_get_var_metadata` for gene (variable) annotations such as feature_id and feature_name.
   - `cellxgene_get_all_cell_types` for the distinct cell types of an organism, optionally with counts.
3. Summarize a cells x genes slice with `cellxgene_get_data_slice`.

Notes:
- `organism` is "Homo sapiens" or "Mus musculus" ("human" and "mouse" are accepted). It defaults to "Homo sapiens".
- `value_filter` uses the Census filter syntax, e.g. `cell_type == 'T cell' and tissue == 'lung'` or `feature_name in ['CD4', 'CD8A']`.
- `column_names` is a comma-separated list; unknown names are dropped.
- Results are capped: `limit` defaults to 1000 rows, `max_cells` to 10000 and `max_genes` to 2000.
- Read `resource://cellxgene_census-info` for field descriptions and query patterns."#;

/// MCP server wrapper around the census control plane and tool routers.
pub struct CensusMcp<S: CensusSource> {
    tool_router: ToolRouter<Self>,
    control: CensusControlPlane<S>,
}

impl<S: CensusSource> Clone for CensusMcp<S> {
    fn clone(&self) -> Self {
        Self {
            tool_router: self.tool_router.clone(),
            control: self.control.clone(),
        }
    }
}

impl<S: CensusSource> CensusMcp<S> {
    /// Creates a new server over a control plane.
    #[must_use]
    pub fn new(control: CensusControlPlane<S>) -> Self {
        let tool_router = Self::tool_router_census()
            + Self::tool_router_metadata()
            + Self::tool_router_data();
        Self {
            tool_router,
            control,
        }
    }
}

#[tool_handler]
impl<S: CensusSource> ServerHandler for CensusMcp<S> {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            ..Default::default()
        }
    }

    #[allow(deprecated)]
    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, ErrorData> {
        Ok(ListResourcesResult::with_all_items(resources::list()))
    }

    #[allow(deprecated)]
    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, ErrorData> {
        resources::read(&request.uri)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;

    use census_core::control::CensusControlPlane;
    use census_core::store::SnapshotSource;
    use rmcp::model::{CallToolResult, RawContent};
    use serde_json::Value;

    use crate::CensusMcp;

    pub fn fixture_server() -> CensusMcp<SnapshotSource> {
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("census-core")
            .join("tests")
            .join("data")
            .join("snapshot");
        CensusMcp::new(CensusControlPlane::new(SnapshotSource::new(root), "stable"))
    }

    /// Parses the first text content of a tool result as JSON.
    pub fn json_body(result: &CallToolResult) -> Value {
        let content = result.content.first().expect("tool returned content");
        match &content.raw {
            RawContent::Text(text) => serde_json::from_str(&text.text).expect("content is JSON"),
            other => panic!("expected text content, got {other:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use rmcp::ServerHandler;

    use crate::test_support::fixture_server;

    #[test]
    fn server_advertises_tools_and_resources() {
        let info = fixture_server().get_info();
        assert!(info.capabilities.tools.is_some());
        assert!(info.capabilities.resources.is_some());
        let instructions = info.instructions.expect("instructions set");
        assert!(instructions.contains("cellxgene_get_obs_metadata"));
    }

    #[test]
    fn router_registers_prefixed_tools() {
        let server = fixture_server();
        let mut names: Vec<String> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "cellxgene_get_all_cell_types",
                "cellxgene_get_census_info",
                "cellxgene_get_data_slice",
                "cellxgene_get_obs_metadata",
                "cellxgene_get_var_metadata",
            ]
        );
    }
}
