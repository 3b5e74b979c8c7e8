use census_core::query::{CellTypeInput, CellTypeRequest, MetadataInput, QueryRequest};
use census_core::services::CensusSource;
use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content},
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};

use crate::{CensusMcp, helpers};

/// Parameters for an obs or var metadata query.
#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct MetadataParams {
    /// "Homo sapiens" or "Mus musculus". Defaults to "Homo sapiens".
    pub organism: Option<String>,
    /// Filter expression, e.g. `cell_type == 'T cell' and tissue == 'lung'`.
    pub value_filter: Option<String>,
    /// Comma-separated column names to return. Omit for all columns.
    pub column_names: Option<String>,
    /// Maximum number of rows to return. Defaults to 1000.
    pub limit: Option<i64>,
}

impl From<MetadataParams> for MetadataInput {
    fn from(params: MetadataParams) -> Self {
        Self {
            organism: params.organism,
            value_filter: params.value_filter,
            column_names: params.column_names,
            limit: params.limit,
        }
    }
}

/// Parameters for listing distinct cell types.
#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CellTypesParams {
    /// "Homo sapiens" or "Mus musculus". Defaults to "Homo sapiens".
    pub organism: Option<String>,
    /// Include a count per cell type and the ten most frequent types.
    pub include_counts: Option<bool>,
    /// Count only primary data cells. Defaults to true.
    pub primary_data_only: Option<bool>,
}

impl From<CellTypesParams> for CellTypeInput {
    fn from(params: CellTypesParams) -> Self {
        Self {
            organism: params.organism,
            include_counts: params.include_counts,
            primary_data_only: params.primary_data_only,
        }
    }
}

impl<S: CensusSource> CensusMcp<S> {
    fn query_request(&self, params: MetadataParams) -> Result<QueryRequest, ErrorData> {
        QueryRequest::from_input(&params.into(), self.control.limits())
            .map_err(helpers::map_census_err)
    }
}

#[tool_router(router = tool_router_metadata, vis = "pub")]
impl<S: CensusSource> CensusMcp<S> {
    #[tool(
        name = "cellxgene_get_obs_metadata",
        description = "Get cell (observation) metadata from CELLxGENE Census. Use this to explore available cell types, tissues, diseases, etc."
    )]
    async fn get_obs_metadata(
        &self,
        Parameters(params): Parameters<MetadataParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let request = self.query_request(params)?;
        let result = self
            .control
            .get_obs_metadata(request)
            .await
            .map_err(helpers::map_census_err)?;
        Ok(CallToolResult::success(vec![Content::json(result)?]))
    }

    #[tool(
        name = "cellxgene_get_var_metadata",
        description = "Get gene (variable) metadata from CELLxGENE Census. Use this to explore available genes and their annotations."
    )]
    async fn get_var_metadata(
        &self,
        Parameters(params): Parameters<MetadataParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let request = self.query_request(params)?;
        let result = self
            .control
            .get_var_metadata(request)
            .await
            .map_err(helpers::map_census_err)?;
        Ok(CallToolResult::success(vec![Content::json(result)?]))
    }

    #[tool(
        name = "cellxgene_get_all_cell_types",
        description = "Get all distinct cell types available in CELLxGENE Census for a specific organism. Optionally includes cell counts for each type."
    )]
    async fn get_all_cell_types(
        &self,
        Parameters(params): Parameters<CellTypesParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let request =
            CellTypeRequest::from_input(&params.into()).map_err(helpers::map_census_err)?;
        let report = self
            .control
            .get_all_cell_types(request)
            .await
            .map_err(helpers::map_census_err)?;
        Ok(CallToolResult::success(vec![Content::json(report)?]))
    }
}
