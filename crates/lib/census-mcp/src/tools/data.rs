use census_core::query::{SliceInput, SliceRequest};
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

/// Parameters for summarizing a cells x genes slice.
#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct DataSliceParams {
    /// "Homo sapiens" or "Mus musculus". Defaults to "Homo sapiens".
    pub organism: Option<String>,
    /// Filter on cell metadata, e.g. `tissue == 'lung'`.
    pub obs_value_filter: Option<String>,
    /// Filter on gene metadata, e.g. `feature_name in ['CD4', 'CD8A']`.
    pub var_value_filter: Option<String>,
    /// Comma-separated cell metadata columns to return.
    pub obs_column_names: Option<String>,
    /// Comma-separated gene metadata columns to return.
    pub var_column_names: Option<String>,
    /// Maximum number of cells in the slice. Defaults to 10000.
    pub max_cells: Option<i64>,
    /// Maximum number of genes in the slice. Defaults to 2000.
    pub max_genes: Option<i64>,
}

impl From<DataSliceParams> for SliceInput {
    fn from(params: DataSliceParams) -> Self {
        Self {
            organism: params.organism,
            obs_value_filter: params.obs_value_filter,
            var_value_filter: params.var_value_filter,
            obs_column_names: params.obs_column_names,
            var_column_names: params.var_column_names,
            max_cells: params.max_cells,
            max_genes: params.max_genes,
        }
    }
}

#[tool_router(router = tool_router_data, vis = "pub")]
impl<S: CensusSource> CensusMcp<S> {
    #[tool(
        name = "cellxgene_get_data_slice",
        description = "Get a summary of a data slice from CELLxGENE Census based on cell and gene filters. Returns data dimensions and sample metadata."
    )]
    async fn get_data_slice(
        &self,
        Parameters(params): Parameters<DataSliceParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let request = SliceRequest::from_input(&params.into(), self.control.limits())
            .map_err(helpers::map_census_err)?;
        let summary = self
            .control
            .get_data_slice(request)
            .await
            .map_err(helpers::map_census_err)?;
        Ok(CallToolResult::success(vec![Content::json(summary)?]))
    }
}

#[cfg(test)]
mod tests {
    use rmcp::handler::server::wrapper::Parameters;
    use rmcp::model::ErrorCode;

    use super::DataSliceParams;
    use crate::test_support::{fixture_server, json_body};

    #[tokio::test]
    async fn slice_respects_cell_and_gene_caps() {
        let result = fixture_server()
            .get_data_slice(Parameters(DataSliceParams {
                organism: Some("Mus musculus".to_string()),
                max_cells: Some(10),
                max_genes: Some(5),
                ..DataSliceParams::default()
            }))
            .await
            .expect("data slice");
        let body = json_body(&result);
        assert!(body["cell_count"].as_u64().is_some_and(|count| count <= 10));
        assert!(body["gene_count"].as_u64().is_some_and(|count| count <= 5));
        assert_eq!(body["query_echo"]["organism"], "Mus musculus");
        assert_eq!(body["query_echo"]["max_cells"], 10);
    }

    #[tokio::test]
    async fn slice_over_ceiling_is_limit_exceeded() {
        let err = fixture_server()
            .get_data_slice(Parameters(DataSliceParams {
                max_genes: Some(1_000_000),
                ..DataSliceParams::default()
            }))
            .await
            .expect_err("gene cap over ceiling");
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert_eq!(err.data.expect("error data")["kind"], "limit_exceeded");
    }

    #[tokio::test]
    async fn slice_filters_genes_by_name() {
        let result = fixture_server()
            .get_data_slice(Parameters(DataSliceParams {
                var_value_filter: Some("feature_name in ['CD4', 'CD8A', 'CD3E']".to_string()),
                var_column_names: Some("feature_name".to_string()),
                ..DataSliceParams::default()
            }))
            .await
            .expect("data slice");
        let body = json_body(&result);
        assert_eq!(body["gene_count"], 3);
        assert_eq!(body["var_columns"], serde_json::json!(["feature_name"]));
        assert_eq!(body["cell_count"], 40);
    }
}
