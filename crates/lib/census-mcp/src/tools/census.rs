use census_core::services::CensusSource;
use rmcp::{
    ErrorData,
    model::{CallToolResult, Content},
    tool,
    tool_router,
};

use crate::{CensusMcp, helpers};

#[tool_router(router = tool_router_census, vis = "pub")]
impl<S: CensusSource> CensusMcp<S> {
    #[tool(
        name = "cellxgene_get_census_info",
        description = "Get information about available Census versions and organisms."
    )]
    async fn get_census_info(&self) -> Result<CallToolResult, ErrorData> {
        let info = self
            .control
            .get_census_info()
            .await
            .map_err(helpers::map_census_err)?;
        Ok(CallToolResult::success(vec![Content::json(info)?]))
    }
}
