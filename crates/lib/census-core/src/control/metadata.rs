use census_store::models::Axis;
use census_store::schema::COLUMN_CELL_TYPE;
use tracing::{Instrument, info, info_span, warn};

use crate::format::{CellTypeReport, MetadataResult, TOP_CELL_TYPES, top_counts};
use crate::query::{CellTypeRequest, QueryRequest};
use crate::services::{AxisQuery, CensusHandle, CensusSource};

use super::{CensusControlPlane, CensusError};

impl<S: CensusSource> CensusControlPlane<S> {
    /// Reads cell (obs) metadata.
    ///
    /// # Errors
    /// Returns `CensusError` if the census cannot be opened or rejects the filter.
    pub async fn get_obs_metadata(
        &self,
        request: QueryRequest,
    ) -> Result<MetadataResult, CensusError> {
        self.read_metadata(Axis::Obs, request).await
    }

    /// Reads gene (var) metadata.
    ///
    /// # Errors
    /// Returns `CensusError` if the census cannot be opened or rejects the filter.
    pub async fn get_var_metadata(
        &self,
        request: QueryRequest,
    ) -> Result<MetadataResult, CensusError> {
        self.read_metadata(Axis::Var, request).await
    }

    async fn read_metadata(
        &self,
        axis: Axis,
        request: QueryRequest,
    ) -> Result<MetadataResult, CensusError> {
        let span = info_span!(
            "get_metadata",
            %axis,
            organism = %request.organism,
            value_filter = request.value_filter.as_ref().map(|filter| filter.as_str()),
        );
        async {
            let census = self.open_census().await?;
            let query = AxisQuery {
                value_filter: request.value_filter.as_ref(),
                columns: &request.columns,
                row_limit: request.limit.probe(),
            };
            let mut frame = census
                .handle()
                .read(request.organism, axis, query)
                .await
                .inspect_err(|err| warn!(message_type = "query_failed", error = %err))?;

            let limited = request.limit.apply(&mut frame);
            if limited {
                info!(
                    message_type = "result_limited",
                    limited_count = request.limit.get(),
                    "result limited"
                );
            }
            info!(rows_count = frame.len(), "metadata query complete");
            Ok::<_, CensusError>(MetadataResult::from_frame(&frame, &request, limited))
        }
        .instrument(span)
        .await
    }

    /// Lists distinct cell types, optionally with per-type cell counts.
    ///
    /// # Errors
    /// Returns `CensusError` if the census cannot be opened or the scan fails.
    pub async fn get_all_cell_types(
        &self,
        request: CellTypeRequest,
    ) -> Result<CellTypeReport, CensusError> {
        let span = info_span!(
            "get_all_cell_types",
            organism = %request.organism,
            primary_data_only = request.primary_data_only,
        );
        async {
            let census = self.open_census().await?;
            let value_filter = request.value_filter();
            let counts = census
                .handle()
                .value_counts(
                    request.organism,
                    Axis::Obs,
                    COLUMN_CELL_TYPE,
                    value_filter.as_ref(),
                )
                .await
                .inspect_err(|err| warn!(message_type = "query_failed", error = %err))?;

            let cell_types: Vec<String> = counts.keys().cloned().collect();
            let total_cells: u64 = counts.values().sum();
            info!(
                unique_cell_types_count = cell_types.len(),
                total_cells,
                "cell type scan complete"
            );

            let (cell_type_counts, top_10_cell_types) = if request.include_counts {
                let top = top_counts(&counts, TOP_CELL_TYPES);
                (Some(counts), Some(top))
            } else {
                (None, None)
            };

            Ok::<_, CensusError>(CellTypeReport {
                organism: request.organism.name().to_string(),
                total_unique_cell_types: cell_types.len(),
                cell_types,
                primary_data_only: request.primary_data_only,
                cell_type_counts,
                top_10_cell_types,
            })
        }
        .instrument(span)
        .await
    }
}
