use census_store::models::Axis;
use tracing::{Instrument, info, info_span, warn};

use crate::format::{SliceSummary, SliceTruncation};
use crate::query::SliceRequest;
use crate::services::{AxisQuery, CensusHandle, CensusSource};

use super::{CensusControlPlane, CensusError};

impl<S: CensusSource> CensusControlPlane<S> {
    /// Summarizes a cells x genes slice.
    ///
    /// Both caps are pushed down to the source before any rows are
    /// materialized, so the obs and var reads are bounded independently of how
    /// many rows the filters match.
    ///
    /// # Errors
    /// Returns `CensusError` if the census cannot be opened or rejects a filter.
    pub async fn get_data_slice(&self, request: SliceRequest) -> Result<SliceSummary, CensusError> {
        let span = info_span!(
            "get_data_slice",
            organism = %request.organism,
            max_cells = request.max_cells.get(),
            max_genes = request.max_genes.get(),
        );
        async {
            let census = self.open_census().await?;
            let handle = census.handle();

            let obs_query = AxisQuery {
                value_filter: request.obs_value_filter.as_ref(),
                columns: &request.obs_columns,
                row_limit: request.max_cells.probe(),
            };
            let var_query = AxisQuery {
                value_filter: request.var_value_filter.as_ref(),
                columns: &request.var_columns,
                row_limit: request.max_genes.probe(),
            };

            let mut obs = handle
                .read(request.organism, Axis::Obs, obs_query)
                .await
                .inspect_err(|err| warn!(message_type = "query_failed", axis = "obs", error = %err))?;
            let mut var = handle
                .read(request.organism, Axis::Var, var_query)
                .await
                .inspect_err(|err| warn!(message_type = "query_failed", axis = "var", error = %err))?;

            let truncation = SliceTruncation {
                cells_limited: request.max_cells.apply(&mut obs),
                genes_limited: request.max_genes.apply(&mut var),
            };
            if truncation.cells_limited {
                info!(
                    message_type = "cells_limited",
                    limited_count = request.max_cells.get(),
                    "cells limited"
                );
            }
            if truncation.genes_limited {
                info!(
                    message_type = "genes_limited",
                    limited_count = request.max_genes.get(),
                    "genes limited"
                );
            }
            info!(n_obs = obs.len(), n_vars = var.len(), "data slice complete");

            Ok::<_, CensusError>(SliceSummary::from_frames(&obs, &var, &request, truncation))
        }
        .instrument(span)
        .await
    }
}
