use std::collections::BTreeMap;

use census_store::schema::{DATA_TYPES, MEASUREMENT_TYPES};
use serde_json::Map;
use tracing::{Instrument, info, info_span, warn};

use crate::format::{CensusInfo, OrganismReport};
use crate::services::{CensusHandle, CensusSource, latest_stable_release};

use super::{CensusControlPlane, CensusError};

impl<S: CensusSource> CensusControlPlane<S> {
    /// Describes available releases and the opened release's organisms.
    ///
    /// Per-organism failures are reported inline rather than failing the call.
    ///
    /// # Errors
    /// Returns `CensusError::UpstreamUnavailable` if the release directory or
    /// the configured release cannot be read.
    pub async fn get_census_info(&self) -> Result<CensusInfo, CensusError> {
        async {
            let directory = self
                .connector
                .source()
                .release_directory()
                .await
                .inspect_err(|err| warn!(message_type = "query_failed", error = %err))?;
            let census = self.open_census().await?;
            let handle = census.handle();

            let organisms = handle.organisms();
            let mut organism_statistics = BTreeMap::new();
            let mut total_cells = 0;
            for organism in &organisms {
                let report = match handle.stats(*organism) {
                    Ok(stats) => {
                        total_cells += stats.total_cells;
                        OrganismReport::Stats {
                            total_cells: stats.total_cells,
                            total_genes: stats.total_genes,
                            obs_columns: stats.obs_columns,
                            var_columns: stats.var_columns,
                        }
                    }
                    Err(err) => {
                        warn!(
                            message_type = "organism_query_failed",
                            organism = %organism,
                            error = %err
                        );
                        OrganismReport::Error {
                            error: err.to_string(),
                        }
                    }
                };
                organism_statistics.insert(organism.name().to_string(), report);
            }

            let census_summary = match handle.summary() {
                Ok(entries) => entries
                    .into_iter()
                    .map(|entry| (entry.label, entry.value.to_json()))
                    .collect(),
                Err(err) => {
                    warn!(message_type = "summary_query_failed", error = %err);
                    Map::new()
                }
            };

            info!(
                versions_count = directory.releases.len(),
                organisms_count = organisms.len(),
                total_cells,
                "census info complete"
            );

            Ok::<_, CensusError>(CensusInfo {
                versions: directory.release_names(),
                latest_version: latest_stable_release(&directory),
                census_version: census.release().release_name.clone(),
                organisms: organisms
                    .iter()
                    .map(|organism| organism.name().to_string())
                    .collect(),
                data_types: DATA_TYPES.iter().map(ToString::to_string).collect(),
                measurement_types: MEASUREMENT_TYPES.iter().map(ToString::to_string).collect(),
                organism_statistics,
                total_cells_across_organisms: total_cells,
                census_summary,
                version_info: directory.releases.into_values().collect(),
            })
        }
        .instrument(info_span!(
            "get_census_info",
            census_version = self.connector.census_version()
        ))
        .await
    }
}
