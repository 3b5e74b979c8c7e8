use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use census_store::models::{
    Axis,
    CellValue,
    Frame,
    Organism,
    ReleaseDirectory,
    ReleaseEntry,
    SummaryEntry,
};
use census_store::schema::{CENSUS_DATA, CENSUS_INFO, RELEASE_DIRECTORY_FILE, SUMMARY_FILE};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::query::ValueFilter;
use crate::release::RemoteReleaseDirectory;
use crate::services::{
    AxisQuery,
    CensusHandle,
    CensusSource,
    OrganismStats,
    SourceError,
    SourceResult,
};

use super::expr::{BoundColumn, Condition};

/// Census source backed by a local snapshot directory.
///
/// Layout: `<root>/release.json` plus, per release,
/// `<root>/<release>/census_data/<organism_key>/{obs,var}.json` and an optional
/// `<root>/<release>/census_info/summary.json`.
pub struct SnapshotSource {
    root: PathBuf,
    remote_directory: Option<RemoteReleaseDirectory>,
}

impl SnapshotSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            remote_directory: None,
        }
    }

    /// Lists releases from a remote directory instead of `release.json`.
    #[must_use]
    pub fn with_remote_directory(mut self, remote: RemoteReleaseDirectory) -> Self {
        self.remote_directory = Some(remote);
        self
    }

    async fn local_directory(&self) -> SourceResult<ReleaseDirectory> {
        let path = self.root.join(RELEASE_DIRECTORY_FILE);
        match read_json(&path).await {
            Err(SourceError::Unavailable(_)) if !file_exists(&path).await => {
                self.scan_releases().await
            }
            other => other,
        }
    }

    /// Synthesizes a directory from release folders when `release.json` is absent.
    async fn scan_releases(&self) -> SourceResult<ReleaseDirectory> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|err| io_unavailable(&self.root, &err))?;
        let mut directory = ReleaseDirectory::default();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| io_unavailable(&self.root, &err))?
        {
            let path = entry.path();
            if !file_exists(&path.join(CENSUS_DATA)).await {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            directory.releases.insert(
                name.clone(),
                ReleaseEntry {
                    release_name: name.clone(),
                    release_build: name,
                    release_date: None,
                    lts: false,
                    retraction: None,
                    soma: None,
                },
            );
        }
        Ok(directory)
    }
}

impl CensusSource for SnapshotSource {
    type Handle = SnapshotCensus;

    async fn release_directory(&self) -> SourceResult<ReleaseDirectory> {
        match &self.remote_directory {
            Some(remote) => remote.fetch().await,
            None => self.local_directory().await,
        }
    }

    async fn open(&self, release: &ReleaseEntry) -> SourceResult<SnapshotCensus> {
        let release_dir = self.root.join(&release.release_name);
        let data_dir = release_dir.join(CENSUS_DATA);
        if !file_exists(&data_dir).await {
            return Err(SourceError::Unavailable(format!(
                "release {} is not present in snapshot {}",
                release.release_name,
                self.root.display()
            )));
        }

        let mut experiments = Vec::new();
        for organism in Organism::ALL {
            let organism_dir = data_dir.join(organism.storage_key());
            if !file_exists(&organism_dir).await {
                continue;
            }
            let obs: Frame = read_json(&organism_dir.join(Axis::Obs.file_name())).await?;
            let var: Frame = read_json(&organism_dir.join(Axis::Var.file_name())).await?;
            debug!(
                %organism,
                n_obs = obs.len(),
                n_vars = var.len(),
                "loaded snapshot experiment"
            );
            experiments.push((organism, obs, var));
        }

        let summary_path = release_dir.join(CENSUS_INFO).join(SUMMARY_FILE);
        let summary = if file_exists(&summary_path).await {
            Some(read_json(&summary_path).await?)
        } else {
            None
        };

        SnapshotCensus::from_parts(release.release_name.clone(), experiments, summary)
    }
}

struct Experiment {
    obs: Frame,
    var: Frame,
}

/// A snapshot release held in memory.
pub struct SnapshotCensus {
    release: String,
    experiments: BTreeMap<Organism, Experiment>,
    summary: Option<Vec<SummaryEntry>>,
}

impl SnapshotCensus {
    /// Builds a release from in-memory frames.
    ///
    /// # Errors
    /// Returns `SourceError::Malformed` if no experiment is given or a frame
    /// has rows that do not match its header.
    pub fn from_parts(
        release: impl Into<String>,
        experiments: impl IntoIterator<Item = (Organism, Frame, Frame)>,
        summary: Option<Vec<SummaryEntry>>,
    ) -> SourceResult<Self> {
        let release = release.into();
        let mut loaded = BTreeMap::new();
        for (organism, obs, var) in experiments {
            for (axis, frame) in [(Axis::Obs, &obs), (Axis::Var, &var)] {
                if let Some(row) = frame.ragged_row() {
                    return Err(SourceError::Malformed {
                        location: format!("{release}/{}/{axis}", organism.storage_key()),
                        reason: format!(
                            "row {row} does not have {} columns",
                            frame.columns.len()
                        ),
                    });
                }
            }
            loaded.insert(organism, Experiment { obs, var });
        }
        if loaded.is_empty() {
            return Err(SourceError::Malformed {
                location: release,
                reason: "no organism experiments".to_string(),
            });
        }
        Ok(Self {
            release,
            experiments: loaded,
            summary,
        })
    }

    fn frame(&self, organism: Organism, axis: Axis) -> SourceResult<&Frame> {
        let experiment =
            self.experiments
                .get(&organism)
                .ok_or_else(|| SourceError::MissingOrganism {
                    organism,
                    release: self.release.clone(),
                })?;
        Ok(match axis {
            Axis::Obs => &experiment.obs,
            Axis::Var => &experiment.var,
        })
    }
}

fn compile(
    frame: &Frame,
    value_filter: Option<&ValueFilter>,
) -> SourceResult<Option<Condition<BoundColumn>>> {
    value_filter
        .map(|filter| {
            Condition::parse(filter.as_str())
                .and_then(|condition| condition.bind(&frame.columns))
                .map_err(|err| rejected(filter, &err))
        })
        .transpose()
}

fn matches(
    condition: Option<&Condition<BoundColumn>>,
    value_filter: Option<&ValueFilter>,
    row: &[CellValue],
) -> SourceResult<bool> {
    match (condition, value_filter) {
        (Some(condition), Some(filter)) => condition.eval(row).map_err(|err| rejected(filter, &err)),
        _ => Ok(true),
    }
}

fn rejected(filter: &ValueFilter, err: &impl ToString) -> SourceError {
    SourceError::InvalidFilter {
        expression: filter.as_str().to_string(),
        reason: err.to_string(),
    }
}

impl CensusHandle for SnapshotCensus {
    fn organisms(&self) -> Vec<Organism> {
        self.experiments.keys().copied().collect()
    }

    async fn read(
        &self,
        organism: Organism,
        axis: Axis,
        query: AxisQuery<'_>,
    ) -> SourceResult<Frame> {
        let frame = self.frame(organism, axis)?;
        let condition = compile(frame, query.value_filter)?;
        let projection = query.columns.project(&frame.columns);

        let mut result = Frame::new(
            projection
                .iter()
                .map(|&index| frame.columns[index].clone())
                .collect(),
        );
        for row in &frame.rows {
            if result.len() >= query.row_limit {
                break;
            }
            if !matches(condition.as_ref(), query.value_filter, row)? {
                continue;
            }
            result.rows.push(
                projection
                    .iter()
                    .map(|&index| row.get(index).cloned().unwrap_or(CellValue::Null))
                    .collect(),
            );
        }
        Ok(result)
    }

    async fn value_counts(
        &self,
        organism: Organism,
        axis: Axis,
        column: &str,
        value_filter: Option<&ValueFilter>,
    ) -> SourceResult<BTreeMap<String, u64>> {
        let frame = self.frame(organism, axis)?;
        let index = frame
            .column_index(column)
            .ok_or_else(|| SourceError::Malformed {
                location: format!("{}/{}/{axis}", self.release, organism.storage_key()),
                reason: format!("missing column '{column}'"),
            })?;
        let condition = compile(frame, value_filter)?;

        let mut counts = BTreeMap::new();
        for row in &frame.rows {
            if !matches(condition.as_ref(), value_filter, row)? {
                continue;
            }
            let key = match row.get(index) {
                None | Some(CellValue::Null) => continue,
                Some(CellValue::Str(value)) => value.clone(),
                Some(other) => other.to_json().to_string(),
            };
            *counts.entry(key).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn stats(&self, organism: Organism) -> SourceResult<OrganismStats> {
        let obs = self.frame(organism, Axis::Obs)?;
        let var = self.frame(organism, Axis::Var)?;
        Ok(OrganismStats {
            total_cells: obs.len(),
            total_genes: var.len(),
            obs_columns: obs.columns.clone(),
            var_columns: var.columns.clone(),
        })
    }

    fn summary(&self) -> SourceResult<Vec<SummaryEntry>> {
        self.summary.clone().ok_or_else(|| SourceError::Unavailable(format!(
            "release {} has no census_info summary",
            self.release
        )))
    }
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> SourceResult<T> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|err| io_unavailable(path, &err))?;
    serde_json::from_slice(&bytes).map_err(|err| SourceError::Malformed {
        location: path.display().to_string(),
        reason: err.to_string(),
    })
}

fn io_unavailable(path: &Path, err: &io::Error) -> SourceError {
    SourceError::Unavailable(format!("failed to read {}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ColumnSelection;

    fn obs_frame(cells: usize) -> Frame {
        let mut frame = Frame::new(vec![
            "soma_joinid".to_string(),
            "cell_type".to_string(),
            "is_primary_data".to_string(),
        ]);
        frame.rows = (0..cells)
            .map(|id| {
                let cell_type = if id % 3 == 0 { "T cell" } else { "B cell" };
                vec![
                    CellValue::Int(i64::try_from(id).unwrap_or(i64::MAX)),
                    CellValue::from(cell_type),
                    CellValue::Bool(id % 2 == 0),
                ]
            })
            .collect();
        frame
    }

    fn census(cells: usize) -> SnapshotCensus {
        SnapshotCensus::from_parts(
            "test",
            [(Organism::MusMusculus, obs_frame(cells), Frame::new(vec!["feature_id".to_string()]))],
            None,
        )
        .expect("valid census")
    }

    #[tokio::test]
    async fn read_stops_at_row_limit() {
        let census = census(1000);
        let columns = ColumnSelection::All;
        let frame = census
            .read(
                Organism::MusMusculus,
                Axis::Obs,
                AxisQuery {
                    value_filter: None,
                    columns: &columns,
                    row_limit: 7,
                },
            )
            .await
            .expect("read succeeds");
        assert_eq!(frame.len(), 7);
    }

    #[tokio::test]
    async fn read_filters_and_projects() {
        let census = census(30);
        let filter = ValueFilter::new("cell_type == 'T cell'");
        let columns = ColumnSelection::parse(Some("cell_type,unknown"));
        let frame = census
            .read(
                Organism::MusMusculus,
                Axis::Obs,
                AxisQuery {
                    value_filter: Some(&filter),
                    columns: &columns,
                    row_limit: usize::MAX,
                },
            )
            .await
            .expect("read succeeds");
        assert_eq!(frame.columns, vec!["cell_type".to_string()]);
        assert_eq!(frame.len(), 10);
        assert!(frame.rows.iter().all(|row| row[0] == CellValue::from("T cell")));
    }

    #[tokio::test]
    async fn rejected_filters_carry_the_expression() {
        let census = census(3);
        let filter = ValueFilter::new("tissue == 'lung'");
        let columns = ColumnSelection::All;
        let err = census
            .read(
                Organism::MusMusculus,
                Axis::Obs,
                AxisQuery {
                    value_filter: Some(&filter),
                    columns: &columns,
                    row_limit: 10,
                },
            )
            .await
            .expect_err("unknown column rejected");
        assert!(matches!(
            err,
            SourceError::InvalidFilter { ref expression, .. } if expression == "tissue == 'lung'"
        ));
    }

    #[tokio::test]
    async fn missing_organism_is_reported() {
        let census = census(3);
        let columns = ColumnSelection::All;
        let err = census
            .read(
                Organism::HomoSapiens,
                Axis::Var,
                AxisQuery {
                    value_filter: None,
                    columns: &columns,
                    row_limit: 10,
                },
            )
            .await
            .expect_err("human absent");
        assert!(matches!(err, SourceError::MissingOrganism { .. }));
    }

    #[tokio::test]
    async fn value_counts_honor_filter() {
        let census = census(12);
        let filter = ValueFilter::new("is_primary_data == True");
        let counts = census
            .value_counts(Organism::MusMusculus, Axis::Obs, "cell_type", Some(&filter))
            .await
            .expect("counts succeed");
        assert_eq!(counts.get("T cell"), Some(&2));
        assert_eq!(counts.get("B cell"), Some(&4));
    }

    #[test]
    fn ragged_frames_are_rejected() {
        let mut obs = obs_frame(2);
        obs.rows[1].pop();
        let result = SnapshotCensus::from_parts(
            "test",
            [(Organism::HomoSapiens, obs, Frame::default())],
            None,
        );
        assert!(matches!(result, Err(SourceError::Malformed { .. })));
    }
}
