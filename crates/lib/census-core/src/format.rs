//! Response shaping: frames into plain JSON mappings.
//!
//! Counts describe the returned, possibly truncated rows. Nothing from the
//! source's tabular types leaves this module; every cell becomes a JSON
//! primitive.

use std::collections::BTreeMap;

use census_store::models::{Frame, ReleaseEntry};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::query::{QueryRequest, SliceRequest};

/// Rows shown per axis in a slice summary.
pub const SLICE_SAMPLE_ROWS: usize = 5;

/// Cell types listed in a ranked count report.
pub const TOP_CELL_TYPES: usize = 10;

pub type Row = Map<String, Value>;

/// Converts the first `len` rows of a frame into column-keyed mappings.
#[must_use]
pub fn frame_rows(frame: &Frame, len: usize) -> Vec<Row> {
    frame
        .head(len)
        .iter()
        .map(|row| {
            frame
                .columns
                .iter()
                .zip(row)
                .map(|(column, value)| (column.clone(), value.to_json()))
                .collect()
        })
        .collect()
}

/// Echo of the metadata query that produced a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryInfo {
    pub organism: String,
    pub value_filter: Option<String>,
    pub column_names: Option<Vec<String>>,
    pub limit: usize,
    pub limited: bool,
}

/// Result of an obs/var metadata query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataResult {
    pub count: usize,
    pub columns: Vec<String>,
    pub sample_rows: Vec<Row>,
    pub query_info: QueryInfo,
}

impl MetadataResult {
    /// Builds a result from an already truncated frame.
    #[must_use]
    pub fn from_frame(frame: &Frame, request: &QueryRequest, limited: bool) -> Self {
        Self {
            count: frame.len(),
            columns: frame.columns.clone(),
            sample_rows: frame_rows(frame, frame.len()),
            query_info: QueryInfo {
                organism: request.organism.name().to_string(),
                value_filter: request
                    .value_filter
                    .as_ref()
                    .map(|filter| filter.as_str().to_string()),
                column_names: request.columns.names().map(<[String]>::to_vec),
                limit: request.limit.get(),
                limited,
            },
        }
    }
}

/// Echo of the slice query that produced a summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceEcho {
    pub organism: String,
    pub obs_value_filter: Option<String>,
    pub var_value_filter: Option<String>,
    pub obs_column_names: Option<Vec<String>>,
    pub var_column_names: Option<Vec<String>>,
    pub max_cells: usize,
    pub max_genes: usize,
    pub cells_limited: bool,
    pub genes_limited: bool,
}

/// Summary of a cells x genes slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceSummary {
    pub cell_count: usize,
    pub gene_count: usize,
    pub sample_obs_rows: Vec<Row>,
    pub sample_var_rows: Vec<Row>,
    pub obs_columns: Vec<String>,
    pub var_columns: Vec<String>,
    pub query_echo: SliceEcho,
}

/// Truncation flags for the two slice axes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SliceTruncation {
    pub cells_limited: bool,
    pub genes_limited: bool,
}

impl SliceSummary {
    /// Builds a summary from already truncated obs and var frames.
    #[must_use]
    pub fn from_frames(
        obs: &Frame,
        var: &Frame,
        request: &SliceRequest,
        truncation: SliceTruncation,
    ) -> Self {
        Self {
            cell_count: obs.len(),
            gene_count: var.len(),
            sample_obs_rows: frame_rows(obs, SLICE_SAMPLE_ROWS),
            sample_var_rows: frame_rows(var, SLICE_SAMPLE_ROWS),
            obs_columns: obs.columns.clone(),
            var_columns: var.columns.clone(),
            query_echo: SliceEcho {
                organism: request.organism.name().to_string(),
                obs_value_filter: request
                    .obs_value_filter
                    .as_ref()
                    .map(|filter| filter.as_str().to_string()),
                var_value_filter: request
                    .var_value_filter
                    .as_ref()
                    .map(|filter| filter.as_str().to_string()),
                obs_column_names: request.obs_columns.names().map(<[String]>::to_vec),
                var_column_names: request.var_columns.names().map(<[String]>::to_vec),
                max_cells: request.max_cells.get(),
                max_genes: request.max_genes.get(),
                cells_limited: truncation.cells_limited,
                genes_limited: truncation.genes_limited,
            },
        }
    }
}

/// Per-organism statistics, or the error that prevented computing them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrganismReport {
    Stats {
        total_cells: usize,
        total_genes: usize,
        obs_columns: Vec<String>,
        var_columns: Vec<String>,
    },
    Error {
        error: String,
    },
}

/// Census-wide metadata returned by `get_census_info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CensusInfo {
    pub versions: Vec<String>,
    pub latest_version: Option<String>,
    pub census_version: String,
    pub organisms: Vec<String>,
    pub data_types: Vec<String>,
    pub measurement_types: Vec<String>,
    pub organism_statistics: BTreeMap<String, OrganismReport>,
    pub total_cells_across_organisms: usize,
    pub census_summary: Map<String, Value>,
    pub version_info: Vec<ReleaseEntry>,
}

/// One entry of a ranked cell-type count list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellTypeCount {
    pub cell_type: String,
    pub count: u64,
}

/// Distinct cell types of an organism.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellTypeReport {
    pub organism: String,
    pub cell_types: Vec<String>,
    pub total_unique_cell_types: usize,
    pub primary_data_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_type_counts: Option<BTreeMap<String, u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_10_cell_types: Option<Vec<CellTypeCount>>,
}

/// Ranks counts by descending frequency, breaking ties by name.
#[must_use]
pub fn top_counts(counts: &BTreeMap<String, u64>, len: usize) -> Vec<CellTypeCount> {
    let mut ranked: Vec<CellTypeCount> = counts
        .iter()
        .map(|(cell_type, count)| CellTypeCount {
            cell_type: cell_type.clone(),
            count: *count,
        })
        .collect();
    ranked.sort_by(|left, right| {
        right
            .count
            .cmp(&left.count)
            .then_with(|| left.cell_type.cmp(&right.cell_type))
    });
    ranked.truncate(len);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use census_store::models::CellValue;

    fn frame() -> Frame {
        let mut frame = Frame::new(vec!["cell_type".to_string(), "n_genes".to_string()]);
        frame.rows = vec![
            vec![CellValue::from("T cell"), CellValue::Int(1200)],
            vec![CellValue::from("B cell"), CellValue::Float(f64::NAN)],
        ];
        frame
    }

    #[test]
    fn rows_become_json_primitives() {
        let rows = frame_rows(&frame(), 10);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["cell_type"], Value::from("T cell"));
        assert_eq!(rows[0]["n_genes"], Value::from(1200));
        assert_eq!(rows[1]["n_genes"], Value::Null);
    }

    #[test]
    fn rows_respect_requested_length() {
        assert_eq!(frame_rows(&frame(), 1).len(), 1);
        assert!(frame_rows(&frame(), 0).is_empty());
    }

    #[test]
    fn top_counts_rank_by_frequency_then_name() {
        let counts = BTreeMap::from([
            ("B cell".to_string(), 3),
            ("T cell".to_string(), 7),
            ("NK cell".to_string(), 3),
            ("monocyte".to_string(), 1),
        ]);
        let top = top_counts(&counts, 3);
        let names: Vec<&str> = top.iter().map(|entry| entry.cell_type.as_str()).collect();
        assert_eq!(names, vec!["T cell", "B cell", "NK cell"]);
    }
}
