use census_store::models::Organism;
use census_store::schema::COLUMN_IS_PRIMARY_DATA;

use crate::control::CensusError;

use super::limits::{DEFAULT_MAX_CELLS, DEFAULT_MAX_GENES, DEFAULT_METADATA_LIMIT};
use super::{ColumnSelection, QueryLimits, RowLimit, ValueFilter};

/// Raw parameters of an obs/var metadata query.
#[derive(Debug, Clone, Default)]
pub struct MetadataInput {
    pub organism: Option<String>,
    pub value_filter: Option<String>,
    pub column_names: Option<String>,
    pub limit: Option<i64>,
}

/// Raw parameters of a data-slice query.
#[derive(Debug, Clone, Default)]
pub struct SliceInput {
    pub organism: Option<String>,
    pub obs_value_filter: Option<String>,
    pub var_value_filter: Option<String>,
    pub obs_column_names: Option<String>,
    pub var_column_names: Option<String>,
    pub max_cells: Option<i64>,
    pub max_genes: Option<i64>,
}

/// Raw parameters of a cell-type listing.
#[derive(Debug, Clone, Default)]
pub struct CellTypeInput {
    pub organism: Option<String>,
    pub include_counts: Option<bool>,
    pub primary_data_only: Option<bool>,
}

/// Validated metadata query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub organism: Organism,
    pub value_filter: Option<ValueFilter>,
    pub columns: ColumnSelection,
    pub limit: RowLimit,
}

/// Validated data-slice query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceRequest {
    pub organism: Organism,
    pub obs_value_filter: Option<ValueFilter>,
    pub var_value_filter: Option<ValueFilter>,
    pub obs_columns: ColumnSelection,
    pub var_columns: ColumnSelection,
    pub max_cells: RowLimit,
    pub max_genes: RowLimit,
}

/// Validated cell-type listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellTypeRequest {
    pub organism: Organism,
    pub include_counts: bool,
    pub primary_data_only: bool,
}

/// Resolves the organism parameter, defaulting to human when omitted.
///
/// # Errors
/// Returns `CensusError::InvalidOrganism` for anything but the two Census
/// organisms.
pub fn resolve_organism(input: Option<&str>) -> Result<Organism, CensusError> {
    match input {
        None => Ok(Organism::HomoSapiens),
        Some(value) => {
            Organism::parse(value).ok_or_else(|| CensusError::InvalidOrganism(value.to_string()))
        }
    }
}

impl QueryRequest {
    /// Validates metadata query input against the configured ceilings.
    ///
    /// # Errors
    /// Returns `CensusError` for an unsupported organism or an invalid limit.
    pub fn from_input(input: &MetadataInput, limits: &QueryLimits) -> Result<Self, CensusError> {
        Ok(Self {
            organism: resolve_organism(input.organism.as_deref())?,
            value_filter: ValueFilter::from_optional(input.value_filter.as_deref()),
            columns: ColumnSelection::parse(input.column_names.as_deref()),
            limit: RowLimit::resolve(
                "limit",
                input.limit,
                DEFAULT_METADATA_LIMIT,
                limits.max_rows,
            )?,
        })
    }
}

impl SliceRequest {
    /// Validates slice input against the configured ceilings.
    ///
    /// # Errors
    /// Returns `CensusError` for an unsupported organism or an invalid cap.
    pub fn from_input(input: &SliceInput, limits: &QueryLimits) -> Result<Self, CensusError> {
        Ok(Self {
            organism: resolve_organism(input.organism.as_deref())?,
            obs_value_filter: ValueFilter::from_optional(input.obs_value_filter.as_deref()),
            var_value_filter: ValueFilter::from_optional(input.var_value_filter.as_deref()),
            obs_columns: ColumnSelection::parse(input.obs_column_names.as_deref()),
            var_columns: ColumnSelection::parse(input.var_column_names.as_deref()),
            max_cells: RowLimit::resolve(
                "max_cells",
                input.max_cells,
                DEFAULT_MAX_CELLS,
                limits.max_cells,
            )?,
            max_genes: RowLimit::resolve(
                "max_genes",
                input.max_genes,
                DEFAULT_MAX_GENES,
                limits.max_genes,
            )?,
        })
    }
}

impl CellTypeRequest {
    /// # Errors
    /// Returns `CensusError::InvalidOrganism` for an unsupported organism.
    pub fn from_input(input: &CellTypeInput) -> Result<Self, CensusError> {
        Ok(Self {
            organism: resolve_organism(input.organism.as_deref())?,
            include_counts: input.include_counts.unwrap_or(false),
            primary_data_only: input.primary_data_only.unwrap_or(true),
        })
    }

    /// Filter restricting the scan to primary data, when requested.
    #[must_use]
    pub fn value_filter(&self) -> Option<ValueFilter> {
        self.primary_data_only
            .then(|| ValueFilter::new(format!("{COLUMN_IS_PRIMARY_DATA} == True")))
    }
}
