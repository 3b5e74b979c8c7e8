use census_store::models::Frame;

use crate::control::CensusError;

pub const DEFAULT_METADATA_LIMIT: usize = 1000;
pub const DEFAULT_MAX_CELLS: usize = 10_000;
pub const DEFAULT_MAX_GENES: usize = 2_000;

pub const DEFAULT_MAX_ROWS_CEILING: usize = 100_000;
pub const DEFAULT_MAX_CELLS_CEILING: usize = 100_000;
pub const DEFAULT_MAX_GENES_CEILING: usize = 60_000;

/// Upper bounds accepted for caller-supplied limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub max_rows: usize,
    pub max_cells: usize,
    pub max_genes: usize,
}

impl QueryLimits {
    #[must_use]
    pub const fn new(max_rows: usize, max_cells: usize, max_genes: usize) -> Self {
        Self {
            max_rows,
            max_cells,
            max_genes,
        }
    }
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ROWS_CEILING,
            DEFAULT_MAX_CELLS_CEILING,
            DEFAULT_MAX_GENES_CEILING,
        )
    }
}

/// A validated, positive row cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLimit(usize);

impl RowLimit {
    /// Validates a requested limit, applying `default` when absent.
    ///
    /// # Errors
    /// Returns `CensusError::LimitExceeded` for values of zero or less, or
    /// above `max`.
    pub fn resolve(
        name: &'static str,
        requested: Option<i64>,
        default: usize,
        max: usize,
    ) -> Result<Self, CensusError> {
        let Some(requested) = requested else {
            return Ok(Self(default.min(max)));
        };
        let exceeded = || CensusError::LimitExceeded {
            name,
            value: requested,
            max,
        };
        let value = usize::try_from(requested).map_err(|_| exceeded())?;
        if value == 0 || value > max {
            return Err(exceeded());
        }
        Ok(Self(value))
    }

    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }

    /// Row count requested from the source: one past the cap so truncation
    /// can be detected without reading further.
    #[must_use]
    pub const fn probe(self) -> usize {
        self.0.saturating_add(1)
    }

    /// Truncates `frame` to the cap and reports whether rows were dropped.
    pub fn apply(self, frame: &mut Frame) -> bool {
        let limited = frame.len() > self.0;
        frame.truncate(self.0);
        limited
    }
}
