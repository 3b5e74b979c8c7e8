use std::sync::Arc;
use std::{error::Error, fmt};

use census_store::models::Organism;
use tracing::warn;

use crate::query::QueryLimits;
use crate::services::{CensusConnector, CensusSource, OpenedCensus, SourceError};

pub mod data;
pub mod info;
pub mod metadata;

/// Errors surfaced to tool callers.
#[derive(Debug)]
pub enum CensusError {
    InvalidOrganism(String),
    InvalidFilter { expression: String, reason: String },
    UpstreamUnavailable(String),
    LimitExceeded {
        name: &'static str,
        value: i64,
        max: usize,
    },
}

impl CensusError {
    /// Stable machine-readable error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidOrganism(_) => "invalid_organism",
            Self::InvalidFilter { .. } => "invalid_filter",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::LimitExceeded { .. } => "limit_exceeded",
        }
    }
}

impl fmt::Display for CensusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidOrganism(value) => {
                let supported = Organism::ALL.map(Organism::name).join("\", \"");
                write!(f, "unsupported organism: {value:?} (expected one of \"{supported}\")")
            }
            Self::InvalidFilter { expression, reason } => {
                write!(f, "invalid value filter {expression:?}: {reason}")
            }
            Self::UpstreamUnavailable(message) => write!(f, "census unavailable: {message}"),
            Self::LimitExceeded { name, value, max } => {
                write!(f, "{name} must be between 1 and {max}, got {value}")
            }
        }
    }
}

impl Error for CensusError {}

impl From<SourceError> for CensusError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::InvalidFilter { expression, reason } => {
                Self::InvalidFilter { expression, reason }
            }
            other => Self::UpstreamUnavailable(other.to_string()),
        }
    }
}

/// Query operations over a lazily opened Census release.
pub struct CensusControlPlane<S: CensusSource> {
    connector: CensusConnector<S>,
    limits: QueryLimits,
}

impl<S: CensusSource> Clone for CensusControlPlane<S> {
    fn clone(&self) -> Self {
        Self {
            connector: self.connector.clone(),
            limits: self.limits,
        }
    }
}

impl<S: CensusSource> CensusControlPlane<S> {
    pub fn new(source: S, census_version: impl Into<String>) -> Self {
        Self::with_connector(CensusConnector::new(source, census_version))
    }

    pub fn with_connector(connector: CensusConnector<S>) -> Self {
        Self {
            connector,
            limits: QueryLimits::default(),
        }
    }

    #[must_use]
    pub const fn with_limits(mut self, limits: QueryLimits) -> Self {
        self.limits = limits;
        self
    }

    pub const fn limits(&self) -> &QueryLimits {
        &self.limits
    }

    async fn open_census(&self) -> Result<Arc<OpenedCensus<S::Handle>>, CensusError> {
        let census = self
            .connector
            .census()
            .await
            .inspect_err(|err| warn!(message_type = "query_failed", error = %err))?;
        Ok(census)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_filter_rejections_keep_their_kind() {
        let err = CensusError::from(SourceError::InvalidFilter {
            expression: "tissue = 'lung'".to_string(),
            reason: "unexpected character '='".to_string(),
        });
        assert_eq!(err.kind(), "invalid_filter");
        assert!(err.to_string().contains("tissue = 'lung'"));
    }

    #[test]
    fn other_source_failures_are_upstream_unavailable() {
        let err = CensusError::from(SourceError::Unavailable("timed out".to_string()));
        assert_eq!(err.kind(), "upstream_unavailable");
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn invalid_organism_lists_supported_values() {
        let message = CensusError::InvalidOrganism("zebrafish".to_string()).to_string();
        assert!(message.contains("Homo sapiens"));
        assert!(message.contains("Mus musculus"));
    }
}
