use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use census_store::models::{Axis, Frame, Organism, ReleaseDirectory, ReleaseEntry, SummaryEntry};
use census_store::schema::{ALIAS_LATEST, ALIAS_STABLE};
use tokio::sync::OnceCell;
use tracing::info;

use crate::query::{ColumnSelection, ValueFilter};

/// Failures reported by a Census data source.
#[derive(Debug)]
pub enum SourceError {
    /// The source's expression evaluator rejected a value filter.
    InvalidFilter { expression: String, reason: String },
    /// The requested release is not in the release directory.
    UnknownRelease(String),
    /// The opened release has no experiment for the organism.
    MissingOrganism { organism: Organism, release: String },
    /// Data could not be fetched or read.
    Unavailable(String),
    /// Data was fetched but is not in the expected shape.
    Malformed { location: String, reason: String },
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFilter { expression, reason } => {
                write!(f, "invalid value filter `{expression}`: {reason}")
            }
            Self::UnknownRelease(name) => {
                write!(f, "census version not found in release directory: {name}")
            }
            Self::MissingOrganism { organism, release } => {
                write!(f, "census release {release} has no data for {organism}")
            }
            Self::Unavailable(message) => write!(f, "census source unavailable: {message}"),
            Self::Malformed { location, reason } => {
                write!(f, "malformed census data at {location}: {reason}")
            }
        }
    }
}

impl Error for SourceError {}

pub type SourceResult<T> = Result<T, SourceError>;

/// Parameters for a single obs/var read.
#[derive(Debug, Clone, Copy)]
pub struct AxisQuery<'a> {
    pub value_filter: Option<&'a ValueFilter>,
    pub columns: &'a ColumnSelection,
    /// Maximum number of matching rows the source may materialize.
    pub row_limit: usize,
}

/// Size and schema of one organism's experiment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganismStats {
    pub total_cells: usize,
    pub total_genes: usize,
    pub obs_columns: Vec<String>,
    pub var_columns: Vec<String>,
}

/// Entry point of a Census data source: lists releases and opens one.
pub trait CensusSource: Send + Sync + 'static {
    type Handle: CensusHandle;

    fn release_directory(&self) -> impl Future<Output = SourceResult<ReleaseDirectory>> + Send;

    fn open(
        &self,
        release: &ReleaseEntry,
    ) -> impl Future<Output = SourceResult<Self::Handle>> + Send;
}

/// An opened Census release.
///
/// Implementations evaluate value filters themselves and must stop collecting
/// rows once `row_limit` matches have been found.
pub trait CensusHandle: Send + Sync + 'static {
    fn organisms(&self) -> Vec<Organism>;

    fn read(
        &self,
        organism: Organism,
        axis: Axis,
        query: AxisQuery<'_>,
    ) -> impl Future<Output = SourceResult<Frame>> + Send;

    /// Counts distinct values of one column among rows matching the filter.
    fn value_counts(
        &self,
        organism: Organism,
        axis: Axis,
        column: &str,
        value_filter: Option<&ValueFilter>,
    ) -> impl Future<Output = SourceResult<BTreeMap<String, u64>>> + Send;

    fn stats(&self, organism: Organism) -> SourceResult<OrganismStats>;

    fn summary(&self) -> SourceResult<Vec<SummaryEntry>>;
}

/// Resolves a release name or alias against a directory.
///
/// `stable` falls back to the newest non-retracted LTS release and `latest`
/// to the newest release when the directory carries no such alias.
///
/// # Errors
/// Returns `SourceError::UnknownRelease` when nothing matches.
pub fn resolve_release(directory: &ReleaseDirectory, requested: &str) -> SourceResult<ReleaseEntry> {
    let requested = requested.trim();
    if let Some(entry) = directory.resolve(requested) {
        return Ok(entry.clone());
    }
    let fallback = match requested {
        ALIAS_STABLE => directory.newest_lts(),
        ALIAS_LATEST => directory.newest(),
        _ => None,
    };
    fallback
        .cloned()
        .ok_or_else(|| SourceError::UnknownRelease(requested.to_string()))
}

/// Release name reported as the latest stable version.
#[must_use]
pub fn latest_stable_release(directory: &ReleaseDirectory) -> Option<String> {
    directory
        .resolve(ALIAS_STABLE)
        .or_else(|| directory.newest_lts())
        .or_else(|| directory.newest())
        .map(|entry| entry.release_name.clone())
}

/// An opened release together with its directory entry.
pub struct OpenedCensus<H: CensusHandle> {
    release: ReleaseEntry,
    handle: H,
}

impl<H: CensusHandle> OpenedCensus<H> {
    pub const fn release(&self) -> &ReleaseEntry {
        &self.release
    }

    pub const fn handle(&self) -> &H {
        &self.handle
    }
}

/// Lazily opens the configured Census release once and shares it read-only.
pub struct CensusConnector<S: CensusSource> {
    inner: Arc<ConnectorInner<S>>,
}

struct ConnectorInner<S: CensusSource> {
    source: S,
    census_version: String,
    opened: OnceCell<Arc<OpenedCensus<S::Handle>>>,
}

impl<S: CensusSource> Clone for CensusConnector<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: CensusSource> CensusConnector<S> {
    pub fn new(source: S, census_version: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ConnectorInner {
                source,
                census_version: census_version.into(),
                opened: OnceCell::new(),
            }),
        }
    }

    pub fn source(&self) -> &S {
        &self.inner.source
    }

    pub fn census_version(&self) -> &str {
        &self.inner.census_version
    }

    /// Returns the opened release, opening it on first use.
    ///
    /// Concurrent first callers share a single open; a failed open is not
    /// cached and is retried by the next caller.
    ///
    /// # Errors
    /// Returns `SourceError` if the directory lookup or open fails.
    pub async fn census(&self) -> SourceResult<Arc<OpenedCensus<S::Handle>>> {
        let opened = self
            .inner
            .opened
            .get_or_try_init(|| async {
                let directory = self.inner.source.release_directory().await?;
                let release = resolve_release(&directory, &self.inner.census_version)?;
                let handle = self.inner.source.open(&release).await?;
                info!(
                    census_version = %self.inner.census_version,
                    release = %release.release_name,
                    "opened census release"
                );
                Ok::<_, SourceError>(Arc::new(OpenedCensus { release, handle }))
            })
            .await?;
        Ok(opened.clone())
    }
}
