//! Remote Census release directory.

use std::time::Duration;

use census_store::models::ReleaseDirectory;
use census_store::schema::DEFAULT_RELEASE_DIRECTORY_URL;
use tracing::debug;

use crate::services::{SourceError, SourceResult};

/// Fetches the public release directory over HTTPS.
#[derive(Debug, Clone)]
pub struct RemoteReleaseDirectory {
    client: reqwest::Client,
    url: String,
}

impl RemoteReleaseDirectory {
    /// Builds a client with a per-request timeout.
    ///
    /// # Errors
    /// Returns `SourceError::Unavailable` if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> SourceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| SourceError::Unavailable(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Directory at the default public location.
    ///
    /// # Errors
    /// Returns `SourceError::Unavailable` if the HTTP client cannot be built.
    pub fn public(timeout: Duration) -> SourceResult<Self> {
        Self::new(DEFAULT_RELEASE_DIRECTORY_URL, timeout)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Downloads and parses the directory.
    ///
    /// # Errors
    /// Returns `SourceError::Unavailable` on connection failures, timeouts and
    /// error statuses, and `SourceError::Malformed` for unparseable bodies.
    pub async fn fetch(&self) -> SourceResult<ReleaseDirectory> {
        debug!(url = %self.url, "fetching census release directory");
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| self.request_failed(&err))?;
        let body = response
            .bytes()
            .await
            .map_err(|err| self.request_failed(&err))?;
        serde_json::from_slice(&body).map_err(|err| SourceError::Malformed {
            location: self.url.clone(),
            reason: err.to_string(),
        })
    }

    fn request_failed(&self, err: &reqwest::Error) -> SourceError {
        if err.is_timeout() {
            SourceError::Unavailable(format!("release directory request to {} timed out", self.url))
        } else {
            SourceError::Unavailable(format!("release directory request to {} failed: {err}", self.url))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_directory_is_unavailable() {
        let directory =
            RemoteReleaseDirectory::new("http://127.0.0.1:9/release.json", Duration::from_millis(500))
                .expect("client builds");
        let err = directory.fetch().await.expect_err("nothing listens on the discard port");
        assert!(matches!(err, SourceError::Unavailable(_)));
    }
}
