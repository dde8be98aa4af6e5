//! Artifactory REST client
//!
//! Implements `ArtifactRepository` with `POST /api/search/aql` for queries and
//! `DELETE /{repo}/{path}` for deletions. The access token is sent as a bearer
//! token on every call and never logged.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, ClientBuilder, StatusCode, Url};

use crate::artifact::AqlResponse;
use crate::error::{Result, SweepError};
use crate::repository::{ArtifactRepository, RepositoryError, SearchPage};

/// AQL search endpoint, relative to the base URL
const AQL_SEARCH_PATH: &str = "api/search/aql";

/// Default per-request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for the Artifactory client
#[derive(Debug, Clone)]
pub struct ArtifactoryConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl ArtifactoryConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Artifactory API client
pub struct ArtifactoryClient {
    client: Client,
    access_token: String,
    base_url: String,
    base: Url,
}

impl ArtifactoryClient {
    /// Create a client for `config.base_url` authenticating with `access_token`
    pub fn new(config: ArtifactoryConfig, access_token: String) -> Result<Self> {
        Self::with_builder(config, access_token, Client::builder())
    }

    fn with_builder(
        config: ArtifactoryConfig,
        access_token: String,
        builder: ClientBuilder,
    ) -> Result<Self> {
        let (base_url, base) = normalize_base_url(&config.base_url)?;

        let client = builder.timeout(config.timeout).build().map_err(|e| {
            SweepError::InvalidConfiguration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            access_token,
            base_url,
            base,
        })
    }

    fn search_url(&self) -> String {
        format!("{}/{}", self.base_url, AQL_SEARCH_PATH)
    }

    /// Every `/`-separated segment of `path` is percent-encoded on its own,
    /// so `#`, `?` and `%` in names stay part of the path
    fn artifact_url(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(path.split('/').filter(|s| !s.is_empty()));
        }
        url
    }

    async fn error_body(response: reqwest::Response) -> String {
        response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string())
    }
}

/// Strip trailing slashes and reject anything that isn't an http(s) URL
fn normalize_base_url(raw: &str) -> Result<(String, Url)> {
    let invalid = || {
        SweepError::InvalidConfiguration(format!(
            "repository endpoint must be an http(s) URL, got '{}'",
            raw
        ))
    };

    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(invalid());
    }

    Ok((trimmed.to_string(), url))
}

#[async_trait]
impl ArtifactRepository for ArtifactoryClient {
    async fn search(&self, aql: &str) -> std::result::Result<SearchPage, RepositoryError> {
        debug!("AQL: {}", aql);

        let response = self
            .client
            .post(self.search_url())
            .bearer_auth(&self.access_token)
            .header("content-type", "text/plain")
            .body(aql.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RepositoryError::Api {
                status: status.as_u16(),
                message: Self::error_body(response).await,
            });
        }

        let body: AqlResponse = response.json().await.map_err(|e| {
            RepositoryError::InvalidResponse(format!("Failed to parse search response: {}", e))
        })?;

        let items = body.into_items();
        let rows = items.len();
        let records = items.into_iter().filter_map(|item| item.into_record()).collect();

        Ok(SearchPage { records, rows })
    }

    async fn delete(&self, path: &str) -> std::result::Result<(), RepositoryError> {
        let url = self.artifact_url(path);
        debug!("DELETE {}", url);

        let response = self
            .client
            .delete(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RepositoryError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            return Err(RepositoryError::Api {
                status: status.as_u16(),
                message: Self::error_body(response).await,
            });
        }

        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.base_url
    }
}

// Keep the token out of debug output
impl std::fmt::Debug for ArtifactoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactoryClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
