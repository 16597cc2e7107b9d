use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::rate_limit::RateLimitError;
use crate::{build_http_client, response_body};

const GITHUB_API_BASE: &str = "https://api.github.com";

#[derive(Error, Debug)]
pub enum GitHubError {
    #[error("GitHub API returned status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("{0}")]
    RateLimited(#[source] RateLimitError),

    #[error("Repository not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    ParseError(#[from] serde_json::Error),
}

impl GitHubError {
    /// The typed rate-limit signal, if this error carries one
    pub fn rate_limit(&self) -> Option<&RateLimitError> {
        match self {
            GitHubError::RateLimited(r) => Some(r),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, GitHubError>;

pub struct GitHubClient {
    client: reqwest::Client,
    token: Option<String>,
    base_url: String,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Result<Self> {
        Self::with_base_url(token, GITHUB_API_BASE.to_string())
    }

    /// For GitHub Enterprise, or a mock server in tests
    pub fn with_base_url(token: Option<String>, base_url: String) -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
            token: token.filter(|t| !t.is_empty()),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch one page of an organization's public repositories.
    ///
    /// GitHub doesn't tell us the total, so paging is up to the caller.
    pub async fn list_org_repos_page(
        &self,
        org: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<GitHubRepo>> {
        let url = format!("{}/orgs/{}/repos", self.base_url, org);
        debug!("GET {} page={} per_page={}", url, page, per_page);

        let response = self
            .request(&url)
            .query(&[
                ("type", "public".to_string()),
                ("per_page", per_page.to_string()),
                ("page", page.to_string()),
            ])
            .send()
            .await?;

        let response = check_status(response, org).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Get detailed info about a specific repository
    pub async fn get_repository(&self, owner: &str, name: &str) -> Result<GitHubRepo> {
        let url = format!("{}/repos/{}/{}", self.base_url, owner, name);
        debug!("GET {}", url);

        let response = self.request(&url).send().await?;
        let response = check_status(response, &format!("{}/{}", owner, name)).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/vnd.github.v3+json");

        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        request
    }
}

/// Map non-success statuses onto our error variants.
///
/// GitHub signals exhausted quota with 403 as often as with 429, so both are
/// treated as rate limiting.
async fn check_status(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    if status == reqwest::StatusCode::FORBIDDEN || status == reqwest::StatusCode::TOO_MANY_REQUESTS
    {
        let headers = response.headers().clone();
        let body = response_body(response).await;
        return Err(GitHubError::RateLimited(RateLimitError::from_headers(
            "github", &headers, &body,
        )));
    }

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(GitHubError::NotFound(what.to_string()));
    }

    Err(GitHubError::RequestFailed {
        status: status.as_u16(),
        body: response_body(response).await,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRepo {
    pub name: String,
    pub full_name: String,
    pub html_url: String,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub disabled: bool,
}
