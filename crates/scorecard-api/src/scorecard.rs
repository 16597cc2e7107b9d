// OpenSSF Scorecard API client - one GET per repository, no paging
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use std::time::Duration;

use crate::{build_http_client_with_timeout, response_body, REQUEST_TIMEOUT};

pub const SCORECARD_API_BASE: &str = "https://api.securityscorecards.dev";

#[derive(Error, Debug)]
pub enum ScorecardError {
    /// The project hasn't been scanned yet. Not a failure, just no data.
    #[error("scorecard data not found for {0}")]
    NotFound(String),

    #[error("Scorecard API returned status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    ParseError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ScorecardError>;

pub struct ScorecardClient {
    client: reqwest::Client,
    base_url: String,
}

impl ScorecardClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(SCORECARD_API_BASE.to_string())
    }

    pub fn with_base_url(base_url: String) -> Result<Self> {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_http_client_with_timeout(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the latest scorecard for a project path like `github.com/org/repo`
    pub async fn get_project(&self, project_path: &str, token: Option<&str>) -> Result<ScorecardResponse> {
        let url = format!("{}/projects/{}", self.base_url, project_path);
        debug!("GET {}", url);

        let mut request = self.client.get(&url);
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ScorecardError::NotFound(project_path.to_string()));
        }

        if !status.is_success() {
            return Err(ScorecardError::RequestFailed {
                status: status.as_u16(),
                body: response_body(response).await,
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Raw envelope returned by `/projects/{path}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorecardResponse {
    #[serde(default)]
    pub score: f64,
    /// ISO-8601, sometimes just a calendar date
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub repo: ScorecardApiRepo,
    #[serde(default)]
    pub scorecard: ScorecardApiMeta,
    #[serde(default)]
    pub checks: Vec<ScorecardApiCheck>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScorecardApiRepo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub commit: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScorecardApiMeta {
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorecardApiCheck {
    pub name: String,
    #[serde(default = "unknown_score")]
    pub score: i64,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub documentation: Option<ScorecardApiDocumentation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorecardApiDocumentation {
    #[serde(default)]
    pub short: String,
    #[serde(default)]
    pub url: String,
}

fn unknown_score() -> i64 {
    -1
}
