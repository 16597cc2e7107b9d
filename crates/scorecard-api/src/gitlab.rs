use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::rate_limit::RateLimitError;
use crate::{build_http_client, response_body};

const GITLAB_API_BASE: &str = "https://gitlab.com/api/v4";

#[derive(Error, Debug)]
pub enum GitLabError {
    #[error("GitLab API returned status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("{0}")]
    RateLimited(#[source] RateLimitError),

    #[error("Project not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    ParseError(#[from] serde_json::Error),
}

impl GitLabError {
    pub fn rate_limit(&self) -> Option<&RateLimitError> {
        match self {
            GitLabError::RateLimited(r) => Some(r),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, GitLabError>;

pub struct GitLabClient {
    client: reqwest::Client,
    token: Option<String>,
    base_url: String,
}

impl GitLabClient {
    pub fn new(token: Option<String>) -> Result<Self> {
        Self::with_base_url(token, GITLAB_API_BASE.to_string())
    }

    /// For self-hosted GitLab instances
    pub fn with_base_url(token: Option<String>, base_url: String) -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
            token: token.filter(|t| !t.is_empty()),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch one page of a group's public projects
    pub async fn list_group_projects_page(
        &self,
        group: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<GitLabProject>> {
        // GitLab uses URL-encoded paths, subgroups included
        let url = format!("{}/groups/{}/projects", self.base_url, urlencoding::encode(group));
        debug!("GET {} page={} per_page={}", url, page, per_page);

        let response = self
            .request(&url)
            .query(&[
                ("visibility", "public".to_string()),
                ("per_page", per_page.to_string()),
                ("page", page.to_string()),
            ])
            .send()
            .await?;

        let response = check_status(response, group).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Get a specific project by path (e.g., "gitlab-org/gitlab")
    pub async fn get_project(&self, path: &str) -> Result<GitLabProject> {
        let url = format!("{}/projects/{}", self.base_url, urlencoding::encode(path));
        debug!("GET {}", url);

        let response = self.request(&url).send().await?;
        let response = check_status(response, path).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut request = self.client.get(url);

        if let Some(ref token) = self.token {
            request = request.header("PRIVATE-TOKEN", token);
        }

        request
    }
}

async fn check_status(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    // A GitLab 403 usually means "forbidden"; only an exhausted quota makes it a rate limit
    let quota_exhausted = status == reqwest::StatusCode::FORBIDDEN
        && response
            .headers()
            .get("ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim() == "0");

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || quota_exhausted {
        let headers = response.headers().clone();
        let body = response_body(response).await;
        return Err(GitLabError::RateLimited(RateLimitError::from_headers(
            "gitlab", &headers, &body,
        )));
    }

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(GitLabError::NotFound(what.to_string()));
    }

    Err(GitLabError::RequestFailed {
        status: status.as_u16(),
        body: response_body(response).await,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitLabProject {
    pub id: u64,
    pub name: String,
    pub path: String,
    pub path_with_namespace: String,
    pub web_url: String,
    #[serde(default)]
    pub visibility: String,
    #[serde(default)]
    pub archived: bool,
    pub default_branch: Option<String>,
    /// Only present on forks
    #[serde(default)]
    pub forked_from_project: Option<serde_json::Value>,
}

impl GitLabProject {
    pub fn is_fork(&self) -> bool {
        self.forked_from_project
            .as_ref()
            .is_some_and(|upstream| !upstream.is_null())
    }
}
