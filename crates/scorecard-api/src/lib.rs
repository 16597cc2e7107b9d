// API client implementations for the hosting platforms and the Scorecard API
pub mod github;
pub mod gitlab;
pub mod rate_limit;
pub mod scorecard;

use std::time::Duration;

// Re-export common types
pub use github::{GitHubClient, GitHubError, GitHubRepo};
pub use gitlab::{GitLabClient, GitLabError, GitLabProject};
pub use rate_limit::RateLimitError;
pub use scorecard::{
    ScorecardApiCheck, ScorecardClient, ScorecardError, ScorecardResponse, SCORECARD_API_BASE,
};

/// Every outbound call is bounded by this, no matter which backend it hits
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("scorecard-exporter/", env!("CARGO_PKG_VERSION"));

fn build_http_client() -> reqwest::Result<reqwest::Client> {
    build_http_client_with_timeout(REQUEST_TIMEOUT)
}

fn build_http_client_with_timeout(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

/// Drain a response body for diagnostics. A body we can't read is not worth
/// failing over, the status code already tells the story.
async fn response_body(response: reqwest::Response) -> String {
    response.text().await.unwrap_or_default()
}
