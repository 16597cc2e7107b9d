// Provider implementations for different platforms
pub mod github;
pub mod gitlab;
pub mod registry;

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{models::Repository, Error, Result};

pub use github::GitHubProvider;
pub use gitlab::GitLabProvider;
pub use registry::{ProviderConstructor, ProviderRegistry};

/// Both backends cap a page at 100 items
pub const PAGE_SIZE: u32 = 100;

/// Which hosting backend a target lives on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    GitHub,
    GitLab,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::GitHub => "github",
            ProviderKind::GitLab => "gitlab",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "github" => Ok(ProviderKind::GitHub),
            "gitlab" => Ok(ProviderKind::GitLab),
            other => Err(Error::UnsupportedProvider(other.to_string())),
        }
    }
}

/// Everything a constructor needs to build a provider for one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub token: Option<String>,
    pub base_url: Option<String>,
    pub organization: String,
}

/// Uniform view over a repository-hosting backend
///
/// Implementations must surface rate limiting as an error the classifier in
/// `rate_limit` recognises, with whatever metadata the backend gave us.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    /// All eligible repositories of an organization, every page fetched
    async fn list_repositories(&self, org: &str) -> Result<Vec<Repository>>;

    async fn get_repository_details(&self, org: &str, repo: &str) -> Result<Repository>;

    fn kind(&self) -> ProviderKind;

    /// Path the Scorecard API knows this repository by, e.g. `github.com/acme/widgets`
    fn score_lookup_key(&self, org: &str, repo: &str) -> String;
}

/// Drain a page-numbered listing.
///
/// Backends don't report a total, so a short or empty page is the end.
pub(crate) async fn collect_pages<T, F, Fut>(per_page: u32, mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let mut items = Vec::new();
    let mut page = 1;

    loop {
        let batch = fetch_page(page).await?;
        let count = batch.len();
        items.extend(batch);

        if count == 0 || count < per_page as usize {
            break;
        }
        page += 1;
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!("github".parse::<ProviderKind>().unwrap(), ProviderKind::GitHub);
        assert_eq!("GitLab".parse::<ProviderKind>().unwrap(), ProviderKind::GitLab);
        assert_eq!(ProviderKind::default(), ProviderKind::GitHub);

        let err = "bitbucket".parse::<ProviderKind>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedProvider(ref p) if p == "bitbucket"));
    }

    #[test]
    fn test_provider_kind_display() {
        assert_eq!(ProviderKind::GitHub.to_string(), "github");
        assert_eq!(ProviderKind::GitLab.to_string(), "gitlab");
    }

    #[tokio::test]
    async fn test_full_page_then_short_page() {
        let calls = AtomicU32::new(0);
        let items = collect_pages(100, |page| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                let len = if page == 1 { 100 } else { 40 };
                Ok((0..len).collect::<Vec<u32>>())
            }
        })
        .await
        .unwrap();

        assert_eq!(items.len(), 140);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_first_page() {
        let items: Vec<u32> = collect_pages(100, |_| async { Ok(Vec::new()) }).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_exact_multiple_needs_trailing_empty_page() {
        let items = collect_pages(100, |page| async move {
            let len = if page <= 2 { 100 } else { 0 };
            Ok((0..len).collect::<Vec<u32>>())
        })
        .await
        .unwrap();

        assert_eq!(items.len(), 200);
    }

    #[tokio::test]
    async fn test_page_error_propagates() {
        let result: Result<Vec<u32>> = collect_pages(100, |page| async move {
            if page == 2 {
                Err(Error::ApiError("boom".into()))
            } else {
                Ok((0..100).collect())
            }
        })
        .await;

        assert!(result.is_err());
    }
}
