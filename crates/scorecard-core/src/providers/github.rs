// GitHub provider - bridges the API client with the Provider trait
use async_trait::async_trait;
use scorecard_api::{GitHubClient, GitHubRepo};
use tracing::debug;

use super::{collect_pages, Provider, ProviderKind, PAGE_SIZE};
use crate::{models::Repository, Error, Result};

/// Host segment of the Scorecard lookup key
const GITHUB_HOST: &str = "github.com";

pub struct GitHubProvider {
    client: GitHubClient,
}

impl GitHubProvider {
    pub fn new(token: Option<String>) -> Result<Self> {
        Ok(Self {
            client: GitHubClient::new(token)?,
        })
    }

    /// Self-hosted GitHub Enterprise, or a mock server
    pub fn with_base_url(token: Option<String>, base_url: String) -> Result<Self> {
        Ok(Self {
            client: GitHubClient::with_base_url(token, base_url)?,
        })
    }
}

#[async_trait]
impl Provider for GitHubProvider {
    async fn list_repositories(&self, org: &str) -> Result<Vec<Repository>> {
        let repos = collect_pages(PAGE_SIZE, |page| async move {
            self.client
                .list_org_repos_page(org, page, PAGE_SIZE)
                .await
                .map_err(Error::from)
        })
        .await?;

        let total = repos.len();
        let eligible: Vec<Repository> = repos
            .into_iter()
            .map(github_to_repo)
            .filter(Repository::is_eligible)
            .collect();

        debug!(
            organization = org,
            listed = total,
            eligible = eligible.len(),
            "Listed GitHub repositories"
        );
        Ok(eligible)
    }

    async fn get_repository_details(&self, org: &str, repo: &str) -> Result<Repository> {
        let repo = self.client.get_repository(org, repo).await?;
        Ok(github_to_repo(repo))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::GitHub
    }

    fn score_lookup_key(&self, org: &str, repo: &str) -> String {
        format!("{}/{}/{}", GITHUB_HOST, org, repo)
    }
}

/// Convert GitHub API repo to our internal Repository model
fn github_to_repo(gh: GitHubRepo) -> Repository {
    Repository {
        name: gh.name,
        full_name: gh.full_name,
        url: gh.html_url,
        default_branch: gh.default_branch.unwrap_or_default(),
        is_private: gh.private,
        is_archived: gh.archived,
        is_fork: gh.fork,
        is_disabled: gh.disabled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_repo(name: &str) -> GitHubRepo {
        GitHubRepo {
            name: name.to_string(),
            full_name: format!("acme/{}", name),
            html_url: format!("https://github.com/acme/{}", name),
            default_branch: None,
            private: false,
            fork: true,
            archived: false,
            disabled: false,
        }
    }

    #[test]
    fn test_conversion_keeps_flags() {
        let repo = github_to_repo(api_repo("widgets"));
        assert_eq!(repo.name, "widgets");
        assert_eq!(repo.full_name, "acme/widgets");
        assert_eq!(repo.default_branch, "");
        assert!(repo.is_fork);
        assert!(!repo.is_eligible());
    }

    #[test]
    fn test_lookup_key() {
        let provider = GitHubProvider::new(None).unwrap();
        assert_eq!(
            provider.score_lookup_key("acme", "widgets"),
            "github.com/acme/widgets"
        );
        assert_eq!(provider.kind(), ProviderKind::GitHub);
    }
}
