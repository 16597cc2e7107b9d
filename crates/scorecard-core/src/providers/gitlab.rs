// GitLab provider - groups instead of orgs, projects instead of repos
use async_trait::async_trait;
use scorecard_api::{GitLabClient, GitLabProject};
use tracing::debug;

use super::{collect_pages, Provider, ProviderKind, PAGE_SIZE};
use crate::{models::Repository, Error, Result};

const GITLAB_HOST: &str = "gitlab.com";

pub struct GitLabProvider {
    client: GitLabClient,
}

impl GitLabProvider {
    pub fn new(token: Option<String>) -> Result<Self> {
        Ok(Self {
            client: GitLabClient::new(token)?,
        })
    }

    pub fn with_base_url(token: Option<String>, base_url: String) -> Result<Self> {
        Ok(Self {
            client: GitLabClient::with_base_url(token, base_url)?,
        })
    }
}

#[async_trait]
impl Provider for GitLabProvider {
    async fn list_repositories(&self, group: &str) -> Result<Vec<Repository>> {
        let projects = collect_pages(PAGE_SIZE, |page| async move {
            self.client
                .list_group_projects_page(group, page, PAGE_SIZE)
                .await
                .map_err(Error::from)
        })
        .await?;

        let total = projects.len();
        let eligible: Vec<Repository> = projects
            .into_iter()
            .map(gitlab_to_repo)
            .filter(Repository::is_eligible)
            .collect();

        debug!(
            organization = group,
            listed = total,
            eligible = eligible.len(),
            "Listed GitLab projects"
        );
        Ok(eligible)
    }

    async fn get_repository_details(&self, group: &str, project: &str) -> Result<Repository> {
        let project = self
            .client
            .get_project(&format!("{}/{}", group, project))
            .await?;
        Ok(gitlab_to_repo(project))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::GitLab
    }

    fn score_lookup_key(&self, group: &str, project: &str) -> String {
        format!("{}/{}/{}", GITLAB_HOST, group, project)
    }
}

/// GitLab has no "disabled" state; internal visibility counts as private
fn gitlab_to_repo(gl: GitLabProject) -> Repository {
    let is_fork = gl.is_fork();
    Repository {
        // The path, not the display name, is what URLs and lookups use
        name: gl.path,
        full_name: gl.path_with_namespace,
        url: gl.web_url,
        default_branch: gl.default_branch.unwrap_or_default(),
        is_private: gl.visibility != "public",
        is_archived: gl.archived,
        is_fork,
        is_disabled: false,
    }
}
