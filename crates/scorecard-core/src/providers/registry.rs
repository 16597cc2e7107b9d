// Maps a provider tag onto something that can build a Provider for it
use std::collections::HashMap;
use std::sync::Arc;

use super::{GitHubProvider, GitLabProvider, Provider, ProviderConfig, ProviderKind};
use crate::{Error, Result};

pub type ProviderConstructor =
    Arc<dyn Fn(&ProviderConfig) -> Result<Box<dyn Provider>> + Send + Sync>;

/// Filled once at startup, read-only afterwards
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    constructors: HashMap<ProviderKind, ProviderConstructor>,
}

impl ProviderRegistry {
    /// Empty registry. Every `resolve` fails until something is registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// GitHub and GitLab, the backends we ship with
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ProviderKind::GitHub, |config| {
            let provider = match &config.base_url {
                Some(url) => GitHubProvider::with_base_url(config.token.clone(), url.clone()),
                None => GitHubProvider::new(config.token.clone()),
            }
            .map_err(|e| Error::ConfigError(format!("cannot build GitHub client: {}", e)))?;
            Ok(Box::new(provider) as Box<dyn Provider>)
        });
        registry.register(ProviderKind::GitLab, |config| {
            let provider = match &config.base_url {
                Some(url) => GitLabProvider::with_base_url(config.token.clone(), url.clone()),
                None => GitLabProvider::new(config.token.clone()),
            }
            .map_err(|e| Error::ConfigError(format!("cannot build GitLab client: {}", e)))?;
            Ok(Box::new(provider) as Box<dyn Provider>)
        });
        registry
    }

    /// Add (or replace) the constructor for a kind
    pub fn register<F>(&mut self, kind: ProviderKind, constructor: F)
    where
        F: Fn(&ProviderConfig) -> Result<Box<dyn Provider>> + Send + Sync + 'static,
    {
        self.constructors.insert(kind, Arc::new(constructor));
    }

    /// Build a provider for `config`. An unregistered kind is an error, there
    /// is no fallback backend.
    pub fn resolve(&self, config: &ProviderConfig) -> Result<Box<dyn Provider>> {
        if config.organization.trim().is_empty() {
            return Err(Error::ConfigError("organization must not be empty".to_string()));
        }

        let constructor = self
            .constructors
            .get(&config.kind)
            .ok_or_else(|| Error::UnsupportedProvider(config.kind.to_string()))?;

        constructor(config)
    }

    pub fn supported(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<ProviderKind> = self.constructors.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockProvider;

    fn config(kind: ProviderKind) -> ProviderConfig {
        ProviderConfig {
            kind,
            token: None,
            base_url: None,
            organization: "acme".to_string(),
        }
    }

    #[test]
    fn test_defaults_resolve_both_kinds() {
        let registry = ProviderRegistry::with_defaults();

        let github = registry.resolve(&config(ProviderKind::GitHub)).unwrap();
        assert_eq!(github.kind(), ProviderKind::GitHub);

        let gitlab = registry.resolve(&config(ProviderKind::GitLab)).unwrap();
        assert_eq!(gitlab.kind(), ProviderKind::GitLab);

        assert_eq!(
            registry.supported(),
            vec![ProviderKind::GitHub, ProviderKind::GitLab]
        );
    }

    #[test]
    fn test_unregistered_kind_is_unsupported() {
        let registry = ProviderRegistry::new();
        let err = registry.resolve(&config(ProviderKind::GitHub)).err().unwrap();
        assert!(matches!(err, Error::UnsupportedProvider(ref k) if k == "github"));
        assert!(err.is_config_error());
    }

    #[test]
    fn test_empty_organization_rejected() {
        let registry = ProviderRegistry::with_defaults();
        let mut cfg = config(ProviderKind::GitHub);
        cfg.organization = "  ".to_string();

        let err = registry.resolve(&cfg).err().unwrap();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_custom_registration_replaces_default() {
        let mut registry = ProviderRegistry::with_defaults();
        registry.register(ProviderKind::GitHub, |cfg| {
            let org = cfg.organization.clone();
            let mut mock = MockProvider::new();
            mock.expect_kind().return_const(ProviderKind::GitHub);
            mock.expect_score_lookup_key()
                .returning(move |_, repo| format!("mock/{}/{}", org, repo));
            Ok(Box::new(mock) as Box<dyn Provider>)
        });

        let provider = registry.resolve(&config(ProviderKind::GitHub)).unwrap();
        assert_eq!(provider.score_lookup_key("acme", "widgets"), "mock/acme/widgets");
    }
}
