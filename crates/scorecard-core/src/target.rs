// Monitored-target descriptors and how they turn into a MonitorConfig
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    models::{CredentialRef, MonitorConfig},
    providers::ProviderKind,
    Error, Result,
};

/// Presence of this label (any value) opts a target in
pub const ENABLED_LABEL: &str = "scorecard-exporter/enabled";

pub const KEY_ORGANIZATION: &str = "organization";
pub const KEY_PROVIDER_TYPE: &str = "providerType";
pub const KEY_BASE_URL: &str = "baseURL";
pub const KEY_TOKEN_SECRET: &str = "tokenSecret";
pub const KEY_TOKEN_SECRET_KEY: &str = "tokenSecretKey";

const DEFAULT_TOKEN_KEY: &str = "token";

/// Externally supplied key-value description of one target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    pub name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

impl TargetDescriptor {
    pub fn is_enabled(&self) -> bool {
        self.labels.contains_key(ENABLED_LABEL)
    }

    /// Non-empty, trimmed value for `key`
    fn field(&self, key: &str) -> Option<&str> {
        self.data
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

impl MonitorConfig {
    /// Parse a descriptor. Every failure here is a configuration error.
    pub fn from_descriptor(descriptor: &TargetDescriptor) -> Result<Self> {
        let organization = descriptor.field(KEY_ORGANIZATION).ok_or_else(|| {
            Error::ConfigError(format!(
                "target {} has no {} field",
                descriptor.name, KEY_ORGANIZATION
            ))
        })?;

        let provider = match descriptor.field(KEY_PROVIDER_TYPE) {
            Some(tag) => tag.parse()?,
            None => ProviderKind::default(),
        };

        let credential = descriptor
            .field(KEY_TOKEN_SECRET)
            .map(|secret_name| CredentialRef {
                secret_name: secret_name.to_string(),
                key: descriptor
                    .field(KEY_TOKEN_SECRET_KEY)
                    .unwrap_or(DEFAULT_TOKEN_KEY)
                    .to_string(),
            });

        Ok(Self {
            name: descriptor.name.clone(),
            organization: organization.to_string(),
            provider,
            base_url: descriptor.field(KEY_BASE_URL).map(str::to_string),
            credential,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(data: &[(&str, &str)]) -> TargetDescriptor {
        TargetDescriptor {
            name: "default/acme".to_string(),
            labels: HashMap::from([(ENABLED_LABEL.to_string(), "true".to_string())]),
            data: data
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_minimal_descriptor() {
        let config = MonitorConfig::from_descriptor(&descriptor(&[("organization", "acme")])).unwrap();
        assert_eq!(config.name, "default/acme");
        assert_eq!(config.organization, "acme");
        assert_eq!(config.provider, ProviderKind::GitHub);
        assert_eq!(config.base_url, None);
        assert_eq!(config.credential, None);
    }

    #[test]
    fn test_full_descriptor() {
        let config = MonitorConfig::from_descriptor(&descriptor(&[
            ("organization", "acme"),
            ("providerType", "gitlab"),
            ("baseURL", "https://gitlab.internal/api/v4"),
            ("tokenSecret", "gitlab-token"),
            ("tokenSecretKey", "pat"),
        ]))
        .unwrap();

        assert_eq!(config.provider, ProviderKind::GitLab);
        assert_eq!(config.base_url.as_deref(), Some("https://gitlab.internal/api/v4"));
        assert_eq!(
            config.credential,
            Some(CredentialRef {
                secret_name: "gitlab-token".into(),
                key: "pat".into()
            })
        );
    }

    #[test]
    fn test_token_key_defaults() {
        let config = MonitorConfig::from_descriptor(&descriptor(&[
            ("organization", "acme"),
            ("tokenSecret", "gh"),
        ]))
        .unwrap();
        assert_eq!(config.credential.unwrap().key, "token");
    }

    #[test]
    fn test_missing_or_blank_organization() {
        for d in [descriptor(&[]), descriptor(&[("organization", "  ")])] {
            let err = MonitorConfig::from_descriptor(&d).unwrap_err();
            assert!(err.is_config_error());
        }
    }

    #[test]
    fn test_unknown_provider() {
        let err = MonitorConfig::from_descriptor(&descriptor(&[
            ("organization", "acme"),
            ("providerType", "sourceforge"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedProvider(_)));
    }

    #[test]
    fn test_marker_label_presence_only() {
        let mut d = descriptor(&[]);
        assert!(d.is_enabled());

        d.labels.insert(ENABLED_LABEL.to_string(), "false".to_string());
        assert!(d.is_enabled());

        d.labels.clear();
        assert!(!d.is_enabled());
    }
}
