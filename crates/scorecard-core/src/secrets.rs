// Credential lookup. The real store lives outside this process.
use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::Result;

/// A named secret is a bag of key/value pairs
pub type Secret = HashMap<String, String>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// `Ok(None)` when no secret with that name exists
    async fn get(&self, name: &str) -> Result<Option<Secret>>;
}

/// Serves the `[secrets]` table of the config file
#[derive(Debug, Default)]
pub struct ConfigSecretStore {
    secrets: RwLock<HashMap<String, Secret>>,
}

impl ConfigSecretStore {
    pub fn new(secrets: HashMap<String, Secret>) -> Self {
        Self {
            secrets: RwLock::new(secrets),
        }
    }

    /// Swap in a freshly loaded table
    pub fn replace(&self, secrets: HashMap<String, Secret>) {
        *self.secrets.write() = secrets;
    }
}

#[async_trait]
impl SecretStore for ConfigSecretStore {
    async fn get(&self, name: &str) -> Result<Option<Secret>> {
        Ok(self.secrets.read().get(name).cloned())
    }
}
