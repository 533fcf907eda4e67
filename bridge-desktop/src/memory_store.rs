//! Process-local secret storage

use async_trait::async_trait;
use bridge_traits::{error::Result, storage::SecureStore};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// `SecureStore` that keeps secrets in process memory.
///
/// Used on hosts without a keychain (servers, containers) and in tests.
/// Secrets are lost when the process exits.
#[derive(Default)]
pub struct InMemorySecureStore {
    secrets: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.secrets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.secrets.read().await.is_empty()
    }
}

#[async_trait]
impl SecureStore for InMemorySecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        self.secrets
            .write()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.secrets.read().await.get(key).cloned())
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        self.secrets.write().await.remove(key);
        Ok(())
    }
}
