//! In-memory `TokenStore` for tests and local runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::store::{StoreError, TokenStore};
use crate::types::ContinuationToken;

#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<HashMap<String, String>>,
    fail_next_get: AtomicBool,
    fail_next_delete: AtomicBool,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `get` return `StoreError::Unavailable`.
    pub fn fail_next_get(&self) {
        self.fail_next_get.store(true, Ordering::SeqCst);
    }

    /// Make the next `delete` return `StoreError::Unavailable`.
    pub fn fail_next_delete(&self) {
        self.fail_next_delete.store(true, Ordering::SeqCst);
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.tokens.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }

    fn take_failure(flag: &AtomicBool, op: &str) -> Result<(), StoreError> {
        if flag.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("injected {op} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn put(&self, key: &str, token: &ContinuationToken) -> Result<(), StoreError> {
        self.tokens
            .write()
            .await
            .insert(key.to_string(), token.expose().to_string());
        Ok(())
    }

    async fn put_new(&self, key: &str, token: &ContinuationToken) -> Result<bool, StoreError> {
        let mut tokens = self.tokens.write().await;
        if tokens.contains_key(key) {
            return Ok(false);
        }
        tokens.insert(key.to_string(), token.expose().to_string());
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<ContinuationToken>, StoreError> {
        Self::take_failure(&self.fail_next_get, "get")?;
        Ok(self
            .tokens
            .read()
            .await
            .get(key)
            .cloned()
            .map(ContinuationToken::from))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        Self::take_failure(&self.fail_next_delete, "delete")?;
        self.tokens.write().await.remove(key);
        Ok(())
    }
}
