use async_trait::async_trait;

use crate::types::ContinuationToken;

/// Error type for token store operations.
///
/// "Key not found" is deliberately absent: `get` reports it as `Ok(None)` and
/// `delete` treats it as success.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Stored value is not a valid token: {0}")]
    Corrupt(String),
}

/// Durable key → continuation token mapping.
///
/// Every call goes to the backing store; implementations must not cache, so
/// concurrent invocations for different keys never observe each other.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Write a token, replacing any existing value.
    async fn put(&self, key: &str, token: &ContinuationToken) -> Result<(), StoreError>;

    /// Write a token only if `key` is absent. Returns `false`, leaving the
    /// stored value untouched, when the key already exists.
    async fn put_new(&self, key: &str, token: &ContinuationToken) -> Result<bool, StoreError>;

    /// Read a token. Absent keys return `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<ContinuationToken>, StoreError>;

    /// Remove a token. Absent keys are a no-op.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
