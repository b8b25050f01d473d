//! Error types for the token bridge.
//!
//! A missing token is not an error: `TokenStore::get` returns `Ok(None)` and
//! the bridge reports `HandleOutcome::Ignored`.

use crate::redeem::RedemptionError;
use crate::store::StoreError;
use crate::types::RedemptionOutcome;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Invalid notification: {0}")]
    InvalidNotification(String),

    #[error("Token store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("Redemption ({operation}) failed: {source}")]
    RedemptionTransport {
        operation: RedemptionOutcome,
        #[source]
        source: RedemptionError,
    },

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Token already outstanding at {key}")]
    TokenOutstanding { key: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BridgeError {
    /// Short error name for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidNotification(_) => "InvalidNotification",
            Self::StoreUnavailable(_) => "StoreUnavailable",
            Self::RedemptionTransport { .. } => "RedemptionTransportError",
            Self::Processing(_) => "UnexpectedProcessingError",
            Self::TokenOutstanding { .. } => "TokenOutstanding",
            Self::InvalidConfig(_) => "InvalidConfig",
        }
    }
}
