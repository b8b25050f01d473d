//! Token-correlation bridge between EMR lifecycle events and Step Functions
//! `.waitForTaskToken` tasks.
//!
//! The suspend side parks a continuation token under a key derived from the
//! cluster or step id. Each EMR state change is fed to [`TokenBridge::handle`],
//! which heartbeats the token while the resource is in progress and deletes
//! then redeems it once the resource reaches a terminal state.
//!
//! Store and transport are traits ([`TokenStore`], [`RedemptionClient`]) with
//! in-memory implementations for tests; the Parameter Store and Step
//! Functions adapters live behind the `aws` feature.

pub mod bridge;
pub mod classify;
pub mod config;
pub mod error;
pub mod events;
pub mod redeem;
pub mod redeem_memory;
pub mod store;
pub mod store_memory;
pub mod types;

#[cfg(feature = "aws")]
pub mod redeem_sfn;
#[cfg(feature = "aws")]
pub mod store_ssm;

pub use bridge::TokenBridge;
pub use classify::classify;
pub use config::{BridgeConfig, KeyLayout, LogFormat};
pub use error::BridgeError;
pub use redeem::{RedemptionClient, RedemptionError};
pub use redeem_memory::{RecordingRedemptionClient, RedemptionCall};
pub use store::{StoreError, TokenStore};
pub use store_memory::MemoryTokenStore;
pub use types::*;

#[cfg(feature = "aws")]
pub use redeem_sfn::StepFunctionsClient;
#[cfg(feature = "aws")]
pub use store_ssm::SsmTokenStore;
