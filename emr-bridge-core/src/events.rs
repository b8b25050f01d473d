//! Inbound EMR state-change events.
//!
//! The event source delivers one envelope per invocation:
//!
//! ```json
//! {"detail": {"stepId": "s-1", "clusterId": "j-1", "state": "COMPLETED", "message": "{...}"}}
//! ```
//!
//! Step events carry both ids; the domain decides which one is the
//! correlation id.

use serde::Deserialize;

use crate::error::BridgeError;
use crate::types::{Notification, ResourceDomain};

/// Envelope shape as delivered by the event bus. Only `detail` is read.
#[derive(Debug, Clone, Deserialize)]
pub struct StateChangeEvent {
    pub detail: StateChangeDetail,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChangeDetail {
    #[serde(default)]
    pub step_id: Option<String>,
    #[serde(default)]
    pub cluster_id: Option<String>,
    pub state: String,
    /// Normally a JSON-encoded string; an inline JSON value is accepted too.
    #[serde(default)]
    pub message: Option<serde_json::Value>,
}

impl StateChangeDetail {
    fn resource_id(&self, domain: ResourceDomain) -> Option<&str> {
        match domain {
            ResourceDomain::Cluster => self.cluster_id.as_deref(),
            ResourceDomain::Step => self.step_id.as_deref(),
        }
    }

    fn raw_message(&self) -> String {
        match &self.message {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "{}".to_string(),
        }
    }
}

impl Notification {
    /// Decode a raw event for the given domain.
    pub fn from_event(
        domain: ResourceDomain,
        event: &serde_json::Value,
    ) -> Result<Self, BridgeError> {
        let envelope = StateChangeEvent::deserialize(event)
            .map_err(|e| BridgeError::InvalidNotification(e.to_string()))?;
        Self::from_detail(domain, &envelope.detail)
    }

    pub fn from_detail(
        domain: ResourceDomain,
        detail: &StateChangeDetail,
    ) -> Result<Self, BridgeError> {
        let resource_id = detail
            .resource_id(domain)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                BridgeError::InvalidNotification(format!(
                    "detail.{} missing",
                    domain.detail_id_field()
                ))
            })?;

        Ok(Notification::new(
            resource_id,
            detail.state.clone(),
            detail.raw_message(),
        ))
    }
}
