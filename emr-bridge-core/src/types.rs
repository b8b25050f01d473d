use serde::{Deserialize, Serialize};
use std::fmt;

// ─── Resource domain ──────────────────────────────────────────

/// Which EMR lifecycle a token is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceDomain {
    Cluster,
    Step,
}

impl ResourceDomain {
    /// Path segment used in the token store key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cluster => "cluster_state",
            Self::Step => "step_state",
        }
    }

    /// Field in the inbound event `detail` that carries the resource id.
    pub fn detail_id_field(&self) -> &'static str {
        match self {
            Self::Cluster => "clusterId",
            Self::Step => "stepId",
        }
    }

    /// Error kind sent with a failure redemption.
    pub fn failed_error_kind(&self) -> &'static str {
        match self {
            Self::Cluster => "ClusterFailedError",
            Self::Step => "StepFailedError",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cluster" | "cluster_state" => Some(Self::Cluster),
            "step" | "step_state" => Some(Self::Step),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceDomain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Unknown resource domain: {}", s))
    }
}

// ─── Correlation key ──────────────────────────────────────────

/// `(domain, resource_id)`: identifies one outstanding operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub domain: ResourceDomain,
    pub resource_id: String,
}

impl ResourceKey {
    pub fn new(domain: ResourceDomain, resource_id: impl Into<String>) -> Self {
        Self {
            domain,
            resource_id: resource_id.into(),
        }
    }
}

// ─── Continuation token ───────────────────────────────────────

/// Opaque task token issued by the workflow engine.
///
/// `Debug` and `Display` only show a short prefix; use [`ContinuationToken::expose`]
/// when the full value has to cross the wire.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    const VISIBLE_PREFIX: usize = 8;

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(Self::VISIBLE_PREFIX).collect();
        if prefix.len() < self.0.len() {
            format!("{prefix}…")
        } else {
            prefix
        }
    }
}

impl fmt::Debug for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContinuationToken({})", self.redacted())
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl From<&str> for ContinuationToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ContinuationToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ─── Notification ─────────────────────────────────────────────

/// One inbound state change for a resource. `message` is the raw JSON
/// string from the event; it is only parsed when a terminal payload is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub resource_id: String,
    pub state: String,
    pub message: String,
}

impl Notification {
    pub fn new(
        resource_id: impl Into<String>,
        state: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            state: state.into(),
            message: message.into(),
        }
    }
}

// ─── Dispositions and outcomes ────────────────────────────────

/// What a notification means for the waiting workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Still in progress; keep the wait alive.
    Heartbeat,
    /// Terminal, favourable.
    Success,
    /// Terminal, unfavourable.
    Failure,
    /// Nobody is waiting on this resource.
    Ignore,
}

impl Disposition {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }
}

/// Signal actually sent to the workflow engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionOutcome {
    Heartbeat,
    Success,
    Failure,
}

impl RedemptionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heartbeat => "heartbeat",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl fmt::Display for RedemptionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output/cause document sent with a terminal redemption.
///
/// Field names follow the resource domain, e.g. `{"StepId", "StepState", "Message"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultPayload {
    Cluster {
        #[serde(rename = "ClusterId")]
        cluster_id: String,
        #[serde(rename = "ClusterState")]
        cluster_state: String,
        #[serde(rename = "Message")]
        message: serde_json::Value,
    },
    Step {
        #[serde(rename = "StepId")]
        step_id: String,
        #[serde(rename = "StepState")]
        step_state: String,
        #[serde(rename = "Message")]
        message: serde_json::Value,
    },
}

impl ResultPayload {
    pub fn new(
        domain: ResourceDomain,
        resource_id: impl Into<String>,
        state: impl Into<String>,
        message: serde_json::Value,
    ) -> Self {
        match domain {
            ResourceDomain::Cluster => Self::Cluster {
                cluster_id: resource_id.into(),
                cluster_state: state.into(),
                message,
            },
            ResourceDomain::Step => Self::Step {
                step_id: resource_id.into(),
                step_state: state.into(),
                message,
            },
        }
    }
}

/// A terminal redemption that was delivered to the workflow engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedemptionResult {
    pub token: ContinuationToken,
    pub outcome: RedemptionOutcome,
    pub payload: ResultPayload,
}

/// What one `TokenBridge::handle` invocation did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HandleOutcome {
    /// No token stored for the resource; nothing was sent.
    Ignored,
    /// Heartbeat delivered; the token stays outstanding.
    HeartbeatSent,
    /// Heartbeat refused by the workflow engine; the token stays outstanding.
    HeartbeatRejected { reason: String },
    /// Token deleted and redeemed.
    Redeemed(RedemptionResult),
}

impl HandleOutcome {
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::Ignored => Disposition::Ignore,
            Self::HeartbeatSent | Self::HeartbeatRejected { .. } => Disposition::Heartbeat,
            Self::Redeemed(result) => match result.outcome {
                RedemptionOutcome::Heartbeat => Disposition::Heartbeat,
                RedemptionOutcome::Success => Disposition::Success,
                RedemptionOutcome::Failure => Disposition::Failure,
            },
        }
    }
}
