//! Recording `RedemptionClient` for tests and dry runs.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::redeem::{RedemptionClient, RedemptionError};
use crate::types::{ContinuationToken, RedemptionOutcome};

/// One call observed by [`RecordingRedemptionClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedemptionCall {
    Heartbeat {
        token: String,
    },
    Succeed {
        token: String,
        output: String,
    },
    Fail {
        token: String,
        error: String,
        cause: String,
    },
}

impl RedemptionCall {
    pub fn outcome(&self) -> RedemptionOutcome {
        match self {
            Self::Heartbeat { .. } => RedemptionOutcome::Heartbeat,
            Self::Succeed { .. } => RedemptionOutcome::Success,
            Self::Fail { .. } => RedemptionOutcome::Failure,
        }
    }

    pub fn token(&self) -> &str {
        match self {
            Self::Heartbeat { token } | Self::Succeed { token, .. } | Self::Fail { token, .. } => {
                token
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InjectedFailure {
    Rejected,
    Transport,
}

/// Records every call in order. Failed calls are recorded too.
#[derive(Default)]
pub struct RecordingRedemptionClient {
    calls: Mutex<Vec<RedemptionCall>>,
    failing: Mutex<Vec<(RedemptionOutcome, InjectedFailure)>>,
}

impl RecordingRedemptionClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequent call of this kind returns `RedemptionError::Rejected`.
    pub fn fail_on(&self, outcome: RedemptionOutcome) {
        self.inject(outcome, InjectedFailure::Rejected);
    }

    /// Every subsequent call of this kind returns `RedemptionError::Transport`.
    pub fn fail_transport_on(&self, outcome: RedemptionOutcome) {
        self.inject(outcome, InjectedFailure::Transport);
    }

    fn inject(&self, outcome: RedemptionOutcome, failure: InjectedFailure) {
        let mut failing = self.failing.lock().unwrap_or_else(|e| e.into_inner());
        failing.retain(|(o, _)| *o != outcome);
        failing.push((outcome, failure));
    }

    pub fn calls(&self) -> Vec<RedemptionCall> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn count(&self, outcome: RedemptionOutcome) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.outcome() == outcome)
            .count()
    }

    fn record(&self, call: RedemptionCall) -> Result<(), RedemptionError> {
        let outcome = call.outcome();
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);

        let injected = self
            .failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|(o, _)| *o == outcome)
            .map(|(_, failure)| *failure);
        match injected {
            Some(InjectedFailure::Rejected) => Err(RedemptionError::Rejected(format!(
                "injected {outcome} failure"
            ))),
            Some(InjectedFailure::Transport) => Err(RedemptionError::Transport(format!(
                "injected {outcome} failure"
            ))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RedemptionClient for RecordingRedemptionClient {
    async fn heartbeat(&self, token: &ContinuationToken) -> Result<(), RedemptionError> {
        self.record(RedemptionCall::Heartbeat {
            token: token.expose().to_string(),
        })
    }

    async fn succeed(
        &self,
        token: &ContinuationToken,
        output: &str,
    ) -> Result<(), RedemptionError> {
        self.record(RedemptionCall::Succeed {
            token: token.expose().to_string(),
            output: output.to_string(),
        })
    }

    async fn fail(
        &self,
        token: &ContinuationToken,
        error: &str,
        cause: &str,
    ) -> Result<(), RedemptionError> {
        self.record(RedemptionCall::Fail {
            token: token.expose().to_string(),
            error: error.to_string(),
            cause: cause.to_string(),
        })
    }
}
