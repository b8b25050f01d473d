//! TokenBridge: correlates EMR state changes with suspended workflow tasks.
//!
//! ## Protocol
//!
//! | Token stored? | Disposition | Store action        | Redemption call                     |
//! |---------------|-------------|---------------------|-------------------------------------|
//! | no            | -           | -                   | - (`Ignored`)                       |
//! | yes           | `Heartbeat` | -                   | `heartbeat(token)`                  |
//! | yes           | `Success`   | delete, then call   | `succeed(token, payload)`           |
//! | yes           | `Failure`   | delete, then call   | `fail(token, <Resource>FailedError, payload)` |
//!
//! A heartbeat the engine refuses leaves the token in place and reports
//! `HeartbeatRejected`. A heartbeat that fails in transport is an error.
//!
//! The delete happens before the redemption call. A redelivered notification
//! therefore finds no token and is ignored, at the price of a lost token if the
//! process dies between the two calls (the workflow's heartbeat timeout then
//! expires the wait).
//!
//! Any error after the token was read triggers one compensation attempt: the
//! key is deleted (idempotent) and a failure carrying the diagnostic is sent
//! for the token. The original error is returned either way.

use std::sync::Arc;

use crate::classify::classify;
use crate::config::KeyLayout;
use crate::error::BridgeError;
use crate::redeem::{RedemptionClient, RedemptionError};
use crate::store::TokenStore;
use crate::types::*;

pub struct TokenBridge {
    domain: ResourceDomain,
    layout: KeyLayout,
    store: Arc<dyn TokenStore>,
    client: Arc<dyn RedemptionClient>,
}

impl TokenBridge {
    pub fn new(
        domain: ResourceDomain,
        layout: KeyLayout,
        store: Arc<dyn TokenStore>,
        client: Arc<dyn RedemptionClient>,
    ) -> Self {
        Self {
            domain,
            layout,
            store,
            client,
        }
    }

    pub fn domain(&self) -> ResourceDomain {
        self.domain
    }

    /// Store key for a resource of this bridge's domain.
    pub fn store_key(&self, resource_id: &str) -> String {
        self.layout
            .key_for(&ResourceKey::new(self.domain, resource_id))
    }

    /// Park a token for `resource_id` (the suspend side's write).
    ///
    /// Refuses when a token is already outstanding for the same resource. The
    /// existence check and the write are a single create-only store call.
    /// Returns the store key written.
    pub async fn register(
        &self,
        resource_id: &str,
        token: &ContinuationToken,
    ) -> Result<String, BridgeError> {
        let key = self.store_key(resource_id);

        if !self.store.put_new(&key, token).await? {
            tracing::warn!(
                domain = %self.domain,
                resource_id,
                key = %key,
                "Refusing to register: token already outstanding"
            );
            return Err(BridgeError::TokenOutstanding { key });
        }

        tracing::info!(
            domain = %self.domain,
            resource_id,
            key = %key,
            token = %token,
            "Registered continuation token"
        );
        Ok(key)
    }

    /// Decode a raw event and handle it.
    pub async fn handle_event(
        &self,
        event: &serde_json::Value,
    ) -> Result<HandleOutcome, BridgeError> {
        let notification = Notification::from_event(self.domain, event)?;
        self.handle(&notification).await
    }

    /// Handle one notification.
    pub async fn handle(&self, notification: &Notification) -> Result<HandleOutcome, BridgeError> {
        let key = self.store_key(&notification.resource_id);

        tracing::info!(
            domain = %self.domain,
            resource_id = %notification.resource_id,
            state = %notification.state,
            key = %key,
            "Looking up continuation token"
        );

        let Some(token) = self.store.get(&key).await? else {
            tracing::info!(
                domain = %self.domain,
                resource_id = %notification.resource_id,
                key = %key,
                "No continuation token stored, ignoring"
            );
            return Ok(HandleOutcome::Ignored);
        };

        match self.redeem(notification, &key, &token).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.compensate(notification, &key, &token, &err).await;
                Err(err)
            }
        }
    }

    async fn redeem(
        &self,
        notification: &Notification,
        key: &str,
        token: &ContinuationToken,
    ) -> Result<HandleOutcome, BridgeError> {
        match classify(&notification.state) {
            Disposition::Heartbeat => self.heartbeat(notification, token).await,

            Disposition::Success => {
                let payload = self.build_payload(notification)?;
                let output = encode_payload(&payload)?;

                self.vacate(key).await?;

                tracing::info!(
                    resource_id = %notification.resource_id,
                    token = %token,
                    output = %output,
                    "Sending task success"
                );
                self.client
                    .succeed(token, &output)
                    .await
                    .map_err(|source| BridgeError::RedemptionTransport {
                        operation: RedemptionOutcome::Success,
                        source,
                    })?;

                Ok(HandleOutcome::Redeemed(RedemptionResult {
                    token: token.clone(),
                    outcome: RedemptionOutcome::Success,
                    payload,
                }))
            }

            Disposition::Failure => {
                self.vacate(key).await?;

                let payload = self.build_payload(notification)?;
                let cause = encode_payload(&payload)?;
                let error_kind = self.domain.failed_error_kind();

                tracing::info!(
                    resource_id = %notification.resource_id,
                    token = %token,
                    error = error_kind,
                    cause = %cause,
                    "Sending task failure"
                );
                self.client
                    .fail(token, error_kind, &cause)
                    .await
                    .map_err(|source| BridgeError::RedemptionTransport {
                        operation: RedemptionOutcome::Failure,
                        source,
                    })?;

                Ok(HandleOutcome::Redeemed(RedemptionResult {
                    token: token.clone(),
                    outcome: RedemptionOutcome::Failure,
                    payload,
                }))
            }

            // classify() never yields Ignore.
            Disposition::Ignore => Ok(HandleOutcome::Ignored),
        }
    }

    /// Liveness path. A heartbeat the engine refuses is not fatal: the
    /// execution may have finished or been cancelled on its own. A transport
    /// failure is an error like any other redemption failure.
    async fn heartbeat(
        &self,
        notification: &Notification,
        token: &ContinuationToken,
    ) -> Result<HandleOutcome, BridgeError> {
        tracing::info!(
            resource_id = %notification.resource_id,
            state = %notification.state,
            token = %token,
            "Sending task heartbeat"
        );

        match self.client.heartbeat(token).await {
            Ok(()) => Ok(HandleOutcome::HeartbeatSent),
            Err(RedemptionError::Rejected(reason)) => {
                tracing::warn!(
                    resource_id = %notification.resource_id,
                    state = %notification.state,
                    reason = %reason,
                    "Heartbeat rejected, token left in place"
                );
                Ok(HandleOutcome::HeartbeatRejected { reason })
            }
            Err(source) => Err(BridgeError::RedemptionTransport {
                operation: RedemptionOutcome::Heartbeat,
                source,
            }),
        }
    }

    async fn vacate(&self, key: &str) -> Result<(), BridgeError> {
        tracing::info!(key, "Removing continuation token");
        self.store.delete(key).await?;
        Ok(())
    }

    fn build_payload(&self, notification: &Notification) -> Result<ResultPayload, BridgeError> {
        let message: serde_json::Value = serde_json::from_str(&notification.message)
            .map_err(|e| {
                BridgeError::Processing(format!(
                    "message for {} is not valid JSON: {e}",
                    notification.resource_id
                ))
            })?;

        Ok(ResultPayload::new(
            self.domain,
            notification.resource_id.clone(),
            notification.state.clone(),
            message,
        ))
    }

    /// Best-effort: vacate the key and fail the token with the diagnostic.
    /// Errors here are logged only; the caller returns the original error.
    async fn compensate(
        &self,
        notification: &Notification,
        key: &str,
        token: &ContinuationToken,
        err: &BridgeError,
    ) {
        let diagnostic = diagnostic(self.domain, notification, err);

        tracing::error!(
            domain = %self.domain,
            resource_id = %notification.resource_id,
            key,
            error_kind = err.kind(),
            diagnostic = %diagnostic,
            "Failed handling state change, failing task"
        );

        if let Err(e) = self.store.delete(key).await {
            tracing::error!(
                key,
                error = %e,
                "Compensation: could not remove continuation token"
            );
        }

        if let Err(e) = self.client.fail(token, &err.to_string(), &diagnostic).await {
            tracing::error!(
                key,
                token = %token,
                error = %e,
                "Compensation: task failure not delivered, workflow may be stuck"
            );
        }
    }
}

fn encode_payload(payload: &ResultPayload) -> Result<String, BridgeError> {
    serde_json::to_string(payload)
        .map_err(|e| BridgeError::Processing(format!("encoding payload: {e}")))
}

/// Full error report: the notification, the error and its source chain.
fn diagnostic(domain: ResourceDomain, notification: &Notification, err: &BridgeError) -> String {
    let mut text = format!(
        "Failed handling {domain} change for {} (state {}, message {}): {err}",
        notification.resource_id, notification.state, notification.message
    );
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        text.push_str(&format!("\n  caused by: {cause}"));
        source = std::error::Error::source(cause);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redeem_memory::{RecordingRedemptionClient, RedemptionCall};
    use crate::store_memory::MemoryTokenStore;

    fn setup(
        domain: ResourceDomain,
    ) -> (
        TokenBridge,
        Arc<MemoryTokenStore>,
        Arc<RecordingRedemptionClient>,
    ) {
        let store = Arc::new(MemoryTokenStore::new());
        let client = Arc::new(RecordingRedemptionClient::new());
        let bridge = TokenBridge::new(
            domain,
            KeyLayout::for_namespace("test"),
            store.clone(),
            client.clone(),
        );
        (bridge, store, client)
    }

    #[tokio::test]
    async fn test_store_key_uses_domain() {
        let (bridge, _, _) = setup(ResourceDomain::Step);
        assert_eq!(bridge.store_key("s-1"), "/test/task_tokens/step_state/s-1");
    }

    #[tokio::test]
    async fn test_register_refuses_second_token() {
        let (bridge, store, _) = setup(ResourceDomain::Cluster);

        let key = bridge
            .register("j-1", &ContinuationToken::new("first"))
            .await
            .unwrap();
        assert_eq!(key, "/test/task_tokens/cluster_state/j-1");

        let err = bridge
            .register("j-1", &ContinuationToken::new("second"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::TokenOutstanding { .. }));
        assert_eq!(
            store.get(&key).await.unwrap(),
            Some(ContinuationToken::new("first"))
        );
    }

    #[tokio::test]
    async fn test_failure_uses_domain_error_kind() {
        let (bridge, _, client) = setup(ResourceDomain::Cluster);
        bridge
            .register("j-2", &ContinuationToken::new("tok"))
            .await
            .unwrap();

        let outcome = bridge
            .handle(&Notification::new("j-2", "FAILED", r#"{"reason":"bootstrap"}"#))
            .await
            .unwrap();
        assert_eq!(outcome.disposition(), Disposition::Failure);

        let calls = client.calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            RedemptionCall::Fail { error, cause, .. } => {
                assert_eq!(error, "ClusterFailedError");
                let cause: serde_json::Value = serde_json::from_str(cause).unwrap();
                assert_eq!(cause["ClusterId"], "j-2");
                assert_eq!(cause["ClusterState"], "FAILED");
                assert_eq!(cause["Message"]["reason"], "bootstrap");
            }
            other => panic!("expected Fail, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_heartbeat_rejection_is_not_fatal() {
        let (bridge, store, client) = setup(ResourceDomain::Step);
        bridge
            .register("s-1", &ContinuationToken::new("tok"))
            .await
            .unwrap();
        client.fail_on(RedemptionOutcome::Heartbeat);

        let outcome = bridge
            .handle(&Notification::new("s-1", "RUNNING", "{}"))
            .await
            .unwrap();
        assert!(matches!(outcome, HandleOutcome::HeartbeatRejected { .. }));
        assert!(store.contains(&bridge.store_key("s-1")).await);
        assert_eq!(client.count(RedemptionOutcome::Failure), 0);
    }

    #[tokio::test]
    async fn test_heartbeat_transport_failure_is_an_error() {
        let (bridge, store, client) = setup(ResourceDomain::Step);
        bridge
            .register("s-1", &ContinuationToken::new("tok"))
            .await
            .unwrap();
        client.fail_transport_on(RedemptionOutcome::Heartbeat);

        let err = bridge
            .handle(&Notification::new("s-1", "RUNNING", "{}"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::RedemptionTransport {
                operation: RedemptionOutcome::Heartbeat,
                source: crate::redeem::RedemptionError::Transport(_),
            }
        ));

        // Compensation failed the task and vacated the key.
        let calls = client.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].outcome(), RedemptionOutcome::Heartbeat);
        assert_eq!(calls[1].outcome(), RedemptionOutcome::Failure);
        assert!(!store.contains(&bridge.store_key("s-1")).await);
    }

    #[tokio::test]
    async fn test_concurrent_register_keeps_one_token() {
        let (bridge, store, _) = setup(ResourceDomain::Step);
        let first = ContinuationToken::new("first");
        let second = ContinuationToken::new("second");

        let (a, b) = tokio::join!(
            bridge.register("s-1", &first),
            bridge.register("s-1", &second),
        );

        let (winner, loser) = match (a, b) {
            (Ok(_), Err(e)) => (first, e),
            (Err(e), Ok(_)) => (second, e),
            other => panic!("expected exactly one registration, got {other:?}"),
        };
        assert!(matches!(loser, BridgeError::TokenOutstanding { .. }));
        assert_eq!(
            store.get(&bridge.store_key("s-1")).await.unwrap(),
            Some(winner)
        );
    }

    #[tokio::test]
    async fn test_store_unavailable_on_lookup() {
        let (bridge, store, client) = setup(ResourceDomain::Step);
        bridge
            .register("s-1", &ContinuationToken::new("tok"))
            .await
            .unwrap();
        store.fail_next_get();

        let err = bridge
            .handle(&Notification::new("s-1", "COMPLETED", "{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::StoreUnavailable(_)));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_failure_compensates() {
        let (bridge, store, client) = setup(ResourceDomain::Step);
        bridge
            .register("s-1", &ContinuationToken::new("tok"))
            .await
            .unwrap();
        store.fail_next_delete();

        let err = bridge
            .handle(&Notification::new("s-1", "COMPLETED", "{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::StoreUnavailable(_)));

        // No success was sent; compensation removed the key and failed the task.
        assert_eq!(client.count(RedemptionOutcome::Success), 0);
        assert_eq!(client.count(RedemptionOutcome::Failure), 1);
        assert!(!store.contains(&bridge.store_key("s-1")).await);
    }

    #[test]
    fn test_diagnostic_includes_source_chain() {
        let err = BridgeError::RedemptionTransport {
            operation: RedemptionOutcome::Success,
            source: crate::redeem::RedemptionError::Transport("connection reset".to_string()),
        };
        let text = diagnostic(
            ResourceDomain::Step,
            &Notification::new("s-9", "COMPLETED", "{}"),
            &err,
        );
        assert!(text.contains("step_state change for s-9"));
        assert!(text.contains("caused by: Transport error: connection reset"));
    }
}
