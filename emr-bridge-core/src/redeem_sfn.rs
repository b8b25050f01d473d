//! Step Functions backed `RedemptionClient`.

use async_trait::async_trait;
use aws_sdk_sfn::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_sfn::Client;

use crate::redeem::{
    truncate_chars, RedemptionClient, RedemptionError, MAX_CAUSE_CHARS, MAX_ERROR_CHARS,
};
use crate::types::ContinuationToken;

/// Error codes meaning the token itself is no longer redeemable.
const REJECTION_CODES: [&str; 3] = ["TaskDoesNotExist", "TaskTimedOut", "InvalidToken"];

pub struct StepFunctionsClient {
    client: Client,
}

impl StepFunctionsClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn map_sdk_error<E>(err: E) -> RedemptionError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let text = DisplayErrorContext(&err).to_string();
    match err.code() {
        Some(code) if REJECTION_CODES.contains(&code) => {
            RedemptionError::Rejected(format!("{code}: {text}"))
        }
        _ => RedemptionError::Transport(text),
    }
}

#[async_trait]
impl RedemptionClient for StepFunctionsClient {
    async fn heartbeat(&self, token: &ContinuationToken) -> Result<(), RedemptionError> {
        self.client
            .send_task_heartbeat()
            .task_token(token.expose())
            .send()
            .await
            .map_err(map_sdk_error)?;
        Ok(())
    }

    async fn succeed(
        &self,
        token: &ContinuationToken,
        output: &str,
    ) -> Result<(), RedemptionError> {
        self.client
            .send_task_success()
            .task_token(token.expose())
            .output(output)
            .send()
            .await
            .map_err(map_sdk_error)?;
        Ok(())
    }

    async fn fail(
        &self,
        token: &ContinuationToken,
        error: &str,
        cause: &str,
    ) -> Result<(), RedemptionError> {
        self.client
            .send_task_failure()
            .task_token(token.expose())
            .error(truncate_chars(error, MAX_ERROR_CHARS))
            .cause(truncate_chars(cause, MAX_CAUSE_CHARS))
            .send()
            .await
            .map_err(map_sdk_error)?;
        Ok(())
    }
}
