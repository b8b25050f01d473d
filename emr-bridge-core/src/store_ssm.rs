//! Parameter Store backed `TokenStore`.

use async_trait::async_trait;
use aws_sdk_ssm::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_ssm::types::ParameterType;
use aws_sdk_ssm::Client;

use crate::store::{StoreError, TokenStore};
use crate::types::ContinuationToken;

const PARAMETER_NOT_FOUND: &str = "ParameterNotFound";
const PARAMETER_ALREADY_EXISTS: &str = "ParameterAlreadyExists";

pub struct SsmTokenStore {
    client: Client,
}

impl SsmTokenStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TokenStore for SsmTokenStore {
    async fn put(&self, key: &str, token: &ContinuationToken) -> Result<(), StoreError> {
        self.client
            .put_parameter()
            .name(key)
            .value(token.expose())
            .r#type(ParameterType::String)
            .overwrite(true)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn put_new(&self, key: &str, token: &ContinuationToken) -> Result<bool, StoreError> {
        let result = self
            .client
            .put_parameter()
            .name(key)
            .value(token.expose())
            .r#type(ParameterType::String)
            .overwrite(false)
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) if e.code() == Some(PARAMETER_ALREADY_EXISTS) => Ok(false),
            Err(e) => Err(StoreError::Unavailable(DisplayErrorContext(&e).to_string())),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<ContinuationToken>, StoreError> {
        match self.client.get_parameter().name(key).send().await {
            Ok(output) => {
                let value = output
                    .parameter()
                    .and_then(|p| p.value())
                    .ok_or_else(|| StoreError::Corrupt(format!("{key} has no value")))?;
                Ok(Some(ContinuationToken::new(value)))
            }
            Err(e) if e.code() == Some(PARAMETER_NOT_FOUND) => Ok(None),
            Err(e) => Err(StoreError::Unavailable(DisplayErrorContext(&e).to_string())),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self.client.delete_parameter().name(key).send().await {
            Ok(_) => Ok(()),
            Err(e) if e.code() == Some(PARAMETER_NOT_FOUND) => {
                tracing::debug!(key, "Parameter already absent on delete");
                Ok(())
            }
            Err(e) => Err(StoreError::Unavailable(DisplayErrorContext(&e).to_string())),
        }
    }
}
