//! IAM as the identity directory

use async_trait::async_trait;
use aws_sdk_iam::Client;
use aws_sdk_iam::types::StatusType;
use keyrot_core::{
    AccessKeyCredential, AccessKeyStatus, AccessKeySummary, IdentityDirectory, ServiceError,
};

use crate::error::classify;

const SERVICE: &str = "iam";

/// [`IdentityDirectory`] backed by IAM users.
#[derive(Clone, Debug)]
pub struct IamDirectory {
    client: Client,
}

impl IamDirectory {
    /// Wrap an IAM client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn status_type(status: AccessKeyStatus) -> StatusType {
    match status {
        AccessKeyStatus::Active => StatusType::Active,
        AccessKeyStatus::Inactive => StatusType::Inactive,
    }
}

#[async_trait]
impl IdentityDirectory for IamDirectory {
    #[tracing::instrument(skip(self), fields(service = SERVICE))]
    async fn create_access_key(&self, principal: &str) -> Result<AccessKeyCredential, ServiceError> {
        let output = self
            .client
            .create_access_key()
            .user_name(principal)
            .send()
            .await
            .map_err(|e| classify(SERVICE, "CreateAccessKey", e))?;

        let key = output.access_key().ok_or_else(|| {
            ServiceError::new(
                SERVICE,
                "CreateAccessKey",
                keyrot_core::ServiceErrorKind::Other,
                "response carried no AccessKey",
            )
        })?;

        Ok(AccessKeyCredential::new(
            key.access_key_id(),
            key.secret_access_key(),
            key.user_name(),
        ))
    }

    #[tracing::instrument(skip(self), fields(service = SERVICE))]
    async fn update_access_key_status(
        &self,
        principal: &str,
        access_key_id: &str,
        status: AccessKeyStatus,
    ) -> Result<(), ServiceError> {
        self.client
            .update_access_key()
            .user_name(principal)
            .access_key_id(access_key_id)
            .status(status_type(status))
            .send()
            .await
            .map_err(|e| classify(SERVICE, "UpdateAccessKey", e))?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(service = SERVICE))]
    async fn delete_access_key(&self, principal: &str, access_key_id: &str) -> Result<(), ServiceError> {
        self.client
            .delete_access_key()
            .user_name(principal)
            .access_key_id(access_key_id)
            .send()
            .await
            .map_err(|e| classify(SERVICE, "DeleteAccessKey", e))?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(service = SERVICE))]
    async fn list_access_keys(&self, principal: &str) -> Result<Vec<AccessKeySummary>, ServiceError> {
        let mut keys = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let output = self
                .client
                .list_access_keys()
                .user_name(principal)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| classify(SERVICE, "ListAccessKeys", e))?;

            for meta in output.access_key_metadata() {
                let Some(access_key_id) = meta.access_key_id() else {
                    continue;
                };
                let status = match meta.status() {
                    Some(StatusType::Active) => AccessKeyStatus::Active,
                    _ => AccessKeyStatus::Inactive,
                };
                keys.push(AccessKeySummary {
                    access_key_id: access_key_id.to_string(),
                    status,
                });
            }

            match output.marker() {
                Some(next) if output.is_truncated() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        tracing::debug!(count = keys.len(), "Listed access keys");
        Ok(keys)
    }
}
