//! Secrets Manager as the versioned secret store

use std::collections::BTreeSet;

use async_trait::async_trait;
use aws_sdk_secretsmanager::Client;
use keyrot_core::{
    SecretId, SecretStore, SecretValue, ServiceError, ServiceErrorKind, StageLabel, VersionId,
    VersionSelector, VersionStages,
};
use secrecy::{ExposeSecret, SecretString};

use crate::error::classify;

const SERVICE: &str = "secretsmanager";

/// [`SecretStore`] backed by AWS Secrets Manager.
///
/// Stage labels map one to one onto Secrets Manager staging labels, and a
/// rotation token is used directly as the version id.
#[derive(Clone, Debug)]
pub struct SecretsManagerStore {
    client: Client,
}

impl SecretsManagerStore {
    /// Wrap a Secrets Manager client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn version_id(operation: &'static str, raw: Option<&str>) -> Result<VersionId, ServiceError> {
    let raw = raw.ok_or_else(|| {
        ServiceError::new(SERVICE, operation, ServiceErrorKind::Other, "response carried no VersionId")
    })?;
    VersionId::new(raw)
        .map_err(|e| ServiceError::new(SERVICE, operation, ServiceErrorKind::Other, e.to_string()))
}

#[async_trait]
impl SecretStore for SecretsManagerStore {
    #[tracing::instrument(skip(self), fields(service = SERVICE, secret_id = %secret_id))]
    async fn describe(&self, secret_id: &SecretId) -> Result<VersionStages, ServiceError> {
        let output = self
            .client
            .describe_secret()
            .secret_id(secret_id.as_str())
            .send()
            .await
            .map_err(|e| classify(SERVICE, "DescribeSecret", e))?;

        let mut stages = VersionStages::new();
        if let Some(map) = output.version_ids_to_stages() {
            for (version, labels) in map {
                let labels: BTreeSet<StageLabel> =
                    labels.iter().map(|label| StageLabel::from(label.as_str())).collect();
                stages.insert(version_id("DescribeSecret", Some(version))?, labels);
            }
        }

        tracing::debug!(versions = stages.len(), "Described secret");
        Ok(stages)
    }

    #[tracing::instrument(skip(self), fields(service = SERVICE, secret_id = %secret_id))]
    async fn get_value(
        &self,
        secret_id: &SecretId,
        selector: &VersionSelector,
    ) -> Result<SecretValue, ServiceError> {
        let request = self.client.get_secret_value().secret_id(secret_id.as_str());
        let request = match selector {
            VersionSelector::Stage(stage) => request.version_stage(stage.as_str()),
            VersionSelector::VersionAtStage(version, stage) => request
                .version_id(version.as_str())
                .version_stage(stage.as_str()),
        };

        let output = request
            .send()
            .await
            .map_err(|e| classify(SERVICE, "GetSecretValue", e))?;

        let payload = output.secret_string().ok_or_else(|| {
            ServiceError::new(
                SERVICE,
                "GetSecretValue",
                ServiceErrorKind::InvalidRequest,
                format!("{secret_id} holds binary data, not a string payload"),
            )
        })?;

        Ok(SecretValue {
            version_id: version_id("GetSecretValue", output.version_id())?,
            payload: SecretString::from(payload.to_owned()),
        })
    }

    #[tracing::instrument(skip(self, payload), fields(service = SERVICE, secret_id = %secret_id, token = %token))]
    async fn put_value(
        &self,
        secret_id: &SecretId,
        token: &VersionId,
        payload: &SecretString,
        stages: &[StageLabel],
    ) -> Result<(), ServiceError> {
        self.client
            .put_secret_value()
            .secret_id(secret_id.as_str())
            .client_request_token(token.as_str())
            .secret_string(payload.expose_secret())
            .set_version_stages(Some(stages.iter().map(|s| s.as_str().to_string()).collect()))
            .send()
            .await
            .map_err(|e| classify(SERVICE, "PutSecretValue", e))?;

        tracing::debug!(?stages, "Stored secret version");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(service = SERVICE, secret_id = %secret_id, stage = %stage))]
    async fn move_stage(
        &self,
        secret_id: &SecretId,
        stage: &StageLabel,
        move_to: &VersionId,
        remove_from: Option<&VersionId>,
    ) -> Result<(), ServiceError> {
        self.client
            .update_secret_version_stage()
            .secret_id(secret_id.as_str())
            .version_stage(stage.as_str())
            .move_to_version_id(move_to.as_str())
            .set_remove_from_version_id(remove_from.map(|v| v.as_str().to_string()))
            .send()
            .await
            .map_err(|e| classify(SERVICE, "UpdateSecretVersionStage", e))?;

        Ok(())
    }

    #[tracing::instrument(skip(self, payload), fields(service = SERVICE, secret_id = %secret_id))]
    async fn update_value(
        &self,
        secret_id: &SecretId,
        payload: &SecretString,
    ) -> Result<VersionId, ServiceError> {
        let output = self
            .client
            .update_secret()
            .secret_id(secret_id.as_str())
            .secret_string(payload.expose_secret())
            .send()
            .await
            .map_err(|e| classify(SERVICE, "UpdateSecret", e))?;

        version_id("UpdateSecret", output.version_id())
    }
}
