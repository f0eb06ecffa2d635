//! Credential probe using S3 `ListBuckets`

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::config::Credentials;
use keyrot_core::{AccessKeyCredential, CredentialProbe, ServiceError};
use secrecy::ExposeSecret;

use crate::error::classify;

const SERVICE: &str = "s3";

/// Proves a key works by listing buckets with it.
///
/// Each probe builds a throwaway S3 client from the shared SDK config with
/// the candidate key as static credentials. Listing needs no bucket and only
/// `s3:ListAllMyBuckets`.
#[derive(Clone, Debug)]
pub struct S3Probe {
    sdk_config: SdkConfig,
}

impl S3Probe {
    /// Probe sharing region and endpoint with `sdk_config`
    pub fn new(sdk_config: SdkConfig) -> Self {
        Self { sdk_config }
    }
}

#[async_trait]
impl CredentialProbe for S3Probe {
    #[tracing::instrument(skip(self, credential), fields(service = SERVICE, access_key_id = %credential.access_key_id))]
    async fn verify(&self, credential: &AccessKeyCredential) -> Result<(), ServiceError> {
        let credentials = Credentials::new(
            credential.access_key_id.clone(),
            credential.secret_access_key.expose_secret().to_owned(),
            None,
            None,
            "keyrot-probe",
        );
        let config = aws_sdk_s3::config::Builder::from(&self.sdk_config)
            .credentials_provider(credentials)
            .build();

        let output = aws_sdk_s3::Client::from_conf(config)
            .list_buckets()
            .send()
            .await
            .map_err(|e| classify(SERVICE, "ListBuckets", e))?;

        tracing::debug!(buckets = output.buckets().len(), "Probe authenticated");
        Ok(())
    }
}
