use aws_config::{BehaviorVersion, Region, SdkConfig};
use keyrot_core::{ComponentConfig, ConfigError};

use crate::config::AwsConfig;
use crate::{DynamoAuditLedger, IamDirectory, S3Probe, SecretsManagerStore};

/// SDK clients built from one shared AWS configuration.
#[derive(Clone, Debug)]
pub struct AwsClients {
    sdk_config: SdkConfig,
    secrets: aws_sdk_secretsmanager::Client,
    iam: aws_sdk_iam::Client,
    dynamodb: aws_sdk_dynamodb::Client,
    config: AwsConfig,
}

impl AwsClients {
    /// Validate `config` and resolve region and credentials.
    ///
    /// Uses the default credential chain:
    /// 1. Environment variables (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`)
    /// 2. Shared credentials file (`~/.aws/credentials`)
    /// 3. IAM role (Lambda execution role, ECS task role, EC2 instance profile)
    pub async fn load(config: &AwsConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        tracing::info!(
            region = ?sdk_config.region().map(ToString::to_string),
            endpoint = ?config.endpoint_url,
            ledger_table = %config.ledger.table_name,
            "Loaded AWS configuration"
        );

        Ok(Self {
            secrets: aws_sdk_secretsmanager::Client::new(&sdk_config),
            iam: aws_sdk_iam::Client::new(&sdk_config),
            dynamodb: aws_sdk_dynamodb::Client::new(&sdk_config),
            sdk_config,
            config: config.clone(),
        })
    }

    /// Secrets Manager adapter
    pub fn secret_store(&self) -> SecretsManagerStore {
        SecretsManagerStore::new(self.secrets.clone())
    }

    /// IAM adapter
    pub fn identity_directory(&self) -> IamDirectory {
        IamDirectory::new(self.iam.clone())
    }

    /// DynamoDB audit ledger for the configured table
    pub fn audit_ledger(&self) -> DynamoAuditLedger {
        DynamoAuditLedger::new(self.dynamodb.clone(), self.config.ledger.clone())
    }

    /// S3 probe sharing region and endpoint with the other clients
    pub fn probe(&self) -> S3Probe {
        S3Probe::new(self.sdk_config.clone())
    }
}
