//! DynamoDB audit ledger
//!
//! One item per rotation attempt, keyed by secret and timestamp:
//!
//! | Attribute | Type | Role |
//! |---|---|---|
//! | `SecretArn` | S | hash key |
//! | `Timestamp` | S | range key, RFC 3339 UTC with microseconds |
//! | `Step` | S | step name as received |
//! | `Status` | S | `SUCCESS` or `FAILURE` |
//! | `ErrorMessage` | S | error text, `"None"` on success |
//! | `ClientRequestToken` | S | rotation token |
//!
//! Appends are conditional on the `(SecretArn, Timestamp)` key being unused, so
//! two attempts stamped in the same microsecond fail the second write instead
//! of overwriting the first.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::client::Waiters;
use aws_sdk_dynamodb::error::{BuildError, DisplayErrorContext};
use aws_sdk_dynamodb::operation::put_item::builders::PutItemFluentBuilder;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, KeySchemaElement, KeyType, ProvisionedThroughput,
    ScalarAttributeType, TableStatus,
};
use aws_sdk_dynamodb::waiters::table_exists::WaitUntilTableExistsError;
use keyrot_core::{AuditLedger, LedgerTable, RotationAttempt, ServiceError, ServiceErrorKind};

use crate::config::DynamoLedgerConfig;
use crate::error::classify;

const SERVICE: &str = "dynamodb";

/// [`AuditLedger`] writing to a DynamoDB table.
#[derive(Clone, Debug)]
pub struct DynamoAuditLedger {
    client: Client,
    config: DynamoLedgerConfig,
}

/// Item written for `attempt`
pub fn attempt_item(attempt: &RotationAttempt) -> HashMap<String, AttributeValue> {
    let s = |value: &str| AttributeValue::S(value.to_string());
    HashMap::from([
        ("SecretArn".to_string(), s(attempt.secret_id.as_str())),
        ("Timestamp".to_string(), s(&attempt.timestamp_key())),
        ("Step".to_string(), s(&attempt.step)),
        ("Status".to_string(), s(attempt.status.as_str())),
        (
            "ErrorMessage".to_string(),
            s(attempt.error.as_deref().unwrap_or("None")),
        ),
        (
            "ClientRequestToken".to_string(),
            s(&attempt.client_request_token),
        ),
    ])
}

fn build_failed(e: BuildError) -> ServiceError {
    ServiceError::new(SERVICE, "CreateTable", ServiceErrorKind::InvalidRequest, e.to_string())
}

impl DynamoAuditLedger {
    /// Ledger on `config.table_name`
    pub fn new(client: Client, config: DynamoLedgerConfig) -> Self {
        Self { client, config }
    }

    /// Table status, `None` when the table does not exist
    async fn table_status(&self) -> Result<Option<TableStatus>, ServiceError> {
        match self
            .client
            .describe_table()
            .table_name(&self.config.table_name)
            .send()
            .await
        {
            Ok(output) => Ok(output
                .table()
                .and_then(|table| table.table_status())
                .cloned()),
            Err(e) => {
                let err = classify(SERVICE, "DescribeTable", e);
                if err.is_not_found() { Ok(None) } else { Err(err) }
            }
        }
    }

    async fn create_table(&self) -> Result<(), ServiceError> {
        let key = |name: &str, key_type: KeyType| {
            KeySchemaElement::builder()
                .attribute_name(name)
                .key_type(key_type)
                .build()
                .map_err(build_failed)
        };
        let attribute = |name: &str| {
            AttributeDefinition::builder()
                .attribute_name(name)
                .attribute_type(ScalarAttributeType::S)
                .build()
                .map_err(build_failed)
        };
        let throughput = ProvisionedThroughput::builder()
            .read_capacity_units(self.config.read_capacity)
            .write_capacity_units(self.config.write_capacity)
            .build()
            .map_err(build_failed)?;

        self.client
            .create_table()
            .table_name(&self.config.table_name)
            .key_schema(key("SecretArn", KeyType::Hash)?)
            .key_schema(key("Timestamp", KeyType::Range)?)
            .attribute_definitions(attribute("SecretArn")?)
            .attribute_definitions(attribute("Timestamp")?)
            .provisioned_throughput(throughput)
            .send()
            .await
            .map_err(|e| classify(SERVICE, "CreateTable", e))?;
        Ok(())
    }

    /// Wait for ACTIVE with the SDK's `TableExists` waiter, bounded by `wait_timeout`
    async fn wait_until_active(&self) -> Result<(), ServiceError> {
        self.client
            .wait_until_table_exists()
            .table_name(&self.config.table_name)
            .wait(self.config.wait_timeout)
            .await
            .map_err(|e| match e {
                WaitUntilTableExistsError::ExceededMaxWait(_) => ServiceError::new(
                    SERVICE,
                    "DescribeTable",
                    ServiceErrorKind::Unavailable,
                    format!(
                        "table {} not active after {:?}",
                        self.config.table_name, self.config.wait_timeout
                    ),
                ),
                other => ServiceError::new(
                    SERVICE,
                    "DescribeTable",
                    ServiceErrorKind::Other,
                    DisplayErrorContext(&other).to_string(),
                ),
            })?;
        Ok(())
    }

    /// PutItem for `attempt` that refuses to overwrite an existing item
    fn append_request(&self, attempt: &RotationAttempt) -> PutItemFluentBuilder {
        self.client
            .put_item()
            .table_name(&self.config.table_name)
            .set_item(Some(attempt_item(attempt)))
            .condition_expression("attribute_not_exists(#ts)")
            .expression_attribute_names("#ts", "Timestamp")
    }
}

#[async_trait]
impl AuditLedger for DynamoAuditLedger {
    #[tracing::instrument(skip(self), fields(service = SERVICE, table = %self.config.table_name))]
    async fn ensure_table(&self) -> Result<LedgerTable, ServiceError> {
        let outcome = match self.table_status().await? {
            Some(TableStatus::Active) => return Ok(LedgerTable::Existing),
            Some(status) => {
                tracing::info!(?status, "Ledger table exists but is not active yet");
                LedgerTable::Existing
            }
            None => match self.create_table().await {
                Ok(()) => {
                    tracing::info!("Created ledger table");
                    LedgerTable::Created
                }
                // lost a race with another creator
                Err(e) if e.kind == ServiceErrorKind::AlreadyExists => LedgerTable::Existing,
                Err(e) => return Err(e),
            },
        };

        self.wait_until_active().await?;
        Ok(outcome)
    }

    #[tracing::instrument(skip(self, attempt), fields(service = SERVICE, secret_id = %attempt.secret_id))]
    async fn append(&self, attempt: &RotationAttempt) -> Result<(), ServiceError> {
        self.append_request(attempt)
            .send()
            .await
            .map_err(|e| classify(SERVICE, "PutItem", e))?;
        Ok(())
    }
}
