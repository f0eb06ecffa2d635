//! # keyrot-aws
//!
//! AWS implementations of the `keyrot-core` ports:
//!
//! | Port | Adapter | Service |
//! |---|---|---|
//! | `SecretStore` | [`SecretsManagerStore`] | Secrets Manager |
//! | `IdentityDirectory` | [`IamDirectory`] | IAM |
//! | `AuditLedger` | [`DynamoAuditLedger`] | DynamoDB |
//! | `CredentialProbe` | [`S3Probe`] | S3 `ListBuckets` |
//!
//! ```rust,ignore
//! let clients = AwsClients::load(&AwsConfig::default()).await?;
//! let dispatcher = RotationDispatcher::builder()
//!     .secrets(Arc::new(clients.secret_store()))
//!     .identity(Arc::new(clients.identity_directory()))
//!     .ledger(Arc::new(clients.audit_ledger()))
//!     .probe(Arc::new(clients.probe()))
//!     .build()?;
//! ```

mod clients;
mod config;
mod error;
mod iam;
mod ledger;
mod probe;
mod secrets;

pub use clients::AwsClients;
pub use config::{AwsConfig, DynamoLedgerConfig};
pub use error::{classify, kind_for_code};
pub use iam::IamDirectory;
pub use ledger::{DynamoAuditLedger, attempt_item};
pub use probe::S3Probe;
pub use secrets::SecretsManagerStore;
