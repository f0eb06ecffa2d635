//! In-memory doubles of the external systems, for tests.
//!
//! Enabled under `cfg(test)` and by the `test-util` feature. The doubles
//! keep the invariants of the real services the handlers rely on: stage
//! labels are unique per secret, moving CURRENT demotes its holder to
//! PREVIOUS, and keys are owned by one principal with at most two keys each.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};

use crate::audit::RotationAttempt;
use crate::credential::{AccessKeyCredential, AccessKeyStatus, AccessKeySummary};
use crate::error::{ServiceError, ServiceErrorKind};
use crate::id::{SecretId, VersionId};
use crate::ports::{
    AuditLedger, CredentialProbe, IdentityDirectory, LedgerTable, SecretStore, SecretValue,
    VersionSelector,
};
use crate::stage::{StageLabel, VersionStages};

/// Per-operation call counters and one-shot injected failures.
#[derive(Default)]
struct CallLog {
    counts: Mutex<HashMap<&'static str, u32>>,
    failures: Mutex<HashMap<&'static str, ServiceError>>,
}

impl CallLog {
    fn enter(&self, operation: &'static str) -> Result<(), ServiceError> {
        *self.counts.lock().entry(operation).or_default() += 1;
        self.failures.lock().remove(operation).map_or(Ok(()), Err)
    }

    fn fail_next(&self, operation: &'static str, error: ServiceError) {
        self.failures.lock().insert(operation, error);
    }

    fn count(&self, operation: &str) -> u32 {
        self.counts.lock().get(operation).copied().unwrap_or(0)
    }

    fn total(&self) -> u32 {
        self.counts.lock().values().sum()
    }
}

#[derive(Default)]
struct StoredVersion {
    payload: Option<String>,
    stages: BTreeSet<StageLabel>,
}

type Versions = BTreeMap<VersionId, StoredVersion>;

/// Versioned secret store with stage labels.
///
/// Operation names for [`fail_next`](Self::fail_next) and
/// [`call_count`](Self::call_count): `describe`, `get_value`, `put_value`,
/// `move_stage`, `update_value`.
#[derive(Default)]
pub struct InMemorySecretStore {
    secrets: Mutex<HashMap<SecretId, Versions>>,
    calls: CallLog,
}

const SM: &str = "secretsmanager";

impl InMemorySecretStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a version with `payload` and `stages`, moving the labels off
    /// any version already holding them
    pub fn seed(
        &self,
        secret_id: &SecretId,
        version: &str,
        payload: Option<&str>,
        stages: &[StageLabel],
    ) -> &Self {
        let version = VersionId::new(version).expect("valid version id");
        let mut secrets = self.secrets.lock();
        let versions = secrets.entry(secret_id.clone()).or_default();
        versions.entry(version.clone()).or_default().payload = payload.map(str::to_string);
        for stage in stages {
            attach(versions, stage, &version);
        }
        self
    }

    /// Make the next call of `operation` fail with `error`
    pub fn fail_next(&self, operation: &'static str, error: ServiceError) {
        self.calls.fail_next(operation, error);
    }

    /// How often `operation` was called
    pub fn call_count(&self, operation: &str) -> u32 {
        self.calls.count(operation)
    }

    /// Current label layout, including versions without labels
    pub fn stages(&self, secret_id: &SecretId) -> VersionStages {
        self.secrets
            .lock()
            .get(secret_id)
            .map(|versions| {
                versions
                    .iter()
                    .map(|(id, v)| (id.clone(), v.stages.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Payload of the version holding `stage`
    pub fn payload_at(&self, secret_id: &SecretId, stage: &StageLabel) -> Option<String> {
        self.secrets.lock().get(secret_id).and_then(|versions| {
            versions
                .values()
                .find(|v| v.stages.contains(stage))
                .and_then(|v| v.payload.clone())
        })
    }
}

/// Put `stage` on `target`, removing it everywhere else; CURRENT leaves
/// PREVIOUS on the version it came from
fn attach(versions: &mut Versions, stage: &StageLabel, target: &VersionId) {
    let holder = versions
        .iter()
        .find(|(id, v)| *id != target && v.stages.contains(stage))
        .map(|(id, _)| id.clone());

    if let Some(holder) = holder {
        if *stage == StageLabel::Current {
            for version in versions.values_mut() {
                version.stages.remove(&StageLabel::Previous);
            }
        }
        if let Some(old) = versions.get_mut(&holder) {
            old.stages.remove(stage);
            if *stage == StageLabel::Current {
                old.stages.insert(StageLabel::Previous);
            }
        }
    }

    versions
        .entry(target.clone())
        .or_default()
        .stages
        .insert(stage.clone());
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn describe(&self, secret_id: &SecretId) -> Result<VersionStages, ServiceError> {
        self.calls.enter("describe")?;
        let secrets = self.secrets.lock();
        let versions = secrets
            .get(secret_id)
            .ok_or_else(|| ServiceError::not_found(SM, "DescribeSecret", secret_id.as_str()))?;

        Ok(versions
            .iter()
            .filter(|(_, v)| !v.stages.is_empty())
            .map(|(id, v)| (id.clone(), v.stages.clone()))
            .collect())
    }

    async fn get_value(
        &self,
        secret_id: &SecretId,
        selector: &VersionSelector,
    ) -> Result<SecretValue, ServiceError> {
        self.calls.enter("get_value")?;
        let secrets = self.secrets.lock();
        let versions = secrets
            .get(secret_id)
            .ok_or_else(|| ServiceError::not_found(SM, "GetSecretValue", secret_id.as_str()))?;

        let found = match selector {
            VersionSelector::Stage(stage) => {
                versions.iter().find(|(_, v)| v.stages.contains(stage))
            }
            VersionSelector::VersionAtStage(id, stage) => versions
                .get_key_value(id)
                .filter(|(_, v)| v.stages.contains(stage)),
        };

        found
            .and_then(|(id, v)| {
                v.payload.as_ref().map(|payload| SecretValue {
                    version_id: id.clone(),
                    payload: SecretString::from(payload.clone()),
                })
            })
            .ok_or_else(|| {
                ServiceError::not_found(
                    SM,
                    "GetSecretValue",
                    format!("{secret_id}: no value for {selector:?}"),
                )
            })
    }

    async fn put_value(
        &self,
        secret_id: &SecretId,
        token: &VersionId,
        payload: &SecretString,
        stages: &[StageLabel],
    ) -> Result<(), ServiceError> {
        self.calls.enter("put_value")?;
        let mut secrets = self.secrets.lock();
        let versions = secrets
            .get_mut(secret_id)
            .ok_or_else(|| ServiceError::not_found(SM, "PutSecretValue", secret_id.as_str()))?;

        let incoming = payload.expose_secret();
        match versions.get(token).and_then(|v| v.payload.as_deref()) {
            Some(existing) if existing == incoming => return Ok(()),
            Some(_) => {
                return Err(ServiceError::new(
                    SM,
                    "PutSecretValue",
                    ServiceErrorKind::AlreadyExists,
                    format!("version {token} already holds a different value"),
                ));
            }
            None => {}
        }

        versions.entry(token.clone()).or_default().payload = Some(incoming.to_string());
        for stage in stages {
            attach(versions, stage, token);
        }
        Ok(())
    }

    async fn move_stage(
        &self,
        secret_id: &SecretId,
        stage: &StageLabel,
        move_to: &VersionId,
        remove_from: Option<&VersionId>,
    ) -> Result<(), ServiceError> {
        self.calls.enter("move_stage")?;
        let invalid = |message: String| {
            ServiceError::new(
                SM,
                "UpdateSecretVersionStage",
                ServiceErrorKind::InvalidRequest,
                message,
            )
        };

        let mut secrets = self.secrets.lock();
        let versions = secrets.get_mut(secret_id).ok_or_else(|| {
            ServiceError::not_found(SM, "UpdateSecretVersionStage", secret_id.as_str())
        })?;
        if !versions.contains_key(move_to) {
            return Err(ServiceError::not_found(
                SM,
                "UpdateSecretVersionStage",
                format!("version {move_to}"),
            ));
        }

        let holder = versions
            .iter()
            .find(|(_, v)| v.stages.contains(stage))
            .map(|(id, _)| id.clone());
        match (&holder, remove_from) {
            (Some(holder), _) if holder == move_to => return Ok(()),
            (Some(holder), Some(from)) if holder != from => {
                return Err(invalid(format!("{stage} is attached to {holder}, not {from}")));
            }
            (Some(holder), None) => {
                return Err(invalid(format!(
                    "{stage} is attached to {holder}; RemoveFromVersionId is required"
                )));
            }
            (None, Some(from)) => {
                return Err(invalid(format!("{stage} is not attached to {from}")));
            }
            _ => {}
        }

        attach(versions, stage, move_to);
        Ok(())
    }

    async fn update_value(
        &self,
        secret_id: &SecretId,
        payload: &SecretString,
    ) -> Result<VersionId, ServiceError> {
        self.calls.enter("update_value")?;
        let mut secrets = self.secrets.lock();
        let versions = secrets
            .get_mut(secret_id)
            .ok_or_else(|| ServiceError::not_found(SM, "UpdateSecret", secret_id.as_str()))?;

        let version = VersionId::new(uuid::Uuid::new_v4().to_string())
            .map_err(|e| ServiceError::new(SM, "UpdateSecret", ServiceErrorKind::Other, e.to_string()))?;
        versions.entry(version.clone()).or_default().payload =
            Some(payload.expose_secret().to_string());
        attach(versions, &StageLabel::Current, &version);
        Ok(version)
    }
}

struct StoredKey {
    principal: String,
    secret: String,
    status: AccessKeyStatus,
}

/// Identity directory holding access keys per principal.
///
/// Operation names: `create_access_key`, `update_access_key_status`,
/// `delete_access_key`, `list_access_keys`.
pub struct InMemoryIdentityDirectory {
    keys: Mutex<BTreeMap<String, StoredKey>>,
    max_keys: usize,
    calls: CallLog,
}

const IAM: &str = "iam";

impl Default for InMemoryIdentityDirectory {
    fn default() -> Self {
        Self {
            keys: Mutex::new(BTreeMap::new()),
            max_keys: 2,
            calls: CallLog::default(),
        }
    }
}

impl InMemoryIdentityDirectory {
    /// Empty directory with the two-keys-per-principal quota
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an existing key
    pub fn seed_key(&self, principal: &str, access_key_id: &str, secret: &str, status: AccessKeyStatus) {
        self.keys.lock().insert(
            access_key_id.to_string(),
            StoredKey {
                principal: principal.to_string(),
                secret: secret.to_string(),
                status,
            },
        );
    }

    /// Make the next call of `operation` fail with `error`
    pub fn fail_next(&self, operation: &'static str, error: ServiceError) {
        self.calls.fail_next(operation, error);
    }

    /// How often `operation` was called
    pub fn call_count(&self, operation: &str) -> u32 {
        self.calls.count(operation)
    }

    /// Calls across all operations
    pub fn total_calls(&self) -> u32 {
        self.calls.total()
    }

    /// Status of a key, `None` once deleted
    pub fn status_of(&self, access_key_id: &str) -> Option<AccessKeyStatus> {
        self.keys.lock().get(access_key_id).map(|k| k.status)
    }

    /// Ids of every key `principal` owns
    pub fn key_ids(&self, principal: &str) -> Vec<String> {
        self.keys
            .lock()
            .iter()
            .filter(|(_, k)| k.principal == principal)
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn accepts(&self, credential: &AccessKeyCredential) -> bool {
        self.keys.lock().get(&credential.access_key_id).is_some_and(|k| {
            k.status == AccessKeyStatus::Active
                && k.secret == credential.secret_access_key.expose_secret()
        })
    }

    fn owned_key<'a>(
        keys: &'a mut BTreeMap<String, StoredKey>,
        principal: &str,
        access_key_id: &str,
        operation: &'static str,
    ) -> Result<&'a mut StoredKey, ServiceError> {
        keys.get_mut(access_key_id)
            .filter(|k| k.principal == principal)
            .ok_or_else(|| {
                ServiceError::not_found(
                    IAM,
                    operation,
                    format!("The Access Key with id {access_key_id} cannot be found."),
                )
            })
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryIdentityDirectory {
    async fn create_access_key(&self, principal: &str) -> Result<AccessKeyCredential, ServiceError> {
        self.calls.enter("create_access_key")?;
        let mut keys = self.keys.lock();
        if keys.values().filter(|k| k.principal == principal).count() >= self.max_keys {
            return Err(ServiceError::new(
                IAM,
                "CreateAccessKey",
                ServiceErrorKind::LimitExceeded,
                format!("Cannot exceed quota for AccessKeysPerUser: {}", self.max_keys),
            ));
        }

        let simple = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
        let access_key_id = format!("AKIA{}", &simple[..16]);
        let secret = uuid::Uuid::new_v4().simple().to_string();
        keys.insert(
            access_key_id.clone(),
            StoredKey {
                principal: principal.to_string(),
                secret: secret.clone(),
                status: AccessKeyStatus::Active,
            },
        );

        Ok(AccessKeyCredential::new(access_key_id, secret, principal))
    }

    async fn update_access_key_status(
        &self,
        principal: &str,
        access_key_id: &str,
        status: AccessKeyStatus,
    ) -> Result<(), ServiceError> {
        self.calls.enter("update_access_key_status")?;
        let mut keys = self.keys.lock();
        Self::owned_key(&mut keys, principal, access_key_id, "UpdateAccessKey")?.status = status;
        Ok(())
    }

    async fn delete_access_key(&self, principal: &str, access_key_id: &str) -> Result<(), ServiceError> {
        self.calls.enter("delete_access_key")?;
        let mut keys = self.keys.lock();
        Self::owned_key(&mut keys, principal, access_key_id, "DeleteAccessKey")?;
        keys.remove(access_key_id);
        Ok(())
    }

    async fn list_access_keys(&self, principal: &str) -> Result<Vec<AccessKeySummary>, ServiceError> {
        self.calls.enter("list_access_keys")?;
        Ok(self
            .keys
            .lock()
            .iter()
            .filter(|(_, k)| k.principal == principal)
            .map(|(id, k)| AccessKeySummary {
                access_key_id: id.clone(),
                status: k.status,
            })
            .collect())
    }
}

/// Audit ledger backed by a vector.
pub struct InMemoryAuditLedger {
    attempts: Mutex<Vec<RotationAttempt>>,
    table_exists: Mutex<bool>,
    ensure_count: AtomicU32,
    calls: CallLog,
}

impl Default for InMemoryAuditLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAuditLedger {
    /// Ledger whose table already exists
    pub fn new() -> Self {
        Self {
            attempts: Mutex::new(Vec::new()),
            table_exists: Mutex::new(true),
            ensure_count: AtomicU32::new(0),
            calls: CallLog::default(),
        }
    }

    /// Ledger whose table has not been created yet; appends fail until
    /// [`AuditLedger::ensure_table`] runs
    pub fn without_table() -> Self {
        let ledger = Self::new();
        *ledger.table_exists.lock() = false;
        ledger
    }

    /// Make the next append fail
    pub fn fail_next_append(&self, error: ServiceError) {
        self.calls.fail_next("append", error);
    }

    /// Make the next table check fail
    pub fn fail_next_ensure(&self, error: ServiceError) {
        self.calls.fail_next("ensure_table", error);
    }

    /// Recorded attempts, oldest first
    pub fn attempts(&self) -> Vec<RotationAttempt> {
        self.attempts.lock().clone()
    }

    /// How often the table was checked
    pub fn ensure_count(&self) -> u32 {
        self.ensure_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuditLedger for InMemoryAuditLedger {
    async fn ensure_table(&self) -> Result<LedgerTable, ServiceError> {
        self.ensure_count.fetch_add(1, Ordering::SeqCst);
        self.calls.enter("ensure_table")?;

        let mut exists = self.table_exists.lock();
        if *exists {
            Ok(LedgerTable::Existing)
        } else {
            *exists = true;
            Ok(LedgerTable::Created)
        }
    }

    async fn append(&self, attempt: &RotationAttempt) -> Result<(), ServiceError> {
        self.calls.enter("append")?;
        if !*self.table_exists.lock() {
            return Err(ServiceError::not_found(
                "dynamodb",
                "PutItem",
                "Requested resource not found",
            ));
        }
        self.attempts.lock().push(attempt.clone());
        Ok(())
    }
}

/// Probe that accepts exactly the active keys of an identity directory.
pub struct InMemoryProbe {
    directory: Arc<InMemoryIdentityDirectory>,
    rejections: Mutex<u32>,
    verified: Mutex<HashSet<String>>,
}

impl InMemoryProbe {
    /// Probe against `directory`
    pub fn new(directory: Arc<InMemoryIdentityDirectory>) -> Self {
        Self {
            directory,
            rejections: Mutex::new(0),
            verified: Mutex::new(HashSet::new()),
        }
    }

    /// Reject the next `count` probes as if the key had not propagated yet
    pub fn reject_next(&self, count: u32) {
        *self.rejections.lock() = count;
    }

    /// Whether a probe with `access_key_id` has succeeded
    pub fn verified(&self, access_key_id: &str) -> bool {
        self.verified.lock().contains(access_key_id)
    }
}

#[async_trait]
impl CredentialProbe for InMemoryProbe {
    async fn verify(&self, credential: &AccessKeyCredential) -> Result<(), ServiceError> {
        let denied = |message: &str| {
            ServiceError::new("s3", "ListBuckets", ServiceErrorKind::AccessDenied, message)
        };

        {
            let mut rejections = self.rejections.lock();
            if *rejections > 0 {
                *rejections -= 1;
                return Err(denied("The AWS Access Key Id you provided does not exist in our records."));
            }
        }

        if !self.directory.accepts(credential) {
            return Err(denied("The request signature we calculated does not match the signature you provided."));
        }

        self.verified.lock().insert(credential.access_key_id.clone());
        Ok(())
    }
}
