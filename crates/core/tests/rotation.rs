//! End-to-end step sequences against the in-memory services.

use std::sync::Arc;

use keyrot_core::testing::{
    InMemoryAuditLedger, InMemoryIdentityDirectory, InMemoryProbe, InMemorySecretStore,
};
use keyrot_core::{
    AccessKeyCredential, AccessKeyStatus, AttemptStatus, ErrorKind, LedgerProvisioning,
    RotationConfig, RotationDispatcher, RotationError, RotationEvent, RotationStep, SecretId,
    ServiceError, ServiceErrorKind, StageLabel, VersionId,
};
use pretty_assertions::assert_eq;
use secrecy::SecretString;

const PRINCIPAL: &str = "del-admin1";

struct Harness {
    secret_id: SecretId,
    secrets: Arc<InMemorySecretStore>,
    identity: Arc<InMemoryIdentityDirectory>,
    probe: Arc<InMemoryProbe>,
    ledger: Arc<InMemoryAuditLedger>,
    dispatcher: RotationDispatcher,
}

impl Harness {
    fn new() -> Self {
        Self::with(RotationConfig::default(), InMemoryAuditLedger::new())
    }

    /// S1 with version v1 CURRENT holding key K1 of `del-admin1`
    fn with(config: RotationConfig, ledger: InMemoryAuditLedger) -> Self {
        let secret_id = SecretId::new("S1").unwrap();
        let secrets = Arc::new(InMemorySecretStore::new());
        secrets.seed(
            &secret_id,
            "v1",
            Some(&payload("K1", "k1-secret", Some(PRINCIPAL))),
            &[StageLabel::Current],
        );

        let identity = Arc::new(InMemoryIdentityDirectory::new());
        identity.seed_key(PRINCIPAL, "K1", "k1-secret", AccessKeyStatus::Active);

        let probe = Arc::new(InMemoryProbe::new(identity.clone()));
        let ledger = Arc::new(ledger);

        let dispatcher = RotationDispatcher::builder()
            .secrets(secrets.clone())
            .identity(identity.clone())
            .probe(probe.clone())
            .ledger(ledger.clone())
            .config(config)
            .build()
            .unwrap();

        Self {
            secret_id,
            secrets,
            identity,
            probe,
            ledger,
            dispatcher,
        }
    }

    async fn run(&self, token: &str, step: RotationStep) -> Result<(), RotationError> {
        self.dispatcher
            .handle(&RotationEvent::new("S1", token, step))
            .await
    }

    async fn run_all(&self, token: &str) {
        for step in RotationStep::ALL {
            self.run(token, step)
                .await
                .unwrap_or_else(|e| panic!("{step} failed: {e}"));
        }
    }

    fn key_at(&self, stage: &StageLabel) -> Option<String> {
        self.secrets.payload_at(&self.secret_id, stage).map(|raw| {
            AccessKeyCredential::from_payload(&SecretString::from(raw))
                .unwrap()
                .access_key_id
        })
    }

    fn statuses(&self) -> Vec<AttemptStatus> {
        self.ledger.attempts().iter().map(|a| a.status).collect()
    }
}

fn payload(key: &str, secret: &str, user: Option<&str>) -> String {
    serde_json::json!({
        "accessKeyId": key,
        "secretAccessKey": secret,
        "username": user,
    })
    .to_string()
}

fn version(id: &str) -> VersionId {
    VersionId::new(id).unwrap()
}

#[tokio::test]
async fn full_rotation_replaces_key() {
    let h = Harness::new();

    h.run("T1", RotationStep::CreateSecret).await.unwrap();
    let minted = h.key_at(&StageLabel::Pending).expect("pending key");
    assert_ne!(minted, "K1");
    assert_eq!(h.identity.key_ids(PRINCIPAL).len(), 2);

    h.run("T1", RotationStep::SetSecret).await.unwrap();
    h.run("T1", RotationStep::TestSecret).await.unwrap();
    assert!(h.probe.verified(&minted));

    h.run("T1", RotationStep::FinishSecret).await.unwrap();

    let stages = h.secrets.stages(&h.secret_id);
    assert!(stages.holds(&version("T1"), &StageLabel::Current));
    assert!(stages.holds(&version("v1"), &StageLabel::Previous));
    assert_eq!(h.key_at(&StageLabel::Current), Some(minted.clone()));

    assert_eq!(h.identity.status_of("K1"), None);
    assert_eq!(h.identity.status_of(&minted), Some(AccessKeyStatus::Active));
    assert_eq!(h.identity.key_ids(PRINCIPAL), vec![minted]);

    let attempts = h.ledger.attempts();
    let steps: Vec<&str> = attempts.iter().map(|a| a.step.as_str()).collect();
    assert_eq!(
        steps,
        vec!["createSecret", "setSecret", "testSecret", "finishSecret"]
    );
    assert!(attempts.iter().all(|a| a.status == AttemptStatus::Success));
    assert!(attempts.iter().all(|a| a.client_request_token == "T1"));
}

#[tokio::test]
async fn successive_rotations_keep_one_live_key() {
    let h = Harness::new();

    h.run_all("T1").await;
    h.run_all("T2").await;

    let current = h.key_at(&StageLabel::Current).unwrap();
    assert_eq!(h.identity.key_ids(PRINCIPAL), vec![current]);
    assert!(
        h.secrets
            .stages(&h.secret_id)
            .holds(&version("T1"), &StageLabel::Previous)
    );
    assert_eq!(h.ledger.attempts().len(), 8);
}

#[tokio::test]
async fn unknown_step_is_audited_and_touches_nothing() {
    let h = Harness::new();

    let err = h
        .dispatcher
        .handle(&RotationEvent {
            secret_id: "S1".into(),
            client_request_token: "T1".into(),
            step: "bogusStep".into(),
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Input);
    assert!(!err.is_retryable());
    assert_eq!(h.identity.total_calls(), 0);

    let attempts = h.ledger.attempts();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].status, AttemptStatus::Failure);
    assert_eq!(attempts[0].step, "bogusStep");
    assert_eq!(
        attempts[0].error.as_deref(),
        Some("invalid rotation step 'bogusStep'")
    );
}

#[tokio::test]
async fn create_twice_mints_once() {
    let h = Harness::new();

    h.run("T1", RotationStep::CreateSecret).await.unwrap();
    let first = h.key_at(&StageLabel::Pending);
    h.run("T1", RotationStep::CreateSecret).await.unwrap();

    assert_eq!(h.identity.call_count("create_access_key"), 1);
    assert_eq!(h.key_at(&StageLabel::Pending), first);
    assert_eq!(h.statuses(), vec![AttemptStatus::Success; 2]);
}

#[tokio::test]
async fn create_discards_key_when_store_rejects_pending() {
    let h = Harness::new();
    h.secrets.fail_next(
        "put_value",
        ServiceError::new(
            "secretsmanager",
            "PutSecretValue",
            ServiceErrorKind::Unavailable,
            "timed out",
        ),
    );

    let err = h.run("T1", RotationStep::CreateSecret).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Dependency);
    assert!(err.is_retryable());
    assert_eq!(h.identity.key_ids(PRINCIPAL), vec!["K1".to_string()]);
    assert_eq!(h.identity.call_count("delete_access_key"), 1);

    // the retry can mint again because the quota was freed
    h.run("T1", RotationStep::CreateSecret).await.unwrap();
    assert_eq!(h.identity.key_ids(PRINCIPAL).len(), 2);
}

#[tokio::test]
async fn create_falls_back_to_configured_principal() {
    let config = RotationConfig {
        principal: Some("svc-deploy".into()),
        ..Default::default()
    };
    let h = Harness::with(config, InMemoryAuditLedger::new());
    h.secrets.seed(
        &h.secret_id,
        "v2",
        Some(r#"{"note":"seeded by hand"}"#),
        &[StageLabel::Current],
    );

    h.run("T1", RotationStep::CreateSecret).await.unwrap();

    assert_eq!(h.identity.key_ids("svc-deploy").len(), 1);
    assert_eq!(h.identity.key_ids(PRINCIPAL), vec!["K1".to_string()]);
}

#[tokio::test]
async fn create_without_any_principal_fails() {
    let h = Harness::new();
    h.secrets.seed(
        &h.secret_id,
        "v2",
        Some(&payload("K1", "k1-secret", None)),
        &[StageLabel::Current],
    );

    let err = h.run("T1", RotationStep::CreateSecret).await.unwrap_err();

    assert!(matches!(err, RotationError::MissingPrincipal { .. }));
    assert_eq!(h.identity.call_count("create_access_key"), 0);
    assert_eq!(h.statuses(), vec![AttemptStatus::Failure]);
}

#[tokio::test]
async fn test_step_rejection_is_retryable() {
    let h = Harness::new();
    h.run("T1", RotationStep::CreateSecret).await.unwrap();

    // GIVEN the new key has not propagated yet
    h.probe.reject_next(1);

    // WHEN testSecret runs
    let err = h.run("T1", RotationStep::TestSecret).await.unwrap_err();

    // THEN it fails retryably and a later retry passes
    assert!(matches!(err, RotationError::ValidationFailed { .. }));
    assert!(err.is_retryable());
    h.run("T1", RotationStep::TestSecret).await.unwrap();

    assert_eq!(
        h.statuses(),
        vec![
            AttemptStatus::Success,
            AttemptStatus::Failure,
            AttemptStatus::Success
        ]
    );
}

#[tokio::test]
async fn test_step_without_pending_version_fails() {
    let h = Harness::new();

    let err = h.run("T1", RotationStep::TestSecret).await.unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn finish_twice_is_harmless() {
    let h = Harness::new();
    h.run("T1", RotationStep::CreateSecret).await.unwrap();
    h.run("T1", RotationStep::FinishSecret).await.unwrap();

    h.run("T1", RotationStep::FinishSecret).await.unwrap();

    assert_eq!(h.secrets.call_count("move_stage"), 1);
    assert_eq!(h.identity.call_count("delete_access_key"), 1);
    assert_eq!(h.identity.key_ids(PRINCIPAL).len(), 1);
    assert_eq!(h.statuses(), vec![AttemptStatus::Success; 3]);
}

#[tokio::test]
async fn finish_refuses_to_retire_the_promoted_key() {
    let h = Harness::new();
    // pending copy of the current key, e.g. seeded by hand
    h.secrets.seed(
        &h.secret_id,
        "T1",
        Some(&payload("K1", "k1-secret", Some(PRINCIPAL))),
        &[StageLabel::Pending],
    );

    let err = h.run("T1", RotationStep::FinishSecret).await.unwrap_err();

    assert!(matches!(
        err,
        RotationError::RetireCurrentKey { ref access_key_id, .. } if access_key_id == "K1"
    ));
    assert_eq!(err.kind(), ErrorKind::Consistency);
    assert_eq!(h.identity.status_of("K1"), Some(AccessKeyStatus::Active));
    assert_eq!(h.identity.call_count("update_access_key_status"), 0);
}

#[tokio::test]
async fn finish_without_previous_version_succeeds() {
    let h = Harness::new();

    // v1 is the only version and already CURRENT
    h.run("v1", RotationStep::FinishSecret).await.unwrap();

    assert_eq!(h.secrets.call_count("move_stage"), 0);
    assert_eq!(h.identity.total_calls(), 0);
    assert_eq!(h.statuses(), vec![AttemptStatus::Success]);
}

#[tokio::test]
async fn late_finish_for_superseded_token_is_refused() {
    let h = Harness::new();
    h.run_all("T1").await;
    h.run_all("T2").await;
    let live = h.key_at(&StageLabel::Current).unwrap();
    let moves = h.secrets.call_count("move_stage");
    let identity_calls = h.identity.total_calls();

    // GIVEN a re-delivered finishSecret for the rotation before the last one
    let err = h.run("T1", RotationStep::FinishSecret).await.unwrap_err();

    // THEN nothing moves and the live key is untouched
    assert!(matches!(
        err,
        RotationError::TokenNotPending { ref token, .. } if *token == version("T1")
    ));
    assert_eq!(err.kind(), ErrorKind::Consistency);
    assert!(!err.is_retryable());
    assert_eq!(h.secrets.call_count("move_stage"), moves);
    assert_eq!(h.identity.total_calls(), identity_calls);
    assert_eq!(h.identity.status_of(&live), Some(AccessKeyStatus::Active));
    assert_eq!(h.identity.key_ids(PRINCIPAL), vec![live.clone()]);

    let stages = h.secrets.stages(&h.secret_id);
    assert!(stages.holds(&version("T2"), &StageLabel::Current));
    assert!(stages.holds(&version("T1"), &StageLabel::Previous));
    assert_eq!(h.key_at(&StageLabel::Current), Some(live));
    assert_eq!(h.statuses().last(), Some(&AttemptStatus::Failure));
}

#[tokio::test]
async fn finish_for_never_created_token_is_refused() {
    let h = Harness::new();

    let err = h.run("T9", RotationStep::FinishSecret).await.unwrap_err();

    assert!(matches!(err, RotationError::TokenNotPending { .. }));
    assert_eq!(h.secrets.call_count("move_stage"), 0);
    assert_eq!(h.identity.total_calls(), 0);
    assert_eq!(h.identity.status_of("K1"), Some(AccessKeyStatus::Active));
    assert!(
        h.secrets
            .stages(&h.secret_id)
            .holds(&version("v1"), &StageLabel::Current)
    );
    assert_eq!(h.statuses(), vec![AttemptStatus::Failure]);
}

#[tokio::test]
async fn create_for_finished_token_is_refused() {
    let h = Harness::new();
    h.run_all("T1").await;

    let err = h.run("T1", RotationStep::CreateSecret).await.unwrap_err();

    assert!(matches!(err, RotationError::TokenNotPending { .. }));
    assert_eq!(h.identity.call_count("create_access_key"), 1);
    assert_eq!(h.identity.key_ids(PRINCIPAL).len(), 1);
    assert_eq!(h.secrets.call_count("put_value"), 1);
}

#[tokio::test]
async fn first_rotation_of_bootstrap_secret_retires_nothing() {
    let h = Harness::new();
    let bootstrap = SecretId::new("S3").unwrap();
    h.secrets.seed(
        &bootstrap,
        "v0",
        Some(r#"{"username":"del-admin1"}"#),
        &[StageLabel::Current],
    );

    for step in RotationStep::ALL {
        h.dispatcher
            .handle(&RotationEvent::new("S3", "T1", step))
            .await
            .unwrap();
    }

    let stages = h.secrets.stages(&bootstrap);
    assert!(stages.holds(&version("T1"), &StageLabel::Current));
    assert!(stages.holds(&version("v0"), &StageLabel::Previous));
    assert_eq!(h.identity.status_of("K1"), Some(AccessKeyStatus::Active));
    assert_eq!(h.identity.call_count("delete_access_key"), 0);
    assert_eq!(h.identity.key_ids(PRINCIPAL).len(), 2);
}

#[tokio::test]
async fn missing_current_version_is_consistency_error() {
    let h = Harness::new();
    let orphan = SecretId::new("S2").unwrap();
    h.secrets
        .seed(&orphan, "p1", Some("{}"), &[StageLabel::Pending]);

    let err = h
        .dispatcher
        .handle(&RotationEvent::new("S2", "T1", RotationStep::SetSecret))
        .await
        .unwrap_err();

    assert!(matches!(err, RotationError::NoCurrentVersion { .. }));
    assert_eq!(err.kind(), ErrorKind::Consistency);
    assert_eq!(h.ledger.attempts()[0].secret_id, orphan);
}

#[tokio::test]
async fn unknown_secret_surfaces_not_found() {
    let h = Harness::new();

    let err = h
        .dispatcher
        .handle(&RotationEvent::new("missing", "T1", RotationStep::CreateSecret))
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(h.statuses(), vec![AttemptStatus::Failure]);
}

#[tokio::test]
async fn empty_token_is_input_error() {
    let h = Harness::new();

    let err = h.run("", RotationStep::CreateSecret).await.unwrap_err();

    assert!(matches!(err, RotationError::InvalidRequest { .. }));
    assert_eq!(h.secrets.call_count("describe"), 0);
    assert_eq!(h.statuses(), vec![AttemptStatus::Failure]);
}

#[tokio::test]
async fn blank_secret_id_is_rejected_without_audit() {
    let h = Harness::new();

    let err = h
        .dispatcher
        .handle(&RotationEvent::new("", "T1", RotationStep::CreateSecret))
        .await
        .unwrap_err();

    assert!(matches!(err, RotationError::InvalidRequest { .. }));
    assert_eq!(err.kind(), ErrorKind::Input);
    assert_eq!(h.secrets.call_count("describe"), 0);
    assert!(h.ledger.attempts().is_empty());
}

#[tokio::test]
async fn ledger_outage_does_not_mask_step_result() {
    let h = Harness::new();
    let outage = || {
        ServiceError::new(
            "dynamodb",
            "PutItem",
            ServiceErrorKind::Unavailable,
            "dispatch failure",
        )
    };

    h.ledger.fail_next_append(outage());
    h.run("T1", RotationStep::SetSecret).await.unwrap();

    h.ledger.fail_next_append(outage());
    let err = h
        .dispatcher
        .handle(&RotationEvent {
            secret_id: "S1".into(),
            client_request_token: "T1".into(),
            step: "bogusStep".into(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, RotationError::InvalidStep { .. }));
    assert!(h.ledger.attempts().is_empty());
}

#[tokio::test]
async fn lazy_ledger_is_provisioned_once() {
    let config = RotationConfig {
        ledger_provisioning: LedgerProvisioning::Lazy,
        ..Default::default()
    };
    let h = Harness::with(config, InMemoryAuditLedger::without_table());

    h.run("T1", RotationStep::SetSecret).await.unwrap();
    h.run("T1", RotationStep::SetSecret).await.unwrap();

    assert_eq!(h.ledger.ensure_count(), 1);
    assert_eq!(h.ledger.attempts().len(), 2);
}

#[tokio::test]
async fn lazy_ledger_failure_stops_before_any_step() {
    let config = RotationConfig {
        ledger_provisioning: LedgerProvisioning::Lazy,
        ..Default::default()
    };
    let h = Harness::with(config, InMemoryAuditLedger::without_table());
    h.ledger.fail_next_ensure(ServiceError::new(
        "dynamodb",
        "CreateTable",
        ServiceErrorKind::AccessDenied,
        "not authorized to perform dynamodb:CreateTable",
    ));

    let err = h.run("T1", RotationStep::CreateSecret).await.unwrap_err();

    assert!(matches!(err, RotationError::LedgerUnavailable { .. }));
    assert_eq!(h.secrets.call_count("describe"), 0);
    assert_eq!(h.identity.total_calls(), 0);

    // not cached: the next invocation provisions and proceeds
    h.run("T1", RotationStep::CreateSecret).await.unwrap();
    assert_eq!(h.ledger.ensure_count(), 2);
    assert_eq!(h.ledger.attempts().len(), 1);
}

#[tokio::test]
async fn preprovisioned_ledger_is_never_checked() {
    let h = Harness::with(RotationConfig::default(), InMemoryAuditLedger::without_table());

    h.run("T1", RotationStep::SetSecret).await.unwrap();

    assert_eq!(h.ledger.ensure_count(), 0);
    assert!(h.ledger.attempts().is_empty());
}

#[test]
fn builder_requires_every_service() {
    let err = RotationDispatcher::builder()
        .secrets(Arc::new(InMemorySecretStore::new()))
        .ledger(Arc::new(InMemoryAuditLedger::new()))
        .build()
        .unwrap_err();

    assert_eq!(err.to_string(), "Missing required configuration: identity");
}
