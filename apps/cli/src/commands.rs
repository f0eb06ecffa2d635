//! Command execution

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use keyrot_aws::AwsClients;
use keyrot_core::{
    AuditLedger, KeyMaintenance, LedgerTable, RotationDispatcher, RotationEvent, SecretId,
};
use serde::Serialize;

use crate::cli::{HandleArgs, MaintenanceArgs};
use crate::config::AppConfig;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StepReport<'a> {
    secret_id: &'a str,
    client_request_token: &'a str,
    step: &'a str,
    status: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LedgerReport<'a> {
    table_name: &'a str,
    created: bool,
}

/// Read the rotation event from `--event` or the three field flags
pub fn read_event(args: &HandleArgs) -> anyhow::Result<RotationEvent> {
    if let Some(path) = &args.event {
        let raw = if path == Path::new("-") {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read event from stdin")?;
            buf
        } else {
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read event file {}", path.display()))?
        };
        return serde_json::from_str(&raw).context("event is not a valid rotation event");
    }

    match (&args.secret_id, &args.token, &args.step) {
        (Some(secret_id), Some(token), Some(step)) => Ok(RotationEvent {
            secret_id: secret_id.clone(),
            client_request_token: token.clone(),
            step: step.clone(),
        }),
        _ => bail!("either --event or all of --secret-id, --token and --step are required"),
    }
}

/// Resolve the maintenance target from the flag or `maintenance.secret_id`
pub fn maintenance_target(args: &MaintenanceArgs, config: &AppConfig) -> anyhow::Result<SecretId> {
    let raw = args
        .secret_id
        .as_deref()
        .or(config.maintenance.secret_id.as_deref())
        .context("no secret given: pass --secret-id or set maintenance.secret_id")?;
    SecretId::new(raw).context("invalid secret id")
}

pub async fn handle(
    clients: &AwsClients,
    config: &AppConfig,
    event: RotationEvent,
) -> anyhow::Result<()> {
    let dispatcher = RotationDispatcher::builder()
        .secrets(Arc::new(clients.secret_store()))
        .identity(Arc::new(clients.identity_directory()))
        .probe(Arc::new(clients.probe()))
        .ledger(Arc::new(clients.audit_ledger()))
        .config(config.rotation.clone())
        .build()?;

    dispatcher
        .handle(&event)
        .await
        .with_context(|| format!("{} failed for {}", event.step, event.secret_id))?;

    print_json(&StepReport {
        secret_id: &event.secret_id,
        client_request_token: &event.client_request_token,
        step: &event.step,
        status: "SUCCESS",
    })
}

pub async fn provision_ledger(clients: &AwsClients, config: &AppConfig) -> anyhow::Result<()> {
    let table_name = &config.aws.ledger.table_name;
    let outcome = clients
        .audit_ledger()
        .ensure_table()
        .await
        .with_context(|| format!("failed to provision ledger table {table_name}"))?;

    tracing::info!(table = %table_name, ?outcome, "Ledger table ready");
    print_json(&LedgerReport {
        table_name,
        created: outcome == LedgerTable::Created,
    })
}

pub async fn rotate_now(
    clients: &AwsClients,
    config: &AppConfig,
    secret_id: SecretId,
) -> anyhow::Result<()> {
    let report = maintenance(clients, config)
        .rotate_now(&secret_id)
        .await
        .with_context(|| format!("rotate-now failed for {secret_id}"))?;
    print_json(&report)
}

pub async fn purge_inactive(
    clients: &AwsClients,
    config: &AppConfig,
    secret_id: SecretId,
) -> anyhow::Result<()> {
    let report = maintenance(clients, config)
        .purge_inactive(&secret_id)
        .await
        .with_context(|| format!("purge-inactive failed for {secret_id}"))?;
    print_json(&report)
}

fn maintenance(clients: &AwsClients, config: &AppConfig) -> KeyMaintenance {
    KeyMaintenance::new(
        Arc::new(clients.secret_store()),
        Arc::new(clients.identity_directory()),
        config.rotation.principal.clone(),
    )
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}
