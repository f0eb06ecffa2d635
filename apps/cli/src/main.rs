//! `keyrot` binary
//!
//! Results go to stdout as JSON; logs go to stderr.

mod cli;
mod commands;
mod config;

use clap::Parser;
use keyrot_aws::AwsClients;
use keyrot_core::{RotationEvent, SecretId};

use crate::cli::{Cli, Command};
use crate::config::AppConfig;

/// A command with its local inputs already resolved
enum Plan {
    Handle(RotationEvent),
    ProvisionLedger,
    RotateNow(SecretId),
    PurgeInactive(SecretId),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    // Fail on bad local input before touching AWS.
    let plan = match &cli.command {
        Command::Handle(args) => Plan::Handle(commands::read_event(args)?),
        Command::ProvisionLedger => Plan::ProvisionLedger,
        Command::RotateNow(args) => Plan::RotateNow(commands::maintenance_target(args, &config)?),
        Command::PurgeInactive(args) => {
            Plan::PurgeInactive(commands::maintenance_target(args, &config)?)
        }
    };

    let _log_guard = match config.log.clone() {
        Some(log) => keyrot_log::init_with(log)?,
        None => keyrot_log::auto_init()?,
    };

    let clients = AwsClients::load(&config.aws).await?;

    match plan {
        Plan::Handle(event) => commands::handle(&clients, &config, event).await,
        Plan::ProvisionLedger => commands::provision_ledger(&clients, &config).await,
        Plan::RotateNow(secret_id) => commands::rotate_now(&clients, &config, secret_id).await,
        Plan::PurgeInactive(secret_id) => {
            commands::purge_inactive(&clients, &config, secret_id).await
        }
    }
}
