//! Command-line argument parsing

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

/// Staged IAM access-key rotation for Secrets Manager rotation steps.
#[derive(Parser, Debug)]
#[command(name = "keyrot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, env = "KEYROT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one rotation step and record it in the audit ledger
    Handle(HandleArgs),

    /// Create the audit ledger table if absent and wait until it is usable
    ProvisionLedger,

    /// Deactivate the principal's keys and store a fresh one immediately
    RotateNow(MaintenanceArgs),

    /// Delete the principal's inactive keys
    PurgeInactive(MaintenanceArgs),
}

/// Input for `handle`: an event document or the three fields as flags.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("input").required(true).args(["event", "secret_id"])))]
pub struct HandleArgs {
    /// Rotation event JSON (`{"SecretId", "ClientRequestToken", "Step"}`); `-` reads stdin
    #[arg(long, value_name = "FILE")]
    pub event: Option<PathBuf>,

    /// Secret under rotation
    #[arg(long, requires_all = ["token", "step"])]
    pub secret_id: Option<String>,

    /// Client request token of the rotation
    #[arg(long, requires = "secret_id")]
    pub token: Option<String>,

    /// Step name: createSecret, setSecret, testSecret or finishSecret
    #[arg(long, requires = "secret_id")]
    pub step: Option<String>,
}

#[derive(Args, Debug)]
pub struct MaintenanceArgs {
    /// Secret holding the principal's key; defaults to `maintenance.secret_id`
    #[arg(long)]
    pub secret_id: Option<String>,
}
