//! QuickUnlock operator tool
//!
//! Inspects and repairs the quick-unlock state of a data directory on a
//! desktop host: device capabilities, the resolved identifier, stored
//! preferences, and the persisted unlock lease.
//!
//! Secrets are never printed. The tool reads the OS keyring only to decide
//! availability and to delete entries on `disable`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use quickunlock_secret::{JsonFileStore, KeyringKeystore, UnsupportedBiometric};
use quickunlock_session::{
    init_logging, load_config, Collaborators, IdentitySource, Resolution, SessionConfig,
    SessionMaterial, SessionOrchestrator,
};
use serde_json::json;
use tracing::info;

/// QuickUnlock operator tool
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Directory holding the plaintext state file
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// Session config file (JSON); defaults apply when absent
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report device biometric capabilities and keyring availability
    Probe,
    /// Show the resolved identifier, availability and stored preferences
    Status(IdentityArgs),
    /// Show the persisted unlock lease and last completion time
    Lease,
    /// Remove a persisted lease left behind by a crashed process
    ClearLease,
    /// Delete the stored PIN and preferences for an identity
    Disable(IdentityArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Args, Debug, Default)]
struct IdentityArgs {
    /// Profile id of the user
    #[arg(long)]
    profile_id: Option<String>,

    /// Long-lived auth token (only its digest is used)
    #[arg(long)]
    token: Option<String>,
}

/// Identity taken from command-line flags.
struct FlagIdentity(SessionMaterial);

impl IdentitySource for FlagIdentity {
    fn current(&self) -> SessionMaterial {
        self.0.clone()
    }
}

fn build(
    data_dir: &Path,
    config: SessionConfig,
    identity: IdentityArgs,
) -> Result<SessionOrchestrator> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data dir {:?}", data_dir))?;
    let store = JsonFileStore::open_in(data_dir)
        .with_context(|| format!("Failed to open state in {:?}", data_dir))?;

    let deps = Collaborators::new(
        Arc::new(UnsupportedBiometric),
        Arc::new(KeyringKeystore::new()),
        Arc::new(store),
        Arc::new(FlagIdentity(SessionMaterial::new(
            identity.profile_id,
            identity.token,
        ))),
    );
    SessionOrchestrator::new(config, deps).context("Invalid session configuration")
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("quickunlock_cli=info,quickunlock_session=info,quickunlock_secret=warn");

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => {
            load_config(path).with_context(|| format!("Failed to load config {:?}", path))?
        }
        None => SessionConfig::default(),
    };

    match cli.command {
        Command::Config => print_json(&config)?,

        Command::Probe => {
            let session = build(&cli.data_dir, config, IdentityArgs::default())?;
            let capabilities = session.capabilities().await;
            let keyring = KeyringKeystore::new().check_availability();
            print_json(&json!({
                "capabilities": capabilities,
                "keyring": keyring,
                "minimumSecurityLevel": session.config().minimum_security_level,
            }))?;
        }

        Command::Status(identity) => {
            let session = build(&cli.data_dir, config, identity)?;
            let resolution = session.resolve_identifier();
            let preferences = match resolution.identifier() {
                Some(id) => session
                    .preference_record(id)
                    .with_context(|| format!("Failed to read preferences for {}", id))?,
                None => None,
            };
            let availability = session.check_availability().await;
            print_json(&json!({
                "identifier": resolution.identifier().map(|id| id.to_string()),
                "fromProfile": matches!(resolution, Resolution::FromProfile(_)),
                "availability": availability,
                "preferences": preferences,
                "phase": session.phase(),
            }))?;
        }

        Command::Lease => {
            let session = build(&cli.data_dir, config, IdentityArgs::default())?;
            let lease = session
                .lease()
                .inspect()
                .context("Failed to read the persisted lease")?;
            print_json(&json!({
                "lease": lease,
                "lastCompleted": session.lease().last_completed(),
                "expiryMs": session.config().lease_expiry_ms,
                "cooldownMs": session.config().cooldown_ms,
            }))?;
        }

        Command::ClearLease => {
            let session = build(&cli.data_dir, config, IdentityArgs::default())?;
            session
                .lease()
                .clear_mirror()
                .context("Failed to clear the persisted lease")?;
            info!("Persisted lease cleared");
        }

        Command::Disable(identity) => {
            let session = build(&cli.data_dir, config, identity)?;
            let resolution = session.resolve_identifier();
            session.disable().context("Failed to disable biometric unlock")?;
            match resolution.identifier() {
                Some(id) => info!("Biometric unlock disabled for {}", id),
                None => info!("No identity given; nothing to disable"),
            }
        }
    }

    Ok(())
}
