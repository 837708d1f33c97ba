//! `ballot` - command line front end to a ballot ledger.
//!
//! Every command prints one JSON document on stdout. The exit code is
//! non-zero when a login or vote is rejected or the command fails.

use ballotchain::config::{BallotConfig, ConfigError, SeedConfig};
use ballotchain::logging::{init_logging, LogFormat};
use ballotchain::registry::AuthResult;
use ballotchain::service::{BallotService, ServiceError};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "ballot", about = "Hash-linked vote ledger")]
struct Cli {
    /// Database directory.
    #[arg(long, default_value = "ballotchain.db", env = "BALLOT_DB")]
    db: PathBuf,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, default_value = "warn", env = "BALLOT_LOG_LEVEL")]
    log_level: String,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Human)]
    log_format: LogFormat,

    /// Skip the chain audit at startup.
    #[arg(long)]
    no_verify: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the genesis block, voters and candidates that do not exist yet.
    Init {
        /// Seed roster JSON; the built-in roster is used when omitted.
        #[arg(long, env = "BALLOT_SEED")]
        seed: Option<PathBuf>,
    },
    /// Check a voter's credentials.
    Login { usercode: String, passcode: String },
    /// List candidate names.
    Candidates,
    /// Cast a vote.
    Vote {
        usercode: String,
        passcode: String,
        candidate: String,
    },
    /// Print the full chain.
    Chain,
    /// Recompute every hash and link.
    Verify,
    /// Clear an integrity halt after the chain has been repaired.
    Reconcile,
    /// Print storage statistics.
    Stats,
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

fn print<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run one command; `Ok(false)` means the request was rejected
async fn run(cli: Cli) -> Result<bool, CliError> {
    let config = BallotConfig::new()
        .with_db_path(cli.db)
        .with_verify_on_open(!cli.no_verify);
    let service = BallotService::open(config)?;

    match cli.command {
        Command::Init { seed } => {
            let roster = match seed {
                Some(path) => SeedConfig::load(path)?,
                None => SeedConfig::default(),
            };
            print(&service.seed(roster).await?)?;
            Ok(true)
        }
        Command::Login { usercode, passcode } => {
            let result = service.login(&usercode, &passcode).await?;
            print(&json!({ "result": result }))?;
            Ok(result == AuthResult::Ok)
        }
        Command::Candidates => {
            print(&service.list_candidates().await?)?;
            Ok(true)
        }
        Command::Vote {
            usercode,
            passcode,
            candidate,
        } => {
            let outcome = service.cast_vote(&usercode, &passcode, &candidate).await?;
            print(&outcome)?;
            Ok(outcome.is_committed())
        }
        Command::Chain => {
            print(&service.get_chain().await?)?;
            Ok(true)
        }
        Command::Verify => {
            print(&service.verify_chain().await?)?;
            Ok(true)
        }
        Command::Reconcile => {
            print(&service.reconcile().await?)?;
            Ok(true)
        }
        Command::Stats => {
            print(&service.stats().await?)?;
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format, &cli.log_level);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            println!("{}", json!({ "error": e.to_string() }));
            ExitCode::from(2)
        }
    }
}
