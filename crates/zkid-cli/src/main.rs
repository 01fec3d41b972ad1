//! # zkid CLI entry point
//!
//! Parses command-line arguments, loads configuration, and dispatches to
//! subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use zkid_cli::commit::{run_commit, CommitArgs};
use zkid_cli::keys::{run_keys, KeysArgs};
use zkid_cli::load_config;
use zkid_cli::migrate::{run_migrate, MigrateArgs};
use zkid_cli::policy::{run_policy, PolicyArgs};
use zkid_cli::token::{run_token, TokenArgs};

/// zkid: zero-knowledge passwordless login tooling.
///
/// Generates circuit keys, computes and migrates commitments, prints the
/// policy bundle clients sync, and issues or inspects challenge tokens.
#[derive(Parser, Debug)]
#[command(name = "zkid", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a YAML configuration file. `ZKID_*` variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Circuit key generation and fingerprints.
    Keys(KeysArgs),

    /// Compute a registration commitment.
    Commit(CommitArgs),

    /// Recompute commitments under a new KDF cost.
    Migrate(MigrateArgs),

    /// Print the policy bundle.
    Policy(PolicyArgs),

    /// Issue or inspect challenge tokens.
    Token(TokenArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e:#}");
            return ExitCode::from(2);
        }
    };
    tracing::debug!(
        params_version = %config.policy.params_version(),
        "configuration loaded"
    );

    let result = match cli.command {
        Commands::Keys(args) => run_keys(&args),
        Commands::Commit(args) => run_commit(&args, &config.policy),
        Commands::Migrate(args) => run_migrate(&args, &config.policy),
        Commands::Policy(args) => run_policy(&args, &config.policy),
        Commands::Token(args) => run_token(&args, &config.policy, config.challenge_ttl_secs),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
