//! # Migrate Subcommand
//!
//! Recomputes commitments under a new KDF cost. With `--old-commitment` the
//! secret must first reproduce the stored value. With `--batch` a JSON array
//! of `{user_id, secret, salt, old_commitment?}` entries is migrated and a
//! report of successes and failures is printed. The exit code is 1 if any
//! entry failed.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use zeroize::Zeroizing;
use zkid_core::{KdfParams, SharedPolicy};
use zkid_crypto::{migrate, verify_and_migrate, BatchMigration, MigrationConfig, MigrationEntry};

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// The user secret (single-user mode).
    #[arg(long, required_unless_present = "batch")]
    pub secret: Option<String>,

    /// The user's salt in hex (single-user mode).
    #[arg(long, required_unless_present = "batch")]
    pub salt: Option<String>,

    /// Stored commitment (decimal) that the secret must reproduce.
    #[arg(long)]
    pub old_commitment: Option<String>,

    /// Argon2id passes of the stored commitments.
    #[arg(long, default_value_t = 1)]
    pub old_iterations: u32,

    /// Argon2id passes to migrate to.
    #[arg(long, default_value_t = 3)]
    pub new_iterations: u32,

    /// Argon2id memory in KiB, before and after.
    #[arg(long, default_value_t = 64 * 1024)]
    pub memory_kib: u32,

    /// JSON file with the users to migrate.
    #[arg(long, conflicts_with_all = ["secret", "salt", "old_commitment"])]
    pub batch: Option<PathBuf>,

    /// Emit JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

impl MigrateArgs {
    fn config(&self) -> Result<MigrationConfig> {
        let config = MigrationConfig {
            old: KdfParams {
                memory_kib: self.memory_kib,
                iterations: self.old_iterations,
            },
            new: KdfParams {
                memory_kib: self.memory_kib,
                iterations: self.new_iterations,
            },
        };
        config.old.validate().context("invalid old KDF parameters")?;
        config.new.validate().context("invalid new KDF parameters")?;
        Ok(config)
    }
}

pub fn run_migrate(args: &MigrateArgs, base: &SharedPolicy) -> Result<u8> {
    let config = args.config()?;
    match &args.batch {
        Some(path) => cmd_batch(path, config, base, args.json),
        None => cmd_single(args, config, base),
    }
}

fn cmd_single(args: &MigrateArgs, config: MigrationConfig, base: &SharedPolicy) -> Result<u8> {
    let (Some(secret), Some(salt)) = (&args.secret, &args.salt) else {
        bail!("--secret and --salt are required without --batch");
    };
    let secret = Zeroizing::new(secret.clone().into_bytes());
    let (old, new) = config.policies(base);

    let outcome = match args.old_commitment.as_deref() {
        Some(expected) => verify_and_migrate(&secret, salt, expected, &old, &new)
            .context("stored commitment not reproduced")?,
        None => migrate(&secret, salt, &old, &new).context("migration failed")?,
    };

    if args.json {
        crate::print_json(&outcome)?;
    } else {
        println!("Old commitment: {}", outcome.old_commitment);
        println!("New commitment: {}", outcome.new_commitment);
        println!("New params:     {}", new.params_version());
    }
    Ok(0)
}

fn cmd_batch(
    path: &std::path::Path,
    config: MigrationConfig,
    base: &SharedPolicy,
    json: bool,
) -> Result<u8> {
    let content = Zeroizing::new(
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read batch file: {}", path.display()))?,
    );
    let entries: Vec<MigrationEntry> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse batch file: {}", path.display()))?;

    let report = BatchMigration::new(config, base).run(&entries);
    if json {
        crate::print_json(&report)?;
    } else {
        for user in &report.successful {
            println!("  OK    {}: {}", user.user_id, user.outcome.new_commitment);
        }
        for failure in &report.failed {
            println!("  FAIL  {}: [{}] {}", failure.user_id, failure.code, failure.error);
        }
        println!(
            "Migrated {}/{} users",
            report.successful.len(),
            report.total()
        );
    }
    Ok(u8::from(!report.failed.is_empty()))
}
