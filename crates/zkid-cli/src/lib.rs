//! # zkid-cli — Operator CLI
//!
//! Provides the `zkid` command-line interface.
//!
//! ## Subcommands
//!
//! - `zkid keys`: key setup for both circuits, key fingerprints.
//! - `zkid commit`: registration commitments.
//! - `zkid migrate`: KDF cost migration, single user or batch.
//! - `zkid policy`: the policy bundle and its fingerprint.
//! - `zkid token`: challenge token issuance and inspection.
//!
//! ```bash
//! zkid keys setup --output ./keys
//! zkid commit --secret "user-secret" --json
//! zkid migrate --secret "user-secret" --salt <hex> --old-commitment <decimal>
//! zkid policy --vk ./keys/user.vk
//! zkid token issue --key-file token.key --user alice --vk-id <hex>
//! ```
//!
//! Every subcommand reads the shared [`AuthConfig`] from `--config` (YAML)
//! with `ZKID_*` environment overrides on top.

pub mod commit;
pub mod keys;
pub mod migrate;
pub mod policy;
pub mod token;

use std::path::Path;

use anyhow::{Context, Result};
use zkid_auth::AuthConfig;

/// Load the configuration file if given, else defaults, then apply the
/// environment.
pub fn load_config(path: Option<&Path>) -> Result<AuthConfig> {
    let base = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            serde_yaml::from_str::<AuthConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => AuthConfig::default(),
    };
    base.overlay(|name| std::env::var(name).ok())
        .context("invalid configuration")
}

/// Print `value` as pretty JSON on stdout.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize output")?
    );
    Ok(())
}
