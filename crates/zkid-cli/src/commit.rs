//! # Commit Subcommand
//!
//! Computes a registration commitment for a secret under the configured
//! policy. Without `--salt` a fresh salt is drawn, which is what a client
//! does at registration.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use zeroize::Zeroizing;
use zkid_core::SharedPolicy;
use zkid_crypto::{commit, create_commitment, Commitment, Salt};

#[derive(Args, Debug)]
pub struct CommitArgs {
    /// The user secret.
    #[arg(long)]
    pub secret: String,

    /// Salt as 64 hex characters. Generated when omitted.
    #[arg(long)]
    pub salt: Option<String>,

    /// Emit JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct CommitReport<'a> {
    commitment: &'a Commitment,
    params_version: String,
}

pub fn run_commit(args: &CommitArgs, policy: &SharedPolicy) -> Result<u8> {
    let secret = Zeroizing::new(args.secret.clone().into_bytes());
    let commitment = compute(&secret, args.salt.as_deref(), policy)?;

    if args.json {
        crate::print_json(&CommitReport {
            commitment: &commitment,
            params_version: policy.params_version(),
        })?;
    } else {
        println!("Commitment: {}", commitment.value);
        println!("Salt:       {}", commitment.salt);
        println!("Params:     {}", policy.params_version());
    }
    Ok(0)
}

fn compute(secret: &[u8], salt: Option<&str>, policy: &SharedPolicy) -> Result<Commitment> {
    match salt {
        Some(salt_hex) => {
            let salt = Salt::from_hex(salt_hex).context("invalid --salt")?;
            let value = commit(secret, salt_hex, policy).context("commitment failed")?;
            Ok(Commitment { value, salt })
        }
        None => create_commitment(secret, policy).context("commitment failed"),
    }
}
