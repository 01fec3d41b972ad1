//! # Token Subcommand
//!
//! Issues and inspects challenge tokens with an HMAC key supplied as hex,
//! either inline or from a file. Tokens issued here carry the configured
//! policy's `params_version`.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use zeroize::Zeroizing;
use zkid_auth::token::{issue, parse, random_challenge, validate};
use zkid_auth::{ChallengeTokenClaims, TokenKey};
use zkid_core::{unix_now, SharedPolicy};

#[derive(Args, Debug)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub command: TokenCommand,
}

#[derive(Args, Debug, Clone)]
pub struct KeySource {
    /// HMAC key as hex (at least 16 bytes).
    #[arg(long, conflicts_with = "key_file")]
    pub key_hex: Option<String>,

    /// File holding the HMAC key as hex.
    #[arg(long)]
    pub key_file: Option<PathBuf>,
}

impl KeySource {
    fn load(&self) -> Result<TokenKey> {
        let hex = match (&self.key_hex, &self.key_file) {
            (Some(hex), _) => Zeroizing::new(hex.clone()),
            (None, Some(path)) => Zeroizing::new(
                std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read key file: {}", path.display()))?,
            ),
            (None, None) => bail!("one of --key-hex or --key-file is required"),
        };
        TokenKey::from_hex(&hex).context("invalid token key")
    }
}

#[derive(Subcommand, Debug)]
pub enum TokenCommand {
    /// Sign a challenge token.
    Issue {
        #[command(flatten)]
        key: KeySource,

        #[arg(long)]
        user: String,

        /// Verifying key fingerprint to bind the token to.
        #[arg(long, default_value = "")]
        vk_id: String,

        /// Challenge value. Random when omitted.
        #[arg(long)]
        challenge: Option<u64>,

        /// Lifetime in seconds. Defaults to the configured challenge TTL.
        #[arg(long)]
        ttl: Option<u64>,

        /// Key identifier written into the token.
        #[arg(long)]
        kid: Option<String>,

        /// Issue time as unix seconds. Defaults to now.
        #[arg(long)]
        now: Option<i64>,
    },

    /// Verify a token's signature and print its claims and status.
    Inspect {
        #[command(flatten)]
        key: KeySource,

        #[arg(value_name = "TOKEN")]
        token: String,

        /// Evaluation time as unix seconds. Defaults to now.
        #[arg(long)]
        now: Option<i64>,
    },
}

#[derive(Debug, Serialize)]
struct Inspection {
    claims: ChallengeTokenClaims,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn run_token(args: &TokenArgs, policy: &SharedPolicy, default_ttl: u64) -> Result<u8> {
    match &args.command {
        TokenCommand::Issue {
            key,
            user,
            vk_id,
            challenge,
            ttl,
            kid,
            now,
        } => {
            let token = cmd_issue(
                &key.load()?,
                policy,
                user,
                vk_id,
                *challenge,
                ttl.unwrap_or(default_ttl),
                kid.as_deref(),
                now.unwrap_or_else(unix_now),
            )?;
            println!("{token}");
            Ok(0)
        }
        TokenCommand::Inspect { key, token, now } => {
            let report = cmd_inspect(&key.load()?, policy, token, now.unwrap_or_else(unix_now))?;
            crate::print_json(&report)?;
            Ok(u8::from(!report.valid))
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_issue(
    key: &TokenKey,
    policy: &SharedPolicy,
    user: &str,
    vk_id: &str,
    challenge: Option<u64>,
    ttl: u64,
    kid: Option<&str>,
    now: i64,
) -> Result<String> {
    if ttl == 0 {
        bail!("--ttl must be positive");
    }
    let ttl = i64::try_from(ttl).context("--ttl out of range")?;
    let expires_at = now.checked_add(ttl).context("--ttl out of range")?;
    let challenge = challenge.unwrap_or_else(random_challenge);

    let claims = ChallengeTokenClaims::new(user, challenge, expires_at)
        .with_vk_id(vk_id)
        .with_params_version(policy.params_version());
    issue(claims, key, kid).context("token issuance failed")
}

fn cmd_inspect(key: &TokenKey, policy: &SharedPolicy, token: &str, now: i64) -> Result<Inspection> {
    let claims = parse(token, key).context("token rejected")?;
    let status = validate(token, key, now, "", &policy.params_version());
    Ok(Inspection {
        claims,
        valid: status.is_ok(),
        error: status.err().map(|e| e.to_string()),
    })
}
