//! # Policy Subcommand
//!
//! Prints the policy bundle a client syncs before proving: the shared
//! policy, its `params_version`, and the active `vk_id`.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use zkid_auth::PolicyBundle;
use zkid_core::SharedPolicy;
use zkid_zkp::CircuitKind;

#[derive(Args, Debug)]
pub struct PolicyArgs {
    /// Verifying key of the login circuit. Without it `vk_id` is empty.
    #[arg(long)]
    pub vk: Option<PathBuf>,
}

pub fn run_policy(args: &PolicyArgs, policy: &SharedPolicy) -> Result<u8> {
    crate::print_json(&bundle(args, policy)?)?;
    Ok(0)
}

fn bundle(args: &PolicyArgs, policy: &SharedPolicy) -> Result<PolicyBundle> {
    let Some(path) = &args.vk else {
        return Ok(PolicyBundle {
            config: *policy,
            params_version: policy.params_version(),
            vk_id: String::new(),
        });
    };
    let (kind, circuit, fingerprint) = crate::keys::read_key(path)?;
    if kind != "verifying" || circuit != CircuitKind::Auth {
        bail!("{} is not a login verifying key", path.display());
    }
    Ok(PolicyBundle::for_policy(*policy, &fingerprint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkid_zkp::{ProofKey, ProofSystem, TransparentProofSystem};

    #[test]
    fn bundle_without_key() {
        let b = bundle(&PolicyArgs { vk: None }, &SharedPolicy::default()).unwrap();
        assert!(b.is_consistent());
        assert!(b.vk_id.is_empty());
    }

    #[test]
    fn bundle_carries_key_fingerprint() {
        let sys = TransparentProofSystem;
        let (pk, vk) = sys.setup(&sys.compile(CircuitKind::Auth).unwrap()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let vk_path = dir.path().join("user.vk");
        let pk_path = dir.path().join("user.pk");
        std::fs::write(&vk_path, vk.to_bytes()).unwrap();
        std::fs::write(&pk_path, pk.to_bytes()).unwrap();

        let b = bundle(&PolicyArgs { vk: Some(vk_path) }, &SharedPolicy::default()).unwrap();
        assert_eq!(b.vk_id, vk.fingerprint().to_hex());

        assert!(bundle(&PolicyArgs { vk: Some(pk_path) }, &SharedPolicy::default()).is_err());
    }
}
