//! # Keys Subcommand
//!
//! Generates proving and verifying keys for both circuits and reports key
//! fingerprints (the `pk_id` / `vk_id` used everywhere else).
//!
//! Files written by `setup`:
//!
//! | File      | Content                      |
//! |-----------|------------------------------|
//! | `user.pk` | login circuit proving key    |
//! | `user.vk` | login circuit verifying key  |
//! | `age.pk`  | age circuit proving key      |
//! | `age.vk`  | age circuit verifying key    |
//!
//! The keys come from the transparent reference backend, which a
//! production proof policy refuses.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use zkid_core::KeyFingerprint;
use zkid_zkp::{
    CircuitKind, ProofKey, ProofSystem, TransparentProofSystem, TransparentProvingKey,
    TransparentVerifyingKey,
};

#[derive(Args, Debug)]
pub struct KeysArgs {
    #[command(subcommand)]
    pub command: KeysCommand,
}

#[derive(Subcommand, Debug)]
pub enum KeysCommand {
    /// Compile both circuits and generate their keypairs.
    Setup {
        /// Output directory for the key files.
        #[arg(long, short, default_value = ".")]
        output: PathBuf,
    },

    /// Print the fingerprint and circuit of a key file.
    Fingerprint {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Debug, Serialize)]
struct KeyReport {
    kind: &'static str,
    circuit: CircuitKind,
    fingerprint: KeyFingerprint,
}

pub fn run_keys(args: &KeysArgs) -> Result<u8> {
    match &args.command {
        KeysCommand::Setup { output } => cmd_setup(output),
        KeysCommand::Fingerprint { file } => cmd_fingerprint(file),
    }
}

fn write_key(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    println!("  Written: {}", path.display());
    Ok(())
}

fn cmd_setup(output: &Path) -> Result<u8> {
    std::fs::create_dir_all(output)
        .with_context(|| format!("failed to create output directory: {}", output.display()))?;

    let system = TransparentProofSystem;
    for (kind, prefix) in [(CircuitKind::Auth, "user"), (CircuitKind::Age, "age")] {
        let compiled = system
            .compile(kind)
            .with_context(|| format!("failed to compile {kind} circuit"))?;
        let (pk, vk) = system
            .setup(&compiled)
            .with_context(|| format!("failed to set up {kind} keys"))?;
        tracing::info!(circuit = %kind, vk_id = %vk.fingerprint().short(), "keys generated");

        write_key(&output.join(format!("{prefix}.pk")), &pk.to_bytes())?;
        write_key(&output.join(format!("{prefix}.vk")), &vk.to_bytes())?;
        println!("  {kind} pk_id: {}", pk.fingerprint());
        println!("  {kind} vk_id: {}", vk.fingerprint());
    }
    println!("OK: generated keys for the auth and age circuits");
    Ok(0)
}

/// Decode a key file as either key type.
pub(crate) fn read_key(path: &Path) -> Result<(&'static str, CircuitKind, KeyFingerprint)> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read key: {}", path.display()))?;
    if let Ok(vk) = TransparentVerifyingKey::from_bytes(&bytes) {
        return Ok(("verifying", vk.circuit(), vk.fingerprint()));
    }
    if let Ok(pk) = TransparentProvingKey::from_bytes(&bytes) {
        return Ok(("proving", pk.circuit(), pk.fingerprint()));
    }
    bail!("not a zkid key file: {}", path.display())
}

fn cmd_fingerprint(file: &Path) -> Result<u8> {
    let (kind, circuit, fingerprint) = read_key(file)?;
    crate::print_json(&KeyReport {
        kind,
        circuit,
        fingerprint,
    })?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_writes_four_decodable_keys() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(cmd_setup(dir.path()).unwrap(), 0);

        let (kind, circuit, fp) = read_key(&dir.path().join("user.vk")).unwrap();
        assert_eq!((kind, circuit), ("verifying", CircuitKind::Auth));
        let bytes = std::fs::read(dir.path().join("user.vk")).unwrap();
        assert_eq!(fp, KeyFingerprint::of_bytes(&bytes));

        let (kind, circuit, _) = read_key(&dir.path().join("age.pk")).unwrap();
        assert_eq!((kind, circuit), ("proving", CircuitKind::Age));
    }

    #[test]
    fn fingerprint_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk");
        std::fs::write(&path, b"not a key").unwrap();
        assert!(read_key(&path).is_err());
    }
}
