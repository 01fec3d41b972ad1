//! # Commitment Migration
//!
//! Raising the KDF cost changes every commitment. Migration recomputes a
//! user's commitment under the new cost with the same salt, at the next
//! login when the server briefly holds the secret.
//!
//! [`verify_and_migrate`] refuses to produce a new commitment unless the
//! presented secret reproduces the stored one. [`BatchMigration`] runs many
//! users and partitions the results; one bad entry never stops the rest.

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;
use zkid_core::{KdfParams, SharedPolicy};

use crate::commitment::commit_with_salt;
use crate::error::CommitmentError;
use crate::field::FieldElement;
use crate::salt::Salt;

/// Old and new KDF cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationConfig {
    pub old: KdfParams,
    pub new: KdfParams,
}

impl MigrationConfig {
    /// Migration between the KDF halves of two policies.
    pub fn between(old: &SharedPolicy, new: &SharedPolicy) -> Self {
        Self {
            old: old.kdf(),
            new: new.kdf(),
        }
    }

    /// Old and new policies, keeping the age fields of `base`.
    pub fn policies(&self, base: &SharedPolicy) -> (SharedPolicy, SharedPolicy) {
        (base.with_kdf(self.old), base.with_kdf(self.new))
    }
}

impl Default for MigrationConfig {
    /// v1 (64 MiB, 1 pass) to v2 (64 MiB, 3 passes).
    fn default() -> Self {
        Self {
            old: KdfParams {
                memory_kib: 64 * 1024,
                iterations: 1,
            },
            new: KdfParams {
                memory_kib: 64 * 1024,
                iterations: 3,
            },
        }
    }
}

/// Commitments before and after migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationOutcome {
    pub old_commitment: FieldElement,
    pub new_commitment: FieldElement,
}

/// Recompute the commitment under `new` with the same salt.
pub fn migrate(
    secret: &[u8],
    salt_hex: &str,
    old: &SharedPolicy,
    new: &SharedPolicy,
) -> Result<MigrationOutcome, CommitmentError> {
    let salt = Salt::from_hex(salt_hex)?;
    Ok(MigrationOutcome {
        old_commitment: commit_with_salt(secret, &salt, old)?,
        new_commitment: commit_with_salt(secret, &salt, new)?,
    })
}

/// Migrate only if `secret` reproduces `expected_old` under `old`.
pub fn verify_and_migrate(
    secret: &[u8],
    salt_hex: &str,
    expected_old: &str,
    old: &SharedPolicy,
    new: &SharedPolicy,
) -> Result<MigrationOutcome, CommitmentError> {
    let expected = FieldElement::from_decimal(expected_old)?;
    let salt = Salt::from_hex(salt_hex)?;
    let old_commitment = commit_with_salt(secret, &salt, old)?;

    let matches: bool = old_commitment
        .to_be_bytes()
        .ct_eq(&expected.to_be_bytes())
        .into();
    if !matches {
        return Err(CommitmentError::CommitmentMismatch);
    }

    Ok(MigrationOutcome {
        old_commitment,
        new_commitment: commit_with_salt(secret, &salt, new)?,
    })
}

/// One user in a batch.
#[derive(Clone, Serialize, Deserialize)]
pub struct MigrationEntry {
    pub user_id: String,
    pub secret: Zeroizing<String>,
    pub salt: String,
    /// Stored commitment. `None` migrates without verification.
    #[serde(default)]
    pub old_commitment: Option<String>,
}

impl std::fmt::Debug for MigrationEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationEntry")
            .field("user_id", &self.user_id)
            .field("secret", &"<redacted>")
            .field("salt", &self.salt)
            .field("old_commitment", &self.old_commitment)
            .finish()
    }
}

/// A migrated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigratedUser {
    pub user_id: String,
    #[serde(flatten)]
    pub outcome: MigrationOutcome,
}

/// A user whose migration failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationFailure {
    pub user_id: String,
    pub code: String,
    pub error: String,
}

/// Partitioned batch results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMigrationReport {
    pub successful: Vec<MigratedUser>,
    pub failed: Vec<MigrationFailure>,
}

impl BatchMigrationReport {
    pub fn total(&self) -> usize {
        self.successful.len() + self.failed.len()
    }
}

/// Batch migration over a base policy.
#[derive(Debug, Clone)]
pub struct BatchMigration {
    old: SharedPolicy,
    new: SharedPolicy,
}

impl BatchMigration {
    pub fn new(config: MigrationConfig, base: &SharedPolicy) -> Self {
        let (old, new) = config.policies(base);
        Self { old, new }
    }

    pub fn run(&self, entries: &[MigrationEntry]) -> BatchMigrationReport {
        let mut report = BatchMigrationReport::default();
        for entry in entries {
            let result = match entry.old_commitment.as_deref() {
                Some(expected) if !expected.is_empty() => verify_and_migrate(
                    entry.secret.as_bytes(),
                    &entry.salt,
                    expected,
                    &self.old,
                    &self.new,
                ),
                _ => migrate(entry.secret.as_bytes(), &entry.salt, &self.old, &self.new),
            };
            match result {
                Ok(outcome) => report.successful.push(MigratedUser {
                    user_id: entry.user_id.clone(),
                    outcome,
                }),
                Err(e) => {
                    tracing::warn!(user_id = %entry.user_id, code = %e.code(), "commitment migration failed");
                    report.failed.push(MigrationFailure {
                        user_id: entry.user_id.clone(),
                        code: e.code().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
        tracing::info!(
            migrated = report.successful.len(),
            failed = report.failed.len(),
            "batch migration complete"
        );
        report
    }
}
