//! # zkid-crypto — Commitment Engine
//!
//! Turns a user secret into the public values a proof is checked against:
//!
//! ```text
//!   derived    = F( Argon2id(secret, salt; iterations, memory) )
//!   commitment = MiMC(derived, F(salt))
//!   binding    = MiMC(commitment, challenge)
//! ```
//!
//! `F(·)` maps big-endian bytes into the BN254 scalar field. MiMC is the
//! algebraic hash the circuit recomputes in-circuit, so every value here is
//! a field element and identical inputs always give identical outputs.
//!
//! The binding is what stops replay of an old proof against a new
//! challenge: the circuit proves `binding == MiMC(commitment, challenge)`,
//! so a proof is only ever valid for the one challenge it was built with.
//!
//! ## Modules
//!
//! - [`field`]: `FieldElement`, canonical decimal encoding.
//! - [`mimc`]: MiMC-Miyaguchi-Preneel over BN254 `Fr`.
//! - [`kdf`]: Argon2id derivation.
//! - [`salt`]: per-user salt.
//! - [`commitment`]: `derive`, `commit`, `bind`, registration helper.
//! - [`migration`]: re-commit under new KDF cost (single, verified, batch).
//!
//! ## Crate Policy
//!
//! - Depends only on `zkid-core` internally.
//! - The Argon2id output buffer and batch-entry secrets are zeroized on
//!   drop. The derived key returned by [`derive`] is a plain `Copy` field
//!   element; callers own its lifetime. Nothing secret is logged.

pub mod commitment;
pub mod error;
pub mod field;
pub mod kdf;
pub mod migration;
pub mod mimc;
pub mod salt;

pub use commitment::{bind, commit, commit_derived, create_commitment, derive, Commitment};
pub use error::CommitmentError;
pub use field::FieldElement;
pub use migration::{
    migrate, verify_and_migrate, BatchMigration, BatchMigrationReport, MigratedUser,
    MigrationConfig, MigrationEntry, MigrationFailure, MigrationOutcome,
};
pub use salt::Salt;
