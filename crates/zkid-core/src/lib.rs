//! # zkid-core — Foundational Types
//!
//! The leaf crate of the zkid workspace. It defines the values that client
//! and server must agree on byte-for-byte, and the machinery used to detect
//! when they don't:
//!
//! - [`SharedPolicy`]: the policy snapshot (age threshold, target year,
//!   KDF cost). The server is the source of truth; a client that disagrees
//!   must be refused.
//! - [`params_version()`]: the Policy Binder fingerprint. Any drift in any
//!   policy field changes it.
//! - [`KeyFingerprint`]: the 32-byte content hash that identifies a proving
//!   or verifying key (`pk_id` / `vk_id`).
//! - [`CanonicalBytes`]: RFC 8785 canonical JSON, the only input accepted
//!   for signing and hashing structured payloads.
//! - [`ErrorCode`]: stable operator-facing error codes shared by every crate.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `zkid-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod codes;
pub mod error;
pub mod fingerprint;
pub mod policy;
pub mod temporal;

pub use canonical::CanonicalBytes;
pub use codes::ErrorCode;
pub use error::{CanonicalizationError, CoreError};
pub use fingerprint::KeyFingerprint;
pub use policy::{params_version, KdfParams, SharedPolicy};
pub use temporal::{from_unix, unix_now};
