//! # Circuit Statements
//!
//! Two statements are proven in zkid:
//!
//! - **Auth** ([`auth`]): knowledge of a derived secret behind a stored
//!   commitment, bound to one challenge, plus the age inequality.
//! - **Age** ([`age`]): the age inequality alone, for proofs that assert
//!   adulthood without authenticating an identity.
//!
//! Each statement defines its public inputs, its private witness and a
//! `check` that evaluates the constraint conjunction natively. A backend
//! uses `check` to refuse unsatisfiable witnesses before proving; the
//! constraints themselves are what a real circuit compiler would arithmetize.

pub mod age;
pub mod auth;

use serde::{Deserialize, Serialize};
use zkid_core::{CanonicalBytes, CanonicalizationError};

pub use age::{AgePublicInputs, AgeWitness};
pub use auth::{AuthPublicInputs, AuthWitness};

/// Proof version tag for the full login circuit.
pub const AUTH_PROOF_VERSION: &str = "auth-proof-v1";
/// Proof version tag for the age-only circuit.
pub const AGE_PROOF_VERSION: &str = "age-proof-v1";

/// Which statement a key, assignment or proof belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitKind {
    Auth,
    Age,
}

impl CircuitKind {
    /// Short stable name, used in key encodings.
    pub fn name(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Age => "age",
        }
    }

    /// Envelope tag for proofs over this circuit.
    pub fn proof_version(self) -> &'static str {
        match self {
            Self::Auth => AUTH_PROOF_VERSION,
            Self::Age => AGE_PROOF_VERSION,
        }
    }

    /// Inverse of [`proof_version`](Self::proof_version).
    pub fn from_proof_version(tag: &str) -> Option<Self> {
        match tag {
            AUTH_PROOF_VERSION => Some(Self::Auth),
            AGE_PROOF_VERSION => Some(Self::Age),
            _ => None,
        }
    }

    /// Textual statement of the constraint system. Compiling a circuit
    /// digests this, so any change to the statement changes every key.
    pub fn statement(self) -> &'static str {
        match self {
            Self::Auth => concat!(
                "public(commitment,binding,salt,target_year,limit_age,challenge);",
                "private(derived_secret,birth_year);",
                "mimc(derived_secret,salt)==commitment;",
                "mimc(commitment,challenge)==binding;",
                "target_year-birth_year>=limit_age"
            ),
            Self::Age => concat!(
                "public(target_year,limit_age);",
                "private(birth_year);",
                "target_year-birth_year>=limit_age"
            ),
        }
    }
}

impl std::fmt::Display for CircuitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Public assignment for either circuit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "circuit", rename_all = "snake_case")]
pub enum PublicInputs {
    Auth(AuthPublicInputs),
    Age(AgePublicInputs),
}

impl PublicInputs {
    pub fn kind(&self) -> CircuitKind {
        match self {
            Self::Auth(_) => CircuitKind::Auth,
            Self::Age(_) => CircuitKind::Age,
        }
    }

    /// Canonical encoding, the bytes a transcript commits to.
    pub fn canonical_bytes(&self) -> Result<CanonicalBytes, CanonicalizationError> {
        CanonicalBytes::new(self)
    }
}

/// Private assignment for either circuit.
#[derive(Clone)]
pub enum Witness {
    Auth(AuthWitness),
    Age(AgeWitness),
}

impl Witness {
    pub fn kind(&self) -> CircuitKind {
        match self {
            Self::Auth(_) => CircuitKind::Auth,
            Self::Age(_) => CircuitKind::Age,
        }
    }
}

impl std::fmt::Debug for Witness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Witness({}, <redacted>)", self.kind())
    }
}

/// Why a witness does not satisfy its statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unsatisfied {
    Commitment,
    Binding,
    Age,
    CircuitMismatch,
}

impl std::fmt::Display for Unsatisfied {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Commitment => "commitment constraint not satisfied",
            Self::Binding => "binding constraint not satisfied",
            Self::Age => "age constraint not satisfied",
            Self::CircuitMismatch => "public inputs and witness are for different circuits",
        })
    }
}

/// Evaluate the constraint conjunction for a full assignment.
pub fn check(public: &PublicInputs, witness: &Witness) -> Result<(), Unsatisfied> {
    match (public, witness) {
        (PublicInputs::Auth(p), Witness::Auth(w)) => auth::check(p, w),
        (PublicInputs::Age(p), Witness::Age(w)) => age::check(p, w),
        _ => Err(Unsatisfied::CircuitMismatch),
    }
}

/// Shared age inequality: `target_year - birth_year >= limit_age`.
pub(crate) fn age_ok(target_year: i32, limit_age: i32, birth_year: i32) -> bool {
    i64::from(target_year) - i64::from(birth_year) >= i64::from(limit_age)
}
