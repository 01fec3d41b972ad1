//! # Login Circuit
//!
//! Public inputs: `commitment, binding, salt, target_year, limit_age,
//! challenge`. Private: `derived_secret, birth_year`. Constraints:
//!
//! ```text
//!   MiMC(derived_secret, salt)   == commitment
//!   MiMC(commitment, challenge)  == binding
//!   target_year - birth_year     >= limit_age
//! ```

use serde::{Deserialize, Serialize};
use zkid_core::SharedPolicy;
use zkid_crypto::{bind, mimc, FieldElement, Salt};

use super::{age_ok, Unsatisfied};

/// Public assignment of the login circuit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPublicInputs {
    pub commitment: FieldElement,
    pub binding: FieldElement,
    /// The salt as a field element.
    pub salt: FieldElement,
    pub target_year: i32,
    pub limit_age: i32,
    pub challenge: u64,
}

impl AuthPublicInputs {
    /// Assemble the public inputs, computing the binding from the
    /// commitment and challenge.
    pub fn new(commitment: FieldElement, salt: &Salt, challenge: u64, policy: &SharedPolicy) -> Self {
        Self {
            binding: bind(&commitment, challenge),
            commitment,
            salt: salt.to_field(),
            target_year: policy.target_year,
            limit_age: policy.limit_age,
            challenge,
        }
    }
}

/// Private assignment of the login circuit.
#[derive(Clone)]
pub struct AuthWitness {
    pub derived_secret: FieldElement,
    pub birth_year: i32,
}

pub(crate) fn check(public: &AuthPublicInputs, witness: &AuthWitness) -> Result<(), Unsatisfied> {
    if mimc::hash2(witness.derived_secret, public.salt) != public.commitment {
        return Err(Unsatisfied::Commitment);
    }
    if bind(&public.commitment, public.challenge) != public.binding {
        return Err(Unsatisfied::Binding);
    }
    if !age_ok(public.target_year, public.limit_age, witness.birth_year) {
        return Err(Unsatisfied::Age);
    }
    Ok(())
}
