//! # Age-Only Circuit
//!
//! Public inputs: `target_year, limit_age`. Private: `birth_year`.
//! Constraint: `target_year - birth_year >= limit_age`.

use serde::{Deserialize, Serialize};
use zkid_core::SharedPolicy;

use super::{age_ok, Unsatisfied};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgePublicInputs {
    pub target_year: i32,
    pub limit_age: i32,
}

impl AgePublicInputs {
    pub fn from_policy(policy: &SharedPolicy) -> Self {
        Self {
            target_year: policy.target_year,
            limit_age: policy.limit_age,
        }
    }
}

#[derive(Clone, Copy)]
pub struct AgeWitness {
    pub birth_year: i32,
}

pub(crate) fn check(public: &AgePublicInputs, witness: &AgeWitness) -> Result<(), Unsatisfied> {
    if age_ok(public.target_year, public.limit_age, witness.birth_year) {
        Ok(())
    } else {
        Err(Unsatisfied::Age)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_policy() {
        let p = AgePublicInputs::from_policy(&SharedPolicy::default());
        assert_eq!(p.target_year, 2025);
        assert_eq!(p.limit_age, 20);
    }

    #[test]
    fn test_check() {
        let p = AgePublicInputs { target_year: 2025, limit_age: 20 };
        assert!(check(&p, &AgeWitness { birth_year: 2000 }).is_ok());
        assert!(check(&p, &AgeWitness { birth_year: 2005 }).is_ok());
        assert_eq!(check(&p, &AgeWitness { birth_year: 2006 }), Err(Unsatisfied::Age));
    }

    proptest::proptest! {
        #[test]
        fn threshold_is_inclusive(
            target in 1900i32..2200,
            limit in 0i32..130,
            delta in -50i32..50,
        ) {
            let p = AgePublicInputs { target_year: target, limit_age: limit };
            let birth_year = target - limit + delta;
            proptest::prop_assert_eq!(check(&p, &AgeWitness { birth_year }).is_ok(), delta <= 0);
        }
    }
}
