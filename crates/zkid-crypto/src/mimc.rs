//! # MiMC over BN254
//!
//! MiMC with exponent 5 and 110 rounds, used in Miyaguchi-Preneel mode as a
//! hash over field elements. Its constraint cost inside an arithmetic
//! circuit is a handful of multiplications per round, which is why the
//! commitment and binding use it instead of SHA-256.
//!
//! Round constants are derived from a fixed seed by iterated SHA-256 and
//! reduced into the field. They are computed once per process.
//!
//! ```text
//!   E_k(x) = r_110,  r_0 = x,  r_{i+1} = (r_i + k + c_i)^5,  then + k
//!   H(m_1..m_n):  h_0 = 0,  h_i = E_{h_{i-1}}(m_i) + h_{i-1} + m_i
//! ```

use std::sync::OnceLock;

use ark_bn254::Fr;
use ark_ff::{Field, PrimeField};
use sha2::{Digest, Sha256};

use crate::field::FieldElement;

/// Seed for round-constant derivation. Changing it changes every
/// commitment ever issued.
pub const MIMC_SEED: &str = "identify-sdk-mimc-seed";

/// Number of rounds of the block cipher.
pub const MIMC_ROUNDS: usize = 110;

fn round_constants() -> &'static [Fr] {
    static CONSTANTS: OnceLock<Vec<Fr>> = OnceLock::new();
    CONSTANTS.get_or_init(|| {
        let mut state: [u8; 32] = Sha256::digest(MIMC_SEED.as_bytes()).into();
        (0..MIMC_ROUNDS)
            .map(|_| {
                state = Sha256::digest(state).into();
                Fr::from_be_bytes_mod_order(&state)
            })
            .collect()
    })
}

#[inline]
fn pow5(x: Fr) -> Fr {
    let x2 = x.square();
    let x4 = x2.square();
    x4 * x
}

fn encrypt(key: Fr, msg: Fr) -> Fr {
    let mut r = msg;
    for c in round_constants() {
        r = pow5(r + key + c);
    }
    r + key
}

/// Hash a sequence of field elements.
pub fn hash(inputs: &[FieldElement]) -> FieldElement {
    let mut h = Fr::from(0u64);
    for m in inputs {
        let m = m.to_fr();
        h = encrypt(h, m) + h + m;
    }
    FieldElement::from_fr(h)
}

/// Hash exactly two field elements.
pub fn hash2(a: FieldElement, b: FieldElement) -> FieldElement {
    hash(&[a, b])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_constants_stable() {
        let a = round_constants();
        let b = round_constants();
        assert_eq!(a.len(), MIMC_ROUNDS);
        assert_eq!(a.as_ptr(), b.as_ptr());
        assert_ne!(a[0], a[1]);
    }

    #[test]
    fn test_hash_deterministic() {
        let a = FieldElement::from_u64(1);
        let b = FieldElement::from_u64(2);
        assert_eq!(hash2(a, b), hash2(a, b));
    }

    #[test]
    fn test_hash_order_sensitive() {
        let a = FieldElement::from_u64(1);
        let b = FieldElement::from_u64(2);
        assert_ne!(hash2(a, b), hash2(b, a));
    }

    #[test]
    fn test_hash_input_sensitive() {
        let a = FieldElement::from_u64(7);
        assert_ne!(hash2(a, FieldElement::from_u64(4242)), hash2(a, FieldElement::from_u64(4243)));
    }

    #[test]
    fn test_empty_input_is_zero() {
        assert_eq!(hash(&[]), FieldElement::zero());
    }

    #[test]
    fn test_length_extension_differs() {
        let a = FieldElement::from_u64(3);
        assert_ne!(hash(&[a]), hash(&[a, FieldElement::zero()]));
    }
}
