//! # Field Elements
//!
//! Commitments and bindings are BN254 scalar-field elements. On the wire
//! and in storage they are canonical decimal strings: ASCII digits, no sign,
//! no leading zeros (except `"0"` itself), strictly below the field
//! modulus. Anything else is rejected rather than reduced, so one value has
//! exactly one encoding and string comparison is value comparison.

use std::str::FromStr;

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CommitmentError;

/// An element of the BN254 scalar field.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FieldElement(Fr);

impl FieldElement {
    /// The additive identity.
    pub fn zero() -> Self {
        Self(Fr::from(0u64))
    }

    /// Wrap an arkworks field element.
    pub fn from_fr(fr: Fr) -> Self {
        Self(fr)
    }

    /// The arkworks field element.
    pub fn to_fr(self) -> Fr {
        self.0
    }

    /// Interpret big-endian bytes as an integer and reduce it into the field.
    pub fn from_be_bytes_mod_order(bytes: &[u8]) -> Self {
        Self(Fr::from_be_bytes_mod_order(bytes))
    }

    /// Embed an unsigned integer.
    pub fn from_u64(v: u64) -> Self {
        Self(Fr::from(v))
    }

    /// Embed a signed integer (negative values wrap to `p - |v|`).
    pub fn from_i64(v: i64) -> Self {
        Self(Fr::from(v))
    }

    /// 32-byte big-endian encoding of the canonical representative.
    pub fn to_be_bytes(&self) -> [u8; 32] {
        let bytes = self.0.into_bigint().to_bytes_be();
        let mut out = [0u8; 32];
        out[32 - bytes.len()..].copy_from_slice(&bytes);
        out
    }

    /// Canonical decimal encoding.
    pub fn to_decimal(&self) -> String {
        self.0.into_bigint().to_string()
    }

    /// Parse a canonical decimal encoding.
    pub fn from_decimal(s: &str) -> Result<Self, CommitmentError> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CommitmentError::CommitmentParse(format!(
                "not a decimal integer: {s:?}"
            )));
        }
        let fr = Fr::from_str(s).map_err(|_| {
            CommitmentError::CommitmentParse(format!("not a field element: {s:?}"))
        })?;
        let value = Self(fr);
        if value.to_decimal() != s {
            return Err(CommitmentError::CommitmentParse(format!(
                "non-canonical field element encoding: {s:?}"
            )));
        }
        Ok(value)
    }
}

impl std::fmt::Display for FieldElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_decimal())
    }
}

impl std::fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FieldElement({})", self.to_decimal())
    }
}

impl FromStr for FieldElement {
    type Err = CommitmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_decimal(s)
    }
}

impl Serialize for FieldElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_decimal())
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_decimal(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// BN254 scalar field modulus.
    const MODULUS: &str =
        "21888242871839275222246405745257275088548364400416034343698204186575808495617";

    #[test]
    fn test_decimal_roundtrip() {
        let v = FieldElement::from_u64(4242);
        assert_eq!(v.to_decimal(), "4242");
        assert_eq!(FieldElement::from_decimal("4242").unwrap(), v);
    }

    #[test]
    fn test_zero_encodes_as_zero() {
        assert_eq!(FieldElement::zero().to_decimal(), "0");
        assert_eq!(FieldElement::from_decimal("0").unwrap(), FieldElement::zero());
    }

    #[test]
    fn test_rejects_non_canonical() {
        assert!(FieldElement::from_decimal("").is_err());
        assert!(FieldElement::from_decimal("007").is_err());
        assert!(FieldElement::from_decimal("-1").is_err());
        assert!(FieldElement::from_decimal("12a").is_err());
        assert!(FieldElement::from_decimal(" 12").is_err());
    }

    #[test]
    fn test_rejects_modulus_and_above() {
        assert!(FieldElement::from_decimal(MODULUS).is_err());
        let below = "21888242871839275222246405745257275088548364400416034343698204186575808495616";
        let v = FieldElement::from_decimal(below).unwrap();
        assert_eq!(v, FieldElement::from_i64(-1));
    }

    #[test]
    fn test_be_bytes_reduce_mod_order() {
        let all_ones = [0xffu8; 32];
        let v = FieldElement::from_be_bytes_mod_order(&all_ones);
        let reparsed = FieldElement::from_be_bytes_mod_order(&v.to_be_bytes());
        assert_eq!(v, reparsed);
    }

    #[test]
    fn test_serde_as_string() {
        let v = FieldElement::from_u64(99);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"99\"");
        let back: FieldElement = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
        assert!(serde_json::from_str::<FieldElement>("\"099\"").is_err());
    }
}
