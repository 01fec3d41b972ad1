//! # Salt
//!
//! A per-user random value, stored next to the commitment and presented as
//! a public input to every proof. Fresh salts are 32 random bytes; stored
//! salts are accepted as any even-length hex string of at least 8 bytes
//! (the Argon2 minimum).

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CommitmentError;
use crate::field::FieldElement;

/// Length of freshly generated salts in bytes.
pub const SALT_LEN: usize = 32;

/// Argon2's minimum salt length in bytes.
pub const MIN_SALT_LEN: usize = 8;

/// Per-user salt bytes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Salt(Vec<u8>);

impl Salt {
    /// Generate a fresh random salt from the OS RNG.
    pub fn generate() -> Self {
        let mut buf = vec![0u8; SALT_LEN];
        OsRng.fill_bytes(&mut buf);
        Self(buf)
    }

    /// Decode a hex salt.
    pub fn from_hex(s: &str) -> Result<Self, CommitmentError> {
        let bytes = hex::decode(s.trim()).map_err(|e| CommitmentError::SaltDecode(e.to_string()))?;
        if bytes.len() < MIN_SALT_LEN {
            return Err(CommitmentError::SaltDecode(format!(
                "salt must be at least {MIN_SALT_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Raw salt bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The salt as the circuit sees it.
    pub fn to_field(&self) -> FieldElement {
        FieldElement::from_be_bytes_mod_order(&self.0)
    }
}

impl std::fmt::Debug for Salt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Salt({})", self.to_hex())
    }
}

impl std::fmt::Display for Salt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::str::FromStr for Salt {
    type Err = CommitmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Salt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Salt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
