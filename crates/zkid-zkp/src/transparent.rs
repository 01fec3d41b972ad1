//! # Transparent Reference Backend
//!
//! A deterministic proof system for development and testing. It enforces
//! the full constraint conjunction at proving time, so an unsatisfiable
//! witness never yields a proof, but the proof itself is only an
//! HMAC-SHA256 tag over the canonical public inputs under a per-setup seed.
//!
//! The seed is embedded in both keys. Anyone holding the verifying key can
//! therefore forge proofs, and nothing about the witness is hidden beyond
//! what the MAC hides. [`ProofBackend::Transparent`] is rejected by the
//! production [`ProofPolicy`](crate::policy::ProofPolicy).
//!
//! ## Key encoding
//!
//! ```text
//!   magic(8) || circuit(1) || circuit_digest(32) || seed(32)
//! ```
//!
//! Magic is `zkid-pk\x01` or `zkid-vk\x01`, so a proving key and verifying
//! key from one setup have different fingerprints.
//!
//! ## Proof encoding
//!
//! ```text
//!   version(1) || HMAC-SHA256(seed, circuit_digest || JCS(public inputs))
//! ```

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::circuits::{self, CircuitKind, PublicInputs, Witness};
use crate::policy::ProofBackend;
use crate::traits::{CompiledCircuit, ProofError, ProofKey, ProofSystem, SetupError, VerifyError};

type HmacSha256 = Hmac<Sha256>;

const PK_MAGIC: &[u8; 8] = b"zkid-pk\x01";
const VK_MAGIC: &[u8; 8] = b"zkid-vk\x01";
const KEY_LEN: usize = 8 + 1 + 32 + 32;

/// Proof format version byte.
pub const PROOF_FORMAT_V1: u8 = 1;
/// Length of a transparent proof in bytes.
pub const PROOF_LEN: usize = 1 + 32;

#[derive(Clone)]
struct KeyMaterial {
    circuit: CircuitKind,
    digest: [u8; 32],
    seed: Zeroizing<[u8; 32]>,
}

impl KeyMaterial {
    fn encode(&self, magic: &[u8; 8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(KEY_LEN);
        out.extend_from_slice(magic);
        out.push(circuit_tag(self.circuit));
        out.extend_from_slice(&self.digest);
        out.extend_from_slice(&self.seed[..]);
        out
    }

    fn decode(bytes: &[u8], magic: &[u8; 8]) -> Result<Self, SetupError> {
        if bytes.len() != KEY_LEN {
            return Err(SetupError::KeyParse(format!(
                "expected {KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        if &bytes[..8] != magic {
            return Err(SetupError::KeyParse("wrong key type or version".into()));
        }
        let circuit = match bytes[8] {
            1 => CircuitKind::Auth,
            2 => CircuitKind::Age,
            other => {
                return Err(SetupError::KeyParse(format!("unknown circuit tag {other}")));
            }
        };
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&bytes[9..41]);
        let mut seed = Zeroizing::new([0u8; 32]);
        seed.copy_from_slice(&bytes[41..73]);
        Ok(Self { circuit, digest, seed })
    }

    fn mac(&self, public: &PublicInputs) -> Result<HmacSha256, String> {
        let transcript = public.canonical_bytes().map_err(|e| e.to_string())?;
        let mut mac = HmacSha256::new_from_slice(&self.seed[..]).map_err(|e| e.to_string())?;
        mac.update(&self.digest);
        mac.update(transcript.as_bytes());
        Ok(mac)
    }
}

fn circuit_tag(kind: CircuitKind) -> u8 {
    match kind {
        CircuitKind::Auth => 1,
        CircuitKind::Age => 2,
    }
}

/// Proving key of the transparent backend.
#[derive(Clone)]
pub struct TransparentProvingKey(KeyMaterial);

/// Verifying key of the transparent backend.
#[derive(Clone)]
pub struct TransparentVerifyingKey(KeyMaterial);

impl ProofKey for TransparentProvingKey {
    fn circuit(&self) -> CircuitKind {
        self.0.circuit
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.0.encode(PK_MAGIC)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, SetupError> {
        KeyMaterial::decode(bytes, PK_MAGIC).map(Self)
    }
}

impl ProofKey for TransparentVerifyingKey {
    fn circuit(&self) -> CircuitKind {
        self.0.circuit
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.0.encode(VK_MAGIC)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, SetupError> {
        KeyMaterial::decode(bytes, VK_MAGIC).map(Self)
    }
}

impl std::fmt::Debug for TransparentProvingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TransparentProvingKey({}, {:?})", self.0.circuit, self.fingerprint())
    }
}

impl std::fmt::Debug for TransparentVerifyingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TransparentVerifyingKey({}, {:?})", self.0.circuit, self.fingerprint())
    }
}

/// The transparent reference proof system.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransparentProofSystem;

impl ProofSystem for TransparentProofSystem {
    type ProvingKey = TransparentProvingKey;
    type VerifyingKey = TransparentVerifyingKey;

    fn backend(&self) -> ProofBackend {
        ProofBackend::Transparent
    }

    fn compile(&self, kind: CircuitKind) -> Result<CompiledCircuit, SetupError> {
        Ok(CompiledCircuit::from_statement(kind))
    }

    fn setup(
        &self,
        circuit: &CompiledCircuit,
    ) -> Result<(Self::ProvingKey, Self::VerifyingKey), SetupError> {
        let mut seed = Zeroizing::new([0u8; 32]);
        OsRng
            .try_fill_bytes(&mut seed[..])
            .map_err(|e| SetupError::Setup(e.to_string()))?;
        let material = KeyMaterial {
            circuit: circuit.kind,
            digest: circuit.digest,
            seed,
        };
        Ok((
            TransparentProvingKey(material.clone()),
            TransparentVerifyingKey(material),
        ))
    }

    fn prove(
        &self,
        pk: &Self::ProvingKey,
        public: &PublicInputs,
        witness: &Witness,
    ) -> Result<Vec<u8>, ProofError> {
        if public.kind() != pk.circuit() {
            return Err(ProofError::Witness(format!(
                "proving key is for the {} circuit, inputs are for {}",
                pk.circuit(),
                public.kind()
            )));
        }
        circuits::check(public, witness).map_err(|e| ProofError::Witness(e.to_string()))?;

        let tag = pk.0.mac(public).map_err(ProofError::Proving)?.finalize().into_bytes();
        let mut proof = Vec::with_capacity(PROOF_LEN);
        proof.push(PROOF_FORMAT_V1);
        proof.extend_from_slice(&tag);
        Ok(proof)
    }

    fn verify(
        &self,
        vk: &Self::VerifyingKey,
        public: &PublicInputs,
        proof: &[u8],
    ) -> Result<(), VerifyError> {
        if proof.len() != PROOF_LEN {
            return Err(VerifyError::MalformedProof(format!(
                "expected {PROOF_LEN} bytes, got {}",
                proof.len()
            )));
        }
        if proof[0] != PROOF_FORMAT_V1 {
            return Err(VerifyError::MalformedProof(format!(
                "unsupported proof format {}",
                proof[0]
            )));
        }
        if public.kind() != vk.circuit() {
            return Err(VerifyError::VerificationFailed);
        }
        vk.0.mac(public)
            .map_err(|_| VerifyError::VerificationFailed)?
            .verify_slice(&proof[1..])
            .map_err(|_| VerifyError::VerificationFailed)
    }
}
