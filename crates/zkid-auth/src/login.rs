//! # Login Flow
//!
//! Client side, [`AuthProver`] turns a secret, a birth year and a
//! server challenge into a [`ProofResult`]. Server side, [`LoginVerifier`]
//! admits or refuses that envelope.
//!
//! ## Verification order
//!
//! Cheap checks run before expensive ones, and nothing is consumed until
//! the request is known to be well-formed:
//!
//! 1. Policy binding: envelope `vk_id` / `params_version` against the
//!    bundle for the key it names (the active key, or an older key still
//!    inside its grace period).
//! 2. Challenge token: signature, expiry, key binding, policy binding,
//!    user.
//! 3. Key registry: the verifying key must still be valid.
//! 4. Envelope commitment and salt, when present, must match storage.
//! 5. Replay guard: the token's `jti` is recorded. A second submission of
//!    the same token stops here even though its proof would verify.
//! 6. Proof backend verification.
//!
//! Every outcome is logged with its kind and counted in
//! `zkid_login_total{circuit, outcome}`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use zkid_core::{from_unix, unix_now, KeyFingerprint, SharedPolicy};
use zkid_crypto::{commit_derived, create_commitment, derive, Commitment, FieldElement, Salt};
use zkid_zkp::{
    AgePublicInputs, AgeWitness, AuthPublicInputs, AuthWitness, CircuitKind, ProofKey,
    ProofPolicy, ProofResult, ProofSystem, PublicInputs, SetupError, Witness,
};

use crate::bundle::{enforce_policy, PolicyBundle};
use crate::error::AuthError;
use crate::keys::KeyRegistry;
use crate::token::{ChallengeTokenClaims, ChallengeTokenService, IssuedChallenge};

fn require_circuit<K: ProofKey>(key: &K, kind: CircuitKind) -> Result<(), AuthError> {
    if key.circuit() == kind {
        Ok(())
    } else {
        Err(AuthError::Setup(SetupError::KeyParse(format!(
            "expected a {kind} key, got a {} key",
            key.circuit()
        ))))
    }
}

// ---- Prover -----------------------------------------------------------------

/// Client-side proof generation against a server policy bundle.
pub struct AuthProver<B: ProofSystem> {
    backend: B,
    auth_key: B::ProvingKey,
    bundle: PolicyBundle,
    age_key: Option<(B::ProvingKey, String)>,
}

impl<B: ProofSystem> AuthProver<B> {
    /// Prover for the login circuit. `bundle` is what the server published;
    /// its fingerprint must match its own config.
    pub fn new(backend: B, auth_key: B::ProvingKey, bundle: PolicyBundle) -> Result<Self, AuthError> {
        require_circuit(&auth_key, CircuitKind::Auth)?;
        if !bundle.is_consistent() {
            return Err(AuthError::PolicyMismatch {
                expected: bundle.config.params_version(),
                presented: bundle.params_version,
            });
        }
        Ok(Self {
            backend,
            auth_key,
            bundle,
            age_key: None,
        })
    }

    /// Enable [`prove_age`](Self::prove_age) with an age-circuit key and the
    /// id of its verifying key.
    pub fn with_age_key(mut self, key: B::ProvingKey, vk_id: &KeyFingerprint) -> Result<Self, AuthError> {
        require_circuit(&key, CircuitKind::Age)?;
        self.age_key = Some((key, vk_id.to_hex()));
        Ok(self)
    }

    pub fn policy(&self) -> &SharedPolicy {
        &self.bundle.config
    }

    pub fn bundle(&self) -> &PolicyBundle {
        &self.bundle
    }

    /// Registration: a fresh salt and the commitment to `secret`.
    pub fn calculate_commitment(&self, secret: &[u8]) -> Result<Commitment, AuthError> {
        Ok(create_commitment(secret, &self.bundle.config)?)
    }

    /// Prove knowledge of `secret` behind the commitment for `salt_hex`,
    /// bound to `challenge`, together with the age inequality.
    pub fn prove_login(
        &self,
        secret: &[u8],
        birth_year: i32,
        challenge: u64,
        salt_hex: &str,
    ) -> Result<ProofResult, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::MissingArguments("secret".into()));
        }
        if challenge == 0 {
            return Err(AuthError::MissingArguments("challenge".into()));
        }
        let salt = Salt::from_hex(salt_hex)?;
        let derived = derive(secret, salt_hex, &self.bundle.config)?;
        let commitment = commit_derived(derived, &salt);

        let public = PublicInputs::Auth(AuthPublicInputs::new(
            commitment,
            &salt,
            challenge,
            &self.bundle.config,
        ));
        let witness = Witness::Auth(AuthWitness {
            derived_secret: derived,
            birth_year,
        });
        let proof = self.backend.prove(&self.auth_key, &public, &witness)?;

        Ok(ProofResult {
            proof,
            proof_version: CircuitKind::Auth.proof_version().to_string(),
            vk_id: self.bundle.vk_id.clone(),
            params_version: self.bundle.params_version.clone(),
            commitment: Some(commitment.to_decimal()),
            salt: Some(salt.to_hex()),
        })
    }

    /// Prove only `target_year - birth_year >= limit_age`.
    pub fn prove_age(&self, birth_year: i32) -> Result<ProofResult, AuthError> {
        let (key, vk_id) = self
            .age_key
            .as_ref()
            .ok_or_else(|| AuthError::MissingArguments("age proving key".into()))?;
        let public = PublicInputs::Age(AgePublicInputs::from_policy(&self.bundle.config));
        let witness = Witness::Age(AgeWitness { birth_year });
        let proof = self.backend.prove(key, &public, &witness)?;

        Ok(ProofResult {
            proof,
            proof_version: CircuitKind::Age.proof_version().to_string(),
            vk_id: vk_id.clone(),
            params_version: self.bundle.params_version.clone(),
            commitment: None,
            salt: None,
        })
    }
}

impl<B: ProofSystem> std::fmt::Debug for AuthProver<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthProver")
            .field("backend", &self.backend.backend())
            .field("bundle", &self.bundle)
            .field("age", &self.age_key.as_ref().map(|(_, id)| id))
            .finish()
    }
}

// ---- Verifier ---------------------------------------------------------------

/// Server-side admission of login and age proofs.
///
/// Holds the login verifying keys it can check proofs against. Which of
/// them is active, and which are still trusted during rotation, is decided
/// by the [`KeyRegistry`].
pub struct LoginVerifier<B: ProofSystem> {
    backend: B,
    policy: SharedPolicy,
    auth_keys: HashMap<KeyFingerprint, B::VerifyingKey>,
    age_key: Option<(KeyFingerprint, B::VerifyingKey)>,
    registry: Arc<dyn KeyRegistry>,
    tokens: Arc<ChallengeTokenService>,
}

impl<B: ProofSystem> LoginVerifier<B> {
    /// Verifier holding `vk`. Challenges are bound to whichever held key
    /// the registry reports as active.
    ///
    /// Fails if `proof_policy` refuses the backend, if `vk` is not a login
    /// key, or if the token service is bound to a different policy.
    pub fn new(
        backend: B,
        vk: B::VerifyingKey,
        policy: SharedPolicy,
        proof_policy: ProofPolicy,
        registry: Arc<dyn KeyRegistry>,
        tokens: Arc<ChallengeTokenService>,
    ) -> Result<Self, AuthError> {
        proof_policy.validate(backend.backend())?;
        policy.validate()?;
        require_circuit(&vk, CircuitKind::Auth)?;
        if tokens.params_version() != policy.params_version() {
            return Err(AuthError::InvalidConfig(
                "token service is bound to a different policy".into(),
            ));
        }
        let mut auth_keys = HashMap::new();
        auth_keys.insert(vk.fingerprint(), vk);
        Ok(Self {
            backend,
            policy,
            auth_keys,
            age_key: None,
            registry,
            tokens,
        })
    }

    /// Also accept proofs made against `vk`, while the registry trusts it.
    pub fn with_key(mut self, vk: B::VerifyingKey) -> Result<Self, AuthError> {
        require_circuit(&vk, CircuitKind::Auth)?;
        self.auth_keys.insert(vk.fingerprint(), vk);
        Ok(self)
    }

    /// Enable [`verify_age`](Self::verify_age).
    pub fn with_age_key(mut self, vk: B::VerifyingKey) -> Result<Self, AuthError> {
        require_circuit(&vk, CircuitKind::Age)?;
        self.age_key = Some((vk.fingerprint(), vk));
        Ok(self)
    }

    /// Make a held key the registry's active one. New challenges are bound
    /// to it.
    pub fn activate(&self, vk_id: &KeyFingerprint) -> Result<(), AuthError> {
        if !self.auth_keys.contains_key(vk_id) {
            return Err(AuthError::KeyNotTrusted(vk_id.to_hex()));
        }
        self.registry.set_active(vk_id)?;
        Ok(())
    }

    /// The registry's active key. Fails if this verifier does not hold it.
    pub fn active_vk_id(&self) -> Result<KeyFingerprint, AuthError> {
        let vk_id = self.registry.get_active()?.vk_id;
        if !self.auth_keys.contains_key(&vk_id) {
            tracing::warn!(vk = %vk_id.short(), "registry active key not held by verifier");
            return Err(AuthError::KeyNotTrusted(vk_id.to_hex()));
        }
        Ok(vk_id)
    }

    pub fn policy(&self) -> &SharedPolicy {
        &self.policy
    }

    /// The bundle clients should sync: this policy and the active key.
    pub fn bundle(&self) -> Result<PolicyBundle, AuthError> {
        Ok(PolicyBundle::for_policy(self.policy, &self.active_vk_id()?))
    }

    /// Issue a challenge for `user_id`, bound to the active key.
    pub fn issue_challenge(&self, user_id: &str, now: i64) -> Result<IssuedChallenge, AuthError> {
        if user_id.is_empty() {
            return Err(AuthError::MissingArguments("user_id".into()));
        }
        self.tokens.issue_for(user_id, &self.active_vk_id()?.to_hex(), now)
    }

    /// [`verify_login_at`](Self::verify_login_at) at the current time.
    pub fn verify_login(
        &self,
        token: &str,
        envelope: &ProofResult,
        user_id: &str,
        stored: &Commitment,
    ) -> Result<ChallengeTokenClaims, AuthError> {
        self.verify_login_at(token, envelope, user_id, stored, unix_now())
    }

    /// Admit a login for `user_id`, whose stored commitment is `stored`.
    /// Returns the consumed token's claims.
    pub fn verify_login_at(
        &self,
        token: &str,
        envelope: &ProofResult,
        user_id: &str,
        stored: &Commitment,
        now: i64,
    ) -> Result<ChallengeTokenClaims, AuthError> {
        let result = self.check_login(token, envelope, user_id, stored, now);
        record_outcome(CircuitKind::Auth, user_id, &envelope.vk_id, &result);
        result
    }

    fn check_login(
        &self,
        token: &str,
        envelope: &ProofResult,
        user_id: &str,
        stored: &Commitment,
        now: i64,
    ) -> Result<ChallengeTokenClaims, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingArguments("token".into()));
        }
        if user_id.is_empty() {
            return Err(AuthError::MissingArguments("user_id".into()));
        }
        if envelope.circuit() != Some(CircuitKind::Auth) {
            tracing::debug!(proof_version = %envelope.proof_version, "not a login proof");
            return Err(AuthError::ProofVerificationFailed);
        }
        let at = from_unix(now);

        let vk_id = self.resolve_key(&envelope.vk_id, at)?;
        let bundle = PolicyBundle::for_policy(self.policy, &vk_id);
        enforce_policy(&bundle, &envelope.vk_id, &envelope.params_version)?;

        let claims = self.tokens.validate(token, now, &bundle.vk_id)?;
        if claims.user_id != user_id {
            return Err(AuthError::TokenInvalid("token issued to another user".into()));
        }

        if !self.registry.is_valid_at(&vk_id, at) {
            return Err(AuthError::KeyNotTrusted(vk_id.to_hex()));
        }
        let vk = self
            .auth_keys
            .get(&vk_id)
            .ok_or_else(|| AuthError::KeyNotTrusted(vk_id.to_hex()))?;

        check_presented(envelope, stored)?;

        self.tokens.redeem(&claims)?;

        let public = PublicInputs::Auth(AuthPublicInputs::new(
            stored.value,
            &stored.salt,
            claims.challenge,
            &self.policy,
        ));
        self.backend
            .verify(vk, &public, &envelope.proof)
            .map_err(|e| {
                tracing::debug!(error = %e, "backend rejected proof");
                AuthError::ProofVerificationFailed
            })?;
        Ok(claims)
    }

    /// The key a login envelope is checked against: the key it names when
    /// this verifier holds it and the registry still trusts it, otherwise
    /// the active key.
    fn resolve_key(&self, presented: &str, at: DateTime<Utc>) -> Result<KeyFingerprint, AuthError> {
        match KeyFingerprint::from_hex(presented)
            .ok()
            .filter(|fp| self.auth_keys.contains_key(fp) && self.registry.is_valid_at(fp, at))
        {
            Some(fp) => Ok(fp),
            None => self.active_vk_id(),
        }
    }

    /// [`verify_age_at`](Self::verify_age_at) at the current time.
    pub fn verify_age(&self, envelope: &ProofResult) -> Result<(), AuthError> {
        self.verify_age_at(envelope, Utc::now())
    }

    /// Admit an age-only proof. Carries no challenge, so it is not bound to
    /// a session.
    pub fn verify_age_at(&self, envelope: &ProofResult, at: DateTime<Utc>) -> Result<(), AuthError> {
        let result = self.check_age(envelope, at);
        record_outcome(CircuitKind::Age, "", &envelope.vk_id, &result);
        result
    }

    fn check_age(&self, envelope: &ProofResult, at: DateTime<Utc>) -> Result<(), AuthError> {
        let (vk_id, vk) = self
            .age_key
            .as_ref()
            .ok_or_else(|| AuthError::KeyNotTrusted("no age verifying key configured".into()))?;
        if envelope.circuit() != Some(CircuitKind::Age) {
            tracing::debug!(proof_version = %envelope.proof_version, "not an age proof");
            return Err(AuthError::ProofVerificationFailed);
        }
        let bundle = PolicyBundle::for_policy(self.policy, vk_id);
        enforce_policy(&bundle, &envelope.vk_id, &envelope.params_version)?;
        if !self.registry.is_valid_at(vk_id, at) {
            return Err(AuthError::KeyNotTrusted(vk_id.to_hex()));
        }
        let public = PublicInputs::Age(AgePublicInputs::from_policy(&self.policy));
        self.backend
            .verify(vk, &public, &envelope.proof)
            .map_err(|e| {
                tracing::debug!(error = %e, "backend rejected age proof");
                AuthError::ProofVerificationFailed
            })
    }
}

impl<B: ProofSystem> std::fmt::Debug for LoginVerifier<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginVerifier")
            .field("backend", &self.backend.backend())
            .field("policy", &self.policy)
            .field("keys", &self.auth_keys.len())
            .field("age", &self.age_key.as_ref().map(|(id, _)| id))
            .finish()
    }
}

/// Envelope commitment and salt are optional; when present they must be
/// canonical and equal to what is stored.
fn check_presented(envelope: &ProofResult, stored: &Commitment) -> Result<(), AuthError> {
    if let Some(c) = envelope.commitment.as_deref() {
        if FieldElement::from_decimal(c)? != stored.value {
            tracing::debug!("presented commitment differs from stored");
            return Err(AuthError::ProofVerificationFailed);
        }
    }
    if let Some(s) = envelope.salt.as_deref() {
        if Salt::from_hex(s)? != stored.salt {
            tracing::debug!("presented salt differs from stored");
            return Err(AuthError::ProofVerificationFailed);
        }
    }
    Ok(())
}

fn record_outcome<T>(circuit: CircuitKind, user_id: &str, vk_id: &str, result: &Result<T, AuthError>) {
    let outcome = match result {
        Ok(_) => "success",
        Err(e) => e.kind(),
    };
    metrics::counter!(
        "zkid_login_total",
        "circuit" => circuit.name(),
        "outcome" => outcome
    )
    .increment(1);

    let vk = vk_id.get(..8).unwrap_or(vk_id);
    match result {
        Ok(_) => tracing::info!(circuit = circuit.name(), user_id, vk, "proof accepted"),
        Err(e @ (AuthError::KeyMismatch { .. } | AuthError::ReplayDetected | AuthError::KeyNotTrusted(_))) => {
            tracing::warn!(circuit = circuit.name(), user_id, vk, code = %e.code(), outcome, "proof refused")
        }
        Err(e @ AuthError::PolicyMismatch { .. }) => {
            tracing::info!(circuit = circuit.name(), user_id, vk, code = %e.code(), outcome, "proof refused")
        }
        Err(e) => {
            tracing::debug!(circuit = circuit.name(), user_id, vk, code = %e.code(), outcome, "proof refused")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{KeyVersion, MemoryKeyRegistry};
    use crate::replay::MemoryTokenStore;
    use crate::token::{TokenKey, TokenKeySet};
    use zkid_zkp::{TransparentProofSystem, TransparentProvingKey, TransparentVerifyingKey};

    const NOW: i64 = 1_735_689_600;
    const SECRET: &[u8] = b"user-secret";

    fn policy() -> SharedPolicy {
        SharedPolicy {
            target_year: 2025,
            limit_age: 20,
            kdf_memory_kib: 1024,
            kdf_iterations: 1,
        }
    }

    fn keys(kind: CircuitKind) -> (TransparentProvingKey, TransparentVerifyingKey) {
        let sys = TransparentProofSystem;
        sys.setup(&sys.compile(kind).unwrap()).unwrap()
    }

    struct Fixture {
        prover: AuthProver<TransparentProofSystem>,
        verifier: LoginVerifier<TransparentProofSystem>,
        stored: Commitment,
    }

    fn fixture() -> Fixture {
        let (pk, vk) = keys(CircuitKind::Auth);
        let (age_pk, age_vk) = keys(CircuitKind::Age);
        let registry = MemoryKeyRegistry::new();
        registry
            .register(KeyVersion::new("v1", vk.fingerprint(), pk.fingerprint()))
            .unwrap();
        registry
            .register(KeyVersion::new("age-v1", age_vk.fingerprint(), age_pk.fingerprint()))
            .unwrap();
        let tokens = ChallengeTokenService::new(
            TokenKeySet::single("k1", TokenKey::generate()),
            &policy(),
            120,
            Arc::new(MemoryTokenStore::new()),
        )
        .unwrap();
        let age_vk_id = age_vk.fingerprint();
        let verifier = LoginVerifier::new(
            TransparentProofSystem,
            vk,
            policy(),
            ProofPolicy::development(),
            Arc::new(registry),
            Arc::new(tokens),
        )
        .unwrap()
        .with_age_key(age_vk)
        .unwrap();
        let prover = AuthProver::new(TransparentProofSystem, pk, verifier.bundle().unwrap())
            .unwrap()
            .with_age_key(age_pk, &age_vk_id)
            .unwrap();
        let stored = prover.calculate_commitment(SECRET).unwrap();
        Fixture {
            prover,
            verifier,
            stored,
        }
    }

    #[test]
    fn test_login_accepted_once() {
        let f = fixture();
        let issued = f.verifier.issue_challenge("alice", NOW).unwrap();
        let envelope = f
            .prover
            .prove_login(SECRET, 2000, issued.challenge, &f.stored.salt.to_hex())
            .unwrap();
        let claims = f
            .verifier
            .verify_login_at(&issued.token, &envelope, "alice", &f.stored, NOW)
            .unwrap();
        assert_eq!(claims.challenge, issued.challenge);

        let again = f
            .verifier
            .verify_login_at(&issued.token, &envelope, "alice", &f.stored, NOW);
        assert!(matches!(again, Err(AuthError::ReplayDetected)));
    }

    #[test]
    fn test_wrong_secret_refused() {
        let f = fixture();
        let issued = f.verifier.issue_challenge("alice", NOW).unwrap();
        // The envelope commitment then differs from storage.
        let envelope = f
            .prover
            .prove_login(b"not-the-secret", 2000, issued.challenge, &f.stored.salt.to_hex())
            .unwrap();
        let err = f
            .verifier
            .verify_login_at(&issued.token, &envelope, "alice", &f.stored, NOW)
            .unwrap_err();
        assert!(matches!(err, AuthError::ProofVerificationFailed));
        assert_eq!(err.user_message(), "verification failed");
    }

    #[test]
    fn test_proof_for_other_challenge_fails() {
        let f = fixture();
        let issued = f.verifier.issue_challenge("alice", NOW).unwrap();
        let other = if issued.challenge == 1 { 2 } else { issued.challenge - 1 };
        let envelope = f
            .prover
            .prove_login(SECRET, 2000, other, &f.stored.salt.to_hex())
            .unwrap();
        let err = f
            .verifier
            .verify_login_at(&issued.token, &envelope, "alice", &f.stored, NOW)
            .unwrap_err();
        assert!(matches!(err, AuthError::ProofVerificationFailed));
    }

    #[test]
    fn test_underage_cannot_prove() {
        let f = fixture();
        let err = f
            .prover
            .prove_login(SECRET, 2010, 7, &f.stored.salt.to_hex())
            .unwrap_err();
        assert!(matches!(err, AuthError::Proving(_)));
    }

    #[test]
    fn test_expired_token() {
        let f = fixture();
        let issued = f.verifier.issue_challenge("alice", NOW).unwrap();
        let envelope = f
            .prover
            .prove_login(SECRET, 2000, issued.challenge, &f.stored.salt.to_hex())
            .unwrap();
        let err = f
            .verifier
            .verify_login_at(&issued.token, &envelope, "alice", &f.stored, issued.expires_at)
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[test]
    fn test_token_for_other_user() {
        let f = fixture();
        let issued = f.verifier.issue_challenge("mallory", NOW).unwrap();
        let envelope = f
            .prover
            .prove_login(SECRET, 2000, issued.challenge, &f.stored.salt.to_hex())
            .unwrap();
        let err = f
            .verifier
            .verify_login_at(&issued.token, &envelope, "alice", &f.stored, NOW)
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid(_)));
    }

    #[test]
    fn test_stale_params_version_rejected_before_token() {
        let f = fixture();
        let issued = f.verifier.issue_challenge("alice", NOW).unwrap();
        let mut envelope = f
            .prover
            .prove_login(SECRET, 2000, issued.challenge, &f.stored.salt.to_hex())
            .unwrap();
        envelope.params_version = SharedPolicy::default().params_version();
        let err = f
            .verifier
            .verify_login_at(&issued.token, &envelope, "alice", &f.stored, NOW)
            .unwrap_err();
        assert!(matches!(err, AuthError::PolicyMismatch { .. }));

        // Nothing was consumed.
        envelope.params_version = f.verifier.bundle().unwrap().params_version;
        assert!(f
            .verifier
            .verify_login_at(&issued.token, &envelope, "alice", &f.stored, NOW)
            .is_ok());
    }

    #[test]
    fn test_unknown_vk_is_key_mismatch() {
        let f = fixture();
        let issued = f.verifier.issue_challenge("alice", NOW).unwrap();
        let mut envelope = f
            .prover
            .prove_login(SECRET, 2000, issued.challenge, &f.stored.salt.to_hex())
            .unwrap();
        envelope.vk_id = "ab".repeat(32);
        let err = f
            .verifier
            .verify_login_at(&issued.token, &envelope, "alice", &f.stored, NOW)
            .unwrap_err();
        assert!(matches!(err, AuthError::KeyMismatch { .. }));
    }

    #[test]
    fn test_malformed_envelope_commitment_is_parse_error() {
        let f = fixture();
        let issued = f.verifier.issue_challenge("alice", NOW).unwrap();
        let mut envelope = f
            .prover
            .prove_login(SECRET, 2000, issued.challenge, &f.stored.salt.to_hex())
            .unwrap();
        envelope.commitment = Some("00123".into());
        let err = f
            .verifier
            .verify_login_at(&issued.token, &envelope, "alice", &f.stored, NOW)
            .unwrap_err();
        assert!(matches!(err, AuthError::Parse(_)));
    }

    #[test]
    fn test_envelope_without_commitment_uses_storage() {
        let f = fixture();
        let issued = f.verifier.issue_challenge("alice", NOW).unwrap();
        let mut envelope = f
            .prover
            .prove_login(SECRET, 2000, issued.challenge, &f.stored.salt.to_hex())
            .unwrap();
        envelope.commitment = None;
        envelope.salt = None;
        assert!(f
            .verifier
            .verify_login_at(&issued.token, &envelope, "alice", &f.stored, NOW)
            .is_ok());
    }

    #[test]
    fn test_age_proof() {
        let f = fixture();
        let envelope = f.prover.prove_age(2000).unwrap();
        assert!(envelope.commitment.is_none());
        assert!(f.verifier.verify_age(&envelope).is_ok());
        assert!(f.prover.prove_age(2010).is_err());
    }

    #[test]
    fn test_login_proof_is_not_an_age_proof() {
        let f = fixture();
        let envelope = f.prover.prove_login(SECRET, 2000, 9, &f.stored.salt.to_hex()).unwrap();
        assert!(matches!(
            f.verifier.verify_age(&envelope),
            Err(AuthError::ProofVerificationFailed)
        ));
    }

    #[test]
    fn test_production_policy_refuses_transparent_backend() {
        let (_, vk) = keys(CircuitKind::Auth);
        let tokens = ChallengeTokenService::new(
            TokenKeySet::single("k1", TokenKey::generate()),
            &policy(),
            120,
            Arc::new(MemoryTokenStore::new()),
        )
        .unwrap();
        let err = LoginVerifier::new(
            TransparentProofSystem,
            vk,
            policy(),
            ProofPolicy::production(),
            Arc::new(MemoryKeyRegistry::new()),
            Arc::new(tokens),
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::ProofPolicy(_)));
    }

    #[test]
    fn test_verifier_rejects_token_service_for_other_policy() {
        let (_, vk) = keys(CircuitKind::Auth);
        let tokens = ChallengeTokenService::new(
            TokenKeySet::single("k1", TokenKey::generate()),
            &SharedPolicy::default(),
            120,
            Arc::new(MemoryTokenStore::new()),
        )
        .unwrap();
        let err = LoginVerifier::new(
            TransparentProofSystem,
            vk,
            policy(),
            ProofPolicy::development(),
            Arc::new(MemoryKeyRegistry::new()),
            Arc::new(tokens),
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::InvalidConfig(_)));
    }

    #[test]
    fn test_key_of_wrong_circuit_refused() {
        let (_, age_vk) = keys(CircuitKind::Age);
        let tokens = ChallengeTokenService::new(
            TokenKeySet::single("k1", TokenKey::generate()),
            &policy(),
            120,
            Arc::new(MemoryTokenStore::new()),
        )
        .unwrap();
        let err = LoginVerifier::new(
            TransparentProofSystem,
            age_vk,
            policy(),
            ProofPolicy::development(),
            Arc::new(MemoryKeyRegistry::new()),
            Arc::new(tokens),
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::Setup(_)));
    }

    #[test]
    fn test_prover_rejects_inconsistent_bundle() {
        let (pk, vk) = keys(CircuitKind::Auth);
        let mut bundle = PolicyBundle::for_policy(policy(), &vk.fingerprint());
        bundle.params_version = "stale".into();
        assert!(matches!(
            AuthProver::new(TransparentProofSystem, pk, bundle),
            Err(AuthError::PolicyMismatch { .. })
        ));
    }
}
