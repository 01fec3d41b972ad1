//! # Challenge Tokens
//!
//! A challenge token is a stateless, HMAC-SHA256-signed envelope around one
//! login challenge:
//!
//! ```text
//!   base64url(JCS(claims)) "." base64url(HMAC-SHA256(key, JCS(claims)))
//! ```
//!
//! The issuer keeps no state. Single use is enforced by the consumer, which
//! records the `jti` in a [`TokenStore`](crate::replay::TokenStore) on first
//! redemption.
//!
//! ## Security Invariant
//!
//! Claims are decoded only after the tag over the exact payload bytes has
//! been checked in constant time. With a [`TokenKeySet`] the `kid` is read
//! from the unauthenticated payload to pick the key; the choice is then
//! authenticated by the MAC, which covers `kid`. Every key in a set is
//! equally trusted.
//!
//! ## Validation order
//!
//! signature, then `exp > now` (an `exp` equal to `now` is expired), then
//! `vk_id`, then `params_version`, then schema version.

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;
use zeroize::Zeroizing;
use zkid_core::{CanonicalBytes, ErrorCode, SharedPolicy};

use crate::error::AuthError;
use crate::replay::TokenStore;

type HmacSha256 = Hmac<Sha256>;

/// Schema tag stamped into `v`.
pub const TOKEN_VERSION: &str = "ct-v1";

/// Random bytes in an auto-filled nonce.
pub const NONCE_LEN: usize = 12;

/// Largest challenge a token carries: 2^53 - 1, the largest integer every
/// JSON consumer reads exactly.
pub const MAX_CHALLENGE: u64 = (1 << 53) - 1;

/// Minimum HMAC key length accepted for signing.
pub const MIN_KEY_LEN: usize = 16;

/// Error from token issuance, parsing or validation.
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("missing arguments: {0}")]
    MissingArguments(&'static str),

    #[error("challenge token key missing")]
    KeyMissing,

    #[error("invalid challenge token: {0}")]
    Invalid(String),

    #[error("challenge token expired")]
    Expired,

    #[error("policy mismatch: expected params_version {expected}, got {presented}")]
    PolicyMismatch { expected: String, presented: String },
}

impl TokenError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingArguments(_) => ErrorCode::MissingArguments,
            Self::KeyMissing => ErrorCode::TokenKeyMissing,
            Self::Invalid(_) => ErrorCode::ChallengeInvalid,
            Self::Expired => ErrorCode::ChallengeExpired,
            Self::PolicyMismatch { .. } => ErrorCode::PolicyMismatch,
        }
    }
}

/// The signed payload of a challenge token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeTokenClaims {
    pub user_id: String,
    pub challenge: u64,
    /// Expiry, unix seconds.
    #[serde(rename = "exp")]
    pub expires_at: i64,
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub jti: String,
    #[serde(default)]
    pub vk_id: String,
    #[serde(default)]
    pub params_version: String,
    #[serde(rename = "kid", default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(rename = "v", default)]
    pub version: String,
}

impl ChallengeTokenClaims {
    /// Claims with the required fields set and everything else left for
    /// issuance to fill in.
    pub fn new(user_id: impl Into<String>, challenge: u64, expires_at: i64) -> Self {
        Self {
            user_id: user_id.into(),
            challenge,
            expires_at,
            nonce: String::new(),
            jti: String::new(),
            vk_id: String::new(),
            params_version: String::new(),
            key_id: None,
            version: String::new(),
        }
    }

    pub fn with_vk_id(mut self, vk_id: impl Into<String>) -> Self {
        self.vk_id = vk_id.into();
        self
    }

    pub fn with_params_version(mut self, params_version: impl Into<String>) -> Self {
        self.params_version = params_version.into();
        self
    }
}

/// An HMAC signing key. Wiped on drop.
#[derive(Clone)]
pub struct TokenKey(Zeroizing<Vec<u8>>);

impl TokenKey {
    /// Wrap raw key bytes. Fewer than [`MIN_KEY_LEN`] bytes is no key at all.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, TokenError> {
        let bytes = Zeroizing::new(bytes.into());
        if bytes.len() < MIN_KEY_LEN {
            return Err(TokenError::KeyMissing);
        }
        Ok(Self(bytes))
    }

    /// A fresh random 32-byte key.
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new(vec![0u8; 32]);
        OsRng.fill_bytes(&mut bytes[..]);
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, TokenError> {
        let bytes = hex::decode(s.trim()).map_err(|_| TokenError::KeyMissing)?;
        Self::new(bytes)
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(&self.0[..]).map_err(|_| TokenError::KeyMissing)
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, TokenError> {
        let mut mac = self.mac()?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    fn verify(&self, payload: &[u8], tag: &[u8]) -> Result<(), TokenError> {
        let mut mac = self.mac()?;
        mac.update(payload);
        mac.verify_slice(tag)
            .map_err(|_| TokenError::Invalid("signature mismatch".into()))
    }
}

impl std::fmt::Debug for TokenKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenKey(<redacted>)")
    }
}

/// Several equally trusted keys, selected by `kid`.
#[derive(Debug, Clone, Default)]
pub struct TokenKeySet {
    keys: BTreeMap<String, TokenKey>,
    default_kid: Option<String>,
}

impl TokenKeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set of one key, which is also the default.
    pub fn single(kid: impl Into<String>, key: TokenKey) -> Self {
        let mut set = Self::new();
        set.insert_default(kid, key);
        set
    }

    /// Add a key. The first key added becomes the default.
    pub fn insert(&mut self, kid: impl Into<String>, key: TokenKey) {
        let kid = kid.into();
        if self.default_kid.is_none() {
            self.default_kid = Some(kid.clone());
        }
        self.keys.insert(kid, key);
    }

    /// Add a key and make it the default (the one new tokens are signed with).
    pub fn insert_default(&mut self, kid: impl Into<String>, key: TokenKey) {
        let kid = kid.into();
        self.keys.insert(kid.clone(), key);
        self.default_kid = Some(kid);
    }

    pub fn remove(&mut self, kid: &str) -> Option<TokenKey> {
        let removed = self.keys.remove(kid);
        if self.default_kid.as_deref() == Some(kid) {
            self.default_kid = self.keys.keys().next().cloned();
        }
        removed
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn default_kid(&self) -> Option<&str> {
        self.default_kid.as_deref()
    }

    /// The signing key and its id.
    pub fn signing_key(&self) -> Result<(&str, &TokenKey), TokenError> {
        let kid = self.default_kid.as_deref().ok_or(TokenError::KeyMissing)?;
        let key = self.keys.get(kid).ok_or(TokenError::KeyMissing)?;
        Ok((kid, key))
    }

    fn select(&self, kid: Option<&str>) -> Result<&TokenKey, TokenError> {
        if self.keys.is_empty() {
            return Err(TokenError::KeyMissing);
        }
        match kid {
            Some(kid) => self
                .keys
                .get(kid)
                .ok_or_else(|| TokenError::Invalid(format!("unknown key id {kid:?}"))),
            None => self.signing_key().map(|(_, key)| key),
        }
    }
}

fn random_nonce() -> String {
    let mut buf = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

/// A uniformly random challenge in `1..=MAX_CHALLENGE`.
pub fn random_challenge() -> u64 {
    OsRng.gen_range(1..=MAX_CHALLENGE)
}

/// Sign `claims` with `key`.
///
/// Requires a non-empty `user_id` and non-zero `challenge` and `exp`. Fills
/// `nonce`, `jti` and `v` when empty, and `params_version` with the default
/// policy's fingerprint when empty. `kid`, when given, is written into the
/// claims before signing.
pub fn issue(
    mut claims: ChallengeTokenClaims,
    key: &TokenKey,
    kid: Option<&str>,
) -> Result<String, TokenError> {
    if claims.user_id.is_empty() {
        return Err(TokenError::MissingArguments("user_id"));
    }
    if claims.challenge == 0 {
        return Err(TokenError::MissingArguments("challenge"));
    }
    if claims.expires_at == 0 {
        return Err(TokenError::MissingArguments("exp"));
    }
    if claims.challenge > MAX_CHALLENGE {
        return Err(TokenError::Invalid(format!(
            "challenge exceeds {MAX_CHALLENGE}"
        )));
    }
    if claims.nonce.is_empty() {
        claims.nonce = random_nonce();
    }
    if claims.jti.is_empty() {
        claims.jti = Uuid::new_v4().to_string();
    }
    if claims.version.is_empty() {
        claims.version = TOKEN_VERSION.to_string();
    }
    if claims.params_version.is_empty() {
        claims.params_version = SharedPolicy::default().params_version();
    }
    if let Some(kid) = kid {
        claims.key_id = Some(kid.to_string());
    }

    let payload = CanonicalBytes::new(&claims)
        .map_err(|e| TokenError::Invalid(format!("payload encode failed: {e}")))?;
    let tag = key.sign(payload.as_bytes())?;
    Ok(format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(payload.as_bytes()),
        URL_SAFE_NO_PAD.encode(tag)
    ))
}

/// Sign with the key set's default key, stamping its `kid`.
pub fn issue_with_keyset(
    claims: ChallengeTokenClaims,
    keys: &TokenKeySet,
) -> Result<String, TokenError> {
    let (kid, key) = keys.signing_key()?;
    issue(claims, key, Some(kid))
}

fn split(token: &str) -> Result<(Vec<u8>, Vec<u8>), TokenError> {
    let mut parts = token.split('.');
    let (Some(payload), Some(tag), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(TokenError::Invalid("expected two segments".into()));
    };
    let payload = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| TokenError::Invalid(format!("payload decode failed: {e}")))?;
    let tag = URL_SAFE_NO_PAD
        .decode(tag)
        .map_err(|e| TokenError::Invalid(format!("signature decode failed: {e}")))?;
    Ok((payload, tag))
}

fn decode_claims(payload: &[u8]) -> Result<ChallengeTokenClaims, TokenError> {
    serde_json::from_slice(payload)
        .map_err(|e| TokenError::Invalid(format!("payload parse failed: {e}")))
}

/// Verify the signature with `key` and decode the claims.
pub fn parse(token: &str, key: &TokenKey) -> Result<ChallengeTokenClaims, TokenError> {
    let (payload, tag) = split(token)?;
    key.verify(&payload, &tag)?;
    decode_claims(&payload)
}

/// Verify the signature with the key named by the token's `kid` (or the
/// set's default key when absent) and decode the claims.
pub fn parse_with_keyset(
    token: &str,
    keys: &TokenKeySet,
) -> Result<ChallengeTokenClaims, TokenError> {
    #[derive(Deserialize)]
    struct KeyHint {
        #[serde(default)]
        kid: Option<String>,
    }

    if keys.is_empty() {
        return Err(TokenError::KeyMissing);
    }
    let (payload, tag) = split(token)?;
    let hint: KeyHint = serde_json::from_slice(&payload)
        .map_err(|e| TokenError::Invalid(format!("payload parse failed: {e}")))?;
    keys.select(hint.kid.as_deref())?.verify(&payload, &tag)?;
    decode_claims(&payload)
}

fn check_claims(
    claims: ChallengeTokenClaims,
    now: i64,
    expected_vk_id: &str,
    expected_params_version: &str,
) -> Result<ChallengeTokenClaims, TokenError> {
    if claims.expires_at <= now {
        return Err(TokenError::Expired);
    }
    if !expected_vk_id.is_empty() && claims.vk_id != expected_vk_id {
        return Err(TokenError::Invalid("vk_id mismatch".into()));
    }
    if !expected_params_version.is_empty() && claims.params_version != expected_params_version {
        return Err(TokenError::PolicyMismatch {
            expected: expected_params_version.to_string(),
            presented: claims.params_version,
        });
    }
    if !claims.version.is_empty() && claims.version != TOKEN_VERSION {
        return Err(TokenError::Invalid(format!(
            "unsupported token version {:?}",
            claims.version
        )));
    }
    Ok(claims)
}

/// Parse, then check expiry and policy/key bindings. Empty expectations
/// are not checked.
pub fn validate(
    token: &str,
    key: &TokenKey,
    now: i64,
    expected_vk_id: &str,
    expected_params_version: &str,
) -> Result<ChallengeTokenClaims, TokenError> {
    check_claims(parse(token, key)?, now, expected_vk_id, expected_params_version)
}

/// [`validate`] against a key set.
pub fn validate_with_keyset(
    token: &str,
    keys: &TokenKeySet,
    now: i64,
    expected_vk_id: &str,
    expected_params_version: &str,
) -> Result<ChallengeTokenClaims, TokenError> {
    check_claims(
        parse_with_keyset(token, keys)?,
        now,
        expected_vk_id,
        expected_params_version,
    )
}

// ---- Service ----------------------------------------------------------------

/// A freshly issued challenge, as handed to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedChallenge {
    pub token: String,
    pub challenge: u64,
    pub jti: String,
    pub expires_at: i64,
}

/// Issues and redeems challenge tokens for one policy.
///
/// Tokens are stamped with this service's policy fingerprint and validated
/// against it. Redemption records the `jti` in the replay store.
pub struct ChallengeTokenService {
    keys: TokenKeySet,
    params_version: String,
    ttl_secs: i64,
    replay: Arc<dyn TokenStore>,
}

impl ChallengeTokenService {
    pub fn new(
        keys: TokenKeySet,
        policy: &SharedPolicy,
        ttl_secs: u64,
        replay: Arc<dyn TokenStore>,
    ) -> Result<Self, AuthError> {
        if keys.is_empty() {
            return Err(AuthError::TokenKeyMissing);
        }
        let ttl_secs = i64::try_from(ttl_secs)
            .ok()
            .filter(|t| *t > 0)
            .ok_or_else(|| AuthError::InvalidConfig(format!("invalid challenge ttl {ttl_secs}")))?;
        Ok(Self {
            keys,
            params_version: policy.params_version(),
            ttl_secs,
            replay,
        })
    }

    pub fn params_version(&self) -> &str {
        &self.params_version
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Sign caller-supplied claims. An empty `params_version` is stamped
    /// with this service's fingerprint.
    pub fn issue(&self, mut claims: ChallengeTokenClaims) -> Result<String, AuthError> {
        if claims.params_version.is_empty() {
            claims.params_version = self.params_version.clone();
        }
        let user_id = claims.user_id.clone();
        let token = issue_with_keyset(claims, &self.keys)?;
        metrics::counter!("zkid_tokens_issued_total").increment(1);
        tracing::debug!(user_id = %user_id, "challenge token issued");
        Ok(token)
    }

    /// Draw a random non-zero challenge for `user_id` and issue it, valid
    /// for the configured TTL from `now`.
    pub fn issue_for(
        &self,
        user_id: &str,
        vk_id: &str,
        now: i64,
    ) -> Result<IssuedChallenge, AuthError> {
        let challenge = random_challenge();
        let jti = Uuid::new_v4().to_string();
        let expires_at = now.saturating_add(self.ttl_secs);
        let mut claims = ChallengeTokenClaims::new(user_id, challenge, expires_at).with_vk_id(vk_id);
        claims.jti = jti.clone();
        let token = self.issue(claims)?;
        Ok(IssuedChallenge {
            token,
            challenge,
            jti,
            expires_at,
        })
    }

    /// Check signature, expiry and bindings. Does not consume the token.
    pub fn validate(
        &self,
        token: &str,
        now: i64,
        expected_vk_id: &str,
    ) -> Result<ChallengeTokenClaims, AuthError> {
        let claims = validate_with_keyset(token, &self.keys, now, expected_vk_id, &self.params_version)
            .map_err(|e| {
                match &e {
                    TokenError::PolicyMismatch { presented, .. } => {
                        tracing::info!(presented = %presented, "challenge token policy skew")
                    }
                    other => tracing::debug!(code = %other.code(), "challenge token rejected"),
                }
                e
            })?;
        Ok(claims)
    }

    /// Record the claims' `jti` as used. Succeeds exactly once per `jti`.
    pub fn redeem(&self, claims: &ChallengeTokenClaims) -> Result<(), AuthError> {
        if claims.jti.is_empty() {
            return Err(AuthError::TokenInvalid("token has no jti".into()));
        }
        self.replay.store(&claims.jti, claims.expires_at).map_err(|e| {
            metrics::counter!("zkid_replay_rejected_total").increment(1);
            tracing::warn!(jti = %claims.jti, user_id = %claims.user_id, "challenge token replay rejected");
            AuthError::from(e)
        })
    }

    /// [`validate`](Self::validate) then [`redeem`](Self::redeem).
    pub fn consume(
        &self,
        token: &str,
        now: i64,
        expected_vk_id: &str,
    ) -> Result<ChallengeTokenClaims, AuthError> {
        let claims = self.validate(token, now, expected_vk_id)?;
        self.redeem(&claims)?;
        Ok(claims)
    }
}

impl std::fmt::Debug for ChallengeTokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChallengeTokenService")
            .field("default_kid", &self.keys.default_kid())
            .field("params_version", &self.params_version)
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::MemoryTokenStore;
    use proptest::prelude::*;

    const NOW: i64 = 1_700_000_000;

    fn key() -> TokenKey {
        TokenKey::new(b"0123456789abcdef0123456789abcdef".to_vec()).unwrap()
    }

    fn claims() -> ChallengeTokenClaims {
        ChallengeTokenClaims::new("alice", 4242, NOW + 120)
            .with_vk_id("vk-1")
            .with_params_version("pv-1")
    }

    #[test]
    fn test_issue_validate_roundtrip() {
        let token = issue(claims(), &key(), None).unwrap();
        let parsed = validate(&token, &key(), NOW, "vk-1", "pv-1").unwrap();
        assert_eq!(parsed.user_id, "alice");
        assert_eq!(parsed.challenge, 4242);
        assert_eq!(parsed.version, TOKEN_VERSION);
        assert_eq!(parsed.nonce.len(), NONCE_LEN * 2);
        assert!(Uuid::parse_str(&parsed.jti).is_ok());
        assert_eq!(parsed.key_id, None);
    }

    #[test]
    fn test_issue_requires_arguments() {
        let k = key();
        assert!(matches!(
            issue(ChallengeTokenClaims::new("", 1, NOW), &k, None),
            Err(TokenError::MissingArguments("user_id"))
        ));
        assert!(matches!(
            issue(ChallengeTokenClaims::new("a", 0, NOW), &k, None),
            Err(TokenError::MissingArguments("challenge"))
        ));
        assert!(matches!(
            issue(ChallengeTokenClaims::new("a", 1, 0), &k, None),
            Err(TokenError::MissingArguments("exp"))
        ));
    }

    #[test]
    fn test_short_key_is_missing() {
        assert!(matches!(TokenKey::new(Vec::new()), Err(TokenError::KeyMissing)));
        assert!(matches!(TokenKey::new(b"short".to_vec()), Err(TokenError::KeyMissing)));
    }

    #[test]
    fn test_params_version_defaulted() {
        let token = issue(ChallengeTokenClaims::new("a", 1, NOW + 5), &key(), None).unwrap();
        let parsed = parse(&token, &key()).unwrap();
        assert_eq!(parsed.params_version, SharedPolicy::default().params_version());
    }

    #[test]
    fn test_expiry_boundary() {
        let k = key();
        let at_now = issue(ChallengeTokenClaims::new("a", 1, NOW), &k, None).unwrap();
        assert!(matches!(validate(&at_now, &k, NOW, "", ""), Err(TokenError::Expired)));
        let next = issue(ChallengeTokenClaims::new("a", 1, NOW + 1), &k, None).unwrap();
        assert!(validate(&next, &k, NOW, "", "").is_ok());
    }

    #[test]
    fn test_vk_mismatch_is_invalid() {
        let token = issue(claims(), &key(), None).unwrap();
        assert!(matches!(
            validate(&token, &key(), NOW, "vk-2", "pv-1"),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn test_params_mismatch_is_policy_mismatch() {
        let token = issue(claims(), &key(), None).unwrap();
        assert!(matches!(
            validate(&token, &key(), NOW, "vk-1", "pv-2"),
            Err(TokenError::PolicyMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_expectations_skip_checks() {
        let token = issue(claims(), &key(), None).unwrap();
        assert!(validate(&token, &key(), NOW, "", "").is_ok());
    }

    #[test]
    fn test_wrong_version_rejected() {
        let mut c = claims();
        c.version = "ct-v0".into();
        let token = issue(c, &key(), None).unwrap();
        assert!(matches!(
            validate(&token, &key(), NOW, "", ""),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let token = issue(claims(), &key(), None).unwrap();
        let other = TokenKey::generate();
        assert!(matches!(parse(&token, &other), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_malformed_tokens() {
        let k = key();
        for bad in ["", "abc", "a.b.c", "!!!.???", "e30.!!!"] {
            assert!(matches!(parse(bad, &k), Err(TokenError::Invalid(_))), "{bad}");
        }
    }

    #[test]
    fn test_wire_field_names() {
        let token = issue(claims(), &key(), Some("k1")).unwrap();
        let payload = URL_SAFE_NO_PAD.decode(token.split('.').next().unwrap()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        for field in ["user_id", "challenge", "exp", "nonce", "jti", "vk_id", "params_version", "kid", "v"] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
    }

    #[test]
    fn test_keyset_selects_by_kid() {
        let mut set = TokenKeySet::new();
        set.insert("old", key());
        set.insert_default("new", TokenKey::generate());

        let old_token = issue(claims(), &key(), Some("old")).unwrap();
        assert_eq!(parse_with_keyset(&old_token, &set).unwrap().key_id.as_deref(), Some("old"));

        let new_token = issue_with_keyset(claims(), &set).unwrap();
        assert_eq!(parse_with_keyset(&new_token, &set).unwrap().key_id.as_deref(), Some("new"));
    }

    #[test]
    fn test_keyset_without_kid_uses_default() {
        let set = TokenKeySet::single("k1", key());
        let token = issue(claims(), &key(), None).unwrap();
        assert!(parse_with_keyset(&token, &set).is_ok());
    }

    #[test]
    fn test_keyset_unknown_kid_and_empty() {
        let set = TokenKeySet::single("k1", key());
        let token = issue(claims(), &key(), Some("k9")).unwrap();
        assert!(matches!(parse_with_keyset(&token, &set), Err(TokenError::Invalid(_))));
        assert!(matches!(
            parse_with_keyset(&token, &TokenKeySet::new()),
            Err(TokenError::KeyMissing)
        ));
    }

    #[test]
    fn test_kid_is_authenticated() {
        // Re-labelling a token signed by k1 as k2 breaks the MAC.
        let mut set = TokenKeySet::single("k1", key());
        set.insert("k2", TokenKey::generate());
        let token = issue(claims(), &key(), Some("k1")).unwrap();
        let (payload, tag) = token.split_once('.').unwrap();
        let mut json: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();
        json["kid"] = "k2".into();
        let forged = format!("{}.{}", URL_SAFE_NO_PAD.encode(json.to_string()), tag);
        assert!(matches!(parse_with_keyset(&forged, &set), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_keyset_remove_moves_default() {
        let mut set = TokenKeySet::single("a", key());
        set.insert("b", TokenKey::generate());
        set.remove("a");
        assert_eq!(set.default_kid(), Some("b"));
        set.remove("b");
        assert!(set.is_empty());
        assert!(matches!(set.signing_key(), Err(TokenError::KeyMissing)));
    }

    fn service() -> ChallengeTokenService {
        ChallengeTokenService::new(
            TokenKeySet::single("k1", key()),
            &SharedPolicy::default(),
            120,
            Arc::new(MemoryTokenStore::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_service_issue_for() {
        let svc = service();
        let issued = svc.issue_for("alice", "vk-1", NOW).unwrap();
        assert!(issued.challenge >= 1 && issued.challenge <= MAX_CHALLENGE);
        assert_eq!(issued.expires_at, NOW + 120);
        let claims = svc.validate(&issued.token, NOW, "vk-1").unwrap();
        assert_eq!(claims.challenge, issued.challenge);
        assert_eq!(claims.jti, issued.jti);
        assert_eq!(claims.params_version, svc.params_version());
    }

    #[test]
    fn test_service_consume_once() {
        let svc = service();
        let issued = svc.issue_for("alice", "vk-1", NOW).unwrap();
        assert!(svc.consume(&issued.token, NOW, "vk-1").is_ok());
        assert!(matches!(
            svc.consume(&issued.token, NOW, "vk-1"),
            Err(AuthError::ReplayDetected)
        ));
    }

    #[test]
    fn test_service_rejects_other_policy() {
        let svc = service();
        let foreign = issue(claims(), &key(), Some("k1")).unwrap();
        assert!(matches!(
            svc.validate(&foreign, NOW, ""),
            Err(AuthError::PolicyMismatch { .. })
        ));
    }

    #[test]
    fn test_service_requires_key_and_ttl() {
        let store: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());
        assert!(matches!(
            ChallengeTokenService::new(TokenKeySet::new(), &SharedPolicy::default(), 120, store.clone()),
            Err(AuthError::TokenKeyMissing)
        ));
        assert!(matches!(
            ChallengeTokenService::new(TokenKeySet::single("k", key()), &SharedPolicy::default(), 0, store),
            Err(AuthError::InvalidConfig(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_roundtrip(
            user in "[a-z0-9]{1,16}",
            challenge in 1u64..=MAX_CHALLENGE,
            ttl in 1i64..100_000,
        ) {
            let c = ChallengeTokenClaims::new(user.clone(), challenge, NOW + ttl)
                .with_vk_id("vk").with_params_version("pv");
            let token = issue(c, &key(), None).unwrap();
            let parsed = validate(&token, &key(), NOW, "vk", "pv").unwrap();
            prop_assert_eq!(parsed.user_id, user);
            prop_assert_eq!(parsed.challenge, challenge);
            prop_assert_eq!(parsed.expires_at, NOW + ttl);
        }

        #[test]
        fn prop_bit_flip_is_invalid(segment in 0usize..2, byte_sel in any::<prop::sample::Index>(), bit in 0u8..8) {
            let token = issue(claims(), &key(), None).unwrap();
            let (p, t) = token.split_once('.').unwrap();
            let mut parts = [URL_SAFE_NO_PAD.decode(p).unwrap(), URL_SAFE_NO_PAD.decode(t).unwrap()];
            let target = &mut parts[segment];
            let i = byte_sel.index(target.len());
            target[i] ^= 1 << bit;
            let tampered = format!("{}.{}", URL_SAFE_NO_PAD.encode(&parts[0]), URL_SAFE_NO_PAD.encode(&parts[1]));
            let result = validate(&tampered, &key(), NOW, "vk-1", "pv-1");
            prop_assert!(matches!(result, Err(TokenError::Invalid(_))));
        }
    }
}
