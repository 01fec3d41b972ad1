//! # zkid-auth — Passwordless Login Protocol
//!
//! The stateful half of zkid. A login is one round trip:
//!
//! ```text
//!   server                              client
//!   ──────                              ──────
//!   issue_challenge(user) ───token────▶ prove_login(secret, birth_year,
//!                                                   challenge, salt)
//!   verify_login(token, envelope) ◀──ProofResult──
//! ```
//!
//! ## Components
//!
//! - [`token`]: HMAC-signed, stateless challenge tokens and the
//!   [`ChallengeTokenService`] that issues and redeems them.
//! - [`replay`]: the [`TokenStore`] that makes each token single-use.
//! - [`keys`] / [`rotation`]: verifying-key versions, deprecation with a
//!   grace period, and the expiry monitor.
//! - [`bundle`]: the policy bundle clients sync and [`enforce_policy`].
//! - [`login`]: [`AuthProver`] and [`LoginVerifier`].
//! - [`config`]: [`AuthConfig`], from YAML or the environment.
//! - [`task`]: lifecycle for the periodic background jobs.
//!
//! ## Errors
//!
//! Every failure surfaces as an [`AuthError`] whose kind operators can
//! branch on. End users only ever see [`USER_FACING_FAILURE`].

pub mod bundle;
pub mod config;
pub mod error;
pub mod keys;
pub mod login;
pub mod replay;
pub mod rotation;
pub mod task;
pub mod token;

pub use bundle::{enforce_policy, PolicyBundle};
pub use config::AuthConfig;
pub use error::{AuthError, USER_FACING_FAILURE};
pub use keys::{KeyRegistry, KeyRegistryError, KeyVersion, MemoryKeyRegistry};
pub use login::{AuthProver, LoginVerifier};
pub use replay::{
    spawn_cleanup, token_store, MemoryTokenStore, NoopTokenStore, ReplayError, ReplayProtection,
    TokenStore,
};
pub use rotation::{
    ChannelNotifier, LogNotifier, RotationConfig, RotationEvent, RotationEventKind,
    RotationMonitor, RotationNotifier,
};
pub use task::PeriodicTask;
pub use token::{
    ChallengeTokenClaims, ChallengeTokenService, IssuedChallenge, TokenError, TokenKey,
    TokenKeySet, MAX_CHALLENGE, TOKEN_VERSION,
};
