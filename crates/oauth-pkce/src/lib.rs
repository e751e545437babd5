//! OAuth 2.0 Authorization Code + PKCE client primitives
//!
//! Provides PKCE artifact generation, authorization URL construction, the
//! token endpoint client (code exchange, refresh, logout revocation) and the
//! session store used by the session controller. This crate holds no session
//! state of its own; `token-session` drives the lifecycle.
//!
//! Authorization flow:
//! 1. `PkceArtifact::generate()` + `pkce::generate_state()`
//! 2. User is sent to `authorize::build_authorization_url()`
//! 3. Redirect back carries `code` + `state`; caller calls `token::exchange_code()`
//! 4. Tokens land in `storage::SessionStore` via `TokenSet::write_to()`
//! 5. `token::refresh_token()` runs on a fixed cadence until logout

pub mod authorize;
pub mod config;
pub mod constants;
pub mod error;
pub mod pkce;
pub mod storage;
pub mod token;

pub use authorize::build_authorization_url;
pub use config::ClientConfig;
pub use constants::*;
pub use error::{Error, Result};
pub use pkce::{PkceArtifact, compute_challenge, generate_state, generate_verifier};
pub use storage::SessionStore;
pub use token::{TokenSet, exchange_code, refresh_token, revoke_session};
