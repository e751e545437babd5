//! PKCE (Proof Key for Code Exchange) implementation per RFC 7636
//!
//! Generates the code verifier, its S256 challenge, and the anti-CSRF state
//! used during one authorization attempt. The verifier stays on the client
//! and is sent during the code exchange; the challenge and state travel in
//! the authorization URL.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};

/// Random bytes behind a code verifier (43 base64url characters).
const VERIFIER_BYTES: usize = 32;

/// Random bytes behind an anti-CSRF state (32 hex characters).
const STATE_BYTES: usize = 16;

/// Verifier/challenge pair for a single authorization attempt.
#[derive(Debug, Clone)]
pub struct PkceArtifact {
    pub verifier: String,
    pub challenge: String,
}

impl PkceArtifact {
    /// Draw a fresh verifier and derive its challenge.
    pub fn generate() -> Self {
        let verifier = generate_verifier();
        let challenge = compute_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

/// Generate a cryptographically random PKCE code verifier.
///
/// 32 bytes from the thread-local CSPRNG, URL-safe base64 without padding.
/// RFC 7636 requires 43-128 characters; 32 bytes encode to exactly 43.
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; VERIFIER_BYTES];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compute the S256 code challenge from a verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))`
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generate the anti-CSRF `state` value.
///
/// Separate 16-byte draw, hex-encoded, so it shares no bits with the verifier.
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}
