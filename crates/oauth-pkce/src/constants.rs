//! Storage keys and protocol defaults
//!
//! Key names match the ones the browser client kept in `localStorage` and
//! `sessionStorage`, so a shell migrating from it finds the same entries.

/// Durable key holding the current access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Durable key holding the refresh token, absent when none was issued.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Durable key holding the OIDC id token, absent when none was issued.
pub const ID_TOKEN_KEY: &str = "id_token";

/// Durable key holding the raw JSON of the last token endpoint response.
pub const TOKEN_RESPONSE_KEY: &str = "token_response";

/// Every durable key that belongs to an authenticated session. Teardown
/// removes all of them.
pub const TOKEN_KEYS: [&str; 4] = [
    ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
    ID_TOKEN_KEY,
    TOKEN_RESPONSE_KEY,
];

/// Ephemeral key holding the PKCE code verifier for one round-trip.
pub const CODE_VERIFIER_KEY: &str = "code_verifier";

/// Ephemeral key holding the anti-CSRF state for one round-trip.
pub const STATE_KEY: &str = "oauth_state";

/// Scopes requested when the configuration does not name any.
/// `offline_access` is what makes the server issue a refresh token.
pub const DEFAULT_SCOPES: &str = "openid profile read write offline_access";

/// PKCE challenge method. Only S256 is ever sent.
pub const CODE_CHALLENGE_METHOD: &str = "S256";
