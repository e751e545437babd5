//! Error types for OAuth client operations

/// Errors from token endpoint calls and session storage.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("invalid token response: {0}")]
    InvalidTokenResponse(String),

    #[error("logout request failed: {0}")]
    Revocation(String),

    #[error("session store parse error: {0}")]
    StoreParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for OAuth client operations.
pub type Result<T> = std::result::Result<T, Error>;
