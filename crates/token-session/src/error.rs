//! Error types for session operations

/// Errors surfaced to the UI shell by session operations.
///
/// Timer-driven failures (idle expiry, background refresh) never reach the
/// shell as errors; they end the session and are reported as
/// `SessionEvent::Ended`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid state: possible CSRF detected")]
    CsrfMismatch,

    #[error("missing PKCE artifact: {0}")]
    MissingPkceArtifact(String),

    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("logout request failed: {0}")]
    LogoutRequestFailed(String),

    #[error("session changed while the request was in flight")]
    Superseded,

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("resource request failed: {0}")]
    Resource(String),
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;
