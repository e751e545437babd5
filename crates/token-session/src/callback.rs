//! Authorization callback
//!
//! Second half of the round-trip. The browser comes back to the redirect URI
//! with either `code` + `state` or an RFC 6749 error response. Whatever
//! happens next, the ephemeral verifier and state are gone afterwards and the
//! visible address no longer carries the response parameters, so a reload
//! cannot replay the code.

use oauth_pkce::{CODE_VERIFIER_KEY, STATE_KEY, SessionStore};
use tracing::{info, warn};
use url::Url;

use crate::controller::{SessionController, SessionEvent, TeardownReason};
use crate::error::{Error, Result};
use crate::metrics;
use crate::navigator::Navigator;

/// Query parameters the authorization server adds to the redirect URI.
const RESPONSE_PARAMS: [&str; 7] = [
    "code",
    "state",
    "session_state",
    "iss",
    "error",
    "error_description",
    "error_uri",
];

/// Parameters of an authorization response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackParams {
    Code {
        code: String,
        state: Option<String>,
    },
    Error {
        error: String,
        description: Option<String>,
    },
}

impl CallbackParams {
    /// `None` when the address is not an authorization response.
    pub fn parse(url: &Url) -> Option<Self> {
        let mut code = None;
        let mut state = None;
        let mut error = None;
        let mut description = None;
        for (name, value) in url.query_pairs() {
            match name.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                "error_description" => description = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(error) = error {
            return Some(Self::Error { error, description });
        }
        code.map(|code| Self::Code { code, state })
    }
}

/// What `handle_callback` did with the address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// No authorization response in the address; nothing was touched.
    NotACallback,
    Authenticated,
}

/// The address with all authorization response parameters removed.
pub fn strip_response_params(url: &Url) -> Url {
    strip_query_params(url, &RESPONSE_PARAMS)
}

pub(crate) fn strip_query_params(url: &Url, names: &[&str]) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| !names.contains(&name.as_ref()))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    let mut stripped = url.clone();
    if kept.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.query_pairs_mut().clear().extend_pairs(kept);
    }
    stripped
}

/// Clears the round-trip artifacts and rewrites the address on every exit
/// path, including the future being dropped mid-exchange.
struct RoundTripCleanup<'a> {
    store: &'a SessionStore,
    navigator: &'a dyn Navigator,
    address: Url,
}

impl Drop for RoundTripCleanup<'_> {
    fn drop(&mut self) {
        self.store.ephemeral_remove(&[CODE_VERIFIER_KEY, STATE_KEY]);
        self.navigator.replace_address(&self.address);
    }
}

impl SessionController {
    /// Complete the authorization round-trip if `url` is a callback.
    pub async fn handle_callback(&self, url: &Url) -> Result<CallbackOutcome> {
        let Some(params) = CallbackParams::parse(url) else {
            return Ok(CallbackOutcome::NotACallback);
        };
        let _cleanup = RoundTripCleanup {
            store: &self.inner.store,
            navigator: self.inner.navigator.as_ref(),
            address: strip_response_params(url),
        };

        let (code, returned_state) = match params {
            CallbackParams::Error { error, description } => {
                warn!(error = %error, description = ?description, "authorization denied");
                metrics::record_code_exchange("denied");
                return Err(Error::AuthorizationDenied(match description {
                    Some(description) => format!("{error}: {description}"),
                    None => error,
                }));
            }
            CallbackParams::Code { code, state } => (code, state),
        };

        let stored_state = self.inner.store.ephemeral_get(STATE_KEY);
        let state_matches = matches!(
            (&stored_state, &returned_state),
            (Some(stored), Some(returned)) if stored == returned
        );
        if !state_matches {
            warn!(
                stored = stored_state.is_some(),
                returned = returned_state.is_some(),
                "callback state mismatch, possible CSRF"
            );
            metrics::record_code_exchange("csrf_mismatch");
            self.teardown(TeardownReason::CsrfMismatch).await;
            return Err(Error::CsrfMismatch);
        }

        let Some(verifier) = self.inner.store.ephemeral_take(CODE_VERIFIER_KEY) else {
            warn!("code verifier missing from ephemeral storage");
            metrics::record_code_exchange("missing_verifier");
            return Err(Error::MissingPkceArtifact("code verifier".into()));
        };

        let epoch = self.inner.session.lock().await.epoch;
        let tokens =
            match oauth_pkce::exchange_code(&self.inner.http, &self.inner.config, &code, &verifier)
                .await
            {
                Ok(tokens) => tokens,
                Err(e) => {
                    warn!(error = %e, "authorization code exchange failed");
                    metrics::record_code_exchange("failed");
                    return Err(Error::TokenExchangeFailed(e.to_string()));
                }
            };

        let mut session = self.inner.session.lock().await;
        if session.epoch != epoch {
            warn!("session changed during code exchange, discarding tokens");
            metrics::record_code_exchange("superseded");
            return Err(Error::Superseded);
        }
        self.install_locked(&mut session, tokens).await;
        drop(session);

        metrics::record_code_exchange("success");
        info!("authorization code exchanged, session authenticated");
        let _ = self.inner.events.send(SessionEvent::Authenticated);
        Ok(CallbackOutcome::Authenticated)
    }
}
