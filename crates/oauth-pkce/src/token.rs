//! Token endpoint client
//!
//! Handles the three back-channel calls of a session:
//! 1. Authorization code exchange (completes the redirect round-trip)
//! 2. Token refresh (fixed-cadence silent refresh)
//! 3. Logout revocation (best effort, bearer-authenticated)
//!
//! Exchange and refresh POST form-encoded bodies to the token endpoint and
//! parse the JSON response against a strict schema: `access_token` is
//! mandatory and non-empty, `refresh_token` and `id_token` are optional.

use std::collections::HashMap;
use std::fmt;

use common::Secret;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::constants::{ACCESS_TOKEN_KEY, ID_TOKEN_KEY, REFRESH_TOKEN_KEY, TOKEN_RESPONSE_KEY};
use crate::error::{Error, Result};

/// Tokens held by an authenticated session.
///
/// `raw` keeps the full response object so shells can read fields this
/// crate does not model (`scope`, `expires_in`, vendor extensions).
#[derive(Clone)]
pub struct TokenSet {
    pub access_token: Secret<String>,
    pub refresh_token: Option<Secret<String>>,
    pub id_token: Option<Secret<String>>,
    pub raw: serde_json::Value,
}

/// Wire schema of a token endpoint response.
#[derive(Deserialize)]
struct TokenFields {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
}

impl TokenSet {
    /// Validate a token endpoint response body.
    ///
    /// Empty optional tokens are treated as absent. An empty access token is
    /// rejected: an authenticated session always has one.
    pub fn from_response(raw: serde_json::Value) -> Result<Self> {
        let fields = TokenFields::deserialize(&raw)
            .map_err(|e| Error::InvalidTokenResponse(e.to_string()))?;

        if fields.access_token.is_empty() {
            return Err(Error::InvalidTokenResponse(
                "access_token must not be empty".into(),
            ));
        }

        Ok(Self {
            access_token: Secret::new(fields.access_token),
            refresh_token: non_empty(fields.refresh_token),
            id_token: non_empty(fields.id_token),
            raw,
        })
    }

    /// Keep the previous refresh and id tokens when a refresh response omits
    /// them. Servers that do not rotate refresh tokens leave the old one valid.
    pub fn carry_over(mut self, previous: &TokenSet) -> Self {
        if self.refresh_token.is_none() {
            self.refresh_token = previous.refresh_token.clone();
        }
        if self.id_token.is_none() {
            self.id_token = previous.id_token.clone();
        }
        self
    }

    /// Write this set into the durable map, removing keys for absent tokens.
    pub fn write_to(&self, map: &mut HashMap<String, String>) {
        map.insert(
            ACCESS_TOKEN_KEY.to_owned(),
            self.access_token.expose().clone(),
        );
        put_optional(map, REFRESH_TOKEN_KEY, self.refresh_token.as_ref());
        put_optional(map, ID_TOKEN_KEY, self.id_token.as_ref());
        map.insert(TOKEN_RESPONSE_KEY.to_owned(), self.raw.to_string());
    }

    /// Rebuild a set from the durable map. `None` unless a non-empty access
    /// token is stored.
    pub fn read_from(map: &HashMap<String, String>) -> Option<Self> {
        let access = map.get(ACCESS_TOKEN_KEY).filter(|t| !t.is_empty())?;
        let raw = map
            .get(TOKEN_RESPONSE_KEY)
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or(serde_json::Value::Null);

        Some(Self {
            access_token: Secret::new(access.clone()),
            refresh_token: non_empty(map.get(REFRESH_TOKEN_KEY).cloned()),
            id_token: non_empty(map.get(ID_TOKEN_KEY).cloned()),
            raw,
        })
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // raw is left out: it contains the same tokens in clear text
        f.debug_struct("TokenSet")
            .field("access_token", &self.access_token)
            .field("refresh_token", &self.refresh_token)
            .field("id_token", &self.id_token)
            .finish_non_exhaustive()
    }
}

fn non_empty(token: Option<String>) -> Option<Secret<String>> {
    token.filter(|t| !t.is_empty()).map(Secret::new)
}

fn put_optional(map: &mut HashMap<String, String>, key: &str, token: Option<&Secret<String>>) {
    match token {
        Some(token) => {
            map.insert(key.to_owned(), token.expose().clone());
        }
        None => {
            map.remove(key);
        }
    }
}

/// Exchange an authorization code for tokens.
///
/// Second half of the PKCE flow: the browser came back with `code`, and the
/// verifier proves this client started the flow. The body is only trusted as
/// a token set when the status is 2xx.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &ClientConfig,
    code: &str,
    verifier: &str,
) -> Result<TokenSet> {
    let response = client
        .post(config.token_endpoint.clone())
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("client_id", config.client_id.as_str()),
            ("code_verifier", verifier),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::TokenExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    let raw = response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| Error::InvalidTokenResponse(e.to_string()))?;
    debug!("authorization code exchanged");
    TokenSet::from_response(raw)
}

/// Exchange a refresh token for a new access token.
///
/// 401/403 are reported as `InvalidCredentials` (refresh token revoked or
/// expired); other failures as `TokenExchange`. The caller treats both as
/// fatal for the session.
pub async fn refresh_token(
    client: &reqwest::Client,
    config: &ClientConfig,
    refresh: &str,
) -> Result<TokenSet> {
    let response = client
        .post(config.token_endpoint.clone())
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh),
            ("client_id", config.client_id.as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::InvalidCredentials(format!(
                "refresh token rejected ({status}): {body}"
            )));
        }

        return Err(Error::TokenExchange(format!(
            "token refresh returned {status}: {body}"
        )));
    }

    let raw = response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| Error::InvalidTokenResponse(e.to_string()))?;
    TokenSet::from_response(raw)
}

/// Ask the server to end its side of the session.
pub async fn revoke_session(
    client: &reqwest::Client,
    endpoint: &Url,
    access_token: &str,
) -> Result<()> {
    let response = client
        .post(endpoint.clone())
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| Error::Http(format!("logout request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::Revocation(format!(
            "logout endpoint returned {status}"
        )));
    }
    Ok(())
}
