//! Authorization endpoint URL construction

use url::Url;

use crate::config::ClientConfig;
use crate::constants::CODE_CHALLENGE_METHOD;

/// Build the full authorization URL with all required OAuth parameters.
///
/// Parameters are appended to whatever query the configured endpoint already
/// carries and are form-encoded by `url`, so redirect URIs and the
/// space-delimited scope list survive intact.
pub fn build_authorization_url(config: &ClientConfig, challenge: &str, state: &str) -> Url {
    let mut url = config.authorization_endpoint.clone();
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", config.redirect_uri.as_str())
        .append_pair("scope", &config.scopes)
        .append_pair("code_challenge", challenge)
        .append_pair("code_challenge_method", CODE_CHALLENGE_METHOD)
        .append_pair("state", state);
    url
}
