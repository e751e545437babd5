//! Client registration settings
//!
//! Identifies this public client to the authorization server and names the
//! endpoints it talks to. None of these values are secrets.

use serde::Deserialize;
use url::Url;

use crate::constants::DEFAULT_SCOPES;

/// Public client configuration for the authorization code flow.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub client_id: String,
    /// Where the authorization server sends the browser back to.
    pub redirect_uri: Url,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    /// Server-side logout/revocation endpoint. Optional: without it logout
    /// is purely local.
    #[serde(default)]
    pub logout_endpoint: Option<Url>,
    /// Page to navigate to after a successful server-side logout.
    #[serde(default)]
    pub post_logout_redirect_uri: Option<Url>,
    /// Space-delimited scope list.
    #[serde(default = "default_scopes")]
    pub scopes: String,
}

fn default_scopes() -> String {
    DEFAULT_SCOPES.to_owned()
}

impl ClientConfig {
    /// Check the values serde cannot: a non-empty client id, http(s)
    /// endpoints, and at least one scope.
    pub fn validate(&self) -> common::Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(common::Error::Config("client_id must not be empty".into()));
        }

        let endpoints = [
            ("redirect_uri", Some(&self.redirect_uri)),
            ("authorization_endpoint", Some(&self.authorization_endpoint)),
            ("token_endpoint", Some(&self.token_endpoint)),
            ("logout_endpoint", self.logout_endpoint.as_ref()),
            (
                "post_logout_redirect_uri",
                self.post_logout_redirect_uri.as_ref(),
            ),
        ];
        for (name, url) in endpoints {
            if let Some(url) = url {
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(common::Error::Config(format!(
                        "{name} must use http:// or https://, got: {url}"
                    )));
                }
            }
        }

        if self.scopes.split_whitespace().next().is_none() {
            return Err(common::Error::Config("scopes must not be empty".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig {
            client_id: "spa-client".into(),
            redirect_uri: Url::parse("http://127.0.0.1:8080/").unwrap(),
            authorization_endpoint: Url::parse("http://localhost:9001/oauth2/authorize").unwrap(),
            token_endpoint: Url::parse("http://localhost:9001/oauth2/token").unwrap(),
            logout_endpoint: None,
            post_logout_redirect_uri: None,
            scopes: DEFAULT_SCOPES.into(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn blank_client_id_rejected() {
        let mut config = config();
        config.client_id = "   ".into();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("client_id"), "got: {err}");
    }

    #[test]
    fn non_http_endpoint_rejected() {
        let mut config = config();
        config.logout_endpoint = Some(Url::parse("ftp://localhost/logout").unwrap());
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("logout_endpoint"), "got: {err}");
    }

    #[test]
    fn empty_scopes_rejected() {
        let mut config = config();
        config.scopes = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn scopes_default_when_omitted() {
        let json = serde_json::json!({
            "client_id": "spa-client",
            "redirect_uri": "http://127.0.0.1:8080/",
            "authorization_endpoint": "http://localhost:9001/oauth2/authorize",
            "token_endpoint": "http://localhost:9001/oauth2/token",
        });
        let config: ClientConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.scopes, DEFAULT_SCOPES);
        assert!(config.logout_endpoint.is_none());
    }
}
