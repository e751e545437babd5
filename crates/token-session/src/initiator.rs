//! Authorization redirect
//!
//! First half of the round-trip: fresh PKCE artifacts and anti-CSRF state go
//! into ephemeral storage, then the shell leaves for the authorization
//! endpoint. A second call before the callback overwrites the first attempt's
//! values, so only the latest redirect can complete.

use oauth_pkce::{
    CODE_VERIFIER_KEY, ClientConfig, PkceArtifact, STATE_KEY, SessionStore,
    build_authorization_url, generate_state,
};
use tracing::info;

use crate::navigator::Navigator;

pub fn initiate(config: &ClientConfig, store: &SessionStore, navigator: &dyn Navigator) {
    let pkce = PkceArtifact::generate();
    let state = generate_state();

    store.ephemeral_set(CODE_VERIFIER_KEY, &pkce.verifier);
    store.ephemeral_set(STATE_KEY, &state);

    let url = build_authorization_url(config, &pkce.challenge, &state);
    info!(
        endpoint = %config.authorization_endpoint,
        client_id = %config.client_id,
        "redirecting to authorization endpoint"
    );
    navigator.navigate(&url);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingNavigator, test_client_config};
    use oauth_pkce::compute_challenge;
    use std::collections::HashMap;
    use url::Url;

    fn base() -> Url {
        Url::parse("http://localhost:9001/").unwrap()
    }

    #[test]
    fn initiate_stores_artifacts_and_navigates() {
        let config = test_client_config(&base());
        let store = SessionStore::in_memory();
        let navigator = RecordingNavigator::default();

        initiate(&config, &store, &navigator);

        let verifier = store.ephemeral_get(CODE_VERIFIER_KEY).unwrap();
        let state = store.ephemeral_get(STATE_KEY).unwrap();
        assert_eq!(verifier.len(), 43);
        assert_eq!(state.len(), 32);

        let navigated = navigator.navigations();
        assert_eq!(navigated.len(), 1);
        let params: HashMap<String, String> =
            navigated[0].query_pairs().into_owned().collect();
        assert_eq!(params["state"], state);
        assert_eq!(params["code_challenge"], compute_challenge(&verifier));
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["response_type"], "code");
        assert!(!navigated[0].as_str().contains(&verifier), "verifier must never leave");
    }

    #[test]
    fn second_attempt_overwrites_first() {
        let config = test_client_config(&base());
        let store = SessionStore::in_memory();
        let navigator = RecordingNavigator::default();

        initiate(&config, &store, &navigator);
        let first_state = store.ephemeral_get(STATE_KEY).unwrap();
        initiate(&config, &store, &navigator);
        let second_state = store.ephemeral_get(STATE_KEY).unwrap();

        assert_ne!(first_state, second_state);
        assert_eq!(navigator.navigations().len(), 2);
    }

    #[tokio::test]
    async fn initiate_leaves_durable_storage_alone() {
        let config = test_client_config(&base());
        let store = SessionStore::in_memory();
        initiate(&config, &store, &RecordingNavigator::default());

        assert!(store.durable_snapshot().await.is_empty());
    }
}
