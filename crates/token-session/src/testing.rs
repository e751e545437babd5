//! Shared test fixtures: an in-process authorization server and a recording
//! navigator.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Form;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use oauth_pkce::{ClientConfig, DEFAULT_SCOPES, STATE_KEY, SessionStore};
use tokio::net::TcpListener;
use url::Url;

use crate::callback::CallbackOutcome;
use crate::config::{Config, SessionConfig};
use crate::controller::SessionController;
use crate::error::Result;
use crate::navigator::Navigator;

pub(crate) const REDIRECT_URI: &str = "http://127.0.0.1:8080/";

/// Canned answer for one mock endpoint.
#[derive(Clone)]
pub(crate) struct Reply {
    status: u16,
    body: String,
    delay: Duration,
}

impl Reply {
    pub(crate) fn ok(body: &str) -> Self {
        Self::status(200, body)
    }

    pub(crate) fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_owned(),
            delay: Duration::ZERO,
        }
    }

    /// Hold the response back, e.g. to let logout overtake it.
    pub(crate) fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    async fn respond(self) -> Response {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, [(header::CONTENT_TYPE, "application/json")], self.body).into_response()
    }
}

struct ServerState {
    token_reply: Mutex<Reply>,
    logout_reply: Mutex<Reply>,
    resource_reply: Mutex<Reply>,
    token_forms: Mutex<Vec<HashMap<String, String>>>,
    token_hits: AtomicUsize,
    logout_headers: Mutex<Vec<Option<String>>>,
    resource_headers: Mutex<Vec<Option<String>>>,
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

async fn token_endpoint(
    State(state): State<Arc<ServerState>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state.token_forms.lock().unwrap().push(form);
    state.token_hits.fetch_add(1, Ordering::SeqCst);
    let reply = state.token_reply.lock().unwrap().clone();
    reply.respond().await
}

async fn logout_endpoint(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    state.logout_headers.lock().unwrap().push(bearer(&headers));
    let reply = state.logout_reply.lock().unwrap().clone();
    reply.respond().await
}

async fn resource_endpoint(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    state.resource_headers.lock().unwrap().push(bearer(&headers));
    let reply = state.resource_reply.lock().unwrap().clone();
    reply.respond().await
}

/// Token, logout and resource endpoints on an ephemeral local port.
pub(crate) struct MockAuthServer {
    base: Url,
    state: Arc<ServerState>,
}

impl MockAuthServer {
    pub(crate) async fn start() -> Self {
        let state = Arc::new(ServerState {
            token_reply: Mutex::new(Reply::ok(
                r#"{"access_token":"AT1","refresh_token":"RT1","id_token":"ID1","token_type":"Bearer","expires_in":300}"#,
            )),
            logout_reply: Mutex::new(Reply::status(200, "")),
            resource_reply: Mutex::new(Reply::ok(r#"{"message":"hello"}"#)),
            token_forms: Mutex::new(Vec::new()),
            token_hits: AtomicUsize::new(0),
            logout_headers: Mutex::new(Vec::new()),
            resource_headers: Mutex::new(Vec::new()),
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = axum::Router::new()
            .route("/oauth2/token", post(token_endpoint))
            .route("/api/users/logout", post(logout_endpoint))
            .route("/api/resource", get(resource_endpoint))
            .with_state(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{addr}/").parse().unwrap(),
            state,
        }
    }

    pub(crate) fn base(&self) -> &Url {
        &self.base
    }

    pub(crate) fn resource_url(&self) -> Url {
        self.base.join("api/resource").unwrap()
    }

    pub(crate) fn set_token_reply(&self, reply: Reply) {
        *self.state.token_reply.lock().unwrap() = reply;
    }

    pub(crate) fn set_logout_reply(&self, reply: Reply) {
        *self.state.logout_reply.lock().unwrap() = reply;
    }

    pub(crate) fn set_resource_reply(&self, reply: Reply) {
        *self.state.resource_reply.lock().unwrap() = reply;
    }

    pub(crate) fn token_hits(&self) -> usize {
        self.state.token_hits.load(Ordering::SeqCst)
    }

    pub(crate) fn token_forms(&self) -> Vec<HashMap<String, String>> {
        self.state.token_forms.lock().unwrap().clone()
    }

    /// Resolves once the token endpoint has received `n` requests.
    pub(crate) async fn wait_for_token_hits(&self, n: usize) {
        while self.token_hits() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    pub(crate) fn logout_hits(&self) -> usize {
        self.state.logout_headers.lock().unwrap().len()
    }

    /// Resolves once the logout endpoint has received `n` requests.
    pub(crate) async fn wait_for_logout_hits(&self, n: usize) {
        while self.logout_hits() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    pub(crate) fn logout_auth_headers(&self) -> Vec<Option<String>> {
        self.state.logout_headers.lock().unwrap().clone()
    }

    pub(crate) fn resource_auth_headers(&self) -> Vec<Option<String>> {
        self.state.resource_headers.lock().unwrap().clone()
    }
}

/// Navigator that remembers every call.
#[derive(Default)]
pub(crate) struct RecordingNavigator {
    navigations: Mutex<Vec<Url>>,
    replacements: Mutex<Vec<Url>>,
}

impl RecordingNavigator {
    pub(crate) fn navigations(&self) -> Vec<Url> {
        self.navigations.lock().unwrap().clone()
    }

    pub(crate) fn replacements(&self) -> Vec<Url> {
        self.replacements.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &Url) {
        self.navigations.lock().unwrap().push(url.clone());
    }

    fn replace_address(&self, url: &Url) {
        self.replacements.lock().unwrap().push(url.clone());
    }
}

/// Client registration pointing every endpoint at `base`.
pub(crate) fn test_client_config(base: &Url) -> ClientConfig {
    ClientConfig {
        client_id: "spa-client".into(),
        redirect_uri: Url::parse(REDIRECT_URI).unwrap(),
        authorization_endpoint: base.join("oauth2/authorize").unwrap(),
        token_endpoint: base.join("oauth2/token").unwrap(),
        logout_endpoint: Some(base.join("api/users/logout").unwrap()),
        post_logout_redirect_uri: Some(
            Url::parse(&format!("{REDIRECT_URI}?logout=success")).unwrap(),
        ),
        scopes: DEFAULT_SCOPES.into(),
    }
}

/// A controller wired to a mock server, an in-memory or file store, and a
/// recording navigator.
pub(crate) struct Harness {
    pub(crate) controller: SessionController,
    pub(crate) store: Arc<SessionStore>,
    pub(crate) navigator: Arc<RecordingNavigator>,
    pub(crate) server: MockAuthServer,
}

impl Harness {
    pub(crate) async fn start() -> Self {
        Self::with_session(SessionConfig::default()).await
    }

    pub(crate) async fn with_session(session: SessionConfig) -> Self {
        Self::with_store(Arc::new(SessionStore::in_memory()), session).await
    }

    pub(crate) async fn with_store(store: Arc<SessionStore>, session: SessionConfig) -> Self {
        let server = MockAuthServer::start().await;
        let oauth = test_client_config(server.base());
        Self::build(server, oauth, store, session)
    }

    /// Logout endpoint on a port nobody listens on.
    pub(crate) async fn start_with_dead_logout() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead = listener.local_addr().unwrap();
        drop(listener);

        let server = MockAuthServer::start().await;
        let mut oauth = test_client_config(server.base());
        oauth.logout_endpoint = Some(format!("http://{dead}/api/users/logout").parse().unwrap());
        Self::build(
            server,
            oauth,
            Arc::new(SessionStore::in_memory()),
            SessionConfig::default(),
        )
    }

    fn build(
        server: MockAuthServer,
        oauth: ClientConfig,
        store: Arc<SessionStore>,
        session: SessionConfig,
    ) -> Self {
        let navigator = Arc::new(RecordingNavigator::default());
        let controller = SessionController::new(
            Config { oauth, session },
            reqwest::Client::new(),
            store.clone(),
            navigator.clone(),
        );
        Self {
            controller,
            store,
            navigator,
            server,
        }
    }

    pub(crate) async fn seed_tokens(&self, entries: &[(&str, &str)]) {
        self.store
            .update_durable(|map| {
                for (key, value) in entries {
                    map.insert((*key).to_owned(), (*value).to_owned());
                }
            })
            .await
            .unwrap();
    }

    pub(crate) async fn durable(&self, key: &str) -> Option<String> {
        self.store.durable_get(key).await
    }

    pub(crate) fn callback_url(&self, code: &str, state: &str) -> Url {
        let mut url = Url::parse(REDIRECT_URI).unwrap();
        url.query_pairs_mut()
            .append_pair("code", code)
            .append_pair("state", state);
        url
    }

    /// Run `login` and answer with the stored state, as a well-behaved
    /// authorization server would.
    pub(crate) async fn login_and_callback(&self) -> Result<CallbackOutcome> {
        self.controller.login();
        let state = self.store.ephemeral_get(STATE_KEY).unwrap_or_default();
        self.controller
            .handle_callback(&self.callback_url("abc123", &state))
            .await
    }
}
