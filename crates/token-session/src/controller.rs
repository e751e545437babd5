//! Session controller
//!
//! Single owner of session state. Every transition goes through here: the
//! callback handler installs tokens, the refresher replaces them, and logout,
//! idle expiry, refresh failure and CSRF mismatch all end in the same clearing
//! routine (`teardown_locked`).
//!
//! The session lives behind a tokio Mutex that is never held across a network
//! call. Instead each async completion remembers the session epoch it started
//! under and drops its result if the epoch moved on, so a refresh answered
//! after logout cannot bring the session back.

use std::sync::Arc;

use common::Secret;
use oauth_pkce::{ClientConfig, SessionStore, TOKEN_KEYS, TokenSet};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::callback::{CallbackOutcome, strip_query_params};
use crate::config::{Config, SessionConfig};
use crate::error::{Error, Result};
use crate::idle::{ActivitySignal, IdleMonitor};
use crate::initiator;
use crate::metrics;
use crate::navigator::Navigator;
use crate::refresh::spawn_refresh_task;

/// Query parameter the post-logout redirect carries.
const LOGOUT_PARAM: &str = "logout";

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Anonymous,
    Authenticated { refresh_available: bool },
}

impl SessionStatus {
    pub fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    Logout,
    IdleTimeout,
    RefreshFailed,
    CsrfMismatch,
    /// Page load carrying the post-logout marker.
    PostLogoutRedirect,
}

impl TeardownReason {
    /// Metric label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Logout => "logout",
            Self::IdleTimeout => "idle_timeout",
            Self::RefreshFailed => "refresh_failed",
            Self::CsrfMismatch => "csrf_mismatch",
            Self::PostLogoutRedirect => "post_logout_redirect",
        }
    }
}

/// Transitions broadcast to the shell, e.g. to update a status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Authenticated,
    Resumed,
    Refreshed,
    Ended(TeardownReason),
}

/// What `start` found on page load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The address was an authorization callback and the exchange succeeded.
    Authenticated,
    /// Stored tokens were reinstated.
    Resumed,
    /// Nothing stored; the user has to log in.
    Anonymous,
    /// The address was the post-logout landing page.
    LoggedOut,
}

/// Raw answer from the resource server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceResponse {
    pub status: u16,
    pub body: String,
}

pub(crate) struct Session {
    pub(crate) tokens: Option<TokenSet>,
    /// Bumped whenever a session begins or ends.
    pub(crate) epoch: u64,
    pub(crate) refresh_task: Option<JoinHandle<()>>,
}

pub(crate) struct Inner {
    pub(crate) config: ClientConfig,
    pub(crate) session_config: SessionConfig,
    pub(crate) http: reqwest::Client,
    pub(crate) store: Arc<SessionStore>,
    pub(crate) navigator: Arc<dyn Navigator>,
    pub(crate) session: Mutex<Session>,
    pub(crate) idle: IdleMonitor,
    pub(crate) events: broadcast::Sender<SessionEvent>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = self.session.get_mut().refresh_task.take() {
            task.abort();
        }
    }
}

/// Handle to one user session. Clones share the same session.
#[derive(Clone)]
pub struct SessionController {
    pub(crate) inner: Arc<Inner>,
}

impl SessionController {
    pub fn new(
        config: Config,
        http: reqwest::Client,
        store: Arc<SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let (events, _) = broadcast::channel(16);
        let idle = IdleMonitor::new(
            config.session.idle_timeout,
            config.session.activity_signals.clone(),
        );
        Self {
            inner: Arc::new(Inner {
                config: config.oauth,
                session_config: config.session,
                http,
                store,
                navigator,
                session: Mutex::new(Session {
                    tokens: None,
                    epoch: 0,
                    refresh_task: None,
                }),
                idle,
                events,
            }),
        }
    }

    /// Subscribe to session transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub async fn status(&self) -> SessionStatus {
        let session = self.inner.session.lock().await;
        match &session.tokens {
            Some(tokens) => SessionStatus::Authenticated {
                refresh_available: tokens.refresh_token.is_some(),
            },
            None => SessionStatus::Anonymous,
        }
    }

    /// Current access token, for shells that call resource servers themselves.
    pub async fn access_token(&self) -> Option<Secret<String>> {
        let session = self.inner.session.lock().await;
        session.tokens.as_ref().map(|t| t.access_token.clone())
    }

    pub async fn token_set(&self) -> Option<TokenSet> {
        self.inner.session.lock().await.tokens.clone()
    }

    /// Send the user to the authorization server.
    pub fn login(&self) {
        initiator::initiate(
            &self.inner.config,
            &self.inner.store,
            self.inner.navigator.as_ref(),
        );
    }

    /// Page-load entry point.
    ///
    /// Completes a callback if the address is one, clears the session if the
    /// address is the post-logout landing page, and otherwise resumes stored
    /// tokens.
    pub async fn start(&self, current: &Url) -> Result<StartOutcome> {
        if let CallbackOutcome::Authenticated = self.handle_callback(current).await? {
            return Ok(StartOutcome::Authenticated);
        }

        if current.query_pairs().any(|(name, _)| name == LOGOUT_PARAM) {
            info!("post-logout landing page, clearing local session");
            self.teardown(TeardownReason::PostLogoutRedirect).await;
            self.inner
                .navigator
                .replace_address(&strip_query_params(current, &[LOGOUT_PARAM]));
            return Ok(StartOutcome::LoggedOut);
        }

        if self.resume().await {
            Ok(StartOutcome::Resumed)
        } else {
            Ok(StartOutcome::Anonymous)
        }
    }

    /// Reinstate a session from durable storage.
    ///
    /// The stored access token is trusted as-is; nothing is sent to the
    /// server. Token entries left behind without an access token are removed.
    pub async fn resume(&self) -> bool {
        let mut session = self.inner.session.lock().await;
        if session.tokens.is_some() {
            return true;
        }

        let stored = self.inner.store.durable_snapshot().await;
        match TokenSet::read_from(&stored) {
            Some(tokens) => {
                self.activate_locked(&mut session, tokens);
                drop(session);
                info!("resumed session from storage");
                let _ = self.inner.events.send(SessionEvent::Resumed);
                true
            }
            None => {
                if self.inner.store.durable_contains_any(&TOKEN_KEYS).await {
                    warn!("clearing stored tokens without an access token");
                    if let Err(e) = self.inner.store.durable_remove(&TOKEN_KEYS).await {
                        warn!(error = %e, "failed to clear orphaned tokens");
                    }
                }
                false
            }
        }
    }

    /// End the session.
    ///
    /// The server-side logout call is best effort: local state is cleared
    /// whatever it returns, and a failure is reported only afterwards.
    pub async fn logout(&self) -> Result<()> {
        let access_token = self.access_token().await;
        let revocation = match (&self.inner.config.logout_endpoint, &access_token) {
            (Some(endpoint), Some(token)) => Some(
                oauth_pkce::revoke_session(&self.inner.http, endpoint, token.expose_str()).await,
            ),
            _ => None,
        };

        self.teardown(TeardownReason::Logout).await;

        match revocation {
            Some(Err(e)) => {
                warn!(error = %e, "server-side logout failed, local session cleared");
                Err(Error::LogoutRequestFailed(e.to_string()))
            }
            _ => {
                if let Some(landing) = &self.inner.config.post_logout_redirect_uri {
                    self.inner.navigator.navigate(landing);
                }
                Ok(())
            }
        }
    }

    /// Push the idle deadline back. No-op while anonymous.
    pub fn reset_idle_timer(&self) -> bool {
        self.inner.idle.reset()
    }

    /// Report user activity; only configured signals reset the idle deadline.
    pub fn record_activity(&self, signal: ActivitySignal) -> bool {
        self.inner.idle.record_activity(signal)
    }

    /// GET a protected resource with the current bearer token.
    ///
    /// Any status comes back to the caller; a 401 here does not end the
    /// session.
    pub async fn fetch_resource(&self, url: &Url) -> Result<ResourceResponse> {
        let token = self.access_token().await.ok_or(Error::NotAuthenticated)?;

        let response = self
            .inner
            .http
            .get(url.clone())
            .bearer_auth(token.expose_str())
            .send()
            .await
            .map_err(|e| Error::Resource(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Resource(e.to_string()))?;
        debug!(url = %url, status, "resource fetched");
        Ok(ResourceResponse { status, body })
    }

    /// Persist a fresh token set and make it the active session.
    pub(crate) async fn install_locked(&self, session: &mut Session, tokens: TokenSet) {
        self.persist_tokens(&tokens).await;
        self.activate_locked(session, tokens);
    }

    fn activate_locked(&self, session: &mut Session, tokens: TokenSet) {
        session.epoch = session.epoch.wrapping_add(1);
        session.tokens = Some(tokens);
        self.start_timers(session);
    }

    /// Start the refresh ticker and arm the idle deadline for the current
    /// epoch, cancelling whatever ran before.
    fn start_timers(&self, session: &mut Session) {
        if let Some(previous) = session.refresh_task.take() {
            previous.abort();
        }
        let epoch = session.epoch;

        let weak = Arc::downgrade(&self.inner);
        session.refresh_task = Some(spawn_refresh_task(
            self.inner.session_config.refresh_interval,
            move || {
                let Some(inner) = weak.upgrade() else {
                    return false;
                };
                let controller = SessionController { inner };
                // Detached: aborting the ticker during teardown must not
                // cancel the teardown this refresh may be running.
                tokio::spawn(async move {
                    if let Err(e) = controller.refresh_in_epoch(Some(epoch)).await {
                        debug!(error = %e, "scheduled refresh ended the session");
                    }
                });
                true
            },
        ));

        let weak = Arc::downgrade(&self.inner);
        self.inner.idle.arm(move || {
            if let Some(inner) = weak.upgrade() {
                let controller = SessionController { inner };
                tokio::spawn(async move { controller.expire_idle(epoch).await });
            }
        });
    }

    async fn expire_idle(&self, epoch: u64) {
        let mut session = self.inner.session.lock().await;
        if session.epoch != epoch || session.tokens.is_none() {
            debug!("stale idle deadline ignored");
            return;
        }
        info!(
            timeout_secs = self.inner.session_config.idle_timeout.as_secs(),
            "session idle, logging out"
        );
        let ended = self
            .teardown_locked(&mut session, TeardownReason::IdleTimeout)
            .await;
        drop(session);

        self.revoke_quietly(ended).await;
    }

    /// Tell the server a session ended on our side. Runs after the local
    /// teardown, outside the session lock; failures are only logged.
    pub(crate) async fn revoke_quietly(&self, ended: Option<TokenSet>) {
        let (Some(endpoint), Some(tokens)) = (&self.inner.config.logout_endpoint, ended) else {
            return;
        };
        match oauth_pkce::revoke_session(
            &self.inner.http,
            endpoint,
            tokens.access_token.expose_str(),
        )
        .await
        {
            Ok(()) => debug!("server-side session revoked"),
            Err(e) => warn!(error = %e, "server-side logout failed after session ended"),
        }
    }

    pub(crate) async fn teardown(&self, reason: TeardownReason) {
        let mut session = self.inner.session.lock().await;
        self.teardown_locked(&mut session, reason).await;
    }

    /// The one clearing routine. Timers go first so nothing scheduled can
    /// observe a half-cleared session. Returns the tokens that were live.
    pub(crate) async fn teardown_locked(
        &self,
        session: &mut Session,
        reason: TeardownReason,
    ) -> Option<TokenSet> {
        if let Some(task) = session.refresh_task.take() {
            task.abort();
        }
        self.inner.idle.disarm();

        session.epoch = session.epoch.wrapping_add(1);
        let ended = session.tokens.take();
        if let Err(e) = self.inner.store.durable_remove(&TOKEN_KEYS).await {
            warn!(error = %e, "failed to clear stored tokens");
        }

        metrics::record_teardown(reason);
        info!(reason = reason.label(), "session ended");
        let _ = self.inner.events.send(SessionEvent::Ended(reason));
        ended
    }

    #[cfg(test)]
    pub(crate) async fn epoch(&self) -> u64 {
        self.inner.session.lock().await.epoch
    }

    #[cfg(test)]
    pub(crate) async fn refresh_timer_running(&self) -> bool {
        let session = self.inner.session.lock().await;
        session
            .refresh_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    #[cfg(test)]
    pub(crate) async fn refresh_abort_handle(&self) -> Option<tokio::task::AbortHandle> {
        let session = self.inner.session.lock().await;
        session.refresh_task.as_ref().map(JoinHandle::abort_handle)
    }

    #[cfg(test)]
    pub(crate) fn idle_armed(&self) -> bool {
        self.inner.idle.is_armed()
    }
}
