//! Silent token refresh
//!
//! A fixed-period ticker exchanges the refresh token for a new access token
//! while the session is authenticated. The cadence does not look at token
//! expiry: the period is configured below the server's access token lifetime.
//! A rejected refresh ends the session and tells the server so; nothing is
//! retried.

use std::time::Duration;

use oauth_pkce::TokenSet;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::controller::{SessionController, SessionEvent, TeardownReason};
use crate::error::{Error, Result};
use crate::metrics;

/// What a refresh attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New tokens installed.
    Refreshed,
    /// Authenticated, but no refresh token was issued.
    Unavailable,
    /// Nothing to refresh: the session is anonymous.
    Skipped,
    /// The session ended or was replaced while the request was in flight;
    /// the response was discarded.
    Superseded,
}

impl RefreshOutcome {
    fn label(self) -> &'static str {
        match self {
            Self::Refreshed => "refreshed",
            Self::Unavailable => "unavailable",
            Self::Skipped => "skipped",
            Self::Superseded => "superseded",
        }
    }
}

/// Spawn a ticker that calls `on_tick` every `interval` until it returns
/// `false` or the task is aborted.
///
/// The immediate first tick is skipped since tokens were just installed.
/// Ticks missed while the runtime was busy are delayed, not bursted.
pub fn spawn_refresh_task<F>(interval: Duration, on_tick: F) -> JoinHandle<()>
where
    F: Fn() -> bool + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if !on_tick() {
                debug!("refresh ticker stopped");
                break;
            }
        }
    })
}

impl SessionController {
    /// Refresh the current session now.
    ///
    /// A failed refresh tears the session down before `RefreshFailed` is
    /// returned.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        self.refresh_in_epoch(None).await
    }

    /// Refresh, but only if the session is still the one `expected` names.
    /// Ticks from a replaced session's ticker land here.
    pub(crate) async fn refresh_in_epoch(&self, expected: Option<u64>) -> Result<RefreshOutcome> {
        let (epoch, previous) = {
            let session = self.inner.session.lock().await;
            if expected.is_some_and(|expected| expected != session.epoch) {
                return Ok(record(RefreshOutcome::Superseded));
            }
            match &session.tokens {
                Some(tokens) => (session.epoch, tokens.clone()),
                None => return Ok(record(RefreshOutcome::Skipped)),
            }
        };

        let Some(sent) = previous.refresh_token.clone() else {
            debug!("no refresh token issued, skipping refresh");
            return Ok(record(RefreshOutcome::Unavailable));
        };

        let result =
            oauth_pkce::refresh_token(&self.inner.http, &self.inner.config, sent.expose_str())
                .await;

        // A successful refresh keeps the epoch, so an overlapping refresh
        // is detected by the rotated refresh token instead.
        let mut session = self.inner.session.lock().await;
        let current = session
            .tokens
            .as_ref()
            .and_then(|tokens| tokens.refresh_token.as_ref());
        if session.epoch != epoch || current != Some(&sent) {
            debug!("session changed during refresh, discarding response");
            return Ok(record(RefreshOutcome::Superseded));
        }

        match result {
            Ok(fresh) => {
                let tokens = fresh.carry_over(&previous);
                self.persist_tokens(&tokens).await;
                session.tokens = Some(tokens);
                drop(session);

                info!("access token refreshed");
                let _ = self.inner.events.send(SessionEvent::Refreshed);
                Ok(record(RefreshOutcome::Refreshed))
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed, ending session");
                metrics::record_refresh("failed");
                let ended = self
                    .teardown_locked(&mut session, TeardownReason::RefreshFailed)
                    .await;
                drop(session);

                self.revoke_quietly(ended).await;
                Err(Error::RefreshFailed(e.to_string()))
            }
        }
    }

    pub(crate) async fn persist_tokens(&self, tokens: &TokenSet) {
        if let Err(e) = self
            .inner
            .store
            .update_durable(|map| tokens.write_to(map))
            .await
        {
            warn!(error = %e, "failed to persist tokens");
        }
    }
}

fn record(outcome: RefreshOutcome) -> RefreshOutcome {
    metrics::record_refresh(outcome.label());
    outcome
}
