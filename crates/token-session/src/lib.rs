//! Token session core for a PKCE-authenticated single-page client
//!
//! Owns the lifecycle of one user session: starting the authorization
//! redirect, completing the code exchange, refreshing tokens on a fixed
//! cadence, and ending the session on logout, inactivity, refresh failure or
//! a forged callback. The `SessionController` is the only component that
//! mutates session state; everything else reports into it.
//!
//! Session lifecycle:
//! 1. `SessionController::start()` on page load → resume stored tokens or
//!    complete a callback
//! 2. `SessionController::login()` → ephemeral PKCE artifacts + redirect
//! 3. Callback → `Authenticated`, refresh ticker and idle deadline armed
//! 4. Refresh ticks replace the access token; activity pushes the idle deadline
//! 5. Logout / idle expiry / refresh failure → single teardown to `Anonymous`

pub mod callback;
pub mod config;
pub mod controller;
pub mod error;
pub mod idle;
pub mod initiator;
pub mod metrics;
pub mod navigator;
pub mod refresh;

#[cfg(test)]
mod testing;

pub use callback::{CallbackOutcome, CallbackParams, strip_response_params};
pub use config::{Config, SessionConfig};
pub use controller::{
    ResourceResponse, SessionController, SessionEvent, SessionStatus, StartOutcome,
    TeardownReason,
};
pub use error::{Error, Result};
pub use idle::{ActivitySignal, IdleMonitor};
pub use navigator::{LoggingNavigator, Navigator};
pub use refresh::{RefreshOutcome, spawn_refresh_task};
