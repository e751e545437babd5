//! Tracing subscriber setup
//!
//! The library crates only emit `tracing` events. Shells that do not install
//! their own subscriber can call [`init_tracing`] once at startup.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Error, Result};

/// Install the global subscriber.
///
/// The filter comes from `LOG_LEVEL`, then `RUST_LOG`, and defaults to `info`.
/// `json` selects structured JSON lines over the human-readable format.
/// Fails if a global subscriber is already installed.
pub fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    installed.map_err(|e| Error::Telemetry(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_rejected() {
        // The first call may or may not win depending on test ordering, but
        // once any subscriber is global a second install must fail.
        let _ = init_tracing(true);
        let result = init_tracing(false);
        assert!(
            matches!(result, Err(Error::Telemetry(_))),
            "re-installing the global subscriber must fail, got: {result:?}"
        );
    }
}
