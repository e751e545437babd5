//! Session lifecycle counters
//!
//! Recorded through the `metrics` facade; nothing is exported unless the shell
//! installs a recorder.
//!
//! - `session_code_exchanges_total` (counter): label `outcome`
//! - `session_refreshes_total` (counter): label `outcome`
//! - `session_teardowns_total` (counter): label `reason`

use crate::controller::TeardownReason;

/// Record the outcome of one callback: `success`, `denied`, `csrf_mismatch`,
/// `missing_verifier`, `failed` or `superseded`.
pub fn record_code_exchange(outcome: &'static str) {
    metrics::counter!("session_code_exchanges_total", "outcome" => outcome).increment(1);
}

/// Record the outcome of one refresh attempt.
pub fn record_refresh(outcome: &'static str) {
    metrics::counter!("session_refreshes_total", "outcome" => outcome).increment(1);
}

/// Record a session teardown.
pub fn record_teardown(reason: TeardownReason) {
    metrics::counter!("session_teardowns_total", "reason" => reason.label()).increment(1);
}
