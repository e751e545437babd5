//! Navigation collaborator
//!
//! The session core never touches a window or history stack itself. The UI
//! shell implements `Navigator` to leave the application for the
//! authorization server and to rewrite the visible address after a callback.

use tracing::info;
use url::Url;

/// The shell's window/history surface.
pub trait Navigator: Send + Sync {
    /// Leave the application for `url` (authorization endpoint, post-logout
    /// page). Control does not come back until the next page load.
    fn navigate(&self, url: &Url);

    /// Replace the visible address without navigating, so a reload does not
    /// replay what the old address carried.
    fn replace_address(&self, url: &Url);
}

/// Navigator for headless shells: logs where the user should go and leaves
/// opening the browser to whoever reads the log.
#[derive(Debug, Default, Clone)]
pub struct LoggingNavigator;

impl Navigator for LoggingNavigator {
    fn navigate(&self, url: &Url) {
        info!(url = %url, "navigate");
    }

    fn replace_address(&self, url: &Url) {
        info!(url = %url, "replace address");
    }
}
