//! The messaging platform that embeds the player.
//!
//! The player calls into the host at fixed points (startup, the unfinished
//! seek buttons, close) and never looks at the outcome.

use tracing::info;

pub trait HostPlatform: Send {
    /// Grow the embedded view to full height.
    fn expand(&mut self);
    /// Ask the user before the host closes the view.
    fn enable_closing_confirmation(&mut self);
    fn show_popup(&mut self, title: &str, message: &str);
    fn close(&mut self);
}

/// Host used when running standalone: every call is just logged.
#[derive(Debug, Default)]
pub struct HeadlessHost;

impl HostPlatform for HeadlessHost {
    fn expand(&mut self) {
        info!("host: expand");
    }

    fn enable_closing_confirmation(&mut self) {
        info!("host: closing confirmation enabled");
    }

    fn show_popup(&mut self, title: &str, message: &str) {
        info!("host: popup {:?}: {:?}", title, message);
    }

    fn close(&mut self) {
        info!("host: close");
    }
}
