//! Navigation seam between the core and whatever presents it.

use std::sync::Weak;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;

/// Manual "go back" target offered alongside every scheduled redirect.
pub const GO_BACK_TARGET: &str = "/connect";

/// Performs navigation on behalf of the core.
pub trait Navigator: Send + Sync {
    /// Sends the user to an external URL (the identity provider).
    ///
    /// # Errors
    /// Returns an error if the URL could not be handed off.
    fn open_external(&self, url: &str) -> Result<()>;

    /// Moves to an internal route such as `/dashboard?success=true`.
    fn navigate(&self, target: &str);
}

/// A redirect that fires after a display delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledRedirect {
    pub target: String,
    pub delay: Duration,
}

impl ScheduledRedirect {
    pub fn new(target: impl Into<String>, delay: Duration) -> Self {
        Self {
            target: target.into(),
            delay,
        }
    }

    /// Fires the redirect after `delay` on the current tokio runtime.
    ///
    /// Only a weak reference is held while waiting: if the navigator is gone
    /// when the timer elapses, nothing happens. The task yields whether the
    /// redirect was delivered.
    pub fn spawn(self, navigator: Weak<dyn Navigator>) -> JoinHandle<bool> {
        tokio::spawn(async move {
            tokio::time::sleep(self.delay).await;
            match navigator.upgrade() {
                Some(navigator) => {
                    tracing::debug!(to = %self.target, "redirecting");
                    navigator.navigate(&self.target);
                    true
                }
                None => {
                    tracing::debug!(to = %self.target, "redirect dropped, navigator gone");
                    false
                }
            }
        })
    }
}
