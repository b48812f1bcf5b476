//! Terminal stand-in for browser navigation.

use anyhow::{Context, Result};
use postbridge_core::navigation::Navigator;
use postbridge_core::oauth::LinkOutcome;

/// Disables launching a browser (used by tests).
pub const NO_BROWSER_ENV: &str = "POSTBRIDGE_NO_BROWSER";

/// Opens provider URLs in the system browser and prints internal redirects.
pub struct TerminalNavigator {
    open_browser: bool,
}

impl TerminalNavigator {
    pub fn new(open_browser: bool) -> Self {
        Self {
            open_browser: open_browser && std::env::var_os(NO_BROWSER_ENV).is_none(),
        }
    }
}

impl Navigator for TerminalNavigator {
    fn open_external(&self, url: &str) -> Result<()> {
        if !self.open_browser {
            return Ok(());
        }
        open::that(url).with_context(|| format!("open browser at {url}"))
    }

    fn navigate(&self, target: &str) {
        if let Some(outcome) = LinkOutcome::from_query(target) {
            println!("{outcome}");
        }
        println!("→ {target}");
    }
}
