//! Scriptable browser: load a page, or load it and run an action plan.
//!
//! Drivers never raise. Every failure, including exhausted retries, comes
//! back as a [`PageSnapshot`] with `success = false` and a diagnostic.

mod action;
mod chromium;
mod retry;

pub use action::{ActionPlan, ActionVerb, AutomationAction};
pub use chromium::ChromiumDriver;
pub use retry::RetryPolicy;

use async_trait::async_trait;

/// Rendered page as seen after a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot {
    pub html: String,
    pub success: bool,
    pub diagnostic_message: String,
}

impl PageSnapshot {
    pub fn loaded(html: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            success: true,
            diagnostic_message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            html: String::new(),
            success: false,
            diagnostic_message: message.into(),
        }
    }
}

/// Browser automation backend.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Navigate to `url` in a fresh session and capture the rendered HTML.
    async fn load(&self, url: &str) -> PageSnapshot;

    /// Navigate to `url` in a fresh session, run `plan` in order, and
    /// capture the HTML after the last action.
    async fn act(&self, url: &str, plan: &[AutomationAction]) -> PageSnapshot;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_snapshot_has_no_html() {
        let snapshot = PageSnapshot::failed("chrome crashed");
        assert!(!snapshot.success);
        assert!(snapshot.html.is_empty());
        assert_eq!(snapshot.diagnostic_message, "chrome crashed");
    }
}
