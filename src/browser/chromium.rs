//! Headless Chromium driver over CDP (chromiumoxide).
//!
//! One browser process per attempt, with its own throwaway profile. The
//! session is closed on every path; if a session is dropped without
//! `close()`, the CDP handler task is aborted; the profile directory is a
//! `TempDir` and goes away with the session either way.

use std::fmt::Display;

use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig as CdpConfig, Element, Page};
use futures::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::browser::{ActionVerb, AutomationAction, BrowserDriver, PageSnapshot, RetryPolicy};
use crate::config::BrowserConfig;
use crate::error::BrowserError;

/// Error fragments that mean the window or CDP connection went away.
const TRANSIENT_MARKERS: &[&str] = &[
    "no such window",
    "target closed",
    "session closed",
    "no target with given id",
    "not attached to an active page",
    "connection closed",
    "channelsenderror",
    "websocket",
    "browser closed",
];

const CLEAR_JS: &str = "function() { if ('value' in this) { this.value = ''; } }";

const SUBMIT_JS: &str = r#"function() {
    const form = this.tagName === 'FORM' ? this : (this.form || this.closest('form'));
    if (form) {
        if (typeof form.requestSubmit === 'function') { form.requestSubmit(); } else { form.submit(); }
        return 'form';
    }
    this.click();
    return 'click';
}"#;

/// Map any driver error into the retry taxonomy.
fn classify(err: impl Display) -> BrowserError {
    let message = err.to_string();
    let lower = message.to_ascii_lowercase();
    if TRANSIENT_MARKERS.iter().any(|m| lower.contains(m)) {
        BrowserError::Transient(message)
    } else {
        BrowserError::Fatal(message)
    }
}

/// Chromium-backed [`BrowserDriver`].
pub struct ChromiumDriver {
    config: BrowserConfig,
    retry: RetryPolicy,
}

impl ChromiumDriver {
    pub fn new(config: BrowserConfig) -> Self {
        let retry = RetryPolicy::from_config(&config);
        Self { config, retry }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn snapshot(&self, url: &str, plan: &[AutomationAction]) -> PageSnapshot {
        let label = if plan.is_empty() { "load" } else { "act" };
        let result = self
            .retry
            .run(label, |attempt| self.attempt(url, plan, attempt))
            .await;

        match result {
            Ok(report) => {
                let message = if plan.is_empty() {
                    "Page loaded successfully".to_string()
                } else if report.failed.is_empty() {
                    format!("Executed {} actions", plan.len())
                } else {
                    format!(
                        "Executed {}/{} actions; failed: {}",
                        plan.len() - report.failed.len(),
                        plan.len(),
                        report.failed.join("; ")
                    )
                };
                PageSnapshot::loaded(report.html, message)
            }
            Err(e) => {
                warn!(url, label, error = %e, "Browser session failed");
                PageSnapshot::failed(format!("Browser {label} failed: {e}"))
            }
        }
    }

    /// One full session: launch, navigate, act, capture, close.
    async fn attempt(
        &self,
        url: &str,
        plan: &[AutomationAction],
        attempt: u32,
    ) -> Result<SessionReport, BrowserError> {
        debug!(url, attempt, steps = plan.len(), "Starting browser session");
        let mut session = ChromiumSession::launch(&self.config).await?;

        let driven =
            tokio::time::timeout(self.config.session_timeout, session.drive(url, plan, &self.config))
                .await;
        session.close().await;

        match driven {
            Ok(result) => result,
            Err(_) => Err(BrowserError::Timeout(self.config.session_timeout)),
        }
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn load(&self, url: &str) -> PageSnapshot {
        self.snapshot(url, &[]).await
    }

    async fn act(&self, url: &str, plan: &[AutomationAction]) -> PageSnapshot {
        self.snapshot(url, plan).await
    }
}

// ── Session ─────────────────────────────────────────────────────────

struct SessionReport {
    html: String,
    failed: Vec<String>,
}

struct ChromiumSession {
    browser: Browser,
    handler_task: Option<JoinHandle<()>>,
    profile: Option<TempDir>,
    closed: bool,
}

impl ChromiumSession {
    async fn launch(config: &BrowserConfig) -> Result<Self, BrowserError> {
        let profile = isolated_profile_dir()?;

        let mut builder = CdpConfig::builder()
            .no_sandbox()
            .user_data_dir(profile.path())
            .request_timeout(config.navigation_timeout)
            .arg(format!("--user-agent={}", config.user_agent));
        if config.headed {
            builder = builder.with_head();
        }
        if let Some(chrome) = &config.chrome_executable {
            builder = builder.chrome_executable(chrome);
        }
        let cdp_config = builder
            .build()
            .map_err(|e| BrowserError::Fatal(format!("Failed to build browser config: {e}")))?;

        let (browser, mut handler) = match Browser::launch(cdp_config).await {
            Ok(launched) => launched,
            Err(e) => return Err(classify(format!("Failed to launch browser: {e}"))),
        };

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error (ignoring): {}", e);
                }
            }
        });

        Ok(Self {
            browser,
            handler_task: Some(handler_task),
            profile: Some(profile),
            closed: false,
        })
    }

    async fn drive(
        &self,
        url: &str,
        plan: &[AutomationAction],
        config: &BrowserConfig,
    ) -> Result<SessionReport, BrowserError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| classify(format!("Failed to open page: {e}")))?;

        match tokio::time::timeout(config.navigation_timeout, page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(classify(format!("Navigation to {url} failed: {e}"))),
            Err(_) => return Err(BrowserError::Timeout(config.navigation_timeout)),
        }
        tokio::time::sleep(config.settle).await;

        let mut failed = Vec::new();
        for (index, action) in plan.iter().enumerate() {
            match execute(&page, action).await {
                Ok(message) => info!(step = index + 1, action = %action, "{}", message),
                Err(e) if e.is_transient() => return Err(e),
                Err(e) => {
                    warn!(step = index + 1, action = %action, error = %e, "Action failed, continuing plan");
                    failed.push(format!("{action}: {e}"));
                }
            }
            tokio::time::sleep(config.action_pause).await;
            if action.verb == ActionVerb::Click {
                tokio::time::sleep(config.click_pause).await;
            }
        }

        let html = page
            .content()
            .await
            .map_err(|e| classify(format!("Failed to read page content: {e}")))?;
        Ok(SessionReport { html, failed })
    }

    /// Close the browser, join the handler and delete the profile.
    /// Errors are logged; teardown never fails the attempt.
    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.browser.close().await {
            debug!("Error closing browser: {}", e);
        }
        if let Some(task) = self.handler_task.take()
            && let Err(e) = task.await
        {
            debug!("Error awaiting browser handler: {}", e);
        }
        if let Some(profile) = self.profile.take()
            && let Err(e) = profile.close()
        {
            debug!("Failed to clean up profile dir: {}", e);
        }
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
    }
}

/// Run one action against the loaded page.
async fn execute(page: &Page, action: &AutomationAction) -> Result<String, BrowserError> {
    let elements = page
        .find_elements(action.selector.as_str())
        .await
        .map_err(classify)?;

    match action.verb {
        ActionVerb::Click => {
            let target = match &action.value {
                Some(text) => position_with_text(&elements, text).await?,
                None => (!elements.is_empty()).then_some(0),
            };
            let Some(index) = target else {
                return Err(BrowserError::Fatal(match &action.value {
                    Some(text) => format!("No element with text '{text}' for {}", action.selector),
                    None => format!("No element for {}", action.selector),
                }));
            };
            elements[index].click().await.map_err(classify)?;
            Ok(format!("Clicked {}", action.selector))
        }
        ActionVerb::Fill => {
            let element = elements
                .first()
                .ok_or_else(|| BrowserError::Fatal(format!("No element for {}", action.selector)))?;
            let value = action.value.as_deref().unwrap_or_default();
            element.click().await.map_err(classify)?;
            element.call_js_fn(CLEAR_JS, false).await.map_err(classify)?;
            element.type_str(value).await.map_err(classify)?;
            Ok(format!("Filled {}", action.selector))
        }
        ActionVerb::Submit => {
            let element = elements
                .first()
                .ok_or_else(|| BrowserError::Fatal(format!("No element for {}", action.selector)))?;
            element.call_js_fn(SUBMIT_JS, false).await.map_err(classify)?;
            Ok(format!("Submitted {}", action.selector))
        }
    }
}

/// Index of the first element whose trimmed visible text equals `text`.
async fn position_with_text(elements: &[Element], text: &str) -> Result<Option<usize>, BrowserError> {
    let wanted = text.trim();
    for (index, element) in elements.iter().enumerate() {
        let inner = element.inner_text().await.map_err(classify)?;
        if inner.as_deref().map(str::trim) == Some(wanted) {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

fn isolated_profile_dir() -> Result<TempDir, BrowserError> {
    tempfile::Builder::new()
        .prefix("inbox-sweeper-chromium-")
        .tempdir()
        .map_err(|e| BrowserError::Fatal(format!("Failed to create profile dir: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_window_loss_as_transient() {
        assert!(classify("Error: no such window: target window already closed").is_transient());
        assert!(classify("Target closed").is_transient());
        assert!(classify("ChannelSendError(Send)").is_transient());
    }

    #[test]
    fn classify_other_errors_as_fatal() {
        assert!(!classify("Could not auto detect a chrome executable").is_transient());
        assert!(!classify("net::ERR_NAME_NOT_RESOLVED").is_transient());
    }

    #[test]
    fn profile_dirs_are_unique_and_removed_on_drop() {
        let a = isolated_profile_dir().unwrap();
        let b = isolated_profile_dir().unwrap();
        assert_ne!(a.path(), b.path());

        let path = a.path().to_path_buf();
        assert!(path.exists());
        drop(a);
        assert!(!path.exists());
        b.close().unwrap();
    }
}
