//! Configuration types.
//!
//! Everything is read from environment variables at startup. Each struct has
//! a `Default` matching the documented defaults and a `from_env()` that
//! overlays whatever is set.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

/// Desktop Chrome user agent used by both the HTTP probe and the browser.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Top-level configuration for the binary.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub probe: ProbeConfig,
    pub browser: BrowserConfig,
    pub jobs: JobConfig,
    /// `None` when `SMTP_HOST` is unset; mailto unsubscribes then fail.
    pub smtp: Option<SmtpConfig>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            db_path: std::env::var("SWEEPER_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/inbox-sweeper.db")),
            probe: ProbeConfig::from_env(),
            browser: BrowserConfig::from_env(),
            jobs: JobConfig::from_env(),
            smtp: SmtpConfig::from_env(),
        }
    }
}

/// Build the LLM provider config from the environment.
///
/// The API key variable depends on the backend, so this is the one config
/// that can fail outright.
pub fn llm_config_from_env() -> Result<LlmConfig, ConfigError> {
    let backend: LlmBackend = match std::env::var("SWEEPER_LLM_BACKEND") {
        Ok(raw) => raw.parse().map_err(|message| ConfigError::InvalidValue {
            key: "SWEEPER_LLM_BACKEND".to_string(),
            message,
        })?,
        Err(_) => LlmBackend::OpenAi,
    };

    let key_var = backend.api_key_var();
    let api_key = std::env::var(key_var)
        .map_err(|_| ConfigError::MissingEnvVar(key_var.to_string()))?;

    let mut config = LlmConfig::new(backend, SecretString::from(api_key));
    if let Ok(model) = std::env::var("SWEEPER_MODEL") {
        config.model = model;
    }
    config.sampling.max_tokens = std::env::var("SWEEPER_LLM_MAX_TOKENS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(config.sampling.max_tokens);
    Ok(config)
}

/// Plain HTTP probe settings.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub timeout: Duration,
    pub user_agent: String,
    /// Redirects followed before giving up; the final body is what gets judged.
    pub max_redirects: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_redirects: 10,
        }
    }
}

impl ProbeConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let timeout_secs: u64 = std::env::var("SWEEPER_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.timeout.as_secs());
        Self {
            timeout: Duration::from_secs(timeout_secs),
            user_agent: std::env::var("SWEEPER_USER_AGENT").unwrap_or(defaults.user_agent),
            max_redirects: defaults.max_redirects,
        }
    }
}

/// Headless Chromium settings.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Wait after navigation before capturing the page.
    pub settle: Duration,
    /// Wait between actions.
    pub action_pause: Duration,
    /// Extra wait after a click.
    pub click_pause: Duration,
    pub navigation_timeout: Duration,
    /// Upper bound on one whole session (launch, navigate, act, capture).
    pub session_timeout: Duration,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub user_agent: String,
    /// Explicit Chrome binary; autodetected when `None`.
    pub chrome_executable: Option<PathBuf>,
    pub headed: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(15),
            action_pause: Duration::from_secs(2),
            click_pause: Duration::from_secs(5),
            navigation_timeout: Duration::from_secs(30),
            session_timeout: Duration::from_secs(120),
            max_attempts: 5,
            retry_backoff: Duration::from_millis(3000),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            chrome_executable: None,
            headed: false,
        }
    }
}

impl BrowserConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let settle_secs: u64 = std::env::var("SWEEPER_BROWSER_SETTLE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.settle.as_secs());

        let max_attempts: u32 = std::env::var("SWEEPER_BROWSER_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_attempts);

        let backoff_ms: u64 = std::env::var("SWEEPER_BROWSER_RETRY_BACKOFF_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let headed = std::env::var("SWEEPER_BROWSER_HEADED")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            settle: Duration::from_secs(settle_secs),
            max_attempts,
            retry_backoff: Duration::from_millis(backoff_ms),
            user_agent: std::env::var("SWEEPER_USER_AGENT").unwrap_or(defaults.user_agent),
            chrome_executable: std::env::var("CHROME_BIN").ok().map(PathBuf::from),
            headed,
            ..defaults
        }
    }
}

/// Outbound SMTP for mailto unsubscribes.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
}

impl SmtpConfig {
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("SMTP_HOST").ok()?;

        let port: u16 = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        Some(Self {
            host,
            port,
            username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
            password: SecretString::from(std::env::var("SMTP_PASSWORD").unwrap_or_default()),
        })
    }
}

/// In-process job queue settings.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub workers: usize,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// Rows left `in_progress` longer than this are reset at startup.
    pub stale_in_progress: Duration,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_attempts: 3,
            retry_delay: Duration::from_secs(5),
            stale_in_progress: Duration::from_secs(3600),
        }
    }
}

impl JobConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let workers: usize = std::env::var("SWEEPER_WORKERS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.workers);

        let max_attempts: u32 = std::env::var("SWEEPER_JOB_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_attempts);

        let stale_secs: u64 = std::env::var("SWEEPER_STALE_IN_PROGRESS_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.stale_in_progress.as_secs());

        Self {
            workers,
            max_attempts,
            stale_in_progress: Duration::from_secs(stale_secs),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_defaults() {
        let config = BrowserConfig::default();
        assert_eq!(config.settle, Duration::from_secs(15));
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.retry_backoff, Duration::from_secs(3));
        assert!(config.user_agent.contains("Chrome/120"));
        assert!(!config.headed);
    }

    #[test]
    fn job_defaults() {
        let config = JobConfig::default();
        assert_eq!(config.workers, 4);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.stale_in_progress, Duration::from_secs(3600));
    }

    #[test]
    fn probe_defaults() {
        let config = ProbeConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_redirects, 10);
    }

    #[test]
    fn smtp_from_env_returns_none_when_no_host() {
        // SAFETY: no other test reads or writes SMTP_HOST.
        unsafe { std::env::remove_var("SMTP_HOST") };
        assert!(SmtpConfig::from_env().is_none());
    }
}
