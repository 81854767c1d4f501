//! Error types for inbox-sweeper.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("HTTP probe error: {0}")]
    Probe(#[from] ProbeError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// A write touched an unexpected number of rows, e.g. the row changed
    /// under us. The enclosing job should be retried.
    #[error("Write conflict on {entity} {id}: {reason}")]
    Conflict {
        entity: String,
        id: String,
        reason: String,
    },

    #[error("Migration failed: {0}")]
    Migration(String),
}

impl From<libsql::Error> for DatabaseError {
    fn from(e: libsql::Error) -> Self {
        DatabaseError::Query(e.to_string())
    }
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// AI oracle errors.
///
/// Malformed replies are not errors: they degrade to heuristics inside the
/// oracle. Only an unreachable backend surfaces here.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("Oracle unavailable: {0}")]
    Unavailable(#[from] LlmError),
}

/// Browser automation errors.
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    /// The browser window or CDP target vanished mid-session. Retried.
    #[error("Transient browser failure: {0}")]
    Transient(String),

    /// Anything else. Not retried.
    #[error("Browser failure: {0}")]
    Fatal(String),

    #[error("Browser session timed out after {0:?}")]
    Timeout(Duration),
}

impl BrowserError {
    /// Whether the retry policy should try again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Plain HTTP unsubscribe request errors.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("Request to {url} timed out")]
    Timeout { url: String },
}

/// Outbound mail errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("SMTP send failed: {0}")]
    Send(String),

    #[error("Mail transport not configured")]
    NotConfigured,
}

/// Job queue errors.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Job queue is closed")]
    QueueClosed,

    #[error("Job {id} aborted: {reason}")]
    Aborted { id: String, reason: String },

    #[error("Job {id} failed after {attempts} attempts: {reason}")]
    Exhausted {
        id: String,
        attempts: u32,
        reason: String,
    },
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
