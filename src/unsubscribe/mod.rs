//! Unsubscribe resolution: candidates, outcomes and persisted status.

pub mod dispatch;
pub mod list_header;
pub mod probe;
pub mod resolver;

pub use dispatch::UnsubscribeDispatchHandler;
pub use probe::{HttpProbe, ProbeResponse, ReqwestProbe};
pub use resolver::{ResolutionTrace, Stage, UnsubscribeResolver};

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Hard cap on a stored notification message, in chars.
pub const NOTIFICATION_MAX_CHARS: usize = 255;

/// Job payload: unsubscribe the owner of this email from its sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsubscribeRequest {
    pub email_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    HttpLink,
    MailtoLink,
}

/// Where an unsubscribe attempt will be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribeCandidate {
    pub kind: CandidateKind,
    pub target: String,
    pub source_email_id: i64,
}

impl UnsubscribeCandidate {
    pub fn http(target: impl Into<String>, source_email_id: i64) -> Self {
        Self {
            kind: CandidateKind::HttpLink,
            target: target.into(),
            source_email_id,
        }
    }

    pub fn mailto(target: impl Into<String>, source_email_id: i64) -> Self {
        Self {
            kind: CandidateKind::MailtoLink,
            target: target.into(),
            source_email_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Success,
    Failure,
    Inconclusive,
    Error,
}

/// Which strategy produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubscribeMethod {
    Http,
    PantherHttpActions,
    PantherDirect,
    PantherAiActions,
    AllFailed,
    ListUnsubscribeHttp,
    ListUnsubscribeMailto,
    ListUnsubscribeInvalid,
    LinkNotFound,
}

impl UnsubscribeMethod {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::PantherHttpActions => "panther_http_actions",
            Self::PantherDirect => "panther_direct",
            Self::PantherAiActions => "panther_ai_actions",
            Self::AllFailed => "all_failed",
            Self::ListUnsubscribeHttp => "list_unsubscribe_http",
            Self::ListUnsubscribeMailto => "list_unsubscribe_mailto",
            Self::ListUnsubscribeInvalid => "list_unsubscribe_invalid",
            Self::LinkNotFound => "link_not_found",
        }
    }
}

impl fmt::Display for UnsubscribeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Terminal result of one dispatch. The message is capped at
/// [`NOTIFICATION_MAX_CHARS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribeOutcome {
    pub status: OutcomeStatus,
    pub method: UnsubscribeMethod,
    pub message: String,
}

impl UnsubscribeOutcome {
    pub fn new(status: OutcomeStatus, method: UnsubscribeMethod, message: impl Into<String>) -> Self {
        Self {
            status,
            method,
            message: truncate_notification(&message.into()),
        }
    }

    pub fn success(method: UnsubscribeMethod, message: impl Into<String>) -> Self {
        Self::new(OutcomeStatus::Success, method, message)
    }

    pub fn error(method: UnsubscribeMethod, message: impl Into<String>) -> Self {
        Self::new(OutcomeStatus::Error, method, message)
    }
}

/// `unsubscribe_status` column of an email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsubscribeStatus {
    InProgress,
    Success,
    Error,
    Inconclusive,
}

impl UnsubscribeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Success => "success",
            Self::Error => "error",
            Self::Inconclusive => "inconclusive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(Self::InProgress),
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            "inconclusive" => Some(Self::Inconclusive),
            _ => None,
        }
    }
}

impl From<OutcomeStatus> for UnsubscribeStatus {
    fn from(status: OutcomeStatus) -> Self {
        match status {
            OutcomeStatus::Success => Self::Success,
            OutcomeStatus::Inconclusive => Self::Inconclusive,
            OutcomeStatus::Failure | OutcomeStatus::Error => Self::Error,
        }
    }
}

impl fmt::Display for UnsubscribeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cap an outcome or notification message at [`NOTIFICATION_MAX_CHARS`],
/// logging when anything is cut.
pub fn truncate_notification(message: &str) -> String {
    let len = message.chars().count();
    if len <= NOTIFICATION_MAX_CHARS {
        return message.to_string();
    }
    warn!(
        original_chars = len,
        max_chars = NOTIFICATION_MAX_CHARS,
        "Notification message truncated"
    );
    message.chars().take(NOTIFICATION_MAX_CHARS).collect()
}
