//! `Database` trait: the persistence slice the unsubscribe pipeline needs.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;
use crate::unsubscribe::{UnsubscribeStatus, truncate_notification};

/// An email row to insert.
#[derive(Debug, Clone, Default)]
pub struct NewEmail {
    pub owner_id: i64,
    pub subject: String,
    pub sender: String,
    pub body: String,
    pub list_unsubscribe: Option<String>,
}

/// The unsubscribe-relevant facts of a stored email.
#[derive(Debug, Clone)]
pub struct EmailRecord {
    pub id: i64,
    pub owner_id: i64,
    pub owner_address: String,
    pub subject: String,
    pub sender: String,
    pub body: String,
    pub list_unsubscribe: Option<String>,
    pub unsubscribe_status: Option<UnsubscribeStatus>,
    pub updated_at: DateTime<Utc>,
}

/// A notification to insert alongside an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub user_id: i64,
    pub related_email_id: Option<i64>,
    pub kind: String,
    pub message: String,
}

impl NewNotification {
    /// Build a notification; the message is capped at 255 chars.
    pub fn new(
        user_id: i64,
        related_email_id: Option<i64>,
        kind: impl Into<String>,
        message: &str,
    ) -> Self {
        Self {
            user_id,
            related_email_id,
            kind: kind.into(),
            message: truncate_notification(message),
        }
    }
}

/// A stored notification.
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub related_email_id: Option<i64>,
    pub kind: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Backend-agnostic database trait covering users, emails, config and
/// notifications.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Users & config ──────────────────────────────────────────────

    /// Id of the user with this address, creating the user if needed.
    async fn ensure_user(&self, address: &str) -> Result<i64, DatabaseError>;

    /// Whether the user opted into List-Unsubscribe handling. A user with
    /// no config row has it off.
    async fn use_list_unsubscribe(&self, user_id: i64) -> Result<bool, DatabaseError>;

    async fn set_use_list_unsubscribe(&self, user_id: i64, enabled: bool) -> Result<(), DatabaseError>;

    // ── Emails ──────────────────────────────────────────────────────

    /// Insert an email. Returns its id.
    async fn insert_email(&self, email: &NewEmail) -> Result<i64, DatabaseError>;

    /// Get an email with its owner's address.
    async fn get_email(&self, id: i64) -> Result<Option<EmailRecord>, DatabaseError>;

    /// Set `unsubscribe_status = in_progress` and commit immediately.
    /// Returns the status it replaced.
    async fn mark_unsubscribe_in_progress(
        &self,
        email_id: i64,
    ) -> Result<Option<UnsubscribeStatus>, DatabaseError>;

    /// Write the terminal status and the notification in one transaction.
    async fn record_unsubscribe_outcome(
        &self,
        email_id: i64,
        status: UnsubscribeStatus,
        notification: &NewNotification,
    ) -> Result<(), DatabaseError>;

    /// Compensating write: put back the status seen before a dispatch.
    async fn restore_unsubscribe_status(
        &self,
        email_id: i64,
        previous: Option<UnsubscribeStatus>,
    ) -> Result<(), DatabaseError>;

    /// Clear `in_progress` rows not touched for `older_than`. Returns the
    /// number of rows reset.
    async fn reset_stale_in_progress(&self, older_than: Duration) -> Result<usize, DatabaseError>;

    // ── Notifications ───────────────────────────────────────────────

    /// Notifications for a user, newest first.
    async fn list_notifications(
        &self,
        user_id: i64,
        unread_only: bool,
    ) -> Result<Vec<Notification>, DatabaseError>;

    async fn mark_notification_read(&self, id: i64) -> Result<(), DatabaseError>;
}
