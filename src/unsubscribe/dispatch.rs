//! Per-email unsubscribe entry point.
//!
//! Chooses between the List-Unsubscribe header and an AI-discovered link,
//! runs the chosen strategy and persists exactly one outcome plus one
//! notification. The email is marked `in_progress` before any network work
//! and that write is committed on its own so the user sees it immediately.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{DatabaseError, Error};
use crate::mail::MailSender;
use crate::oracle::AiOracle;
use crate::store::{Database, EmailRecord, NewNotification};
use crate::unsubscribe::list_header::{parse_list_unsubscribe, parse_mailto};
use crate::unsubscribe::resolver::UnsubscribeResolver;
use crate::unsubscribe::{
    CandidateKind, UnsubscribeMethod, UnsubscribeOutcome, UnsubscribeRequest, UnsubscribeStatus,
};

pub const LINK_NOT_FOUND_MESSAGE: &str = "Unsubscribe failed: invalid or missing unsubscribe link.";
pub const INVALID_HEADER_MESSAGE: &str = "Invalid List-Unsubscribe header format.";

pub struct UnsubscribeDispatchHandler {
    db: Arc<dyn Database>,
    oracle: AiOracle,
    resolver: Arc<UnsubscribeResolver>,
    mail: Arc<dyn MailSender>,
}

impl UnsubscribeDispatchHandler {
    pub fn new(
        db: Arc<dyn Database>,
        oracle: AiOracle,
        resolver: Arc<UnsubscribeResolver>,
        mail: Arc<dyn MailSender>,
    ) -> Self {
        Self {
            db,
            oracle,
            resolver,
            mail,
        }
    }

    /// Run one unsubscribe job.
    ///
    /// `Ok(None)` when the email no longer exists. An `Err` means the outcome
    /// could not be persisted; the status has been put back and the job
    /// should be retried.
    pub async fn handle(&self, request: UnsubscribeRequest) -> Result<Option<UnsubscribeOutcome>, Error> {
        let email_id = request.email_id;

        let Some(email) = self.db.get_email(email_id).await? else {
            warn!(email_id, "Unsubscribe requested for missing email, skipping");
            return Ok(None);
        };

        let previous = self.db.mark_unsubscribe_in_progress(email_id).await?;
        info!(email_id, owner_id = email.owner_id, "Unsubscribe dispatch started");

        match self.decide_and_record(&email).await {
            Ok(outcome) => Ok(Some(outcome)),
            Err(e) => {
                error!(email_id, error = %e, "Failed to persist unsubscribe outcome");
                self.restore(email_id, previous).await;
                Err(e.into())
            }
        }
    }

    async fn decide_and_record(&self, email: &EmailRecord) -> Result<UnsubscribeOutcome, DatabaseError> {
        let outcome = self.decide(email).await?;
        let status = UnsubscribeStatus::from(outcome.status);
        let notification = NewNotification::new(email.owner_id, Some(email.id), status.as_str(), &outcome.message);

        self.db
            .record_unsubscribe_outcome(email.id, status, &notification)
            .await?;

        info!(
            email_id = email.id,
            status = %status,
            method = %outcome.method,
            "Unsubscribe dispatch finished"
        );
        Ok(outcome)
    }

    /// Best-effort compensating write. A stale `in_progress` is cleared
    /// rather than restored.
    async fn restore(&self, email_id: i64, previous: Option<UnsubscribeStatus>) {
        let target = previous.filter(|s| *s != UnsubscribeStatus::InProgress);
        if let Err(e) = self.db.restore_unsubscribe_status(email_id, target).await {
            error!(email_id, error = %e, "Failed to restore unsubscribe status");
        }
    }

    async fn decide(&self, email: &EmailRecord) -> Result<UnsubscribeOutcome, DatabaseError> {
        if let Some(header) = email.list_unsubscribe.as_deref().filter(|h| !h.trim().is_empty()) {
            if self.db.use_list_unsubscribe(email.owner_id).await? {
                return Ok(self.via_list_header(email, header).await);
            }
            debug!(email_id = email.id, "List-Unsubscribe present but disabled for user");
        }
        Ok(self.via_discovered_link(email).await)
    }

    async fn via_list_header(&self, email: &EmailRecord, header: &str) -> UnsubscribeOutcome {
        let Some(candidate) = parse_list_unsubscribe(header, email.id) else {
            warn!(email_id = email.id, header, "Unusable List-Unsubscribe header");
            return UnsubscribeOutcome::error(UnsubscribeMethod::ListUnsubscribeInvalid, INVALID_HEADER_MESSAGE);
        };

        match candidate.kind {
            CandidateKind::HttpLink => {
                info!(email_id = email.id, url = %candidate.target, "Using List-Unsubscribe HTTP link");
                let attempt = self.resolver.http_attempt(&candidate.target).await;
                if attempt.succeeded() {
                    UnsubscribeOutcome::success(UnsubscribeMethod::ListUnsubscribeHttp, attempt.message)
                } else {
                    UnsubscribeOutcome::error(UnsubscribeMethod::ListUnsubscribeHttp, attempt.message)
                }
            }
            CandidateKind::MailtoLink => self.send_mailto(email, &candidate.target).await,
        }
    }

    async fn send_mailto(&self, email: &EmailRecord, target: &str) -> UnsubscribeOutcome {
        let Some(request) = parse_mailto(target) else {
            return UnsubscribeOutcome::error(UnsubscribeMethod::ListUnsubscribeInvalid, INVALID_HEADER_MESSAGE);
        };

        info!(email_id = email.id, to = %request.to, "Using List-Unsubscribe mailto link");
        match self
            .mail
            .send(&email.owner_address, &request.to, &request.subject, &request.body)
            .await
        {
            Ok(()) => UnsubscribeOutcome::success(
                UnsubscribeMethod::ListUnsubscribeMailto,
                format!("Unsubscribe email sent successfully to {}", request.to),
            ),
            Err(e) => {
                warn!(email_id = email.id, to = %request.to, error = %e, "Unsubscribe email failed");
                UnsubscribeOutcome::error(
                    UnsubscribeMethod::ListUnsubscribeMailto,
                    format!("Failed to send unsubscribe email to {}", request.to),
                )
            }
        }
    }

    async fn via_discovered_link(&self, email: &EmailRecord) -> UnsubscribeOutcome {
        let link = match self.oracle.find_unsubscribe_link(&email.body).await {
            Ok(link) => link,
            Err(e) => {
                warn!(email_id = email.id, error = %e, "Unsubscribe link lookup failed");
                None
            }
        };

        match link.filter(|l| is_http_url(l)) {
            Some(url) => {
                info!(email_id = email.id, url = %url, "Resolving discovered unsubscribe link");
                self.resolver.resolve(&url).await
            }
            None => {
                warn!(email_id = email.id, "No usable unsubscribe link found");
                UnsubscribeOutcome::error(UnsubscribeMethod::LinkNotFound, LINK_NOT_FOUND_MESSAGE)
            }
        }
    }
}

fn is_http_url(candidate: &str) -> bool {
    Url::parse(candidate)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
        .unwrap_or(false)
}
