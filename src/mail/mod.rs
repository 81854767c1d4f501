//! Outbound mail for `mailto:` unsubscribes, and RFC 822 fact extraction.

pub mod facts;

pub use facts::EmailFacts;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;
use tracing::info;

use crate::config::SmtpConfig;
use crate::error::MailError;

#[async_trait]
pub trait MailSender: Send + Sync {
    /// Send a plain-text email.
    async fn send(&self, from: &str, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// SMTP relay sender (lettre). The blocking transport runs on the
/// blocking pool.
pub struct SmtpMailSender {
    config: SmtpConfig,
}

impl SmtpMailSender {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

fn mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|e| MailError::InvalidAddress {
        address: address.to_string(),
        reason: format!("{e}"),
    })
}

/// Build the outgoing message. Addresses are validated here, before any
/// connection is made.
fn build_message(from: &str, to: &str, subject: &str, body: &str) -> Result<Message, MailError> {
    Message::builder()
        .from(mailbox(from)?)
        .to(mailbox(to)?)
        .subject(subject)
        .body(body.to_string())
        .map_err(|e| MailError::Build(e.to_string()))
}

#[async_trait]
impl MailSender for SmtpMailSender {
    async fn send(&self, from: &str, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let email = build_message(from, to, subject, body)?;

        let host = self.config.host.clone();
        let port = self.config.port;
        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.expose_secret().to_string(),
        );

        tokio::task::spawn_blocking(move || {
            let transport = SmtpTransport::relay(&host)
                .map_err(|e| MailError::Send(format!("SMTP relay error: {e}")))?
                .port(port)
                .credentials(creds)
                .build();
            transport
                .send(&email)
                .map_err(|e| MailError::Send(e.to_string()))
        })
        .await
        .map_err(|e| MailError::Send(format!("SMTP task failed: {e}")))??;

        info!(to, "Unsubscribe email sent");
        Ok(())
    }
}

/// Used when no SMTP relay is configured; every send fails.
pub struct DisabledMailSender;

#[async_trait]
impl MailSender for DisabledMailSender {
    async fn send(&self, _from: &str, _to: &str, _subject: &str, _body: &str) -> Result<(), MailError> {
        Err(MailError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_message_with_headers() {
        let message = build_message("alice@example.com", "leave@list.test", "unsub", "unsubscribe").unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("From: alice@example.com"));
        assert!(raw.contains("To: leave@list.test"));
        assert!(raw.contains("Subject: unsub"));
    }

    #[test]
    fn invalid_recipient_is_rejected_before_sending() {
        let err = build_message("alice@example.com", "not an address", "s", "b").unwrap_err();
        assert!(matches!(err, MailError::InvalidAddress { ref address, .. } if address == "not an address"));
    }

    #[tokio::test]
    async fn smtp_sender_validates_addresses_first() {
        let sender = SmtpMailSender::new(SmtpConfig {
            host: "smtp.invalid".into(),
            port: 587,
            username: String::new(),
            password: String::new().into(),
        });
        let err = sender.send("bad", "leave@list.test", "s", "b").await.unwrap_err();
        assert!(matches!(err, MailError::InvalidAddress { .. }));
    }

    #[tokio::test]
    async fn disabled_sender_reports_not_configured() {
        let err = DisabledMailSender
            .send("a@b.test", "c@d.test", "s", "b")
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::NotConfigured));
    }
}
