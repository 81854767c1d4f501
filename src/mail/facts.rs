//! Unsubscribe-relevant facts of a raw RFC 822 message (mail-parser).

use mail_parser::{HeaderName, MessageParser};

use crate::error::MailError;

/// What the pipeline needs from one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailFacts {
    pub subject: String,
    pub sender: String,
    /// HTML body when present, otherwise the text body.
    pub body: String,
    pub list_unsubscribe: Option<String>,
}

impl EmailFacts {
    pub fn from_rfc822(raw: &[u8]) -> Result<Self, MailError> {
        let parsed = MessageParser::default()
            .parse(raw)
            .ok_or_else(|| MailError::Build("Unparseable RFC 822 message".into()))?;

        let sender = parsed
            .from()
            .and_then(|addr| addr.first())
            .and_then(|a| a.address())
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".into());

        let body = parsed
            .body_html(0)
            .or_else(|| parsed.body_text(0))
            .map(|b| b.into_owned())
            .unwrap_or_default();

        let list_unsubscribe = parsed
            .header_raw(HeaderName::ListUnsubscribe)
            .map(|raw| raw.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|v| !v.is_empty());

        Ok(Self {
            subject: parsed.subject().unwrap_or("(no subject)").to_string(),
            sender,
            body,
            list_unsubscribe,
        })
    }
}
