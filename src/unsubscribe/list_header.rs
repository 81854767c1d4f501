//! `List-Unsubscribe` header parsing (RFC 2369 / RFC 8058).

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::unsubscribe::UnsubscribeCandidate;

static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>]+)>").expect("list-unsubscribe regex is valid"));

/// Subject and body used when a mailto link does not specify them.
pub const DEFAULT_MAILTO_TEXT: &str = "unsubscribe";

/// A mailto unsubscribe, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailtoRequest {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// First usable candidate in header order: `http(s)://` or `mailto:`.
///
/// Returns `None` when the header has no bracketed entries or none of them
/// is a supported scheme.
pub fn parse_list_unsubscribe(header: &str, email_id: i64) -> Option<UnsubscribeCandidate> {
    BRACKETED
        .captures_iter(header)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .find_map(|target| {
            let lower = target.to_ascii_lowercase();
            if lower.starts_with("https://") || lower.starts_with("http://") {
                Some(UnsubscribeCandidate::http(target, email_id))
            } else if lower.starts_with("mailto:") && parse_mailto(target).is_some() {
                Some(UnsubscribeCandidate::mailto(target, email_id))
            } else {
                None
            }
        })
}

/// Split a `mailto:` URI into recipient, subject and body.
///
/// Path and query values are percent-decoded with RFC 6068 rules: `+` is a
/// literal character, not a space. Keys match case-insensitively. Only the
/// first recipient is used. `None` if there is no recipient.
pub fn parse_mailto(target: &str) -> Option<MailtoRequest> {
    let url = Url::parse(target).ok()?;
    if url.scheme() != "mailto" {
        return None;
    }

    let recipients = urlencoding::decode(url.path()).ok()?;
    let to = recipients
        .split(',')
        .map(str::trim)
        .find(|r| !r.is_empty())?
        .to_string();
    if !to.contains('@') {
        return None;
    }

    let mut subject = None;
    let mut body = None;
    for pair in url.query().unwrap_or_default().split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let Ok(value) = urlencoding::decode(value) else {
            continue;
        };
        match key.to_ascii_lowercase().as_str() {
            "subject" if subject.is_none() => subject = Some(value.into_owned()),
            "body" if body.is_none() => body = Some(value.into_owned()),
            _ => {}
        }
    }

    Some(MailtoRequest {
        to,
        subject: subject
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MAILTO_TEXT.to_string()),
        body: body
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MAILTO_TEXT.to_string()),
    })
}
