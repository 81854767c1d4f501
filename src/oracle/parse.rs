//! Strict parsing of oracle replies, with heuristic fallbacks.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use crate::browser::{ActionPlan, AutomationAction};
use crate::extract;
use crate::oracle::{ActionPlanResult, Categorization, Judgment, JudgmentStatus, ParsedJudgment};

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("url regex is valid"));

const SUCCESS_PHRASES: &[&str] = &[
    "successfully unsubscribed",
    "you have been unsubscribed",
    "you've been unsubscribed",
    "unsubscribed successfully",
    "removed from",
    "no longer receive",
    "opted out",
    "preferences have been updated",
];

const FAILURE_PHRASES: &[&str] = &[
    "error",
    "failed",
    "invalid",
    "expired",
    "not found",
    "try again",
    "something went wrong",
];

/// Match a raw category answer against the provided names.
///
/// Surrounding whitespace, dots and newlines are ignored; the comparison is
/// case-insensitive and exact otherwise. Returns the provided spelling.
pub fn match_category(raw: &str, names: &[&str]) -> Categorization {
    let cleaned = raw.trim_matches(|c: char| c.is_whitespace() || c == '.');
    names
        .iter()
        .find(|name| name.to_lowercase() == cleaned.to_lowercase())
        .map(|name| Categorization::Matched((*name).to_string()))
        .unwrap_or_else(|| Categorization::NotFound(raw.to_string()))
}

/// First `http(s)://` URL in a link-finder reply, or `None` for "NONE".
///
/// The URL is returned whole. Trailing sentence punctuation is stripped, a
/// closing bracket only when it has no opener inside the URL, and a quote,
/// backtick or `*` only when the same character sits right before the URL.
pub fn parse_link_reply(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return None;
    }
    let found = URL_RE.find(trimmed)?;
    let wrapper = trimmed[..found.start()].chars().next_back();
    let url = trim_url_tail(found.as_str(), wrapper);
    if url.len() <= "https://".len() {
        return None;
    }
    Some(url.to_string())
}

fn trim_url_tail(mut url: &str, wrapper: Option<char>) -> &str {
    while let Some(last) = url.chars().next_back() {
        let strip = match last {
            '.' | ',' | ';' | ':' | '!' | '?' | '>' => true,
            ')' => unbalanced(url, '(', ')'),
            ']' => unbalanced(url, '[', ']'),
            '}' => unbalanced(url, '{', '}'),
            '"' | '\'' | '`' | '*' => wrapper == Some(last),
            _ => false,
        };
        if !strip {
            break;
        }
        url = &url[..url.len() - last.len_utf8()];
    }
    url
}

fn unbalanced(url: &str, open: char, close: char) -> bool {
    url.matches(close).count() > url.matches(open).count()
}

/// Extract a JSON object from a reply that may be fenced or wrapped in prose.
pub fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

#[derive(Deserialize)]
struct RawJudgment {
    status: String,
    #[serde(default)]
    reason: String,
}

/// Parse a judge reply. Anything but a well-formed object with a known
/// status is `Unparsed`.
pub fn parse_judgment(raw: &str) -> ParsedJudgment {
    let json = extract_json_object(raw);
    let Ok(parsed) = serde_json::from_str::<RawJudgment>(&json) else {
        return ParsedJudgment::Unparsed;
    };
    let status = match parsed.status.trim().to_ascii_lowercase().as_str() {
        "success" => JudgmentStatus::Success,
        "failure" | "failed" | "error" => JudgmentStatus::Failure,
        "inconclusive" | "unknown" => JudgmentStatus::Inconclusive,
        _ => return ParsedJudgment::Unparsed,
    };
    ParsedJudgment::Parsed(Judgment {
        status,
        reason: parsed.reason.trim().to_string(),
    })
}

/// Phrase-based judgment over the page's visible text.
pub fn heuristic_judgment(html: &str) -> Judgment {
    let text = extract::plain_text(html).to_lowercase();

    if let Some(phrase) = SUCCESS_PHRASES.iter().find(|p| text.contains(*p)) {
        return Judgment {
            status: JudgmentStatus::Success,
            reason: format!("Page text contains \"{phrase}\""),
        };
    }
    if let Some(phrase) = FAILURE_PHRASES.iter().find(|p| text.contains(*p)) {
        return Judgment {
            status: JudgmentStatus::Failure,
            reason: format!("Page text contains \"{phrase}\""),
        };
    }
    Judgment {
        status: JudgmentStatus::Inconclusive,
        reason: "No recognizable confirmation or error on the page".to_string(),
    }
}

#[derive(Deserialize)]
struct RawPlan {
    #[serde(default, alias = "canAutomate", alias = "canUsePanther")]
    can_automate: bool,
    #[serde(default)]
    actions: Vec<serde_json::Value>,
}

/// Parse a planner reply, or `None` if it is not a plan object.
///
/// Individual actions may be compact strings or objects; unknown verbs are
/// dropped with a warning rather than failing the plan.
pub fn parse_plan(raw: &str) -> Option<ActionPlanResult> {
    let json = extract_json_object(raw);
    let parsed: RawPlan = serde_json::from_str(&json).ok()?;

    let mut actions: ActionPlan = Vec::with_capacity(parsed.actions.len());
    for value in parsed.actions {
        let action = match &value {
            serde_json::Value::String(s) => AutomationAction::parse_compact(s),
            serde_json::Value::Object(_) => serde_json::from_value(value.clone()).ok(),
            _ => None,
        };
        match action {
            Some(action) => actions.push(action),
            None => warn!(action = %value, "Dropping unrecognized action from plan"),
        }
    }

    Some(ActionPlanResult {
        can_automate: parsed.can_automate,
        actions,
    })
}

/// Plan used when the reply could not be parsed: automatable iff the page
/// has something submittable, but with no concrete steps.
pub fn fallback_plan(html: &str) -> ActionPlanResult {
    let lower = html.to_ascii_lowercase();
    let submittable = lower.contains("<form")
        || lower.contains("type=\"submit\"")
        || lower.contains("type='submit'")
        || lower.contains("type=submit");
    ActionPlanResult {
        can_automate: submittable,
        actions: Vec::new(),
    }
}
