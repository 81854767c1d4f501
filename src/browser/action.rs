//! Primitive UI actions proposed by the oracle and executed by the driver.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What to do with the matched element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionVerb {
    Click,
    Fill,
    Submit,
}

impl ActionVerb {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "click" => Some(Self::Click),
            "fill" | "type" => Some(Self::Fill),
            "submit" => Some(Self::Submit),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Fill => "fill",
            Self::Submit => "submit",
        }
    }
}

/// One step of an [`ActionPlan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationAction {
    pub verb: ActionVerb,
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Ordered actions. Advisory: an empty plan means nothing to automate.
pub type ActionPlan = Vec<AutomationAction>;

impl AutomationAction {
    pub fn click(selector: impl Into<String>) -> Self {
        Self {
            verb: ActionVerb::Click,
            selector: selector.into(),
            value: None,
        }
    }

    pub fn fill(selector: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            verb: ActionVerb::Fill,
            selector: selector.into(),
            value: Some(value.into()),
        }
    }

    pub fn submit(selector: impl Into<String>) -> Self {
        Self {
            verb: ActionVerb::Submit,
            selector: selector.into(),
            value: None,
        }
    }

    /// Parse the compact `verb:selector[:value]` form.
    ///
    /// Splits on the first two colons only, so the value may contain colons.
    /// Returns `None` for unknown verbs or an empty selector.
    pub fn parse_compact(raw: &str) -> Option<Self> {
        let mut parts = raw.splitn(3, ':');
        let verb = ActionVerb::parse(parts.next()?)?;
        let selector = parts.next()?.trim();
        if selector.is_empty() {
            return None;
        }
        let value = parts
            .next()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        Some(Self {
            verb,
            selector: selector.to_string(),
            value,
        })
    }
}

impl fmt::Display for AutomationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}:{}:{}", self.verb.label(), self.selector, value),
            None => write!(f, "{}:{}", self.verb.label(), self.selector),
        }
    }
}
