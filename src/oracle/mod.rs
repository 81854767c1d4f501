//! AI oracle: intent-specific questions answered by the LLM.
//!
//! Every call is one bounded round-trip at temperature 0. Replies are parsed
//! strictly into tagged results; judgment and planning degrade to heuristics
//! when the reply is malformed or the backend is unreachable, so the
//! resolver never has to handle an oracle error mid-pipeline.

pub mod parse;
mod prompts;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::browser::ActionPlan;
use crate::error::OracleError;
use crate::extract;
use crate::llm::costs;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};

/// Default cap on page/email content embedded in a prompt, in chars.
pub const ORACLE_MAX_CONTENT_CHARS: usize = 12_000;

const CATEGORIZE_MAX_TOKENS: u32 = 10;
const SUMMARIZE_MAX_TOKENS: u32 = 100;
/// Long tracking URLs easily exceed 100 tokens.
const LINK_MAX_TOKENS: u32 = 1024;
const JUDGE_MAX_TOKENS: u32 = 256;
const PLAN_MAX_TOKENS: u32 = 512;

/// A category offered to [`AiOracle::categorize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub description: String,
}

impl Category {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Result of categorization. `NotFound` carries the raw reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Categorization {
    Matched(String),
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JudgmentStatus {
    Success,
    Failure,
    Inconclusive,
}

impl JudgmentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Inconclusive => "inconclusive",
        }
    }
}

/// Verdict on a page reached by an unsubscribe attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Judgment {
    pub status: JudgmentStatus,
    pub reason: String,
}

/// Outcome of parsing a judge reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedJudgment {
    Parsed(Judgment),
    Unparsed,
}

/// Whether a page can be driven to completion, and how.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActionPlanResult {
    pub can_automate: bool,
    pub actions: ActionPlan,
}

impl ActionPlanResult {
    /// Automatable with at least one concrete step.
    pub fn is_actionable(&self) -> bool {
        self.can_automate && !self.actions.is_empty()
    }
}

/// The oracle. Cheap to clone.
#[derive(Clone)]
pub struct AiOracle {
    llm: Arc<dyn LlmProvider>,
    max_content_chars: usize,
}

impl AiOracle {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            max_content_chars: ORACLE_MAX_CONTENT_CHARS,
        }
    }

    pub fn with_max_content_chars(mut self, max: usize) -> Self {
        self.max_content_chars = max;
        self
    }

    /// Assign `body` to exactly one of `categories`.
    pub async fn categorize(
        &self,
        body: &str,
        categories: &[Category],
    ) -> Result<Categorization, OracleError> {
        if categories.is_empty() {
            return Ok(Categorization::NotFound(String::new()));
        }

        let prompt = prompts::categorize(&self.cap(body), categories);
        let raw = self
            .ask(prompts::CLASSIFIER_SYSTEM, prompt, CATEGORIZE_MAX_TOKENS)
            .await?;

        let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
        let result = parse::match_category(&raw, &names);
        if let Categorization::NotFound(ref raw) = result {
            warn!(reply = %raw, "Category not found in oracle reply");
        }
        Ok(result)
    }

    /// One or two sentence summary.
    pub async fn summarize(&self, body: &str) -> Result<String, OracleError> {
        let raw = self
            .ask(
                prompts::CLASSIFIER_SYSTEM,
                prompts::summarize(&self.cap(body)),
                SUMMARIZE_MAX_TOKENS,
            )
            .await?;
        Ok(raw.trim().to_string())
    }

    /// Locate the unsubscribe URL in an email body.
    pub async fn find_unsubscribe_link(&self, body: &str) -> Result<Option<String>, OracleError> {
        let pruned = extract::pruned_html(body);
        let raw = self
            .ask(
                prompts::LINK_FINDER_SYSTEM,
                prompts::find_unsubscribe_link(&self.cap(&pruned)),
                LINK_MAX_TOKENS,
            )
            .await?;
        let link = parse::parse_link_reply(&raw);
        debug!(found = link.is_some(), "Unsubscribe link lookup");
        Ok(link)
    }

    /// Judge whether `html` shows a completed unsubscribe.
    ///
    /// Never fails: unparseable replies and transport errors both fall back
    /// to [`parse::heuristic_judgment`].
    pub async fn judge_outcome(&self, html: &str, context: &str) -> Judgment {
        let page_text = extract::structured_text(html);
        if page_text.is_empty() {
            return Judgment {
                status: JudgmentStatus::Inconclusive,
                reason: "Page has no visible text".to_string(),
            };
        }

        let prompt = prompts::judge_outcome(&self.cap(&page_text), context);
        match self.ask(prompts::JUDGE_SYSTEM, prompt, JUDGE_MAX_TOKENS).await {
            Ok(raw) => match parse::parse_judgment(&raw) {
                ParsedJudgment::Parsed(judgment) => judgment,
                ParsedJudgment::Unparsed => {
                    warn!(context, "Unparseable judgment, using page heuristics");
                    parse::heuristic_judgment(html)
                }
            },
            Err(e) => {
                warn!(context, error = %e, "Oracle unavailable for judgment, using page heuristics");
                parse::heuristic_judgment(html)
            }
        }
    }

    /// Propose UI actions that would complete the unsubscribe on `html`.
    ///
    /// Never fails: an unreachable backend means "cannot automate", an
    /// unparseable reply falls back to [`parse::fallback_plan`].
    pub async fn plan_actions(&self, html: &str, context: &str) -> ActionPlanResult {
        let half = self.max_content_chars / 2;
        let interactive = truncate_chars(&extract::interactive_elements(html), half);
        let pruned = truncate_chars(&extract::pruned_html(html), half);

        let prompt = prompts::plan_actions(&interactive, &pruned, context);
        match self.ask(prompts::PLANNER_SYSTEM, prompt, PLAN_MAX_TOKENS).await {
            Ok(raw) => match parse::parse_plan(&raw) {
                Some(plan) => {
                    info!(
                        context,
                        can_automate = plan.can_automate,
                        steps = plan.actions.len(),
                        "Oracle proposed action plan"
                    );
                    plan
                }
                None => {
                    warn!(context, "Unparseable action plan, falling back to form detection");
                    parse::fallback_plan(html)
                }
            },
            Err(e) => {
                warn!(context, error = %e, "Oracle unavailable for planning");
                ActionPlanResult::default()
            }
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    async fn ask(
        &self,
        system: &str,
        prompt: String,
        max_tokens: u32,
    ) -> Result<String, OracleError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(system),
            ChatMessage::user(prompt),
        ])
        .with_temperature(0.0)
        .with_max_tokens(max_tokens);

        let response = self.llm.complete(request).await?;

        let cost = costs::estimate(
            self.llm.cost_per_token(),
            response.input_tokens,
            response.output_tokens,
        );
        debug!(
            model = self.llm.model_name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            cost = %cost,
            "Oracle call complete"
        );

        Ok(response.content)
    }

    fn cap(&self, content: &str) -> String {
        truncate_chars(content, self.max_content_chars)
    }
}

/// First `max` chars of `s`, never splitting a char.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
