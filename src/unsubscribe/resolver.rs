//! Unsubscribe resolver: the multi-stage strategy for one URL.
//!
//! Stages run in order and short-circuit on the first definitive success:
//! 1. HttpAttempt: plain GET, judge the body whatever the status code
//! 2. AiPlanOnHttpResult: plan on the GET body, act in the browser, judge
//! 3. BrowserDirect: load in the browser, judge
//! 4. AiPlanOnBrowserResult: plan on the rendered page, act, judge
//! 5. Terminal: everything failed
//!
//! Nothing here returns an error. Every failure becomes a stage record and,
//! eventually, the terminal outcome.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::browser::BrowserDriver;
use crate::oracle::{AiOracle, Judgment, JudgmentStatus};
use crate::unsubscribe::probe::HttpProbe;
use crate::unsubscribe::{OutcomeStatus, UnsubscribeMethod, UnsubscribeOutcome};

pub const ALL_FAILED_MESSAGE: &str =
    "All unsubscribe automation methods failed. Manual intervention required.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    HttpAttempt,
    AiPlanOnHttpResult,
    BrowserDirect,
    AiPlanOnBrowserResult,
    Terminal,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::HttpAttempt => "http_attempt",
            Self::AiPlanOnHttpResult => "ai_plan_on_http_result",
            Self::BrowserDirect => "browser_direct",
            Self::AiPlanOnBrowserResult => "ai_plan_on_browser_result",
            Self::Terminal => "terminal",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What one stage concluded. `judgment` is `None` when the stage never got
/// as far as judging a page (transport failure, nothing to plan, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRecord {
    pub stage: Stage,
    pub judgment: Option<JudgmentStatus>,
    pub message: String,
}

/// Per-stage history of one resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionTrace {
    pub records: Vec<StageRecord>,
}

impl ResolutionTrace {
    fn record(&mut self, stage: Stage, judgment: Option<JudgmentStatus>, message: impl Into<String>) {
        let message = message.into();
        info!(
            stage = %stage,
            judgment = judgment.map(|j| j.label()).unwrap_or("none"),
            message = %message,
            "Resolution stage finished"
        );
        self.records.push(StageRecord {
            stage,
            judgment,
            message,
        });
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.records.iter().map(|r| r.stage).collect()
    }

    pub fn last_message(&self) -> Option<&str> {
        self.records.last().map(|r| r.message.as_str())
    }
}

/// Outcome plus how it was reached.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub outcome: UnsubscribeOutcome,
    pub trace: ResolutionTrace,
}

/// Result of the plain GET stage.
#[derive(Debug, Clone)]
pub struct HttpAttempt {
    /// `None` on transport failure.
    pub judgment: Option<Judgment>,
    /// Empty on transport failure.
    pub body: String,
    pub message: String,
}

impl HttpAttempt {
    pub fn succeeded(&self) -> bool {
        matches!(&self.judgment, Some(j) if j.status == JudgmentStatus::Success)
    }
}

pub struct UnsubscribeResolver {
    probe: Arc<dyn HttpProbe>,
    oracle: AiOracle,
    browser: Arc<dyn BrowserDriver>,
}

impl UnsubscribeResolver {
    pub fn new(probe: Arc<dyn HttpProbe>, oracle: AiOracle, browser: Arc<dyn BrowserDriver>) -> Self {
        Self {
            probe,
            oracle,
            browser,
        }
    }

    pub async fn resolve(&self, url: &str) -> UnsubscribeOutcome {
        self.resolve_traced(url).await.outcome
    }

    pub async fn resolve_traced(&self, url: &str) -> Resolution {
        info!(url, "Starting unsubscribe resolution");
        let mut trace = ResolutionTrace::default();

        // 1. Plain GET
        let http = self.http_attempt(url).await;
        trace.record(
            Stage::HttpAttempt,
            http.judgment.as_ref().map(|j| j.status),
            http.message.clone(),
        );
        if http.succeeded() {
            return finish(
                UnsubscribeOutcome::success(UnsubscribeMethod::Http, http.message),
                trace,
            );
        }

        // 2. Plan on the GET body
        if http.body.trim().is_empty() {
            trace.record(Stage::AiPlanOnHttpResult, None, "No HTML content to analyze");
        } else if let Some((status, message)) = self
            .plan_and_act(url, &http.body, "http_response", Stage::AiPlanOnHttpResult, &mut trace)
            .await
            && status == JudgmentStatus::Success
        {
            return finish(
                UnsubscribeOutcome::success(UnsubscribeMethod::PantherHttpActions, message),
                trace,
            );
        }

        // 3. Direct browser load
        let snapshot = self.browser.load(url).await;
        let rendered = if snapshot.success {
            let judgment = self.oracle.judge_outcome(&snapshot.html, "browser_direct").await;
            let message = match judgment.status {
                JudgmentStatus::Success => "Browser unsubscribe successful on initial request".to_string(),
                JudgmentStatus::Failure => {
                    format!("Browser request completed but unsubscribe failed: {}", judgment.reason)
                }
                JudgmentStatus::Inconclusive => format!(
                    "Browser request completed but unsubscribe status is inconclusive: {}",
                    judgment.reason
                ),
            };
            trace.record(Stage::BrowserDirect, Some(judgment.status), message.clone());
            if judgment.status == JudgmentStatus::Success {
                return finish(
                    UnsubscribeOutcome::success(UnsubscribeMethod::PantherDirect, message),
                    trace,
                );
            }
            snapshot.html
        } else {
            trace.record(Stage::BrowserDirect, None, snapshot.diagnostic_message);
            String::new()
        };

        // 4. Plan on the rendered page
        if rendered.trim().is_empty() {
            trace.record(Stage::AiPlanOnBrowserResult, None, "No HTML content to analyze");
        } else if let Some((status, message)) = self
            .plan_and_act(url, &rendered, "browser_response", Stage::AiPlanOnBrowserResult, &mut trace)
            .await
        {
            let outcome_status = match status {
                JudgmentStatus::Success => Some(OutcomeStatus::Success),
                JudgmentStatus::Inconclusive => Some(OutcomeStatus::Inconclusive),
                JudgmentStatus::Failure => None,
            };
            if let Some(outcome_status) = outcome_status {
                return finish(
                    UnsubscribeOutcome::new(outcome_status, UnsubscribeMethod::PantherAiActions, message),
                    trace,
                );
            }
        }

        // 5. Give up
        let message = match trace.last_message() {
            Some(last) => format!("{ALL_FAILED_MESSAGE} Last attempt: {last}"),
            None => ALL_FAILED_MESSAGE.to_string(),
        };
        trace.record(Stage::Terminal, None, ALL_FAILED_MESSAGE);
        warn!(url, "All unsubscribe methods failed");
        finish(UnsubscribeOutcome::error(UnsubscribeMethod::AllFailed, message), trace)
    }

    /// Stage 1 on its own. Also the whole of the List-Unsubscribe HTTP path.
    pub async fn http_attempt(&self, url: &str) -> HttpAttempt {
        let response = match self.probe.get(url).await {
            Ok(response) => response,
            Err(e) => {
                warn!(url, error = %e, "HTTP unsubscribe request failed");
                return HttpAttempt {
                    judgment: None,
                    body: String::new(),
                    message: format!("HTTP request failed: {e}"),
                };
            }
        };

        let context = format!("http_response, status {}", response.status);
        let judgment = self.oracle.judge_outcome(&response.body, &context).await;
        let message = match judgment.status {
            JudgmentStatus::Success => format!("HTTP unsubscribe successful: {}", judgment.reason),
            JudgmentStatus::Failure => {
                format!("HTTP request completed but unsubscribe failed: {}", judgment.reason)
            }
            JudgmentStatus::Inconclusive => format!(
                "HTTP request completed but unsubscribe status is inconclusive: {}",
                judgment.reason
            ),
        };

        HttpAttempt {
            judgment: Some(judgment),
            body: response.body,
            message,
        }
    }

    /// Ask for a plan on `html`; if there is one, run it and judge the
    /// result. `None` when nothing was executed or judged.
    async fn plan_and_act(
        &self,
        url: &str,
        html: &str,
        context: &str,
        stage: Stage,
        trace: &mut ResolutionTrace,
    ) -> Option<(JudgmentStatus, String)> {
        let plan = self.oracle.plan_actions(html, context).await;
        if !plan.is_actionable() {
            trace.record(stage, None, "AI does not suggest browser actions");
            return None;
        }

        let snapshot = self.browser.act(url, &plan.actions).await;
        if !snapshot.success {
            trace.record(stage, None, snapshot.diagnostic_message);
            return None;
        }

        let judgment = self.oracle.judge_outcome(&snapshot.html, "browser_ai_actions").await;
        let message = match judgment.status {
            JudgmentStatus::Success => "AI-guided browser actions successful".to_string(),
            JudgmentStatus::Failure => format!(
                "AI-guided browser actions completed but unsubscribe failed: {}",
                judgment.reason
            ),
            JudgmentStatus::Inconclusive => format!(
                "AI-guided browser actions completed but unsubscribe status is inconclusive: {}",
                judgment.reason
            ),
        };
        trace.record(stage, Some(judgment.status), message.clone());
        Some((judgment.status, message))
    }
}

fn finish(outcome: UnsubscribeOutcome, trace: ResolutionTrace) -> Resolution {
    info!(
        status = ?outcome.status,
        method = %outcome.method,
        stages = trace.records.len(),
        "Unsubscribe resolution finished"
    );
    Resolution { outcome, trace }
}
