// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Decision oracle: turns a terminal observation into a structured decision
//! by consulting a language model.
//!
//! The oracle is stateless across calls. Every failure mode — transport,
//! timeout, malformed output, schema violation — collapses to `None`; the
//! caller owns the fallback policy.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::terminal::TerminalState;

/// Hard wall-clock ceiling per oracle call.
pub const ORACLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Lines of terminal text included in the model prompt.
const PROMPT_TAIL_LINES: usize = 200;

/// What the supervisor should do to the pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Respond,
    Wait,
    Approve,
    Reject,
    Compact,
    Clear,
    Escape,
    RequestHelp,
}

impl DecisionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Respond => "respond",
            Self::Wait => "wait",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Compact => "compact",
            Self::Clear => "clear",
            Self::Escape => "escape",
            Self::RequestHelp => "request_help",
        }
    }

    fn from_wire(name: &str) -> Option<Self> {
        match name {
            "respond" => Some(Self::Respond),
            "wait" => Some(Self::Wait),
            "approve" => Some(Self::Approve),
            "reject" => Some(Self::Reject),
            "compact" => Some(Self::Compact),
            "clear" => Some(Self::Clear),
            "escape" => Some(Self::Escape),
            "request_help" => Some(Self::RequestHelp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warn,
    Error,
}

/// Optional operator notification attached to a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionNotice {
    pub message: String,
    pub level: NoticeLevel,
}

/// Structured oracle output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: DecisionAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<DecisionNotice>,
}

impl Decision {
    /// The deterministic fallback when the oracle is unavailable.
    pub fn fallback_continue() -> Self {
        Self {
            action: DecisionAction::Respond,
            response: Some("continue".to_owned()),
            reason: "oracle unavailable, nudging the session forward".to_owned(),
            notification: None,
        }
    }
}

/// One oracle consultation.
#[derive(Debug, Clone)]
pub struct DecisionInput {
    pub master_prompt: String,
    pub terminal_text: String,
    pub terminal_state: TerminalState,
    pub trigger_label: String,
    pub human_instruction: Option<String>,
}

/// The decision seam. `None` means "unavailable"; never an error.
#[async_trait]
pub trait Decide: Send + Sync {
    async fn decide(&self, input: DecisionInput) -> Option<Decision>;
}

/// Settings for the HTTP model client.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Chat-completions endpoint, e.g. `https://api.example.com/v1/chat/completions`.
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
}

/// `Decide` implementation over an OpenAI-style chat-completions API.
pub struct LlmOracle {
    client: reqwest::Client,
    config: OracleConfig,
}

impl LlmOracle {
    pub fn new(config: OracleConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(ORACLE_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    fn system_message(master_prompt: &str) -> String {
        format!(
            "You supervise an interactive coding-assistant terminal session \
             as a virtual operator at the keyboard. Your objective:\n\n{master_prompt}\n\n\
             Reply with a single JSON object: {{\"action\": one of \
             [\"respond\",\"wait\",\"approve\",\"reject\",\"compact\",\"clear\",\
             \"escape\",\"request_help\"], \"response\": string (required when \
             action is \"respond\"), \"reason\": string, \"notification\": \
             optional {{\"message\": string, \"level\": \"info\"|\"warn\"|\"error\"}}}}. \
             No prose outside the JSON object."
        )
    }

    fn user_message(input: &DecisionInput) -> String {
        let lines: Vec<&str> = input.terminal_text.lines().collect();
        let start = lines.len().saturating_sub(PROMPT_TAIL_LINES);
        let tail = lines[start..].join("\n");

        let state = &input.terminal_state;
        let mut message = format!(
            "Trigger: {}\n\nTerminal state flags:\n\
             - processing: {}\n- waiting_for_input: {}\n- permission_prompt: {}\n\
             - context_limit: {}\n- last_error: {}\n\nTerminal output (tail):\n{}",
            input.trigger_label,
            state.is_processing,
            state.is_waiting_for_input,
            state.has_permission_prompt,
            state.has_context_limit,
            state.last_error.as_deref().unwrap_or("none"),
            tail,
        );
        if let Some(ref instruction) = input.human_instruction {
            message.push_str("\n\nOperator instruction: ");
            message.push_str(instruction);
        }
        message
    }

    async fn request(&self, input: &DecisionInput) -> anyhow::Result<Value> {
        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": Self::system_message(&input.master_prompt) },
                { "role": "user", "content": Self::user_message(input) },
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0.2,
        });

        let resp = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let value: Value = resp.json().await?;
        Ok(value)
    }
}

/// Extract the assistant message content from a chat-completions response.
fn response_content(value: &Value) -> Option<&str> {
    value
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
}

/// Parse and validate a decision document against the closed schema.
///
/// Returns `None` on any violation: unknown action, missing/empty `response`
/// for `respond`, or a `response` supplied for any other action.
pub fn validate_decision(doc: &Value) -> Option<Decision> {
    let action = DecisionAction::from_wire(doc.get("action")?.as_str()?)?;
    let response = doc.get("response").and_then(|v| v.as_str()).map(str::to_owned);
    let reason = doc
        .get("reason")
        .and_then(|v| v.as_str())
        .unwrap_or("no reason given")
        .to_owned();

    match action {
        DecisionAction::Respond => {
            if response.as_deref().is_none_or(|r| r.trim().is_empty()) {
                return None;
            }
        }
        _ => {
            if response.is_some() {
                return None;
            }
        }
    }

    let notification = doc.get("notification").and_then(|n| {
        let message = n.get("message")?.as_str()?.to_owned();
        let level = match n.get("level").and_then(|l| l.as_str()) {
            Some("warn") => NoticeLevel::Warn,
            Some("error") => NoticeLevel::Error,
            _ => NoticeLevel::Info,
        };
        Some(DecisionNotice { message, level })
    });

    Some(Decision { action, response, reason, notification })
}

#[async_trait]
impl Decide for LlmOracle {
    async fn decide(&self, input: DecisionInput) -> Option<Decision> {
        let outcome = tokio::time::timeout(ORACLE_TIMEOUT, self.request(&input)).await;
        let value = match outcome {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                warn!(trigger = %input.trigger_label, err = %e, "oracle request failed");
                return None;
            }
            Err(_) => {
                warn!(trigger = %input.trigger_label, "oracle request timed out");
                return None;
            }
        };

        let content = response_content(&value)?;
        let doc: Value = match serde_json::from_str(content) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(err = %e, "oracle returned non-JSON content");
                return None;
            }
        };
        let decision = validate_decision(&doc);
        if decision.is_none() {
            warn!(content, "oracle output failed schema validation");
        } else {
            debug!(action = ?decision.as_ref().map(|d| d.action), "oracle decided");
        }
        decision
    }
}

#[cfg(test)]
#[path = "oracle_tests.rs"]
mod tests;
