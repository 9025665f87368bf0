// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hook event model and wire normalization.
//!
//! Supervised assistants deliver lifecycle events as JSON payloads POSTed to
//! the ingress. The wire form tags the event kind with `hook_event_name` (or
//! the older `event_type`); everything else is best-effort extraction from a
//! loosely-shaped body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle events emitted by a supervised assistant session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HookEventType {
    Stop,
    Notification,
    SubagentStop,
    PreCompact,
    SessionStart,
    SessionEnd,
    PreToolUse,
    PostToolUse,
    PostToolUseFailure,
    PermissionRequest,
    UserPromptSubmit,
    SubagentStart,
    TeammateIdle,
    TaskCompleted,
}

impl HookEventType {
    pub const ALL: &'static [HookEventType] = &[
        Self::Stop,
        Self::Notification,
        Self::SubagentStop,
        Self::PreCompact,
        Self::SessionStart,
        Self::SessionEnd,
        Self::PreToolUse,
        Self::PostToolUse,
        Self::PostToolUseFailure,
        Self::PermissionRequest,
        Self::UserPromptSubmit,
        Self::SubagentStart,
        Self::TeammateIdle,
        Self::TaskCompleted,
    ];

    /// Wire name as it appears in hook payloads and settings files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "Stop",
            Self::Notification => "Notification",
            Self::SubagentStop => "SubagentStop",
            Self::PreCompact => "PreCompact",
            Self::SessionStart => "SessionStart",
            Self::SessionEnd => "SessionEnd",
            Self::PreToolUse => "PreToolUse",
            Self::PostToolUse => "PostToolUse",
            Self::PostToolUseFailure => "PostToolUseFailure",
            Self::PermissionRequest => "PermissionRequest",
            Self::UserPromptSubmit => "UserPromptSubmit",
            Self::SubagentStart => "SubagentStart",
            Self::TeammateIdle => "TeammateIdle",
            Self::TaskCompleted => "TaskCompleted",
        }
    }

    /// Parse a wire name. Unrecognized values map to `Stop`.
    pub fn from_wire(name: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == name)
            .unwrap_or(Self::Stop)
    }
}

impl std::fmt::Display for HookEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a `SessionStart` fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartSource {
    Startup,
    Resume,
    Clear,
    Compact,
    Unknown,
}

impl StartSource {
    pub fn from_wire(name: &str) -> Self {
        match name {
            "startup" => Self::Startup,
            "resume" => Self::Resume,
            "clear" => Self::Clear,
            "compact" => Self::Compact,
            _ => Self::Unknown,
        }
    }

    /// True for the post-clear/post-compact reawakening path.
    pub fn is_restart(&self) -> bool {
        matches!(self, Self::Clear | Self::Compact)
    }
}

/// Type-specific payload carried by some event kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventDetail {
    None,
    PreCompact { trigger: String },
    SessionStart { source: StartSource },
    SessionEnd { reason: Option<String> },
    Tool { tool_name: Option<String>, tool_input: Option<Value> },
}

/// A normalized hook event, ready for supervisor dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookEvent {
    pub agent_id: String,
    pub event_type: HookEventType,
    pub occurred_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    pub received_at: DateTime<Utc>,
    pub detail: EventDetail,
}

impl HookEvent {
    /// The `SessionStart` source, when this event carries one.
    pub fn start_source(&self) -> Option<StartSource> {
        match self.detail {
            EventDetail::SessionStart { source } => Some(source),
            _ => None,
        }
    }
}

fn str_field(body: &Value, key: &str) -> Option<String> {
    body.get(key).and_then(|v| v.as_str()).map(|s| s.to_owned())
}

/// Normalize a raw hook payload into a [`HookEvent`].
///
/// The event kind comes from `hook_event_name` (falling back to the older
/// `event_type` key), defaulting to `Stop` when absent or unrecognized. The
/// wire carries no timestamp, so `occurred_at` is stamped at ingress.
pub fn normalize(agent_id: &str, body: &Value) -> HookEvent {
    let now = Utc::now();
    let event_type = body
        .get("hook_event_name")
        .or_else(|| body.get("event_type"))
        .and_then(|v| v.as_str())
        .map(HookEventType::from_wire)
        .unwrap_or(HookEventType::Stop);

    let detail = match event_type {
        HookEventType::PreCompact => EventDetail::PreCompact {
            trigger: str_field(body, "trigger").unwrap_or_else(|| "auto".to_owned()),
        },
        HookEventType::SessionStart => EventDetail::SessionStart {
            source: str_field(body, "source")
                .map(|s| StartSource::from_wire(&s))
                .unwrap_or(StartSource::Unknown),
        },
        HookEventType::SessionEnd => EventDetail::SessionEnd { reason: str_field(body, "reason") },
        HookEventType::PreToolUse
        | HookEventType::PostToolUse
        | HookEventType::PostToolUseFailure => EventDetail::Tool {
            tool_name: str_field(body, "tool_name"),
            tool_input: body.get("tool_input").cloned(),
        },
        _ => EventDetail::None,
    };

    HookEvent {
        agent_id: agent_id.to_owned(),
        event_type,
        occurred_at: now,
        assistant_session_id: str_field(body, "session_id"),
        project_path: str_field(body, "cwd"),
        received_at: now,
        detail,
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
