// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable agent records.
//!
//! An agent embodies one operator-authored objective (the master prompt) and
//! is bound to at most one supervised session at a time through its
//! `connection`. Records are persisted by the [`crate::store::AgentStore`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::HookEventType;

/// Lifecycle status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Active,
    Error,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Error => "error",
        }
    }
}

/// Binding between an agent and a supervised session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub project_path: String,
    /// Session-manager session id.
    pub session_id: Option<String>,
    /// Terminal pane hosting the assistant REPL.
    pub pane_id: Option<String>,
    /// The assistant's own session identifier, refreshed on `SessionStart`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_session_id: Option<String>,
    /// Fork/branch id within the session-manager record, when connected to a fork.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    pub connected_at: DateTime<Utc>,
}

/// Operator-chat transport configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    #[serde(default)]
    pub enabled: bool,
}

/// Watchdog tuning. Floors are enforced by [`WatchdogTuning::normalized`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchdogTuning {
    pub poll_interval_secs: u64,
    pub action_cooldown_secs: u64,
    pub attention_threshold: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

pub const MIN_POLL_INTERVAL_SECS: u64 = 5;
pub const MIN_ACTION_COOLDOWN_SECS: u64 = 10;

impl Default for WatchdogTuning {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            action_cooldown_secs: 60,
            attention_threshold: 2,
            enabled: true,
        }
    }
}

impl WatchdogTuning {
    /// Clamp fields to their floors (poll >= 5 s, cooldown >= 10 s, threshold >= 1).
    pub fn normalized(mut self) -> Self {
        self.poll_interval_secs = self.poll_interval_secs.max(MIN_POLL_INTERVAL_SECS);
        self.action_cooldown_secs = self.action_cooldown_secs.max(MIN_ACTION_COOLDOWN_SECS);
        self.attention_threshold = self.attention_threshold.max(1);
        self
    }
}

/// One supervised master agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Opaque unique id; never changes after creation.
    pub id: String,
    pub name: String,
    pub master_prompt: String,
    /// Event kinds this agent reacts to. Always contains `SessionStart`.
    pub hook_events: BTreeSet<HookEventType>,
    #[serde(default)]
    pub auto_approve: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram: Option<TelegramConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watchdog: Option<WatchdogTuning>,
    pub status: AgentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<Connection>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Agent {
    /// Build a fresh idle agent with a v4 id.
    pub fn new(name: impl Into<String>, master_prompt: impl Into<String>) -> Self {
        let now = Utc::now();
        let mut hook_events = BTreeSet::new();
        hook_events.insert(HookEventType::Stop);
        hook_events.insert(HookEventType::SessionStart);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            master_prompt: master_prompt.into(),
            hook_events,
            auto_approve: false,
            telegram: None,
            watchdog: None,
            status: AgentStatus::Idle,
            connection: None,
            created_at: now,
            last_activity: now,
            last_error: None,
        }
    }

    /// Re-seed the implicit `SessionStart` subscription and clamp tuning.
    ///
    /// Called after every create/update so a patch can never remove the
    /// subscription the restart path depends on.
    pub fn normalize(&mut self) {
        self.hook_events.insert(HookEventType::SessionStart);
        if let Some(tuning) = self.watchdog.take() {
            self.watchdog = Some(tuning.normalized());
        }
    }

    /// The connected pane id, when one exists.
    pub fn pane_id(&self) -> Option<&str> {
        self.connection.as_ref().and_then(|c| c.pane_id.as_deref())
    }

    /// Effective watchdog tuning (defaults when unset).
    pub fn watchdog_tuning(&self) -> WatchdogTuning {
        self.watchdog.clone().unwrap_or_default()
    }
}

/// Shared, refreshable snapshot of an agent record.
///
/// The daemon owns one cell per agent; the machine and watchdog read from it
/// so a `refresh()` makes operator edits visible mid-flight. Reads clone out
/// under a short lock — nothing holds the lock across an await.
#[derive(Debug)]
pub struct AgentCell {
    inner: parking_lot::RwLock<Agent>,
}

impl AgentCell {
    pub fn new(agent: Agent) -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self { inner: parking_lot::RwLock::new(agent) })
    }

    pub fn get(&self) -> Agent {
        self.inner.read().clone()
    }

    pub fn set(&self, agent: Agent) {
        *self.inner.write() = agent;
    }

    pub fn id(&self) -> String {
        self.inner.read().id.clone()
    }

    pub fn pane_id(&self) -> Option<String> {
        self.inner.read().pane_id().map(str::to_owned)
    }

    pub fn master_prompt(&self) -> String {
        self.inner.read().master_prompt.clone()
    }
}

/// Mutable subset of an agent accepted by `AgentStore::update`.
///
/// `id` and `created_at` are deliberately absent: patches cannot touch them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPatch {
    pub name: Option<String>,
    pub master_prompt: Option<String>,
    pub hook_events: Option<BTreeSet<HookEventType>>,
    pub auto_approve: Option<bool>,
    /// `Some(None)` clears the config, `Some(Some(..))` replaces it.
    #[serde(default, with = "double_option")]
    pub telegram: Option<Option<TelegramConfig>>,
    #[serde(default, with = "double_option")]
    pub watchdog: Option<Option<WatchdogTuning>>,
}

mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(de).map(Some)
    }
}

impl AgentPatch {
    /// Apply this patch to an agent in place.
    pub fn apply(&self, agent: &mut Agent) {
        if let Some(ref name) = self.name {
            agent.name = name.clone();
        }
        if let Some(ref prompt) = self.master_prompt {
            agent.master_prompt = prompt.clone();
        }
        if let Some(ref events) = self.hook_events {
            agent.hook_events = events.clone();
        }
        if let Some(auto) = self.auto_approve {
            agent.auto_approve = auto;
        }
        if let Some(ref telegram) = self.telegram {
            agent.telegram = telegram.clone();
        }
        if let Some(ref watchdog) = self.watchdog {
            agent.watchdog = watchdog.clone();
        }
        agent.normalize();
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
