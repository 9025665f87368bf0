// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-capacity in-memory log ring, one lane per agent.
//!
//! Writers append operator-facing entries; the status query reads a snapshot.
//! When a lane is over capacity the oldest entry is dropped on insert.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Entries kept per agent before drop-oldest kicks in.
pub const DEFAULT_RING_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One operator-facing log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Per-agent bounded log lanes behind one short-held mutex.
#[derive(Debug)]
pub struct LogRing {
    lanes: Mutex<HashMap<String, VecDeque<LogEntry>>>,
    capacity: usize,
}

impl Default for LogRing {
    fn default() -> Self {
        Self::new(DEFAULT_RING_CAPACITY)
    }
}

impl LogRing {
    pub fn new(capacity: usize) -> Self {
        Self { lanes: Mutex::new(HashMap::new()), capacity: capacity.max(1) }
    }

    /// Append an entry, dropping the oldest if the lane is full.
    pub fn push(&self, agent_id: &str, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry { at: Utc::now(), level, message: message.into() };
        let mut lanes = self.lanes.lock();
        let lane = lanes.entry(agent_id.to_owned()).or_default();
        if lane.len() >= self.capacity {
            lane.pop_front();
        }
        lane.push_back(entry);
    }

    /// Snapshot an agent's lane, oldest first.
    pub fn entries(&self, agent_id: &str) -> Vec<LogEntry> {
        self.lanes.lock().get(agent_id).map(|l| l.iter().cloned().collect()).unwrap_or_default()
    }

    /// Number of entries currently held for an agent.
    pub fn len(&self, agent_id: &str) -> usize {
        self.lanes.lock().get(agent_id).map(VecDeque::len).unwrap_or(0)
    }

    pub fn is_empty(&self, agent_id: &str) -> bool {
        self.len(agent_id) == 0
    }

    /// Drop an agent's lane entirely (agent deletion).
    pub fn remove(&self, agent_id: &str) {
        self.lanes.lock().remove(agent_id);
    }
}

/// Writer handle bound to one agent, injected into its daemon.
#[derive(Clone)]
pub struct AgentLog {
    ring: Arc<LogRing>,
    agent_id: String,
}

impl AgentLog {
    pub fn new(ring: Arc<LogRing>, agent_id: impl Into<String>) -> Self {
        Self { ring, agent_id: agent_id.into() }
    }

    pub fn push(&self, level: LogLevel, message: impl Into<String>) {
        self.ring.push(&self.agent_id, level, message);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.push(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.push(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(LogLevel::Error, message);
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }
}

#[cfg(test)]
#[path = "ring_tests.rs"]
mod tests;
