// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal adapter: capture a pane into a snapshot, derive its state,
//! and issue canonical key sequences.

pub mod parse;

pub use parse::{PermissionType, TerminalState};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::mux::{keys, TerminalMux};

/// Gap between literal text and the Enter that submits it, so the REPL's
/// input handling observes them as distinct writes.
const ENTER_GAP: Duration = Duration::from_millis(50);

/// Raw text captured from a pane, plus capture metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalSnapshot {
    pub pane_id: String,
    /// Multiplexer session owning the pane (prefix before `:`), when present.
    pub session_id: Option<String>,
    pub text: String,
    pub captured_at: DateTime<Utc>,
    pub line_count: usize,
}

impl TerminalSnapshot {
    pub fn lines(&self) -> Vec<&str> {
        self.text.lines().collect()
    }

    /// The last `n` lines of the snapshot, joined back into text.
    pub fn tail(&self, n: usize) -> String {
        let lines = self.lines();
        let start = lines.len().saturating_sub(n);
        lines[start..].join("\n")
    }
}

/// Sends and receives bytes for one pane at a time through the mux.
#[derive(Clone)]
pub struct TerminalAdapter {
    mux: Arc<dyn TerminalMux>,
}

impl TerminalAdapter {
    pub fn new(mux: Arc<dyn TerminalMux>) -> Self {
        Self { mux }
    }

    /// Capture a pane. Trailing empty lines are truncated before the
    /// snapshot is built.
    pub async fn capture(
        &self,
        pane_id: &str,
        max_lines: usize,
    ) -> Result<TerminalSnapshot, CoreError> {
        let raw = self
            .mux
            .capture(pane_id, max_lines)
            .await
            .map_err(|e| CoreError::TerminalUnavailable(e.to_string()))?;

        let mut lines: Vec<&str> = raw.lines().collect();
        while lines.last().is_some_and(|l| l.trim().is_empty()) {
            lines.pop();
        }
        let text = lines.join("\n");

        Ok(TerminalSnapshot {
            pane_id: pane_id.to_owned(),
            session_id: pane_id.split(':').next().filter(|s| *s != pane_id).map(str::to_owned),
            line_count: lines.len(),
            text,
            captured_at: Utc::now(),
        })
    }

    /// Derive the structured state from a snapshot.
    pub fn parse(&self, snapshot: &TerminalSnapshot) -> TerminalState {
        parse::parse(&snapshot.lines())
    }

    /// Send literal text, wait briefly, then submit with Enter.
    pub async fn send_literal_then_enter(
        &self,
        pane_id: &str,
        text: &str,
    ) -> Result<(), CoreError> {
        self.mux
            .send_literal(pane_id, text)
            .await
            .map_err(|e| CoreError::TerminalUnavailable(e.to_string()))?;
        tokio::time::sleep(ENTER_GAP).await;
        self.mux
            .send_enter(pane_id)
            .await
            .map_err(|e| CoreError::TerminalUnavailable(e.to_string()))
    }

    pub async fn send_approve(&self, pane_id: &str) -> Result<(), CoreError> {
        self.send_key(pane_id, keys::APPROVE).await
    }

    pub async fn send_reject(&self, pane_id: &str) -> Result<(), CoreError> {
        self.send_key(pane_id, keys::REJECT).await
    }

    pub async fn send_escape(&self, pane_id: &str) -> Result<(), CoreError> {
        self.send_key(pane_id, keys::ESCAPE).await
    }

    pub async fn send_compact(&self, pane_id: &str) -> Result<(), CoreError> {
        self.send_literal_then_enter(pane_id, "/compact").await
    }

    pub async fn send_clear(&self, pane_id: &str) -> Result<(), CoreError> {
        self.send_literal_then_enter(pane_id, "/clear").await
    }

    async fn send_key(&self, pane_id: &str, key: &str) -> Result<(), CoreError> {
        self.mux
            .send_key(pane_id, key)
            .await
            .map_err(|e| CoreError::TerminalUnavailable(e.to_string()))
    }
}
