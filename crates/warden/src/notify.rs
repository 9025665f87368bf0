// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator-chat transport contract.
//!
//! The concrete transport (Telegram bot, desktop toast, ...) lives in the
//! outer shell. The core only needs to start/stop it, push notices, and
//! receive free-form operator instructions back through a channel the
//! daemon wires to the human-instruction entry point.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::oracle::NoticeLevel;

/// A notice pushed to the operator.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorNotice {
    pub level: NoticeLevel,
    pub title: String,
    pub body: String,
    /// Tail of the pane, attached when the notice is about terminal content.
    pub terminal_snippet: Option<String>,
}

impl OperatorNotice {
    pub fn new(level: NoticeLevel, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self { level, title: title.into(), body: body.into(), terminal_snippet: None }
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.terminal_snippet = Some(snippet.into());
        self
    }
}

/// Operator-chat transport owned by a daemon.
#[async_trait]
pub trait Notify: Send + Sync {
    /// Start the transport. Incoming operator messages are delivered through
    /// `instruction_tx`; the daemon routes them to `handle_instruction`.
    async fn start(&self, instruction_tx: mpsc::Sender<String>);

    async fn stop(&self);

    fn is_running(&self) -> bool;

    async fn send(&self, notice: OperatorNotice) -> anyhow::Result<()>;
}

/// Builds a transport for an agent's operator-chat config, or `None` when
/// the agent has none (or the shell provides no transport at all).
pub trait NotifyFactory: Send + Sync {
    fn build(&self, agent: &crate::agent::Agent) -> Option<std::sync::Arc<dyn Notify>>;
}

/// Factory for shells without an operator-chat integration.
#[derive(Debug, Default)]
pub struct NoNotify;

impl NotifyFactory for NoNotify {
    fn build(&self, _agent: &crate::agent::Agent) -> Option<std::sync::Arc<dyn Notify>> {
        None
    }
}
