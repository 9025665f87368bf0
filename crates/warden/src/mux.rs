// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pane-addressable terminal multiplexer primitives.
//!
//! The real multiplexer (tmux shelling, PTY bridges) lives in the outer
//! shell; the core only consumes these four primitives through a trait
//! object so tests can script pane content.

use async_trait::async_trait;

/// Named keys the adapter may send besides literal text.
pub mod keys {
    pub const APPROVE: &str = "y";
    pub const REJECT: &str = "n";
    pub const ESCAPE: &str = "Escape";
}

#[async_trait]
pub trait TerminalMux: Send + Sync {
    /// Read up to `max_lines` of visible + scrollback text from a pane.
    async fn capture(&self, pane_id: &str, max_lines: usize) -> anyhow::Result<String>;

    /// Send literal bytes to a pane (no trailing Enter).
    async fn send_literal(&self, pane_id: &str, text: &str) -> anyhow::Result<()>;

    /// Send a named key (see [`keys`]).
    async fn send_key(&self, pane_id: &str, key: &str) -> anyhow::Result<()>;

    /// Send Enter.
    async fn send_enter(&self, pane_id: &str) -> anyhow::Result<()>;
}
