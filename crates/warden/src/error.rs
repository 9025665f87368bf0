// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// Unified error taxonomy for the supervision core.
///
/// Each variant maps to one row of the handling table: some end the current
/// cycle silently, some escalate the agent to `status = error`, and only the
/// store/install variants ever propagate to an operator-facing caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// No agent record exists for the given id.
    AgentNotFound(String),
    /// The agent has no connection; no terminal work is possible.
    ConnectionMissing,
    /// The pane could not be captured or written (gone, mux failure).
    TerminalUnavailable(String),
    /// The decision oracle failed, timed out, or returned malformed output.
    OracleUnavailable,
    /// A durable write to the agent store failed.
    StoreWriteFailed(String),
    /// Hook configuration could not be written into the target project.
    HookInstallFailed(String),
    /// A cycle held the processing lock past the hard ceiling.
    ProcessingStuck,
}

impl CoreError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgentNotFound(_) => "AGENT_NOT_FOUND",
            Self::ConnectionMissing => "CONNECTION_MISSING",
            Self::TerminalUnavailable(_) => "TERMINAL_UNAVAILABLE",
            Self::OracleUnavailable => "ORACLE_UNAVAILABLE",
            Self::StoreWriteFailed(_) => "STORE_WRITE_FAILED",
            Self::HookInstallFailed(_) => "HOOK_INSTALL_FAILED",
            Self::ProcessingStuck => "PROCESSING_STUCK",
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AgentNotFound(id) => write!(f, "agent not found: {id}"),
            Self::ConnectionMissing => f.write_str("agent has no connection"),
            Self::TerminalUnavailable(detail) => write!(f, "terminal unavailable: {detail}"),
            Self::OracleUnavailable => f.write_str("decision oracle unavailable"),
            Self::StoreWriteFailed(detail) => write!(f, "store write failed: {detail}"),
            Self::HookInstallFailed(detail) => write!(f, "hook install failed: {detail}"),
            Self::ProcessingStuck => f.write_str("processing lock held past ceiling"),
        }
    }
}

impl std::error::Error for CoreError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
