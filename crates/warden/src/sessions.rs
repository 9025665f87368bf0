// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session-manager contract: the external CRUD façade over the supervised
//! assistant's sessions, forks, and panes.
//!
//! The supervisor consults it to resolve an agent's assistant session id on
//! connect, and to push a refreshed id into the manager's record after a
//! `SessionStart(clear|compact)`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One branch of a managed session (the main line or a fork).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionBranch {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pane_id: Option<String>,
}

/// A managed session: the main branch plus any forks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedSession {
    pub id: String,
    pub main: SessionBranch,
    #[serde(default)]
    pub forks: Vec<SessionBranch>,
}

impl ManagedSession {
    /// Find the branch matching a pane or branch id, preferring the branch id.
    pub fn branch_for(
        &self,
        pane_id: Option<&str>,
        branch_id: Option<&str>,
    ) -> Option<&SessionBranch> {
        if let Some(branch_id) = branch_id {
            if let Some(fork) = self.forks.iter().find(|f| f.id == branch_id) {
                return Some(fork);
            }
            if self.main.id == branch_id {
                return Some(&self.main);
            }
        }
        if let Some(pane_id) = pane_id {
            if self.main.pane_id.as_deref() == Some(pane_id) {
                return Some(&self.main);
            }
            return self.forks.iter().find(|f| f.pane_id.as_deref() == Some(pane_id));
        }
        Some(&self.main)
    }

    /// Write an assistant session id into the matching branch.
    pub fn set_assistant_session_id(
        &mut self,
        pane_id: Option<&str>,
        branch_id: Option<&str>,
        assistant_session_id: &str,
    ) -> bool {
        let target = match self.branch_for(pane_id, branch_id) {
            Some(branch) => branch.id.clone(),
            None => return false,
        };
        if self.main.id == target {
            self.main.assistant_session_id = Some(assistant_session_id.to_owned());
            return true;
        }
        if let Some(fork) = self.forks.iter_mut().find(|f| f.id == target) {
            fork.assistant_session_id = Some(assistant_session_id.to_owned());
            return true;
        }
        false
    }
}

#[async_trait]
pub trait SessionDirectory: Send + Sync {
    async fn get_session(&self, session_id: &str) -> anyhow::Result<ManagedSession>;

    async fn close_session(&self, session_id: &str) -> anyhow::Result<()>;

    /// Restart a session so it picks up fresh hook configuration.
    async fn resume_session(&self, session_id: &str, open_terminal: bool) -> anyhow::Result<()>;

    async fn replace_session(&self, session: ManagedSession) -> anyhow::Result<()>;
}

/// Directory for deployments without a session manager: every lookup fails
/// soft and every write is a no-op.
#[derive(Debug, Default)]
pub struct NullSessionDirectory;

#[async_trait]
impl SessionDirectory for NullSessionDirectory {
    async fn get_session(&self, session_id: &str) -> anyhow::Result<ManagedSession> {
        anyhow::bail!("no session manager configured (session {session_id})")
    }

    async fn close_session(&self, _session_id: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn resume_session(&self, _session_id: &str, _open_terminal: bool) -> anyhow::Result<()> {
        Ok(())
    }

    async fn replace_session(&self, _session: ManagedSession) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
