// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: scripted fakes for the external collaborators
//! and builders for wired-up agents.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::agent::{Agent, Connection};
use crate::mux::TerminalMux;
use crate::notify::{Notify, OperatorNotice};
use crate::oracle::{Decide, Decision, DecisionInput};

/// One recorded write to the fake multiplexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuxCall {
    Literal { pane: String, text: String },
    Key { pane: String, key: String },
    Enter { pane: String },
}

enum Script {
    Screen(String),
    Gone,
}

/// Scripted terminal multiplexer.
///
/// `push_screen` queues one capture result; once the queue drains, captures
/// return the sticky screen set via `set_screen` (or an error if none).
#[derive(Default)]
pub struct FakeMux {
    scripts: Mutex<VecDeque<Script>>,
    sticky: Mutex<Option<String>>,
    calls: Mutex<Vec<MuxCall>>,
}

impl FakeMux {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_screen(&self, text: impl Into<String>) {
        self.scripts.lock().push_back(Script::Screen(text.into()));
    }

    /// Queue a capture failure (pane gone).
    pub fn push_gone(&self) {
        self.scripts.lock().push_back(Script::Gone);
    }

    /// Set the screen returned once the script queue is empty.
    pub fn set_screen(&self, text: impl Into<String>) {
        *self.sticky.lock() = Some(text.into());
    }

    pub fn calls(&self) -> Vec<MuxCall> {
        self.calls.lock().clone()
    }

    /// Literal writes only, in order.
    pub fn literals(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MuxCall::Literal { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Named key writes only, in order.
    pub fn keys(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MuxCall::Key { key, .. } => Some(key),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl TerminalMux for FakeMux {
    async fn capture(&self, pane_id: &str, _max_lines: usize) -> anyhow::Result<String> {
        if let Some(script) = self.scripts.lock().pop_front() {
            return match script {
                Script::Screen(text) => Ok(text),
                Script::Gone => anyhow::bail!("pane {pane_id} not found"),
            };
        }
        match self.sticky.lock().clone() {
            Some(text) => Ok(text),
            None => anyhow::bail!("pane {pane_id} not found"),
        }
    }

    async fn send_literal(&self, pane_id: &str, text: &str) -> anyhow::Result<()> {
        self.calls
            .lock()
            .push(MuxCall::Literal { pane: pane_id.to_owned(), text: text.to_owned() });
        Ok(())
    }

    async fn send_key(&self, pane_id: &str, key: &str) -> anyhow::Result<()> {
        self.calls.lock().push(MuxCall::Key { pane: pane_id.to_owned(), key: key.to_owned() });
        Ok(())
    }

    async fn send_enter(&self, pane_id: &str) -> anyhow::Result<()> {
        self.calls.lock().push(MuxCall::Enter { pane: pane_id.to_owned() });
        Ok(())
    }
}

/// Scripted oracle: pops queued outcomes, records every consultation.
#[derive(Default)]
pub struct StubOracle {
    queue: Mutex<VecDeque<Option<Decision>>>,
    calls: Mutex<Vec<DecisionInput>>,
}

impl StubOracle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, decision: Decision) {
        self.queue.lock().push_back(Some(decision));
    }

    /// Queue an "oracle unavailable" outcome.
    pub fn push_none(&self) {
        self.queue.lock().push_back(None);
    }

    pub fn calls(&self) -> Vec<DecisionInput> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Decide for StubOracle {
    async fn decide(&self, input: DecisionInput) -> Option<Decision> {
        self.calls.lock().push(input);
        self.queue.lock().pop_front().flatten()
    }
}

/// Operator-chat transport that records everything it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    running: AtomicBool,
    notices: Mutex<Vec<OperatorNotice>>,
    instruction_tx: Mutex<Option<mpsc::Sender<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notices(&self) -> Vec<OperatorNotice> {
        self.notices.lock().clone()
    }

    /// Inject an operator message as if it arrived over the transport.
    pub async fn inject_instruction(&self, text: &str) -> bool {
        let tx = self.instruction_tx.lock().clone();
        match tx {
            Some(tx) => tx.send(text.to_owned()).await.is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl Notify for RecordingNotifier {
    async fn start(&self, instruction_tx: mpsc::Sender<String>) {
        *self.instruction_tx.lock() = Some(instruction_tx);
        self.running.store(true, Ordering::Release);
    }

    async fn stop(&self) {
        *self.instruction_tx.lock() = None;
        self.running.store(false, Ordering::Release);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    async fn send(&self, notice: OperatorNotice) -> anyhow::Result<()> {
        self.notices.lock().push(notice);
        Ok(())
    }
}

/// In-memory session directory with call recording.
#[derive(Default)]
pub struct FakeSessions {
    sessions: Mutex<std::collections::HashMap<String, crate::sessions::ManagedSession>>,
    replaced: Mutex<Vec<crate::sessions::ManagedSession>>,
    resumed: Mutex<Vec<String>>,
}

impl FakeSessions {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, session: crate::sessions::ManagedSession) {
        self.sessions.lock().insert(session.id.clone(), session);
    }

    pub fn replaced(&self) -> Vec<crate::sessions::ManagedSession> {
        self.replaced.lock().clone()
    }

    pub fn resumed(&self) -> Vec<String> {
        self.resumed.lock().clone()
    }
}

#[async_trait]
impl crate::sessions::SessionDirectory for FakeSessions {
    async fn get_session(
        &self,
        session_id: &str,
    ) -> anyhow::Result<crate::sessions::ManagedSession> {
        self.sessions
            .lock()
            .get(session_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no such session: {session_id}"))
    }

    async fn close_session(&self, session_id: &str) -> anyhow::Result<()> {
        self.sessions.lock().remove(session_id);
        Ok(())
    }

    async fn resume_session(&self, session_id: &str, _open_terminal: bool) -> anyhow::Result<()> {
        self.resumed.lock().push(session_id.to_owned());
        Ok(())
    }

    async fn replace_session(
        &self,
        session: crate::sessions::ManagedSession,
    ) -> anyhow::Result<()> {
        self.replaced.lock().push(session.clone());
        self.sessions.lock().insert(session.id.clone(), session);
        Ok(())
    }
}

/// A connected agent bound to the given pane.
pub fn connected_agent(pane_id: &str) -> Agent {
    let mut agent = Agent::new("test-agent", "keep the session moving");
    agent.connection = Some(Connection {
        project_path: "/work/repo".to_owned(),
        session_id: Some("mgr-1".to_owned()),
        pane_id: Some(pane_id.to_owned()),
        assistant_session_id: None,
        branch_id: None,
        connected_at: Utc::now(),
    });
    agent
}
