// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor: the one orchestrator handle.
//!
//! Routes inbound hook events to the right daemon after filtering, owns the
//! daemon map and the per-agent log ring, and fronts agent CRUD including
//! hook configuration install/uninstall. Built once in `initialize` and
//! passed down as an explicit `Arc` — there are no process-wide globals.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::agent::{Agent, AgentPatch, AgentStatus, Connection};
use crate::daemon::AgentDaemon;
use crate::error::CoreError;
use crate::event::{HookEvent, HookEventType};
use crate::hooks::{install_hooks, uninstall_hooks};
use crate::mux::TerminalMux;
use crate::notify::NotifyFactory;
use crate::oracle::Decide;
use crate::ring::{LogEntry, LogLevel, LogRing};
use crate::sessions::SessionDirectory;
use crate::store::{AgentStore, CreateOptions};
use crate::terminal::TerminalAdapter;

/// External collaborators the shell provides.
pub struct Collaborators {
    pub mux: Arc<dyn TerminalMux>,
    pub oracle: Arc<dyn Decide>,
    pub sessions: Arc<dyn SessionDirectory>,
    pub notify_factory: Arc<dyn NotifyFactory>,
}

pub struct Supervisor {
    store: Arc<AgentStore>,
    ring: Arc<LogRing>,
    adapter: TerminalAdapter,
    oracle: Arc<dyn Decide>,
    sessions: Arc<dyn SessionDirectory>,
    notify_factory: Arc<dyn NotifyFactory>,
    daemons: RwLock<HashMap<String, Arc<AgentDaemon>>>,
    port: u16,
    shutdown: CancellationToken,
}

impl Supervisor {
    pub fn new(store: Arc<AgentStore>, collaborators: Collaborators, port: u16) -> Arc<Self> {
        Arc::new(Self {
            store,
            ring: Arc::new(LogRing::default()),
            adapter: TerminalAdapter::new(Arc::clone(&collaborators.mux)),
            oracle: collaborators.oracle,
            sessions: collaborators.sessions,
            notify_factory: collaborators.notify_factory,
            daemons: RwLock::new(HashMap::new()),
            port,
            shutdown: CancellationToken::new(),
        })
    }

    /// Open the agent store, build the supervisor, and start the hook
    /// ingress. The returned server is already accepting events.
    pub async fn initialize(
        config: &crate::config::Config,
        collaborators: Collaborators,
    ) -> anyhow::Result<(Arc<Self>, crate::ingress::IngressServer)> {
        let store = Arc::new(AgentStore::open(config.agents_path(), config.port)?);
        let supervisor = Self::new(store, collaborators, config.port);
        let server = crate::ingress::serve(Arc::clone(&supervisor)).await?;
        Ok((supervisor, server))
    }

    pub fn store(&self) -> &Arc<AgentStore> {
        &self.store
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Snapshot of an agent's ring-buffer log.
    pub fn agent_logs(&self, agent_id: &str) -> Vec<LogEntry> {
        self.ring.entries(agent_id)
    }

    /// Route one inbound hook event: resolve, refresh session binding,
    /// filter, auto-start the daemon, dispatch.
    pub async fn handle_hook_event(&self, event: HookEvent) {
        let Some(mut agent) = self.store.get(&event.agent_id).await else {
            self.ring.push(
                &event.agent_id,
                LogLevel::Warn,
                format!("Hook FILTERED: unknown-agent ({})", event.event_type),
            );
            warn!(agent = %event.agent_id, "hook for unknown agent dropped");
            return;
        };

        if event.event_type == HookEventType::SessionStart {
            agent = self.refresh_session_binding(agent, &event).await;
        }

        // Filter A: event type subscription.
        if !agent.hook_events.contains(&event.event_type) {
            self.ring.push(
                &agent.id,
                LogLevel::Info,
                format!("Hook FILTERED: not-in-hookEvents ({})", event.event_type),
            );
            return;
        }

        // Filter B: session binding.
        let bound = agent.connection.as_ref().and_then(|c| c.assistant_session_id.as_deref());
        if let (Some(bound), Some(incoming)) = (bound, event.assistant_session_id.as_deref()) {
            if bound != incoming {
                self.ring.push(
                    &agent.id,
                    LogLevel::Info,
                    format!("Hook FILTERED: session-mismatch ({incoming} != {bound})"),
                );
                return;
            }
        }

        let daemon = match self.ensure_daemon(&agent).await {
            Some(daemon) => daemon,
            None => return,
        };
        daemon.refresh().await;
        daemon.handle_hook_event(&event).await;
    }

    /// On `SessionStart`, adopt a changed assistant session id into the
    /// store and push it through to the session manager's record.
    async fn refresh_session_binding(&self, agent: Agent, event: &HookEvent) -> Agent {
        let Some(ref incoming) = event.assistant_session_id else {
            return agent;
        };
        let Some(ref connection) = agent.connection else {
            return agent;
        };
        if connection.assistant_session_id.as_deref() == Some(incoming.as_str()) {
            return agent;
        }

        let updated = match self.store.set_assistant_session_id(&agent.id, incoming).await {
            Ok(updated) => updated,
            Err(e) => {
                warn!(agent = %agent.id, err = %e, "assistant session id update failed");
                return agent;
            }
        };
        self.ring.push(
            &agent.id,
            LogLevel::Info,
            format!("assistant session id refreshed to {incoming}"),
        );

        if let Some(session_id) = connection.session_id.clone() {
            let pane = connection.pane_id.as_deref();
            let branch = connection.branch_id.as_deref();
            match self.sessions.get_session(&session_id).await {
                Ok(mut session) => {
                    if session.set_assistant_session_id(pane, branch, incoming) {
                        if let Err(e) = self.sessions.replace_session(session).await {
                            warn!(agent = %agent.id, err = %e, "session manager update failed");
                        }
                    }
                }
                Err(e) => {
                    warn!(agent = %agent.id, err = %e, "session manager lookup failed");
                }
            }
        }
        updated
    }

    /// Find the agent's daemon, auto-starting one unless the agent is in a
    /// terminal error state.
    async fn ensure_daemon(&self, agent: &Agent) -> Option<Arc<AgentDaemon>> {
        if let Some(daemon) = self.daemons.read().await.get(&agent.id) {
            return Some(Arc::clone(daemon));
        }
        if agent.status == AgentStatus::Error {
            self.ring.push(
                &agent.id,
                LogLevel::Warn,
                "daemon not auto-started: agent is in error state",
            );
            return None;
        }
        match self.start_daemon(&agent.id).await {
            Ok(daemon) => Some(daemon),
            Err(e) => {
                warn!(agent = %agent.id, err = %e, "daemon auto-start failed");
                None
            }
        }
    }

    /// Start (or return) the agent's daemon.
    pub async fn start_daemon(&self, agent_id: &str) -> Result<Arc<AgentDaemon>, CoreError> {
        let record = self
            .store
            .get(agent_id)
            .await
            .ok_or_else(|| CoreError::AgentNotFound(agent_id.to_owned()))?;

        let mut daemons = self.daemons.write().await;
        if let Some(daemon) = daemons.get(agent_id) {
            return Ok(Arc::clone(daemon));
        }
        let daemon = AgentDaemon::build(
            record,
            Arc::clone(&self.store),
            self.adapter.clone(),
            Arc::clone(&self.oracle),
            self.notify_factory.as_ref(),
            Arc::clone(&self.ring),
        );
        daemon.start().await?;
        daemons.insert(agent_id.to_owned(), Arc::clone(&daemon));
        Ok(daemon)
    }

    /// Stop and drop the agent's daemon, if one is running.
    pub async fn stop_daemon(&self, agent_id: &str) -> Result<(), CoreError> {
        let daemon = self.daemons.write().await.remove(agent_id);
        if let Some(daemon) = daemon {
            daemon.stop().await?;
        }
        Ok(())
    }

    pub async fn daemon(&self, agent_id: &str) -> Option<Arc<AgentDaemon>> {
        self.daemons.read().await.get(agent_id).cloned()
    }

    // -- CRUD façades ---------------------------------------------------------

    pub async fn create_agent(
        &self,
        name: &str,
        master_prompt: &str,
        opts: CreateOptions,
    ) -> Result<Agent, CoreError> {
        let agent = self.store.create(name, master_prompt, opts).await?;
        self.ring.push(&agent.id, LogLevel::Info, "agent created");
        Ok(agent)
    }

    pub async fn update_agent(&self, agent_id: &str, patch: AgentPatch) -> Result<Agent, CoreError> {
        self.store.update(agent_id, patch).await
    }

    /// Stop, disconnect, uninstall hooks, and remove the record.
    pub async fn delete_agent(&self, agent_id: &str) -> Result<bool, CoreError> {
        self.stop_daemon(agent_id).await?;
        if let Some(agent) = self.store.get(agent_id).await {
            if let Some(ref connection) = agent.connection {
                if let Err(e) =
                    uninstall_hooks(Path::new(&connection.project_path), agent_id)
                {
                    warn!(agent = %agent_id, err = %e, "hook uninstall during delete failed");
                }
            }
        }
        let existed = self.store.delete(agent_id).await?;
        self.ring.remove(agent_id);
        Ok(existed)
    }

    /// Bind an agent to a supervised session: resolve the assistant session
    /// id through the session manager, install hooks, persist the
    /// connection, and restart the supervised session so the assistant picks
    /// the new hooks up.
    pub async fn connect_agent(
        &self,
        agent_id: &str,
        mut connection: Connection,
    ) -> Result<Agent, CoreError> {
        let agent = self
            .store
            .get(agent_id)
            .await
            .ok_or_else(|| CoreError::AgentNotFound(agent_id.to_owned()))?;

        if connection.assistant_session_id.is_none() {
            if let Some(ref session_id) = connection.session_id {
                match self.sessions.get_session(session_id).await {
                    Ok(session) => {
                        let branch = session.branch_for(
                            connection.pane_id.as_deref(),
                            connection.branch_id.as_deref(),
                        );
                        connection.assistant_session_id =
                            branch.and_then(|b| b.assistant_session_id.clone());
                    }
                    Err(e) => {
                        warn!(agent = %agent_id, err = %e, "session lookup on connect failed");
                    }
                }
            }
        }

        // Hooks first: if installation fails the agent stays disconnected.
        install_hooks(
            Path::new(&connection.project_path),
            agent_id,
            self.port,
            &agent.hook_events,
        )?;

        let session_id = connection.session_id.clone();
        let connected = self.store.connect(agent_id, connection).await?;
        self.ring.push(agent_id, LogLevel::Info, "agent connected");

        if let Some(session_id) = session_id {
            if let Err(e) = self.sessions.resume_session(&session_id, false).await {
                warn!(agent = %agent_id, err = %e, "session restart after connect failed");
            }
        }
        Ok(connected)
    }

    /// Stop supervision, uninstall hooks, and clear the connection.
    pub async fn disconnect_agent(&self, agent_id: &str) -> Result<Agent, CoreError> {
        self.stop_daemon(agent_id).await?;
        if let Some(agent) = self.store.get(agent_id).await {
            if let Some(ref connection) = agent.connection {
                uninstall_hooks(Path::new(&connection.project_path), agent_id)?;
            }
        }
        let agent = self.store.disconnect(agent_id).await?;
        self.ring.push(agent_id, LogLevel::Info, "agent disconnected");
        Ok(agent)
    }

    /// Stop every daemon and signal the ingress to shut down.
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.daemons.read().await.keys().cloned().collect();
        for id in ids {
            if let Err(e) = self.stop_daemon(&id).await {
                warn!(agent = %id, err = %e, "daemon stop during shutdown failed");
            }
        }
        self.shutdown.cancel();
        info!("supervisor shut down");
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
