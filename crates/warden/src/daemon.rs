// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent daemon: bundles the event machine, the watchdog task, and the
//! operator-chat transport behind start/stop/refresh.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::agent::{Agent, AgentCell, AgentStatus};
use crate::error::CoreError;
use crate::event::HookEvent;
use crate::guard::ProcessingGuard;
use crate::machine::EventMachine;
use crate::notify::{Notify, NotifyFactory};
use crate::oracle::Decide;
use crate::ring::{AgentLog, LogRing};
use crate::store::AgentStore;
use crate::terminal::TerminalAdapter;
use crate::watchdog::Watchdog;

/// Buffered operator instructions awaiting the machine.
const INSTRUCTION_BUFFER: usize = 16;

pub struct AgentDaemon {
    agent: Arc<AgentCell>,
    machine: Arc<EventMachine>,
    adapter: TerminalAdapter,
    oracle: Arc<dyn Decide>,
    notifier: Option<Arc<dyn Notify>>,
    store: Arc<AgentStore>,
    log: AgentLog,
    watchdog_token: Mutex<Option<CancellationToken>>,
    watchdog_handle: Mutex<Option<JoinHandle<()>>>,
    instruction_pump: Mutex<Option<JoinHandle<()>>>,
}

impl AgentDaemon {
    pub fn build(
        record: Agent,
        store: Arc<AgentStore>,
        adapter: TerminalAdapter,
        oracle: Arc<dyn Decide>,
        notify_factory: &dyn NotifyFactory,
        ring: Arc<LogRing>,
    ) -> Arc<Self> {
        let log = AgentLog::new(ring, record.id.clone());
        let notifier = notify_factory.build(&record);
        let agent = AgentCell::new(record);
        let guard = ProcessingGuard::new();
        let machine = Arc::new(EventMachine::new(
            Arc::clone(&agent),
            guard,
            adapter.clone(),
            Arc::clone(&oracle),
            notifier.clone(),
            log.clone(),
        ));
        Arc::new(Self {
            agent,
            machine,
            adapter,
            oracle,
            notifier,
            store,
            log,
            watchdog_token: Mutex::new(None),
            watchdog_handle: Mutex::new(None),
            instruction_pump: Mutex::new(None),
        })
    }

    pub fn agent_id(&self) -> String {
        self.agent.id()
    }

    /// Watchdog-facing view of the machine's processing guard.
    pub fn guard(&self) -> &Arc<ProcessingGuard> {
        self.machine.guard()
    }

    pub fn notifier(&self) -> Option<&Arc<dyn Notify>> {
        self.notifier.as_ref()
    }

    /// Mark the agent active, start the operator-chat transport, and start
    /// the watchdog timer.
    pub async fn start(self: &Arc<Self>) -> Result<(), CoreError> {
        let id = self.agent_id();
        self.store.update_status(&id, AgentStatus::Active, None).await?;

        if let Some(ref notifier) = self.notifier {
            let (tx, mut rx) = mpsc::channel::<String>(INSTRUCTION_BUFFER);
            notifier.start(tx).await;
            let machine = Arc::clone(&self.machine);
            let log = self.log.clone();
            let pump = tokio::spawn(async move {
                while let Some(text) = rx.recv().await {
                    if let Err(e) = machine.handle_instruction(&text).await {
                        log.warn(format!("instruction failed: {e}"));
                    }
                }
            });
            *self.instruction_pump.lock() = Some(pump);
        }

        if self.agent.get().watchdog_tuning().enabled {
            let token = CancellationToken::new();
            let watchdog = Watchdog::new(
                Arc::clone(&self.agent),
                Arc::clone(&self.machine),
                self.adapter.clone(),
                Arc::clone(&self.oracle),
                self.log.clone(),
            );
            let handle = tokio::spawn(watchdog.run(token.clone()));
            *self.watchdog_token.lock() = Some(token);
            *self.watchdog_handle.lock() = Some(handle);
        }

        self.log.info("daemon started");
        info!(agent = %id, "daemon started");
        Ok(())
    }

    /// Stop the watchdog, then the operator-chat transport, then mark idle.
    pub async fn stop(&self) -> Result<(), CoreError> {
        let id = self.agent_id();

        if let Some(token) = self.watchdog_token.lock().take() {
            token.cancel();
        }
        let watchdog = self.watchdog_handle.lock().take();
        if let Some(handle) = watchdog {
            if let Err(e) = handle.await {
                warn!(agent = %id, err = %e, "watchdog task ended abnormally");
            }
        }

        if let Some(ref notifier) = self.notifier {
            notifier.stop().await;
        }
        if let Some(pump) = self.instruction_pump.lock().take() {
            pump.abort();
        }

        self.store.update_status(&id, AgentStatus::Idle, None).await?;
        self.log.info("daemon stopped");
        Ok(())
    }

    /// Reload the agent record from the store so operator edits take effect.
    pub async fn refresh(&self) {
        let id = self.agent_id();
        if let Some(record) = self.store.get(&id).await {
            self.agent.set(record);
        }
    }

    pub async fn handle_hook_event(&self, event: &HookEvent) {
        self.machine.handle_event(event).await;
    }

    /// Route an operator instruction to the machine directly (used by shells
    /// without an operator-chat transport).
    pub async fn handle_instruction(
        &self,
        text: &str,
    ) -> Result<crate::oracle::Decision, CoreError> {
        self.machine.handle_instruction(text).await
    }
}

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
