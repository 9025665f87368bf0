// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watchdog: timer-driven safety net that catches stalled sessions the
//! event machine never hears about.
//!
//! Each tick observes the pane without taking the processing lock; an action
//! is only executed after `attention_threshold` consecutive noteworthy polls
//! and a clear cooldown window on both the watchdog's own clock and the
//! machine's last response. The watchdog never touches the store or the
//! agent's durable status.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::agent::AgentCell;
use crate::machine::{EventMachine, CAPTURE_LINES};
use crate::oracle::{Decide, DecisionAction, DecisionInput};
use crate::ring::AgentLog;
use crate::terminal::TerminalAdapter;

pub const WATCHDOG_TRIGGER: &str = "Watchdog (periodic check)";

/// Floor on the enforced action cooldown. The per-agent
/// `action_cooldown_secs` can only raise the window, never shrink it
/// below a minute.
pub const MIN_WATCHDOG_COOLDOWN_SECS: u64 = 60;

/// Counter state carried across ticks.
#[derive(Debug, Default)]
pub struct WatchdogState {
    pub consecutive_attention_polls: u32,
    pub last_action_at: Option<Instant>,
}

pub struct Watchdog {
    agent: Arc<AgentCell>,
    machine: Arc<EventMachine>,
    adapter: TerminalAdapter,
    oracle: Arc<dyn Decide>,
    log: AgentLog,
}

impl Watchdog {
    pub fn new(
        agent: Arc<AgentCell>,
        machine: Arc<EventMachine>,
        adapter: TerminalAdapter,
        oracle: Arc<dyn Decide>,
        log: AgentLog,
    ) -> Self {
        Self { agent, machine, adapter, oracle, log }
    }

    /// Timer loop. Ticks are serialized by the loop itself; delayed ticks
    /// are skipped rather than bursted, so a slow tick never overlaps the
    /// next one.
    pub async fn run(self, shutdown: CancellationToken) {
        let tuning = self.agent.get().watchdog_tuning();
        if !tuning.enabled {
            return;
        }
        let mut interval =
            tokio::time::interval(Duration::from_secs(tuning.poll_interval_secs));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Consume the immediate first tick.
        interval.tick().await;

        let mut state = WatchdogState::default();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }
            self.tick(&mut state).await;
        }
        debug!(agent = %self.log.agent_id(), "watchdog stopped");
    }

    /// One poll. Public for direct driving in tests.
    pub async fn tick(&self, state: &mut WatchdogState) {
        let agent = self.agent.get();
        let tuning = agent.watchdog_tuning();

        let Some(pane) = agent.pane_id().map(str::to_owned) else {
            state.consecutive_attention_polls = 0;
            return;
        };

        if self.machine.guard().is_processing() {
            state.consecutive_attention_polls = 0;
            return;
        }

        let snapshot = match self.adapter.capture(&pane, CAPTURE_LINES).await {
            Ok(snapshot) => snapshot,
            Err(_) => {
                state.consecutive_attention_polls = 0;
                return;
            }
        };
        let terminal_state = self.adapter.parse(&snapshot);
        if terminal_state.is_processing {
            state.consecutive_attention_polls = 0;
            return;
        }

        let decision = self
            .oracle
            .decide(DecisionInput {
                master_prompt: agent.master_prompt.clone(),
                terminal_text: snapshot.text.clone(),
                terminal_state,
                trigger_label: WATCHDOG_TRIGGER.to_owned(),
                human_instruction: None,
            })
            .await;

        let decision = match decision {
            Some(decision) if decision.action != DecisionAction::Wait => decision,
            _ => {
                state.consecutive_attention_polls = 0;
                return;
            }
        };

        state.consecutive_attention_polls += 1;
        if state.consecutive_attention_polls < tuning.attention_threshold {
            return;
        }
        if !self.cooldown_clear(state, &tuning) {
            // Threshold reached but the pane acted recently: hold the
            // counter and try again next tick.
            return;
        }

        match self.machine.execute_decision(&decision, Some(&snapshot)).await {
            Ok(acted) => {
                if acted {
                    self.machine.record_external_action();
                    state.last_action_at = Some(Instant::now());
                    self.log.info(format!(
                        "watchdog acted: {} ({})",
                        decision.action.as_str(),
                        decision.reason
                    ));
                }
                state.consecutive_attention_polls = 0;
            }
            Err(e) => {
                self.log.error(format!("watchdog action failed: {e}"));
                state.consecutive_attention_polls = 0;
            }
        }
    }

    fn cooldown_clear(&self, state: &WatchdogState, tuning: &crate::agent::WatchdogTuning) -> bool {
        let cooldown =
            Duration::from_secs(tuning.action_cooldown_secs.max(MIN_WATCHDOG_COOLDOWN_SECS));
        let now = Instant::now();
        if let Some(last) = state.last_action_at {
            if now.duration_since(last) < cooldown {
                return false;
            }
        }
        if let Some(last) = self.machine.guard().snapshot().last_response_time {
            if now.duration_since(last) < cooldown {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
#[path = "watchdog_tests.rs"]
mod tests;
