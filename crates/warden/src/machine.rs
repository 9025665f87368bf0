// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent event state machine: converts one inbound hook event into at
//! most one terminal action.
//!
//! The machine is a named-node graph evaluated by a single loop. Admission
//! (the guard node) happens before the loop so the RAII cycle lock covers
//! every node; node failures end the cycle without escalating the agent.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::agent::AgentCell;
use crate::error::CoreError;
use crate::event::{HookEvent, HookEventType};
use crate::guard::{AdmitOutcome, ProcessingGuard};
use crate::notify::{Notify, OperatorNotice};
use crate::oracle::{Decide, Decision, DecisionAction, DecisionInput, NoticeLevel};
use crate::ring::AgentLog;
use crate::terminal::{TerminalAdapter, TerminalSnapshot, TerminalState};

/// Lines captured from the pane per cycle.
pub const CAPTURE_LINES: usize = 200;

/// Lines of terminal tail attached to a `request_help` notice.
const HELP_SNIPPET_LINES: usize = 20;

/// Post-clear/compact readiness polling.
const RESTART_POLL: Duration = Duration::from_secs(1);
const RESTART_WINDOW_POLLS: u32 = 15;

/// Phrases indicating a failed compaction; `/clear` is the only way out.
const COMPACT_FAILURE_PHRASES: &[&str] = &["compaction failed", "failed to compact"];

/// Nodes of the event graph. Transitions are fixed; see `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    RouteEvent,
    LogOnly,
    HandleSessionRestart,
    CaptureTerminal,
    ParseTerminal,
    FastPath,
    HandleContextLimit,
    HandlePermission,
    HandleWaiting,
    HandleAmbiguous,
    Execute,
    End,
}

/// Transient per-cycle context.
#[derive(Default)]
struct Cycle {
    snapshot: Option<TerminalSnapshot>,
    state: Option<TerminalState>,
    decision: Option<Decision>,
    lock: Option<crate::guard::CycleLock>,
}

/// Per-agent reactive pipeline.
pub struct EventMachine {
    agent: Arc<AgentCell>,
    guard: Arc<ProcessingGuard>,
    adapter: TerminalAdapter,
    oracle: Arc<dyn Decide>,
    notifier: Option<Arc<dyn Notify>>,
    log: AgentLog,
}

impl EventMachine {
    pub fn new(
        agent: Arc<AgentCell>,
        guard: Arc<ProcessingGuard>,
        adapter: TerminalAdapter,
        oracle: Arc<dyn Decide>,
        notifier: Option<Arc<dyn Notify>>,
        log: AgentLog,
    ) -> Self {
        Self { agent, guard, adapter, oracle, notifier, log }
    }

    pub fn guard(&self) -> &Arc<ProcessingGuard> {
        &self.guard
    }

    /// Called by the watchdog after it acts on the pane, so the next event
    /// cycle observes the action in its cooldown window.
    pub fn record_external_action(&self) {
        self.guard.record_action();
    }

    /// Run one full cycle for an inbound event.
    ///
    /// Never returns an error for in-cycle failures: a dropped event or a
    /// vanished pane is an ordinary outcome, recorded in the agent log.
    pub async fn handle_event(&self, event: &HookEvent) {
        let admission = match self.guard.admit(event.event_type) {
            AdmitOutcome::Admitted(admission) => admission,
            AdmitOutcome::Busy { held_for } => {
                self.log.debug(format!(
                    "Hook DROPPED: processing-busy ({} while lock held {held_for:?})",
                    event.event_type
                ));
                return;
            }
            AdmitOutcome::Cooldown { since_last } => {
                self.log.debug(format!(
                    "Hook DROPPED: cooldown ({} only {since_last:?} after last action)",
                    event.event_type
                ));
                return;
            }
        };

        if admission.forced {
            self.log.warn("processing lock force-released after 120s ceiling");
            self.dispatch_notice(OperatorNotice::new(
                NoticeLevel::Warn,
                "Processing stuck",
                "A supervision cycle exceeded its 120s ceiling and was force-released.",
            ))
            .await;
        }
        if admission.bypassed_cooldown {
            self.log.info("cooldown bypassed for post-clear/compact follow-up");
        }

        // The lock lives in the cycle context and releases on drop.
        let mut cycle = Cycle { lock: Some(admission.lock), ..Cycle::default() };
        let mut node = Node::RouteEvent;
        while node != Node::End {
            node = match self.step(node, event, &mut cycle).await {
                Ok(next) => next,
                Err(CoreError::ConnectionMissing) => {
                    self.log.warn(format!("cycle ended: {} with no connection", event.event_type));
                    break;
                }
                Err(CoreError::TerminalUnavailable(detail)) => {
                    self.log.error(format!("cycle ended: terminal unavailable: {detail}"));
                    break;
                }
                Err(e) => {
                    self.log.error(format!("cycle ended: {e}"));
                    break;
                }
            };
        }
    }

    async fn step(
        &self,
        node: Node,
        event: &HookEvent,
        cycle: &mut Cycle,
    ) -> Result<Node, CoreError> {
        match node {
            Node::RouteEvent => Ok(self.route_event(event)),
            Node::LogOnly => {
                self.log_only(event);
                Ok(Node::End)
            }
            Node::HandleSessionRestart => self.handle_session_restart(cycle).await,
            Node::CaptureTerminal => {
                let pane = self.pane_id()?;
                cycle.snapshot = Some(self.adapter.capture(&pane, CAPTURE_LINES).await?);
                Ok(Node::ParseTerminal)
            }
            Node::ParseTerminal => {
                let snapshot = cycle.snapshot.as_ref().ok_or(CoreError::ConnectionMissing)?;
                cycle.state = Some(self.adapter.parse(snapshot));
                Ok(Node::FastPath)
            }
            Node::FastPath => Ok(self.fast_path(event, cycle)),
            Node::HandleContextLimit => self.handle_context_limit(cycle).await,
            Node::HandlePermission => {
                cycle.decision = Some(Decision {
                    action: DecisionAction::Approve,
                    response: None,
                    reason: "permission prompt on screen".to_owned(),
                    notification: None,
                });
                Ok(Node::Execute)
            }
            // Hand-off only: waiting panes go to the oracle.
            Node::HandleWaiting => Ok(Node::HandleAmbiguous),
            Node::HandleAmbiguous => self.handle_ambiguous(event, cycle).await,
            Node::Execute => {
                // A force-released cycle must not act after its successor
                // took the guard over.
                if !cycle.lock.as_ref().is_some_and(|l| l.is_current()) {
                    self.log.warn("cycle superseded during processing, discarding action");
                    return Ok(Node::End);
                }
                let decision = cycle.decision.take().ok_or(CoreError::OracleUnavailable)?;
                self.execute_decision(&decision, cycle.snapshot.as_ref()).await?;
                Ok(Node::End)
            }
            Node::End => Ok(Node::End),
        }
    }

    fn route_event(&self, event: &HookEvent) -> Node {
        match event.event_type {
            HookEventType::PreCompact
            | HookEventType::SessionEnd
            | HookEventType::PostToolUseFailure => Node::LogOnly,
            HookEventType::SessionStart
                if event.start_source().is_some_and(|s| s.is_restart()) =>
            {
                Node::HandleSessionRestart
            }
            _ => Node::CaptureTerminal,
        }
    }

    fn log_only(&self, event: &HookEvent) {
        match event.event_type {
            HookEventType::PostToolUseFailure => {
                self.log.warn(format!("tool failure reported: {:?}", event.detail));
            }
            _ => self.log.info(format!("{} observed", event.event_type)),
        }
    }

    /// After `/clear` or `/compact` the pane is transitional: poll until it
    /// settles at an input prompt, then hand off to the oracle. Leaving
    /// without readiness keeps `pending_follow_up` set so the next
    /// `SessionStart` is still admitted through the cooldown.
    async fn handle_session_restart(&self, cycle: &mut Cycle) -> Result<Node, CoreError> {
        let pane = self.pane_id()?;
        for _ in 0..RESTART_WINDOW_POLLS {
            tokio::time::sleep(RESTART_POLL).await;
            let snapshot = match self.adapter.capture(&pane, CAPTURE_LINES).await {
                Ok(snapshot) => snapshot,
                // Transitional pane; keep polling.
                Err(CoreError::TerminalUnavailable(_)) => continue,
                Err(e) => return Err(e),
            };
            let state = self.adapter.parse(&snapshot);
            if state.is_waiting_for_input && !state.is_processing {
                cycle.snapshot = Some(snapshot);
                cycle.state = Some(state);
                return Ok(Node::HandleAmbiguous);
            }
        }
        self.log.info("session restart: pane not ready within 15s, ending cycle");
        Ok(Node::End)
    }

    fn fast_path(&self, event: &HookEvent, cycle: &Cycle) -> Node {
        let Some(state) = cycle.state.as_ref() else {
            return Node::End;
        };
        if state.has_context_limit {
            return Node::HandleContextLimit;
        }
        if state.is_processing {
            debug!(agent = %self.log.agent_id(), "assistant busy, ending cycle");
            return Node::End;
        }
        if state.has_permission_prompt {
            return Node::HandlePermission;
        }
        if state.is_waiting_for_input {
            return Node::HandleWaiting;
        }
        self.log.debug(format!("{}: pane state unclear, no action", event.event_type));
        Node::End
    }

    /// Reclaim context: `/clear` when compaction cannot help any more,
    /// `/compact` otherwise. Either way the next `SessionStart` must be able
    /// to re-engage immediately.
    async fn handle_context_limit(&self, cycle: &mut Cycle) -> Result<Node, CoreError> {
        let pane = self.pane_id()?;
        let text = cycle.snapshot.as_ref().map(|s| s.text.to_lowercase()).unwrap_or_default();
        let exhausted = text.contains("0% remaining")
            || COMPACT_FAILURE_PHRASES.iter().any(|p| text.contains(p));

        if exhausted {
            self.log.info("context exhausted, issuing /clear");
            self.adapter.send_clear(&pane).await?;
        } else {
            self.log.info("context limit near, issuing /compact");
            self.adapter.send_compact(&pane).await?;
        }
        self.guard.set_pending_follow_up(true);
        self.guard.record_action();
        Ok(Node::End)
    }

    async fn handle_ambiguous(
        &self,
        event: &HookEvent,
        cycle: &mut Cycle,
    ) -> Result<Node, CoreError> {
        let decision = self
            .consult_oracle(
                cycle,
                format!("Hook: {}", event.event_type),
                None,
            )
            .await;
        cycle.decision = Some(match decision {
            Some(decision) => decision,
            None => {
                self.log.warn("oracle unavailable, falling back to continue");
                Decision::fallback_continue()
            }
        });
        Ok(Node::Execute)
    }

    async fn consult_oracle(
        &self,
        cycle: &Cycle,
        trigger_label: String,
        human_instruction: Option<String>,
    ) -> Option<Decision> {
        let snapshot = cycle.snapshot.as_ref()?;
        let state = cycle.state.as_ref()?;
        self.oracle
            .decide(DecisionInput {
                master_prompt: self.agent.master_prompt(),
                terminal_text: snapshot.text.clone(),
                terminal_state: state.clone(),
                trigger_label,
                human_instruction,
            })
            .await
    }

    /// Perform the adapter call matching a decision. Shared with the
    /// watchdog. Returns whether an action was taken (`wait` takes none and
    /// leaves the cooldown clock untouched).
    pub async fn execute_decision(
        &self,
        decision: &Decision,
        snapshot: Option<&TerminalSnapshot>,
    ) -> Result<bool, CoreError> {
        if decision.action == DecisionAction::Wait {
            if let Some(ref notice) = decision.notification {
                self.dispatch_notice(OperatorNotice::new(
                    notice.level,
                    "Agent notification",
                    notice.message.clone(),
                ))
                .await;
            }
            return Ok(false);
        }

        let pane = self.pane_id()?;
        match decision.action {
            DecisionAction::Respond => {
                let text = decision.response.as_deref().unwrap_or("continue");
                self.adapter.send_literal_then_enter(&pane, text).await?;
                self.log.info(format!("responded: {text}"));
            }
            DecisionAction::Approve => {
                self.adapter.send_approve(&pane).await?;
                self.log.info("approved prompt");
            }
            DecisionAction::Reject => {
                self.adapter.send_reject(&pane).await?;
                self.log.info("rejected prompt");
            }
            DecisionAction::Compact => {
                self.adapter.send_compact(&pane).await?;
                self.guard.set_pending_follow_up(true);
                self.log.info("issued /compact");
            }
            DecisionAction::Clear => {
                self.adapter.send_clear(&pane).await?;
                self.guard.set_pending_follow_up(true);
                self.log.info("issued /clear");
            }
            DecisionAction::Escape => {
                self.adapter.send_escape(&pane).await?;
                self.log.info("sent escape");
            }
            DecisionAction::RequestHelp => {
                let snippet = snapshot.map(|s| s.tail(HELP_SNIPPET_LINES)).unwrap_or_default();
                self.dispatch_notice(
                    OperatorNotice::new(NoticeLevel::Warn, "Agent requests help", &decision.reason)
                        .with_snippet(snippet),
                )
                .await;
                self.log.warn(format!("requested operator help: {}", decision.reason));
            }
            DecisionAction::Wait => {}
        }

        if let Some(ref notice) = decision.notification {
            self.dispatch_notice(OperatorNotice::new(
                notice.level,
                "Agent notification",
                notice.message.clone(),
            ))
            .await;
        }

        self.guard.record_action();
        Ok(true)
    }

    /// Human-instruction entry: wait for the guard (bounded), observe the
    /// pane, consult the oracle with the instruction, execute, and return
    /// the decision. Runs exclusively with event cycles on the same agent.
    pub async fn handle_instruction(&self, text: &str) -> Result<Decision, CoreError> {
        let Some(lock) = self.guard.wait_admit().await else {
            self.log.warn("instruction dropped: lock not acquired within 10s");
            return Err(CoreError::ProcessingStuck);
        };

        let pane = self.pane_id()?;
        let snapshot = self.adapter.capture(&pane, CAPTURE_LINES).await?;
        let state = self.adapter.parse(&snapshot);

        let cycle = Cycle {
            snapshot: Some(snapshot),
            state: Some(state),
            decision: None,
            lock: Some(lock),
        };
        let decision = self
            .consult_oracle(&cycle, "HumanInstruction".to_owned(), Some(text.to_owned()))
            .await
            .ok_or(CoreError::OracleUnavailable)?;

        if !cycle.lock.as_ref().is_some_and(|l| l.is_current()) {
            self.log.warn("instruction superseded during processing, discarding action");
            return Err(CoreError::ProcessingStuck);
        }
        self.execute_decision(&decision, cycle.snapshot.as_ref()).await?;
        self.log.info(format!("instruction handled: {}", decision.action.as_str()));
        Ok(decision)
    }

    fn pane_id(&self) -> Result<String, CoreError> {
        self.agent.pane_id().ok_or(CoreError::ConnectionMissing)
    }

    async fn dispatch_notice(&self, notice: OperatorNotice) {
        if let Some(ref notifier) = self.notifier {
            if let Err(e) = notifier.send(notice).await {
                warn!(agent = %self.log.agent_id(), err = %e, "operator notice failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;
