// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent processing guard: the cooperative lock that serializes event
//! cycles, watchdog actions, and human instructions on one pane.
//!
//! The guard is a flag plus metadata behind a short-held mutex — the flag,
//! not the mutex, spans a cycle, so no critical section ever crosses an
//! await point. Admission has drop-on-busy semantics with a force-release
//! after [`MAX_PROCESSING_TIME`]. Released locks carry an epoch so a
//! force-released cycle cannot clear a successor's claim on drop.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::event::HookEventType;

/// Ceiling on one cycle's lock tenure; afterwards the lock is force-released.
pub const MAX_PROCESSING_TIME: Duration = Duration::from_secs(120);

/// Minimum gap between successive actions on the same pane.
pub const MIN_ACTION_GAP: Duration = Duration::from_secs(3);

/// How long a human instruction waits for the lock.
pub const INSTRUCTION_WAIT: Duration = Duration::from_secs(10);

const INSTRUCTION_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct GuardState {
    epoch: u64,
    is_processing: bool,
    processing_started_at: Option<Instant>,
    last_response_time: Option<Instant>,
    last_event_type: Option<HookEventType>,
    pending_follow_up: bool,
}

/// Why an event was not admitted, or how it was.
#[derive(Debug)]
pub enum AdmitOutcome {
    Admitted(Admission),
    /// Another cycle holds the lock and is within its tenure.
    Busy { held_for: Duration },
    /// The last action was too recent.
    Cooldown { since_last: Duration },
}

/// A granted admission: the lock plus how it was obtained.
#[derive(Debug)]
pub struct Admission {
    pub lock: CycleLock,
    /// A stuck predecessor was force-released to admit this cycle.
    pub forced: bool,
    /// The cooldown was bypassed via the post-clear/compact follow-up flag.
    pub bypassed_cooldown: bool,
}

/// RAII claim on the guard; dropping it releases `is_processing` unless a
/// force-release already handed the guard to a newer epoch.
#[derive(Debug)]
pub struct CycleLock {
    guard: Arc<ProcessingGuard>,
    epoch: u64,
}

impl CycleLock {
    /// False once a force-release handed the guard to a newer cycle. A
    /// superseded cycle must not act on the pane any more.
    pub fn is_current(&self) -> bool {
        let state = self.guard.state.lock();
        state.is_processing && state.epoch == self.epoch
    }
}

impl Drop for CycleLock {
    fn drop(&mut self) {
        let mut state = self.guard.state.lock();
        if state.is_processing && state.epoch == self.epoch {
            state.is_processing = false;
            state.processing_started_at = None;
        }
    }
}

/// Watchdog-facing view of the guard.
#[derive(Debug, Clone, Copy)]
pub struct GuardSnapshot {
    pub is_processing: bool,
    pub last_response_time: Option<Instant>,
    pub pending_follow_up: bool,
}

#[derive(Debug, Default)]
pub struct ProcessingGuard {
    state: Mutex<GuardState>,
}

impl ProcessingGuard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Admit one inbound event cycle, or say why not.
    ///
    /// Order of checks mirrors the guard node contract: busy/force-release
    /// first, then cooldown with the `SessionStart` + `pending_follow_up`
    /// bypass (which consumes the flag).
    pub fn admit(self: &Arc<Self>, event_type: HookEventType) -> AdmitOutcome {
        let now = Instant::now();
        let mut state = self.state.lock();

        let mut forced = false;
        if state.is_processing {
            let held_for = state
                .processing_started_at
                .map(|t| now.duration_since(t))
                .unwrap_or(Duration::ZERO);
            if held_for < MAX_PROCESSING_TIME {
                return AdmitOutcome::Busy { held_for };
            }
            forced = true;
        }

        let mut bypassed_cooldown = false;
        if let Some(last) = state.last_response_time {
            let since_last = now.duration_since(last);
            if since_last < MIN_ACTION_GAP {
                if event_type == HookEventType::SessionStart && state.pending_follow_up {
                    state.pending_follow_up = false;
                    bypassed_cooldown = true;
                } else {
                    return AdmitOutcome::Cooldown { since_last };
                }
            }
        }

        state.epoch += 1;
        state.is_processing = true;
        state.processing_started_at = Some(now);
        state.last_event_type = Some(event_type);
        let lock = CycleLock { guard: Arc::clone(self), epoch: state.epoch };
        AdmitOutcome::Admitted(Admission { lock, forced, bypassed_cooldown })
    }

    /// Wait up to [`INSTRUCTION_WAIT`] for the guard, polling. Used by the
    /// human-instruction entry; cooldown does not apply to an explicit ask.
    pub async fn wait_admit(self: &Arc<Self>) -> Option<CycleLock> {
        let deadline = Instant::now() + INSTRUCTION_WAIT;
        loop {
            {
                let mut state = self.state.lock();
                if !state.is_processing {
                    state.epoch += 1;
                    state.is_processing = true;
                    state.processing_started_at = Some(Instant::now());
                    return Some(CycleLock { guard: Arc::clone(self), epoch: state.epoch });
                }
            }
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(INSTRUCTION_POLL).await;
        }
    }

    /// Record that an action was just sent to the pane. Called by the ESM's
    /// execute step and by the watchdog after it acts.
    pub fn record_action(&self) {
        self.state.lock().last_response_time = Some(Instant::now());
    }

    pub fn set_pending_follow_up(&self, pending: bool) {
        self.state.lock().pending_follow_up = pending;
    }

    pub fn pending_follow_up(&self) -> bool {
        self.state.lock().pending_follow_up
    }

    pub fn is_processing(&self) -> bool {
        self.state.lock().is_processing
    }

    pub fn last_event_type(&self) -> Option<HookEventType> {
        self.state.lock().last_event_type
    }

    pub fn snapshot(&self) -> GuardSnapshot {
        let state = self.state.lock();
        GuardSnapshot {
            is_processing: state.is_processing,
            last_response_time: state.last_response_time,
            pending_follow_up: state.pending_follow_up,
        }
    }
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
