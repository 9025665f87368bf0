// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use super::{Watchdog, WatchdogState, WATCHDOG_TRIGGER};
use crate::agent::{AgentCell, WatchdogTuning};
use crate::guard::ProcessingGuard;
use crate::machine::EventMachine;
use crate::oracle::{Decision, DecisionAction};
use crate::ring::{AgentLog, LogRing};
use crate::terminal::TerminalAdapter;
use crate::test_support::{connected_agent, FakeMux, StubOracle};

struct Rig {
    watchdog: Watchdog,
    machine: Arc<EventMachine>,
    mux: Arc<FakeMux>,
    oracle: Arc<StubOracle>,
    agent: Arc<AgentCell>,
}

fn rig(tuning: WatchdogTuning) -> Rig {
    let mux = FakeMux::new();
    let oracle = StubOracle::new();
    let ring = Arc::new(LogRing::default());

    let mut record = connected_agent("%1");
    record.watchdog = Some(tuning);
    let agent = AgentCell::new(record);
    let log = AgentLog::new(Arc::clone(&ring), agent.id());

    let adapter = TerminalAdapter::new(mux.clone());
    let machine = Arc::new(EventMachine::new(
        Arc::clone(&agent),
        ProcessingGuard::new(),
        adapter.clone(),
        oracle.clone(),
        None,
        log.clone(),
    ));
    let watchdog =
        Watchdog::new(Arc::clone(&agent), Arc::clone(&machine), adapter, oracle.clone(), log);
    Rig { watchdog, machine, mux, oracle, agent }
}

fn tuning(threshold: u32, cooldown_secs: u64) -> WatchdogTuning {
    WatchdogTuning {
        poll_interval_secs: 5,
        action_cooldown_secs: cooldown_secs,
        attention_threshold: threshold,
        enabled: true,
    }
}

fn respond(text: &str) -> Decision {
    Decision {
        action: DecisionAction::Respond,
        response: Some(text.to_owned()),
        reason: "stalled".to_owned(),
        notification: None,
    }
}

#[tokio::test(start_paused = true)]
async fn acts_only_after_threshold_and_resets() {
    let rig = rig(tuning(2, 10));
    rig.mux.set_screen("❯ ");
    let mut state = WatchdogState::default();

    // Tick 1: noteworthy, below threshold — no action.
    rig.oracle.push(respond("nudge"));
    rig.watchdog.tick(&mut state).await;
    assert_eq!(state.consecutive_attention_polls, 1);
    assert!(rig.mux.literals().is_empty());

    // Tick 2: threshold reached, cooldown clear — action executes.
    rig.oracle.push(respond("nudge"));
    rig.watchdog.tick(&mut state).await;
    assert_eq!(state.consecutive_attention_polls, 0);
    assert_eq!(rig.mux.literals(), vec!["nudge".to_owned()]);

    // The action is visible to the machine's cooldown clock.
    assert!(rig.machine.guard().snapshot().last_response_time.is_some());

    // Tick 3 shortly after: counter restarts from zero.
    tokio::time::advance(Duration::from_millis(500)).await;
    rig.oracle.push(respond("nudge"));
    rig.watchdog.tick(&mut state).await;
    assert_eq!(state.consecutive_attention_polls, 1);
    assert_eq!(rig.mux.literals().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn wait_decision_resets_counter() {
    let rig = rig(tuning(2, 10));
    rig.mux.set_screen("❯ ");
    let mut state = WatchdogState::default();

    rig.oracle.push(respond("nudge"));
    rig.watchdog.tick(&mut state).await;
    assert_eq!(state.consecutive_attention_polls, 1);

    rig.oracle.push(Decision {
        action: DecisionAction::Wait,
        response: None,
        reason: "still fine".to_owned(),
        notification: None,
    });
    rig.watchdog.tick(&mut state).await;
    assert_eq!(state.consecutive_attention_polls, 0);
    assert!(rig.mux.literals().is_empty());
}

#[tokio::test(start_paused = true)]
async fn oracle_unavailable_resets_counter() {
    let rig = rig(tuning(2, 10));
    rig.mux.set_screen("❯ ");
    let mut state = WatchdogState::default();

    rig.oracle.push(respond("nudge"));
    rig.watchdog.tick(&mut state).await;
    rig.oracle.push_none();
    rig.watchdog.tick(&mut state).await;
    assert_eq!(state.consecutive_attention_polls, 0);
}

#[tokio::test(start_paused = true)]
async fn threshold_hit_with_cooldown_held_keeps_counter() {
    let rig = rig(tuning(2, 60));
    rig.mux.set_screen("❯ ");
    let mut state = WatchdogState::default();

    // A recent machine action holds the cooldown.
    rig.machine.record_external_action();

    rig.oracle.push(respond("nudge"));
    rig.watchdog.tick(&mut state).await;
    rig.oracle.push(respond("nudge"));
    rig.watchdog.tick(&mut state).await;

    // Threshold reached but no action, and the counter is NOT reset.
    assert_eq!(state.consecutive_attention_polls, 2);
    assert!(rig.mux.literals().is_empty());

    // Once the window clears, the very next noteworthy poll acts.
    tokio::time::advance(Duration::from_secs(61)).await;
    rig.oracle.push(respond("nudge"));
    rig.watchdog.tick(&mut state).await;
    assert_eq!(rig.mux.literals(), vec!["nudge".to_owned()]);
    assert_eq!(state.consecutive_attention_polls, 0);
}

#[tokio::test(start_paused = true)]
async fn configured_cooldown_below_sixty_seconds_is_floored() {
    // action_cooldown_secs = 10 (the record-level floor), but the enforced
    // window is still a minute.
    let rig = rig(tuning(1, 10));
    rig.mux.set_screen("❯ ");
    let mut state = WatchdogState::default();

    rig.oracle.push(respond("nudge"));
    rig.watchdog.tick(&mut state).await;
    assert_eq!(rig.mux.literals(), vec!["nudge".to_owned()]);

    // 15s later: past the configured 10s, inside the 60s floor — no action,
    // counter held.
    tokio::time::advance(Duration::from_secs(15)).await;
    rig.oracle.push(respond("nudge"));
    rig.watchdog.tick(&mut state).await;
    assert_eq!(rig.mux.literals().len(), 1);
    assert_eq!(state.consecutive_attention_polls, 1);

    // Past the floor: the next noteworthy poll acts again.
    tokio::time::advance(Duration::from_secs(50)).await;
    rig.oracle.push(respond("nudge"));
    rig.watchdog.tick(&mut state).await;
    assert_eq!(rig.mux.literals().len(), 2);
    assert_eq!(state.consecutive_attention_polls, 0);
}

#[tokio::test(start_paused = true)]
async fn processing_guard_short_circuits_poll() {
    let rig = rig(tuning(1, 10));
    rig.mux.set_screen("❯ ");
    let mut state = WatchdogState { consecutive_attention_polls: 3, ..Default::default() };

    let admission = match rig.machine.guard().admit(crate::event::HookEventType::Stop) {
        crate::guard::AdmitOutcome::Admitted(a) => a,
        other => panic!("expected admission, got {other:?}"),
    };

    rig.watchdog.tick(&mut state).await;
    assert_eq!(state.consecutive_attention_polls, 0);
    assert_eq!(rig.oracle.call_count(), 0);
    drop(admission);
}

#[tokio::test(start_paused = true)]
async fn busy_pane_short_circuits_poll() {
    let rig = rig(tuning(1, 10));
    rig.mux.set_screen("⠹ Running tests");
    let mut state = WatchdogState { consecutive_attention_polls: 3, ..Default::default() };

    rig.watchdog.tick(&mut state).await;
    assert_eq!(state.consecutive_attention_polls, 0);
    assert_eq!(rig.oracle.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn disconnected_agent_short_circuits_poll() {
    let rig = rig(tuning(1, 10));
    let mut record = rig.agent.get();
    record.connection = None;
    rig.agent.set(record);
    let mut state = WatchdogState { consecutive_attention_polls: 3, ..Default::default() };

    rig.watchdog.tick(&mut state).await;
    assert_eq!(state.consecutive_attention_polls, 0);
    assert_eq!(rig.oracle.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn capture_failure_short_circuits_poll() {
    let rig = rig(tuning(1, 10));
    // No screen scripted: captures fail.
    let mut state = WatchdogState { consecutive_attention_polls: 3, ..Default::default() };

    rig.watchdog.tick(&mut state).await;
    assert_eq!(state.consecutive_attention_polls, 0);
    assert_eq!(rig.oracle.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn oracle_is_consulted_with_watchdog_trigger() {
    let rig = rig(tuning(1, 10));
    rig.mux.set_screen("❯ ");
    let mut state = WatchdogState::default();

    rig.oracle.push(respond("nudge"));
    rig.watchdog.tick(&mut state).await;

    let calls = rig.oracle.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].trigger_label, WATCHDOG_TRIGGER);
}
