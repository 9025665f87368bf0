// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeSet;

use super::{Agent, AgentPatch, AgentStatus, WatchdogTuning};
use crate::event::HookEventType;

#[test]
fn new_agent_subscribes_to_session_start_and_stop() {
    let agent = Agent::new("reviewer", "keep the build green");
    assert_eq!(agent.status, AgentStatus::Idle);
    assert!(agent.hook_events.contains(&HookEventType::SessionStart));
    assert!(agent.hook_events.contains(&HookEventType::Stop));
    assert!(agent.connection.is_none());
    assert!(!agent.auto_approve);
}

#[test]
fn normalize_reinstates_session_start() {
    let mut agent = Agent::new("a", "p");
    agent.hook_events = BTreeSet::from([HookEventType::Notification]);
    agent.normalize();
    assert!(agent.hook_events.contains(&HookEventType::SessionStart));
    assert!(agent.hook_events.contains(&HookEventType::Notification));
}

#[test]
fn session_start_only_subscription_is_respected() {
    let mut agent = Agent::new("a", "p");
    agent.hook_events = BTreeSet::from([HookEventType::SessionStart]);
    agent.normalize();
    assert_eq!(agent.hook_events, BTreeSet::from([HookEventType::SessionStart]));
}

#[test]
fn tuning_floors_are_enforced() {
    let tuning = WatchdogTuning {
        poll_interval_secs: 1,
        action_cooldown_secs: 2,
        attention_threshold: 0,
        enabled: true,
    }
    .normalized();
    assert_eq!(tuning.poll_interval_secs, 5);
    assert_eq!(tuning.action_cooldown_secs, 10);
    assert_eq!(tuning.attention_threshold, 1);
}

#[test]
fn patch_cannot_touch_identity() {
    let mut agent = Agent::new("a", "p");
    let id = agent.id.clone();
    let created = agent.created_at;

    let patch = AgentPatch {
        name: Some("b".to_owned()),
        master_prompt: Some("new objective".to_owned()),
        auto_approve: Some(true),
        ..AgentPatch::default()
    };
    patch.apply(&mut agent);

    assert_eq!(agent.id, id);
    assert_eq!(agent.created_at, created);
    assert_eq!(agent.name, "b");
    assert_eq!(agent.master_prompt, "new objective");
    assert!(agent.auto_approve);
}

#[test]
fn patch_applies_tuning_floors() {
    let mut agent = Agent::new("a", "p");
    let patch = AgentPatch {
        watchdog: Some(Some(WatchdogTuning {
            poll_interval_secs: 1,
            action_cooldown_secs: 1,
            attention_threshold: 0,
            enabled: true,
        })),
        ..AgentPatch::default()
    };
    patch.apply(&mut agent);

    let tuning = agent.watchdog_tuning();
    assert_eq!(tuning.poll_interval_secs, 5);
    assert_eq!(tuning.action_cooldown_secs, 10);
    assert_eq!(tuning.attention_threshold, 1);
}

#[test]
fn patch_can_clear_telegram() {
    let mut agent = Agent::new("a", "p");
    agent.telegram = Some(super::TelegramConfig {
        bot_token: "t".to_owned(),
        chat_id: "c".to_owned(),
        enabled: true,
    });
    let patch = AgentPatch { telegram: Some(None), ..AgentPatch::default() };
    patch.apply(&mut agent);
    assert!(agent.telegram.is_none());
}

#[test]
fn record_round_trips_through_json() -> anyhow::Result<()> {
    let mut agent = Agent::new("roundtrip", "objective");
    agent.watchdog = Some(WatchdogTuning::default());
    let json = serde_json::to_string(&agent)?;
    let back: Agent = serde_json::from_str(&json)?;
    assert_eq!(back, agent);
    Ok(())
}
