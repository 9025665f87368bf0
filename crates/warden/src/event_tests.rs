// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;

use super::{normalize, EventDetail, HookEventType, StartSource};

#[yare::parameterized(
    stop = { "Stop", HookEventType::Stop },
    notification = { "Notification", HookEventType::Notification },
    subagent_stop = { "SubagentStop", HookEventType::SubagentStop },
    pre_compact = { "PreCompact", HookEventType::PreCompact },
    session_start = { "SessionStart", HookEventType::SessionStart },
    session_end = { "SessionEnd", HookEventType::SessionEnd },
    pre_tool = { "PreToolUse", HookEventType::PreToolUse },
    post_tool = { "PostToolUse", HookEventType::PostToolUse },
    post_tool_failure = { "PostToolUseFailure", HookEventType::PostToolUseFailure },
    permission = { "PermissionRequest", HookEventType::PermissionRequest },
    prompt_submit = { "UserPromptSubmit", HookEventType::UserPromptSubmit },
    subagent_start = { "SubagentStart", HookEventType::SubagentStart },
    teammate_idle = { "TeammateIdle", HookEventType::TeammateIdle },
    task_completed = { "TaskCompleted", HookEventType::TaskCompleted },
    unrecognized = { "SomethingNew", HookEventType::Stop },
)]
fn wire_names_round_trip(name: &str, expected: HookEventType) {
    assert_eq!(HookEventType::from_wire(name), expected);
}

#[test]
fn normalize_reads_hook_event_name() {
    let event = normalize("a1", &json!({ "hook_event_name": "Notification" }));
    assert_eq!(event.agent_id, "a1");
    assert_eq!(event.event_type, HookEventType::Notification);
    assert_eq!(event.detail, EventDetail::None);
}

#[test]
fn normalize_falls_back_to_event_type_key() {
    let event = normalize("a1", &json!({ "event_type": "SubagentStop" }));
    assert_eq!(event.event_type, HookEventType::SubagentStop);
}

#[test]
fn normalize_defaults_to_stop() {
    let event = normalize("a1", &json!({ "session_id": "sx" }));
    assert_eq!(event.event_type, HookEventType::Stop);
    assert_eq!(event.assistant_session_id.as_deref(), Some("sx"));
}

#[test]
fn normalize_extracts_session_and_cwd() {
    let event = normalize(
        "a1",
        &json!({ "hook_event_name": "Stop", "session_id": "sess-9", "cwd": "/work/repo" }),
    );
    assert_eq!(event.assistant_session_id.as_deref(), Some("sess-9"));
    assert_eq!(event.project_path.as_deref(), Some("/work/repo"));
}

#[test]
fn normalize_session_start_source() {
    let event = normalize("a1", &json!({ "hook_event_name": "SessionStart", "source": "clear" }));
    assert_eq!(event.start_source(), Some(StartSource::Clear));
    assert!(event.start_source().is_some_and(|s| s.is_restart()));

    let event = normalize("a1", &json!({ "hook_event_name": "SessionStart", "source": "startup" }));
    assert_eq!(event.start_source(), Some(StartSource::Startup));
    assert!(!event.start_source().is_some_and(|s| s.is_restart()));
}

#[test]
fn normalize_session_start_without_source_is_unknown() {
    let event = normalize("a1", &json!({ "hook_event_name": "SessionStart" }));
    assert_eq!(event.start_source(), Some(StartSource::Unknown));
}

#[test]
fn normalize_tool_events_keep_tool_fields() {
    let event = normalize(
        "a1",
        &json!({
            "hook_event_name": "PreToolUse",
            "tool_name": "Bash",
            "tool_input": { "command": "ls" },
        }),
    );
    match event.detail {
        EventDetail::Tool { tool_name, tool_input } => {
            assert_eq!(tool_name.as_deref(), Some("Bash"));
            assert_eq!(tool_input, Some(serde_json::json!({ "command": "ls" })));
        }
        other => panic!("expected tool detail, got {other:?}"),
    }
}

#[test]
fn normalize_pre_compact_trigger_defaults_to_auto() {
    let event = normalize("a1", &json!({ "hook_event_name": "PreCompact" }));
    assert_eq!(event.detail, EventDetail::PreCompact { trigger: "auto".to_owned() });
}

#[test]
fn normalize_session_end_reason() {
    let event = normalize("a1", &json!({ "hook_event_name": "SessionEnd", "reason": "exit" }));
    assert_eq!(event.detail, EventDetail::SessionEnd { reason: Some("exit".to_owned()) });
}
