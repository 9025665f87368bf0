// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hook configuration install/uninstall for supervised projects.
//!
//! Hooks live in the project's `.claude/settings.json` under the top-level
//! `hooks` key: each event type maps to a list of hook-group records
//! `{ "hooks": [{ "type": "command", "command": ... }] }`. The installed
//! command forwards the hook's stdin to the ingress via curl. Install is
//! idempotent: any group already pointing at this agent is replaced.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};

use crate::error::CoreError;
use crate::event::HookEventType;

/// Location of the assistant settings file inside a project.
pub fn settings_path(project_path: &Path) -> PathBuf {
    project_path.join(".claude").join("settings.json")
}

/// The curl command a hook runs: POST stdin to the agent's ingress route.
pub fn hook_command(port: u16, agent_id: &str) -> String {
    format!(
        "curl -s -X POST -H 'Content-Type: application/json' --data-binary @- \
         http://127.0.0.1:{port}/api/hooks/{agent_id}"
    )
}

/// Substring identifying this agent's hook groups regardless of port.
fn agent_marker(agent_id: &str) -> String {
    format!("/api/hooks/{agent_id}")
}

fn group_mentions_agent(group: &Value, marker: &str) -> bool {
    group
        .get("hooks")
        .and_then(|h| h.as_array())
        .is_some_and(|hooks| {
            hooks.iter().any(|hook| {
                hook.get("command").and_then(|c| c.as_str()).is_some_and(|c| c.contains(marker))
            })
        })
}

fn read_settings(path: &Path) -> Result<Map<String, Value>, CoreError> {
    if !path.exists() {
        return Ok(Map::new());
    }
    let contents = std::fs::read_to_string(path)
        .map_err(|e| CoreError::HookInstallFailed(e.to_string()))?;
    if contents.trim().is_empty() {
        return Ok(Map::new());
    }
    let value: Value = serde_json::from_str(&contents)
        .map_err(|e| CoreError::HookInstallFailed(format!("settings not valid JSON: {e}")))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(CoreError::HookInstallFailed("settings root is not an object".to_owned())),
    }
}

fn write_settings(path: &Path, settings: &Map<String, Value>) -> Result<(), CoreError> {
    let write = || -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&Value::Object(settings.clone()))?;
        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    };
    write().map_err(|e| CoreError::HookInstallFailed(e.to_string()))
}

/// Install this agent's hook groups for the given event set.
///
/// `SessionStart` is always included. Existing groups for other agents and
/// unrelated settings keys are preserved untouched.
pub fn install_hooks(
    project_path: &Path,
    agent_id: &str,
    port: u16,
    events: &BTreeSet<HookEventType>,
) -> Result<(), CoreError> {
    let path = settings_path(project_path);
    let mut settings = read_settings(&path)?;
    let marker = agent_marker(agent_id);
    let command = hook_command(port, agent_id);

    let mut events: BTreeSet<HookEventType> = events.clone();
    events.insert(HookEventType::SessionStart);

    let hooks = settings
        .entry("hooks".to_owned())
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(hooks) = hooks.as_object_mut() else {
        return Err(CoreError::HookInstallFailed("settings `hooks` is not an object".to_owned()));
    };

    for event in &events {
        let entry = hooks
            .entry(event.as_str().to_owned())
            .or_insert_with(|| Value::Array(Vec::new()));
        let Some(groups) = entry.as_array_mut() else {
            return Err(CoreError::HookInstallFailed(format!(
                "settings `hooks.{event}` is not an array"
            )));
        };
        groups.retain(|group| !group_mentions_agent(group, &marker));
        groups.push(json!({
            "hooks": [{ "type": "command", "command": command }]
        }));
    }

    write_settings(&path, &settings)
}

/// Remove every hook group pointing at this agent; prune empty arrays and an
/// empty `hooks` object. Inverse of [`install_hooks`].
pub fn uninstall_hooks(project_path: &Path, agent_id: &str) -> Result<(), CoreError> {
    let path = settings_path(project_path);
    if !path.exists() {
        return Ok(());
    }
    let mut settings = read_settings(&path)?;
    let marker = agent_marker(agent_id);

    if let Some(hooks) = settings.get_mut("hooks").and_then(|h| h.as_object_mut()) {
        let keys: Vec<String> = hooks.keys().cloned().collect();
        for key in keys {
            let remove = match hooks.get_mut(&key).and_then(|e| e.as_array_mut()) {
                Some(groups) => {
                    groups.retain(|group| !group_mentions_agent(group, &marker));
                    groups.is_empty()
                }
                None => false,
            };
            if remove {
                hooks.remove(&key);
            }
        }
    }
    if settings.get("hooks").and_then(|h| h.as_object()).is_some_and(Map::is_empty) {
        settings.remove("hooks");
    }

    write_settings(&path, &settings)
}

#[cfg(test)]
#[path = "hooks_tests.rs"]
mod tests;
