// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable agent store: a single JSON file, one writer, atomic renames.
//!
//! Every mutation re-reads the file, applies the change to a scratch copy,
//! and commits with write-to-temp + rename. The in-memory copy is only
//! replaced after a successful rename, so a failed write leaves both the
//! file and the cache at the previous state.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use crate::agent::{Agent, AgentPatch, AgentStatus, Connection, TelegramConfig, WatchdogTuning};
use crate::error::CoreError;
use crate::event::HookEventType;

pub const STORE_VERSION: &str = "1.0.0";

/// Top-level on-disk document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreFile {
    pub version: String,
    pub agents: Vec<Agent>,
    pub hook_server_port: u16,
    pub last_updated: DateTime<Utc>,
}

impl StoreFile {
    fn empty(hook_server_port: u16) -> Self {
        Self {
            version: STORE_VERSION.to_owned(),
            agents: Vec::new(),
            hook_server_port,
            last_updated: Utc::now(),
        }
    }
}

/// Optional fields accepted at agent creation.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub hook_events: Option<std::collections::BTreeSet<HookEventType>>,
    pub auto_approve: bool,
    pub telegram: Option<TelegramConfig>,
    pub watchdog: Option<WatchdogTuning>,
}

/// Default location: `${XDG_CONFIG_HOME:-$HOME/.config}/warden/agents.json`.
pub fn default_store_path() -> PathBuf {
    let config_home = std::env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_default();
        format!("{home}/.config")
    });
    PathBuf::from(config_home).join("warden").join("agents.json")
}

/// Single-writer agent store.
pub struct AgentStore {
    path: PathBuf,
    inner: Mutex<StoreFile>,
}

impl AgentStore {
    /// Open (or initialize) the store at `path`.
    pub fn open(path: impl Into<PathBuf>, hook_server_port: u16) -> anyhow::Result<Self> {
        let path = path.into();
        let file = match read_file(&path)? {
            Some(mut file) => {
                file.hook_server_port = hook_server_port;
                file
            }
            None => StoreFile::empty(hook_server_port),
        };
        Ok(Self { path, inner: Mutex::new(file) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the whole document from disk (readers see old or new, never torn).
    pub async fn load(&self) -> StoreFile {
        let mut inner = self.inner.lock().await;
        match read_file(&self.path) {
            Ok(Some(file)) => *inner = file,
            Ok(None) => {}
            Err(e) => warn!(path = %self.path.display(), err = %e, "store re-read failed"),
        }
        inner.clone()
    }

    pub async fn list(&self) -> Vec<Agent> {
        self.inner.lock().await.agents.clone()
    }

    pub async fn get(&self, id: &str) -> Option<Agent> {
        self.inner.lock().await.agents.iter().find(|a| a.id == id).cloned()
    }

    pub async fn hook_server_port(&self) -> u16 {
        self.inner.lock().await.hook_server_port
    }

    /// Create a new idle agent and persist it.
    pub async fn create(
        &self,
        name: &str,
        master_prompt: &str,
        opts: CreateOptions,
    ) -> Result<Agent, CoreError> {
        self.mutate(move |file| {
            let mut agent = Agent::new(name, master_prompt);
            if let Some(events) = opts.hook_events.clone() {
                agent.hook_events = events;
            }
            agent.auto_approve = opts.auto_approve;
            agent.telegram = opts.telegram.clone();
            agent.watchdog = opts.watchdog.clone();
            agent.normalize();
            file.agents.push(agent.clone());
            Ok(agent)
        })
        .await
    }

    /// Apply a patch. `id` and `created_at` are untouchable; `last_activity`
    /// is refreshed even when the patch is a no-op.
    pub async fn update(&self, id: &str, patch: AgentPatch) -> Result<Agent, CoreError> {
        let id = id.to_owned();
        self.mutate(move |file| {
            let agent = find_mut(file, &id)?;
            patch.apply(agent);
            agent.last_activity = Utc::now();
            Ok(agent.clone())
        })
        .await
    }

    pub async fn update_status(
        &self,
        id: &str,
        status: AgentStatus,
        error: Option<String>,
    ) -> Result<Agent, CoreError> {
        let id = id.to_owned();
        self.mutate(move |file| {
            let agent = find_mut(file, &id)?;
            agent.status = status;
            agent.last_error = error.clone();
            agent.last_activity = Utc::now();
            Ok(agent.clone())
        })
        .await
    }

    pub async fn connect(&self, id: &str, connection: Connection) -> Result<Agent, CoreError> {
        let id = id.to_owned();
        self.mutate(move |file| {
            let agent = find_mut(file, &id)?;
            agent.connection = Some(connection.clone());
            agent.last_activity = Utc::now();
            Ok(agent.clone())
        })
        .await
    }

    /// Clear the connection and return the agent to `idle`.
    pub async fn disconnect(&self, id: &str) -> Result<Agent, CoreError> {
        let id = id.to_owned();
        self.mutate(move |file| {
            let agent = find_mut(file, &id)?;
            agent.connection = None;
            agent.status = AgentStatus::Idle;
            agent.last_activity = Utc::now();
            Ok(agent.clone())
        })
        .await
    }

    /// Update only the assistant session id inside an existing connection.
    pub async fn set_assistant_session_id(
        &self,
        id: &str,
        assistant_session_id: &str,
    ) -> Result<Agent, CoreError> {
        let id = id.to_owned();
        let sid = assistant_session_id.to_owned();
        self.mutate(move |file| {
            let agent = find_mut(file, &id)?;
            let Some(ref mut connection) = agent.connection else {
                return Err(CoreError::ConnectionMissing);
            };
            connection.assistant_session_id = Some(sid.clone());
            agent.last_activity = Utc::now();
            Ok(agent.clone())
        })
        .await
    }

    /// Remove an agent. Returns whether a record existed.
    pub async fn delete(&self, id: &str) -> Result<bool, CoreError> {
        let id = id.to_owned();
        self.mutate(move |file| {
            let before = file.agents.len();
            file.agents.retain(|a| a.id != id);
            Ok(file.agents.len() != before)
        })
        .await
    }

    /// Re-read, apply, and atomically commit one mutation.
    async fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut StoreFile) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let mut inner = self.inner.lock().await;

        // Re-read so external edits between mutations are not clobbered.
        let mut scratch = match read_file(&self.path) {
            Ok(Some(file)) => file,
            Ok(None) => inner.clone(),
            Err(e) => {
                warn!(path = %self.path.display(), err = %e, "store re-read failed, using cache");
                inner.clone()
            }
        };
        scratch.hook_server_port = inner.hook_server_port;

        let result = apply(&mut scratch)?;

        let mut now = Utc::now();
        if now <= scratch.last_updated {
            now = scratch.last_updated + ChronoDuration::milliseconds(1);
        }
        scratch.last_updated = now;

        write_file(&self.path, &scratch).map_err(|e| CoreError::StoreWriteFailed(e.to_string()))?;
        *inner = scratch;
        Ok(result)
    }
}

fn find_mut<'a>(file: &'a mut StoreFile, id: &str) -> Result<&'a mut Agent, CoreError> {
    file.agents
        .iter_mut()
        .find(|a| a.id == id)
        .ok_or_else(|| CoreError::AgentNotFound(id.to_owned()))
}

fn read_file(path: &Path) -> anyhow::Result<Option<StoreFile>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)?;
    let file: StoreFile = serde_json::from_str(&contents)?;
    Ok(Some(file))
}

fn write_file(path: &Path, file: &StoreFile) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(file)?;
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
