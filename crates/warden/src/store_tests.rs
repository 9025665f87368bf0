// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::Utc;

use super::{AgentStore, CreateOptions};
use crate::agent::{AgentPatch, AgentStatus, Connection};
use crate::error::CoreError;
use crate::event::HookEventType;

fn temp_store() -> anyhow::Result<(tempfile::TempDir, AgentStore)> {
    let dir = tempfile::tempdir()?;
    let store = AgentStore::open(dir.path().join("agents.json"), 4170)?;
    Ok((dir, store))
}

fn connection() -> Connection {
    Connection {
        project_path: "/work/repo".to_owned(),
        session_id: Some("mgr-1".to_owned()),
        pane_id: Some("%3".to_owned()),
        assistant_session_id: None,
        branch_id: None,
        connected_at: Utc::now(),
    }
}

#[tokio::test]
async fn create_then_get_round_trips() -> anyhow::Result<()> {
    let (_dir, store) = temp_store()?;
    let created = store.create("reviewer", "keep tests green", CreateOptions::default()).await?;
    let fetched = store.get(&created.id).await;

    // Equal modulo last_activity, which later mutations may refresh.
    let mut fetched = fetched.ok_or_else(|| anyhow::anyhow!("agent missing"))?;
    fetched.last_activity = created.last_activity;
    assert_eq!(fetched, created);
    Ok(())
}

#[tokio::test]
async fn created_agents_survive_reopen() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("agents.json");

    let store = AgentStore::open(&path, 4170)?;
    let agent = store.create("a", "p", CreateOptions::default()).await?;
    drop(store);

    let store = AgentStore::open(&path, 4170)?;
    let listed = store.list().await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, agent.id);
    Ok(())
}

#[tokio::test]
async fn last_updated_strictly_increases() -> anyhow::Result<()> {
    let (_dir, store) = temp_store()?;
    let agent = store.create("a", "p", CreateOptions::default()).await?;
    let t1 = store.load().await.last_updated;

    // A no-op update still writes and still bumps last_updated.
    store.update(&agent.id, AgentPatch::default()).await?;
    let t2 = store.load().await.last_updated;
    assert!(t2 > t1, "expected {t2} > {t1}");

    store.update_status(&agent.id, AgentStatus::Active, None).await?;
    let t3 = store.load().await.last_updated;
    assert!(t3 > t2);
    Ok(())
}

#[tokio::test]
async fn update_ignores_identity_and_refreshes_activity() -> anyhow::Result<()> {
    let (_dir, store) = temp_store()?;
    let agent = store.create("a", "p", CreateOptions::default()).await?;

    let patch = AgentPatch { name: Some("b".to_owned()), ..AgentPatch::default() };
    let updated = store.update(&agent.id, patch).await?;
    assert_eq!(updated.id, agent.id);
    assert_eq!(updated.created_at, agent.created_at);
    assert_eq!(updated.name, "b");
    assert!(updated.last_activity >= agent.last_activity);
    Ok(())
}

#[tokio::test]
async fn update_reinstates_session_start() -> anyhow::Result<()> {
    let (_dir, store) = temp_store()?;
    let agent = store.create("a", "p", CreateOptions::default()).await?;

    let patch = AgentPatch {
        hook_events: Some([HookEventType::Notification].into_iter().collect()),
        ..AgentPatch::default()
    };
    let updated = store.update(&agent.id, patch).await?;
    assert!(updated.hook_events.contains(&HookEventType::SessionStart));
    Ok(())
}

#[tokio::test]
async fn connect_then_disconnect_restores_idle() -> anyhow::Result<()> {
    let (_dir, store) = temp_store()?;
    let agent = store.create("a", "p", CreateOptions::default()).await?;

    let connected = store.connect(&agent.id, connection()).await?;
    assert!(connected.connection.is_some());

    let disconnected = store.disconnect(&agent.id).await?;
    assert!(disconnected.connection.is_none());
    assert_eq!(disconnected.status, AgentStatus::Idle);
    Ok(())
}

#[tokio::test]
async fn set_assistant_session_id_requires_connection() -> anyhow::Result<()> {
    let (_dir, store) = temp_store()?;
    let agent = store.create("a", "p", CreateOptions::default()).await?;

    let err = store.set_assistant_session_id(&agent.id, "sx").await;
    assert_eq!(err, Err(CoreError::ConnectionMissing));

    store.connect(&agent.id, connection()).await?;
    let updated = store.set_assistant_session_id(&agent.id, "sx").await?;
    let conn = updated.connection.ok_or_else(|| anyhow::anyhow!("connection missing"))?;
    assert_eq!(conn.assistant_session_id.as_deref(), Some("sx"));
    Ok(())
}

#[tokio::test]
async fn delete_reports_existence() -> anyhow::Result<()> {
    let (_dir, store) = temp_store()?;
    let agent = store.create("a", "p", CreateOptions::default()).await?;

    assert!(store.delete(&agent.id).await?);
    assert!(!store.delete(&agent.id).await?);
    assert!(store.get(&agent.id).await.is_none());
    Ok(())
}

#[tokio::test]
async fn unknown_agent_is_an_error() -> anyhow::Result<()> {
    let (_dir, store) = temp_store()?;
    let result = store.update_status("missing", AgentStatus::Error, None).await;
    assert_eq!(result, Err(CoreError::AgentNotFound("missing".to_owned())));
    Ok(())
}

#[tokio::test]
async fn status_error_records_message() -> anyhow::Result<()> {
    let (_dir, store) = temp_store()?;
    let agent = store.create("a", "p", CreateOptions::default()).await?;

    let updated = store
        .update_status(&agent.id, AgentStatus::Error, Some("store write failed".to_owned()))
        .await?;
    assert_eq!(updated.status, AgentStatus::Error);
    assert_eq!(updated.last_error.as_deref(), Some("store write failed"));

    let cleared = store.update_status(&agent.id, AgentStatus::Idle, None).await?;
    assert!(cleared.last_error.is_none());
    Ok(())
}
