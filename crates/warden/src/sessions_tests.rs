// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{ManagedSession, SessionBranch};

fn session() -> ManagedSession {
    ManagedSession {
        id: "mgr-1".to_owned(),
        main: SessionBranch {
            id: "main".to_owned(),
            assistant_session_id: Some("sa".to_owned()),
            pane_id: Some("%1".to_owned()),
        },
        forks: vec![SessionBranch {
            id: "fork-a".to_owned(),
            assistant_session_id: Some("sb".to_owned()),
            pane_id: Some("%2".to_owned()),
        }],
    }
}

#[test]
fn branch_id_wins_over_pane_id() {
    let session = session();
    let branch = session.branch_for(Some("%1"), Some("fork-a"));
    assert_eq!(branch.map(|b| b.id.as_str()), Some("fork-a"));
}

#[test]
fn pane_id_resolves_main_and_forks() {
    let session = session();
    assert_eq!(session.branch_for(Some("%1"), None).map(|b| b.id.as_str()), Some("main"));
    assert_eq!(session.branch_for(Some("%2"), None).map(|b| b.id.as_str()), Some("fork-a"));
}

#[test]
fn no_hints_defaults_to_main() {
    let session = session();
    assert_eq!(session.branch_for(None, None).map(|b| b.id.as_str()), Some("main"));
}

#[test]
fn set_assistant_session_id_targets_fork() {
    let mut session = session();
    assert!(session.set_assistant_session_id(None, Some("fork-a"), "new-id"));
    assert_eq!(session.forks[0].assistant_session_id.as_deref(), Some("new-id"));
    assert_eq!(session.main.assistant_session_id.as_deref(), Some("sa"));
}

#[test]
fn set_assistant_session_id_unknown_pane_is_false() {
    let mut session = session();
    assert!(!session.set_assistant_session_id(Some("%9"), None, "new-id"));
}
