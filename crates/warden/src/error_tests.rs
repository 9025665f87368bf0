// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::CoreError;

#[yare::parameterized(
    not_found = { CoreError::AgentNotFound("a1".into()), "AGENT_NOT_FOUND" },
    no_connection = { CoreError::ConnectionMissing, "CONNECTION_MISSING" },
    terminal = { CoreError::TerminalUnavailable("pane gone".into()), "TERMINAL_UNAVAILABLE" },
    oracle = { CoreError::OracleUnavailable, "ORACLE_UNAVAILABLE" },
    store = { CoreError::StoreWriteFailed("disk full".into()), "STORE_WRITE_FAILED" },
    install = { CoreError::HookInstallFailed("read-only".into()), "HOOK_INSTALL_FAILED" },
    stuck = { CoreError::ProcessingStuck, "PROCESSING_STUCK" },
)]
fn codes_are_stable(err: CoreError, code: &str) {
    assert_eq!(err.as_str(), code);
}

#[test]
fn display_includes_detail() {
    let err = CoreError::TerminalUnavailable("pane %3 not found".into());
    assert!(err.to_string().contains("pane %3 not found"));
}
