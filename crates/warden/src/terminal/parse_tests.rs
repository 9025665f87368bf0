// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{parse, PermissionType};

#[test]
fn spinner_glyph_means_processing() {
    let state = parse(&["some earlier output", "⠙ working on it"]);
    assert!(state.is_processing);
    assert!(!state.is_waiting_for_input);
    assert!(!state.has_permission_prompt);
}

#[yare::parameterized(
    thinking = { "Thinking…" },
    reading = { "Reading src/main.rs" },
    compacting = { "Compacting conversation" },
    with_spinner = { "✻ Running tests" },
    indented = { "  Building workspace" },
)]
fn status_word_means_processing(line: &str) {
    let state = parse(&["output", line]);
    assert!(state.is_processing, "line {line:?} should classify as processing");
}

#[test]
fn status_word_requires_word_boundary() {
    // "Readings" is not the status word "Reading".
    let state = parse(&["Readings for today", ""]);
    assert!(!state.is_processing);
}

#[test]
fn status_word_only_matches_line_start() {
    let state = parse(&["finished Reading the file"]);
    assert!(!state.is_processing);
}

#[test]
fn status_word_outside_last_five_lines_is_ignored() {
    let state = parse(&["Thinking…", "a", "b", "c", "d", "e", "❯ "]);
    assert!(!state.is_processing);
    assert!(state.is_waiting_for_input);
}

#[test]
fn heavy_bar_run_means_processing() {
    let state = parse(&["████████░░ 80%"]);
    assert!(state.is_processing);
}

#[test]
fn short_heavy_bar_run_is_not_processing() {
    let state = parse(&["███ 30%", "❯ "]);
    assert!(!state.is_processing);
    assert!(state.is_waiting_for_input);
}

#[yare::parameterized(
    allow_to = { "Allow Bash to run ls?", PermissionType::Bash },
    y_n = { "Run this command? (y/n) bash", PermissionType::Bash },
    bracket_yn = { "Overwrite file? [Y/n] write", PermissionType::Write },
    bracket_ny = { "Apply edit? [y/N]", PermissionType::Edit },
    press_y = { "Press y to allow", PermissionType::Other },
)]
fn permission_patterns_classify(line: &str, expected: PermissionType) {
    let state = parse(&["", line]);
    assert!(state.has_permission_prompt, "line {line:?} should be a permission prompt");
    assert_eq!(state.permission_type, Some(expected));
    assert!(state.is_waiting_for_input);
}

#[test]
fn processing_suppresses_permission_prompt() {
    let state = parse(&["Allow Bash to run ls?", "⠹ running"]);
    assert!(state.is_processing);
    assert!(!state.has_permission_prompt);
    assert!(!state.is_waiting_for_input);
}

#[test]
fn prompt_glyph_means_waiting() {
    let state = parse(&["done", "❯ "]);
    assert!(state.is_waiting_for_input);
    assert!(!state.has_permission_prompt);
}

#[test]
fn plain_gt_prompt_means_waiting() {
    let state = parse(&["done", "> "]);
    assert!(state.is_waiting_for_input);
}

#[test]
fn idle_marker_means_waiting() {
    let state = parse(&["output", "  ? for shortcuts"]);
    assert!(state.is_waiting_for_input);
}

#[test]
fn prompt_outside_last_eight_lines_is_ignored() {
    let lines = ["❯ old prompt", "1", "2", "3", "4", "5", "6", "7", "8"];
    let state = parse(&lines);
    assert!(!state.is_waiting_for_input);
}

#[yare::parameterized(
    banner = { "context limit reached" },
    zero_percent = { "Context left: 0% remaining" },
    regex_full = { "the context  full warning" },
    regex_exhausted = { "Context exhausted, cannot continue" },
)]
fn context_limit_detected(line: &str) {
    let state = parse(&[line]);
    assert!(state.has_context_limit, "line {line:?} should flag context limit");
}

#[test]
fn context_limit_detected_even_while_processing() {
    let state = parse(&["context limit reached", "⠧ compacting"]);
    assert!(state.has_context_limit);
    assert!(state.is_processing);
}

#[test]
fn error_phrase_is_extracted() {
    let state = parse(&["doing things", "Error: connection refused", "❯ "]);
    assert_eq!(state.last_error.as_deref(), Some("Error: connection refused"));
    assert!(state.is_waiting_for_input);
}

#[test]
fn error_outside_last_ten_lines_is_ignored() {
    let mut lines = vec!["Error: old failure"];
    lines.extend(["x"; 10]);
    let state = parse(&lines);
    assert!(state.last_error.is_none());
}

#[test]
fn blank_pane_is_unclear() {
    let state = parse(&[]);
    assert_eq!(state, super::TerminalState::unclear());
}
