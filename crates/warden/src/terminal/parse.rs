// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Classify rendered pane lines into a [`TerminalState`].
//!
//! Detection is tiered: an active spinner or status word wins over
//! everything ("processing"), permission and waiting signals are only
//! considered on a quiet pane, and the context-limit banner is checked
//! independently because it must be handled even mid-render.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Spinner frames and status glyphs the assistant animates while working.
const SPINNER_GLYPHS: &[char] = &[
    '⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏', '✻', '✽', '✶', '✳',
];

/// Present-progressive status words the assistant prints at line start.
const STATUS_WORDS: &[&str] = &[
    "Thinking",
    "Processing",
    "Reading",
    "Writing",
    "Searching",
    "Analyzing",
    "Running",
    "Editing",
    "Creating",
    "Installing",
    "Building",
    "Compiling",
    "Fetching",
    "Downloading",
    "Updating",
    "Compacting",
    "Resuming",
];

/// Progress-bar block glyphs; a run of four or more means an active render.
const HEAVY_BAR_GLYPHS: &[char] = &['█', '▉', '▊', '▋'];
const HEAVY_BAR_RUN: usize = 4;

/// Footer text shown only while the assistant is idle at its prompt.
const IDLE_MARKERS: &[&str] = &["? for shortcuts"];

/// Phrases that identify an error report in the tail of the pane.
const ERROR_PHRASES: &[&str] = &["Error:", "error:", "fatal:", "panicked at", "FAILED"];

/// How far back each scan looks.
const PROCESSING_WINDOW: usize = 10;
const STATUS_WORD_WINDOW: usize = 5;
const PERMISSION_WINDOW: usize = 50;
const PROMPT_WINDOW: usize = 8;
const ERROR_WINDOW: usize = 10;

fn permission_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)] // pattern is a compile-time constant
        Regex::new(r"Allow .+ to |Allow .+\?|\(y/n\)|\[Y/n\]|\[y/N\]|Press y to allow").unwrap()
    })
}

fn context_limit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)] // pattern is a compile-time constant
        Regex::new(r"(?i)context\s+(limit|full|exhausted)").unwrap()
    })
}

/// Classified permission prompt kind, by tool keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionType {
    Bash,
    Edit,
    Write,
    Other,
}

/// Structured view of a pane snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalState {
    pub is_processing: bool,
    pub is_waiting_for_input: bool,
    pub has_permission_prompt: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_type: Option<PermissionType>,
    pub has_context_limit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl TerminalState {
    /// A state with nothing detected (blank or unclassifiable pane).
    pub fn unclear() -> Self {
        Self {
            is_processing: false,
            is_waiting_for_input: false,
            has_permission_prompt: false,
            permission_type: None,
            has_context_limit: false,
            last_error: None,
        }
    }
}

fn tail(lines: &[&str], n: usize) -> Vec<String> {
    let start = lines.len().saturating_sub(n);
    lines[start..].iter().map(|l| l.to_string()).collect()
}

/// True when a status word opens the line (after an optional spinner glyph)
/// and is followed by a word boundary.
fn starts_with_status_word(line: &str) -> bool {
    let trimmed = line
        .trim_start()
        .trim_start_matches(|c: char| SPINNER_GLYPHS.contains(&c) || c.is_whitespace());
    STATUS_WORDS.iter().any(|word| {
        trimmed.starts_with(word)
            && trimmed[word.len()..].chars().next().is_none_or(|c| !c.is_alphanumeric())
    })
}

/// True when the line contains a run of >= 4 heavy-bar glyphs.
fn has_heavy_bar_run(line: &str) -> bool {
    let mut run = 0usize;
    for c in line.chars() {
        if HEAVY_BAR_GLYPHS.contains(&c) {
            run += 1;
            if run >= HEAVY_BAR_RUN {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

fn detect_processing(lines: &[&str]) -> bool {
    let last10 = tail(lines, PROCESSING_WINDOW);
    if last10.iter().any(|l| l.chars().any(|c| SPINNER_GLYPHS.contains(&c))) {
        return true;
    }
    if last10.iter().any(|l| has_heavy_bar_run(l)) {
        return true;
    }
    let last5 = tail(lines, STATUS_WORD_WINDOW);
    last5.iter().any(|l| starts_with_status_word(l))
}

fn detect_permission(lines: &[&str]) -> Option<PermissionType> {
    let window = tail(lines, PERMISSION_WINDOW);
    let matched = window.iter().any(|l| permission_re().is_match(l));
    if !matched {
        return None;
    }
    let joined = window.join("\n").to_lowercase();
    if joined.contains("bash") {
        Some(PermissionType::Bash)
    } else if joined.contains("edit") {
        Some(PermissionType::Edit)
    } else if joined.contains("write") {
        Some(PermissionType::Write)
    } else {
        Some(PermissionType::Other)
    }
}

fn detect_waiting(lines: &[&str], has_permission_prompt: bool) -> bool {
    if has_permission_prompt {
        return true;
    }
    let window = tail(lines, PROMPT_WINDOW);
    window.iter().any(|l| {
        let trimmed = l.trim();
        trimmed.starts_with('>')
            || trimmed.starts_with('\u{276f}')
            || IDLE_MARKERS.iter().any(|m| trimmed.contains(m))
    })
}

fn detect_context_limit(lines: &[&str]) -> bool {
    lines.iter().any(|l| l.contains("0% remaining") || context_limit_re().is_match(l))
}

fn detect_error(lines: &[&str]) -> Option<String> {
    let window = tail(lines, ERROR_WINDOW);
    window
        .iter()
        .find(|l| ERROR_PHRASES.iter().any(|p| l.contains(p)))
        .map(|l| l.trim().to_owned())
}

/// Derive a [`TerminalState`] from pane lines.
///
/// Tie-breaks: processing dominates waiting; permission and waiting are only
/// detected on a non-processing pane; the context-limit banner is independent
/// of all of them.
pub fn parse(lines: &[&str]) -> TerminalState {
    let is_processing = detect_processing(lines);

    let permission = if is_processing { None } else { detect_permission(lines) };
    let has_permission_prompt = permission.is_some();

    let is_waiting_for_input =
        !is_processing && detect_waiting(lines, has_permission_prompt);

    TerminalState {
        is_processing,
        is_waiting_for_input,
        has_permission_prompt,
        permission_type: permission,
        has_context_limit: detect_context_limit(lines),
        last_error: detect_error(lines),
    }
}

#[cfg(test)]
#[path = "parse_tests.rs"]
mod tests;
