// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Placeholder substitution for delivery command templates.
//!
//! Recognised tokens are `{username}`, `{player}` (alias), `{time}` and
//! `{date}`. Anything else, including unknown `{tokens}` and stray braces,
//! passes through untouched. Substitution is a single left-to-right pass, so
//! substituted values are never themselves rescanned.

use blockshop_core::Command;
use chrono::{DateTime, Utc};

/// Values available to a command template.
#[derive(Debug, Clone)]
pub struct TemplateContext<'a> {
    pub username: &'a str,
    pub now: DateTime<Utc>,
}

impl<'a> TemplateContext<'a> {
    pub fn new(username: &'a str, now: DateTime<Utc>) -> Self {
        Self { username, now }
    }

    fn resolve(&self, token: &str) -> Option<String> {
        match token {
            "username" | "player" => Some(self.username.to_string()),
            "time" => Some(self.now.format("%H:%M:%S").to_string()),
            "date" => Some(self.now.format("%Y-%m-%d").to_string()),
            _ => None,
        }
    }
}

/// Replaces every recognised placeholder in `text`.
pub fn substitute(text: &str, ctx: &TemplateContext<'_>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find(['{', '}']) {
            Some(close) if after.as_bytes()[close] == b'}' => {
                match ctx.resolve(&after[..close]) {
                    Some(value) => out.push_str(&value),
                    None => out.push_str(&rest[open..open + close + 2]),
                }
                rest = &after[close + 1..];
            }
            _ => {
                // Unterminated, or another `{` starts first: keep this brace literally.
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// A copy of `command` with the name and every argument substituted.
pub fn substitute_command(command: &Command, ctx: &TemplateContext<'_>) -> Command {
    command.map_text(|text| substitute(text, ctx))
}
