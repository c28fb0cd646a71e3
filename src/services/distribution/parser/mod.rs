//! Line-level parsing for both rule dialects.
//!
//! Each dialect is a pure function from one line to a `ParseOutcome`. A bad
//! line never fails the file; it comes back as `Unparseable` with a reason.

pub mod skypatcher;
pub mod spid;

use super::rule::{Dialect, DistributionRule};
use crate::services::game_data::FormResolver;
use serde::Serialize;

/// Placeholder for an empty interior SPID field.
pub const PLACEHOLDER: &str = "NONE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LineKind {
    Blank,
    Comment,
    Section,
    /// Understood but outside outfit distribution (other record types,
    /// exclusive groups, add/remove operations).
    KeyValue,
    Rule,
    Unparseable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// Usually one rule; a SkyPatcher line can set both outfit slots.
    Rules(Vec<DistributionRule>),
    Unparseable(String),
    Ignored(LineKind),
}

impl ParseOutcome {
    pub fn kind(&self) -> LineKind {
        match self {
            ParseOutcome::Rules(_) => LineKind::Rule,
            ParseOutcome::Unparseable(_) => LineKind::Unparseable,
            ParseOutcome::Ignored(kind) => *kind,
        }
    }
}

/// Drop a `;` comment tail, or the whole line when it starts with `#`.
pub fn strip_comment(line: &str) -> &str {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        return "";
    }
    match trimmed.find(';') {
        Some(idx) => &trimmed[..idx],
        None => trimmed,
    }
}

pub fn parse_line(
    dialect: Dialect,
    line_number: usize,
    raw: &str,
    resolver: &dyn FormResolver,
) -> ParseOutcome {
    let text = strip_comment(raw).trim();
    if text.is_empty() {
        return if raw.trim().is_empty() {
            ParseOutcome::Ignored(LineKind::Blank)
        } else {
            ParseOutcome::Ignored(LineKind::Comment)
        };
    }
    if text.starts_with('[') && text.ends_with(']') {
        return ParseOutcome::Ignored(LineKind::Section);
    }

    match dialect {
        Dialect::Spid => spid::parse_rule_line(line_number, text, resolver),
        Dialect::SkyPatcher => skypatcher::parse_rule_line(line_number, text, resolver),
    }
}

pub(crate) fn is_placeholder(field: &str) -> bool {
    let field = field.trim();
    field.is_empty() || field.eq_ignore_ascii_case(PLACEHOLDER)
}

#[cfg(test)]
#[path = "tests/parser_tests.rs"]
mod tests;
