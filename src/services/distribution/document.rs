//! Distribution files: raw lines, their classification, and parsed rules.

use super::parser::{self, LineKind, ParseOutcome};
use super::rule::{Dialect, DistributionRule, LineDiagnostic};
use crate::services::game_data::FormResolver;
use crate::types::errors::{EngineError, EngineResult};
use serde::Serialize;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextEncoding {
    Utf8,
    /// Not valid UTF-8; decoded as Windows-1252.
    Windows1252,
}

/// File contents after BOM and encoding handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub had_bom: bool,
    pub encoding: TextEncoding,
}

pub fn decode_rule_bytes(bytes: &[u8]) -> DecodedText {
    let had_bom = bytes.starts_with(&UTF8_BOM);
    let content = if had_bom { &bytes[3..] } else { bytes };

    match std::str::from_utf8(content) {
        Ok(text) => DecodedText {
            text: text.to_string(),
            had_bom,
            encoding: TextEncoding::Utf8,
        },
        Err(_) => {
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(content);
            DecodedText {
                text: text.into_owned(),
                had_bom,
                encoding: TextEncoding::Windows1252,
            }
        }
    }
}

pub fn read_rule_text(path: &Path) -> EngineResult<DecodedText> {
    if !path.exists() {
        return Err(EngineError::MissingPath(path.to_path_buf()));
    }
    let bytes = fs::read(path).map_err(|e| EngineError::io(path, e))?;
    Ok(decode_rule_bytes(&bytes))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLine {
    pub number: usize,
    pub raw: String,
    pub kind: LineKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionFile {
    pub path: PathBuf,
    pub file_name: String,
    pub dialect: Dialect,
    pub lines: Vec<SourceLine>,
    pub rules: Vec<DistributionRule>,
    pub diagnostics: Vec<LineDiagnostic>,
    pub encoding: TextEncoding,
}

impl DistributionFile {
    /// Parse text already in memory. Line numbers start at 1.
    pub fn parse(
        path: impl Into<PathBuf>,
        dialect: Dialect,
        text: &str,
        resolver: &dyn FormResolver,
    ) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut lines = Vec::new();
        let mut rules = Vec::new();
        let mut diagnostics = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let number = idx + 1;
            let outcome = parser::parse_line(dialect, number, raw, resolver);
            let kind = outcome.kind();
            match outcome {
                ParseOutcome::Rules(parsed) => rules.extend(parsed),
                ParseOutcome::Unparseable(reason) => diagnostics.push(LineDiagnostic {
                    line_number: number,
                    raw: raw.to_string(),
                    reason,
                }),
                ParseOutcome::Ignored(_) => {}
            }
            lines.push(SourceLine {
                number,
                raw: raw.to_string(),
                kind,
            });
        }

        if !diagnostics.is_empty() {
            log::warn!(
                "{}: {} unparseable line(s)",
                file_name,
                diagnostics.len()
            );
        }

        Self {
            path,
            file_name,
            dialect,
            lines,
            rules,
            diagnostics,
            encoding: TextEncoding::Utf8,
        }
    }

    pub fn load(path: &Path, dialect: Dialect, resolver: &dyn FormResolver) -> EngineResult<Self> {
        let decoded = read_rule_text(path)?;
        if decoded.encoding != TextEncoding::Utf8 {
            log::debug!("{} is not UTF-8, read as Windows-1252", path.display());
        }
        let mut file = Self::parse(path, dialect, &decoded.text, resolver);
        file.encoding = decoded.encoding;
        Ok(file)
    }

    pub fn unparseable_count(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn count_lines(&self, kind: LineKind) -> usize {
        self.lines.iter().filter(|line| line.kind == kind).count()
    }

    /// Position key: dialect tier first, then case-insensitive file name.
    pub fn load_order_key(&self) -> (u8, String) {
        (self.dialect.tier(), self.file_name.to_lowercase())
    }
}

pub fn compare_load_order(a: &DistributionFile, b: &DistributionFile) -> Ordering {
    a.load_order_key()
        .cmp(&b.load_order_key())
        .then_with(|| a.path.cmp(&b.path))
}

/// Sort into processing order. Stable, so equal keys keep discovery order.
pub fn sort_load_order(files: &mut [DistributionFile]) {
    files.sort_by(compare_load_order);
}

#[cfg(test)]
#[path = "tests/document_tests.rs"]
mod tests;
