// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Source lines with provenance, and the per-line records the passes share.
//!
//! The loader here only strips comments and blank lines. Inclusion,
//! defines and conditionals belong to a separate preprocessing step.

use std::fs;
use std::path::Path;

use crate::core::assembler::error::{AsmError, AsmErrorKind};
use crate::core::text_utils::{split_comment, strip_line_comment};
use crate::m65816::operand::OperandWidth;

/// One normalized line handed to the passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub file: String,
    pub line_num: u32,
    /// Text as written in the file.
    pub raw: String,
    /// Comment-free text the assembler interprets.
    pub text: String,
}

impl SourceLine {
    pub fn new(file: &str, line_num: u32, raw: &str, text: &str) -> Self {
        Self {
            file: file.to_string(),
            line_num,
            raw: raw.to_string(),
            text: text.to_string(),
        }
    }
}

/// Stable index of a line; the same across every pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineId(pub usize);

/// A source line plus the state the passes attach to it.
#[derive(Debug, Clone)]
pub struct LineRecord {
    pub source: SourceLine,
    /// Location counter at the start of the line, refreshed every pass.
    pub address: Option<u32>,
    /// Operand width guessed for an unresolved value. Never cleared.
    pub mode_hint: Option<OperandWidth>,
}

impl LineRecord {
    pub fn new(source: SourceLine) -> Self {
        Self {
            source,
            address: None,
            mode_hint: None,
        }
    }
}

/// Arena of line records indexed by [`LineId`].
#[derive(Debug, Clone, Default)]
pub struct LineArena {
    records: Vec<LineRecord>,
}

impl LineArena {
    pub fn new(lines: Vec<SourceLine>) -> Self {
        Self {
            records: lines.into_iter().map(LineRecord::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = LineId> {
        (0..self.records.len()).map(LineId)
    }

    pub fn get(&self, id: LineId) -> &LineRecord {
        &self.records[id.0]
    }

    pub fn get_mut(&mut self, id: LineId) -> &mut LineRecord {
        &mut self.records[id.0]
    }
}

/// Read and normalize a source file.
pub fn load_source(path: &Path) -> Result<Vec<SourceLine>, AsmError> {
    let text = fs::read_to_string(path).map_err(|err| {
        AsmError::new(
            AsmErrorKind::Io,
            "Unable to read source file",
            Some(&format!("{}: {err}", path.display())),
        )
    })?;
    Ok(normalize_source(&path.display().to_string(), &text))
}

/// Strip comments and blank lines, keeping original line numbers.
///
/// `;` and `//` comments end at the line end. A `/*` block must open at
/// the start of a line and closes on a line that starts or ends with `*/`.
pub fn normalize_source(file: &str, text: &str) -> Vec<SourceLine> {
    let mut lines = Vec::new();
    let mut in_block = false;
    for (idx, raw) in text.lines().enumerate() {
        let line_num = idx as u32 + 1;
        let trimmed = raw.trim();
        if in_block {
            if trimmed.starts_with("*/") || trimmed.ends_with("*/") {
                in_block = false;
            }
            continue;
        }
        if trimmed.starts_with("/*") {
            in_block = !trimmed.ends_with("*/") || trimmed.len() < 4;
            continue;
        }
        let (code, _) = split_comment(raw);
        let code = strip_line_comment(code).trim();
        if code.is_empty() {
            continue;
        }
        lines.push(SourceLine::new(file, line_num, raw, code));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_comments_and_keeps_line_numbers() {
        let text = "; header\n\n  lda #1 ; load\n// note\nsta $10 // store\nbyt \"a;b\"\n";
        let lines = normalize_source("main.asm", text);
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["lda #1", "sta $10", "byt \"a;b\""]);
        assert_eq!(lines[0].line_num, 3);
        assert_eq!(lines[0].raw, "  lda #1 ; load");
        assert_eq!(lines[2].line_num, 6);
        assert_eq!(lines[1].file, "main.asm");
    }

    #[test]
    fn skips_block_comments() {
        let text = "/* one line */\nnop\n/*\nlda #1\n*/\nrts\n/* open\nstill comment */\nclc\n";
        let lines = normalize_source("x", text);
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["nop", "rts", "clc"]);
    }

    #[test]
    fn arena_ids_are_stable() {
        let mut arena = LineArena::new(normalize_source("x", "nop\nrts\n"));
        assert_eq!(arena.len(), 2);
        let ids: Vec<LineId> = arena.ids().collect();
        assert_eq!(ids, vec![LineId(0), LineId(1)]);
        arena.get_mut(LineId(1)).mode_hint = Some(OperandWidth::Absolute);
        assert_eq!(arena.get(LineId(1)).mode_hint, Some(OperandWidth::Absolute));
        assert_eq!(arena.get(LineId(0)).source.text, "nop");
    }
}
