// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Error types, diagnostics, and reporting for the assembler.

use std::fmt;

/// Categories of assembler errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsmErrorKind {
    /// Malformed literal or expression.
    Syntax,
    /// Brace or parenthesis imbalance.
    UnterminatedExpression,
    /// More than one value left on a postfix stack.
    TrailingOperands,
    /// Symbol not yet known; only fatal once the pass budget runs out.
    UnknownSymbol,
    DuplicateSymbol,
    InvalidAddressingMode,
    BranchOutOfRange,
    RomBoundsViolation,
    PassBudgetExceeded,
    Directive,
    Instruction,
    Io,
    Cli,
}

impl AsmErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AsmErrorKind::Syntax => "SyntaxError",
            AsmErrorKind::UnterminatedExpression => "UnterminatedExpression",
            AsmErrorKind::TrailingOperands => "TrailingOperands",
            AsmErrorKind::UnknownSymbol => "UnknownSymbol",
            AsmErrorKind::DuplicateSymbol => "DuplicateSymbol",
            AsmErrorKind::InvalidAddressingMode => "InvalidAddressingMode",
            AsmErrorKind::BranchOutOfRange => "BranchOutOfRange",
            AsmErrorKind::RomBoundsViolation => "RomBoundsViolation",
            AsmErrorKind::PassBudgetExceeded => "PassBudgetExceeded",
            AsmErrorKind::Directive => "DirectiveError",
            AsmErrorKind::Instruction => "InstructionError",
            AsmErrorKind::Io => "IoError",
            AsmErrorKind::Cli => "CliError",
        }
    }
}

/// An assembler error with a kind and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsmError {
    kind: AsmErrorKind,
    message: String,
}

impl AsmError {
    pub fn new(kind: AsmErrorKind, msg: &str, param: Option<&str>) -> Self {
        Self {
            kind,
            message: format_error(msg, param),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> AsmErrorKind {
        self.kind
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for AsmError {}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A diagnostic message with location and context.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub(crate) line: u32,
    pub(crate) severity: Severity,
    pub(crate) error: AsmError,
    pub(crate) file: Option<String>,
    pub(crate) source: Option<String>,
}

impl Diagnostic {
    pub fn new(line: u32, severity: Severity, error: AsmError) -> Self {
        Self {
            line,
            severity,
            error,
            file: None,
            source: None,
        }
    }

    pub fn with_file(mut self, file: Option<String>) -> Self {
        self.file = file;
        self
    }

    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn error(&self) -> &AsmError {
        &self.error
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn format(&self) -> String {
        format!(
            "{}: {} - {}",
            self.line,
            severity_label(self.severity),
            self.error
        )
    }

    pub fn format_with_context(&self) -> String {
        let sev = severity_label(self.severity);
        let header = match &self.file {
            Some(file) => format!("{file}:{}: {sev}", self.line),
            None => format!("{}: {sev}", self.line),
        };

        let mut out = String::new();
        out.push_str(&header);
        out.push('\n');
        for line in build_context_lines(self.line, self.source.as_deref()) {
            out.push_str(&line);
            out.push('\n');
        }
        out.push_str(&format!("{sev}: {}", self.error));
        out
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Warning => "WARNING",
        Severity::Error => "ERROR",
    }
}

/// Error from a failed assembly run. No output image is produced.
#[derive(Debug)]
pub struct AsmRunError {
    error: AsmError,
    diagnostics: Vec<Diagnostic>,
}

impl AsmRunError {
    pub fn new(error: AsmError, diagnostics: Vec<Diagnostic>) -> Self {
        Self { error, diagnostics }
    }

    pub fn error(&self) -> &AsmError {
        &self.error
    }

    pub fn kind(&self) -> AsmErrorKind {
        self.error.kind()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

impl From<AsmError> for AsmRunError {
    fn from(error: AsmError) -> Self {
        Self::new(error, Vec::new())
    }
}

impl fmt::Display for AsmRunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for AsmRunError {}

/// Build context lines for error display.
pub fn build_context_lines(line_num: u32, source: Option<&str>) -> Vec<String> {
    match source {
        Some(source) => vec![format!("{:>5} | {}", line_num, source)],
        None => vec![format!("{:>5} | <source unavailable>", line_num)],
    }
}

/// Format an error message with an optional parameter.
pub fn format_error(msg: &str, param: Option<&str>) -> String {
    match param {
        Some(p) => format!("{msg}: {p}"),
        None => msg.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_format_includes_line_and_severity() {
        let err = AsmError::new(AsmErrorKind::Syntax, "Bad thing", None);
        let diag = Diagnostic::new(12, Severity::Error, err);
        assert_eq!(diag.format(), "12: ERROR - SyntaxError: Bad thing");
    }

    #[test]
    fn context_format_names_file_and_source() {
        let err = AsmError::new(AsmErrorKind::BranchOutOfRange, "Branch out of range", Some("+0x80"));
        let diag = Diagnostic::new(3, Severity::Error, err)
            .with_file(Some("main.asm".to_string()))
            .with_source(Some("bne far".to_string()));
        let text = diag.format_with_context();
        assert!(text.starts_with("main.asm:3: ERROR\n"));
        assert!(text.contains("    3 | bne far"));
        assert!(text.ends_with("ERROR: BranchOutOfRange: Branch out of range: +0x80"));
    }
}
