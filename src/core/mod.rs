// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! CPU-agnostic assembler core.
//!
//! # Components
//!
//! - [`text_utils`] - Text processing utilities (cursor, identifiers, comments)
//! - [`source`] - Source loading and per-line records
//! - [`expr`] - Infix and postfix expression evaluation
//! - [`symbol_table`] - Resolved and deferred symbols
//! - [`imagestore`] - ROM image and bin/o64/hex output
//! - [`assembler`] - Errors and diagnostics

pub mod assembler;
pub mod expr;
pub mod imagestore;
pub mod source;
pub mod symbol_table;
pub mod text_utils;

// Re-exports for convenience
pub use assembler::error::{AsmError, AsmErrorKind, AsmRunError, Diagnostic, Severity};
pub use expr::{eval_expr, EvalContext, SymbolTableContext, Value};
pub use imagestore::RomImage;
pub use source::{load_source, normalize_source, SourceLine};
pub use symbol_table::SymbolTable;
