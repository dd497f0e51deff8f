// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! 65816 assembler - pass driver and line interpreter.
//!
//! Lines are interpreted in order, pass after pass, until a pass completes
//! with every symbol known and nothing asking for another pass. After the
//! first pass a resolver sweep retries deferred equates against the table
//! alone, which settles equate chains without re-running the lines.

pub mod cli;

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use clap::Parser;
use log::{debug, info, warn};

use crate::core::assembler::error::{
    AsmError, AsmErrorKind, AsmRunError, Diagnostic, Severity,
};
use crate::core::expr::{eval_expr, EvalContext, SymbolTableContext, Value};
use crate::core::imagestore::RomImage;
use crate::core::source::{load_source, LineArena, LineId, LineRecord, SourceLine};
use crate::core::symbol_table::{ResolveOutcome, SymbolTable, SymbolTableResult};
use crate::core::text_utils::{decode_escapes, split_data_list, Cursor};
use crate::m65816::handler::{encode_instruction, AssemblerContext, RegisterWidths};
use crate::m65816::instructions::has_mnemonic;
use crate::m65816::operand::OperandWidth;

use cli::{validate_cli, Cli, OutputFormat};

pub const DEFAULT_ROM_SIZE: u32 = 0x8000;
pub const DEFAULT_MAX_PASSES: u32 = 7;
pub const DEFAULT_RESOLVE_BUDGET: u32 = 7;

/// Assembly settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblerConfig {
    pub rom_size: u32,
    /// Fixed ROM base. When unset the first `ORG` of a pass sets it.
    pub rom_base: Option<u32>,
    pub fill_byte: u8,
    pub max_passes: u32,
    /// Rounds of the resolver sweep after the first pass.
    pub resolve_budget: u32,
    pub quiet_pass1_info: bool,
    pub quiet_pass1_warnings: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            rom_size: DEFAULT_ROM_SIZE,
            rom_base: None,
            fill_byte: 0x00,
            max_passes: DEFAULT_MAX_PASSES,
            resolve_budget: DEFAULT_RESOLVE_BUDGET,
            quiet_pass1_info: false,
            quiet_pass1_warnings: false,
        }
    }
}

impl AssemblerConfig {
    pub fn validate(&self) -> Result<(), AsmError> {
        if self.rom_size == 0 {
            return Err(AsmError::new(
                AsmErrorKind::Cli,
                "ROM size must be greater than zero",
                None,
            ));
        }
        if self.max_passes < 2 {
            return Err(AsmError::new(
                AsmErrorKind::Cli,
                "At least two passes are required",
                None,
            ));
        }
        Ok(())
    }

    pub fn message_policy(&self) -> MessagePolicy {
        MessagePolicy {
            quiet_pass1_info: self.quiet_pass1_info,
            quiet_pass1_warnings: self.quiet_pass1_warnings,
        }
    }
}

/// Which messages are suppressed. Pass 1 is noisy with forward references.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessagePolicy {
    pub quiet_pass1_info: bool,
    pub quiet_pass1_warnings: bool,
}

impl MessagePolicy {
    pub fn info_enabled(&self, pass: u32) -> bool {
        !(self.quiet_pass1_info && pass == 1)
    }

    pub fn warn_enabled(&self, pass: u32) -> bool {
        !(self.quiet_pass1_warnings && pass == 1)
    }
}

/// Pass driver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Idle,
    Running(u32),
    ResolvingUnsyms,
    Done,
    Failed,
}

/// Use of a symbol that had no definition yet.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ForwardRef {
    name: String,
    line: LineId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    Org,
    AccumulatorLong,
    AccumulatorShort,
    IndexLong,
    IndexShort,
    Byte,
    Word,
    Equ,
    Rom,
}

fn directive(word: &str) -> Option<Directive> {
    Some(match word.to_ascii_lowercase().as_str() {
        "org" => Directive::Org,
        "al" => Directive::AccumulatorLong,
        "as" => Directive::AccumulatorShort,
        "xl" => Directive::IndexLong,
        "xs" => Directive::IndexShort,
        "byt" | "db" => Directive::Byte,
        "word" | "dw" => Directive::Word,
        "equ" => Directive::Equ,
        "rom" => Directive::Rom,
        _ => return None,
    })
}

/// The assembler state threaded through every pass.
pub struct Assembler {
    config: AssemblerConfig,
    policy: MessagePolicy,
    lines: LineArena,
    symbols: SymbolTable,
    image: RomImage,
    pc: Option<u32>,
    widths: RegisterWidths,
    pass: u32,
    needs_another_pass: bool,
    forward_refs: Vec<ForwardRef>,
    /// Values bound by definitions seen so far in the current pass.
    defined: HashMap<String, Value>,
    warnings: Vec<Diagnostic>,
    state: PassState,
}

impl Assembler {
    pub fn new(config: AssemblerConfig, lines: Vec<SourceLine>) -> Self {
        let image = RomImage::new(
            config.rom_base.unwrap_or(0),
            config.rom_size,
            config.fill_byte,
        );
        Self {
            policy: config.message_policy(),
            config,
            lines: LineArena::new(lines),
            symbols: SymbolTable::new(),
            image,
            pc: None,
            widths: RegisterWidths::default(),
            pass: 0,
            needs_another_pass: false,
            forward_refs: Vec::new(),
            defined: HashMap::new(),
            warnings: Vec::new(),
            state: PassState::Idle,
        }
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn image(&self) -> &RomImage {
        &self.image
    }

    /// Number of passes run so far.
    pub fn passes(&self) -> u32 {
        self.pass
    }

    /// Warnings raised during the final pass.
    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Run passes until the image reaches a fixed point or the pass budget
    /// runs out. On error no image should be written.
    pub fn assemble(&mut self) -> Result<(), AsmRunError> {
        self.config.validate()?;
        let mut pass = 1;
        loop {
            if pass > self.config.max_passes {
                return Err(self.fail_budget());
            }
            self.state = PassState::Running(pass);
            if let Err(err) = self.run_pass(pass) {
                self.state = PassState::Failed;
                return Err(err);
            }

            if pass == 1 {
                self.state = PassState::ResolvingUnsyms;
                if let Err(err) = self.resolve_unresolved() {
                    self.state = PassState::Failed;
                    return Err(err.into());
                }
            }

            if pass >= 2 && !self.needs_another_pass && self.symbols.unresolved_count() == 0 {
                self.state = PassState::Done;
                if self.policy.info_enabled(pass) {
                    info!(
                        "Assembly complete after {pass} passes, ROM ${:06X}..${:06X}",
                        self.image.base(),
                        self.image.end()
                    );
                }
                return Ok(());
            }
            pass += 1;
        }
    }

    fn run_pass(&mut self, pass: u32) -> Result<(), AsmRunError> {
        self.pass = pass;
        self.widths = RegisterWidths::default();
        self.needs_another_pass = false;
        self.pc = None;
        self.forward_refs.clear();
        self.defined.clear();
        self.warnings.clear();
        self.image.clear();

        if self.policy.info_enabled(pass) {
            info!("*** Starting pass #{pass} ***");
        }

        let ids: Vec<LineId> = self.lines.ids().collect();
        for id in ids {
            self.lines.get_mut(id).address = self.pc;
            if let Err(err) = self.interpret_line(id) {
                return Err(self.line_failure(id, err));
            }
        }
        debug!(
            "Pass #{pass} done: {} resolved, {} unresolved, another pass: {}",
            self.symbols.resolved_count(),
            self.symbols.unresolved_count(),
            self.needs_another_pass
        );
        Ok(())
    }

    fn line_failure(&self, id: LineId, err: AsmError) -> AsmRunError {
        let diag = self.diagnostic(id, err.clone());
        AsmRunError::new(err, vec![diag])
    }

    fn diagnostic(&self, id: LineId, err: AsmError) -> Diagnostic {
        let record = self.lines.get(id);
        Diagnostic::new(record.source.line_num, Severity::Error, err)
            .with_file(Some(record.source.file.clone()))
            .with_source(Some(record.source.raw.clone()))
    }

    /// Retry deferred symbols against the table until none are left, no
    /// progress is made, or the round budget is spent.
    fn resolve_unresolved(&mut self) -> Result<(), AsmError> {
        for round in 1..=self.config.resolve_budget {
            if self.symbols.unresolved_count() == 0 {
                break;
            }
            let mut advanced = 0usize;
            for name in self.symbols.unresolved_names() {
                if self.retry_symbol(&name)? == ResolveOutcome::Advanced {
                    debug!("Resolved {name} in sweep round {round}");
                    advanced += 1;
                }
            }
            debug!(
                "Resolver round {round}: {advanced} resolved, {} pending",
                self.symbols.unresolved_count()
            );
            if advanced == 0 {
                break;
            }
        }
        Ok(())
    }

    /// Evaluate a deferred symbol with `$` bound to its defining address.
    fn retry_symbol(&mut self, name: &str) -> Result<ResolveOutcome, AsmError> {
        self.symbols.try_resolve(name, |symbol, table| {
            let mut ctx = SymbolTableContext::with_address(table, symbol.pc);
            let value = eval_expr(&symbol.expression, &mut ctx)?;
            if !ctx.missing().is_empty() {
                debug!("{} waits on undefined {:?}", symbol.name, ctx.missing());
            }
            Ok(value)
        })
    }

    fn fail_budget(&mut self) -> AsmRunError {
        self.state = PassState::Failed;
        for name in self.symbols.unresolved_names() {
            // Best effort so the dump shows as much as possible.
            let _ = self.retry_symbol(&name);
        }
        warn!(
            "Pass budget of {} exhausted, symbol table follows",
            self.config.max_passes
        );
        self.log_symbol_dump();

        if let Some(fref) = self.forward_refs.first() {
            let err = AsmError::new(
                AsmErrorKind::UnknownSymbol,
                "Unresolved symbol",
                Some(&fref.name),
            );
            return AsmRunError::new(err.clone(), vec![self.diagnostic(fref.line, err)]);
        }
        if let Some(name) = self.symbols.unresolved_names().first() {
            let err = AsmError::new(AsmErrorKind::UnknownSymbol, "Unresolved symbol", Some(name));
            return AsmRunError::new(err, Vec::new());
        }
        AsmRunError::new(
            AsmError::new(
                AsmErrorKind::PassBudgetExceeded,
                "Assembly did not converge",
                Some(&format!("{} passes", self.config.max_passes)),
            ),
            Vec::new(),
        )
    }

    pub fn write_symbol_dump<W: Write>(&self, out: W) -> io::Result<()> {
        self.symbols.dump(out)
    }

    pub fn log_symbol_dump(&self) {
        let mut buf = Vec::new();
        if self.symbols.dump(&mut buf).is_ok() {
            info!("Symbol table:");
            for line in String::from_utf8_lossy(&buf).lines() {
                info!("{line}");
            }
        }
    }

    fn interpret_line(&mut self, id: LineId) -> Result<(), AsmError> {
        let text = self.lines.get(id).source.text.clone();
        let mut cursor = Cursor::new(&text);
        loop {
            cursor.skip_ws();
            cursor.skip_sigils();
            let Some(word) = cursor.take_ident() else {
                return match cursor.peek() {
                    None => Ok(()),
                    Some(_) => Err(AsmError::new(
                        AsmErrorKind::Syntax,
                        "Unexpected text",
                        Some(cursor.rest()),
                    )),
                };
            };

            if cursor.peek() == Some(':') {
                cursor.bump();
                self.define_label(id, word)?;
                continue;
            }

            let rest = cursor.rest().trim();
            if let Some(expr) = equate_expression(rest) {
                return self.define_equate(id, word, expr);
            }

            return match directive(word) {
                Some(Directive::Org) => self.set_origin(id, rest),
                Some(Directive::AccumulatorLong) => {
                    self.widths.accumulator16 = true;
                    Ok(())
                }
                Some(Directive::AccumulatorShort) => {
                    self.widths.accumulator16 = false;
                    Ok(())
                }
                Some(Directive::IndexLong) => {
                    self.widths.index16 = true;
                    Ok(())
                }
                Some(Directive::IndexShort) => {
                    self.widths.index16 = false;
                    Ok(())
                }
                Some(Directive::Byte) => self.store_data(id, rest, 1),
                Some(Directive::Word) => self.store_data(id, rest, 2),
                Some(Directive::Equ) => Err(AsmError::new(
                    AsmErrorKind::Directive,
                    "EQU requires a symbol name",
                    None,
                )),
                Some(Directive::Rom) => Ok(()),
                None if has_mnemonic(word) => self.process_instruction(id, word, rest),
                None => Err(AsmError::new(
                    AsmErrorKind::Instruction,
                    "Unknown instruction or directive",
                    Some(word),
                )),
            };
        }
    }

    fn define_label(&mut self, id: LineId, name: &str) -> Result<(), AsmError> {
        let Some(pc) = self.pc else {
            return Err(AsmError::new(
                AsmErrorKind::Directive,
                "Label defined before ORG",
                Some(name),
            ));
        };
        debug!("Label {name} = ${pc:06X}");
        self.define_symbol(id, name, Value::Known(pc), "$")
    }

    fn define_equate(&mut self, id: LineId, name: &str, expr: &str) -> Result<(), AsmError> {
        let value = {
            let mut ctx = self.line_context(id);
            eval_expr(expr, &mut ctx)?
        };
        match value {
            Value::Known(val) => debug!("Equate {name} = ${val:X}"),
            Value::Unresolved => debug!("Equate {name} deferred: {expr}"),
        }
        self.define_symbol(id, name, value, expr)
    }

    fn define_symbol(
        &mut self,
        id: LineId,
        name: &str,
        value: Value,
        expr: &str,
    ) -> Result<(), AsmError> {
        let duplicate = AsmError::new(
            AsmErrorKind::DuplicateSymbol,
            "Symbol defined with a different value",
            Some(name),
        );
        // Two definitions in one pass must agree whatever the pass number.
        if let (Some(Value::Known(earlier)), Value::Known(val)) = (self.defined.get(name), value) {
            if *earlier != val {
                return Err(duplicate);
            }
        }
        if value.known().is_some() || !self.defined.contains_key(name) {
            self.defined.insert(name.to_string(), value);
        }

        let previous = self.symbols.lookup(name);
        let first_pass = self.pass == 1;
        match self.symbols.define(name, value, expr, self.pc, first_pass) {
            SymbolTableResult::Ok => {}
            SymbolTableResult::Duplicate => return Err(duplicate),
        }
        if !first_pass {
            if let (Some(Value::Known(old)), Value::Known(new)) = (previous, value) {
                if old != new {
                    debug!(
                        "{name} moved from ${old:X} to ${new:X} on line {}",
                        self.lines.get(id).source.line_num
                    );
                    self.needs_another_pass = true;
                }
            }
        }
        Ok(())
    }

    fn set_origin(&mut self, id: LineId, expr: &str) -> Result<(), AsmError> {
        let value = {
            let mut ctx = self.line_context(id);
            eval_expr(expr, &mut ctx)?
        };
        let Value::Known(addr) = value else {
            return Err(AsmError::new(
                AsmErrorKind::Directive,
                "ORG address must be known when the line is reached",
                Some(expr),
            ));
        };

        if self.pc.is_none() && self.config.rom_base.is_none() {
            if self.image.base() != addr {
                debug!("ROM base set to ${addr:06X}");
                self.image.rebase(addr);
            }
        } else if addr < self.image.base() || addr > self.image.end() {
            return Err(AsmError::new(
                AsmErrorKind::RomBoundsViolation,
                "ORG directive outside of ROM area",
                Some(&format!(
                    "${addr:06X} not in ${:06X}..${:06X}",
                    self.image.base(),
                    self.image.end()
                )),
            ));
        }
        debug!("ORG ${addr:06X}");
        self.pc = Some(addr);
        Ok(())
    }

    fn process_instruction(
        &mut self,
        id: LineId,
        mnemonic: &str,
        operand: &str,
    ) -> Result<(), AsmError> {
        let bytes = {
            let mut ctx = self.line_context(id);
            encode_instruction(mnemonic, operand, &mut ctx)?
        };
        self.emit(&bytes)
    }

    /// `BYT`/`WORD` lists of expressions and string literals.
    fn store_data(&mut self, id: LineId, list: &str, size: usize) -> Result<(), AsmError> {
        let items = split_data_list(list);
        if items.is_empty() {
            return Err(AsmError::new(
                AsmErrorKind::Directive,
                "Expected data values",
                None,
            ));
        }

        let limit: u32 = if size == 1 { 0xFF } else { 0xFFFF };
        let mut values: Vec<u32> = Vec::new();
        {
            let mut ctx = self.line_context(id);
            for item in items {
                if let Some(body) = item.strip_prefix('"') {
                    let Some(body) = body.strip_suffix('"') else {
                        return Err(AsmError::new(
                            AsmErrorKind::Syntax,
                            "String missing closing quote",
                            Some(item),
                        ));
                    };
                    values.extend(decode_escapes(body).chars().map(|c| c as u32));
                } else {
                    values.push(eval_expr(item, &mut ctx)?.known().unwrap_or(0));
                }
            }
            for val in values.iter().filter(|val| **val > limit) {
                ctx.warn(
                    AsmErrorKind::Directive,
                    &format!("Value ${val:X} outside range [0..${limit:X}]"),
                );
            }
        }

        let mut bytes = Vec::with_capacity(values.len() * size);
        for val in values {
            bytes.extend_from_slice(&val.to_le_bytes()[..size]);
        }
        self.emit(&bytes)
    }

    fn emit(&mut self, bytes: &[u8]) -> Result<(), AsmError> {
        let Some(pc) = self.pc else {
            return Err(AsmError::new(
                AsmErrorKind::RomBoundsViolation,
                "Data placed before ORG",
                None,
            ));
        };
        self.image.store_slice(pc, bytes)?;
        self.pc = Some(pc.wrapping_add(bytes.len() as u32));
        Ok(())
    }

    fn line_context(&mut self, id: LineId) -> LineContext<'_> {
        LineContext {
            symbols: &self.symbols,
            record: self.lines.get_mut(id),
            line: id,
            widths: self.widths,
            pass: self.pass,
            policy: self.policy,
            needs_another_pass: &mut self.needs_another_pass,
            forward_refs: &mut self.forward_refs,
            warnings: &mut self.warnings,
        }
    }
}

/// If `rest` is `EQU expr` (any case, optional sigil), return `expr`.
fn equate_expression(rest: &str) -> Option<&str> {
    let mut cursor = Cursor::new(rest);
    cursor.skip_sigils();
    let word = cursor.take_ident()?;
    if !word.eq_ignore_ascii_case("equ") {
        return None;
    }
    match cursor.peek() {
        Some(c) if !c.is_whitespace() => None,
        _ => Some(cursor.rest().trim()),
    }
}

/// Evaluation and encoding context for one line of one pass.
struct LineContext<'a> {
    symbols: &'a SymbolTable,
    record: &'a mut LineRecord,
    line: LineId,
    widths: RegisterWidths,
    pass: u32,
    policy: MessagePolicy,
    needs_another_pass: &'a mut bool,
    forward_refs: &'a mut Vec<ForwardRef>,
    warnings: &'a mut Vec<Diagnostic>,
}

impl LineContext<'_> {
    fn location(&self) -> String {
        format!(
            "{}:{}: '{}'",
            self.record.source.file, self.record.source.line_num, self.record.source.text
        )
    }
}

impl EvalContext for LineContext<'_> {
    fn lookup_symbol(&mut self, name: &str) -> Value {
        if let Some(value) = self.symbols.lookup(name) {
            return value;
        }
        if self.policy.info_enabled(self.pass) {
            info!(
                "Unknown symbol '{name}', going for another pass ... {}",
                self.location()
            );
        }
        self.forward_refs.push(ForwardRef {
            name: name.to_string(),
            line: self.line,
        });
        *self.needs_another_pass = true;
        Value::Unresolved
    }

    fn probe_symbol(&self, name: &str) -> Option<Value> {
        self.symbols.lookup(name)
    }

    fn current_address(&self) -> Option<u32> {
        self.record.address
    }

    fn defer(&mut self) {
        *self.needs_another_pass = true;
    }
}

impl AssemblerContext for LineContext<'_> {
    fn register_widths(&self) -> RegisterWidths {
        self.widths
    }

    fn mode_hint(&self) -> Option<OperandWidth> {
        self.record.mode_hint
    }

    fn set_mode_hint(&mut self, width: OperandWidth) {
        self.record.mode_hint = Some(width);
    }

    fn warn(&mut self, kind: AsmErrorKind, message: &str) {
        if self.policy.warn_enabled(self.pass) {
            warn!("{message} {}", self.location());
        }
        let source = &self.record.source;
        self.warnings.push(
            Diagnostic::new(
                source.line_num,
                Severity::Warning,
                AsmError::new(kind, message, None),
            )
            .with_file(Some(source.file.clone()))
            .with_source(Some(source.raw.clone())),
        );
    }
}

/// Assemble already-normalized lines.
pub fn assemble_lines(
    config: AssemblerConfig,
    lines: Vec<SourceLine>,
) -> Result<Assembler, AsmRunError> {
    let mut asm = Assembler::new(config, lines);
    asm.assemble()?;
    Ok(asm)
}

/// Load and assemble a source file.
pub fn assemble_file(path: &Path, config: AssemblerConfig) -> Result<Assembler, AsmRunError> {
    let lines = load_source(path)?;
    assemble_lines(config, lines)
}

fn io_error(context: &str, path: &Path, err: io::Error) -> AsmRunError {
    AsmError::new(
        AsmErrorKind::Io,
        context,
        Some(&format!("{}: {err}", path.display())),
    )
    .into()
}

/// Write the ROM image in `format`.
pub fn write_image(asm: &Assembler, path: &Path, format: OutputFormat) -> Result<(), AsmRunError> {
    let file = File::create(path).map_err(|err| io_error("Unable to create output file", path, err))?;
    let mut out = BufWriter::new(file);
    let image = asm.image();
    let result = match format {
        OutputFormat::Bin => image.write_bin_file(&mut out),
        OutputFormat::O64 => image.write_o64_file(&mut out),
        OutputFormat::Hex => image.write_hex_file(&mut out),
    };
    result
        .and_then(|_| out.flush())
        .map_err(|err| io_error("Unable to write output file", path, err))
}

/// Run the assembler with command-line arguments.
pub fn run() -> Result<(), AsmRunError> {
    let cli = Cli::parse();
    let options = validate_cli(&cli)?;

    let asm = assemble_file(&options.input, options.config)?;
    write_image(&asm, &options.output, options.format)?;
    info!(
        "Wrote {} bytes to {} after {} passes",
        asm.image().size(),
        options.output.display(),
        asm.passes()
    );

    match &options.symbols {
        Some(path) => {
            let file = File::create(path)
                .map_err(|err| io_error("Unable to create symbol file", path, err))?;
            let mut out = BufWriter::new(file);
            asm.write_symbol_dump(&mut out)
                .and_then(|_| out.flush())
                .map_err(|err| io_error("Unable to write symbol file", path, err))?;
        }
        None => asm.log_symbol_dump(),
    }
    Ok(())
}
