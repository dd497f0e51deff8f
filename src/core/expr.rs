// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Expression evaluation.
//!
//! Two surface syntaxes share one atom parser: a left-to-right infix form
//! without precedence (`a + b * c` is `(a + b) * c`) and a brace-delimited
//! postfix form (`{ a b + }`). Every value lives in a 32-bit wrapping
//! domain. Any atom that is not yet known short-circuits the whole
//! expression to [`Value::Unresolved`].

use crate::core::assembler::error::{AsmError, AsmErrorKind};
use crate::core::symbol_table::SymbolTable;
use crate::core::text_utils::{decode_escapes, is_symbol_name};

/// Result of evaluating an expression or looking up a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Known(u32),
    Unresolved,
}

impl Value {
    pub fn known(self) -> Option<u32> {
        match self {
            Value::Known(val) => Some(val),
            Value::Unresolved => None,
        }
    }

    pub fn map(self, f: impl FnOnce(u32) -> u32) -> Value {
        match self {
            Value::Known(val) => Value::Known(f(val)),
            Value::Unresolved => Value::Unresolved,
        }
    }
}

/// Context for expression evaluation.
///
/// Provides symbol values and the current address (`$`), and collects the
/// "needs another pass" signal raised by forward references.
pub trait EvalContext {
    /// Look up a symbol used as a value. A miss is a forward reference: the
    /// context records it and returns [`Value::Unresolved`].
    fn lookup_symbol(&mut self, name: &str) -> Value;

    /// Silent existence probe; a miss records nothing.
    fn probe_symbol(&self, name: &str) -> Option<Value>;

    /// Get the current address (`$`).
    fn current_address(&self) -> Option<u32>;

    /// Called when an expression collapsed to [`Value::Unresolved`].
    fn defer(&mut self);
}

/// Evaluation against a bare symbol table, used by the resolver sweep.
pub struct SymbolTableContext<'a> {
    symbols: &'a SymbolTable,
    addr: Option<u32>,
    deferred: bool,
    missing: Vec<String>,
}

impl<'a> SymbolTableContext<'a> {
    pub fn new(symbols: &'a SymbolTable) -> Self {
        Self::with_address(symbols, None)
    }

    pub fn with_address(symbols: &'a SymbolTable, addr: Option<u32>) -> Self {
        Self {
            symbols,
            addr,
            deferred: false,
            missing: Vec::new(),
        }
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// Names looked up but absent from the table, in lookup order.
    pub fn missing(&self) -> &[String] {
        &self.missing
    }
}

impl EvalContext for SymbolTableContext<'_> {
    fn lookup_symbol(&mut self, name: &str) -> Value {
        match self.symbols.lookup(name) {
            Some(value) => value,
            None => {
                self.missing.push(name.to_string());
                self.deferred = true;
                Value::Unresolved
            }
        }
    }

    fn probe_symbol(&self, name: &str) -> Option<Value> {
        self.symbols.lookup(name)
    }

    fn current_address(&self) -> Option<u32> {
        self.addr
    }

    fn defer(&mut self) {
        self.deferred = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    Or,
    And,
    Xor,
}

impl BinOp {
    fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            "/" => BinOp::Div,
            "%" => BinOp::Mod,
            "<<" => BinOp::Shl,
            ">>" => BinOp::Shr,
            "|" => BinOp::Or,
            "&" => BinOp::And,
            "^" => BinOp::Xor,
            _ => return None,
        })
    }

    fn apply(self, lhs: u32, rhs: u32) -> Result<u32, AsmError> {
        Ok(match self {
            BinOp::Add => lhs.wrapping_add(rhs),
            BinOp::Sub => lhs.wrapping_sub(rhs),
            BinOp::Mul => lhs.wrapping_mul(rhs),
            BinOp::Div | BinOp::Mod if rhs == 0 => {
                return Err(AsmError::new(AsmErrorKind::Syntax, "Division by zero", None));
            }
            BinOp::Div => lhs / rhs,
            BinOp::Mod => lhs % rhs,
            BinOp::Shl => lhs.checked_shl(rhs).unwrap_or(0),
            BinOp::Shr => lhs.checked_shr(rhs).unwrap_or(0),
            BinOp::Or => lhs | rhs,
            BinOp::And => lhs & rhs,
            BinOp::Xor => lhs ^ rhs,
        })
    }
}

fn syntax(msg: &str, param: &str) -> AsmError {
    AsmError::new(AsmErrorKind::Syntax, msg, Some(param))
}

fn unterminated(text: &str) -> AsmError {
    AsmError::new(
        AsmErrorKind::UnterminatedExpression,
        "Expression missing terminating character",
        Some(text),
    )
}

/// Evaluate an operand expression.
pub fn eval_expr(text: &str, ctx: &mut dyn EvalContext) -> Result<Value, AsmError> {
    eval_infix(text, false, ctx)
}

/// Evaluate an infix expression.
///
/// With `starts_with_paren` the text is a complete `( ... )` group whose
/// outer pair is consumed here rather than by the scanner.
pub fn eval_infix(
    text: &str,
    starts_with_paren: bool,
    ctx: &mut dyn EvalContext,
) -> Result<Value, AsmError> {
    let text = text.trim();
    if let Some(value) = ctx.probe_symbol(text) {
        if value == Value::Unresolved {
            ctx.defer();
        }
        return Ok(value);
    }

    let body = if starts_with_paren {
        if !text.starts_with('(') {
            return Err(unterminated(text));
        }
        match find_close(text, 0, b'(', b')') {
            Some(close) if close == text.len() - 1 => &text[1..close],
            _ => return Err(unterminated(text)),
        }
    } else {
        text
    };

    let mut scan = InfixScan {
        acc: 0,
        op: None,
        term: String::new(),
        group: None,
    };

    let bytes = body.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        let c = bytes[i];
        let next = bytes.get(i + 1).copied();
        match c {
            _ if c.is_ascii_whitespace() => i += 1,
            b'<' | b'>' if next == Some(c) => {
                let op = if c == b'<' { BinOp::Shl } else { BinOp::Shr };
                if scan.flush(Some(op), ctx)?.is_none() {
                    return Ok(Value::Unresolved);
                }
                i += 2;
            }
            b'+' | b'-' | b'*' | b'/' => {
                if scan.flush(BinOp::from_token(&body[i..=i]), ctx)?.is_none() {
                    return Ok(Value::Unresolved);
                }
                i += 1;
            }
            b'%' | b'|' | b'&' | b'^' if next.map_or(true, |n| n.is_ascii_whitespace()) => {
                if scan.flush(BinOp::from_token(&body[i..=i]), ctx)?.is_none() {
                    return Ok(Value::Unresolved);
                }
                i += 1;
            }
            b'\'' | b'"' => {
                let end = find_quote_end(body, i).ok_or_else(|| {
                    syntax("Expression missing closing character", body)
                })?;
                scan.term.push_str(&body[i..=end]);
                i = end + 1;
            }
            b'(' => {
                let close = find_close(body, i, b'(', b')').ok_or_else(|| unterminated(body))?;
                let value = eval_infix(&body[i..=close], true, ctx)?;
                if !scan.set_group(value, body)? {
                    ctx.defer();
                    return Ok(Value::Unresolved);
                }
                i = close + 1;
            }
            b'{' => {
                let close = find_close(body, i, b'{', b'}').ok_or_else(|| unterminated(body))?;
                let value = eval_postfix(&body[i + 1..close], ctx)?;
                if !scan.set_group(value, body)? {
                    ctx.defer();
                    return Ok(Value::Unresolved);
                }
                i = close + 1;
            }
            b')' | b'}' => return Err(unterminated(body)),
            _ => {
                let ch = body[i..].chars().next().unwrap_or(' ');
                scan.term.push(ch);
                i += ch.len_utf8();
            }
        }
    }

    match scan.flush(None, ctx)? {
        Some(acc) => Ok(Value::Known(acc)),
        None => Ok(Value::Unresolved),
    }
}

/// Running state of the left-to-right infix scan.
struct InfixScan {
    acc: u32,
    op: Option<BinOp>,
    term: String,
    /// Value of a just-closed `( )` or `{ }` group.
    group: Option<u32>,
}

impl InfixScan {
    /// Fold the pending term into the accumulator and stage `next_op`.
    /// Returns `None` once the expression collapsed to unresolved.
    fn flush(
        &mut self,
        next_op: Option<BinOp>,
        ctx: &mut dyn EvalContext,
    ) -> Result<Option<u32>, AsmError> {
        let operand = match (self.group.take(), self.term.is_empty()) {
            (None, true) => None,
            (Some(val), true) => Some(val),
            (None, false) => match parse_atom(&self.term, ctx)? {
                Value::Known(val) => Some(val),
                Value::Unresolved => {
                    ctx.defer();
                    return Ok(None);
                }
            },
            (Some(_), false) => {
                return Err(syntax("Unexpected text after sub-expression", &self.term));
            }
        };
        if let Some(val) = operand {
            self.acc = match self.op {
                Some(op) => op.apply(self.acc, val)?,
                None => val,
            };
        }
        self.term.clear();
        if next_op.is_some() {
            self.op = next_op;
        }
        Ok(Some(self.acc))
    }

    /// Stage a group value, applying a byte-select prefix typed just before
    /// it. Returns false when the group was unresolved.
    fn set_group(&mut self, value: Value, text: &str) -> Result<bool, AsmError> {
        let Value::Known(val) = value else {
            return Ok(false);
        };
        let val = match self.term.as_str() {
            "" => val,
            "<" => val & 0xFF,
            ">" => (val >> 8) & 0xFF,
            "^" => (val >> 16) & 0xFF,
            _ => return Err(syntax("Invalid number format", text)),
        };
        self.term.clear();
        self.group = Some(val);
        Ok(true)
    }
}

/// Evaluate the inside of a `{ ... }` postfix group.
pub fn eval_postfix(text: &str, ctx: &mut dyn EvalContext) -> Result<Value, AsmError> {
    let mut stack: Vec<u32> = Vec::new();
    for token in postfix_tokens(text)? {
        if let Some(op) = BinOp::from_token(token) {
            let (first, second) = match (stack.pop(), stack.pop()) {
                (Some(first), Some(second)) => (first, second),
                _ => return Err(syntax("Missing value or extra operation", text.trim())),
            };
            stack.push(op.apply(second, first)?);
            continue;
        }
        let value = if token.starts_with('{') {
            eval_postfix(&token[1..token.len() - 1], ctx)?
        } else {
            eval_infix(token, token.starts_with('('), ctx)?
        };
        match value {
            Value::Known(val) => stack.push(val),
            Value::Unresolved => {
                ctx.defer();
                return Ok(Value::Unresolved);
            }
        }
    }
    match stack.len() {
        1 => Ok(Value::Known(stack[0])),
        0 => Err(syntax("Expected operand", text.trim())),
        _ => Err(AsmError::new(
            AsmErrorKind::TrailingOperands,
            "Extra values in expression",
            Some(text.trim()),
        )),
    }
}

/// Split postfix text on whitespace, keeping bracketed groups and quoted
/// literals whole.
fn postfix_tokens(text: &str) -> Result<Vec<&str>, AsmError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0usize;
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        match c {
            b'(' => i = find_close(text, i, b'(', b')').ok_or_else(|| unterminated(text))? + 1,
            b'{' => i = find_close(text, i, b'{', b'}').ok_or_else(|| unterminated(text))? + 1,
            b')' | b'}' => return Err(unterminated(text)),
            _ => {
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                    match bytes[i] {
                        b'\'' | b'"' => {
                            i = find_quote_end(text, i).ok_or_else(|| {
                                syntax("Expression missing closing character", text)
                            })? + 1;
                        }
                        b'(' | b'{' | b')' | b'}' => return Err(unterminated(text)),
                        _ => i += 1,
                    }
                }
            }
        }
        tokens.push(&text[start..i]);
    }
    Ok(tokens)
}

/// Index of the bracket closing the one at `open_idx`, skipping quotes.
fn find_close(text: &str, open_idx: usize, open: u8, close: u8) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = open_idx;
    while i < bytes.len() {
        let c = bytes[i];
        if c == b'\'' || c == b'"' {
            i = find_quote_end(text, i)?;
        } else if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

/// Index of the quote closing the one at `start`.
fn find_quote_end(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            c if c == quote => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Parse a single atom: optional byte selector, then a literal, `$` or a
/// symbol name.
pub fn parse_atom(text: &str, ctx: &mut dyn EvalContext) -> Result<Value, AsmError> {
    let text = text.trim();
    let (shift, mask, body) = match text.chars().next() {
        Some('<') => (0, 0xFF, &text[1..]),
        Some('>') => (8, 0xFF, &text[1..]),
        Some('^') => (16, 0xFF, &text[1..]),
        Some(_) => (0, u32::MAX, text),
        None => return Err(AsmError::new(AsmErrorKind::Syntax, "Expected operand", None)),
    };
    if body.is_empty() {
        return Err(syntax("Expected operand", text));
    }

    let value = match body.as_bytes()[0] {
        b'0'..=b'9' => Value::Known(parse_radix(body, 10, text)?),
        b'$' if body.len() == 1 => match ctx.current_address() {
            Some(pc) => Value::Known(pc),
            None => return Err(syntax("Location counter is not set", text)),
        },
        b'$' => Value::Known(parse_radix(&body[1..], 16, text)?),
        b'%' => Value::Known(parse_radix(&body[1..], 2, text)?),
        b'&' => Value::Known(parse_radix(&body[1..], 8, text)?),
        b'\'' | b'"' => Value::Known(parse_char(body, text)?),
        _ if is_symbol_name(body) => ctx.lookup_symbol(body),
        _ => return Err(syntax("Invalid number format", text)),
    };
    Ok(value.map(|val| (val >> shift) & mask))
}

fn parse_radix(digits: &str, radix: u32, text: &str) -> Result<u32, AsmError> {
    u32::from_str_radix(digits, radix).map_err(|_| syntax("Invalid number format", text))
}

fn parse_char(body: &str, text: &str) -> Result<u32, AsmError> {
    let quote = body.as_bytes()[0];
    if body.len() < 3 || body.as_bytes()[body.len() - 1] != quote {
        return Err(syntax("Expression missing closing character", text));
    }
    decode_escapes(&body[1..body.len() - 1])
        .chars()
        .next()
        .map(|c| c as u32)
        .ok_or_else(|| syntax("Expected operand", text))
}
