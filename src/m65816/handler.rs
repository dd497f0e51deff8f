// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! 65816 instruction encoder.
//!
//! Dispatch is syntactic first (empty, `#`, indirect, indexed, block move)
//! and then by operand value. An operand whose value is not yet known gets
//! a width chosen once and remembered for the line, so instruction lengths
//! stay put while later passes fill in the values.

use crate::core::assembler::error::{AsmError, AsmErrorKind};
use crate::core::expr::{eval_expr, EvalContext, Value};
use crate::m65816::instructions::{has_mnemonic, immediate_class, opcode, ImmediateClass};
use crate::m65816::operand::{
    classify_direct, classify_operand, AddressMode, AddressShape, OperandSyntax, OperandWidth,
};

/// Accumulator and index register widths set by `AL`/`AS` and `XL`/`XS`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterWidths {
    pub accumulator16: bool,
    pub index16: bool,
}

/// Assembler state the encoder needs beyond expression evaluation.
pub trait AssemblerContext: EvalContext {
    fn register_widths(&self) -> RegisterWidths;

    /// Width remembered for the current line.
    fn mode_hint(&self) -> Option<OperandWidth>;

    fn set_mode_hint(&mut self, width: OperandWidth);

    fn warn(&mut self, kind: AsmErrorKind, message: &str);
}

fn invalid_mode(mnemonic: &str, operand: &str) -> AsmError {
    AsmError::new(
        AsmErrorKind::InvalidAddressingMode,
        "Invalid addressing mode",
        Some(&format!("{mnemonic} {operand}").trim_end().to_string()),
    )
}

/// Encode one instruction into opcode and operand bytes.
pub fn encode_instruction<C: AssemblerContext>(
    mnemonic: &str,
    operand: &str,
    ctx: &mut C,
) -> Result<Vec<u8>, AsmError> {
    let upper = mnemonic.to_ascii_uppercase();
    if !has_mnemonic(&upper) {
        return Err(AsmError::new(
            AsmErrorKind::Instruction,
            "Unknown instruction",
            Some(mnemonic),
        ));
    }
    let operand = operand.trim();

    let implied = opcode(&upper, AddressMode::Implied);
    if operand.is_empty() || (implied.is_some() && operand.eq_ignore_ascii_case("A")) {
        return implied
            .map(|op| vec![op])
            .ok_or_else(|| invalid_mode(&upper, operand));
    }

    if let Some(op) = opcode(&upper, AddressMode::Relative) {
        return encode_branch(op, AddressMode::Relative, operand, ctx);
    }
    if let Some(op) = opcode(&upper, AddressMode::RelativeLong) {
        return encode_branch(op, AddressMode::RelativeLong, operand, ctx);
    }

    match classify_operand(operand) {
        OperandSyntax::Empty => Err(invalid_mode(&upper, operand)),
        OperandSyntax::Immediate(expr) => encode_immediate(&upper, expr, operand, ctx),
        OperandSyntax::Address { shape, expr } => encode_address(&upper, shape, expr, operand, ctx),
        OperandSyntax::BlockMove { src, dst } => encode_block_move(&upper, src, dst, operand, ctx),
        OperandSyntax::UnmatchedIndirect(text) => {
            ctx.warn(
                AsmErrorKind::InvalidAddressingMode,
                &format!("Potentially invalid addressing mode: {upper} {text}"),
            );
            match classify_direct(text) {
                OperandSyntax::Address { shape, expr } => {
                    encode_address(&upper, shape, expr, operand, ctx)
                }
                OperandSyntax::BlockMove { src, dst } => {
                    encode_block_move(&upper, src, dst, operand, ctx)
                }
                _ => Err(invalid_mode(&upper, operand)),
            }
        }
        OperandSyntax::BadIndirectLong(_) => Err(invalid_mode(&upper, operand)),
    }
}

fn encode_branch<C: AssemblerContext>(
    op: u8,
    mode: AddressMode,
    operand: &str,
    ctx: &mut C,
) -> Result<Vec<u8>, AsmError> {
    let pc = ctx.current_address().ok_or_else(|| {
        AsmError::new(AsmErrorKind::Directive, "Instruction before ORG", None)
    })?;
    let from = pc.wrapping_add(1 + mode.operand_size() as u32);
    // An unknown target encodes as a zero offset until a later pass.
    let to = eval_expr(operand, ctx)?.known().unwrap_or(from);
    let offset = to as i64 - from as i64;

    let (low, high) = match mode {
        AddressMode::RelativeLong => (-0x8000i64, 0x7FFFi64),
        _ => (-0x80i64, 0x7Fi64),
    };
    if offset < low || offset > high {
        let sign = if offset < 0 { "-" } else { "+" };
        return Err(AsmError::new(
            AsmErrorKind::BranchOutOfRange,
            "Branch out of range",
            Some(&format!("{sign}0x{:X} from ${from:06X}", offset.unsigned_abs())),
        ));
    }

    let offset = offset as u16;
    let mut bytes = vec![op, offset as u8];
    if mode == AddressMode::RelativeLong {
        bytes.push((offset >> 8) as u8);
    }
    Ok(bytes)
}

fn encode_immediate<C: AssemblerContext>(
    mnemonic: &str,
    expr: &str,
    operand: &str,
    ctx: &mut C,
) -> Result<Vec<u8>, AsmError> {
    let op = opcode(mnemonic, AddressMode::Immediate)
        .ok_or_else(|| invalid_mode(mnemonic, operand))?;
    let val = eval_expr(expr, ctx)?.known().unwrap_or(0);
    let widths = ctx.register_widths();
    let wide = match immediate_class(mnemonic) {
        ImmediateClass::Accumulator => widths.accumulator16,
        ImmediateClass::Index => widths.index16,
        ImmediateClass::Fixed => false,
    };

    if wide {
        if val > 0xFFFF {
            ctx.warn(
                AsmErrorKind::Instruction,
                &format!("Value ${val:X} is > 0xffff with 16 bit register"),
            );
        }
        Ok(vec![op, val as u8, (val >> 8) as u8])
    } else {
        if val > 0xFF {
            ctx.warn(
                AsmErrorKind::Instruction,
                &format!("Value ${val:X} is > 0xff with 8 bit register"),
            );
        }
        Ok(vec![op, val as u8])
    }
}

fn encode_address<C: AssemblerContext>(
    mnemonic: &str,
    shape: AddressShape,
    expr: &str,
    operand: &str,
    ctx: &mut C,
) -> Result<Vec<u8>, AsmError> {
    let supported = |width: OperandWidth| {
        shape
            .mode(width)
            .and_then(|mode| opcode(mnemonic, mode))
    };

    let (force, expr) = match expr.chars().next().and_then(OperandWidth::from_force_prefix) {
        Some(width) => (Some(width), &expr[1..]),
        None => (None, expr),
    };
    let value = eval_expr(expr, ctx)?;

    let width = match (force, ctx.mode_hint(), value) {
        (Some(width), _, _) | (None, Some(width), _) => width,
        (None, None, Value::Unresolved) => {
            let width = if supported(OperandWidth::Absolute).is_some() {
                OperandWidth::Absolute
            } else {
                // No absolute form: take the narrowest width (long for JSL)
                // instead of rejecting the line.
                OperandWidth::ALL
                    .into_iter()
                    .find(|w| supported(*w).is_some())
                    .ok_or_else(|| invalid_mode(mnemonic, operand))?
            };
            ctx.set_mode_hint(width);
            ctx.warn(
                AsmErrorKind::UnknownSymbol,
                &format!(
                    "Forward reference or unresolved symbol, defaulting to {} addressing",
                    width_name(width)
                ),
            );
            width
        }
        (None, None, Value::Known(val)) => {
            let narrowest = OperandWidth::for_value(val).ok_or_else(|| {
                AsmError::new(
                    AsmErrorKind::InvalidAddressingMode,
                    "Address out of 24-bit range",
                    Some(&format!("${val:X}")),
                )
            })?;
            OperandWidth::ALL
                .into_iter()
                .filter(|w| *w >= narrowest)
                .find(|w| supported(*w).is_some())
                .ok_or_else(|| invalid_mode(mnemonic, operand))?
        }
    };

    let op = supported(width).ok_or_else(|| invalid_mode(mnemonic, operand))?;
    let val = value.known().unwrap_or(0);
    let mut bytes = vec![op];
    bytes.extend_from_slice(&val.to_le_bytes()[..width.bytes()]);
    Ok(bytes)
}

fn encode_block_move<C: AssemblerContext>(
    mnemonic: &str,
    src: &str,
    dst: &str,
    operand: &str,
    ctx: &mut C,
) -> Result<Vec<u8>, AsmError> {
    let op = opcode(mnemonic, AddressMode::BlockMove)
        .ok_or_else(|| invalid_mode(mnemonic, operand))?;
    let src_bank = eval_expr(src, ctx)?.known().unwrap_or(0);
    let dst_bank = eval_expr(dst, ctx)?.known().unwrap_or(0);
    for bank in [src_bank, dst_bank] {
        if bank > 0xFF {
            ctx.warn(
                AsmErrorKind::Instruction,
                &format!("Bank ${bank:X} outside range [0..0xff]"),
            );
        }
    }
    Ok(vec![op, dst_bank as u8, src_bank as u8])
}

fn width_name(width: OperandWidth) -> &'static str {
    match width {
        OperandWidth::Direct => "direct page",
        OperandWidth::Absolute => "absolute",
        OperandWidth::Long => "absolute long",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct TestContext {
        symbols: HashMap<String, u32>,
        pc: Option<u32>,
        widths: RegisterWidths,
        hint: Option<OperandWidth>,
        deferred: bool,
        warnings: Vec<String>,
    }

    impl TestContext {
        fn at(pc: u32) -> Self {
            Self {
                pc: Some(pc),
                ..Self::default()
            }
        }

        fn with_symbol(mut self, name: &str, val: u32) -> Self {
            self.symbols.insert(name.to_string(), val);
            self
        }
    }

    impl EvalContext for TestContext {
        fn lookup_symbol(&mut self, name: &str) -> Value {
            match self.symbols.get(name) {
                Some(val) => Value::Known(*val),
                None => {
                    self.deferred = true;
                    Value::Unresolved
                }
            }
        }

        fn probe_symbol(&self, name: &str) -> Option<Value> {
            self.symbols.get(name).map(|val| Value::Known(*val))
        }

        fn current_address(&self) -> Option<u32> {
            self.pc
        }

        fn defer(&mut self) {
            self.deferred = true;
        }
    }

    impl AssemblerContext for TestContext {
        fn register_widths(&self) -> RegisterWidths {
            self.widths
        }

        fn mode_hint(&self) -> Option<OperandWidth> {
            self.hint
        }

        fn set_mode_hint(&mut self, width: OperandWidth) {
            self.hint = Some(width);
        }

        fn warn(&mut self, _kind: AsmErrorKind, message: &str) {
            self.warnings.push(message.to_string());
        }
    }

    fn enc(mnemonic: &str, operand: &str) -> Vec<u8> {
        encode_instruction(mnemonic, operand, &mut TestContext::at(0x8000)).unwrap()
    }

    fn enc_err(mnemonic: &str, operand: &str) -> AsmErrorKind {
        encode_instruction(mnemonic, operand, &mut TestContext::at(0x8000))
            .unwrap_err()
            .kind()
    }

    #[test]
    fn implied_and_accumulator() {
        assert_eq!(enc("nop", ""), vec![0xEA]);
        assert_eq!(enc("ASL", "A"), vec![0x0A]);
        assert_eq!(enc("asl", "a"), vec![0x0A]);
        assert_eq!(enc_err("LDA", ""), AsmErrorKind::InvalidAddressingMode);
        assert_eq!(enc_err("FOO", ""), AsmErrorKind::Instruction);
    }

    #[test]
    fn magnitude_selects_width() {
        assert_eq!(enc("LDA", "$0080"), vec![0xA5, 0x80]);
        assert_eq!(enc("LDA", "$0180"), vec![0xAD, 0x80, 0x01]);
        assert_eq!(enc("LDA", "$010080"), vec![0xAF, 0x80, 0x00, 0x01]);
        assert_eq!(enc("LDA", "$10,x"), vec![0xB5, 0x10]);
        assert_eq!(enc("LDA", "$012345,X"), vec![0xBF, 0x45, 0x23, 0x01]);
        assert_eq!(enc_err("LDA", "$01000000"), AsmErrorKind::InvalidAddressingMode);
    }

    #[test]
    fn unsupported_widths_promote() {
        assert_eq!(enc("JMP", "$10"), vec![0x4C, 0x10, 0x00]);
        assert_eq!(enc("JSL", "$10"), vec![0x22, 0x10, 0x00, 0x00]);
        assert_eq!(enc("LDA", "$80,y"), vec![0xB9, 0x80, 0x00]);
        assert_eq!(enc("JMP", "($10)"), vec![0x6C, 0x10, 0x00]);
        assert_eq!(enc_err("LDA", "$012345,y"), AsmErrorKind::InvalidAddressingMode);
    }

    #[test]
    fn force_prefixes_override_magnitude() {
        assert_eq!(enc("LDA", "!$10"), vec![0xAD, 0x10, 0x00]);
        assert_eq!(enc("LDA", ">$10"), vec![0xAF, 0x10, 0x00, 0x00]);
        assert_eq!(enc("LDA", "<$1234"), vec![0xA5, 0x34]);
        assert_eq!(enc_err("JMP", "<$10"), AsmErrorKind::InvalidAddressingMode);
    }

    #[test]
    fn indirect_and_stack_modes() {
        assert_eq!(enc("LDA", "($10)"), vec![0xB2, 0x10]);
        assert_eq!(enc("LDA", "[$10]"), vec![0xA7, 0x10]);
        assert_eq!(enc("LDA", "($10,x)"), vec![0xA1, 0x10]);
        assert_eq!(enc("LDA", "($10),y"), vec![0xB1, 0x10]);
        assert_eq!(enc("LDA", "[$10],y"), vec![0xB7, 0x10]);
        assert_eq!(enc("LDA", "3,s"), vec![0xA3, 0x03]);
        assert_eq!(enc("LDA", "(3,s),y"), vec![0xB3, 0x03]);
        assert_eq!(enc("JML", "[$1234]"), vec![0xDC, 0x34, 0x12]);
        assert_eq!(enc("JMP", "($1234,x)"), vec![0x7C, 0x34, 0x12]);
        assert_eq!(enc("PEI", "($20)"), vec![0xD4, 0x20]);
        assert_eq!(enc_err("LDA", "[$10"), AsmErrorKind::InvalidAddressingMode);
    }

    #[test]
    fn unmatched_indirect_falls_through_with_warning() {
        let mut ctx = TestContext::at(0x8000);
        let bytes = encode_instruction("LDA", "(1+2)*3", &mut ctx).unwrap();
        assert_eq!(bytes, vec![0xA5, 0x09]);
        assert_eq!(ctx.warnings.len(), 1);
    }

    #[test]
    fn immediate_follows_register_width() {
        let mut ctx = TestContext::at(0x8000);
        assert_eq!(encode_instruction("LDA", "#$1234", &mut ctx).unwrap(), vec![0xA9, 0x34]);
        assert_eq!(ctx.warnings.len(), 1);

        ctx.widths.accumulator16 = true;
        assert_eq!(
            encode_instruction("LDA", "#$1234", &mut ctx).unwrap(),
            vec![0xA9, 0x34, 0x12]
        );
        assert_eq!(encode_instruction("LDX", "#$12", &mut ctx).unwrap(), vec![0xA2, 0x12]);
        ctx.widths.index16 = true;
        assert_eq!(
            encode_instruction("LDX", "#$12", &mut ctx).unwrap(),
            vec![0xA2, 0x12, 0x00]
        );
        assert_eq!(encode_instruction("REP", "#$30", &mut ctx).unwrap(), vec![0xC2, 0x30]);
        assert_eq!(enc_err("STA", "#1"), AsmErrorKind::InvalidAddressingMode);
    }

    #[test]
    fn branch_offsets_and_range() {
        assert_eq!(enc("BRA", "$8000"), vec![0x80, 0xFE]);
        assert_eq!(enc("BNE", "$8081"), vec![0xD0, 0x7F]);
        assert_eq!(enc("BNE", "$7F82"), vec![0xD0, 0x80]);
        assert_eq!(enc_err("BNE", "$8082"), AsmErrorKind::BranchOutOfRange);
        assert_eq!(enc_err("BNE", "$7F81"), AsmErrorKind::BranchOutOfRange);
        assert_eq!(enc("BRL", "$8003"), vec![0x82, 0x00, 0x00]);
        assert_eq!(enc("BRL", "$7F00"), vec![0x82, 0xFD, 0xFE]);
        assert_eq!(enc("PER", "$8103"), vec![0x62, 0x00, 0x01]);
    }

    #[test]
    fn unresolved_branch_is_zero_offset() {
        let mut ctx = TestContext::at(0x8000);
        assert_eq!(encode_instruction("BEQ", "LATER", &mut ctx).unwrap(), vec![0xF0, 0x00]);
        assert!(ctx.deferred);
        assert_eq!(ctx.hint, None);
    }

    #[test]
    fn unresolved_operand_defaults_to_absolute_and_sticks() {
        let mut ctx = TestContext::at(0x8000);
        let bytes = encode_instruction("LDA", "LABEL", &mut ctx).unwrap();
        assert_eq!(bytes, vec![0xAD, 0x00, 0x00]);
        assert_eq!(ctx.hint, Some(OperandWidth::Absolute));
        assert!(ctx.deferred);

        let mut ctx = TestContext {
            hint: ctx.hint,
            ..TestContext::at(0x8000).with_symbol("LABEL", 0x12)
        };
        let bytes = encode_instruction("LDA", "LABEL", &mut ctx).unwrap();
        assert_eq!(bytes, vec![0xAD, 0x12, 0x00]);
    }

    #[test]
    fn unresolved_without_absolute_uses_narrowest_width() {
        let mut ctx = TestContext::at(0x8000);
        assert_eq!(encode_instruction("JSL", "FAR", &mut ctx).unwrap().len(), 4);
        assert_eq!(ctx.hint, Some(OperandWidth::Long));

        let mut ctx = TestContext::at(0x8000);
        assert_eq!(encode_instruction("LDA", "PTR,s", &mut ctx).unwrap(), vec![0xA3, 0x00]);
        assert_eq!(ctx.hint, Some(OperandWidth::Direct));
    }

    #[test]
    fn block_move_emits_destination_first() {
        assert_eq!(enc("MVN", "$01,$02"), vec![0x54, 0x02, 0x01]);
        assert_eq!(enc("MVP", "1, 2"), vec![0x44, 0x02, 0x01]);
        assert_eq!(enc_err("LDA", "1,2"), AsmErrorKind::InvalidAddressingMode);
    }
}
