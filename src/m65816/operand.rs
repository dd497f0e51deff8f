// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Operand syntax and addressing modes for the 65816.

/// Addressing modes of the 65816.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressMode {
    /// No operand, including the accumulator form (`ASL`, `ASL A`).
    Implied,
    /// `#expr`, 8 or 16 bits depending on register width
    Immediate,
    /// `dp`
    Direct,
    /// `dp,x`
    DirectX,
    /// `dp,y`
    DirectY,
    /// `abs`
    Absolute,
    /// `abs,x`
    AbsoluteX,
    /// `abs,y`
    AbsoluteY,
    /// `long`
    AbsoluteLong,
    /// `long,x`
    AbsoluteLongX,
    /// `(dp)`
    DirectIndirect,
    /// `[dp]`
    DirectIndirectLong,
    /// `(dp,x)`
    DirectIndexedIndirect,
    /// `(dp),y`
    DirectIndirectIndexed,
    /// `[dp],y`
    DirectIndirectLongIndexed,
    /// `(abs)`
    AbsoluteIndirect,
    /// `[abs]`
    AbsoluteIndirectLong,
    /// `(abs,x)`
    AbsoluteIndexedIndirect,
    /// `sr,s`
    StackRelative,
    /// `(sr,s),y`
    StackRelativeIndirectIndexed,
    /// 8-bit signed branch offset
    Relative,
    /// 16-bit signed branch offset
    RelativeLong,
    /// `srcbank,dstbank`
    BlockMove,
}

impl AddressMode {
    /// Number of operand bytes following the opcode. Immediate depends on
    /// register width and reports its 8-bit size here.
    pub fn operand_size(&self) -> u8 {
        match self {
            AddressMode::Implied => 0,
            AddressMode::Immediate
            | AddressMode::Direct
            | AddressMode::DirectX
            | AddressMode::DirectY
            | AddressMode::DirectIndirect
            | AddressMode::DirectIndirectLong
            | AddressMode::DirectIndexedIndirect
            | AddressMode::DirectIndirectIndexed
            | AddressMode::DirectIndirectLongIndexed
            | AddressMode::StackRelative
            | AddressMode::StackRelativeIndirectIndexed
            | AddressMode::Relative => 1,
            AddressMode::Absolute
            | AddressMode::AbsoluteX
            | AddressMode::AbsoluteY
            | AddressMode::AbsoluteIndirect
            | AddressMode::AbsoluteIndirectLong
            | AddressMode::AbsoluteIndexedIndirect
            | AddressMode::RelativeLong
            | AddressMode::BlockMove => 2,
            AddressMode::AbsoluteLong | AddressMode::AbsoluteLongX => 3,
        }
    }
}

/// Operand width of an address: direct page, absolute or long.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum OperandWidth {
    Direct,
    Absolute,
    Long,
}

impl OperandWidth {
    pub const ALL: [OperandWidth; 3] = [OperandWidth::Direct, OperandWidth::Absolute, OperandWidth::Long];

    pub fn bytes(self) -> usize {
        match self {
            OperandWidth::Direct => 1,
            OperandWidth::Absolute => 2,
            OperandWidth::Long => 3,
        }
    }

    /// Narrowest width that can hold `val`.
    pub fn for_value(val: u32) -> Option<OperandWidth> {
        match val {
            0..=0xFF => Some(OperandWidth::Direct),
            0x100..=0xFFFF => Some(OperandWidth::Absolute),
            0x1_0000..=0xFF_FFFF => Some(OperandWidth::Long),
            _ => None,
        }
    }

    /// Width forced by a leading `<`, `!` or `>`.
    pub fn from_force_prefix(c: char) -> Option<OperandWidth> {
        match c {
            '<' => Some(OperandWidth::Direct),
            '!' => Some(OperandWidth::Absolute),
            '>' => Some(OperandWidth::Long),
            _ => None,
        }
    }
}

/// Syntactic shape of an address operand, independent of its width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressShape {
    Plain,
    IndexedX,
    IndexedY,
    Stack,
    IndexedIndirect,
    StackIndirectY,
    IndirectY,
    Indirect,
    IndirectLongY,
    IndirectLong,
}

impl AddressShape {
    /// The addressing mode this shape takes at `width`, if one exists.
    pub fn mode(self, width: OperandWidth) -> Option<AddressMode> {
        use AddressMode as M;
        use OperandWidth::{Absolute, Direct, Long};
        match (self, width) {
            (AddressShape::Plain, Direct) => Some(M::Direct),
            (AddressShape::Plain, Absolute) => Some(M::Absolute),
            (AddressShape::Plain, Long) => Some(M::AbsoluteLong),
            (AddressShape::IndexedX, Direct) => Some(M::DirectX),
            (AddressShape::IndexedX, Absolute) => Some(M::AbsoluteX),
            (AddressShape::IndexedX, Long) => Some(M::AbsoluteLongX),
            (AddressShape::IndexedY, Direct) => Some(M::DirectY),
            (AddressShape::IndexedY, Absolute) => Some(M::AbsoluteY),
            (AddressShape::Stack, Direct) => Some(M::StackRelative),
            (AddressShape::IndexedIndirect, Direct) => Some(M::DirectIndexedIndirect),
            (AddressShape::IndexedIndirect, Absolute) => Some(M::AbsoluteIndexedIndirect),
            (AddressShape::StackIndirectY, Direct) => Some(M::StackRelativeIndirectIndexed),
            (AddressShape::IndirectY, Direct) => Some(M::DirectIndirectIndexed),
            (AddressShape::Indirect, Direct) => Some(M::DirectIndirect),
            (AddressShape::Indirect, Absolute) => Some(M::AbsoluteIndirect),
            (AddressShape::IndirectLongY, Direct) => Some(M::DirectIndirectLongIndexed),
            (AddressShape::IndirectLong, Direct) => Some(M::DirectIndirectLong),
            (AddressShape::IndirectLong, Absolute) => Some(M::AbsoluteIndirectLong),
            _ => None,
        }
    }
}

/// Operand text split into its syntactic parts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperandSyntax<'a> {
    Empty,
    Immediate(&'a str),
    Address { shape: AddressShape, expr: &'a str },
    BlockMove { src: &'a str, dst: &'a str },
    /// Opened with `(` but no indirect suffix matched.
    UnmatchedIndirect(&'a str),
    /// Opened with `[` but no long-indirect suffix matched.
    BadIndirectLong(&'a str),
}

const INDIRECT_SUFFIXES: [(&str, AddressShape); 4] = [
    (",x)", AddressShape::IndexedIndirect),
    (",s),y", AddressShape::StackIndirectY),
    ("),y", AddressShape::IndirectY),
    (")", AddressShape::Indirect),
];

const LONG_SUFFIXES: [(&str, AddressShape); 2] = [
    ("],y", AddressShape::IndirectLongY),
    ("]", AddressShape::IndirectLong),
];

const INDEX_SUFFIXES: [(&str, AddressShape); 3] = [
    (",y", AddressShape::IndexedY),
    (",x", AddressShape::IndexedX),
    (",s", AddressShape::Stack),
];

/// Classify operand text by its leading character and trailing suffix.
pub fn classify_operand(text: &str) -> OperandSyntax<'_> {
    let text = text.trim();
    if text.is_empty() {
        return OperandSyntax::Empty;
    }
    if let Some(rest) = text.strip_prefix('#') {
        return OperandSyntax::Immediate(rest.trim());
    }
    if let Some(inner) = text.strip_prefix('(') {
        for (suffix, shape) in INDIRECT_SUFFIXES {
            if let Some(expr) = strip_suffix_loose(inner, suffix) {
                return OperandSyntax::Address {
                    shape,
                    expr: expr.trim(),
                };
            }
        }
        return OperandSyntax::UnmatchedIndirect(text);
    }
    if let Some(inner) = text.strip_prefix('[') {
        for (suffix, shape) in LONG_SUFFIXES {
            if let Some(expr) = strip_suffix_loose(inner, suffix) {
                return OperandSyntax::Address {
                    shape,
                    expr: expr.trim(),
                };
            }
        }
        return OperandSyntax::BadIndirectLong(text);
    }
    classify_direct(text)
}

/// Classify operand text that is not an indirect form.
pub fn classify_direct(text: &str) -> OperandSyntax<'_> {
    for (suffix, shape) in INDEX_SUFFIXES {
        if let Some(expr) = strip_suffix_loose(text, suffix) {
            return OperandSyntax::Address {
                shape,
                expr: expr.trim(),
            };
        }
    }
    if let Some((src, dst)) = split_top_level_comma(text) {
        return OperandSyntax::BlockMove {
            src: src.trim(),
            dst: dst.trim(),
        };
    }
    OperandSyntax::Address {
        shape: AddressShape::Plain,
        expr: text,
    }
}

/// Strip `suffix` from the end of `text`, ignoring ASCII case and any
/// whitespace between its characters.
fn strip_suffix_loose<'a>(text: &'a str, suffix: &str) -> Option<&'a str> {
    let bytes = text.as_bytes();
    let mut end = bytes.len();
    for want in suffix.bytes().rev() {
        while end > 0 && bytes[end - 1].is_ascii_whitespace() {
            end -= 1;
        }
        if end == 0 || !bytes[end - 1].eq_ignore_ascii_case(&want) {
            return None;
        }
        end -= 1;
    }
    Some(&text[..end])
}

fn split_top_level_comma(text: &str) -> Option<(&str, &str)> {
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    for (idx, c) in text.bytes().enumerate() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                b'\'' | b'"' => quote = Some(c),
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth -= 1,
                b',' if depth == 0 => return Some((&text[..idx], &text[idx + 1..])),
                _ => {}
            },
        }
    }
    None
}
