// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! 65816 instruction table.
//!
//! One entry per supported (mnemonic, addressing mode) pair. Linear search
//! is fast enough for the table size.

use crate::m65816::operand::AddressMode;
use crate::m65816::operand::AddressMode::*;

/// A CPU-level instruction entry.
pub struct CpuInstructionEntry {
    pub mnemonic: &'static str,
    pub mode: AddressMode,
    pub opcode: u8,
}

const fn op(mnemonic: &'static str, mode: AddressMode, opcode: u8) -> CpuInstructionEntry {
    CpuInstructionEntry {
        mnemonic,
        mode,
        opcode,
    }
}

/// Register whose width sets the size of an immediate operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImmediateClass {
    /// Follows the accumulator width (`AL`/`AS`).
    Accumulator,
    /// Follows the index register width (`XL`/`XS`).
    Index,
    /// Always one byte.
    Fixed,
}

/// Instruction table for the full 65816 opcode map.
pub static CPU_INSTRUCTION_TABLE: &[CpuInstructionEntry] = &[
    op("ADC", Immediate, 0x69),
    op("ADC", Direct, 0x65),
    op("ADC", DirectX, 0x75),
    op("ADC", Absolute, 0x6D),
    op("ADC", AbsoluteX, 0x7D),
    op("ADC", AbsoluteY, 0x79),
    op("ADC", AbsoluteLong, 0x6F),
    op("ADC", AbsoluteLongX, 0x7F),
    op("ADC", DirectIndirect, 0x72),
    op("ADC", DirectIndirectLong, 0x67),
    op("ADC", DirectIndexedIndirect, 0x61),
    op("ADC", DirectIndirectIndexed, 0x71),
    op("ADC", DirectIndirectLongIndexed, 0x77),
    op("ADC", StackRelative, 0x63),
    op("ADC", StackRelativeIndirectIndexed, 0x73),
    op("AND", Immediate, 0x29),
    op("AND", Direct, 0x25),
    op("AND", DirectX, 0x35),
    op("AND", Absolute, 0x2D),
    op("AND", AbsoluteX, 0x3D),
    op("AND", AbsoluteY, 0x39),
    op("AND", AbsoluteLong, 0x2F),
    op("AND", AbsoluteLongX, 0x3F),
    op("AND", DirectIndirect, 0x32),
    op("AND", DirectIndirectLong, 0x27),
    op("AND", DirectIndexedIndirect, 0x21),
    op("AND", DirectIndirectIndexed, 0x31),
    op("AND", DirectIndirectLongIndexed, 0x37),
    op("AND", StackRelative, 0x23),
    op("AND", StackRelativeIndirectIndexed, 0x33),
    op("ASL", Implied, 0x0A),
    op("ASL", Direct, 0x06),
    op("ASL", DirectX, 0x16),
    op("ASL", Absolute, 0x0E),
    op("ASL", AbsoluteX, 0x1E),
    op("BCC", Relative, 0x90),
    op("BCS", Relative, 0xB0),
    op("BEQ", Relative, 0xF0),
    op("BIT", Immediate, 0x89),
    op("BIT", Direct, 0x24),
    op("BIT", DirectX, 0x34),
    op("BIT", Absolute, 0x2C),
    op("BIT", AbsoluteX, 0x3C),
    op("BMI", Relative, 0x30),
    op("BNE", Relative, 0xD0),
    op("BPL", Relative, 0x10),
    op("BRA", Relative, 0x80),
    op("BRK", Implied, 0x00),
    op("BRK", Immediate, 0x00),
    op("BRL", RelativeLong, 0x82),
    op("BVC", Relative, 0x50),
    op("BVS", Relative, 0x70),
    op("CLC", Implied, 0x18),
    op("CLD", Implied, 0xD8),
    op("CLI", Implied, 0x58),
    op("CLV", Implied, 0xB8),
    op("CMP", Immediate, 0xC9),
    op("CMP", Direct, 0xC5),
    op("CMP", DirectX, 0xD5),
    op("CMP", Absolute, 0xCD),
    op("CMP", AbsoluteX, 0xDD),
    op("CMP", AbsoluteY, 0xD9),
    op("CMP", AbsoluteLong, 0xCF),
    op("CMP", AbsoluteLongX, 0xDF),
    op("CMP", DirectIndirect, 0xD2),
    op("CMP", DirectIndirectLong, 0xC7),
    op("CMP", DirectIndexedIndirect, 0xC1),
    op("CMP", DirectIndirectIndexed, 0xD1),
    op("CMP", DirectIndirectLongIndexed, 0xD7),
    op("CMP", StackRelative, 0xC3),
    op("CMP", StackRelativeIndirectIndexed, 0xD3),
    op("COP", Immediate, 0x02),
    op("CPX", Immediate, 0xE0),
    op("CPX", Direct, 0xE4),
    op("CPX", Absolute, 0xEC),
    op("CPY", Immediate, 0xC0),
    op("CPY", Direct, 0xC4),
    op("CPY", Absolute, 0xCC),
    op("DEC", Implied, 0x3A),
    op("DEC", Direct, 0xC6),
    op("DEC", DirectX, 0xD6),
    op("DEC", Absolute, 0xCE),
    op("DEC", AbsoluteX, 0xDE),
    op("DEX", Implied, 0xCA),
    op("DEY", Implied, 0x88),
    op("EOR", Immediate, 0x49),
    op("EOR", Direct, 0x45),
    op("EOR", DirectX, 0x55),
    op("EOR", Absolute, 0x4D),
    op("EOR", AbsoluteX, 0x5D),
    op("EOR", AbsoluteY, 0x59),
    op("EOR", AbsoluteLong, 0x4F),
    op("EOR", AbsoluteLongX, 0x5F),
    op("EOR", DirectIndirect, 0x52),
    op("EOR", DirectIndirectLong, 0x47),
    op("EOR", DirectIndexedIndirect, 0x41),
    op("EOR", DirectIndirectIndexed, 0x51),
    op("EOR", DirectIndirectLongIndexed, 0x57),
    op("EOR", StackRelative, 0x43),
    op("EOR", StackRelativeIndirectIndexed, 0x53),
    op("INC", Implied, 0x1A),
    op("INC", Direct, 0xE6),
    op("INC", DirectX, 0xF6),
    op("INC", Absolute, 0xEE),
    op("INC", AbsoluteX, 0xFE),
    op("INX", Implied, 0xE8),
    op("INY", Implied, 0xC8),
    op("JML", AbsoluteLong, 0x5C),
    op("JML", AbsoluteIndirectLong, 0xDC),
    op("JMP", Absolute, 0x4C),
    op("JMP", AbsoluteLong, 0x5C),
    op("JMP", AbsoluteIndirect, 0x6C),
    op("JMP", AbsoluteIndexedIndirect, 0x7C),
    op("JMP", AbsoluteIndirectLong, 0xDC),
    op("JSL", AbsoluteLong, 0x22),
    op("JSR", Absolute, 0x20),
    op("JSR", AbsoluteIndexedIndirect, 0xFC),
    op("LDA", Immediate, 0xA9),
    op("LDA", Direct, 0xA5),
    op("LDA", DirectX, 0xB5),
    op("LDA", Absolute, 0xAD),
    op("LDA", AbsoluteX, 0xBD),
    op("LDA", AbsoluteY, 0xB9),
    op("LDA", AbsoluteLong, 0xAF),
    op("LDA", AbsoluteLongX, 0xBF),
    op("LDA", DirectIndirect, 0xB2),
    op("LDA", DirectIndirectLong, 0xA7),
    op("LDA", DirectIndexedIndirect, 0xA1),
    op("LDA", DirectIndirectIndexed, 0xB1),
    op("LDA", DirectIndirectLongIndexed, 0xB7),
    op("LDA", StackRelative, 0xA3),
    op("LDA", StackRelativeIndirectIndexed, 0xB3),
    op("LDX", Immediate, 0xA2),
    op("LDX", Direct, 0xA6),
    op("LDX", DirectY, 0xB6),
    op("LDX", Absolute, 0xAE),
    op("LDX", AbsoluteY, 0xBE),
    op("LDY", Immediate, 0xA0),
    op("LDY", Direct, 0xA4),
    op("LDY", DirectX, 0xB4),
    op("LDY", Absolute, 0xAC),
    op("LDY", AbsoluteX, 0xBC),
    op("LSR", Implied, 0x4A),
    op("LSR", Direct, 0x46),
    op("LSR", DirectX, 0x56),
    op("LSR", Absolute, 0x4E),
    op("LSR", AbsoluteX, 0x5E),
    op("MVN", BlockMove, 0x54),
    op("MVP", BlockMove, 0x44),
    op("NOP", Implied, 0xEA),
    op("ORA", Immediate, 0x09),
    op("ORA", Direct, 0x05),
    op("ORA", DirectX, 0x15),
    op("ORA", Absolute, 0x0D),
    op("ORA", AbsoluteX, 0x1D),
    op("ORA", AbsoluteY, 0x19),
    op("ORA", AbsoluteLong, 0x0F),
    op("ORA", AbsoluteLongX, 0x1F),
    op("ORA", DirectIndirect, 0x12),
    op("ORA", DirectIndirectLong, 0x07),
    op("ORA", DirectIndexedIndirect, 0x01),
    op("ORA", DirectIndirectIndexed, 0x11),
    op("ORA", DirectIndirectLongIndexed, 0x17),
    op("ORA", StackRelative, 0x03),
    op("ORA", StackRelativeIndirectIndexed, 0x13),
    op("PEA", Absolute, 0xF4),
    op("PEI", DirectIndirect, 0xD4),
    op("PER", RelativeLong, 0x62),
    op("PHA", Implied, 0x48),
    op("PHB", Implied, 0x8B),
    op("PHD", Implied, 0x0B),
    op("PHK", Implied, 0x4B),
    op("PHP", Implied, 0x08),
    op("PHX", Implied, 0xDA),
    op("PHY", Implied, 0x5A),
    op("PLA", Implied, 0x68),
    op("PLB", Implied, 0xAB),
    op("PLD", Implied, 0x2B),
    op("PLP", Implied, 0x28),
    op("PLX", Implied, 0xFA),
    op("PLY", Implied, 0x7A),
    op("REP", Immediate, 0xC2),
    op("ROL", Implied, 0x2A),
    op("ROL", Direct, 0x26),
    op("ROL", DirectX, 0x36),
    op("ROL", Absolute, 0x2E),
    op("ROL", AbsoluteX, 0x3E),
    op("ROR", Implied, 0x6A),
    op("ROR", Direct, 0x66),
    op("ROR", DirectX, 0x76),
    op("ROR", Absolute, 0x6E),
    op("ROR", AbsoluteX, 0x7E),
    op("RTI", Implied, 0x40),
    op("RTL", Implied, 0x6B),
    op("RTS", Implied, 0x60),
    op("SBC", Immediate, 0xE9),
    op("SBC", Direct, 0xE5),
    op("SBC", DirectX, 0xF5),
    op("SBC", Absolute, 0xED),
    op("SBC", AbsoluteX, 0xFD),
    op("SBC", AbsoluteY, 0xF9),
    op("SBC", AbsoluteLong, 0xEF),
    op("SBC", AbsoluteLongX, 0xFF),
    op("SBC", DirectIndirect, 0xF2),
    op("SBC", DirectIndirectLong, 0xE7),
    op("SBC", DirectIndexedIndirect, 0xE1),
    op("SBC", DirectIndirectIndexed, 0xF1),
    op("SBC", DirectIndirectLongIndexed, 0xF7),
    op("SBC", StackRelative, 0xE3),
    op("SBC", StackRelativeIndirectIndexed, 0xF3),
    op("SEC", Implied, 0x38),
    op("SED", Implied, 0xF8),
    op("SEI", Implied, 0x78),
    op("SEP", Immediate, 0xE2),
    op("STA", Direct, 0x85),
    op("STA", DirectX, 0x95),
    op("STA", Absolute, 0x8D),
    op("STA", AbsoluteX, 0x9D),
    op("STA", AbsoluteY, 0x99),
    op("STA", AbsoluteLong, 0x8F),
    op("STA", AbsoluteLongX, 0x9F),
    op("STA", DirectIndirect, 0x92),
    op("STA", DirectIndirectLong, 0x87),
    op("STA", DirectIndexedIndirect, 0x81),
    op("STA", DirectIndirectIndexed, 0x91),
    op("STA", DirectIndirectLongIndexed, 0x97),
    op("STA", StackRelative, 0x83),
    op("STA", StackRelativeIndirectIndexed, 0x93),
    op("STP", Implied, 0xDB),
    op("STX", Direct, 0x86),
    op("STX", DirectY, 0x96),
    op("STX", Absolute, 0x8E),
    op("STY", Direct, 0x84),
    op("STY", DirectX, 0x94),
    op("STY", Absolute, 0x8C),
    op("STZ", Direct, 0x64),
    op("STZ", DirectX, 0x74),
    op("STZ", Absolute, 0x9C),
    op("STZ", AbsoluteX, 0x9E),
    op("TAX", Implied, 0xAA),
    op("TAY", Implied, 0xA8),
    op("TCD", Implied, 0x5B),
    op("TCS", Implied, 0x1B),
    op("TDC", Implied, 0x7B),
    op("TRB", Direct, 0x14),
    op("TRB", Absolute, 0x1C),
    op("TSB", Direct, 0x04),
    op("TSB", Absolute, 0x0C),
    op("TSC", Implied, 0x3B),
    op("TSX", Implied, 0xBA),
    op("TXA", Implied, 0x8A),
    op("TXS", Implied, 0x9A),
    op("TXY", Implied, 0x9B),
    op("TYA", Implied, 0x98),
    op("TYX", Implied, 0xBB),
    op("WAI", Implied, 0xCB),
    op("WDM", Immediate, 0x42),
    op("XBA", Implied, 0xEB),
    op("XCE", Implied, 0xFB),
];

/// Look up an instruction in the CPU table.
pub fn lookup_instruction(
    mnemonic: &str,
    mode: AddressMode,
) -> Option<&'static CpuInstructionEntry> {
    let upper = mnemonic.to_ascii_uppercase();
    CPU_INSTRUCTION_TABLE
        .iter()
        .find(|entry| entry.mnemonic == upper && entry.mode == mode)
}

/// Opcode for `mnemonic` in `mode`, if supported.
pub fn opcode(mnemonic: &str, mode: AddressMode) -> Option<u8> {
    lookup_instruction(mnemonic, mode).map(|entry| entry.opcode)
}

/// Check if a mnemonic is in the CPU table.
pub fn has_mnemonic(mnemonic: &str) -> bool {
    let upper = mnemonic.to_ascii_uppercase();
    CPU_INSTRUCTION_TABLE
        .iter()
        .any(|entry| entry.mnemonic == upper)
}

pub fn immediate_class(mnemonic: &str) -> ImmediateClass {
    match mnemonic.to_ascii_uppercase().as_str() {
        "ADC" | "AND" | "BIT" | "CMP" | "EOR" | "LDA" | "ORA" | "SBC" => {
            ImmediateClass::Accumulator
        }
        "CPX" | "CPY" | "LDX" | "LDY" => ImmediateClass::Index,
        _ => ImmediateClass::Fixed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn table_covers_every_opcode() {
        let opcodes: BTreeSet<u8> = CPU_INSTRUCTION_TABLE.iter().map(|e| e.opcode).collect();
        assert_eq!(opcodes.len(), 256);
        let mnemonics: BTreeSet<&str> = CPU_INSTRUCTION_TABLE.iter().map(|e| e.mnemonic).collect();
        assert_eq!(mnemonics.len(), 92);
    }

    #[test]
    fn lookups_are_case_insensitive() {
        assert!(has_mnemonic("brl"));
        assert_eq!(opcode("lda", Immediate), Some(0xA9));
        assert_eq!(opcode("LDA", AbsoluteLongX), Some(0xBF));
        assert_eq!(opcode("JML", AbsoluteIndirectLong), Some(0xDC));
        assert_eq!(opcode("MVN", BlockMove), Some(0x54));
        assert_eq!(opcode("STA", Immediate), None);
        assert!(!has_mnemonic("FOO"));
    }

    #[test]
    fn immediate_classes() {
        assert_eq!(immediate_class("lda"), ImmediateClass::Accumulator);
        assert_eq!(immediate_class("LDY"), ImmediateClass::Index);
        assert_eq!(immediate_class("REP"), ImmediateClass::Fixed);
    }
}
