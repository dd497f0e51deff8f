// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// ROM image with bin/o64/hex output helpers.

use std::io::{self, Write};

use crate::core::assembler::error::{AsmError, AsmErrorKind};

/// Fixed-size byte window `[base, base + size)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomImage {
    base: u32,
    fill: u8,
    bytes: Vec<u8>,
}

impl RomImage {
    pub fn new(base: u32, size: u32, fill: u8) -> Self {
        Self {
            base,
            fill,
            bytes: vec![fill; size as usize],
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn size(&self) -> u32 {
        self.bytes.len() as u32
    }

    /// First address past the window.
    pub fn end(&self) -> u32 {
        self.base.saturating_add(self.size())
    }

    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.base && addr - self.base < self.size()
    }

    /// Move the window and clear it to the fill byte.
    pub fn rebase(&mut self, base: u32) {
        self.base = base;
        self.clear();
    }

    pub fn clear(&mut self) {
        let fill = self.fill;
        self.bytes.iter_mut().for_each(|b| *b = fill);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Store a run of bytes. Addresses outside the window are an error, never
    /// clipped, and nothing is written if any byte falls outside.
    pub fn store_slice(&mut self, addr: u32, values: &[u8]) -> Result<(), AsmError> {
        let Some(last) = (values.len() as u32).checked_sub(1) else {
            return Ok(());
        };
        if !self.contains(addr) {
            return Err(self.bounds_error(addr));
        }
        let last_addr = addr.saturating_add(last);
        if !self.contains(last_addr) {
            return Err(self.bounds_error(last_addr));
        }
        let start = (addr - self.base) as usize;
        self.bytes[start..start + values.len()].copy_from_slice(values);
        Ok(())
    }

    fn bounds_error(&self, addr: u32) -> AsmError {
        AsmError::new(
            AsmErrorKind::RomBoundsViolation,
            "Data placed outside of ROM area",
            Some(&format!(
                "${addr:06X} not in ${:06X}..${:06X}",
                self.base,
                self.end()
            )),
        )
    }

    pub fn write_bin_file<W: Write>(&self, mut out: W) -> io::Result<()> {
        out.write_all(&self.bytes)
    }

    /// Raw image prefixed by the 16-bit little-endian base address.
    pub fn write_o64_file<W: Write>(&self, mut out: W) -> io::Result<()> {
        out.write_all(&(self.base as u16).to_le_bytes())?;
        out.write_all(&self.bytes)
    }

    /// Intel HEX, with extended linear address records for 24-bit bases.
    pub fn write_hex_file<W: Write>(&self, mut out: W) -> io::Result<()> {
        const LINE_LIMIT: u32 = 32;
        let mut upper: Option<u16> = None;
        let mut addr = self.base;
        let end = self.end();

        while addr < end {
            let hi = (addr >> 16) as u16;
            if upper != Some(hi) {
                let data = hi.to_be_bytes();
                write_record(&mut out, 0, 0x04, &data)?;
                upper = Some(hi);
            }
            let segment_end = ((addr | 0xFFFF) as u64 + 1).min(end as u64) as u32;
            let len = LINE_LIMIT.min(segment_end - addr);
            let start = (addr - self.base) as usize;
            write_record(
                &mut out,
                (addr & 0xFFFF) as u16,
                0x00,
                &self.bytes[start..start + len as usize],
            )?;
            addr += len;
        }

        write_record(&mut out, 0, 0x01, &[])
    }
}

fn write_record<W: Write>(out: &mut W, addr: u16, rec_type: u8, data: &[u8]) -> io::Result<()> {
    let mut checksum = (data.len() as u8)
        .wrapping_add((addr >> 8) as u8)
        .wrapping_add((addr & 0xff) as u8)
        .wrapping_add(rec_type);
    let mut hex_data = String::with_capacity(data.len() * 2);
    for &val in data {
        hex_data.push(hex_digit(val >> 4));
        hex_data.push(hex_digit(val & 0x0f));
        checksum = checksum.wrapping_add(val);
    }
    let checksum = (!checksum).wrapping_add(1);
    writeln!(
        out,
        ":{:02X}{:04X}{:02X}{}{:02X}",
        data.len(),
        addr,
        rec_type,
        hex_data,
        checksum
    )
}

fn hex_digit(val: u8) -> char {
    match val {
        0..=9 => (b'0' + val) as char,
        _ => (b'A' + (val - 10)) as char,
    }
}

#[cfg(test)]
mod tests {
    use super::RomImage;
    use crate::core::assembler::error::AsmErrorKind;

    fn parse_hex_byte(s: &str) -> u8 {
        u8::from_str_radix(s, 16).unwrap()
    }

    fn verify_checksum(line: &str) {
        assert!(line.starts_with(':'), "record must start with ':'");
        let bytes = &line[1..];
        let len = parse_hex_byte(&bytes[0..2]) as usize;
        let data_end = 8 + len * 2;
        let mut sum: u8 = 0;
        for idx in (0..data_end).step_by(2) {
            sum = sum.wrapping_add(parse_hex_byte(&bytes[idx..idx + 2]));
        }
        let checksum = parse_hex_byte(&bytes[data_end..data_end + 2]);
        assert_eq!(checksum, (!sum).wrapping_add(1), "checksum mismatch for {line}");
    }

    #[test]
    fn bounds_are_checked_at_both_ends() {
        let mut rom = RomImage::new(0x8000, 0x100, 0xFF);
        assert!(rom.store_slice(0x80FF, &[0x12]).is_ok());
        assert_eq!(rom.as_bytes()[0xFF], 0x12);

        let err = rom.store_slice(0x8100, &[0x34]).unwrap_err();
        assert_eq!(err.kind(), AsmErrorKind::RomBoundsViolation);
        let err = rom.store_slice(0x7FFF, &[0x34]).unwrap_err();
        assert_eq!(err.kind(), AsmErrorKind::RomBoundsViolation);
    }

    #[test]
    fn slices_are_all_or_nothing() {
        let mut rom = RomImage::new(0x1000, 4, 0x00);
        let err = rom.store_slice(0x1002, &[1, 2, 3]).unwrap_err();
        assert_eq!(err.kind(), AsmErrorKind::RomBoundsViolation);
        assert_eq!(rom.as_bytes(), &[0, 0, 0, 0]);

        rom.store_slice(0x1001, &[1, 2, 3]).unwrap();
        assert_eq!(rom.as_bytes(), &[0, 1, 2, 3]);
        rom.store_slice(0x2000, &[]).unwrap();
    }

    #[test]
    fn rebase_moves_and_clears_window() {
        let mut rom = RomImage::new(0, 2, 0xEA);
        rom.store_slice(1, &[0]).unwrap();
        rom.rebase(0xC000);
        assert_eq!(rom.base(), 0xC000);
        assert_eq!(rom.end(), 0xC002);
        assert_eq!(rom.as_bytes(), &[0xEA, 0xEA]);
    }

    #[test]
    fn o64_prefixes_base_address() {
        let mut rom = RomImage::new(0x0801, 2, 0);
        rom.store_slice(0x0801, &[0xAA, 0xBB]).unwrap();
        let mut out = Vec::new();
        rom.write_o64_file(&mut out).unwrap();
        assert_eq!(out, vec![0x01, 0x08, 0xAA, 0xBB]);

        let mut out = Vec::new();
        rom.write_bin_file(&mut out).unwrap();
        assert_eq!(out, vec![0xAA, 0xBB]);
    }

    #[test]
    fn writes_hex_records_with_valid_checksums() {
        let mut rom = RomImage::new(0x1000, 3, 0);
        rom.store_slice(0x1000, &[0x01, 0x02, 0x03]).unwrap();
        let mut out = Vec::new();
        rom.write_hex_file(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![":020000040000FA", ":03100000010203E7", ":00000001FF"]);
        for line in &lines {
            verify_checksum(line);
        }
    }

    #[test]
    fn hex_records_split_at_bank_boundaries() {
        let rom = RomImage::new(0x00FFF0, 0x20, 0xFF);
        let mut out = Vec::new();
        rom.write_hex_file(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with(":02000004"));
        assert!(lines[1].starts_with(":10FFF000"));
        assert_eq!(lines[2], ":020000040001F9");
        assert!(lines[3].starts_with(":10000000"));
        for line in &lines {
            verify_checksum(line);
        }
    }
}
