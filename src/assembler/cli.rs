// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing and argument validation.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::assembler::{AssemblerConfig, DEFAULT_MAX_PASSES, DEFAULT_ROM_SIZE};
use crate::core::assembler::error::{AsmError, AsmErrorKind, AsmRunError};
use crate::core::expr::{eval_expr, SymbolTableContext, Value};
use crate::core::symbol_table::SymbolTable;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const LONG_ABOUT: &str = "Multi-pass 65816 assembler.

Assembles one source file into a fixed-size ROM image. Output is a raw
binary by default; --o64 prefixes the 16-bit load address and --hex writes
Intel HEX. ROM size and base accept assembler expressions such as $8000.
Set ASM816_LOG=debug to trace passes and symbol resolution.";

#[derive(Parser, Debug)]
#[command(
    name = "asm816",
    version = VERSION,
    about = "Multi-pass 65816 assembler",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    #[arg(value_name = "FILE", conflicts_with = "asm_file")]
    pub input: Option<PathBuf>,
    #[arg(
        short = 'a',
        long = "asm",
        value_name = "FILE",
        long_help = "Assembly source file. May also be given as the first positional argument."
    )]
    pub asm_file: Option<PathBuf>,
    #[arg(
        short = 'o',
        long = "out",
        value_name = "FILE",
        default_value = "output.bin",
        long_help = "Output image file. Defaults to output.bin."
    )]
    pub out_file: PathBuf,
    #[arg(
        short = 'r',
        long = "rom",
        value_name = "EXPR",
        long_help = "ROM size in bytes. Defaults to $8000."
    )]
    pub rom_size: Option<String>,
    #[arg(
        long = "base",
        value_name = "EXPR",
        long_help = "Fixed ROM base address. Without it the first ORG sets the base."
    )]
    pub rom_base: Option<String>,
    #[arg(
        short = 'f',
        long = "fill",
        value_name = "hh",
        long_help = "Fill byte for unused ROM space (2 hex digits). Defaults to 00."
    )]
    pub fill_byte: Option<String>,
    #[arg(long = "o64", action = ArgAction::SetTrue, conflicts_with = "hex")]
    pub o64: bool,
    #[arg(long = "hex", action = ArgAction::SetTrue)]
    pub hex: bool,
    #[arg(
        short = 's',
        long = "symbols",
        value_name = "FILE",
        long_help = "Write the symbol table to FILE. Without it the table is logged."
    )]
    pub symbols: Option<PathBuf>,
    #[arg(
        short = 'i',
        long = "ignore-info",
        action = ArgAction::SetTrue,
        long_help = "Suppress informational messages during the first pass."
    )]
    pub quiet_info: bool,
    #[arg(
        short = 'w',
        long = "ignore-warn",
        action = ArgAction::SetTrue,
        long_help = "Suppress warnings during the first pass."
    )]
    pub quiet_warnings: bool,
    #[arg(long = "max-passes", value_name = "N", default_value_t = DEFAULT_MAX_PASSES)]
    pub max_passes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Bin,
    O64,
    Hex,
}

/// Validated CLI configuration.
#[derive(Debug)]
pub struct CliOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: OutputFormat,
    pub symbols: Option<PathBuf>,
    pub config: AssemblerConfig,
}

fn cli_error(msg: &str, param: Option<&str>) -> AsmRunError {
    AsmError::new(AsmErrorKind::Cli, msg, param).into()
}

/// Evaluate a numeric argument. Symbols are not available here.
fn parse_number_arg(text: &str, what: &str) -> Result<u32, AsmRunError> {
    let symbols = SymbolTable::new();
    let mut ctx = SymbolTableContext::new(&symbols);
    match eval_expr(text, &mut ctx) {
        Ok(Value::Known(val)) => Ok(val),
        Ok(Value::Unresolved) => Err(cli_error(&format!("Invalid {what}"), Some(text))),
        Err(err) => Err(cli_error(&format!("Invalid {what}"), Some(err.message()))),
    }
}

fn is_valid_hex_2(s: &str) -> bool {
    s.len() == 2 && s.chars().all(|c| c.is_ascii_hexdigit())
}

pub fn validate_cli(cli: &Cli) -> Result<CliOptions, AsmRunError> {
    let Some(input) = cli.asm_file.clone().or_else(|| cli.input.clone()) else {
        return Err(cli_error(
            "No input file specified. Use -a/--asm or give FILE",
            None,
        ));
    };

    let rom_size = match cli.rom_size.as_deref() {
        Some(text) => parse_number_arg(text, "ROM size")?,
        None => DEFAULT_ROM_SIZE,
    };
    if rom_size == 0 {
        return Err(cli_error("ROM size must be greater than zero", None));
    }
    if rom_size > 0x0100_0000 {
        return Err(cli_error("ROM size exceeds the 24-bit address space", None));
    }

    let rom_base = cli
        .rom_base
        .as_deref()
        .map(|text| parse_number_arg(text, "ROM base"))
        .transpose()?;

    let fill_byte = match cli.fill_byte.as_deref() {
        Some(fill) if is_valid_hex_2(fill) => u8::from_str_radix(fill, 16)
            .map_err(|_| cli_error("Invalid -f/--fill byte; must be 2 hex digits", None))?,
        Some(_) => {
            return Err(cli_error(
                "Invalid -f/--fill byte; must be 2 hex digits",
                None,
            ))
        }
        None => 0x00,
    };

    if cli.max_passes < 2 {
        return Err(cli_error("--max-passes must be at least 2", None));
    }

    let format = if cli.hex {
        OutputFormat::Hex
    } else if cli.o64 {
        OutputFormat::O64
    } else {
        OutputFormat::Bin
    };

    Ok(CliOptions {
        input,
        output: cli.out_file.clone(),
        format,
        symbols: cli.symbols.clone(),
        config: AssemblerConfig {
            rom_size,
            rom_base,
            fill_byte,
            max_passes: cli.max_passes,
            quiet_pass1_info: cli.quiet_info,
            quiet_pass1_warnings: cli.quiet_warnings,
            ..AssemblerConfig::default()
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::parse_from([
            "asm816", "-a", "prog.asm", "-o", "rom.o64", "-r", "$4000", "--o64", "-f", "ff",
            "-s", "prog.sym", "-i", "-w",
        ]);
        let opts = validate_cli(&cli).expect("validate cli");
        assert_eq!(opts.input, PathBuf::from("prog.asm"));
        assert_eq!(opts.output, PathBuf::from("rom.o64"));
        assert_eq!(opts.format, OutputFormat::O64);
        assert_eq!(opts.symbols, Some(PathBuf::from("prog.sym")));
        assert_eq!(opts.config.rom_size, 0x4000);
        assert_eq!(opts.config.fill_byte, 0xFF);
        assert!(opts.config.quiet_pass1_info);
        assert!(opts.config.quiet_pass1_warnings);
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["asm816", "prog.asm"]);
        let opts = validate_cli(&cli).expect("validate cli");
        assert_eq!(opts.input, PathBuf::from("prog.asm"));
        assert_eq!(opts.output, PathBuf::from("output.bin"));
        assert_eq!(opts.format, OutputFormat::Bin);
        assert_eq!(opts.config, AssemblerConfig::default());
    }

    #[test]
    fn rom_size_accepts_expressions() {
        let cli = Cli::parse_from(["asm816", "prog.asm", "--rom", "2*$1000", "--base", "$C000"]);
        let opts = validate_cli(&cli).expect("validate cli");
        assert_eq!(opts.config.rom_size, 0x2000);
        assert_eq!(opts.config.rom_base, Some(0xC000));
    }

    #[test]
    fn rejects_zero_rom_size() {
        let cli = Cli::parse_from(["asm816", "prog.asm", "-r", "0"]);
        let err = validate_cli(&cli).unwrap_err();
        assert_eq!(err.kind(), AsmErrorKind::Cli);
        assert_eq!(err.error().message(), "ROM size must be greater than zero");
    }

    #[test]
    fn rejects_symbolic_rom_size() {
        let cli = Cli::parse_from(["asm816", "prog.asm", "-r", "SIZE"]);
        let err = validate_cli(&cli).unwrap_err();
        assert_eq!(err.kind(), AsmErrorKind::Cli);
    }

    #[test]
    fn rejects_missing_input_and_bad_fill() {
        let cli = Cli::parse_from(["asm816"]);
        assert!(validate_cli(&cli).is_err());

        let cli = Cli::parse_from(["asm816", "prog.asm", "-f", "xyz"]);
        let err = validate_cli(&cli).unwrap_err();
        assert_eq!(
            err.error().message(),
            "Invalid -f/--fill byte; must be 2 hex digits"
        );
    }

    #[test]
    fn hex_and_o64_conflict() {
        assert!(Cli::try_parse_from(["asm816", "prog.asm", "--hex", "--o64"]).is_err());
    }
}
