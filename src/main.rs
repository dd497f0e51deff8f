// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for asm816.

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("ASM816_LOG", "info"))
        .format_timestamp(None)
        .init();

    if let Err(err) = asm816::assembler::run() {
        for diag in err.diagnostics() {
            eprintln!("{}", diag.format_with_context());
        }
        eprintln!("{err}");
        std::process::exit(1);
    }
}
