// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! WDC 65816 instruction set: operand syntax, opcode table and encoder.

pub mod handler;
pub mod instructions;
pub mod operand;
