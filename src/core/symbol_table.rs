// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Symbol table for labels and equates, split into resolved and unresolved
// partitions.

use std::collections::BTreeMap;
use std::io::{self, Write};

use crate::core::expr::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub value: Value,
    /// Expression text the value came from, kept for retries.
    pub expression: String,
    /// Location counter at the defining line.
    pub pc: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum SymbolTableResult {
    Ok,
    Duplicate,
}

/// Outcome of retrying an unresolved symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The symbol moved to the resolved partition.
    Advanced,
    /// The symbol was already resolved.
    Stable,
    StillUnresolved,
}

/// Names are case-sensitive. A name lives in exactly one partition.
#[derive(Debug, Default)]
pub struct SymbolTable {
    resolved: BTreeMap<String, Symbol>,
    unresolved: BTreeMap<String, Symbol>,
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, placing it in the partition matching `value`.
    ///
    /// On the first pass a conflicting redefinition of a resolved name is a
    /// duplicate. A resolved name never moves back to the unresolved side.
    pub fn define(
        &mut self,
        name: &str,
        value: Value,
        expression: &str,
        pc: Option<u32>,
        first_pass: bool,
    ) -> SymbolTableResult {
        if let Some(existing) = self.resolved.get_mut(name) {
            match value {
                Value::Unresolved => return SymbolTableResult::Ok,
                Value::Known(_) if existing.value == value => return SymbolTableResult::Ok,
                Value::Known(_) if first_pass => return SymbolTableResult::Duplicate,
                Value::Known(_) => {
                    existing.value = value;
                    existing.expression = expression.to_string();
                    existing.pc = pc;
                    return SymbolTableResult::Ok;
                }
            }
        }

        let symbol = Symbol {
            name: name.to_string(),
            value,
            expression: expression.to_string(),
            pc,
        };
        match value {
            Value::Known(_) => {
                self.unresolved.remove(name);
                self.resolved.insert(name.to_string(), symbol);
            }
            Value::Unresolved => {
                self.unresolved.insert(name.to_string(), symbol);
            }
        }
        SymbolTableResult::Ok
    }

    /// Look up a symbol; the resolved partition wins.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.resolved
            .get(name)
            .or_else(|| self.unresolved.get(name))
            .map(|symbol| symbol.value)
    }

    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.resolved.contains_key(name) || self.unresolved.contains_key(name)
    }

    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&Symbol> {
        self.resolved.get(name).or_else(|| self.unresolved.get(name))
    }

    /// Re-evaluate the stored expression of an unresolved symbol.
    ///
    /// `eval` sees the table as it stands now, so symbols that became known
    /// since the definition are visible. Names absent from both partitions
    /// report `StillUnresolved`.
    pub fn try_resolve<E, F>(&mut self, name: &str, eval: F) -> Result<ResolveOutcome, E>
    where
        F: FnOnce(&Symbol, &SymbolTable) -> Result<Value, E>,
    {
        if self.resolved.contains_key(name) {
            return Ok(ResolveOutcome::Stable);
        }
        let Some(symbol) = self.unresolved.get(name).cloned() else {
            return Ok(ResolveOutcome::StillUnresolved);
        };
        match eval(&symbol, self)? {
            Value::Known(val) => {
                self.unresolved.remove(name);
                self.resolved.insert(
                    name.to_string(),
                    Symbol {
                        value: Value::Known(val),
                        ..symbol
                    },
                );
                Ok(ResolveOutcome::Advanced)
            }
            Value::Unresolved => Ok(ResolveOutcome::StillUnresolved),
        }
    }

    /// Names still waiting for a value, in sorted order.
    #[must_use]
    pub fn unresolved_names(&self) -> Vec<String> {
        self.unresolved.keys().cloned().collect()
    }

    #[must_use]
    pub fn unresolved_count(&self) -> usize {
        self.unresolved.len()
    }

    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }

    /// All symbols sorted by name, both partitions merged.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        let mut all: Vec<&Symbol> = self.resolved.values().chain(self.unresolved.values()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all.into_iter()
    }

    pub fn dump<W: Write>(&self, mut out: W) -> io::Result<()> {
        for symbol in self.iter() {
            match symbol.value {
                Value::Known(val) => writeln!(out, "     * {:<25}: ${:08X}", symbol.name, val)?,
                Value::Unresolved => writeln!(out, "     * {:<25}: ?????????", symbol.name)?,
            }
        }
        Ok(())
    }
}
