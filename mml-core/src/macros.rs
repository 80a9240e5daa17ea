//! Macro definition/call (spec.md §9 Open Question resolution)
//!
//! The grammar's `macro_call := LOAD STRING | MACRO STRING` gives both
//! forms a bare name operand with no inline body syntax — mirroring
//! `nether-xm`'s design of keeping sample *data* out of the parsed format
//! entirely ("Sample separation: designed to work with samples loaded from
//! ROM... instrument metadata... name maps to ROM sample ID"), macro
//! *bodies* here are supplied out-of-band by the embedding application,
//! keyed by name, via [`MacroTable::define`]. `LOAD` and `MACRO` both
//! perform the same operation: splice the named body's tokens into the
//! current track. Expansion is bounded to a single track and is
//! non-recursive (a macro whose body transitively calls itself is
//! rejected).

use std::collections::HashMap;

/// Host-supplied macro bodies, keyed by name. Each body is a fragment of
/// MML statement text, tokenized and spliced in place at the call site.
#[derive(Debug, Default, Clone)]
pub struct MacroTable {
    bodies: HashMap<String, String>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a macro body under `name`.
    pub fn define(&mut self, name: impl Into<String>, body: impl Into<String>) {
        self.bodies.insert(name.into(), body.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.bodies.get(name).map(|s| s.as_str())
    }
}
