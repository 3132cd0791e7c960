//! Variable table shared by every statement of a session.
//!
//! Entries are kept in insertion order and never removed, so a variable's
//! slot (and therefore its memory address) is fixed once it has been declared.
//! The memory cells just past the last slot double as spill space for the
//! code generator; the table hands them out so a variable declared while a
//! spill is outstanding can never land on a live scratch cell.

use std::fmt;

use snafu::ensure;
use tracing::debug;

use crate::error::{CompileResult, TableExhaustedSnafu, UndefinedVariableSnafu};

/// Maximum number of variables a session can declare.
pub const TABLE_CAPACITY: usize = 64;

/// Width of one memory cell in bytes.
pub const WORD_SIZE: u32 = 4;

/// Variables every session starts with.
pub const BUILTIN_VARIABLES: [&str; 3] = ["x", "y", "z"];

/// Byte offset into the machine's memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Address(pub u32);

impl fmt::Display for Address {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[{}]", self.0)
  }
}

/// Ordinal memory cell owned by a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Slot(pub usize);

impl Slot {
  pub fn address(self) -> Address {
    Address(self.0 as u32 * WORD_SIZE)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
  pub name: String,
  pub value: i32,
  pub slot: Slot,
}

#[derive(Debug)]
pub struct VariableTable {
  vars: Vec<Variable>,
  next_slot: usize,
  scratch: Vec<Address>,
}

impl VariableTable {
  /// A table seeded with `x`, `y` and `z`, all zero.
  pub fn new() -> Self {
    let mut table = Self {
      vars: Vec::with_capacity(TABLE_CAPACITY),
      next_slot: 0,
      scratch: Vec::new(),
    };
    for name in BUILTIN_VARIABLES {
      table.insert(name, 0);
    }
    table
  }

  pub fn len(&self) -> usize {
    self.vars.len()
  }

  pub fn is_full(&self) -> bool {
    self.vars.len() >= TABLE_CAPACITY
  }

  pub fn iter(&self) -> impl Iterator<Item = &Variable> {
    self.vars.iter()
  }

  /// Non-failing lookup, mostly for inspection.
  pub fn get(&self, name: &str) -> Option<&Variable> {
    self.vars.iter().find(|var| var.name == name)
  }

  /// Read a variable. Reads never declare: a miss is an error, reported as
  /// exhaustion when the table is already full.
  pub fn lookup(&self, name: &str) -> CompileResult<&Variable> {
    if let Some(var) = self.get(name) {
      return Ok(var);
    }
    ensure!(!self.is_full(), TableExhaustedSnafu { capacity: TABLE_CAPACITY });
    UndefinedVariableSnafu { name }.fail()
  }

  /// Write a variable, declaring it on first use.
  pub fn assign(&mut self, name: &str, value: i32) -> CompileResult<&Variable> {
    if let Some(idx) = self.vars.iter().position(|var| var.name == name) {
      let var = &mut self.vars[idx];
      var.value = value;
      return Ok(&*var);
    }
    ensure!(!self.is_full(), TableExhaustedSnafu { capacity: TABLE_CAPACITY });
    Ok(self.insert(name, value))
  }

  /// Reserve the next free memory cell past the variables for a spilled register.
  pub fn reserve_scratch(&mut self) -> Address {
    let address = Slot(self.next_slot + self.scratch.len()).address();
    self.scratch.push(address);
    address
  }

  /// Give back the most recently reserved scratch cell.
  pub fn release_scratch(&mut self) -> Option<Address> {
    self.scratch.pop()
  }

  /// Drop every outstanding scratch reservation.
  pub fn reset_scratch(&mut self) {
    self.scratch.clear();
  }

  /// Number of scratch cells currently held.
  pub fn scratch_depth(&self) -> usize {
    self.scratch.len()
  }

  fn insert(&mut self, name: &str, value: i32) -> &Variable {
    // Skip over any outstanding scratch cells.
    let slot = Slot(self.next_slot + self.scratch.len());
    self.next_slot = slot.0 + 1;
    debug!(name, value, slot = slot.0, "declaring variable");
    self.vars.push(Variable {
      name: name.to_string(),
      value,
      slot,
    });
    &self.vars[self.vars.len() - 1]
  }
}

impl Default for VariableTable {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ErrorKind;

  #[test]
  fn seeded_with_builtins() {
    let table = VariableTable::new();
    let names: Vec<_> = table.iter().map(|var| (var.name.as_str(), var.value, var.slot)).collect();
    assert_eq!(names, vec![("x", 0, Slot(0)), ("y", 0, Slot(1)), ("z", 0, Slot(2))]);
  }

  #[test]
  fn lookup_does_not_declare() {
    let table = VariableTable::new();
    let err = table.lookup("w").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Undefined);
    assert_eq!(table.len(), 3);
  }

  #[test]
  fn assign_declares_then_updates_in_place() {
    let mut table = VariableTable::new();
    assert_eq!(table.assign("w", 7).unwrap().slot, Slot(3));
    assert_eq!(table.assign("y", -2).unwrap().slot, Slot(1));
    assert_eq!(table.assign("w", 9).unwrap().value, 9);
    assert_eq!(table.len(), 4);

    let w = table.lookup("w").unwrap();
    assert_eq!((w.value, w.slot.address()), (9, Address(12)));
  }

  #[test]
  fn capacity_is_enforced() {
    let mut table = VariableTable::new();
    for i in 0..TABLE_CAPACITY - BUILTIN_VARIABLES.len() {
      table.assign(&format!("v{i}"), i as i32).unwrap();
    }
    assert!(table.is_full());
    assert_eq!(table.assign("overflow", 1).unwrap_err().kind(), ErrorKind::TableExhausted);
    assert_eq!(table.lookup("missing").unwrap_err().kind(), ErrorKind::TableExhausted);
    // existing names stay writable
    assert_eq!(table.assign("v0", 5).unwrap().value, 5);
  }

  #[test]
  fn scratch_cells_sit_past_the_variables() {
    let mut table = VariableTable::new();
    assert_eq!(table.reserve_scratch(), Address(12));
    assert_eq!(table.reserve_scratch(), Address(16));
    assert_eq!(table.release_scratch(), Some(Address(16)));
    assert_eq!(table.scratch_depth(), 1);

    // a declaration while a cell is held goes above it
    assert_eq!(table.assign("late", 1).unwrap().slot, Slot(4));
    assert_eq!(table.release_scratch(), Some(Address(12)));
    assert_eq!(table.release_scratch(), None);
    assert_eq!(table.reserve_scratch(), Address(20));
  }
}
