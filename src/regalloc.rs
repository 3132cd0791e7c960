//! Register bookkeeping for the single-pass generator.
//!
//! There is no liveness analysis: values are allocated in evaluation order
//! from a monotonic counter that wraps onto the eight physical registers.
//! Once the counter passes the register budget, the register about to be
//! reused still holds the oldest live value, so the generator spills it first.

use std::fmt;

/// Number of physical registers on the target machine.
pub const REGISTER_COUNT: usize = 8;

/// One of `r0`..`r7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Register(u8);

impl Register {
  pub fn new(index: usize) -> Self {
    Self((index % REGISTER_COUNT) as u8)
  }

  pub fn index(self) -> usize {
    self.0 as usize
  }
}

impl fmt::Display for Register {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "r{}", self.0)
  }
}

#[derive(Debug, Default)]
pub struct RegisterFile {
  in_use: usize,
  high_water: usize,
}

impl RegisterFile {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn reset(&mut self) {
    self.in_use = 0;
    self.high_water = 0;
  }

  /// Logical registers currently holding live values (may exceed the budget).
  pub fn in_use(&self) -> usize {
    self.in_use
  }

  /// Highest value the counter has reached since the last reset.
  pub fn high_water(&self) -> usize {
    self.high_water
  }

  /// The next allocation would overwrite a live value.
  pub fn needs_spill(&self) -> bool {
    self.in_use >= REGISTER_COUNT
  }

  /// More values are live than there are registers, so retiring the top one
  /// must bring a spilled value back.
  pub fn needs_reload(&self) -> bool {
    self.in_use > REGISTER_COUNT
  }

  /// The register the next allocation will use.
  pub fn next(&self) -> Register {
    Register::new(self.in_use)
  }

  /// Register of the most recently allocated value.
  pub fn top(&self) -> Register {
    Register::new(self.in_use + REGISTER_COUNT - 1)
  }

  /// Register of the value allocated just before the top one.
  pub fn below_top(&self) -> Register {
    Register::new(self.in_use + REGISTER_COUNT - 2)
  }

  pub fn allocate(&mut self) -> Register {
    let reg = self.next();
    self.in_use += 1;
    self.high_water = self.high_water.max(self.in_use);
    reg
  }

  /// Collapse the top two values into one.
  pub fn retire(&mut self) {
    self.in_use = self.in_use.saturating_sub(1);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn counter_wraps_onto_physical_registers() {
    let mut regs = RegisterFile::new();
    let allocated: Vec<_> = (0..10).map(|_| regs.allocate().index()).collect();
    assert_eq!(allocated, vec![0, 1, 2, 3, 4, 5, 6, 7, 0, 1]);
    assert_eq!(regs.top(), Register::new(1));
    assert_eq!(regs.below_top(), Register::new(0));
  }

  #[test]
  fn spill_and_reload_thresholds() {
    let mut regs = RegisterFile::new();
    for _ in 0..REGISTER_COUNT {
      assert!(!regs.needs_spill());
      regs.allocate();
    }
    assert!(regs.needs_spill());
    assert!(!regs.needs_reload());
    regs.allocate();
    assert!(regs.needs_reload());
    regs.retire();
    assert!(!regs.needs_reload());
    assert_eq!(regs.high_water(), 9);
  }

  #[test]
  fn top_registers_near_zero() {
    let mut regs = RegisterFile::new();
    regs.allocate();
    regs.allocate();
    assert_eq!(regs.top().to_string(), "r1");
    assert_eq!(regs.below_top().to_string(), "r0");
    regs.reset();
    assert_eq!(regs.in_use(), 0);
    assert_eq!(regs.next().to_string(), "r0");
  }
}
