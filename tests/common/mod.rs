//! Shared helpers for the integration tests: a reference interpreter for the
//! emitted listings, so tests can check what the code computes rather than
//! only how it looks.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct Machine {
  pub regs: [i32; 8],
  pub memory: HashMap<u32, i32>,
  pub exit: Option<i32>,
}

fn reg(operand: &str) -> usize {
  let index: usize = operand
    .strip_prefix('r')
    .and_then(|n| n.parse().ok())
    .unwrap_or_else(|| panic!("bad register operand {operand:?}"));
  assert!(index < 8, "register {operand} out of range");
  index
}

fn addr(operand: &str) -> Option<u32> {
  let inner = operand.strip_prefix('[')?.strip_suffix(']')?;
  let value: u32 = inner.parse().ok()?;
  assert_eq!(value % 4, 0, "unaligned address {operand}");
  Some(value)
}

impl Machine {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn load(&self, address: u32) -> i32 {
    self.memory.get(&address).copied().unwrap_or(0)
  }

  /// Execute a listing line by line. Stops at the first `EXIT`.
  pub fn execute(&mut self, listing: &str) {
    for line in listing.lines() {
      if self.exit.is_some() {
        break;
      }
      let parts: Vec<_> = line.split_whitespace().collect();
      match parts.as_slice() {
        ["MOV", dst, src] if dst.starts_with('[') => {
          let address = addr(dst).unwrap();
          self.memory.insert(address, self.regs[reg(src)]);
        }
        ["MOV", dst, src] => {
          let value = match addr(src) {
            Some(address) => self.load(address),
            None => src.parse().unwrap_or_else(|_| panic!("bad immediate in {line:?}")),
          };
          self.regs[reg(dst)] = value;
        }
        ["EXIT", code] => self.exit = Some(code.parse().unwrap()),
        [op, dst, src] => {
          let (l, r) = (self.regs[reg(dst)], self.regs[reg(src)]);
          self.regs[reg(dst)] = match *op {
            "ADD" => l.wrapping_add(r),
            "SUB" => l.wrapping_sub(r),
            "MUL" => l.wrapping_mul(r),
            "DIV" => l.checked_div(r).unwrap_or(0),
            "AND" => l & r,
            "OR" => l | r,
            "XOR" => l ^ r,
            other => panic!("unknown opcode {other:?}"),
          };
        }
        _ => panic!("malformed instruction {line:?}"),
      }
    }
  }
}

/// Lines of an emitted listing.
pub fn lines(listing: &str) -> Vec<&str> {
  listing.lines().collect()
}

pub const EXIT_SEQUENCE: [&str; 4] = ["MOV r0 [0]", "MOV r1 [4]", "MOV r2 [8]", "EXIT 0"];
