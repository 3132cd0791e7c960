//! Code generation: lower one statement's tree into register-machine code.
//!
//! The walk is single pass. Every node both emits the instructions that
//! compute it and returns a compile-time value alongside the register its
//! result lives in. That value only drives diagnostics (today: rejecting a
//! division by a literal-only zero). It is not constant folding, and it is
//! not a promise about what the emitted program computes at run time.
//!
//! Leaves take a fresh register; binary nodes combine the two most recent
//! registers into the older one and retire the newer. Past eight live values
//! the register about to be reused is spilled to a scratch cell above the
//! variable table, and brought back when its operator retires.

use std::fmt;

use snafu::ensure;
use tracing::trace;

use crate::error::{CompileResult, DivideByConstantZeroSnafu};
use crate::parser::{AssignOp, AstNode, BinaryOp, StepOp};
use crate::regalloc::{Register, RegisterFile};
use crate::table::{Address, BUILTIN_VARIABLES, Slot, VariableTable};

/// One line of output for the target machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
  /// `MOV r<i> <int>`
  LoadImm { dst: Register, value: i32 },
  /// `MOV r<i> [<addr>]`
  Load { dst: Register, addr: Address },
  /// `MOV [<addr>] r<i>`
  Store { addr: Address, src: Register },
  /// `ADD r<i> r<j>` and friends; the result lands in `dst`.
  Arith {
    op: BinaryOp,
    dst: Register,
    src: Register,
  },
  Exit { code: u8 },
}

fn mnemonic(op: BinaryOp) -> &'static str {
  match op {
    BinaryOp::Add => "ADD",
    BinaryOp::Sub => "SUB",
    BinaryOp::Mul => "MUL",
    BinaryOp::Div => "DIV",
    BinaryOp::And => "AND",
    BinaryOp::Or => "OR",
    BinaryOp::Xor => "XOR",
  }
}

impl fmt::Display for Instruction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::LoadImm { dst, value } => write!(f, "MOV {dst} {value}"),
      Self::Load { dst, addr } => write!(f, "MOV {dst} {addr}"),
      Self::Store { addr, src } => write!(f, "MOV {addr} {src}"),
      Self::Arith { op, dst, src } => write!(f, "{} {dst} {src}", mnemonic(*op)),
      Self::Exit { code } => write!(f, "EXIT {code}"),
    }
  }
}

/// Result of generating one subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluated {
  /// Compile-time value; see the module docs.
  pub value: i32,
  /// Where the emitted code leaves the result.
  pub register: Register,
  /// Whether any variable was read underneath this node.
  pub reads_var: bool,
}

/// Session epilogue: load the builtin variables into the first registers and exit.
pub fn exit_sequence() -> Vec<Instruction> {
  let mut code: Vec<_> = (0..BUILTIN_VARIABLES.len())
    .map(|idx| Instruction::Load {
      dst: Register::new(idx),
      addr: Slot(idx).address(),
    })
    .collect();
  code.push(Instruction::Exit { code: 0 });
  code
}

/// What is left of the output after a fatal error.
pub fn failure_sequence() -> Vec<Instruction> {
  vec![Instruction::Exit { code: 1 }]
}

/// Per-statement generator. Borrows the session's variable table for the
/// duration of one statement; the register counter and spill watermark start
/// at zero.
pub struct Generator<'t> {
  table: &'t mut VariableTable,
  regs: RegisterFile,
  code: Vec<Instruction>,
}

impl<'t> Generator<'t> {
  pub fn new(table: &'t mut VariableTable) -> Self {
    table.reset_scratch();
    Self {
      table,
      regs: RegisterFile::new(),
      code: Vec::new(),
    }
  }

  pub fn registers(&self) -> &RegisterFile {
    &self.regs
  }

  pub fn finish(self) -> Vec<Instruction> {
    self.code
  }

  pub fn generate(&mut self, node: &AstNode) -> CompileResult<Evaluated> {
    match node {
      AstNode::Num { value } => {
        let dst = self.fresh();
        self.emit(Instruction::LoadImm { dst, value: *value });
        Ok(Evaluated {
          value: *value,
          register: dst,
          reads_var: false,
        })
      }
      AstNode::Var { name } => self.load_var(name).map(|(evaluated, _)| evaluated),
      AstNode::Binary { op, lhs, rhs } => {
        let lhs = self.generate(lhs)?;
        let rhs = self.generate(rhs)?;
        let value = fold(*op, lhs, rhs)?;
        self.combine(*op);
        let register = self.retire();
        Ok(Evaluated {
          value,
          register,
          reads_var: lhs.reads_var || rhs.reads_var,
        })
      }
      AstNode::Assign {
        op: AssignOp::Set,
        target,
        value,
      } => {
        let rhs = self.generate(value)?;
        let addr = self.table.assign(target, rhs.value)?.slot.address();
        let src = self.regs.top();
        self.emit(Instruction::Store { addr, src });
        Ok(Evaluated {
          value: rhs.value,
          register: src,
          reads_var: rhs.reads_var,
        })
      }
      AstNode::Assign {
        op: AssignOp::Add,
        target,
        value,
      } => self.update_in_place(BinaryOp::Add, target, value),
      AstNode::Assign {
        op: AssignOp::Sub,
        target,
        value,
      } => self.update_in_place(BinaryOp::Sub, target, value),
      AstNode::Step { op, target, amount } => {
        let op = match op {
          StepOp::Inc => BinaryOp::Add,
          StepOp::Dec => BinaryOp::Sub,
        };
        self.update_in_place(op, target, amount)
      }
    }
  }

  /// `target op= rhs`, shared by compound assignment and prefix steps. The
  /// target's slot is captured before the right side is generated.
  fn update_in_place(
    &mut self,
    op: BinaryOp,
    target: &str,
    rhs: &AstNode,
  ) -> CompileResult<Evaluated> {
    let (current, addr) = self.load_var(target)?;
    let rhs = self.generate(rhs)?;
    let value = fold(op, current, rhs)?;
    self.table.assign(target, value)?;

    let dst = self.combine(op);
    self.emit(Instruction::Store { addr, src: dst });
    let register = self.retire();
    Ok(Evaluated {
      value,
      register,
      reads_var: true,
    })
  }

  fn load_var(&mut self, name: &str) -> CompileResult<(Evaluated, Address)> {
    let var = self.table.lookup(name)?;
    let (value, addr) = (var.value, var.slot.address());
    let dst = self.fresh();
    self.emit(Instruction::Load { dst, addr });
    let evaluated = Evaluated {
      value,
      register: dst,
      reads_var: true,
    };
    Ok((evaluated, addr))
  }

  /// Take the next register, spilling whatever it still holds.
  fn fresh(&mut self) -> Register {
    if self.regs.needs_spill() {
      let src = self.regs.next();
      let addr = self.table.reserve_scratch();
      trace!(%src, %addr, "spill");
      self.emit(Instruction::Store { addr, src });
    }
    self.regs.allocate()
  }

  /// Apply `op` to the two most recent registers, leaving the result in the older.
  fn combine(&mut self, op: BinaryOp) -> Register {
    let dst = self.regs.below_top();
    let src = self.regs.top();
    self.emit(Instruction::Arith { op, dst, src });
    dst
  }

  /// Drop the top register after a combine, restoring a spilled value first.
  fn retire(&mut self) -> Register {
    if self.regs.needs_reload() {
      let dst = self.regs.top();
      if let Some(addr) = self.table.release_scratch() {
        trace!(%dst, %addr, "reload");
        self.emit(Instruction::Load { dst, addr });
      }
    }
    self.regs.retire();
    self.regs.top()
  }

  fn emit(&mut self, insn: Instruction) {
    self.code.push(insn);
  }
}

/// Compile-time value of `lhs op rhs`, with 32-bit wrapping arithmetic.
///
/// A zero divisor is only an error when neither operand reads a variable.
/// Otherwise the division is left to run time and the tracked value is zero.
fn fold(op: BinaryOp, lhs: Evaluated, rhs: Evaluated) -> CompileResult<i32> {
  let (l, r) = (lhs.value, rhs.value);
  Ok(match op {
    BinaryOp::Add => l.wrapping_add(r),
    BinaryOp::Sub => l.wrapping_sub(r),
    BinaryOp::Mul => l.wrapping_mul(r),
    BinaryOp::Div if r == 0 => {
      ensure!(lhs.reads_var || rhs.reads_var, DivideByConstantZeroSnafu);
      0
    }
    BinaryOp::Div => l.wrapping_div(r),
    BinaryOp::And => l & r,
    BinaryOp::Or => l | r,
    BinaryOp::Xor => l ^ r,
  })
}
