//! Compiler session: the state that outlives a single statement.
//!
//! A session owns the variable table. Each call to
//! [`Session::compile_statement`] parses one statement, hands its tree to a
//! fresh [`Generator`] and drops the tree before returning, whether the
//! statement compiled or not.

use std::io::Read;

use tracing::debug;

use crate::codegen::{Generator, Instruction, exit_sequence};
use crate::error::CompileResult;
use crate::parser::{Statement, parse_statement};
use crate::table::VariableTable;
use crate::tokenizer::Lexer;

/// What one statement compiled to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  /// An expression statement. `value` is the generator's compile-time value.
  Compiled { code: Vec<Instruction>, value: i32 },
  /// An empty line; nothing to emit.
  Blank,
  /// End of input at statement position: the session epilogue.
  Finished { code: Vec<Instruction> },
}

#[derive(Debug, Default)]
pub struct Session {
  table: VariableTable,
}

impl Session {
  pub fn new() -> Self {
    Self {
      table: VariableTable::new(),
    }
  }

  pub fn table(&self) -> &VariableTable {
    &self.table
  }

  pub fn compile_statement<R: Read>(&mut self, lexer: &mut Lexer<R>) -> CompileResult<Outcome> {
    let expr = match parse_statement(lexer)? {
      Statement::EndOfInput => {
        debug!(variables = self.table.len(), "end of input");
        return Ok(Outcome::Finished {
          code: exit_sequence(),
        });
      }
      Statement::Blank => return Ok(Outcome::Blank),
      Statement::Expr(expr) => expr,
    };

    let mut generator = Generator::new(&mut self.table);
    let evaluated = generator.generate(&expr)?;
    debug!(
      tree = %expr,
      value = evaluated.value,
      registers = generator.registers().high_water(),
      "compiled statement"
    );

    Ok(Outcome::Compiled {
      code: generator.finish(),
      value: evaluated.value,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ErrorKind;

  #[test]
  fn table_persists_across_statements() {
    let mut session = Session::new();
    let mut lexer = Lexer::new("a = 4\n\na += x + 1\n".as_bytes());

    let first = session.compile_statement(&mut lexer).unwrap();
    assert!(matches!(first, Outcome::Compiled { value: 4, .. }));
    assert_eq!(session.compile_statement(&mut lexer).unwrap(), Outcome::Blank);
    let Outcome::Compiled { code, value } = session.compile_statement(&mut lexer).unwrap() else {
      panic!("expected a compiled statement");
    };
    assert_eq!(value, 5);
    let text: Vec<_> = code.iter().map(ToString::to_string).collect();
    assert_eq!(
      text,
      vec!["MOV r0 [12]", "MOV r1 [0]", "MOV r2 1", "ADD r1 r2", "ADD r0 r1", "MOV [12] r0"]
    );

    let Outcome::Finished { code } = session.compile_statement(&mut lexer).unwrap() else {
      panic!("expected the epilogue");
    };
    assert_eq!(code.len(), 4);
    assert_eq!(session.table().get("a").map(|var| var.value), Some(5));
  }

  #[test]
  fn errors_propagate() {
    let mut session = Session::new();
    let mut lexer = Lexer::new("q\n".as_bytes());
    let err = session.compile_statement(&mut lexer).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Undefined);
  }
}
