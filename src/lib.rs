//! Crate root: wires together the compilation pipeline.
//!
//! The stages are small and composable:
//! - `tokenizer` scans the input stream into classified tokens on demand.
//! - `parser` owns all syntactic knowledge and builds one statement's tree.
//! - `table` is the session-wide variable table and spill-space allocator.
//! - `regalloc` and `codegen` walk the tree once, emitting instructions for the
//!   8-register target and spilling when a statement needs more registers.
//! - `session` keeps the state that survives from one statement to the next.
//! - `error` centralises the fatal conditions shared by the other modules.

pub mod codegen;
pub mod error;
pub mod parser;
pub mod regalloc;
pub mod session;
pub mod table;
pub mod tokenizer;

use std::io::{Read, Write};

use snafu::ResultExt;
use tracing::debug;

pub use codegen::Instruction;
pub use error::{CompileError, CompileResult, ErrorKind};
pub use session::{Outcome, Session};
use tokenizer::Lexer;

/// Compile statements from `input` until it runs out, writing one instruction
/// per line to `output`.
///
/// Returns `Ok` once the exit sequence has been written. On a fatal condition
/// the failing statement's instructions are dropped, `EXIT 1` is written and
/// the error is returned.
pub fn run<R: Read, W: Write>(input: R, output: &mut W) -> CompileResult<()> {
  run_with_context(input, output).0
}

/// Like [`run`], also handing back the text of the line being read when the
/// session stopped, for diagnostics.
pub fn run_with_context<R: Read, W: Write>(
  input: R,
  output: &mut W,
) -> (CompileResult<()>, String) {
  let mut lexer = Lexer::new(input);
  let mut session = Session::new();
  let result = drive(&mut session, &mut lexer, output);
  if result.is_err()
    && let Err(err) = write_code(output, &codegen::failure_sequence())
  {
    // the compile error is what gets returned
    debug!("failed to write the failure sequence: {err}");
  }
  (result, lexer.current_line().to_string())
}

fn drive<R: Read, W: Write>(
  session: &mut Session,
  lexer: &mut Lexer<R>,
  output: &mut W,
) -> CompileResult<()> {
  loop {
    match session.compile_statement(lexer)? {
      Outcome::Compiled { code, .. } => write_code(output, &code)?,
      Outcome::Blank => {}
      Outcome::Finished { code } => return write_code(output, &code),
    }
  }
}

fn write_code<W: Write>(output: &mut W, code: &[Instruction]) -> CompileResult<()> {
  for insn in code {
    writeln!(output, "{insn}").context(error::IoSnafu)?;
  }
  output.flush().context(error::IoSnafu)
}

/// Compile a whole source string, returning the emitted text. Fatal errors are
/// reported through the error, with the text up to and including `EXIT 1`.
pub fn compile_source(source: &str) -> (String, CompileResult<()>) {
  let mut out = Vec::new();
  let result = run(source.as_bytes(), &mut out);
  (String::from_utf8_lossy(&out).into_owned(), result)
}
