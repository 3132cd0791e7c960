//! Shared error utilities used across the compilation pipeline.
//!
//! Every condition here is fatal for the session: the driver emits `EXIT 1`
//! and stops. Diagnostics are optional and, when requested, point at the
//! offending column with a caret.

use std::fmt;

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

/// 1-based line and column of a token in the input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
  pub line: usize,
  pub column: usize,
}

impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.line, self.column)
  }
}

/// Coarse classification of a [`CompileError`], stable for callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  MismatchedParen,
  NotNumberOrIdent,
  Undefined,
  TableExhausted,
  NotAName,
  DivideByZero,
  Syntax,
  TooDeep,
  Io,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CompileError {
  #[snafu(display("{loc}: mismatched parenthesis"))]
  MismatchedParen { loc: Location },

  #[snafu(display("{loc}: number or identifier expected, but got \"{found}\""))]
  ExpectedNumberOrIdent { loc: Location, found: String },

  #[snafu(display("variable not defined: {name}"))]
  UndefinedVariable { name: String },

  #[snafu(display("out of memory: the variable table holds at most {capacity} entries"))]
  TableExhausted { capacity: usize },

  #[snafu(display("{loc}: lvalue required as an operand"))]
  NotAName { loc: Location },

  #[snafu(display("divide by constant zero"))]
  DivideByConstantZero,

  #[snafu(display("{loc}: syntax error: unexpected \"{found}\""))]
  Syntax { loc: Location, found: String },

  #[snafu(display("{loc}: expression nested too deeply (limit {limit})"))]
  NestingTooDeep { loc: Location, limit: usize },

  #[snafu(display("i/o failure: {source}"))]
  Io { source: std::io::Error },
}

impl CompileError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::MismatchedParen { .. } => ErrorKind::MismatchedParen,
      Self::ExpectedNumberOrIdent { .. } => ErrorKind::NotNumberOrIdent,
      Self::UndefinedVariable { .. } => ErrorKind::Undefined,
      Self::TableExhausted { .. } => ErrorKind::TableExhausted,
      Self::NotAName { .. } => ErrorKind::NotAName,
      Self::DivideByConstantZero => ErrorKind::DivideByZero,
      Self::Syntax { .. } => ErrorKind::Syntax,
      Self::NestingTooDeep { .. } => ErrorKind::TooDeep,
      Self::Io { .. } => ErrorKind::Io,
    }
  }

  /// Source position of the error, if the failing stage knew one.
  pub fn location(&self) -> Option<Location> {
    match self {
      Self::MismatchedParen { loc }
      | Self::ExpectedNumberOrIdent { loc, .. }
      | Self::NotAName { loc }
      | Self::Syntax { loc, .. }
      | Self::NestingTooDeep { loc, .. } => Some(*loc),
      _ => None,
    }
  }

  /// Render the error against the text of the line it occurred on, with a
  /// caret under the offending column when one is known.
  pub fn render(&self, line_text: &str) -> String {
    let expr_line = format!("'{}'", line_text.trim_end_matches(['\n', '\r']));
    match self.location() {
      Some(loc) => {
        // one char per input byte, so columns index chars directly
        let safe_col = loc.column.saturating_sub(1).min(line_text.chars().count());
        let char_offset = safe_col + 1; // account for opening quote
        let marker = format!("{}^", " ".repeat(char_offset));
        format!("{expr_line}\n{marker} error: {self}")
      }
      None => format!("{expr_line}\nerror: {self}"),
    }
  }
}
