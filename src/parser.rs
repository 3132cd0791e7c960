//! Recursive-descent parser producing one statement's expression tree.
//!
//! The parser follows the classic recursive-descent layout: one helper per
//! precedence level, each parsing the next level down and folding in the
//! operators of its own level. Only assignment is right-recursive, so
//! `a = b = 5` groups as `a = (b = 5)`. Unary `+`/`-` are desugared into a
//! subtraction or addition from a literal `0`, and prefix `++`/`--` carry a
//! synthesized literal `1`, so the generator only ever sees binary shapes.

use std::fmt;
use std::io::Read;

use snafu::ensure;

use crate::error::{
  CompileResult, ExpectedNumberOrIdentSnafu, MismatchedParenSnafu, NestingTooDeepSnafu,
  NotANameSnafu, SyntaxSnafu,
};
use crate::tokenizer::{Lexer, Token, TokenKind};

/// Deepest a statement may nest. Counts parentheses, unary operators,
/// assignments and the links of an operator chain.
pub const MAX_DEPTH: usize = 256;

/// Binary operators recognised by the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  And,
  Or,
  Xor,
}

impl BinaryOp {
  pub fn from_symbol(symbol: &str) -> Option<Self> {
    Some(match symbol {
      "+" => Self::Add,
      "-" => Self::Sub,
      "*" => Self::Mul,
      "/" => Self::Div,
      "&" => Self::And,
      "|" => Self::Or,
      "^" => Self::Xor,
      _ => return None,
    })
  }

  pub fn symbol(self) -> &'static str {
    match self {
      Self::Add => "+",
      Self::Sub => "-",
      Self::Mul => "*",
      Self::Div => "/",
      Self::And => "&",
      Self::Or => "|",
      Self::Xor => "^",
    }
  }
}

/// `=`, `+=` and `-=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
  Set,
  Add,
  Sub,
}

impl AssignOp {
  pub fn from_symbol(symbol: &str) -> Option<Self> {
    Some(match symbol {
      "=" => Self::Set,
      "+=" => Self::Add,
      "-=" => Self::Sub,
      _ => return None,
    })
  }

  pub fn symbol(self) -> &'static str {
    match self {
      Self::Set => "=",
      Self::Add => "+=",
      Self::Sub => "-=",
    }
  }
}

/// Prefix `++` and `--`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOp {
  Inc,
  Dec,
}

impl StepOp {
  pub fn from_symbol(symbol: &str) -> Option<Self> {
    match symbol {
      "++" => Some(Self::Inc),
      "--" => Some(Self::Dec),
      _ => None,
    }
  }

  pub fn symbol(self) -> &'static str {
    match self {
      Self::Inc => "++",
      Self::Dec => "--",
    }
  }
}

/// Expression tree produced by the parser. Every node owns its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AstNode {
  Num {
    value: i32,
  },
  Var {
    name: String,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<AstNode>,
    rhs: Box<AstNode>,
  },
  Assign {
    op: AssignOp,
    target: String,
    value: Box<AstNode>,
  },
  Step {
    op: StepOp,
    target: String,
    amount: Box<AstNode>,
  },
}

impl AstNode {
  pub fn number(value: i32) -> Self {
    Self::Num { value }
  }

  pub fn var(name: impl Into<String>) -> Self {
    Self::Var { name: name.into() }
  }

  pub fn binary(op: BinaryOp, lhs: AstNode, rhs: AstNode) -> Self {
    Self::Binary {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }

  pub fn assign(op: AssignOp, target: impl Into<String>, value: AstNode) -> Self {
    Self::Assign {
      op,
      target: target.into(),
      value: Box::new(value),
    }
  }

  pub fn step(op: StepOp, target: impl Into<String>) -> Self {
    Self::Step {
      op,
      target: target.into(),
      amount: Box::new(Self::number(1)),
    }
  }
}

/// Prefix traversal: the node's own lexeme, then its left and right children.
impl fmt::Display for AstNode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Num { value } => write!(f, "{value}"),
      Self::Var { name } => f.write_str(name),
      Self::Binary { op, lhs, rhs } => write!(f, "{} {lhs} {rhs}", op.symbol()),
      Self::Assign { op, target, value } => write!(f, "{} {target} {value}", op.symbol()),
      Self::Step { op, target, amount } => write!(f, "{} {target} {amount}", op.symbol()),
    }
  }
}

/// One line of input after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
  /// Physical end of input reached at statement position.
  EndOfInput,
  /// An empty statement.
  Blank,
  Expr(AstNode),
}

/// Parse a single statement, consuming its terminator.
///
/// An end of input directly after an expression also terminates it; it is
/// left buffered so the following call reports [`Statement::EndOfInput`].
pub fn parse_statement<R: Read>(lexer: &mut Lexer<R>) -> CompileResult<Statement> {
  match lexer.current()?.kind {
    TokenKind::EndOfInput => return Ok(Statement::EndOfInput),
    TokenKind::End => {
      lexer.advance()?;
      return Ok(Statement::Blank);
    }
    _ => {}
  }

  let expr = parse_expr(lexer, 0)?;

  match lexer.current()?.kind {
    TokenKind::End => lexer.advance()?,
    TokenKind::EndOfInput => {}
    _ => {
      let token = lexer.take()?;
      return SyntaxSnafu {
        loc: token.loc,
        found: token.describe(),
      }
      .fail();
    }
  }

  Ok(Statement::Expr(expr))
}

/// One level deeper, failing at the token about to be parsed once the
/// nesting limit is reached.
fn nest<R: Read>(lexer: &mut Lexer<R>, depth: usize) -> CompileResult<usize> {
  let loc = lexer.current()?.loc;
  ensure!(
    depth < MAX_DEPTH,
    NestingTooDeepSnafu {
      loc,
      limit: MAX_DEPTH
    }
  );
  Ok(depth + 1)
}

fn parse_expr<R: Read>(lexer: &mut Lexer<R>, depth: usize) -> CompileResult<AstNode> {
  let depth = nest(lexer, depth)?;
  parse_assign(lexer, depth)
}

fn parse_assign<R: Read>(lexer: &mut Lexer<R>, depth: usize) -> CompileResult<AstNode> {
  let node = parse_or(lexer, depth)?;

  if !matches!(lexer.current()?.kind, TokenKind::Assign | TokenKind::AddSubAssign) {
    return Ok(node);
  }

  let token = lexer.take()?;
  let AstNode::Var { name } = node else {
    return NotANameSnafu { loc: token.loc }.fail();
  };
  let op = assign_op(&token)?;
  let depth = nest(lexer, depth)?;
  let value = parse_assign(lexer, depth)?;
  Ok(AstNode::assign(op, name, value))
}

fn parse_or<R: Read>(lexer: &mut Lexer<R>, depth: usize) -> CompileResult<AstNode> {
  fold_binary(lexer, depth, TokenKind::Or, parse_xor)
}

fn parse_xor<R: Read>(lexer: &mut Lexer<R>, depth: usize) -> CompileResult<AstNode> {
  fold_binary(lexer, depth, TokenKind::Xor, parse_and)
}

fn parse_and<R: Read>(lexer: &mut Lexer<R>, depth: usize) -> CompileResult<AstNode> {
  fold_binary(lexer, depth, TokenKind::And, parse_add)
}

fn parse_add<R: Read>(lexer: &mut Lexer<R>, depth: usize) -> CompileResult<AstNode> {
  fold_binary(lexer, depth, TokenKind::AddSub, parse_mul)
}

fn parse_mul<R: Read>(lexer: &mut Lexer<R>, depth: usize) -> CompileResult<AstNode> {
  fold_binary(lexer, depth, TokenKind::MulDiv, parse_unary)
}

/// Parse `next (op next)*` where `op` is any token of `kind`, folding to the left.
///
/// Every link of the chain deepens the tree by one, so it is charged against
/// the nesting limit like a parenthesis.
fn fold_binary<R: Read>(
  lexer: &mut Lexer<R>,
  depth: usize,
  kind: TokenKind,
  next: fn(&mut Lexer<R>, usize) -> CompileResult<AstNode>,
) -> CompileResult<AstNode> {
  let mut node = next(lexer, depth)?;
  let mut depth = depth;

  while lexer.matches(kind)? {
    depth = nest(lexer, depth)?;
    let token = lexer.take()?;
    let op = binary_op(&token)?;
    let rhs = next(lexer, depth)?;
    node = AstNode::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_unary<R: Read>(lexer: &mut Lexer<R>, depth: usize) -> CompileResult<AstNode> {
  if lexer.matches(TokenKind::AddSub)? {
    let depth = nest(lexer, depth)?;
    let token = lexer.take()?;
    let op = binary_op(&token)?;
    let operand = parse_unary(lexer, depth)?;
    return Ok(AstNode::binary(op, AstNode::number(0), operand));
  }

  parse_primary(lexer, depth)
}

fn parse_primary<R: Read>(lexer: &mut Lexer<R>, depth: usize) -> CompileResult<AstNode> {
  let token = lexer.take()?;

  match token.kind {
    TokenKind::Int => Ok(AstNode::number(parse_literal(&token.lexeme))),
    TokenKind::Ident => Ok(AstNode::var(token.lexeme)),
    TokenKind::IncDec => {
      let op = match StepOp::from_symbol(&token.lexeme) {
        Some(op) => op,
        None => return unexpected(&token),
      };
      let target = lexer.current()?;
      if target.kind != TokenKind::Ident {
        return NotANameSnafu { loc: target.loc }.fail();
      }
      let target = lexer.take()?;
      Ok(AstNode::step(op, target.lexeme))
    }
    TokenKind::LParen => {
      let node = parse_expr(lexer, depth)?;
      let close = lexer.current()?;
      if close.kind != TokenKind::RParen {
        return MismatchedParenSnafu { loc: close.loc }.fail();
      }
      lexer.advance()?;
      Ok(node)
    }
    _ => ExpectedNumberOrIdentSnafu {
      loc: token.loc,
      found: token.describe(),
    }
    .fail(),
  }
}

/// Decimal digits to a 32-bit value, wrapping on overflow.
fn parse_literal(digits: &str) -> i32 {
  digits
    .bytes()
    .fold(0i32, |acc, digit| acc.wrapping_mul(10).wrapping_add(i32::from(digit - b'0')))
}

fn binary_op(token: &Token) -> CompileResult<BinaryOp> {
  match BinaryOp::from_symbol(&token.lexeme) {
    Some(op) => Ok(op),
    None => unexpected(token),
  }
}

fn assign_op(token: &Token) -> CompileResult<AssignOp> {
  match AssignOp::from_symbol(&token.lexeme) {
    Some(op) => Ok(op),
    None => unexpected(token),
  }
}

fn unexpected<T>(token: &Token) -> CompileResult<T> {
  SyntaxSnafu {
    loc: token.loc,
    found: token.describe(),
  }
  .fail()
}
