//! Lexical analysis: classifies the raw input stream one token at a time.
//!
//! Unlike a whole-file tokenizer, the lexer pulls bytes from a reader on
//! demand and buffers at most one token, so statements typed interactively are
//! compiled as soon as their line ends. It knows nothing about semantics beyond
//! recognising operators, literals and names, and it never reports malformed
//! input itself: unrecognised bytes become [`TokenKind::Unknown`] and the
//! parser decides what to do with them.

use std::io::{Bytes, Read};
use std::iter::Peekable;

use snafu::ResultExt;

use crate::error::{CompileError, CompileResult, IoSnafu, Location};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Int,
  Ident,
  /// `+` or `-`
  AddSub,
  /// `*` or `/`
  MulDiv,
  Assign,
  /// `+=` or `-=`
  AddSubAssign,
  /// `++` or `--`
  IncDec,
  And,
  Or,
  Xor,
  LParen,
  RParen,
  /// Line terminator or `;`.
  End,
  EndOfInput,
  Unknown,
}

/// A classified token together with the text that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub lexeme: String,
  pub loc: Location,
}

impl Token {
  pub fn new(kind: TokenKind, lexeme: impl Into<String>, loc: Location) -> Self {
    Self {
      kind,
      lexeme: lexeme.into(),
      loc,
    }
  }

  /// Human-friendly description used in diagnostics.
  pub fn describe(&self) -> String {
    match self.kind {
      TokenKind::EndOfInput => "EOF".to_string(),
      TokenKind::End if self.lexeme == "\n" => "end of line".to_string(),
      _ => self.lexeme.clone(),
    }
  }
}

/// Streaming scanner with a single token of lookahead.
pub struct Lexer<R: Read> {
  bytes: Peekable<Bytes<R>>,
  current: Option<Token>,
  line: usize,
  column: usize,
  line_text: String,
  at_line_start: bool,
}

impl<R: Read> Lexer<R> {
  pub fn new(reader: R) -> Self {
    Self {
      bytes: reader.bytes().peekable(),
      current: None,
      line: 1,
      column: 1,
      line_text: String::new(),
      at_line_start: false,
    }
  }

  /// Discard the buffered token. The following one is scanned when first
  /// requested, so a finished statement never blocks on the next line.
  pub fn advance(&mut self) -> CompileResult<()> {
    if self.current.take().is_none() {
      self.scan()?;
    }
    Ok(())
  }

  /// The buffered token, scanning one first if nothing is buffered yet.
  pub fn current(&mut self) -> CompileResult<&Token> {
    let token = match self.current.take() {
      Some(token) => token,
      None => self.scan()?,
    };
    Ok(&*self.current.insert(token))
  }

  /// Whether the buffered token has the given kind. Does not consume it.
  pub fn matches(&mut self, kind: TokenKind) -> CompileResult<bool> {
    Ok(self.current()?.kind == kind)
  }

  /// Hand out the buffered token and advance past it.
  pub fn take(&mut self) -> CompileResult<Token> {
    match self.current.take() {
      Some(token) => Ok(token),
      None => self.scan(),
    }
  }

  /// Text of the line being scanned, up to the last byte consumed.
  pub fn current_line(&self) -> &str {
    &self.line_text
  }

  fn location(&self) -> Location {
    Location {
      line: self.line,
      column: self.column,
    }
  }

  fn peek_byte(&mut self) -> CompileResult<Option<u8>> {
    match self.bytes.peek() {
      Some(Ok(byte)) => Ok(Some(*byte)),
      Some(Err(_)) => match self.bytes.next() {
        Some(Err(source)) => Err(CompileError::Io { source }),
        _ => Ok(None),
      },
      None => Ok(None),
    }
  }

  fn bump(&mut self) -> CompileResult<Option<u8>> {
    let Some(byte) = self.bytes.next().transpose().context(IoSnafu)? else {
      return Ok(None);
    };

    if self.at_line_start {
      self.line_text.clear();
      self.at_line_start = false;
    }
    self.line_text.push(byte as char);

    if byte == b'\n' {
      self.line += 1;
      self.column = 1;
      self.at_line_start = true;
    } else {
      self.column += 1;
    }
    Ok(Some(byte))
  }

  fn bump_while(&mut self, lexeme: &mut String, accept: impl Fn(u8) -> bool) -> CompileResult<()> {
    while let Some(byte) = self.peek_byte()?
      && accept(byte)
    {
      self.bump()?;
      lexeme.push(byte as char);
    }
    Ok(())
  }

  fn scan(&mut self) -> CompileResult<Token> {
    while let Some(b' ' | b'\t' | b'\r') = self.peek_byte()? {
      self.bump()?;
    }

    let loc = self.location();
    let Some(c) = self.bump()? else {
      return Ok(Token::new(TokenKind::EndOfInput, "", loc));
    };
    let mut lexeme = String::from(c as char);

    let kind = match c {
      b'0'..=b'9' => {
        self.bump_while(&mut lexeme, |b| b.is_ascii_digit())?;
        TokenKind::Int
      }
      b'a'..=b'z' | b'A'..=b'Z' => {
        self.bump_while(&mut lexeme, |b| b.is_ascii_alphanumeric() || b == b'_')?;
        TokenKind::Ident
      }
      b'+' | b'-' => match self.peek_byte()? {
        Some(next) if next == c => {
          self.bump()?;
          lexeme.push(next as char);
          TokenKind::IncDec
        }
        Some(b'=') => {
          self.bump()?;
          lexeme.push('=');
          TokenKind::AddSubAssign
        }
        _ => TokenKind::AddSub,
      },
      b'*' | b'/' => TokenKind::MulDiv,
      b'=' => TokenKind::Assign,
      b'(' => TokenKind::LParen,
      b')' => TokenKind::RParen,
      b'&' => TokenKind::And,
      b'|' => TokenKind::Or,
      b'^' => TokenKind::Xor,
      b'\n' | b';' => TokenKind::End,
      _ => TokenKind::Unknown,
    };

    Ok(Token::new(kind, lexeme, loc))
  }
}
