//! Lexical analysis: turns the raw input string into a vector of tokens.
//!
//! The tokenizer is intentionally tiny – it knows nothing about semantics
//! beyond recognising literals, words and operators. Multi-character
//! operators are matched before single-character ones to avoid ambiguity,
//! and reserved words are recognised by exact match after an identifier has
//! been read.

use crate::error::{CompileError, CompileResult};

/// A 1-indexed line/column position in the source text.
///
/// Synthetic nodes (the generated `main`, for example) use the `BUILTIN`
/// sentinel, which displays as `<builtin>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
  pub line: u32,
  pub column: u32,
}

impl SourceLocation {
  pub const BUILTIN: SourceLocation = SourceLocation { line: 0, column: 0 };

  pub fn new(line: u32, column: u32) -> Self {
    Self { line, column }
  }

  pub fn is_builtin(&self) -> bool {
    *self == Self::BUILTIN
  }
}

impl std::fmt::Display for SourceLocation {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    if self.is_builtin() {
      write!(f, "<builtin>")
    } else {
      write!(f, "{}:{}", self.line, self.column)
    }
  }
}

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  IntLiteral,
  BoolLiteral,
  Identifier,
  Keyword,
  Operator,
  Punct,
  End,
}

/// Thin wrapper for lexical information needed by later stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub text: String,
  pub loc: SourceLocation,
}

impl Token {
  pub fn new(kind: TokenKind, text: impl Into<String>, loc: SourceLocation) -> Self {
    Self {
      kind,
      text: text.into(),
      loc,
    }
  }

  /// Human-friendly description used in diagnostics.
  pub fn describe(&self) -> String {
    match self.kind {
      TokenKind::End => "end of input".to_string(),
      _ => format!("\"{}\"", self.text),
    }
  }
}

/// Reserved words that structure the grammar.
const KEYWORDS: &[&str] = &[
  "if", "then", "else", "while", "do", "var", "fun", "return", "break", "continue",
];

/// Reserved words that act as operators in the precedence ladder.
const WORD_OPERATORS: &[&str] = &["and", "or", "not"];

const MULTI_CHAR_OPERATORS: &[&str] = &["==", "!=", "<=", ">="];

struct Scanner<'a> {
  bytes: &'a [u8],
  pos: usize,
  line: u32,
  column: u32,
}

impl<'a> Scanner<'a> {
  fn new(input: &'a str) -> Self {
    Self {
      bytes: input.as_bytes(),
      pos: 0,
      line: 1,
      column: 1,
    }
  }

  fn loc(&self) -> SourceLocation {
    SourceLocation::new(self.line, self.column)
  }

  fn peek(&self) -> Option<u8> {
    self.bytes.get(self.pos).copied()
  }

  fn rest_starts_with(&self, s: &str) -> bool {
    self.bytes[self.pos..].starts_with(s.as_bytes())
  }

  fn advance(&mut self) -> u8 {
    let c = self.bytes[self.pos];
    self.pos += 1;
    if c == b'\n' {
      self.line += 1;
      self.column = 1;
    } else {
      self.column += 1;
    }
    c
  }

  fn advance_by(&mut self, n: usize) {
    for _ in 0..n {
      self.advance();
    }
  }

  /// Consume whitespace and comments. `//` runs to end of line; `/* */`
  /// does not nest and must be terminated before end of input.
  fn skip_trivia(&mut self) -> CompileResult<()> {
    loop {
      match self.peek() {
        Some(c) if c.is_ascii_whitespace() => {
          self.advance();
        }
        Some(b'/') if self.rest_starts_with("//") => {
          while let Some(c) = self.peek()
            && c != b'\n'
          {
            self.advance();
          }
        }
        Some(b'/') if self.rest_starts_with("/*") => {
          let start = self.loc();
          self.advance_by(2);
          loop {
            if self.pos >= self.bytes.len() {
              return Err(CompileError::lexical(start, "unterminated block comment"));
            }
            if self.rest_starts_with("*/") {
              self.advance_by(2);
              break;
            }
            self.advance();
          }
        }
        _ => return Ok(()),
      }
    }
  }

  fn scan_word(&mut self) -> Token {
    let loc = self.loc();
    let start = self.pos;
    while let Some(c) = self.peek()
      && (c.is_ascii_alphanumeric() || c == b'_')
    {
      self.advance();
    }
    let text = std::str::from_utf8(&self.bytes[start..self.pos]).expect("ascii word");
    let kind = if text == "true" || text == "false" {
      TokenKind::BoolLiteral
    } else if WORD_OPERATORS.contains(&text) {
      TokenKind::Operator
    } else if KEYWORDS.contains(&text) {
      TokenKind::Keyword
    } else {
      TokenKind::Identifier
    };
    Token::new(kind, text, loc)
  }

  fn scan_int(&mut self) -> Token {
    let loc = self.loc();
    let start = self.pos;
    while let Some(c) = self.peek()
      && c.is_ascii_digit()
    {
      self.advance();
    }
    let text = std::str::from_utf8(&self.bytes[start..self.pos]).expect("ascii digits");
    Token::new(TokenKind::IntLiteral, text, loc)
  }
}

/// Lex the input into a flat vector of tokens terminated by an `End` marker.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token>> {
  let mut scanner = Scanner::new(input);
  let mut tokens = Vec::new();

  loop {
    scanner.skip_trivia()?;
    let Some(c) = scanner.peek() else { break };
    let loc = scanner.loc();

    if c.is_ascii_digit() {
      tokens.push(scanner.scan_int());
      continue;
    }

    if c.is_ascii_alphabetic() || c == b'_' {
      tokens.push(scanner.scan_word());
      continue;
    }

    if let Some(op) = MULTI_CHAR_OPERATORS
      .iter()
      .find(|op| scanner.rest_starts_with(op))
    {
      scanner.advance_by(op.len());
      tokens.push(Token::new(TokenKind::Operator, *op, loc));
      continue;
    }

    if matches!(c, b'+' | b'-' | b'*' | b'/' | b'%' | b'=' | b'<' | b'>') {
      scanner.advance();
      tokens.push(Token::new(TokenKind::Operator, (c as char).to_string(), loc));
      continue;
    }

    if matches!(c, b'(' | b')' | b'{' | b'}' | b',' | b';' | b':') {
      scanner.advance();
      tokens.push(Token::new(TokenKind::Punct, (c as char).to_string(), loc));
      continue;
    }

    let unexpected = input[scanner.pos..].chars().next().unwrap_or('\0');
    return Err(CompileError::lexical(
      loc,
      format!("unrecognized character '{unexpected}'"),
    ));
  }

  tokens.push(Token::new(TokenKind::End, "", scanner.loc()));
  Ok(tokens)
}
