//! Shared error utilities used across the compilation pipeline.
//!
//! Every stage reports through the same `CompileError` enum so the driver
//! has a single thing to print. Diagnostics carry the source location that
//! produced them whenever one exists; the first error aborts compilation.

use snafu::Snafu;

use crate::tokenizer::SourceLocation;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
pub enum CompileError {
  #[snafu(display("{location}: lexical error: {message}"))]
  Lexical {
    location: SourceLocation,
    message: String,
  },

  #[snafu(display("{location}: syntax error: {message}"))]
  Syntax {
    location: SourceLocation,
    message: String,
  },

  #[snafu(display("{location}: type error: {message}"))]
  Type {
    location: SourceLocation,
    message: String,
  },

  /// Invariant violations between stages. Anything the type checker accepts
  /// must lower cleanly; reaching this variant is a bug in the compiler.
  #[snafu(display("internal compiler error: {message}"))]
  Internal { message: String },

  #[snafu(display("{message}: {source}"))]
  Io {
    message: String,
    source: std::io::Error,
  },

  #[snafu(display("{tool} failed: {detail}"))]
  Toolchain { tool: String, detail: String },
}

impl CompileError {
  /// Construct a lexical error anchored at a source location.
  pub fn lexical(location: SourceLocation, message: impl Into<String>) -> Self {
    Self::Lexical {
      location,
      message: message.into(),
    }
  }

  /// Construct a syntax error anchored at a source location.
  pub fn syntax(location: SourceLocation, message: impl Into<String>) -> Self {
    Self::Syntax {
      location,
      message: message.into(),
    }
  }

  /// Construct a type error anchored at a source location.
  pub fn type_error(location: SourceLocation, message: impl Into<String>) -> Self {
    Self::Type {
      location,
      message: message.into(),
    }
  }

  pub fn internal(message: impl Into<String>) -> Self {
    Self::Internal {
      message: message.into(),
    }
  }

  pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
    Self::Io {
      message: message.into(),
      source,
    }
  }

  pub fn toolchain(tool: impl Into<String>, detail: impl Into<String>) -> Self {
    Self::Toolchain {
      tool: tool.into(),
      detail: detail.into(),
    }
  }
}
