//! Shared error utilities used across the compilation pipeline.
//!
//! Every failure the compiler can report is a `CompileError` variant. Lexing
//! and parsing fail fast with a single error; code generation records what it
//! finds into a `Diagnostics` list and keeps walking so one run reports every
//! problem in the translation unit.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum CompileError {
  #[snafu(display("line {line}: ill-formed token: {message}"))]
  Lexical { message: String, line: u32 },

  #[snafu(display("line {line}: expected {expected}, but got \"{found}\""))]
  Syntax {
    expected: String,
    found: String,
    line: u32,
  },

  #[snafu(display("line {line}: '{name}' is not defined"))]
  UndefinedName { name: String, line: u32 },

  #[snafu(display("line {line}: '{name}' is already declared in this scope"))]
  DuplicateName { name: String, line: u32 },

  #[snafu(display("line {line}: initializer for '{name}' is not a constant"))]
  NonConstantInitializer { name: String, line: u32 },

  #[snafu(display("line {line}: '{keyword}' used outside of a loop"))]
  LoopControl { keyword: String, line: u32 },

  #[snafu(display("frame allocator out of sync: {message}"))]
  FrameOverflow { message: String },
}

/// Errors accumulated while walking the AST during code generation.
///
/// Generation never aborts on the first problem; the caller must check
/// `is_empty` and discard the assembly text if anything was recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
  errors: Vec<CompileError>,
}

impl Diagnostics {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn report(&mut self, error: CompileError) {
    self.errors.push(error);
  }

  pub fn is_empty(&self) -> bool {
    self.errors.is_empty()
  }

  pub fn len(&self) -> usize {
    self.errors.len()
  }

  pub fn iter(&self) -> impl Iterator<Item = &CompileError> {
    self.errors.iter()
  }

  pub fn into_errors(self) -> Vec<CompileError> {
    self.errors
  }
}
