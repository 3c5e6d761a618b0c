//! A compiler for a small integer-only subset of C, targeting x86-64
//! assembly in AT&T syntax with Mach-O conventions.
//!
//! The pipeline is tokenize → parse → constant-fold → generate. Parsing is
//! fail-fast and reports the first syntax error; code generation walks the
//! whole tree and accumulates every diagnostic it finds before failing.

pub mod ast;
pub mod codegen;
pub mod error;
pub mod fold;
pub mod frame;
pub mod labels;
pub mod parser;
pub mod pretty;
pub mod symbols;
pub mod tokenizer;
pub mod ty;

pub use crate::error::{CompileError, CompileResult, Diagnostics};

/// Compile a source file's text to assembly.
///
/// Constant folding always runs between parsing and generation, so literal
/// arithmetic never reaches the emitter and globals may be initialised with
/// constant expressions.
pub fn compile(source: &str) -> Result<String, Vec<CompileError>> {
  let tokens = tokenizer::tokenize(source).map_err(|err| vec![err])?;
  let program = parser::parse(tokens, source).map_err(|err| vec![err])?;
  let program = fold::fold(program);
  codegen::generate(&program).map_err(Diagnostics::into_errors)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn a_minimal_program_compiles() {
    let asm = compile("int main() { return 42; }").expect("compile should succeed");
    assert!(asm.starts_with(".section __TEXT,__text\n"));
    assert!(asm.contains(".globl _main\n_main:\n"));
    assert!(asm.contains("movq $42, %rax"));
  }

  #[test]
  fn lexical_errors_come_back_alone() {
    let errors = compile("int main() { return 1 @ 2; }").expect_err("should fail");
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], CompileError::Lexical { line: 1, .. }));
  }

  #[test]
  fn syntax_errors_come_back_alone() {
    let errors = compile("int main() { return 1 + ; }").expect_err("should fail");
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], CompileError::Syntax { .. }));
  }

  #[test]
  fn folding_lets_globals_use_constant_expressions() {
    let asm = compile("int g = 2 + 2; int main() { return g; }").expect("compile should succeed");
    assert!(asm.contains("_g:\n    .quad 4"), "asm was:\n{asm}");
  }
}
