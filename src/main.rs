use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{self, Command};

use minicc::{compile, parser, pretty, tokenizer};

fn main() {
  let args: Vec<String> = env::args().collect();
  let result = match args.as_slice() {
    [_, path] => run(path),
    [_, flag, path] if flag == "--ast" => dump_ast(path),
    _ => {
      let program = args.first().map(String::as_str).unwrap_or("minicc");
      eprintln!("usage: {program} [--ast] <source.c>");
      process::exit(1);
    }
  };

  if let Err(code) = result {
    process::exit(code);
  }
}

/// Parse the source and print the AST rendered back as source text.
fn dump_ast(source_path: &str) -> Result<(), i32> {
  let source = fs::read_to_string(source_path).map_err(|err| {
    eprintln!("{source_path}: {err}");
    1
  })?;
  let tokens = tokenizer::tokenize(&source).map_err(|err| {
    eprintln!("{err}");
    1
  })?;
  let program = parser::parse(tokens, &source).map_err(|err| {
    eprintln!("{err}");
    1
  })?;
  print!("{}", pretty::program(&program));
  Ok(())
}

/// Compile the source file, assemble and link the result with the system C
/// compiler, run the produced binary, and report its exit status.
fn run(source_path: &str) -> Result<(), i32> {
  let source = fs::read_to_string(source_path).map_err(|err| {
    eprintln!("{source_path}: {err}");
    1
  })?;

  let asm = compile(&source).map_err(|errors| {
    for err in &errors {
      eprintln!("{err}");
    }
    1
  })?;

  let path = Path::new(source_path);
  let asm_path = path.with_extension("s");
  fs::write(&asm_path, &asm).map_err(|err| {
    eprintln!("{}: {err}", asm_path.display());
    1
  })?;

  let binary_path = path.with_extension("");
  let status = Command::new("cc")
    .arg(&asm_path)
    .arg("-o")
    .arg(&binary_path)
    .status()
    .map_err(|err| {
      eprintln!("failed to invoke cc: {err}");
      1
    })?;
  if !status.success() {
    eprintln!("cc failed on {}", asm_path.display());
    return Err(1);
  }

  let status = Command::new(invocable(&binary_path))
    .status()
    .map_err(|err| {
      eprintln!("failed to run {}: {err}", binary_path.display());
      1
    })?;
  // Terminated by signal on Unix if there is no code.
  let code = status.code().unwrap_or(-1);
  println!("Program exited with: {code}");
  Ok(())
}

/// A bare file name would be looked up on PATH; anchor it to the current
/// directory instead.
fn invocable(path: &Path) -> PathBuf {
  if path.components().count() == 1 {
    Path::new(".").join(path)
  } else {
    path.to_path_buf()
  }
}
