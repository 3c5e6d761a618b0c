//! Code generation: lower the (folded) AST into AT&T x86-64 assembly using
//! Mach-O section and linkage conventions.
//!
//! Expressions are compiled stack-machine style: every expression leaves its
//! value in `%rax`, spilling the pending operand with `pushq`/`popq %rcx`.
//! Non-commutative operators evaluate their second operand first so the pop
//! puts the first operand where the instruction needs it; that ordering is
//! load-bearing. Control flow lowers to unique labels drawn from the
//! per-compilation label generator. Problems found while walking the tree are
//! accumulated into `Diagnostics` rather than aborting, so a single run
//! reports everything; the assembly text must be discarded if any diagnostic
//! was recorded.

use crate::ast::{BinaryOp, Block, Expr, Function, IncDecOp, Program, Stmt, UnaryOp};
use crate::error::{CompileError, Diagnostics};
use crate::frame::FrameAllocator;
use crate::labels::LabelGen;
use crate::symbols::ScopeChain;

/// Generate assembly for a whole program. Deterministic: the only state
/// consumed is the context built here.
pub fn generate(program: &Program) -> Result<String, Diagnostics> {
  let mut generator = Codegen::new(program);
  generator.run();
  if generator.diagnostics.is_empty() {
    Ok(generator.asm)
  } else {
    Err(generator.diagnostics)
  }
}

struct Codegen<'a> {
  program: &'a Program,
  asm: String,
  labels: LabelGen,
  scopes: ScopeChain,
  frame: FrameAllocator,
  diagnostics: Diagnostics,
}

impl<'a> Codegen<'a> {
  fn new(program: &'a Program) -> Self {
    Self {
      program,
      asm: String::new(),
      labels: LabelGen::new(),
      scopes: ScopeChain::new(program.table.clone()),
      frame: FrameAllocator::new(),
      diagnostics: Diagnostics::new(),
    }
  }

  fn run(&mut self) {
    let program = self.program;
    self.raw(".section __TEXT,__text\n");
    for func in &program.functions {
      if let Some(body) = &func.body {
        self.gen_function(func, body);
      }
    }
    self.gen_data_section();
  }

  // ----- emission helpers ---------------------------------------------

  fn raw(&mut self, text: &str) {
    self.asm.push_str(text);
  }

  fn emit(&mut self, instr: &str) {
    self.asm.push_str("    ");
    self.asm.push_str(instr);
    self.asm.push('\n');
  }

  fn place_label(&mut self, label: &str) {
    self.asm.push_str(label);
    self.asm.push_str(":\n");
  }

  // ----- functions ----------------------------------------------------

  fn gen_function(&mut self, func: &Function, body: &Block) {
    // Phase one: size every table in the function before assigning any
    // offset, so the prologue can reserve the whole frame at once.
    self.frame = FrameAllocator::new();
    self.reserve_block(body);
    let frame_size = self.frame.frame_size();

    self.raw(&format!(".globl _{}\n_{}:\n", func.name, func.name));
    self.emit("pushq %rbp");
    self.emit("movq %rsp, %rbp");
    if frame_size > 0 {
      self.emit(&format!("subq ${frame_size}, %rsp"));
    }

    // Arguments were pushed left to right by the caller, so the first
    // parameter sits deepest above the saved frame pointer.
    let mut params = func.param_scope.clone();
    let count = func.params.len() as i64;
    for (index, param) in func.params.iter().enumerate() {
      if let Some(entry) = params.get_mut(&param.name) {
        entry.offset = Some(16 + 8 * (count - 1 - index as i64));
      }
    }
    self.scopes.push(params);

    self.gen_block(body);

    if !matches!(body.items.last(), Some(Stmt::Return { .. })) {
      self.emit("movq $0, %rax");
      self.gen_epilogue();
    }

    self.scopes.pop();
  }

  fn gen_epilogue(&mut self) {
    self.emit("movq %rbp, %rsp");
    self.emit("popq %rbp");
    self.emit("ret");
  }

  fn reserve_block(&mut self, block: &Block) {
    self.frame.reserve(&block.scope);
    for item in &block.items {
      self.reserve_stmt(item);
    }
  }

  fn reserve_stmt(&mut self, stmt: &Stmt) {
    match stmt {
      Stmt::If {
        then_stmt,
        else_stmt,
        ..
      } => {
        self.reserve_stmt(then_stmt);
        if let Some(else_stmt) = else_stmt {
          self.reserve_stmt(else_stmt);
        }
      }
      Stmt::For { scope, body, .. }
      | Stmt::While { scope, body, .. }
      | Stmt::DoWhile { scope, body, .. } => {
        self.frame.reserve(scope);
        self.reserve_stmt(body);
      }
      Stmt::Block(block) => self.reserve_block(block),
      Stmt::Return { .. }
      | Stmt::Declare { .. }
      | Stmt::ExprStatement { .. }
      | Stmt::Break { .. }
      | Stmt::Continue { .. } => {}
    }
  }

  // ----- statements ---------------------------------------------------

  fn gen_block(&mut self, block: &Block) {
    self.scopes.push(block.scope.clone());
    for item in &block.items {
      self.gen_stmt(item);
    }
    self.scopes.pop();
  }

  fn gen_stmt(&mut self, stmt: &Stmt) {
    match stmt {
      Stmt::Return { expr, .. } => {
        match expr {
          Some(expr) => self.gen_expr(expr),
          None => self.emit("movq $0, %rax"),
        }
        self.gen_epilogue();
      }

      Stmt::Declare { name, init, line, .. } => {
        let offset = match self.frame.assign() {
          Ok(offset) => offset,
          Err(err) => {
            self.diagnostics.report(err);
            return;
          }
        };
        let has_init = init.is_some();
        if let Some(table) = self.scopes.current_mut()
          && let Some(entry) = table.get_mut(name)
        {
          entry.offset = Some(offset);
          if has_init {
            entry.initialised = true;
          }
        } else {
          self.diagnostics.report(CompileError::FrameOverflow {
            message: format!("line {line}: declaration of '{name}' outside any scope"),
          });
          return;
        }
        if let Some(init) = init {
          self.gen_expr(init);
          self.emit(&format!("movq %rax, {offset}(%rbp)"));
        }
      }

      Stmt::ExprStatement { expr, .. } => {
        if let Some(expr) = expr {
          self.gen_expr(expr);
        }
      }

      Stmt::If {
        cond,
        then_stmt,
        else_stmt,
        ..
      } => {
        self.gen_expr(cond);
        self.emit("cmpq $0, %rax");
        let end = self.labels.next("end");
        match else_stmt {
          Some(else_stmt) => {
            let else_label = self.labels.next("el");
            self.emit(&format!("je {else_label}"));
            self.gen_stmt(then_stmt);
            self.emit(&format!("jmp {end}"));
            self.place_label(&else_label);
            self.gen_stmt(else_stmt);
          }
          None => {
            self.emit(&format!("je {end}"));
            self.gen_stmt(then_stmt);
          }
        }
        self.place_label(&end);
      }

      Stmt::While {
        cond, body, scope, ..
      } => {
        let start = self.labels.next("start");
        let end = self.labels.next("end");
        self
          .scopes
          .push_loop(scope.clone(), end.clone(), start.clone());
        self.place_label(&start);
        self.gen_expr(cond);
        self.emit("cmpq $0, %rax");
        self.emit(&format!("je {end}"));
        self.gen_stmt(body);
        self.emit(&format!("jmp {start}"));
        self.place_label(&end);
        self.scopes.pop();
      }

      Stmt::DoWhile {
        body, cond, scope, ..
      } => {
        let start = self.labels.next("start");
        let cont = self.labels.next("cont");
        let end = self.labels.next("end");
        self
          .scopes
          .push_loop(scope.clone(), end.clone(), cont.clone());
        self.place_label(&start);
        self.gen_stmt(body);
        self.place_label(&cont);
        self.gen_expr(cond);
        self.emit("cmpq $0, %rax");
        self.emit(&format!("jne {start}"));
        self.place_label(&end);
        self.scopes.pop();
      }

      Stmt::For {
        init,
        cond,
        post,
        body,
        scope,
        ..
      } => {
        let start = self.labels.next("start");
        let cont = self.labels.next("cont");
        let end = self.labels.next("end");
        self
          .scopes
          .push_loop(scope.clone(), end.clone(), cont.clone());
        // The initializer runs exactly once, inside the loop's own scope.
        self.gen_stmt(init);
        self.place_label(&start);
        if let Some(cond) = cond {
          self.gen_expr(cond);
          self.emit("cmpq $0, %rax");
          self.emit(&format!("je {end}"));
        }
        self.gen_stmt(body);
        self.place_label(&cont);
        if let Some(post) = post {
          self.gen_expr(post);
        }
        self.emit(&format!("jmp {start}"));
        self.place_label(&end);
        self.scopes.pop();
      }

      Stmt::Break { line } => {
        let target = self.scopes.break_target().map(str::to_string);
        match target {
          Some(label) => self.emit(&format!("jmp {label}")),
          None => self.diagnostics.report(CompileError::LoopControl {
            keyword: "break".to_string(),
            line: *line,
          }),
        }
      }

      Stmt::Continue { line } => {
        let target = self.scopes.continue_target().map(str::to_string);
        match target {
          Some(label) => self.emit(&format!("jmp {label}")),
          None => self.diagnostics.report(CompileError::LoopControl {
            keyword: "continue".to_string(),
            line: *line,
          }),
        }
      }

      Stmt::Block(block) => self.gen_block(block),
    }
  }

  // ----- expressions --------------------------------------------------

  /// Leaves the expression's value in `%rax` with no net stack effect.
  fn gen_expr(&mut self, expr: &Expr) {
    match expr {
      Expr::IntLiteral { value, .. } => {
        self.emit(&format!("movq ${value}, %rax"));
      }

      Expr::Var { name, line } => match self.location(name, *line, false) {
        Some(location) => self.emit(&format!("movq {location}, %rax")),
        None => self.emit("movq $0, %rax"),
      },

      Expr::Group { inner, .. } => self.gen_expr(inner),

      Expr::Unary { op, operand, .. } => {
        self.gen_expr(operand);
        match op {
          UnaryOp::Neg => self.emit("negq %rax"),
          UnaryOp::BitNot => self.emit("notq %rax"),
          UnaryOp::Not => {
            self.emit("cmpq $0, %rax");
            self.emit("movq $0, %rax");
            self.emit("sete %al");
            self.emit("movzbq %al, %rax");
          }
        }
      }

      Expr::Binary { op, lhs, rhs, .. } => self.gen_binary(*op, lhs, rhs),

      Expr::LogicalOr { lhs, rhs, .. } => {
        let clause = self.labels.next("clause");
        let end = self.labels.next("end");
        self.gen_expr(lhs);
        self.emit("cmpq $0, %rax");
        self.emit(&format!("je {clause}"));
        self.emit("movq $1, %rax");
        self.emit(&format!("jmp {end}"));
        self.place_label(&clause);
        self.gen_expr(rhs);
        self.emit("cmpq $0, %rax");
        self.emit("movq $0, %rax");
        self.emit("setne %al");
        self.emit("movzbq %al, %rax");
        self.place_label(&end);
      }

      Expr::LogicalAnd { lhs, rhs, .. } => {
        let clause = self.labels.next("clause");
        let end = self.labels.next("end");
        self.gen_expr(lhs);
        self.emit("cmpq $0, %rax");
        self.emit(&format!("jne {clause}"));
        // %rax is already zero on this path.
        self.emit(&format!("jmp {end}"));
        self.place_label(&clause);
        self.gen_expr(rhs);
        self.emit("cmpq $0, %rax");
        self.emit("movq $0, %rax");
        self.emit("setne %al");
        self.emit("movzbq %al, %rax");
        self.place_label(&end);
      }

      Expr::Conditional {
        cond,
        then_expr,
        else_expr,
        ..
      } => {
        let else_label = self.labels.next("el");
        let end = self.labels.next("end");
        self.gen_expr(cond);
        self.emit("cmpq $0, %rax");
        self.emit(&format!("je {else_label}"));
        self.gen_expr(then_expr);
        self.emit(&format!("jmp {end}"));
        self.place_label(&else_label);
        self.gen_expr(else_expr);
        self.place_label(&end);
      }

      Expr::Assign {
        target,
        value,
        line,
      } => {
        self.gen_expr(value);
        if let Some(location) = self.location(target, *line, true) {
          self.emit(&format!("movq %rax, {location}"));
        }
      }

      Expr::Comma { lhs, rhs, .. } => {
        self.gen_expr(lhs);
        self.gen_expr(rhs);
      }

      Expr::PreIncDec { name, op, line } => {
        if let Some(location) = self.location(name, *line, true) {
          let instr = match op {
            IncDecOp::Inc => "addq",
            IncDecOp::Dec => "subq",
          };
          self.emit(&format!("{instr} $1, {location}"));
          self.emit(&format!("movq {location}, %rax"));
        } else {
          self.emit("movq $0, %rax");
        }
      }

      Expr::PostIncDec { name, op, line } => {
        if let Some(location) = self.location(name, *line, true) {
          let instr = match op {
            IncDecOp::Inc => "addq",
            IncDecOp::Dec => "subq",
          };
          self.emit(&format!("movq {location}, %rax"));
          self.emit(&format!("{instr} $1, {location}"));
        } else {
          self.emit("movq $0, %rax");
        }
      }

      Expr::Call { name, args, .. } => {
        // Odd argument counts get 8 bytes of padding before the pushes so
        // %rsp is 16-byte aligned at the call instruction.
        let padding = if args.len() % 2 == 1 { 8 } else { 0 };
        if padding > 0 {
          self.emit(&format!("subq ${padding}, %rsp"));
        }
        for arg in args {
          self.gen_expr(arg);
          self.emit("pushq %rax");
        }
        self.emit(&format!("callq _{name}"));
        let cleanup = 8 * args.len() as i64 + padding;
        if cleanup > 0 {
          self.emit(&format!("addq ${cleanup}, %rsp"));
        }
      }
    }
  }

  fn gen_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) {
    if op.is_commutative() {
      // First operand ends up in %rcx, second in %rax.
      self.gen_expr(lhs);
      self.emit("pushq %rax");
      self.gen_expr(rhs);
      self.emit("popq %rcx");
    } else {
      // Second operand is evaluated first so the pop leaves the first
      // operand in %rax where subtraction/division/shifts need it.
      self.gen_expr(rhs);
      self.emit("pushq %rax");
      self.gen_expr(lhs);
      self.emit("popq %rcx");
    }

    match op {
      BinaryOp::Add => self.emit("addq %rcx, %rax"),
      BinaryOp::Mul => self.emit("imulq %rcx, %rax"),
      BinaryOp::BitAnd => self.emit("andq %rcx, %rax"),
      BinaryOp::BitXor => self.emit("xorq %rcx, %rax"),
      BinaryOp::BitOr => self.emit("orq %rcx, %rax"),
      BinaryOp::Sub => self.emit("subq %rcx, %rax"),
      BinaryOp::Div => {
        self.emit("cqo");
        self.emit("idivq %rcx");
      }
      BinaryOp::Mod => {
        self.emit("cqo");
        self.emit("idivq %rcx");
        self.emit("movq %rdx, %rax");
      }
      BinaryOp::Shl => self.emit("salq %cl, %rax"),
      BinaryOp::Shr => self.emit("sarq %cl, %rax"),
      BinaryOp::Eq
      | BinaryOp::Ne
      | BinaryOp::Lt
      | BinaryOp::Le
      | BinaryOp::Gt
      | BinaryOp::Ge => {
        let set = match op {
          BinaryOp::Eq => "sete",
          BinaryOp::Ne => "setne",
          BinaryOp::Lt => "setl",
          BinaryOp::Le => "setle",
          BinaryOp::Gt => "setg",
          BinaryOp::Ge => "setge",
          _ => unreachable!(),
        };
        self.emit("cmpq %rax, %rcx");
        self.emit("movq $0, %rax");
        self.emit(&format!("{set} %al"));
        self.emit("movzbq %al, %rax");
      }
    }
  }

  /// Addressing-mode operand for an identifier: frame-relative for locals
  /// and parameters, instruction-pointer-relative for globals. Writes flag
  /// the entry as initialised. Returns `None` (after recording a
  /// diagnostic) when the name does not resolve.
  fn location(&mut self, name: &str, line: u32, write: bool) -> Option<String> {
    let resolved = match self.scopes.resolve_mut(name, line) {
      Ok((entry, is_global)) => {
        if write {
          entry.initialised = true;
        }
        Ok((entry.offset, is_global))
      }
      Err(err) => Err(err),
    };
    match resolved {
      Ok((_, true)) => Some(format!("_{name}(%rip)")),
      Ok((Some(offset), false)) => Some(format!("{offset}(%rbp)")),
      Ok((None, false)) => {
        self.diagnostics.report(CompileError::FrameOverflow {
          message: format!("line {line}: '{name}' resolved without assigned storage"),
        });
        None
      }
      Err(err) => {
        self.diagnostics.report(err);
        None
      }
    }
  }

  // ----- globals ------------------------------------------------------

  fn gen_data_section(&mut self) {
    let program = self.program;
    let mut initialised: Vec<(&str, i64)> = Vec::new();
    let mut zerofill: Vec<&str> = Vec::new();

    for (name, entry) in program.table.iter() {
      if !entry.ty.is_integer() {
        continue;
      }
      match self.global_initializer(name) {
        Some(value) => initialised.push((name, value)),
        None if entry.initialised => {
          // A non-constant initializer was already reported; emit nothing.
        }
        None => zerofill.push(name),
      }
    }

    if !initialised.is_empty() {
      self.raw("\n.section __DATA,__data\n");
      for (name, value) in initialised {
        self.raw(&format!(
          ".p2align 3\n.globl _{name}\n_{name}:\n    .quad {value}\n"
        ));
      }
    }
    if !zerofill.is_empty() {
      self.raw("\n");
      for name in zerofill {
        self.raw(&format!(
          ".globl _{name}\n.zerofill __DATA,__bss,_{name},8,3\n"
        ));
      }
    }
  }

  /// Literal value of a global's defining initializer. Anything other than
  /// an integer literal (after folding) is a reported
  /// `NonConstantInitializerError`.
  fn global_initializer(&mut self, name: &str) -> Option<i64> {
    let program = self.program;
    for var in &program.globals {
      if var.name != name {
        continue;
      }
      match &var.init {
        Some(Expr::IntLiteral { value, .. }) => return Some(*value),
        Some(init) => {
          self.diagnostics.report(CompileError::NonConstantInitializer {
            name: name.to_string(),
            line: init.line(),
          });
          return None;
        }
        None => {}
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fold;
  use crate::parser::parse;
  use crate::tokenizer::tokenize;

  fn program_for(source: &str) -> Program {
    let tokens = tokenize(source).expect("tokenize should succeed");
    fold::fold(parse(tokens, source).expect("parse should succeed"))
  }

  fn asm_for(source: &str) -> String {
    generate(&program_for(source)).expect("generate should succeed")
  }

  fn errors_for(source: &str) -> Vec<CompileError> {
    generate(&program_for(source))
      .expect_err("generate should fail")
      .into_errors()
  }

  #[test]
  fn prologue_reserves_a_16_byte_multiple() {
    let asm = asm_for("int main() { int a = 1; int b = 2; int c = 3; return a+b+c; }");
    assert!(asm.contains("subq $32, %rsp"), "asm was:\n{asm}");
  }

  #[test]
  fn empty_frames_skip_the_subtraction() {
    let asm = asm_for("int main() { return 0; }");
    assert!(!asm.contains("subq"), "asm was:\n{asm}");
  }

  #[test]
  fn implicit_return_zero_is_appended() {
    let asm = asm_for("int main() { 1 + 1; }");
    assert!(asm.contains("movq $0, %rax\n    movq %rbp, %rsp"));
  }

  #[test]
  fn break_outside_a_loop_is_reported() {
    let errors = errors_for("int main() { break; }");
    assert!(matches!(
      errors[0],
      CompileError::LoopControl { line: 1, .. }
    ));
  }

  #[test]
  fn continue_outside_a_loop_is_reported() {
    let errors = errors_for("int main() { if (1) continue; return 0; }");
    assert!(matches!(errors[0], CompileError::LoopControl { .. }));
  }

  #[test]
  fn undefined_names_accumulate_instead_of_aborting() {
    let errors = errors_for("int main() { a = 1; return b; }");
    assert_eq!(errors.len(), 2);
    assert!(matches!(errors[0], CompileError::UndefinedName { .. }));
    assert!(matches!(errors[1], CompileError::UndefinedName { .. }));
  }

  #[test]
  fn forward_reference_within_a_block_is_undefined() {
    let errors = errors_for("int main() {\n  x = 1;\n  int x;\n  return x;\n}");
    assert!(matches!(
      errors[0],
      CompileError::UndefinedName { line: 2, .. }
    ));
  }

  #[test]
  fn globals_use_rip_relative_addressing() {
    let asm = asm_for("int g = 4; int main() { return g; }");
    assert!(asm.contains("movq _g(%rip), %rax"), "asm was:\n{asm}");
    assert!(asm.contains(".section __DATA,__data"), "asm was:\n{asm}");
    assert!(asm.contains("_g:\n    .quad 4"), "asm was:\n{asm}");
  }

  #[test]
  fn uninitialised_globals_are_zerofilled() {
    let asm = asm_for("int g; int main() { return g; }");
    assert!(
      asm.contains(".zerofill __DATA,__bss,_g,8,3"),
      "asm was:\n{asm}"
    );
  }

  #[test]
  fn non_constant_global_initializer_is_rejected() {
    let errors = errors_for("int g = someFunc(); int main() { return g; }");
    assert!(
      errors
        .iter()
        .any(|err| matches!(err, CompileError::NonConstantInitializer { .. })),
      "errors were: {errors:?}"
    );
  }

  #[test]
  fn odd_argument_counts_pad_the_stack() {
    let asm = asm_for("int f(int a); int main() { return f(1); }");
    assert!(asm.contains("subq $8, %rsp"), "asm was:\n{asm}");
    assert!(asm.contains("callq _f"), "asm was:\n{asm}");
    assert!(asm.contains("addq $16, %rsp"), "asm was:\n{asm}");
  }

  #[test]
  fn even_argument_counts_need_no_padding() {
    let asm = asm_for("int f(int a, int b); int main() { return f(1, 2); }");
    assert!(!asm.contains("subq $8, %rsp"), "asm was:\n{asm}");
    assert!(asm.contains("addq $16, %rsp"), "asm was:\n{asm}");
  }

  #[test]
  fn parameters_are_read_above_the_frame_pointer() {
    let asm = asm_for("int sub(int a, int b) { return a - b; }");
    // a is pushed first (deeper), b second.
    assert!(asm.contains("movq 24(%rbp), %rax"), "asm was:\n{asm}");
    assert!(asm.contains("movq 16(%rbp), %rax"), "asm was:\n{asm}");
  }

  #[test]
  fn prototypes_emit_no_code() {
    let asm = asm_for("int f(int a); int main() { return 0; }");
    assert!(!asm.contains("_f:"), "asm was:\n{asm}");
  }
}
