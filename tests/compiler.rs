//! End-to-end checks on the shape of the emitted assembly.

use minicc::{compile, CompileError};

fn asm_for(source: &str) -> String {
  compile(source).expect("compile should succeed")
}

/// Byte offset of a needle, for asserting relative instruction order.
fn pos(haystack: &str, needle: &str) -> usize {
  haystack
    .find(needle)
    .unwrap_or_else(|| panic!("expected {needle:?} in:\n{haystack}"))
}

#[test]
fn full_program_shape() {
  let asm = asm_for("int main() {\n  int x = 5;\n  if (x > 3)\n    return x;\n  return 0;\n}");
  assert!(asm.starts_with(".section __TEXT,__text\n"));
  assert!(asm.contains(".globl _main\n_main:\n"));
  assert!(asm.contains("pushq %rbp"));
  assert!(asm.contains("subq $16, %rsp"));
  assert!(asm.contains("movq %rax, -8(%rbp)"));
  assert!(asm.contains("setg %al"));
  assert!(asm.contains("je L_end1"));
  // Both returns share the epilogue sequence.
  assert_eq!(asm.matches("movq %rbp, %rsp").count(), 2);
}

#[test]
fn logical_or_skips_the_right_operand() {
  // The right operand cannot be folded away, so the guard jump must be
  // emitted before its division.
  let asm = asm_for("int main() { return 1 || 10 / 0; }");
  assert!(pos(&asm, "je L_clause1") < pos(&asm, "idivq"));
  assert!(pos(&asm, "movq $1, %rax") < pos(&asm, "L_clause1:"));
}

#[test]
fn logical_and_skips_the_right_operand() {
  let asm = asm_for("int main() { int x = 0; return x && 10 / 0; }");
  assert!(pos(&asm, "jne L_clause1") < pos(&asm, "idivq"));
}

#[test]
fn for_continue_runs_the_post_expression() {
  let asm = asm_for(
    "int main() {\n  int s = 0;\n  for (int i = 0; i < 10; i++) {\n    if (i % 2) continue;\n    s = s + i;\n  }\n  return s;\n}",
  );
  let cont = pos(&asm, "L_cont1:");
  assert!(pos(&asm, "jmp L_cont1") < cont);
  // The increment sits between the continue target and the back edge.
  let back = asm[cont..].find("jmp L_start1").expect("back edge") + cont;
  assert!(asm[cont..back].contains("addq $1,"), "asm was:\n{asm}");
}

#[test]
fn while_continue_targets_the_condition() {
  let asm = asm_for(
    "int main() {\n  int i = 0;\n  while (i < 3) {\n    i++;\n    continue;\n  }\n  return i;\n}",
  );
  assert!(asm.contains("jmp L_start1"), "asm was:\n{asm}");
  assert!(!asm.contains("L_cont"), "asm was:\n{asm}");
}

#[test]
fn do_while_checks_the_condition_after_the_body() {
  let asm = asm_for("int main() {\n  int i = 0;\n  do i++; while (i < 5);\n  return i;\n}");
  let start = pos(&asm, "L_start1:");
  let cond = pos(&asm, "L_cont1:");
  assert!(start < cond);
  assert!(asm.contains("jne L_start1"), "asm was:\n{asm}");
}

#[test]
fn break_leaves_the_innermost_loop() {
  let asm = asm_for(
    "int main() {\n  while (1) {\n    while (1) {\n      break;\n    }\n    break;\n  }\n  return 0;\n}",
  );
  // Inner loop allocates its labels second.
  assert!(asm.contains("jmp L_end2"), "asm was:\n{asm}");
  assert!(asm.contains("jmp L_end1"), "asm was:\n{asm}");
}

#[test]
fn shadowed_locals_get_distinct_slots() {
  let asm = asm_for(
    "int main() {\n  int x = 1;\n  {\n    int x = 2;\n    x = 3;\n  }\n  return x;\n}",
  );
  assert!(asm.contains("movq %rax, -8(%rbp)"));
  assert!(asm.contains("movq %rax, -16(%rbp)"));
  // The trailing read goes to the outer slot.
  let last_store = asm.rfind("movq -8(%rbp), %rax");
  assert!(last_store.is_some(), "asm was:\n{asm}");
}

#[test]
fn loop_scope_locals_count_toward_the_frame() {
  let asm = asm_for(
    "int main() {\n  int a = 0;\n  for (int i = 0; i < 2; i++)\n    a = a + i;\n  while (a) {\n    int b = a;\n    a = b - 1;\n  }\n  return a;\n}",
  );
  // a, i, and b share one frame: 24 bytes rounded to 32.
  assert!(asm.contains("subq $32, %rsp"), "asm was:\n{asm}");
}

#[test]
fn conditional_expression_uses_else_labels() {
  let asm = asm_for("int main() { int x = 7; return x ? 1 : 2; }");
  assert!(pos(&asm, "je L_el1") < pos(&asm, "L_el1:"));
  assert!(pos(&asm, "jmp L_end1") < pos(&asm, "L_end1:"));
}

#[test]
fn call_results_feed_enclosing_expressions() {
  let asm = asm_for("int add(int a, int b) { return a + b; }\nint main() { return add(1, 2) * 3; }");
  assert!(pos(&asm, "callq _add") < pos(&asm, "imulq"));
  assert!(asm.contains("addq $16, %rsp"), "asm was:\n{asm}");
}

#[test]
fn unknown_function_calls_are_left_to_the_linker() {
  let asm = asm_for("int main() { return putchar(65); }");
  assert!(asm.contains("callq _putchar"), "asm was:\n{asm}");
}

#[test]
fn codegen_reports_every_problem_at_once() {
  let errors =
    compile("int main() {\n  undefined1 = 1;\n  break;\n  return undefined2;\n}").expect_err("should fail");
  assert_eq!(errors.len(), 3, "errors were: {errors:?}");
  assert!(errors
    .iter()
    .any(|err| matches!(err, CompileError::LoopControl { .. })));
}

#[test]
fn parse_errors_stop_before_codegen() {
  let errors = compile("int main() { return 1 +\n}").expect_err("should fail");
  assert_eq!(errors.len(), 1);
  assert!(matches!(errors[0], CompileError::Syntax { line: 2, .. }));
}

#[test]
fn global_initializers_may_be_constant_expressions() {
  let asm = asm_for("int width = 8 * 4;\nint height;\nint main() { return width; }");
  assert!(asm.contains("_width:\n    .quad 32"), "asm was:\n{asm}");
  assert!(asm.contains(".zerofill __DATA,__bss,_height,8,3"), "asm was:\n{asm}");
}

#[test]
fn duplicate_global_definition_is_rejected() {
  let errors = compile("int g = 1;\nint g = 2;\nint main() { return g; }").expect_err("should fail");
  assert!(matches!(errors[0], CompileError::DuplicateName { line: 2, .. }));
}

#[test]
fn shift_counts_travel_through_cl() {
  let asm = asm_for("int main() { int n = 3; return 1 << n; }");
  // The count is evaluated first and popped into %rcx before the value.
  assert!(pos(&asm, "movq -8(%rbp), %rax") < pos(&asm, "movq $1, %rax"));
  assert!(pos(&asm, "popq %rcx") < pos(&asm, "salq %cl, %rax"));
}

#[test]
fn right_shift_is_arithmetic() {
  let asm = asm_for("int main() { int n = -8; return n >> 2; }");
  assert!(asm.contains("sarq %cl, %rax"), "asm was:\n{asm}");
}

#[test]
fn bitwise_operators_combine_through_rcx() {
  let asm = asm_for("int main() { int x = 6; return (x & 3) ^ (x | 1); }");
  assert!(asm.contains("andq %rcx, %rax"), "asm was:\n{asm}");
  assert!(asm.contains("orq %rcx, %rax"), "asm was:\n{asm}");
  assert!(asm.contains("xorq %rcx, %rax"), "asm was:\n{asm}");
}

#[test]
fn generated_labels_cannot_collide_with_user_symbols() {
  let asm = asm_for("int end1() { return 1; }\nint main() { if (end1()) return 2; return 3; }");
  // The user's function owns `_end1`; the if's target lands elsewhere.
  assert_eq!(asm.matches("\n_end1:").count(), 1, "asm was:\n{asm}");
  assert!(asm.contains("je L_end1"), "asm was:\n{asm}");
  assert!(asm.contains("L_end1:"), "asm was:\n{asm}");
}

#[test]
fn constant_conditions_fold_whole_branches_away() {
  let asm = asm_for("int main() {\n  if (0) return 10 / 0;\n  return 3;\n}");
  assert!(!asm.contains("idivq"), "asm was:\n{asm}");
  assert!(!asm.contains("je "), "asm was:\n{asm}");
}
