//! Render the AST back to C-like source text.
//!
//! Used for debugging parser output: `minicc --ast file.c` prints the tree
//! this module produces instead of compiling. The rendering is one
//! statement per line with two-space nesting; grouping parentheses survive
//! because the parser keeps them as `Group` nodes until folding.

use crate::ast::{BinaryOp, Expr, Function, IncDecOp, Program, Stmt, UnaryOp};

pub fn program(node: &Program) -> String {
  let mut out = String::new();
  for var in &node.globals {
    match &var.init {
      Some(init) => out.push_str(&format!("int {} = {};\n", var.name, expr(init))),
      None => out.push_str(&format!("int {};\n", var.name)),
    }
  }
  for func in &node.functions {
    out.push_str(&function(func));
  }
  out
}

pub fn function(func: &Function) -> String {
  let params: Vec<String> = func
    .params
    .iter()
    .map(|param| format!("int {}", param.name))
    .collect();
  let header = format!("int {}({})", func.name, params.join(", "));
  match &func.body {
    None => format!("{header};\n"),
    Some(body) => {
      let mut out = format!("{header} {{\n");
      for item in &body.items {
        write_stmt(item, 1, &mut out);
      }
      out.push_str("}\n");
      out
    }
  }
}

pub fn stmt(node: &Stmt) -> String {
  let mut out = String::new();
  write_stmt(node, 0, &mut out);
  out
}

fn write_stmt(node: &Stmt, depth: usize, out: &mut String) {
  let pad = "  ".repeat(depth);
  match node {
    Stmt::Return { expr: value, .. } => match value {
      Some(value) => out.push_str(&format!("{pad}return {};\n", expr(value))),
      None => out.push_str(&format!("{pad}return;\n")),
    },

    Stmt::Declare { name, init, .. } => match init {
      Some(init) => out.push_str(&format!("{pad}int {name} = {};\n", expr(init))),
      None => out.push_str(&format!("{pad}int {name};\n")),
    },

    Stmt::ExprStatement { expr: value, .. } => match value {
      Some(value) => out.push_str(&format!("{pad}{};\n", expr(value))),
      None => out.push_str(&format!("{pad};\n")),
    },

    Stmt::If {
      cond,
      then_stmt,
      else_stmt,
      ..
    } => {
      out.push_str(&format!("{pad}if ({})\n", expr(cond)));
      write_stmt(then_stmt, depth + 1, out);
      if let Some(else_stmt) = else_stmt {
        out.push_str(&format!("{pad}else\n"));
        write_stmt(else_stmt, depth + 1, out);
      }
    }

    Stmt::For {
      init,
      cond,
      post,
      body,
      ..
    } => {
      let cond = cond.as_ref().map(expr).unwrap_or_default();
      let post = post.as_ref().map(expr).unwrap_or_default();
      out.push_str(&format!(
        "{pad}for ({}; {cond}; {post})\n",
        header_stmt(init)
      ));
      write_stmt(body, depth + 1, out);
    }

    Stmt::While { cond, body, .. } => {
      out.push_str(&format!("{pad}while ({})\n", expr(cond)));
      write_stmt(body, depth + 1, out);
    }

    Stmt::DoWhile { body, cond, .. } => {
      out.push_str(&format!("{pad}do\n"));
      write_stmt(body, depth + 1, out);
      out.push_str(&format!("{pad}while ({});\n", expr(cond)));
    }

    Stmt::Break { .. } => out.push_str(&format!("{pad}break;\n")),
    Stmt::Continue { .. } => out.push_str(&format!("{pad}continue;\n")),

    Stmt::Block(block) => {
      out.push_str(&format!("{pad}{{\n"));
      for item in &block.items {
        write_stmt(item, depth + 1, out);
      }
      out.push_str(&format!("{pad}}}\n"));
    }
  }
}

/// A `for` initializer rendered without indentation or trailing semicolon.
fn header_stmt(node: &Stmt) -> String {
  match node {
    Stmt::Declare { name, init, .. } => match init {
      Some(init) => format!("int {name} = {}", expr(init)),
      None => format!("int {name}"),
    },
    Stmt::ExprStatement { expr: value, .. } => value.as_ref().map(expr).unwrap_or_default(),
    other => stmt(other).trim().trim_end_matches(';').to_string(),
  }
}

pub fn expr(node: &Expr) -> String {
  match node {
    Expr::IntLiteral { value, .. } => value.to_string(),
    Expr::Var { name, .. } => name.clone(),
    Expr::Group { inner, .. } => format!("({})", expr(inner)),
    Expr::Unary { op, operand, .. } => format!("{}{}", unary_symbol(*op), expr(operand)),
    Expr::Binary { op, lhs, rhs, .. } => {
      format!("{} {} {}", expr(lhs), binary_symbol(*op), expr(rhs))
    }
    Expr::LogicalAnd { lhs, rhs, .. } => format!("{} && {}", expr(lhs), expr(rhs)),
    Expr::LogicalOr { lhs, rhs, .. } => format!("{} || {}", expr(lhs), expr(rhs)),
    Expr::Conditional {
      cond,
      then_expr,
      else_expr,
      ..
    } => format!("{} ? {} : {}", expr(cond), expr(then_expr), expr(else_expr)),
    Expr::Assign { target, value, .. } => format!("{target} = {}", expr(value)),
    Expr::Comma { lhs, rhs, .. } => format!("{}, {}", expr(lhs), expr(rhs)),
    Expr::PreIncDec { name, op, .. } => format!("{}{name}", incdec_symbol(*op)),
    Expr::PostIncDec { name, op, .. } => format!("{name}{}", incdec_symbol(*op)),
    Expr::Call { name, args, .. } => {
      let args: Vec<String> = args.iter().map(expr).collect();
      format!("{name}({})", args.join(", "))
    }
  }
}

fn unary_symbol(op: UnaryOp) -> &'static str {
  match op {
    UnaryOp::Neg => "-",
    UnaryOp::BitNot => "~",
    UnaryOp::Not => "!",
  }
}

fn binary_symbol(op: BinaryOp) -> &'static str {
  match op {
    BinaryOp::Add => "+",
    BinaryOp::Sub => "-",
    BinaryOp::Mul => "*",
    BinaryOp::Div => "/",
    BinaryOp::Mod => "%",
    BinaryOp::Shl => "<<",
    BinaryOp::Shr => ">>",
    BinaryOp::BitAnd => "&",
    BinaryOp::BitXor => "^",
    BinaryOp::BitOr => "|",
    BinaryOp::Eq => "==",
    BinaryOp::Ne => "!=",
    BinaryOp::Lt => "<",
    BinaryOp::Le => "<=",
    BinaryOp::Gt => ">",
    BinaryOp::Ge => ">=",
  }
}

fn incdec_symbol(op: IncDecOp) -> &'static str {
  match op {
    IncDecOp::Inc => "++",
    IncDecOp::Dec => "--",
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parser::parse;
  use crate::tokenizer::tokenize;

  fn rendered(source: &str) -> String {
    let tokens = tokenize(source).expect("tokenize should succeed");
    program(&parse(tokens, source).expect("parse should succeed"))
  }

  #[test]
  fn expressions_read_back_as_source() {
    let text = rendered("int main() { return 1+2*3; }");
    assert!(text.contains("return 1 + 2 * 3;"), "text was:\n{text}");
  }

  #[test]
  fn grouping_parentheses_survive() {
    let text = rendered("int main() { return (1+2)*3; }");
    assert!(text.contains("return (1 + 2) * 3;"), "text was:\n{text}");
  }

  #[test]
  fn statements_nest_with_indentation() {
    let text = rendered("int main() { int x = 1; if (x) { x = 2; } return x; }");
    assert!(text.contains("int main() {\n"), "text was:\n{text}");
    assert!(text.contains("  if (x)\n    {\n      x = 2;\n"), "text was:\n{text}");
    assert!(text.ends_with("}\n"), "text was:\n{text}");
  }

  #[test]
  fn for_headers_render_inline() {
    let text = rendered("int main() { for (int i = 0; i < 3; i++) ; return 0; }");
    assert!(
      text.contains("for (int i = 0; i < 3; i++)"),
      "text was:\n{text}"
    );
  }

  #[test]
  fn prototypes_globals_and_calls_render() {
    let text = rendered("int g = 4;\nint add(int a, int b);\nint main() { return add(g, -1); }");
    assert!(text.contains("int g = 4;\n"), "text was:\n{text}");
    assert!(text.contains("int add(int a, int b);\n"), "text was:\n{text}");
    assert!(text.contains("return add(g, -1);"), "text was:\n{text}");
  }

  #[test]
  fn ternary_and_incdec_render() {
    let text = rendered("int main() { int x = 0; return x ? ++x : x--; }");
    assert!(text.contains("return x ? ++x : x--;"), "text was:\n{text}");
  }
}
