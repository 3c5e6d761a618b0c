//! Constant folding: a pure bottom-up AST rewrite.
//!
//! Subexpressions whose operands are all literals are replaced by their
//! computed literal using the target machine's arithmetic: two's-complement
//! wrapping add/sub/mul, truncating division, shift counts masked to six
//! bits. Literals, variables, increments and calls are left untouched, and
//! division by a literal zero is deliberately not folded so the trap still
//! happens at run time. Folding an already-folded tree returns an identical
//! tree.

use crate::ast::{Block, Expr, Function, GlobalVar, Program, Stmt, UnaryOp};
use crate::ast::BinaryOp;

/// Rewrite a whole program. Must run to completion before code generation
/// starts; the generator relies on global initializers being reduced.
pub fn fold(program: Program) -> Program {
  Program {
    globals: program.globals.into_iter().map(fold_global).collect(),
    functions: program.functions.into_iter().map(fold_function).collect(),
    table: program.table,
  }
}

fn fold_global(mut var: GlobalVar) -> GlobalVar {
  var.init = var.init.map(fold_expr);
  var
}

fn fold_function(mut func: Function) -> Function {
  func.body = func.body.map(fold_block);
  func
}

fn fold_block(block: Block) -> Block {
  Block {
    items: block.items.into_iter().filter_map(fold_stmt).collect(),
    scope: block.scope,
    line: block.line,
  }
}

/// Fold one statement. Returns `None` when the statement is statically dead
/// (an `if` with a false literal condition and no `else`).
fn fold_stmt(stmt: Stmt) -> Option<Stmt> {
  match stmt {
    Stmt::Return { expr, line } => Some(Stmt::Return {
      expr: expr.map(fold_expr),
      line,
    }),
    Stmt::Declare {
      name,
      ty,
      init,
      line,
    } => Some(Stmt::Declare {
      name,
      ty,
      init: init.map(fold_expr),
      line,
    }),
    Stmt::ExprStatement { expr, line } => Some(Stmt::ExprStatement {
      expr: expr.map(fold_expr),
      line,
    }),
    Stmt::If {
      cond,
      then_stmt,
      else_stmt,
      line,
    } => {
      let cond = fold_expr(cond);
      let then_folded = fold_stmt(*then_stmt);
      let else_folded = else_stmt.and_then(|stmt| fold_stmt(*stmt));
      if let Expr::IntLiteral { value, .. } = cond {
        return if value != 0 { then_folded } else { else_folded };
      }
      Some(Stmt::If {
        cond,
        then_stmt: Box::new(then_folded.unwrap_or(Stmt::empty(line))),
        else_stmt: else_folded.map(Box::new),
        line,
      })
    }
    Stmt::For {
      init,
      cond,
      post,
      body,
      scope,
      line,
    } => Some(Stmt::For {
      init: Box::new(fold_stmt(*init).unwrap_or(Stmt::empty(line))),
      cond: cond.map(fold_expr),
      post: post.map(fold_expr),
      body: Box::new(fold_stmt(*body).unwrap_or(Stmt::empty(line))),
      scope,
      line,
    }),
    Stmt::While {
      cond,
      body,
      scope,
      line,
    } => Some(Stmt::While {
      cond: fold_expr(cond),
      body: Box::new(fold_stmt(*body).unwrap_or(Stmt::empty(line))),
      scope,
      line,
    }),
    Stmt::DoWhile {
      body,
      cond,
      scope,
      line,
    } => Some(Stmt::DoWhile {
      body: Box::new(fold_stmt(*body).unwrap_or(Stmt::empty(line))),
      cond: fold_expr(cond),
      scope,
      line,
    }),
    Stmt::Break { line } => Some(Stmt::Break { line }),
    Stmt::Continue { line } => Some(Stmt::Continue { line }),
    Stmt::Block(block) => Some(Stmt::Block(fold_block(block))),
  }
}

fn fold_expr(expr: Expr) -> Expr {
  match expr {
    // Lowest level, nothing to fold.
    Expr::IntLiteral { .. }
    | Expr::Var { .. }
    | Expr::PreIncDec { .. }
    | Expr::PostIncDec { .. }
    | Expr::Call { .. } => expr,

    // Grouping has no runtime meaning once precedence is resolved.
    Expr::Group { inner, .. } => fold_expr(*inner),

    Expr::Unary { op, operand, line } => {
      let operand = fold_expr(*operand);
      if let Expr::IntLiteral { value, .. } = operand {
        let value = match op {
          UnaryOp::Neg => value.wrapping_neg(),
          UnaryOp::BitNot => !value,
          UnaryOp::Not => (value == 0) as i64,
        };
        return Expr::literal(value, line);
      }
      Expr::Unary {
        op,
        operand: Box::new(operand),
        line,
      }
    }

    Expr::Binary { op, lhs, rhs, line } => {
      let lhs = fold_expr(*lhs);
      let rhs = fold_expr(*rhs);
      if let (Expr::IntLiteral { value: a, .. }, Expr::IntLiteral { value: b, .. }) = (&lhs, &rhs)
        && let Some(value) = eval_binary(op, *a, *b)
      {
        return Expr::literal(value, line);
      }
      Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        line,
      }
    }

    Expr::LogicalAnd { lhs, rhs, line } => {
      let lhs = fold_expr(*lhs);
      let rhs = fold_expr(*rhs);
      if let (Expr::IntLiteral { value: a, .. }, Expr::IntLiteral { value: b, .. }) = (&lhs, &rhs) {
        return Expr::literal((*a != 0 && *b != 0) as i64, line);
      }
      Expr::LogicalAnd {
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        line,
      }
    }

    Expr::LogicalOr { lhs, rhs, line } => {
      let lhs = fold_expr(*lhs);
      let rhs = fold_expr(*rhs);
      if let (Expr::IntLiteral { value: a, .. }, Expr::IntLiteral { value: b, .. }) = (&lhs, &rhs) {
        return Expr::literal((*a != 0 || *b != 0) as i64, line);
      }
      Expr::LogicalOr {
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        line,
      }
    }

    Expr::Conditional {
      cond,
      then_expr,
      else_expr,
      line,
    } => {
      let cond = fold_expr(*cond);
      let then_expr = fold_expr(*then_expr);
      let else_expr = fold_expr(*else_expr);
      if let Expr::IntLiteral { value, .. } = cond {
        return if value != 0 { then_expr } else { else_expr };
      }
      Expr::Conditional {
        cond: Box::new(cond),
        then_expr: Box::new(then_expr),
        else_expr: Box::new(else_expr),
        line,
      }
    }

    Expr::Assign {
      target,
      value,
      line,
    } => Expr::Assign {
      target,
      value: Box::new(fold_expr(*value)),
      line,
    },

    Expr::Comma { lhs, rhs, line } => Expr::Comma {
      lhs: Box::new(fold_expr(*lhs)),
      rhs: Box::new(fold_expr(*rhs)),
      line,
    },
  }
}

/// Target-machine arithmetic. Division and remainder by zero return `None`
/// so the expression survives folding untouched.
fn eval_binary(op: BinaryOp, lhs: i64, rhs: i64) -> Option<i64> {
  let value = match op {
    BinaryOp::Add => lhs.wrapping_add(rhs),
    BinaryOp::Sub => lhs.wrapping_sub(rhs),
    BinaryOp::Mul => lhs.wrapping_mul(rhs),
    BinaryOp::Div => {
      if rhs == 0 {
        return None;
      }
      lhs.wrapping_div(rhs)
    }
    BinaryOp::Mod => {
      if rhs == 0 {
        return None;
      }
      lhs.wrapping_rem(rhs)
    }
    BinaryOp::Shl => lhs.wrapping_shl((rhs as u64 & 63) as u32),
    BinaryOp::Shr => lhs.wrapping_shr((rhs as u64 & 63) as u32),
    BinaryOp::BitAnd => lhs & rhs,
    BinaryOp::BitXor => lhs ^ rhs,
    BinaryOp::BitOr => lhs | rhs,
    BinaryOp::Eq => (lhs == rhs) as i64,
    BinaryOp::Ne => (lhs != rhs) as i64,
    BinaryOp::Lt => (lhs < rhs) as i64,
    BinaryOp::Le => (lhs <= rhs) as i64,
    BinaryOp::Gt => (lhs > rhs) as i64,
    BinaryOp::Ge => (lhs >= rhs) as i64,
  };
  Some(value)
}
