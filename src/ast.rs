//! AST node definitions shared by the parser, the constant folder and the
//! code generator.
//!
//! Each category is a closed sum type so adding a variant forces every
//! consumer to handle it. Nodes own their children exclusively (boxed where
//! recursive) and every expression or statement carries the source line it
//! came from for diagnostics.

use crate::symbols::SymbolTable;
use crate::ty::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
  Neg,
  BitNot,
  Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Mod,
  Shl,
  Shr,
  BitAnd,
  BitXor,
  BitOr,
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
}

impl BinaryOp {
  /// Non-commutative operators need their second operand evaluated first so
  /// the stack pop puts the first operand where the instruction expects it.
  pub fn is_commutative(&self) -> bool {
    !matches!(
      self,
      BinaryOp::Sub | BinaryOp::Div | BinaryOp::Mod | BinaryOp::Shl | BinaryOp::Shr
    )
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncDecOp {
  Inc,
  Dec,
}

/// Expression tree produced by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  IntLiteral {
    value: i64,
    line: u32,
  },
  Var {
    name: String,
    line: u32,
  },
  Group {
    inner: Box<Expr>,
    line: u32,
  },
  Unary {
    op: UnaryOp,
    operand: Box<Expr>,
    line: u32,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
    line: u32,
  },
  LogicalAnd {
    lhs: Box<Expr>,
    rhs: Box<Expr>,
    line: u32,
  },
  LogicalOr {
    lhs: Box<Expr>,
    rhs: Box<Expr>,
    line: u32,
  },
  Conditional {
    cond: Box<Expr>,
    then_expr: Box<Expr>,
    else_expr: Box<Expr>,
    line: u32,
  },
  Assign {
    target: String,
    value: Box<Expr>,
    line: u32,
  },
  Comma {
    lhs: Box<Expr>,
    rhs: Box<Expr>,
    line: u32,
  },
  PreIncDec {
    name: String,
    op: IncDecOp,
    line: u32,
  },
  PostIncDec {
    name: String,
    op: IncDecOp,
    line: u32,
  },
  Call {
    name: String,
    args: Vec<Expr>,
    line: u32,
  },
}

impl Expr {
  pub fn line(&self) -> u32 {
    match self {
      Expr::IntLiteral { line, .. }
      | Expr::Var { line, .. }
      | Expr::Group { line, .. }
      | Expr::Unary { line, .. }
      | Expr::Binary { line, .. }
      | Expr::LogicalAnd { line, .. }
      | Expr::LogicalOr { line, .. }
      | Expr::Conditional { line, .. }
      | Expr::Assign { line, .. }
      | Expr::Comma { line, .. }
      | Expr::PreIncDec { line, .. }
      | Expr::PostIncDec { line, .. }
      | Expr::Call { line, .. } => *line,
    }
  }

  pub fn literal(value: i64, line: u32) -> Self {
    Expr::IntLiteral { value, line }
  }

  pub fn is_literal(&self) -> bool {
    matches!(self, Expr::IntLiteral { .. })
  }
}

/// A `{}`-delimited statement sequence owning its lexical scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
  pub items: Vec<Stmt>,
  pub scope: SymbolTable,
  pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
  Return {
    expr: Option<Expr>,
    line: u32,
  },
  Declare {
    name: String,
    ty: Type,
    init: Option<Expr>,
    line: u32,
  },
  ExprStatement {
    expr: Option<Expr>,
    line: u32,
  },
  If {
    cond: Expr,
    then_stmt: Box<Stmt>,
    else_stmt: Option<Box<Stmt>>,
    line: u32,
  },
  // Every loop construct owns a scope, pushed before its initializer or
  // condition and popped after its body.
  For {
    init: Box<Stmt>,
    cond: Option<Expr>,
    post: Option<Expr>,
    body: Box<Stmt>,
    scope: SymbolTable,
    line: u32,
  },
  While {
    cond: Expr,
    body: Box<Stmt>,
    scope: SymbolTable,
    line: u32,
  },
  DoWhile {
    body: Box<Stmt>,
    cond: Expr,
    scope: SymbolTable,
    line: u32,
  },
  Break {
    line: u32,
  },
  Continue {
    line: u32,
  },
  Block(Block),
}

impl Stmt {
  /// Placeholder statement used where folding removed a branch entirely.
  pub fn empty(line: u32) -> Self {
    Stmt::ExprStatement { expr: None, line }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
  pub name: String,
  pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
  pub name: String,
  pub params: Vec<Param>,
  pub return_type: Type,
  /// Parameters live in their own scope enclosing the body block.
  pub param_scope: SymbolTable,
  /// `None` for prototypes.
  pub body: Option<Block>,
  pub line: u32,
}

impl Function {
  pub fn is_prototype(&self) -> bool {
    self.body.is_none()
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVar {
  pub name: String,
  pub ty: Type,
  pub init: Option<Expr>,
  pub is_definition: bool,
  pub line: u32,
}

/// Root of the AST: file-scope variables, functions and the global symbol
/// table that both the parser and the code generator consult.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
  pub globals: Vec<GlobalVar>,
  pub functions: Vec<Function>,
  pub table: SymbolTable,
}
