//! Recursive-descent parser producing a `Program` AST with block-scoped
//! symbol tables attached to each block.
//!
//! The expression grammar is a precedence ladder, lowest to highest binding:
//! comma < assignment < conditional < logical-or < logical-and < equality <
//! relational < bit-or < bit-xor < bit-and < shift < additive <
//! multiplicative < unary < primary. Binary levels are left-associative
//! loops; assignment and conditional recurse right-associatively. Parsing is
//! fail-fast: the first unexpected token aborts with a `SyntaxError`.

use std::collections::HashSet;

use crate::ast::{
  BinaryOp, Block, Expr, Function, GlobalVar, IncDecOp, Param, Program, Stmt, UnaryOp,
};
use crate::error::{CompileError, CompileResult};
use crate::symbols::SymbolTable;
use crate::tokenizer::{Token, TokenKind, describe_token, token_text};
use crate::ty::Type;

/// Parse a token stream into a `Program`.
pub fn parse(tokens: Vec<Token>, source: &str) -> CompileResult<Program> {
  Parser::new(tokens, source).parse_program()
}

struct Parser<'a> {
  tokens: Vec<Token>,
  source: &'a str,
  pos: usize,
  /// Tables of the blocks currently being parsed, innermost last.
  scopes: Vec<SymbolTable>,
  /// File-scope variables and function signatures.
  globals: SymbolTable,
  defined_functions: HashSet<String>,
}

impl<'a> Parser<'a> {
  fn new(tokens: Vec<Token>, source: &'a str) -> Self {
    Self {
      tokens,
      source,
      pos: 0,
      scopes: Vec::new(),
      globals: SymbolTable::new(),
      defined_functions: HashSet::new(),
    }
  }

  // ----- token cursor -------------------------------------------------

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  fn advance(&mut self) {
    if self.pos + 1 < self.tokens.len() {
      self.pos += 1;
    }
  }

  fn line(&self) -> u32 {
    self.peek().map(|token| token.line).unwrap_or(1)
  }

  fn is_eof(&self) -> bool {
    matches!(self.peek().map(|token| token.kind), Some(TokenKind::Eof))
  }

  /// Text of the current token if it is a punctuator.
  fn peek_punct(&self) -> Option<&'a str> {
    self
      .peek()
      .filter(|token| token.kind == TokenKind::Punctuator)
      .map(|token| token_text(token, self.source))
  }

  fn at_punct(&self, op: &str) -> bool {
    self.peek_punct() == Some(op)
  }

  fn at_keyword(&self, keyword: &str) -> bool {
    self
      .peek()
      .filter(|token| token.kind == TokenKind::Keyword)
      .map(|token| token_text(token, self.source) == keyword)
      .unwrap_or(false)
  }

  /// Consume the current token if it matches the provided punctuator.
  fn equal(&mut self, op: &str) -> bool {
    if self.at_punct(op) {
      self.advance();
      return true;
    }
    false
  }

  fn eat_keyword(&mut self, keyword: &str) -> bool {
    if self.at_keyword(keyword) {
      self.advance();
      return true;
    }
    false
  }

  fn syntax_error(&self, expected: impl Into<String>) -> CompileError {
    CompileError::Syntax {
      expected: expected.into(),
      found: describe_token(self.peek(), self.source),
      line: self.line(),
    }
  }

  fn skip(&mut self, op: &str) -> CompileResult<()> {
    if self.equal(op) {
      Ok(())
    } else {
      Err(self.syntax_error(format!("\"{op}\"")))
    }
  }

  fn expect_keyword(&mut self, keyword: &str) -> CompileResult<()> {
    if self.eat_keyword(keyword) {
      Ok(())
    } else {
      Err(self.syntax_error(format!("\"{keyword}\"")))
    }
  }

  /// Parse the current token as an identifier, returning its text and line.
  fn expect_ident(&mut self) -> CompileResult<(String, u32)> {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Ident
    {
      let name = token_text(token, self.source).to_string();
      let line = token.line;
      self.advance();
      return Ok((name, line));
    }
    Err(self.syntax_error("an identifier"))
  }

  // ----- top level ----------------------------------------------------

  fn parse_program(&mut self) -> CompileResult<Program> {
    let mut globals = Vec::new();
    let mut functions = Vec::new();

    while !self.is_eof() {
      self.expect_keyword("int")?;
      let (name, line) = self.expect_ident()?;
      if self.equal("(") {
        functions.push(self.parse_function(name, line)?);
      } else {
        globals.push(self.parse_global_var(name, line)?);
      }
    }

    Ok(Program {
      globals,
      functions,
      table: std::mem::take(&mut self.globals),
    })
  }

  fn parse_global_var(&mut self, name: String, line: u32) -> CompileResult<GlobalVar> {
    let init = if self.equal("=") {
      Some(self.parse_assign()?)
    } else {
      None
    };
    self.skip(";")?;

    if self.globals.get(&name).is_none() {
      self
        .globals
        .declare(&name, Type::Int, line, init.is_some())?;
    } else if let Some(entry) = self.globals.get_mut(&name) {
      // Redeclaring an existing global is fine; a second initializer or a
      // clash with a function name is not.
      if entry.ty.is_function() || (init.is_some() && entry.initialised) {
        return Err(CompileError::DuplicateName { name, line });
      }
      if init.is_some() {
        entry.initialised = true;
      }
    }

    let is_definition = init.is_some();
    Ok(GlobalVar {
      name,
      ty: Type::Int,
      init,
      is_definition,
      line,
    })
  }

  fn parse_function(&mut self, name: String, line: u32) -> CompileResult<Function> {
    let mut params = Vec::new();
    if !self.equal(")") {
      loop {
        self.expect_keyword("int")?;
        let (param, _) = self.expect_ident()?;
        params.push(Param {
          name: param,
          ty: Type::Int,
        });
        if !self.equal(",") {
          break;
        }
      }
      self.skip(")")?;
    }

    match self.globals.get(&name).map(|entry| entry.ty) {
      None => self.globals.declare(&name, Type::Function, line, false)?,
      Some(ty) if !ty.is_function() => {
        return Err(CompileError::DuplicateName { name, line });
      }
      Some(_) => {}
    }

    let mut param_scope = SymbolTable::new();
    for param in &params {
      param_scope.declare(&param.name, param.ty, line, true)?;
    }

    if self.equal(";") {
      return Ok(Function {
        name,
        params,
        return_type: Type::Int,
        param_scope,
        body: None,
        line,
      });
    }

    if !self.defined_functions.insert(name.clone()) {
      return Err(CompileError::DuplicateName { name, line });
    }

    let body_line = self.line();
    self.skip("{")?;
    self.scopes.push(param_scope);
    let body = self.parse_block(body_line)?;
    let param_scope = match self.scopes.pop() {
      Some(table) => table,
      None => unreachable!("parameter scope is pushed above"),
    };

    Ok(Function {
      name,
      params,
      return_type: Type::Int,
      param_scope,
      body: Some(body),
      line,
    })
  }

  // ----- statements ---------------------------------------------------

  /// Parse block items up to the closing brace; the opening brace has
  /// already been consumed.
  fn parse_block(&mut self, line: u32) -> CompileResult<Block> {
    self.scopes.push(SymbolTable::new());
    let mut items = Vec::new();
    while !self.equal("}") {
      if self.is_eof() {
        return Err(self.syntax_error("\"}\""));
      }
      items.push(self.parse_block_item()?);
    }
    let scope = match self.scopes.pop() {
      Some(table) => table,
      None => unreachable!("block scope is pushed above"),
    };
    Ok(Block { items, scope, line })
  }

  /// Declarations are only legal directly inside a block (or as a `for`
  /// initializer), never as the lone target of `if`/`else` or a loop.
  fn parse_block_item(&mut self) -> CompileResult<Stmt> {
    if self.at_keyword("int") {
      self.parse_declaration()
    } else {
      self.parse_statement()
    }
  }

  fn parse_declaration(&mut self) -> CompileResult<Stmt> {
    self.expect_keyword("int")?;
    let (name, line) = self.expect_ident()?;

    // Register before the initializer is parsed so the entry's declaration
    // line is in place for forward-reference checks.
    self.declare_in_current(&name, line)?;

    let init = if self.equal("=") {
      Some(self.parse_assign()?)
    } else {
      None
    };
    self.skip(";")?;

    if init.is_some()
      && let Some(table) = self.scopes.last_mut()
      && let Some(entry) = table.get_mut(&name)
    {
      entry.initialised = true;
    }

    Ok(Stmt::Declare {
      name,
      ty: Type::Int,
      init,
      line,
    })
  }

  fn declare_in_current(&mut self, name: &str, line: u32) -> CompileResult<()> {
    match self.scopes.last_mut() {
      Some(table) => table.declare(name, Type::Int, line, false),
      None => unreachable!("declarations are only parsed inside a scope"),
    }
  }

  fn parse_statement(&mut self) -> CompileResult<Stmt> {
    let line = self.line();

    if self.eat_keyword("return") {
      let expr = if self.at_punct(";") {
        None
      } else {
        Some(self.parse_expr()?)
      };
      self.skip(";")?;
      return Ok(Stmt::Return { expr, line });
    }

    if self.eat_keyword("if") {
      self.skip("(")?;
      let cond = self.parse_expr()?;
      self.skip(")")?;
      let then_stmt = Box::new(self.parse_statement()?);
      let else_stmt = if self.eat_keyword("else") {
        Some(Box::new(self.parse_statement()?))
      } else {
        None
      };
      return Ok(Stmt::If {
        cond,
        then_stmt,
        else_stmt,
        line,
      });
    }

    if self.eat_keyword("for") {
      self.scopes.push(SymbolTable::new());
      self.skip("(")?;
      let init = if self.at_keyword("int") {
        self.parse_declaration()?
      } else {
        let init_line = self.line();
        let expr = if self.at_punct(";") {
          None
        } else {
          Some(self.parse_expr()?)
        };
        self.skip(";")?;
        Stmt::ExprStatement {
          expr,
          line: init_line,
        }
      };
      let cond = if self.at_punct(";") {
        None
      } else {
        Some(self.parse_expr()?)
      };
      self.skip(";")?;
      let post = if self.at_punct(")") {
        None
      } else {
        Some(self.parse_expr()?)
      };
      self.skip(")")?;
      let body = Box::new(self.parse_statement()?);
      let scope = self.pop_loop_scope();
      return Ok(Stmt::For {
        init: Box::new(init),
        cond,
        post,
        body,
        scope,
        line,
      });
    }

    if self.eat_keyword("while") {
      self.scopes.push(SymbolTable::new());
      self.skip("(")?;
      let cond = self.parse_expr()?;
      self.skip(")")?;
      let body = Box::new(self.parse_statement()?);
      let scope = self.pop_loop_scope();
      return Ok(Stmt::While {
        cond,
        body,
        scope,
        line,
      });
    }

    if self.eat_keyword("do") {
      self.scopes.push(SymbolTable::new());
      let body = Box::new(self.parse_statement()?);
      self.expect_keyword("while")?;
      self.skip("(")?;
      let cond = self.parse_expr()?;
      self.skip(")")?;
      self.skip(";")?;
      let scope = self.pop_loop_scope();
      return Ok(Stmt::DoWhile {
        body,
        cond,
        scope,
        line,
      });
    }

    if self.eat_keyword("break") {
      self.skip(";")?;
      return Ok(Stmt::Break { line });
    }

    if self.eat_keyword("continue") {
      self.skip(";")?;
      return Ok(Stmt::Continue { line });
    }

    if self.equal("{") {
      return Ok(Stmt::Block(self.parse_block(line)?));
    }

    if self.at_keyword("int") {
      return Err(self.syntax_error("a statement (declarations need an enclosing block)"));
    }

    let expr = if self.at_punct(";") {
      None
    } else {
      Some(self.parse_expr()?)
    };
    self.skip(";")?;
    Ok(Stmt::ExprStatement { expr, line })
  }

  fn pop_loop_scope(&mut self) -> SymbolTable {
    match self.scopes.pop() {
      Some(table) => table,
      None => unreachable!("loop scope is pushed before its initializer"),
    }
  }

  // ----- expressions --------------------------------------------------

  fn parse_expr(&mut self) -> CompileResult<Expr> {
    self.parse_comma()
  }

  fn parse_comma(&mut self) -> CompileResult<Expr> {
    let mut node = self.parse_assign()?;
    while self.at_punct(",") {
      let line = self.line();
      self.advance();
      let rhs = self.parse_assign()?;
      node = Expr::Comma {
        lhs: Box::new(node),
        rhs: Box::new(rhs),
        line,
      };
    }
    Ok(node)
  }

  fn parse_assign(&mut self) -> CompileResult<Expr> {
    let node = self.parse_conditional()?;
    if self.at_punct("=") {
      let line = self.line();
      let Expr::Var { name, .. } = node else {
        return Err(self.syntax_error("an assignable variable before \"=\""));
      };
      self.advance();
      let value = self.parse_assign()?;
      return Ok(Expr::Assign {
        target: name,
        value: Box::new(value),
        line,
      });
    }
    Ok(node)
  }

  fn parse_conditional(&mut self) -> CompileResult<Expr> {
    let cond = self.parse_logical_or()?;
    if self.at_punct("?") {
      let line = self.line();
      self.advance();
      let then_expr = self.parse_expr()?;
      self.skip(":")?;
      let else_expr = self.parse_conditional()?;
      return Ok(Expr::Conditional {
        cond: Box::new(cond),
        then_expr: Box::new(then_expr),
        else_expr: Box::new(else_expr),
        line,
      });
    }
    Ok(cond)
  }

  fn parse_logical_or(&mut self) -> CompileResult<Expr> {
    let mut node = self.parse_logical_and()?;
    while self.at_punct("||") {
      let line = self.line();
      self.advance();
      let rhs = self.parse_logical_and()?;
      node = Expr::LogicalOr {
        lhs: Box::new(node),
        rhs: Box::new(rhs),
        line,
      };
    }
    Ok(node)
  }

  fn parse_logical_and(&mut self) -> CompileResult<Expr> {
    let mut node = self.parse_equality()?;
    while self.at_punct("&&") {
      let line = self.line();
      self.advance();
      let rhs = self.parse_equality()?;
      node = Expr::LogicalAnd {
        lhs: Box::new(node),
        rhs: Box::new(rhs),
        line,
      };
    }
    Ok(node)
  }

  fn parse_equality(&mut self) -> CompileResult<Expr> {
    let mut node = self.parse_relational()?;
    loop {
      let op = match self.peek_punct() {
        Some("==") => BinaryOp::Eq,
        Some("!=") => BinaryOp::Ne,
        _ => break,
      };
      let line = self.line();
      self.advance();
      let rhs = self.parse_relational()?;
      node = Expr::Binary {
        op,
        lhs: Box::new(node),
        rhs: Box::new(rhs),
        line,
      };
    }
    Ok(node)
  }

  fn parse_relational(&mut self) -> CompileResult<Expr> {
    let mut node = self.parse_bit_or()?;
    loop {
      let op = match self.peek_punct() {
        Some("<") => BinaryOp::Lt,
        Some("<=") => BinaryOp::Le,
        Some(">") => BinaryOp::Gt,
        Some(">=") => BinaryOp::Ge,
        _ => break,
      };
      let line = self.line();
      self.advance();
      let rhs = self.parse_bit_or()?;
      node = Expr::Binary {
        op,
        lhs: Box::new(node),
        rhs: Box::new(rhs),
        line,
      };
    }
    Ok(node)
  }

  fn parse_bit_or(&mut self) -> CompileResult<Expr> {
    let mut node = self.parse_bit_xor()?;
    while self.at_punct("|") {
      let line = self.line();
      self.advance();
      let rhs = self.parse_bit_xor()?;
      node = Expr::Binary {
        op: BinaryOp::BitOr,
        lhs: Box::new(node),
        rhs: Box::new(rhs),
        line,
      };
    }
    Ok(node)
  }

  fn parse_bit_xor(&mut self) -> CompileResult<Expr> {
    let mut node = self.parse_bit_and()?;
    while self.at_punct("^") {
      let line = self.line();
      self.advance();
      let rhs = self.parse_bit_and()?;
      node = Expr::Binary {
        op: BinaryOp::BitXor,
        lhs: Box::new(node),
        rhs: Box::new(rhs),
        line,
      };
    }
    Ok(node)
  }

  fn parse_bit_and(&mut self) -> CompileResult<Expr> {
    let mut node = self.parse_shift()?;
    while self.at_punct("&") {
      let line = self.line();
      self.advance();
      let rhs = self.parse_shift()?;
      node = Expr::Binary {
        op: BinaryOp::BitAnd,
        lhs: Box::new(node),
        rhs: Box::new(rhs),
        line,
      };
    }
    Ok(node)
  }

  fn parse_shift(&mut self) -> CompileResult<Expr> {
    let mut node = self.parse_add_sub()?;
    loop {
      let op = match self.peek_punct() {
        Some("<<") => BinaryOp::Shl,
        Some(">>") => BinaryOp::Shr,
        _ => break,
      };
      let line = self.line();
      self.advance();
      let rhs = self.parse_add_sub()?;
      node = Expr::Binary {
        op,
        lhs: Box::new(node),
        rhs: Box::new(rhs),
        line,
      };
    }
    Ok(node)
  }

  fn parse_add_sub(&mut self) -> CompileResult<Expr> {
    let mut node = self.parse_mul_div()?;
    loop {
      let op = match self.peek_punct() {
        Some("+") => BinaryOp::Add,
        Some("-") => BinaryOp::Sub,
        _ => break,
      };
      let line = self.line();
      self.advance();
      let rhs = self.parse_mul_div()?;
      node = Expr::Binary {
        op,
        lhs: Box::new(node),
        rhs: Box::new(rhs),
        line,
      };
    }
    Ok(node)
  }

  fn parse_mul_div(&mut self) -> CompileResult<Expr> {
    let mut node = self.parse_unary()?;
    loop {
      let op = match self.peek_punct() {
        Some("*") => BinaryOp::Mul,
        Some("/") => BinaryOp::Div,
        Some("%") => BinaryOp::Mod,
        _ => break,
      };
      let line = self.line();
      self.advance();
      let rhs = self.parse_unary()?;
      node = Expr::Binary {
        op,
        lhs: Box::new(node),
        rhs: Box::new(rhs),
        line,
      };
    }
    Ok(node)
  }

  fn parse_unary(&mut self) -> CompileResult<Expr> {
    let op = match self.peek_punct() {
      Some("-") => Some(UnaryOp::Neg),
      Some("~") => Some(UnaryOp::BitNot),
      Some("!") => Some(UnaryOp::Not),
      _ => None,
    };
    if let Some(op) = op {
      let line = self.line();
      self.advance();
      let operand = self.parse_unary()?;
      return Ok(Expr::Unary {
        op,
        operand: Box::new(operand),
        line,
      });
    }

    let inc_dec = match self.peek_punct() {
      Some("++") => Some(IncDecOp::Inc),
      Some("--") => Some(IncDecOp::Dec),
      _ => None,
    };
    if let Some(op) = inc_dec {
      let line = self.line();
      self.advance();
      let (name, _) = self.expect_ident()?;
      return Ok(Expr::PreIncDec { name, op, line });
    }

    self.parse_primary()
  }

  fn parse_primary(&mut self) -> CompileResult<Expr> {
    let line = self.line();

    if self.equal("(") {
      let inner = self.parse_expr()?;
      self.skip(")")?;
      return Ok(Expr::Group {
        inner: Box::new(inner),
        line,
      });
    }

    if let Some(token) = self.peek()
      && token.kind == TokenKind::Num
    {
      let value = token.value.ok_or_else(|| CompileError::Lexical {
        message: "numeric token missing value".to_string(),
        line,
      })?;
      self.advance();
      return Ok(Expr::IntLiteral { value, line });
    }

    if matches!(self.peek().map(|token| token.kind), Some(TokenKind::Ident)) {
      let (name, line) = self.expect_ident()?;
      if self.equal("(") {
        let mut args = Vec::new();
        if !self.equal(")") {
          loop {
            args.push(self.parse_assign()?);
            if !self.equal(",") {
              break;
            }
          }
          self.skip(")")?;
        }
        return Ok(Expr::Call { name, args, line });
      }
      let post = match self.peek_punct() {
        Some("++") => Some(IncDecOp::Inc),
        Some("--") => Some(IncDecOp::Dec),
        _ => None,
      };
      if let Some(op) = post {
        self.advance();
        return Ok(Expr::PostIncDec { name, op, line });
      }
      return Ok(Expr::Var { name, line });
    }

    Err(self.syntax_error("an expression"))
  }
}
