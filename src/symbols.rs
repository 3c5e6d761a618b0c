//! Symbol tables and scope resolution.
//!
//! One table exists per block (owned by that block's AST node) plus a single
//! global table owned by the `Program`. The parser registers declarations;
//! the code generator walks a stack of scopes cloned from the AST and
//! resolves identifiers innermost-first, falling back to the global table.

use crate::error::{CompileError, CompileResult};
use crate::ty::Type;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolEntry {
  pub ty: Type,
  /// `%rbp`-relative storage offset, assigned during code generation.
  /// Negative for locals, positive for parameters, `None` for globals and
  /// functions.
  pub offset: Option<i64>,
  pub decl_line: u32,
  pub initialised: bool,
}

/// Insertion-ordered identifier table. Tables are small, so linear lookup
/// keeps iteration order deterministic without extra bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
  entries: Vec<(String, SymbolEntry)>,
}

impl SymbolTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a declaration. Within one table each identifier is declared at
  /// most once.
  pub fn declare(&mut self, name: &str, ty: Type, line: u32, initialised: bool) -> CompileResult<()> {
    if self.get(name).is_some() {
      return Err(CompileError::DuplicateName {
        name: name.to_string(),
        line,
      });
    }
    self.entries.push((
      name.to_string(),
      SymbolEntry {
        ty,
        offset: None,
        decl_line: line,
        initialised,
      },
    ));
    Ok(())
  }

  pub fn get(&self, name: &str) -> Option<&SymbolEntry> {
    self
      .entries
      .iter()
      .find(|(id, _)| id == name)
      .map(|(_, entry)| entry)
  }

  pub fn get_mut(&mut self, name: &str) -> Option<&mut SymbolEntry> {
    self
      .entries
      .iter_mut()
      .find(|(id, _)| id == name)
      .map(|(_, entry)| entry)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &SymbolEntry)> {
    self.entries.iter().map(|(id, entry)| (id.as_str(), entry))
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

/// One frame of the active scope stack. Loop scopes carry the jump targets
/// that `break` and `continue` resolve against for the duration of that
/// loop's code generation.
#[derive(Debug, Clone)]
pub struct Scope {
  pub table: SymbolTable,
  pub break_label: Option<String>,
  pub continue_label: Option<String>,
}

/// The stack of block scopes plus the global table, searched innermost-first.
#[derive(Debug, Clone)]
pub struct ScopeChain {
  scopes: Vec<Scope>,
  globals: SymbolTable,
}

impl ScopeChain {
  pub fn new(globals: SymbolTable) -> Self {
    Self {
      scopes: Vec::new(),
      globals,
    }
  }

  pub fn push(&mut self, table: SymbolTable) {
    self.scopes.push(Scope {
      table,
      break_label: None,
      continue_label: None,
    });
  }

  pub fn push_loop(&mut self, table: SymbolTable, break_label: String, continue_label: String) {
    self.scopes.push(Scope {
      table,
      break_label: Some(break_label),
      continue_label: Some(continue_label),
    });
  }

  pub fn pop(&mut self) {
    self.scopes.pop();
  }

  pub fn depth(&self) -> usize {
    self.scopes.len()
  }

  /// Innermost table, used when assigning storage for a fresh declaration.
  pub fn current_mut(&mut self) -> Option<&mut SymbolTable> {
    self.scopes.last_mut().map(|scope| &mut scope.table)
  }

  /// Resolve a name at a use site. Block entries only match when the use
  /// line is at or after the declaration line (no forward references inside
  /// a block); globals are visible file-wide. The flag reports whether the
  /// match came from the global table.
  pub fn resolve(&self, name: &str, use_line: u32) -> CompileResult<(&SymbolEntry, bool)> {
    for scope in self.scopes.iter().rev() {
      if let Some(entry) = scope.table.get(name)
        && use_line >= entry.decl_line
      {
        return Ok((entry, false));
      }
    }
    if let Some(entry) = self.globals.get(name) {
      return Ok((entry, true));
    }
    Err(CompileError::UndefinedName {
      name: name.to_string(),
      line: use_line,
    })
  }

  /// Mutable variant of `resolve`, used to flag assignments.
  pub fn resolve_mut(&mut self, name: &str, use_line: u32) -> CompileResult<(&mut SymbolEntry, bool)> {
    for scope in self.scopes.iter_mut().rev() {
      if let Some(entry) = scope.table.get_mut(name)
        && use_line >= entry.decl_line
      {
        return Ok((entry, false));
      }
    }
    if let Some(entry) = self.globals.get_mut(name) {
      return Ok((entry, true));
    }
    Err(CompileError::UndefinedName {
      name: name.to_string(),
      line: use_line,
    })
  }

  /// Jump target of the nearest enclosing loop's end label.
  pub fn break_target(&self) -> Option<&str> {
    self
      .scopes
      .iter()
      .rev()
      .find_map(|scope| scope.break_label.as_deref())
  }

  /// Jump target of the nearest enclosing loop's continue label.
  pub fn continue_target(&self) -> Option<&str> {
    self
      .scopes
      .iter()
      .rev()
      .find_map(|scope| scope.continue_label.as_deref())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn table_with(name: &str, line: u32) -> SymbolTable {
    let mut table = SymbolTable::new();
    table.declare(name, Type::Int, line, false).expect("declare");
    table
  }

  #[test]
  fn duplicate_declaration_in_one_table_is_rejected() {
    let mut table = SymbolTable::new();
    table.declare("x", Type::Int, 1, false).expect("first declare");
    let err = table.declare("x", Type::Int, 2, true).unwrap_err();
    assert!(matches!(err, CompileError::DuplicateName { line: 2, .. }));
  }

  #[test]
  fn inner_scope_shadows_outer() {
    let mut chain = ScopeChain::new(SymbolTable::new());
    chain.push(table_with("x", 1));
    chain.push(table_with("x", 3));

    let (inner, is_global) = chain.resolve("x", 4).expect("resolve");
    assert_eq!(inner.decl_line, 3);
    assert!(!is_global);

    chain.pop();
    let (outer, _) = chain.resolve("x", 5).expect("resolve");
    assert_eq!(outer.decl_line, 1);
  }

  #[test]
  fn forward_reference_in_block_is_rejected() {
    let mut chain = ScopeChain::new(SymbolTable::new());
    chain.push(table_with("x", 7));
    let err = chain.resolve("x", 3).unwrap_err();
    assert!(matches!(err, CompileError::UndefinedName { line: 3, .. }));
  }

  #[test]
  fn globals_have_no_line_restriction() {
    let mut chain = ScopeChain::new(table_with("g", 9));
    chain.push(SymbolTable::new());
    let (entry, is_global) = chain.resolve("g", 2).expect("resolve");
    assert_eq!(entry.decl_line, 9);
    assert!(is_global);
  }

  #[test]
  fn loop_targets_come_from_nearest_enclosing_loop() {
    let mut chain = ScopeChain::new(SymbolTable::new());
    assert!(chain.break_target().is_none());

    chain.push_loop(SymbolTable::new(), "L_end1".into(), "L_start1".into());
    chain.push(SymbolTable::new());
    assert_eq!(chain.break_target(), Some("L_end1"));
    assert_eq!(chain.continue_target(), Some("L_start1"));

    chain.push_loop(SymbolTable::new(), "L_end2".into(), "L_cont1".into());
    assert_eq!(chain.break_target(), Some("L_end2"));

    chain.pop();
    assert_eq!(chain.break_target(), Some("L_end1"));
  }
}
