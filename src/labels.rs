//! Unique jump-label generation for control-flow lowering.
//!
//! Counters are per-prefix and per-compilation: the generator lives in the
//! compilation context, never in a process-wide static, so concurrent or
//! repeated compilations in one process cannot collide.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct LabelGen {
  counters: HashMap<&'static str, u32>,
}

impl LabelGen {
  pub fn new() -> Self {
    Self::default()
  }

  /// Produce the next label for a prefix, e.g. `L_end1`, `L_end2`, …
  ///
  /// The `L` prefix keeps generated jump targets out of the `_name`
  /// namespace used for user symbols; a function called `end1` must not
  /// collide with a loop's end label. Mach-O assemblers also treat
  /// `L`-prefixed labels as file-local.
  pub fn next(&mut self, prefix: &'static str) -> String {
    let counter = self.counters.entry(prefix).or_insert(0);
    *counter += 1;
    format!("L_{prefix}{counter}")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn counters_are_independent_per_prefix() {
    let mut labels = LabelGen::new();
    assert_eq!(labels.next("end"), "L_end1");
    assert_eq!(labels.next("start"), "L_start1");
    assert_eq!(labels.next("end"), "L_end2");
  }

  #[test]
  fn separate_generators_do_not_share_state() {
    let mut a = LabelGen::new();
    let mut b = LabelGen::new();
    assert_eq!(a.next("clause"), "L_clause1");
    assert_eq!(b.next("clause"), "L_clause1");
  }

  #[test]
  fn labels_stay_outside_the_user_symbol_namespace() {
    let mut labels = LabelGen::new();
    // User symbols are emitted as `_name`; generated labels must not be.
    assert!(!labels.next("end").starts_with('_'));
  }
}
