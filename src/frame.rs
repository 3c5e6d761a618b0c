//! Stack frame allocation for function locals.
//!
//! Allocation is two-phase: every table in the function is `reserve`d before
//! any slot is `assign`ed, so the prologue can subtract the whole frame at
//! once. Slots are a uniform 8 bytes and offsets grow downwards from the
//! frame base. Assigning past the reservation means the sizing walk and the
//! emission walk disagree, which is an internal fault rather than a user
//! error.

use crate::error::{CompileError, CompileResult};
use crate::symbols::SymbolTable;

pub const SLOT_SIZE: i64 = 8;

#[derive(Debug, Default)]
pub struct FrameAllocator {
  reserved: i64,
  cursor: i64,
}

impl FrameAllocator {
  pub fn new() -> Self {
    Self::default()
  }

  /// Account for every data entry in a block's table. Returns the bytes
  /// added by this table.
  pub fn reserve(&mut self, table: &SymbolTable) -> i64 {
    let mut bytes = 0;
    for (_, entry) in table.iter() {
      bytes += entry.ty.size();
    }
    self.reserved += bytes;
    bytes
  }

  /// Total frame size, rounded up to the next multiple of 16 to keep the
  /// stack aligned at call boundaries.
  pub fn frame_size(&self) -> i64 {
    (self.reserved + 15) & !15
  }

  /// Hand out the next slot as a negative `%rbp`-relative offset.
  pub fn assign(&mut self) -> CompileResult<i64> {
    if self.reserved == 0 {
      return Err(CompileError::FrameOverflow {
        message: "slot assigned before any reservation".to_string(),
      });
    }
    self.cursor -= SLOT_SIZE;
    if -self.cursor > self.reserved {
      return Err(CompileError::FrameOverflow {
        message: format!(
          "assigned {} bytes but only {} were reserved",
          -self.cursor, self.reserved
        ),
      });
    }
    Ok(self.cursor)
  }
}
