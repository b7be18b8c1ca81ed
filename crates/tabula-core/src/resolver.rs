//! The narrow contract through which the formula engine reads cells
//!
//! The engine never owns cell storage. Everything it knows about the grid comes from a
//! [`CellResolver`], which must be side-effect free from the engine's point of view.

use crate::cell::{CellId, ErrorKind, Value};

/// Snapshot of one cell as seen by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    id: CellId,
    value: Value,
}

impl Cell {
    /// Create a cell holding a value. References and ranges are reduced to a scalar.
    pub fn new(id: CellId, value: Value) -> Self {
        let value = match value {
            v @ (Value::Reference(..) | Value::Range(_)) => v.into_scalar(),
            v => v,
        };
        Self { id, value }
    }

    /// Create an empty cell
    pub fn blank(id: CellId) -> Self {
        Self {
            id,
            value: Value::Blank,
        }
    }

    /// The cell's current value (an error value if the cell holds an error)
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Consume the cell, returning its value
    pub fn into_value(self) -> Value {
        self.value
    }

    /// Check if the cell holds an error
    pub fn has_error(&self) -> bool {
        matches!(self.value, Value::Error(_))
    }

    /// The error held by the cell, if any
    pub fn error(&self) -> Option<ErrorKind> {
        match self.value {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Check if the cell is empty
    pub fn is_blank(&self) -> bool {
        matches!(self.value, Value::Blank)
    }

    /// Position of the cell
    pub fn id(&self) -> CellId {
        self.id
    }

    /// 0-based column
    pub fn column(&self) -> u16 {
        self.id.col
    }

    /// 0-based row
    pub fn row(&self) -> u32 {
        self.id.row
    }
}

/// Read-only source of cell contents
///
/// Implementations must not block and must present a consistent snapshot for the
/// duration of an evaluation; share across threads by making the implementation `Sync`.
pub trait CellResolver {
    /// Look up a cell. `sheet` is `None` for unqualified references.
    ///
    /// Returns `None` when the sheet does not exist; a missing cell on an existing sheet
    /// should be reported as [`Cell::blank`].
    fn resolve(&self, sheet: Option<&str>, id: CellId) -> Option<Cell>;

    /// Look up a defined name. The default implementation knows no names.
    fn named_value(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// A resolver with no sheets of its own: every unqualified cell is blank
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyResolver;

impl CellResolver for EmptyResolver {
    fn resolve(&self, sheet: Option<&str>, id: CellId) -> Option<Cell> {
        match sheet {
            None => Some(Cell::blank(id)),
            Some(_) => None,
        }
    }
}

impl<R: CellResolver + ?Sized> CellResolver for &R {
    fn resolve(&self, sheet: Option<&str>, id: CellId) -> Option<Cell> {
        (**self).resolve(sheet, id)
    }

    fn named_value(&self, name: &str) -> Option<Value> {
        (**self).named_value(name)
    }
}
