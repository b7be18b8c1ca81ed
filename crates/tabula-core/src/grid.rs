//! In-memory cell storage implementing [`CellResolver`]
//!
//! Useful for tests and for embedding the engine where no real workbook exists.

use crate::cell::{CellId, Value};
use crate::error::{Error, Result};
use crate::resolver::{Cell, CellResolver};
use crate::MAX_SHEET_NAME_LEN;
use ahash::AHashMap;

#[derive(Debug, Default)]
struct Sheet {
    name: String,
    cells: AHashMap<CellId, Value>,
}

/// A set of named sheets holding plain values, plus workbook-level defined names
///
/// The first sheet is the one unqualified references resolve against.
///
/// # Example
/// ```
/// use tabula_core::{CellId, CellResolver, MemoryGrid, Value};
///
/// let mut grid = MemoryGrid::new();
/// grid.set("B2", 12.5).unwrap();
/// let cell = grid.resolve(None, CellId::new(1, 1)).unwrap();
/// assert_eq!(cell.value(), &Value::Number(12.5));
/// ```
#[derive(Debug)]
pub struct MemoryGrid {
    sheets: Vec<Sheet>,
    names: AHashMap<String, Value>,
}

impl MemoryGrid {
    /// Create a grid with a single sheet named "Sheet1"
    pub fn new() -> Self {
        Self {
            sheets: vec![Sheet {
                name: "Sheet1".to_string(),
                cells: AHashMap::new(),
            }],
            names: AHashMap::new(),
        }
    }

    /// Add another sheet
    pub fn add_sheet(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidSheetName("Sheet name cannot be empty".into()));
        }
        if name.chars().count() > MAX_SHEET_NAME_LEN {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name too long (max {} characters)",
                MAX_SHEET_NAME_LEN
            )));
        }
        const INVALID_CHARS: &[char] = &[':', '\\', '/', '?', '*', '[', ']'];
        if let Some(c) = name.chars().find(|c| INVALID_CHARS.contains(c)) {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name contains invalid character '{}'",
                c
            )));
        }
        if self.sheet_index(name).is_some() {
            return Err(Error::DuplicateSheetName(name.to_string()));
        }

        self.sheets.push(Sheet {
            name: name.to_string(),
            cells: AHashMap::new(),
        });
        Ok(())
    }

    /// Find a sheet by name (case-insensitive)
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Set a value on the first sheet using an A1-style address
    pub fn set(&mut self, address: &str, value: impl Into<Value>) -> Result<()> {
        let id = CellId::parse(address)?;
        self.set_at(0, id, value.into());
        Ok(())
    }

    /// Set a value on a named sheet using an A1-style address
    pub fn set_on(&mut self, sheet: &str, address: &str, value: impl Into<Value>) -> Result<()> {
        let index = self
            .sheet_index(sheet)
            .ok_or_else(|| Error::SheetNotFound(sheet.to_string()))?;
        let id = CellId::parse(address)?;
        self.set_at(index, id, value.into());
        Ok(())
    }

    fn set_at(&mut self, sheet: usize, id: CellId, value: Value) {
        let value = Cell::new(id, value).into_value();
        let cells = &mut self.sheets[sheet].cells;
        if value.is_blank() {
            cells.remove(&id);
        } else {
            cells.insert(id, value);
        }
    }

    /// Empty a cell on the first sheet
    pub fn clear(&mut self, address: &str) -> Result<()> {
        let id = CellId::parse(address)?;
        self.sheets[0].cells.remove(&id);
        Ok(())
    }

    /// Read a stored value (`None` for empty cells or unknown sheets)
    pub fn get(&self, sheet: Option<&str>, id: CellId) -> Option<&Value> {
        let index = match sheet {
            Some(name) => self.sheet_index(name)?,
            None => 0,
        };
        self.sheets[index].cells.get(&id)
    }

    /// Define a workbook-level name bound to a value
    pub fn define_name(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let valid_start = name
            .chars()
            .next()
            .map_or(false, |c| c.is_ascii_alphabetic() || c == '_');
        let valid_rest = name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        if !valid_start || !valid_rest || CellId::parse(name).is_ok() {
            return Err(Error::InvalidName(name.to_string()));
        }
        self.names.insert(name.to_ascii_uppercase(), value.into());
        Ok(())
    }
}

impl Default for MemoryGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl CellResolver for MemoryGrid {
    fn resolve(&self, sheet: Option<&str>, id: CellId) -> Option<Cell> {
        let index = match sheet {
            Some(name) => self.sheet_index(name)?,
            None => 0,
        };
        let cell = match self.sheets[index].cells.get(&id) {
            Some(value) => Cell::new(id, value.clone()),
            None => Cell::blank(id),
        };
        Some(cell)
    }

    fn named_value(&self, name: &str) -> Option<Value> {
        self.names.get(&name.to_ascii_uppercase()).cloned()
    }
}
