//! Cell identifiers, addresses and ranges

use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};
use std::fmt;
use std::str::FromStr;

/// Position of a cell in a sheet (0-based column and row)
///
/// This is the key the engine uses when it asks a
/// [`CellResolver`](crate::CellResolver) for a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellId {
    /// Column index (A=0)
    pub col: u16,
    /// Row index (row "1" = 0)
    pub row: u32,
}

impl CellId {
    /// Create a cell id from 0-based column and row
    pub fn new(col: u16, row: u32) -> Self {
        Self { col, row }
    }

    /// Parse an A1-style id, ignoring `$` markers
    pub fn parse(s: &str) -> Result<Self> {
        CellAddress::parse(s).map(|addr| addr.id())
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            CellAddress::column_to_letters(self.col),
            self.row + 1
        )
    }
}

impl FromStr for CellId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A cell address as written in a formula (e.g., "A1", "$B$2")
///
/// The optional `$` prefix makes a reference absolute (doesn't change when copied).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellAddress {
    /// Row index (0-based internally, 1-based in display)
    pub row: u32,
    /// Column index (0-based, A=0, B=1, ..., XFD=16383)
    pub col: u16,
    /// Whether the row reference is absolute ($)
    pub row_absolute: bool,
    /// Whether the column reference is absolute ($)
    pub col_absolute: bool,
}

impl CellAddress {
    /// Create a new cell address with relative references
    pub fn new(row: u32, col: u16) -> Self {
        Self {
            row,
            col,
            row_absolute: false,
            col_absolute: false,
        }
    }

    /// Create an absolute cell address ($A$1 style)
    pub fn absolute(row: u32, col: u16) -> Self {
        Self {
            row,
            col,
            row_absolute: true,
            col_absolute: true,
        }
    }

    /// The position this address points at, without the `$` flags
    pub fn id(&self) -> CellId {
        CellId::new(self.col, self.row)
    }

    /// Parse a cell address from A1-style notation
    ///
    /// # Examples
    /// ```
    /// use tabula_core::CellAddress;
    ///
    /// let addr = CellAddress::parse("A1").unwrap();
    /// assert_eq!(addr.row, 0);
    /// assert_eq!(addr.col, 0);
    ///
    /// let addr = CellAddress::parse("$B$2").unwrap();
    /// assert_eq!(addr.row, 1);
    /// assert_eq!(addr.col, 1);
    /// assert!(addr.row_absolute);
    /// assert!(addr.col_absolute);
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidAddress("empty address".into()));
        }

        let bytes = s.as_bytes();
        let mut pos = 0;

        let col_absolute = if bytes.get(pos) == Some(&b'$') {
            pos += 1;
            true
        } else {
            false
        };

        let col_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
            pos += 1;
        }

        if pos == col_start {
            return Err(Error::InvalidAddress(format!(
                "no column letters in '{}'",
                s
            )));
        }

        let col = Self::letters_to_column(&s[col_start..pos])?;

        let row_absolute = if bytes.get(pos) == Some(&b'$') {
            pos += 1;
            true
        } else {
            false
        };

        let row_str = &s[pos..];
        if row_str.is_empty() {
            return Err(Error::InvalidAddress(format!("no row number in '{}'", s)));
        }
        if !row_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidAddress(format!(
                "invalid row number in '{}'",
                s
            )));
        }

        let row: u32 = row_str
            .parse()
            .map_err(|_| Error::InvalidAddress(format!("invalid row number in '{}'", s)))?;

        // Rows are 1-based in A1 notation
        if row == 0 {
            return Err(Error::InvalidAddress(format!(
                "row number must be >= 1 in '{}'",
                s
            )));
        }

        let row = row - 1;
        if row >= MAX_ROWS {
            return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
        }

        Ok(Self {
            row,
            col,
            row_absolute,
            col_absolute,
        })
    }

    /// Convert column index to letters (0 = A, 25 = Z, 26 = AA, etc.)
    pub fn column_to_letters(col: u16) -> String {
        let mut result = String::new();
        let mut n = col as u32 + 1;

        while n > 0 {
            n -= 1;
            let c = ((n % 26) as u8 + b'A') as char;
            result.insert(0, c);
            n /= 26;
        }

        result
    }

    /// Convert column letters to index (A = 0, Z = 25, AA = 26, etc.)
    pub fn letters_to_column(letters: &str) -> Result<u16> {
        if letters.is_empty() {
            return Err(Error::InvalidAddress("empty column letters".into()));
        }

        let mut col: u32 = 0;
        for c in letters.chars() {
            if !c.is_ascii_alphabetic() {
                return Err(Error::InvalidAddress(format!(
                    "invalid column letter '{}'",
                    c
                )));
            }
            col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
            if col > MAX_COLS as u32 {
                return Err(Error::ColumnOutOfBounds(col - 1, MAX_COLS - 1));
            }
        }

        Ok((col - 1) as u16)
    }

    /// Format as A1-style string
    pub fn to_a1_string(&self) -> String {
        let mut result = String::new();

        if self.col_absolute {
            result.push('$');
        }
        result.push_str(&Self::column_to_letters(self.col));

        if self.row_absolute {
            result.push('$');
        }
        result.push_str(&(self.row + 1).to_string());

        result
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for CellAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A rectangular range of cells (e.g., "A1:B10")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    /// Start address (top-left)
    pub start: CellAddress,
    /// End address (bottom-right)
    pub end: CellAddress,
}

impl CellRange {
    /// Create a new cell range, normalizing the corners to top-left / bottom-right
    pub fn new(start: CellAddress, end: CellAddress) -> Self {
        let (start_row, end_row, start_row_abs, end_row_abs) = if start.row <= end.row {
            (start.row, end.row, start.row_absolute, end.row_absolute)
        } else {
            (end.row, start.row, end.row_absolute, start.row_absolute)
        };

        let (start_col, end_col, start_col_abs, end_col_abs) = if start.col <= end.col {
            (start.col, end.col, start.col_absolute, end.col_absolute)
        } else {
            (end.col, start.col, end.col_absolute, start.col_absolute)
        };

        Self {
            start: CellAddress {
                row: start_row,
                col: start_col,
                row_absolute: start_row_abs,
                col_absolute: start_col_abs,
            },
            end: CellAddress {
                row: end_row,
                col: end_col,
                row_absolute: end_row_abs,
                col_absolute: end_col_abs,
            },
        }
    }

    /// Parse a range from A1:B10 notation (a single address is a 1x1 range)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        match s.split_once(':') {
            Some((start, end)) => {
                let start = CellAddress::parse(start)
                    .map_err(|e| Error::InvalidRange(format!("'{}': {}", s, e)))?;
                let end = CellAddress::parse(end)
                    .map_err(|e| Error::InvalidRange(format!("'{}': {}", s, e)))?;
                Ok(Self::new(start, end))
            }
            None => {
                let addr = CellAddress::parse(s)?;
                Ok(Self::new(addr, addr))
            }
        }
    }

    /// Get the number of rows in the range
    pub fn row_count(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    /// Get the number of columns in the range
    pub fn col_count(&self) -> u16 {
        self.end.col - self.start.col + 1
    }

    /// Iterate over the rows of the range, each row yielding its cell ids left to right
    pub fn rows(&self) -> impl Iterator<Item = impl Iterator<Item = CellId>> {
        let (start_col, end_col) = (self.start.col, self.end.col);
        (self.start.row..=self.end.row)
            .map(move |row| (start_col..=end_col).map(move |col| CellId::new(col, row)))
    }

    /// Format as A1:B10 string
    pub fn to_a1_string(&self) -> String {
        if self.start == self.end {
            self.start.to_a1_string()
        } else {
            format!("{}:{}", self.start.to_a1_string(), self.end.to_a1_string())
        }
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for CellRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
