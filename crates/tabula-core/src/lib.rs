//! # tabula-core
//!
//! Core data structures for the tabula formula engine.
//!
//! This crate provides the fundamental types used throughout tabula:
//! - [`Value`] - Formula values (numbers, text, booleans, errors, references, ranges)
//!   and the coercion rules between them
//! - [`ErrorKind`] - `#NULL!`, `#DIV/0!`, `#VALUE!`, `#REF!`, `#NAME?`, `#NUM!`, `#N/A`
//! - [`CellId`], [`CellAddress`] and [`CellRange`] - Cell addressing
//! - [`CellResolver`] - The read-only contract the engine uses to look at cells
//! - [`MemoryGrid`] - A simple in-memory resolver
//!
//! ## Example
//!
//! ```rust
//! use tabula_core::{ErrorKind, Value};
//!
//! assert_eq!(Value::text("42").as_number(), Ok(42.0));
//! assert_eq!(Value::text("abc").as_number(), Err(ErrorKind::Value));
//! assert_eq!(Value::Error(ErrorKind::Num).as_text(), Err(ErrorKind::Num));
//! ```

pub mod cell;
pub mod error;
pub mod grid;
pub mod resolver;

pub use cell::{format_number, parse_number, CellAddress, CellId, CellRange, ErrorKind, Value};
pub use error::{Error, Result};
pub use grid::MemoryGrid;
pub use resolver::{Cell, CellResolver, EmptyResolver};

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
