//! Cell-related types and utilities
//!
//! This module contains:
//! - [`Value`] - Any value a formula can produce or consume, with coercion rules
//! - [`ErrorKind`] - The seven spreadsheet error values
//! - [`CellId`] / [`CellAddress`] - A cell's location (e.g., "A1", "$A$1")
//! - [`CellRange`] - A rectangular range of cells (e.g., "A1:B10")

mod address;
mod error_kind;
mod value;

pub use address::{CellAddress, CellId, CellRange};
pub use error_kind::ErrorKind;
pub use value::{format_number, parse_number, Value};
