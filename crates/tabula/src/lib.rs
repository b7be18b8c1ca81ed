//! # tabula
//!
//! A spreadsheet formula engine: it turns formula text such as
//! `=PMT(5%/12, 360, 250000)` into an expression tree and evaluates it against cells
//! supplied through a [`CellResolver`].
//!
//! ## Features
//!
//! - Spreadsheet-style tokenizing and precedence-climbing parsing
//! - Evaluation with error values (`#DIV/0!`, `#N/A`, ...) that propagate like data
//! - Financial, information, logical, aggregate and date functions
//! - An injectable clock for `NOW()` / `TODAY()`
//! - [`MemoryGrid`], a small in-memory resolver for tests and embedding
//!
//! ## Example
//!
//! ```rust
//! use tabula::prelude::*;
//!
//! let mut grid = MemoryGrid::new();
//! grid.set("A1", 1000.0).unwrap();
//! grid.set("A2", 10).unwrap();
//!
//! let ctx = EvaluationContext::new(&grid);
//! assert_eq!(calculate("=PMT(0, A2, A1)", &ctx).unwrap(), Value::Number(-100.0));
//! assert_eq!(calculate("=IFERROR(A1/0, \"n/a\")", &ctx).unwrap(), Value::text("n/a"));
//! ```

pub mod prelude;

// Re-export core types
pub use tabula_core::{
    format_number, parse_number, Cell, CellAddress, CellId, CellRange, CellResolver,
    EmptyResolver, Error, ErrorKind, MemoryGrid, Result, Value, MAX_COLS, MAX_ROWS,
};

// Re-export formula types
pub use tabula_formula::{
    calculate, evaluate, get_function_registry, parse, parse_formula, tokenize, Args, Arity,
    BinaryOperator, CellReference, Clock, EvaluationContext, EvaluationSettings, FixedClock,
    FormulaError, FormulaExpr, FormulaResult, FunctionDef, FunctionImpl, FunctionRegistry,
    RangeReference, SystemClock, Token, TokenKind, UnaryOperator,
};

/// The built-in function modules, for calling helpers such as
/// [`functions::date::yearfrac`] directly
pub use tabula_formula::functions;
