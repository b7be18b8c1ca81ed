//! # tabula-formula
//!
//! Formula lexer, parser and evaluator for tabula.
//!
//! This crate provides:
//! - Formula tokenizing and parsing (text → AST)
//! - Formula evaluation (AST → value) against a [`CellResolver`](tabula_core::CellResolver)
//! - Built-in financial, information, logical, aggregate and date functions
//!
//! ## Example
//!
//! ```rust
//! use tabula_core::Value;
//! use tabula_formula::{calculate, parse_formula, EvaluationContext};
//!
//! let ast = parse_formula("=1+2*3").unwrap();
//! assert_eq!(ast.to_string(), "(1+(2*3))");
//!
//! let ctx = EvaluationContext::simple();
//! assert_eq!(calculate("=IF(1>2, \"a\", \"b\")", &ctx).unwrap(), Value::text("b"));
//! ```

pub mod ast;
pub mod clock;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod lexer;
pub mod parser;

pub use ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference, UnaryOperator};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{
    calculate, evaluate, get_function_registry, EvaluationContext, EvaluationSettings,
};
pub use functions::{Args, Arity, FunctionDef, FunctionImpl, FunctionRegistry};
pub use lexer::{tokenize, Token, TokenKind};
pub use parser::{parse, parse_formula};
