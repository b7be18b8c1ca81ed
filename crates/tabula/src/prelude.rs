//! Prelude module - common imports for tabula users
//!
//! ```rust
//! use tabula::prelude::*;
//! ```

pub use crate::{
    calculate,
    evaluate,
    parse_formula,
    // Cell types
    CellId,
    CellResolver,
    // Evaluation
    EvaluationContext,
    EvaluationSettings,
    ErrorKind,
    FixedClock,
    FormulaError,
    FormulaExpr,
    FunctionRegistry,
    MemoryGrid,
    Value,
};
