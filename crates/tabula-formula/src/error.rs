//! Formula error types
//!
//! These are construction-time failures: a formula that cannot be parsed, or a
//! function registry that is set up inconsistently. Runtime failures (`#DIV/0!`,
//! `#VALUE!`, ...) are values, see [`tabula_core::ErrorKind`].

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur while parsing formulas or registering functions
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// A token that cannot appear here
    #[error("Unexpected '{found}' at position {position}")]
    UnexpectedToken { found: String, position: usize },

    /// The formula ended where an operand or closing token was required
    #[error("Unexpected end of formula: {expected}")]
    UnexpectedEnd { expected: String },

    /// An opening parenthesis or brace without its closing partner
    #[error("Unbalanced '{open}' opened at position {position}")]
    Unbalanced { open: char, position: usize },

    /// Input left over after a complete expression
    #[error("Unexpected characters after expression at position {position}: '{rest}'")]
    TrailingInput { rest: String, position: usize },

    /// A cell or range reference that is out of bounds or malformed
    #[error("Invalid reference '{text}': {reason}")]
    InvalidReference { text: String, reason: String },

    /// Parentheses, calls, unary operators or exponents nested too deeply
    #[error("Formula nesting exceeds {limit} levels at position {position}")]
    NestingTooDeep { limit: usize, position: usize },

    /// Formula text longer than the parser accepts
    #[error("Formula is {length} characters long, the limit is {limit}")]
    TooLong { length: usize, limit: usize },

    /// Array literal rows of differing lengths
    #[error("Array literal rows must all have the same number of columns")]
    RaggedArray,

    /// A function with this name already exists in the registry
    #[error("Function {0} is already registered")]
    DuplicateFunction(String),

    /// A function definition with impossible argument bounds
    #[error("Invalid argument bounds for {name}: min {min} > max {max}")]
    InvalidArity { name: String, min: usize, max: usize },
}
