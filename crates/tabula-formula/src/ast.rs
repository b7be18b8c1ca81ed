//! Formula Abstract Syntax Tree types

use std::fmt;
use tabula_core::{CellAddress, CellRange, ErrorKind};

/// Formula expression AST
///
/// Trees are immutable once parsed; evaluation only reads them.
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    // === Literals ===
    /// Numeric literal
    Number(f64),
    /// String literal
    Text(String),
    /// Boolean literal
    Boolean(bool),
    /// Error literal
    Error(ErrorKind),

    // === References ===
    /// Single cell reference
    CellRef(CellReference),
    /// Range reference
    RangeRef(RangeReference),
    /// Named range or defined name
    NameRef(String),

    // === Operators ===
    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },

    // === Function call ===
    /// Function call; `name` is upper-cased
    Function { name: String, args: Vec<FormulaExpr> },

    // === Array ===
    /// Array literal, rows of columns
    Array(Vec<Vec<FormulaExpr>>),
}

impl FormulaExpr {
    /// Split a left-nested operator chain into its innermost left operand and the
    /// `(operator, right operand)` steps applied to it, first step first.
    ///
    /// `1+2*3-4` gives `1` and `[(+, 2*3), (-, 4)]`. Any other expression is its own
    /// head with no steps.
    pub fn operator_chain(&self) -> (&FormulaExpr, Vec<(BinaryOperator, &FormulaExpr)>) {
        let mut steps = Vec::new();
        let mut head = self;
        while let FormulaExpr::BinaryOp { op, left, right } = head {
            steps.push((*op, right.as_ref()));
            head = left;
        }
        steps.reverse();
        (head, steps)
    }
}

/// Cell reference with optional sheet
#[derive(Debug, Clone, PartialEq)]
pub struct CellReference {
    pub sheet: Option<String>,
    pub address: CellAddress,
}

/// Range reference with optional sheet
#[derive(Debug, Clone, PartialEq)]
pub struct RangeReference {
    pub sheet: Option<String>,
    pub range: CellRange,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Text
    Concat,
}

impl BinaryOperator {
    /// The operator as written in a formula
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Power => "^",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::Concat => "&",
        }
    }

    /// Check if this is one of the six comparison operators
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::LessThan
                | BinaryOperator::LessEqual
                | BinaryOperator::GreaterThan
                | BinaryOperator::GreaterEqual
        )
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// Prefix `-`
    Negate,
    /// Prefix `+` (kept so that `+A1` still dereferences)
    Plus,
    /// Postfix `%`
    Percent,
}

fn write_sheet(f: &mut fmt::Formatter<'_>, sheet: &Option<String>) -> fmt::Result {
    match sheet {
        Some(name) if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') => {
            write!(f, "{}!", name)
        }
        Some(name) => write!(f, "'{}'!", name.replace('\'', "''")),
        None => Ok(()),
    }
}

/// Renders the expression back to formula text (without the leading `=`), fully
/// parenthesizing nested operators.
impl fmt::Display for FormulaExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaExpr::Number(n) => write!(f, "{}", tabula_core::format_number(*n)),
            FormulaExpr::Text(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            FormulaExpr::Boolean(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            FormulaExpr::Error(e) => write!(f, "{}", e),
            FormulaExpr::CellRef(r) => {
                write_sheet(f, &r.sheet)?;
                write!(f, "{}", r.address)
            }
            FormulaExpr::RangeRef(r) => {
                write_sheet(f, &r.sheet)?;
                write!(f, "{}:{}", r.range.start, r.range.end)
            }
            FormulaExpr::NameRef(name) => f.write_str(name),
            FormulaExpr::BinaryOp { .. } => {
                let (head, steps) = self.operator_chain();
                for _ in 0..steps.len() {
                    f.write_str("(")?;
                }
                write!(f, "{}", head)?;
                for (op, right) in steps {
                    write!(f, "{}{})", op.symbol(), right)?;
                }
                Ok(())
            }
            FormulaExpr::UnaryOp { op, operand } => match op {
                UnaryOperator::Negate => write!(f, "-{}", operand),
                UnaryOperator::Plus => write!(f, "+{}", operand),
                UnaryOperator::Percent => write!(f, "{}%", operand),
            },
            FormulaExpr::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            FormulaExpr::Array(rows) => {
                f.write_str("{")?;
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        f.write_str(";")?;
                    }
                    for (j, expr) in row.iter().enumerate() {
                        if j > 0 {
                            f.write_str(",")?;
                        }
                        write!(f, "{}", expr)?;
                    }
                }
                f.write_str("}")
            }
        }
    }
}
