//! Formula values and coercion
//!
//! [`Value`] is the single type flowing through formula evaluation. Coercions return
//! `Result<_, ErrorKind>`: an error operand is re-raised unchanged, so `?` is all a
//! caller needs to honour error absorption.

use super::address::CellId;
use super::error_kind::ErrorKind;
use std::fmt;

/// Any value a formula can produce or consume
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// Content of an empty cell
    Blank,
    /// Numeric value (dates are serial numbers)
    Number(f64),
    /// Text value
    Text(String),
    /// TRUE / FALSE
    Boolean(bool),
    /// Error value (#VALUE!, #REF!, etc.)
    Error(ErrorKind),
    /// A cell passed by reference, together with its resolved content
    Reference(CellId, Box<Value>),
    /// Rectangular block of scalars, row-major
    Range(Vec<Vec<Value>>),
}

impl Value {
    /// Create a text value
    pub fn text<S: Into<String>>(s: S) -> Self {
        Value::Text(s.into())
    }

    /// Build a range, replacing nested ranges or references by their first scalar
    pub fn range(rows: Vec<Vec<Value>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(Value::into_scalar).collect())
            .collect();
        Value::Range(rows)
    }

    /// Reduce to a scalar: references are dereferenced, ranges give their first element
    /// (an empty range becomes `#REF!`).
    pub fn into_scalar(self) -> Value {
        match self {
            Value::Reference(_, inner) => inner.into_scalar(),
            Value::Range(rows) => match rows.into_iter().flatten().next() {
                Some(first) => first.into_scalar(),
                None => Value::Error(ErrorKind::Ref),
            },
            other => other,
        }
    }

    /// Strip a reference wrapper, leaving the referenced content
    pub fn deref(self) -> Value {
        match self {
            Value::Reference(_, inner) => inner.deref(),
            other => other,
        }
    }

    /// Borrowing variant of [`Value::deref`]
    pub fn resolved(&self) -> &Value {
        match self {
            Value::Reference(_, inner) => inner.resolved(),
            other => other,
        }
    }

    /// Check if this is an error (looking through references)
    pub fn is_error(&self) -> bool {
        matches!(self.resolved(), Value::Error(_))
    }

    /// Get the error if this is one (looking through references)
    pub fn error(&self) -> Option<ErrorKind> {
        match self.resolved() {
            Value::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Check if this is blank (looking through references)
    pub fn is_blank(&self) -> bool {
        matches!(self.resolved(), Value::Blank)
    }

    /// Get the type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Blank => "blank",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Boolean(_) => "boolean",
            Value::Error(_) => "error",
            Value::Reference(..) => "reference",
            Value::Range(_) => "range",
        }
    }

    // === Coercion ===

    /// First value in row-major order, without raising errors.
    ///
    /// Returns `None` only for an empty range. Predicates such as `ISTEXT` use this
    /// because they classify errors instead of propagating them.
    pub fn peek_first(&self) -> Option<&Value> {
        match self {
            Value::Reference(_, inner) => inner.peek_first(),
            Value::Range(rows) => rows.iter().flatten().next().and_then(Value::peek_first),
            other => Some(other),
        }
    }

    /// First value in row-major order; an error (or an empty range) is raised
    pub fn first_value(&self) -> Result<&Value, ErrorKind> {
        match self.peek_first() {
            Some(Value::Error(e)) => Err(*e),
            Some(v) => Ok(v),
            None => Err(ErrorKind::Ref),
        }
    }

    /// Coerce to a number
    ///
    /// Booleans become 0/1, numeric text is parsed, blank cells are 0. Non-numeric
    /// or empty text and multi-cell ranges fail with `#VALUE!`.
    pub fn as_number(&self) -> Result<f64, ErrorKind> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Blank => Ok(0.0),
            Value::Text(s) => parse_number(s).ok_or(ErrorKind::Value),
            Value::Error(e) => Err(*e),
            Value::Reference(_, inner) => inner.as_number(),
            Value::Range(_) => self.single_cell()?.as_number(),
        }
    }

    /// Coerce to text
    pub fn as_text(&self) -> Result<String, ErrorKind> {
        match self {
            Value::Number(n) => Ok(format_number(*n)),
            Value::Text(s) => Ok(s.clone()),
            Value::Boolean(true) => Ok("TRUE".to_string()),
            Value::Boolean(false) => Ok("FALSE".to_string()),
            Value::Blank => Ok(String::new()),
            Value::Error(e) => Err(*e),
            Value::Reference(_, inner) => inner.as_text(),
            Value::Range(_) => self.single_cell()?.as_text(),
        }
    }

    /// Coerce to a boolean
    ///
    /// Zero, blank and empty text are false; text must otherwise spell TRUE or FALSE.
    pub fn as_bool(&self) -> Result<bool, ErrorKind> {
        match self {
            Value::Boolean(b) => Ok(*b),
            Value::Number(n) => Ok(*n != 0.0),
            Value::Blank => Ok(false),
            Value::Text(s) => {
                if s.is_empty() {
                    Ok(false)
                } else if s.eq_ignore_ascii_case("TRUE") {
                    Ok(true)
                } else if s.eq_ignore_ascii_case("FALSE") {
                    Ok(false)
                } else {
                    Err(ErrorKind::Value)
                }
            }
            Value::Error(e) => Err(*e),
            Value::Reference(_, inner) => inner.as_bool(),
            Value::Range(_) => self.single_cell()?.as_bool(),
        }
    }

    /// `first_value` followed by `as_number`
    pub fn first_number(&self) -> Result<f64, ErrorKind> {
        self.first_value()?.as_number()
    }

    /// `first_value` followed by `as_text`
    pub fn first_text(&self) -> Result<String, ErrorKind> {
        self.first_value()?.as_text()
    }

    /// `first_value` followed by `as_bool`
    pub fn first_bool(&self) -> Result<bool, ErrorKind> {
        self.first_value()?.as_bool()
    }

    /// The only element of a 1x1 range
    fn single_cell(&self) -> Result<&Value, ErrorKind> {
        match self {
            Value::Range(rows) => {
                let mut cells = rows.iter().flatten();
                match (cells.next(), cells.next()) {
                    (Some(only), None) => Ok(only),
                    (None, _) => Err(ErrorKind::Ref),
                    (Some(_), Some(_)) => Err(ErrorKind::Value),
                }
            }
            other => Ok(other),
        }
    }

    // === Flattening ===

    /// All scalars of this value in row-major order
    pub fn flatten(&self) -> Vec<&Value> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into<'a>(&'a self, out: &mut Vec<&'a Value>) {
        match self {
            Value::Reference(_, inner) => inner.flatten_into(out),
            Value::Range(rows) => rows.iter().flatten().for_each(|v| v.flatten_into(out)),
            other => out.push(other),
        }
    }

    /// Like [`Value::flatten`], but an empty range is a `#REF!`
    pub fn flatten_checked(&self) -> Result<Vec<&Value>, ErrorKind> {
        match self.resolved() {
            Value::Range(rows) if rows.iter().all(|r| r.is_empty()) => Err(ErrorKind::Ref),
            _ => Ok(self.flatten()),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Blank
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Blank => Ok(()),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Text(s) => f.write_str(s),
            Value::Boolean(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            Value::Error(e) => write!(f, "{}", e),
            Value::Reference(_, inner) => write!(f, "{}", inner),
            Value::Range(rows) => {
                f.write_str("{")?;
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        f.write_str(";")?;
                    }
                    for (j, v) in row.iter().enumerate() {
                        if j > 0 {
                            f.write_str(",")?;
                        }
                        write!(f, "{}", v)?;
                    }
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::text(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<ErrorKind> for Value {
    fn from(e: ErrorKind) -> Self {
        Value::Error(e)
    }
}

impl From<Result<f64, ErrorKind>> for Value {
    fn from(r: Result<f64, ErrorKind>) -> Self {
        match r {
            Ok(n) => Value::Number(n),
            Err(e) => Value::Error(e),
        }
    }
}

/// Parse numeric-looking text: optional sign, digits, decimal point, exponent and a
/// trailing `%`. Surrounding whitespace is ignored; empty text is not a number.
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    let (body, scale) = match s.strip_suffix('%') {
        Some(rest) => (rest.trim_end(), 0.01),
        None => (s, 1.0),
    };
    if !body.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    if !body
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
    {
        return None;
    }
    body.parse::<f64>().ok().map(|n| n * scale)
}

/// Format a number the way a spreadsheet shows it in text context
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
