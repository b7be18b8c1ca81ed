//! Formula error kinds

use std::fmt;
use std::str::FromStr;

/// The seven spreadsheet error values.
///
/// Errors are ordinary values: they are produced where a computation fails and travel
/// through arithmetic, coercion and function calls until something (e.g. `IFERROR`)
/// consumes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorKind {
    /// #NULL! - Incorrect range operator
    Null,
    /// #DIV/0! - Division by zero
    DivZero,
    /// #VALUE! - Wrong type of argument or operand
    Value,
    /// #REF! - Invalid cell reference
    Ref,
    /// #NAME? - Unrecognized formula name
    Name,
    /// #NUM! - Invalid numeric value
    Num,
    /// #N/A - Value not available
    NotAvailable,
}

impl ErrorKind {
    /// Every error kind, ordered by code
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::Null,
        ErrorKind::DivZero,
        ErrorKind::Value,
        ErrorKind::Ref,
        ErrorKind::Name,
        ErrorKind::Num,
        ErrorKind::NotAvailable,
    ];

    /// Get the display string for this error
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Null => "#NULL!",
            ErrorKind::DivZero => "#DIV/0!",
            ErrorKind::Value => "#VALUE!",
            ErrorKind::Ref => "#REF!",
            ErrorKind::Name => "#NAME?",
            ErrorKind::Num => "#NUM!",
            ErrorKind::NotAvailable => "#N/A",
        }
    }

    /// Parse an error literal (case-insensitive)
    pub fn from_text(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
    }

    /// The `ERROR.TYPE` code, 1 through 7
    pub fn code(&self) -> u8 {
        match self {
            ErrorKind::Null => 1,
            ErrorKind::DivZero => 2,
            ErrorKind::Value => 3,
            ErrorKind::Ref => 4,
            ErrorKind::Name => 5,
            ErrorKind::Num => 6,
            ErrorKind::NotAvailable => 7,
        }
    }

    /// Inverse of [`ErrorKind::code`]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::from_text(s).ok_or_else(|| crate::Error::InvalidName(s.to_string()))
    }
}
