//! Built-in spreadsheet functions
//!
//! Every built-in has the same shape: it receives the already-evaluated arguments
//! (wrapped in [`Args`]) and returns a [`Value`]. Argument counts are checked by the
//! evaluator before the implementation runs; everything else (coercion, domain checks)
//! is the implementation's job.

pub mod date;
pub mod financial;
pub mod info;
pub mod logical;
pub mod math;

use crate::ast::FormulaExpr;
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::EvaluationContext;
use ahash::AHashMap;
use std::fmt;
use tabula_core::{ErrorKind, Value};

/// Function implementation signature
///
/// Functions can consult the evaluation context (resolver, clock, current cell) through
/// [`Args::ctx`].
pub type FunctionImpl = fn(&Args<'_>) -> Value;

/// Permitted argument counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly `n` arguments
    Exact(usize),
    /// Between `min` and `max` arguments, inclusive
    Between(usize, usize),
    /// `n` or more arguments
    AtLeast(usize),
}

impl Arity {
    /// Minimum number of arguments
    pub fn min(&self) -> usize {
        match *self {
            Arity::Exact(n) | Arity::Between(n, _) | Arity::AtLeast(n) => n,
        }
    }

    /// Maximum number of arguments (None = unlimited)
    pub fn max(&self) -> Option<usize> {
        match *self {
            Arity::Exact(n) | Arity::Between(_, n) => Some(n),
            Arity::AtLeast(_) => None,
        }
    }

    /// Check an argument count
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min() && self.max().map_or(true, |max| count <= max)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "exactly {}", n),
            Arity::Between(min, max) => write!(f, "{} to {}", min, max),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

/// Function definition
#[derive(Clone, Copy)]
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Accepted argument counts
    pub arity: Arity,
    /// Implementation
    pub implementation: FunctionImpl,
    /// Is volatile (result depends on more than its arguments, e.g. the clock)
    pub volatile: bool,
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("volatile", &self.volatile)
            .finish_non_exhaustive()
    }
}

/// Function registry
///
/// Names are stored upper-cased and looked up case-insensitively. The registry is
/// immutable once it is shared with an [`EvaluationContext`].
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: AHashMap<String, FunctionDef>,
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register_financial_functions();
        registry.register_info_functions();
        registry.register_logical_functions();
        registry.register_math_functions();
        registry.register_date_functions();

        registry
    }

    /// Create a registry without any functions
    pub fn empty() -> Self {
        Self {
            functions: AHashMap::new(),
        }
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_uppercase())
    }

    /// Check whether a function exists
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Check if no functions are registered
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Register a function
    ///
    /// Fails if the name is already taken or the argument bounds are inverted.
    pub fn register(&mut self, def: FunctionDef) -> FormulaResult<()> {
        if let Arity::Between(min, max) = def.arity {
            if min > max {
                return Err(FormulaError::InvalidArity {
                    name: def.name.to_string(),
                    min,
                    max,
                });
            }
        }

        let key = def.name.to_uppercase();
        if self.functions.contains_key(&key) {
            return Err(FormulaError::DuplicateFunction(key));
        }

        self.functions.insert(key, def);
        Ok(())
    }

    fn add(&mut self, name: &'static str, arity: Arity, implementation: FunctionImpl) {
        self.functions.insert(
            name.to_string(),
            FunctionDef {
                name,
                arity,
                implementation,
                volatile: false,
            },
        );
    }

    fn register_financial_functions(&mut self) {
        self.add("ACCRINT", Arity::Between(6, 7), financial::fn_accrint);
        self.add("CUMIPMT", Arity::Exact(6), financial::fn_cumipmt);
        self.add("CUMPRINC", Arity::Exact(6), financial::fn_cumprinc);
        self.add("DB", Arity::Between(4, 5), financial::fn_db);
        self.add("DDB", Arity::Between(4, 5), financial::fn_ddb);
        self.add("DOLLAR", Arity::Between(1, 2), financial::fn_dollar);
        self.add("DOLLARDE", Arity::Exact(2), financial::fn_dollarde);
        self.add("DOLLARFR", Arity::Exact(2), financial::fn_dollarfr);
        self.add("EFFECT", Arity::Exact(2), financial::fn_effect);
        self.add("PMT", Arity::Between(3, 5), financial::fn_pmt);
    }

    fn register_info_functions(&mut self) {
        self.add("NA", Arity::Exact(0), info::fn_na);
        self.add("ISTEXT", Arity::Exact(1), info::fn_istext);
        self.add("ISNONTEXT", Arity::Exact(1), info::fn_isnontext);
        self.add("ISLOGICAL", Arity::Exact(1), info::fn_islogical);
        self.add("ISNUMBER", Arity::Exact(1), info::fn_isnumber);
        self.add("ISBLANK", Arity::Exact(1), info::fn_isblank);
        self.add("ISERROR", Arity::Exact(1), info::fn_iserror);
        self.add("ISERR", Arity::Exact(1), info::fn_iserr);
        self.add("ISNA", Arity::Exact(1), info::fn_isna);
        self.add("ISREF", Arity::Exact(1), info::fn_isref);
        self.add("ISEMAIL", Arity::Exact(1), info::fn_isemail);
        self.add("ISURL", Arity::Exact(1), info::fn_isurl);
        self.add("N", Arity::Exact(1), info::fn_n);
        self.add("TYPE", Arity::Exact(1), info::fn_type);
        self.add("ERROR.TYPE", Arity::Exact(1), info::fn_error_type);
        self.add("ERRORTYPE", Arity::Exact(1), info::fn_error_type);
        self.add("COLUMN", Arity::Between(0, 1), info::fn_column);
        self.add("ROW", Arity::Between(0, 1), info::fn_row);
    }

    fn register_logical_functions(&mut self) {
        self.add("IF", Arity::Between(2, 3), logical::fn_if);
        self.add("IFERROR", Arity::Exact(2), logical::fn_iferror);
        self.add("IFNA", Arity::Exact(2), logical::fn_ifna);
        self.add("AND", Arity::AtLeast(1), logical::fn_and);
        self.add("OR", Arity::AtLeast(1), logical::fn_or);
        self.add("NOT", Arity::Exact(1), logical::fn_not);
        self.add("TRUE", Arity::Exact(0), logical::fn_true);
        self.add("FALSE", Arity::Exact(0), logical::fn_false);
    }

    fn register_math_functions(&mut self) {
        self.add("SUM", Arity::AtLeast(1), math::fn_sum);
        self.add("AVERAGE", Arity::AtLeast(1), math::fn_average);
        self.add("MIN", Arity::AtLeast(1), math::fn_min);
        self.add("MAX", Arity::AtLeast(1), math::fn_max);
        self.add("COUNT", Arity::AtLeast(1), math::fn_count);
    }

    fn register_date_functions(&mut self) {
        self.add("YEARFRAC", Arity::Between(2, 3), date::fn_yearfrac);
        self.add("DATEVALUE", Arity::Exact(1), date::fn_datevalue);
        self.add("NOW", Arity::Exact(0), date::fn_now);
        self.add("TODAY", Arity::Exact(0), date::fn_today);
        for name in ["NOW", "TODAY"] {
            if let Some(def) = self.functions.get_mut(name) {
                def.volatile = true;
            }
        }
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static BLANK: Value = Value::Blank;

/// The arguments of one function call
///
/// Carries the evaluated values, the raw argument expressions (for reference-aware
/// functions such as `ROW`) and the evaluation context.
pub struct Args<'a> {
    name: &'a str,
    values: &'a [Value],
    exprs: &'a [FormulaExpr],
    ctx: &'a EvaluationContext<'a>,
}

impl<'a> Args<'a> {
    /// Bundle the arguments of a call to `name`
    pub fn new(
        name: &'a str,
        values: &'a [Value],
        exprs: &'a [FormulaExpr],
        ctx: &'a EvaluationContext<'a>,
    ) -> Self {
        Self {
            name,
            values,
            exprs,
            ctx,
        }
    }

    /// Name of the called function
    pub fn name(&self) -> &str {
        self.name
    }

    /// Number of arguments supplied
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the call has no arguments
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All evaluated argument values
    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    /// The `index`th argument, if supplied
    pub fn get(&self, index: usize) -> Option<&'a Value> {
        self.values.get(index)
    }

    /// The `index`th argument, blank if not supplied
    pub fn value(&self, index: usize) -> &'a Value {
        self.values.get(index).unwrap_or(&BLANK)
    }

    /// The unevaluated `index`th argument
    pub fn expr(&self, index: usize) -> Option<&'a FormulaExpr> {
        self.exprs.get(index)
    }

    /// The evaluation context of the call
    pub fn ctx(&self) -> &'a EvaluationContext<'a> {
        self.ctx
    }

    /// First value of argument `index` as a number
    pub fn number(&self, index: usize) -> Result<f64, ErrorKind> {
        self.value(index).first_number()
    }

    /// Like [`Args::number`], with a default for an omitted argument
    pub fn number_or(&self, index: usize, default: f64) -> Result<f64, ErrorKind> {
        match self.get(index) {
            Some(value) => value.first_number(),
            None => Ok(default),
        }
    }

    /// First value of argument `index` as text
    pub fn text(&self, index: usize) -> Result<String, ErrorKind> {
        self.value(index).first_text()
    }

    /// First value of argument `index` as a boolean
    pub fn boolean(&self, index: usize) -> Result<bool, ErrorKind> {
        self.value(index).first_bool()
    }

    /// Report a domain violation of parameter `index` (0-based) and return `#NUM!`
    pub fn num_error(&self, index: usize, message: fmt::Arguments<'_>) -> ErrorKind {
        log::debug!(
            "Function {} parameter {}: {}",
            self.name,
            index + 1,
            message
        );
        ErrorKind::Num
    }
}

/// Numbers among already-flattened values; text, booleans and blanks are skipped
pub fn numbers_only(values: &[&Value]) -> Vec<f64> {
    values
        .iter()
        .filter_map(|v| match v {
            Value::Number(n) => Some(*n),
            _ => None,
        })
        .collect()
}

/// Collect the numeric arguments of an aggregate function
///
/// Direct scalar arguments are coerced (so `SUM("3", TRUE)` is 4), while values coming
/// from references and ranges only contribute their numbers. Errors anywhere win.
pub fn collect_numbers(args: &Args<'_>) -> Result<Vec<f64>, ErrorKind> {
    let mut numbers = Vec::new();
    for value in args.values() {
        match value {
            Value::Reference(..) | Value::Range(_) => {
                let cells = value.flatten_checked()?;
                if let Some(e) = cells.iter().find_map(|v| v.error()) {
                    return Err(e);
                }
                numbers.extend(numbers_only(&cells));
            }
            Value::Blank => {}
            scalar => numbers.push(scalar.as_number()?),
        }
    }
    Ok(numbers)
}

/// Convert a computed number into a value, mapping NaN and infinities to `#NUM!`
pub fn finite(n: f64) -> Result<f64, ErrorKind> {
    if n.is_finite() {
        Ok(n)
    } else {
        Err(ErrorKind::Num)
    }
}
