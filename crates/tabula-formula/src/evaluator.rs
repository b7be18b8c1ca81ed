//! Formula evaluator
//!
//! Evaluates formula ASTs to produce values. Evaluation never fails: spreadsheet
//! errors are ordinary [`Value::Error`] results that propagate left to right.

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::clock::{Clock, SystemClock};
use crate::error::FormulaResult;
use crate::functions::{Args, FunctionRegistry};
use crate::parser::{parse_formula, MAX_NESTING};
use chrono::NaiveDateTime;
use std::cmp::Ordering;
use std::sync::OnceLock;
use tabula_core::{CellId, CellRange, CellResolver, EmptyResolver, ErrorKind, Value};

/// Global function registry (lazily initialized)
static FUNCTION_REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

/// The process-wide registry of built-in functions
pub fn get_function_registry() -> &'static FunctionRegistry {
    FUNCTION_REGISTRY.get_or_init(FunctionRegistry::new)
}

static SYSTEM_CLOCK: SystemClock = SystemClock;
static EMPTY_RESOLVER: EmptyResolver = EmptyResolver;

/// Default evaluation depth ceiling, the same as the parser's nesting limit
pub const DEFAULT_MAX_DEPTH: usize = MAX_NESTING;

/// Default ceiling on the number of cells a range reference may materialize
pub const DEFAULT_MAX_RANGE_CELLS: usize = 1_000_000;

/// Tunables for an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationSettings {
    /// Maximum expression nesting; deeper trees evaluate to `#VALUE!`
    ///
    /// Function calls, unary operators, array literals and `^` exponents each add a
    /// level. Operator chains such as `1+2+3` do not.
    pub max_depth: usize,
    /// Largest range reference that is read; bigger ranges evaluate to `#VALUE!`
    pub max_range_cells: usize,
}

impl EvaluationSettings {
    /// Set the depth ceiling
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the range size ceiling
    pub fn with_max_range_cells(mut self, max_range_cells: usize) -> Self {
        self.max_range_cells = max_range_cells;
        self
    }
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_range_cells: DEFAULT_MAX_RANGE_CELLS,
        }
    }
}

/// Context for formula evaluation
#[derive(Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// Source of cell contents and defined names
    pub resolver: &'a dyn CellResolver,
    /// Sheet used for unqualified references (`None` = the resolver's default)
    pub current_sheet: Option<&'a str>,
    /// The cell holding the formula (for `ROW()` / `COLUMN()`)
    pub current_cell: CellId,
    /// Evaluation settings
    pub settings: EvaluationSettings,
    /// Time source for volatile date functions
    pub clock: &'a dyn Clock,
    /// Function registry; `None` uses the global built-ins
    pub registry: Option<&'a FunctionRegistry>,
}

impl<'a> EvaluationContext<'a> {
    /// Create a new evaluation context reading cells from `resolver`
    pub fn new(resolver: &'a dyn CellResolver) -> Self {
        Self {
            resolver,
            current_sheet: None,
            current_cell: CellId::new(0, 0),
            settings: EvaluationSettings::default(),
            clock: &SYSTEM_CLOCK,
            registry: None,
        }
    }

    /// Create a simple context without any cells (for testing)
    pub fn simple() -> EvaluationContext<'static> {
        EvaluationContext::new(&EMPTY_RESOLVER)
    }

    /// Resolve unqualified references against `sheet`
    pub fn with_sheet(mut self, sheet: &'a str) -> Self {
        self.current_sheet = Some(sheet);
        self
    }

    /// Set the position of the formula cell
    pub fn with_cell(mut self, cell: CellId) -> Self {
        self.current_cell = cell;
        self
    }

    /// Replace the settings
    pub fn with_settings(mut self, settings: EvaluationSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the clock
    pub fn with_clock(mut self, clock: &'a dyn Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Use a custom function registry
    pub fn with_registry(mut self, registry: &'a FunctionRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// The registry functions are looked up in
    pub fn registry(&self) -> &'a FunctionRegistry {
        match self.registry {
            Some(registry) => registry,
            None => get_function_registry(),
        }
    }

    /// Current local time from the context's clock
    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    fn try_cell(&self, sheet: Option<&str>, id: CellId) -> Option<Value> {
        let sheet = sheet.or(self.current_sheet);
        let cell = self.resolver.resolve(sheet, id);
        if cell.is_none() {
            log::debug!("reference {} on unknown sheet {:?}", id, sheet);
        }
        cell.map(|c| c.into_value())
    }

    /// Get a cell value; an unknown sheet is `#REF!`
    pub fn get_cell_value(&self, sheet: Option<&str>, id: CellId) -> Value {
        self.try_cell(sheet, id)
            .unwrap_or(Value::Error(ErrorKind::Ref))
    }

    /// Get a range as a row-major block of values
    pub fn get_range_values(&self, sheet: Option<&str>, range: &CellRange) -> Value {
        let cells = range.row_count() as usize * range.col_count() as usize;
        if cells > self.settings.max_range_cells {
            log::debug!(
                "range {} has {} cells, more than the limit of {}",
                range,
                cells,
                self.settings.max_range_cells
            );
            return Value::Error(ErrorKind::Value);
        }

        let mut rows = Vec::with_capacity(range.row_count() as usize);
        for row_ids in range.rows() {
            let mut row = Vec::with_capacity(range.col_count() as usize);
            for id in row_ids {
                match self.try_cell(sheet, id) {
                    Some(value) => row.push(value),
                    None => return Value::Error(ErrorKind::Ref),
                }
            }
            rows.push(row);
        }
        Value::range(rows)
    }

    /// Resolve a defined name; unknown names are `#NAME?`
    pub fn resolve_named_range(&self, name: &str) -> Value {
        match self.resolver.named_value(name) {
            Some(value) => value,
            None => {
                log::debug!("unknown name {}", name);
                Value::Error(ErrorKind::Name)
            }
        }
    }
}

/// Parse and evaluate formula text
///
/// # Example
/// ```rust
/// use tabula_core::Value;
/// use tabula_formula::{calculate, EvaluationContext};
///
/// let ctx = EvaluationContext::simple();
/// assert_eq!(calculate("=PMT(0,10,1000)", &ctx).unwrap(), Value::Number(-100.0));
/// ```
pub fn calculate(formula: &str, ctx: &EvaluationContext) -> FormulaResult<Value> {
    let ast = parse_formula(formula)?;
    Ok(evaluate(&ast, ctx))
}

/// Evaluate a formula expression
///
/// The result is never a [`Value::Reference`]. Trees from [`parse_formula`] are
/// bounded in depth; hand-built trees should keep to the same nesting.
pub fn evaluate(expr: &FormulaExpr, ctx: &EvaluationContext) -> Value {
    evaluate_at(expr, ctx, 0).deref()
}

fn evaluate_at(expr: &FormulaExpr, ctx: &EvaluationContext, depth: usize) -> Value {
    if depth > ctx.settings.max_depth {
        log::warn!(
            "formula nesting exceeds the depth limit of {}",
            ctx.settings.max_depth
        );
        return Value::Error(ErrorKind::Value);
    }

    match expr {
        // === Literals ===
        FormulaExpr::Number(n) => Value::Number(*n),
        FormulaExpr::Text(s) => Value::Text(s.clone()),
        FormulaExpr::Boolean(b) => Value::Boolean(*b),
        FormulaExpr::Error(e) => Value::Error(*e),

        // === References ===
        FormulaExpr::CellRef(cell_ref) => {
            ctx.get_cell_value(cell_ref.sheet.as_deref(), cell_ref.address.id())
        }

        FormulaExpr::RangeRef(range_ref) => {
            ctx.get_range_values(range_ref.sheet.as_deref(), &range_ref.range)
        }

        FormulaExpr::NameRef(name) => ctx.resolve_named_range(name),

        // === Operators ===
        FormulaExpr::BinaryOp { .. } => evaluate_operator_chain(expr, ctx, depth),

        FormulaExpr::UnaryOp { op, operand } => evaluate_unary_op(*op, operand, ctx, depth),

        // === Functions ===
        FormulaExpr::Function { name, args } => evaluate_function(name, args, ctx, depth),

        // === Arrays ===
        FormulaExpr::Array(rows) => {
            let rows = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|expr| evaluate_at(expr, ctx, depth + 1))
                        .collect()
                })
                .collect();
            Value::range(rows)
        }
    }
}

/// Evaluate a left-nested chain of binary operators, such as `1+2-3&4`, in a loop
fn evaluate_operator_chain(expr: &FormulaExpr, ctx: &EvaluationContext, depth: usize) -> Value {
    let (head, steps) = expr.operator_chain();
    let mut acc = evaluate_at(head, ctx, depth);
    for (op, right) in steps {
        let right_depth = match op {
            BinaryOperator::Power => depth + 1,
            _ => depth,
        };
        acc = evaluate_binary_op(op, acc, right, ctx, right_depth);
    }
    acc
}

/// Apply `op` to an evaluated left operand and the expression on its right
fn evaluate_binary_op(
    op: BinaryOperator,
    left_val: Value,
    right: &FormulaExpr,
    ctx: &EvaluationContext,
    depth: usize,
) -> Value {
    // A left error pre-empts the right operand entirely
    if let Err(e) = operand(&left_val) {
        return Value::Error(e);
    }
    let right_val = evaluate_at(right, ctx, depth);
    if let Err(e) = operand(&right_val) {
        return Value::Error(e);
    }

    let result = match op {
        BinaryOperator::Add
        | BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Power => arithmetic(op, &left_val, &right_val).map(Value::Number),

        BinaryOperator::Concat => left_val
            .as_text()
            .and_then(|l| Ok(Value::Text(l + &right_val.as_text()?))),

        BinaryOperator::Equal
        | BinaryOperator::NotEqual
        | BinaryOperator::LessThan
        | BinaryOperator::LessEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterEqual => {
            compare_values(&left_val, &right_val).map(|ord| {
                Value::Boolean(match op {
                    BinaryOperator::Equal => ord == Ordering::Equal,
                    BinaryOperator::NotEqual => ord != Ordering::Equal,
                    BinaryOperator::LessThan => ord == Ordering::Less,
                    BinaryOperator::LessEqual => ord != Ordering::Greater,
                    BinaryOperator::GreaterThan => ord == Ordering::Greater,
                    _ => ord != Ordering::Less,
                })
            })
        }
    };

    result.unwrap_or_else(Value::Error)
}

fn arithmetic(op: BinaryOperator, left: &Value, right: &Value) -> Result<f64, ErrorKind> {
    let l = left.as_number()?;
    let r = right.as_number()?;

    let result = match op {
        BinaryOperator::Add => l + r,
        BinaryOperator::Subtract => l - r,
        BinaryOperator::Multiply => l * r,
        BinaryOperator::Divide => {
            if r == 0.0 {
                return Err(ErrorKind::DivZero);
            }
            l / r
        }
        BinaryOperator::Power => {
            if l == 0.0 && r < 0.0 {
                return Err(ErrorKind::DivZero);
            }
            l.powf(r)
        }
        _ => return Err(ErrorKind::Value),
    };

    if result.is_finite() {
        Ok(result)
    } else {
        Err(ErrorKind::Num)
    }
}

/// The scalar an operator works on: references are looked through and a 1x1 range is
/// its cell. Errors, empty ranges and larger ranges are raised.
fn operand(value: &Value) -> Result<&Value, ErrorKind> {
    match value.resolved() {
        Value::Range(_) => {
            let cells = value.flatten_checked()?;
            match cells.as_slice() {
                [only] => match only {
                    Value::Error(e) => Err(*e),
                    v => Ok(*v),
                },
                _ => Err(ErrorKind::Value),
            }
        }
        Value::Error(e) => Err(*e),
        v => Ok(v),
    }
}

/// Type rank for mixed comparisons: number < text < boolean
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Text(_) => 1,
        Value::Boolean(_) => 2,
        _ => 0,
    }
}

/// Compare two values for ordering (spreadsheet-style comparison)
///
/// A blank takes the neutral value of the other side's type: 0, `""` or FALSE.
fn compare_values(left: &Value, right: &Value) -> Result<Ordering, ErrorKind> {
    let left = operand(left)?;
    let right = operand(right)?;

    let blank_as = |other: &Value| match other {
        Value::Text(_) => Value::Text(String::new()),
        Value::Boolean(_) => Value::Boolean(false),
        _ => Value::Number(0.0),
    };
    let left_owned;
    let right_owned;
    let (left, right) = match (left, right) {
        (Value::Blank, Value::Blank) => return Ok(Ordering::Equal),
        (Value::Blank, r) => {
            left_owned = blank_as(r);
            (&left_owned, r)
        }
        (l, Value::Blank) => {
            right_owned = blank_as(l);
            (l, &right_owned)
        }
        pair => pair,
    };

    Ok(match (left, right) {
        // Numbers compare numerically
        (Value::Number(l), Value::Number(r)) => l.partial_cmp(r).unwrap_or(Ordering::Equal),

        // Strings compare case-insensitively
        (Value::Text(l), Value::Text(r)) => l.to_lowercase().cmp(&r.to_lowercase()),

        // Booleans: FALSE < TRUE
        (Value::Boolean(l), Value::Boolean(r)) => l.cmp(r),

        // Mixed types
        (l, r) => type_rank(l).cmp(&type_rank(r)),
    })
}

/// Evaluate a unary operation
fn evaluate_unary_op(
    op: UnaryOperator,
    operand: &FormulaExpr,
    ctx: &EvaluationContext,
    depth: usize,
) -> Value {
    let val = evaluate_at(operand, ctx, depth + 1);

    match op {
        UnaryOperator::Negate => val.as_number().map(|n| -n).into(),
        UnaryOperator::Plus => val.deref(),
        UnaryOperator::Percent => val.as_number().map(|n| n / 100.0).into(),
    }
}

/// Evaluate a function call
fn evaluate_function(
    name: &str,
    args: &[FormulaExpr],
    ctx: &EvaluationContext,
    depth: usize,
) -> Value {
    let registry = ctx.registry();

    let func = match registry.get(name) {
        Some(func) => func,
        None => {
            log::debug!("unknown function {}", name);
            return Value::Error(ErrorKind::Name);
        }
    };

    // Check argument count before touching the arguments
    if !func.arity.accepts(args.len()) {
        log::debug!(
            "{} called with {} argument(s), expected {}",
            func.name,
            args.len(),
            func.arity
        );
        return Value::Error(ErrorKind::NotAvailable);
    }

    // Evaluate arguments; a bare cell reference keeps its position
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        let value = match arg {
            FormulaExpr::CellRef(cell_ref) => {
                let id = cell_ref.address.id();
                match ctx.try_cell(cell_ref.sheet.as_deref(), id) {
                    Some(value) => Value::Reference(id, Box::new(value)),
                    None => Value::Error(ErrorKind::Ref),
                }
            }
            _ => evaluate_at(arg, ctx, depth + 1),
        };
        values.push(value);
    }

    log::trace!("calling {} with {} argument(s)", func.name, values.len());

    // Call the function
    match (func.implementation)(&Args::new(func.name, &values, args, ctx)) {
        Value::Number(n) if !n.is_finite() => Value::Error(ErrorKind::Num),
        result => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::functions::{Arity, FunctionDef};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use tabula_core::MemoryGrid;

    fn eval(formula: &str) -> Value {
        let ctx = EvaluationContext::simple();
        calculate(formula, &ctx).unwrap()
    }

    fn eval_in(grid: &MemoryGrid, formula: &str) -> Value {
        let ctx = EvaluationContext::new(grid);
        calculate(formula, &ctx).unwrap()
    }

    fn grid() -> MemoryGrid {
        let mut grid = MemoryGrid::new();
        grid.set("A1", 10).unwrap();
        grid.set("A2", 20).unwrap();
        grid.set("A3", "abc").unwrap();
        grid.set("B1", ErrorKind::DivZero).unwrap();
        grid.set("B2", true).unwrap();
        grid.add_sheet("Data").unwrap();
        grid.set_on("Data", "A1", 7).unwrap();
        grid.define_name("Rate", 0.25).unwrap();
        grid
    }

    #[test]
    fn test_evaluate_literals() {
        assert_eq!(eval("=42"), Value::Number(42.0));
        assert_eq!(eval("=3.14"), Value::Number(3.14));
        assert_eq!(eval("=\"Hello\""), Value::text("Hello"));
        assert_eq!(eval("=TRUE"), Value::Boolean(true));
        assert_eq!(eval("=#REF!"), Value::Error(ErrorKind::Ref));
    }

    #[test]
    fn test_evaluate_arithmetic() {
        assert_eq!(eval("=1+2"), Value::Number(3.0));
        assert_eq!(eval("=10-3"), Value::Number(7.0));
        assert_eq!(eval("=4*5"), Value::Number(20.0));
        assert_eq!(eval("=20/4"), Value::Number(5.0));
        assert_eq!(eval("=\"3\"+TRUE"), Value::Number(4.0));
    }

    #[test]
    fn test_evaluate_precedence() {
        assert_eq!(eval("=1+2*3"), Value::Number(7.0));
        assert_eq!(eval("=(1+2)*3"), Value::Number(9.0));
        assert_eq!(eval("=2^3^2"), Value::Number(512.0));
        assert_eq!(eval("=-2^2"), Value::Number(4.0));
        assert_eq!(eval("=1+2&3"), Value::text("33"));
    }

    #[test]
    fn test_evaluate_unary() {
        assert_eq!(eval("=-5"), Value::Number(-5.0));
        assert_eq!(eval("=50%"), Value::Number(0.5));
        assert_eq!(eval("=+\"x\""), Value::text("x"));
        assert_eq!(eval("=-\"x\""), Value::Error(ErrorKind::Value));
    }

    #[test]
    fn test_evaluate_comparison() {
        assert_eq!(eval("=5>3"), Value::Boolean(true));
        assert_eq!(eval("=5<3"), Value::Boolean(false));
        assert_eq!(eval("=5=5"), Value::Boolean(true));
        assert_eq!(eval("=5<>5"), Value::Boolean(false));
        assert_eq!(eval("=\"abc\"=\"ABC\""), Value::Boolean(true));
        assert_eq!(eval("=\"b\">\"A\""), Value::Boolean(true));
        assert_eq!(eval("=TRUE>FALSE"), Value::Boolean(true));
    }

    #[test]
    fn test_mixed_type_ordering() {
        assert_eq!(eval("=1<\"a\""), Value::Boolean(true));
        assert_eq!(eval("=\"a\"<TRUE"), Value::Boolean(true));
        assert_eq!(eval("=99999<FALSE"), Value::Boolean(true));
        assert_eq!(eval("=\"1\"=1"), Value::Boolean(false));
    }

    #[test]
    fn test_blank_comparisons() {
        let grid = grid();
        assert_eq!(eval_in(&grid, "=Z1=0"), Value::Boolean(true));
        assert_eq!(eval_in(&grid, "=Z1=\"\""), Value::Boolean(true));
        assert_eq!(eval_in(&grid, "=Z1=FALSE"), Value::Boolean(true));
        assert_eq!(eval_in(&grid, "=Z1<1"), Value::Boolean(true));
        assert_eq!(eval_in(&grid, "=Z1=Z2"), Value::Boolean(true));
    }

    #[test]
    fn test_evaluate_concatenation() {
        assert_eq!(eval("=\"Hello \"&\"World\""), Value::text("Hello World"));
        assert_eq!(eval("=\"n=\"&1.5"), Value::text("n=1.5"));
        assert_eq!(eval("=TRUE&1"), Value::text("TRUE1"));
    }

    #[test]
    fn test_numeric_errors() {
        assert_eq!(eval("=1/0"), Value::Error(ErrorKind::DivZero));
        assert_eq!(eval("=0^-1"), Value::Error(ErrorKind::DivZero));
        assert_eq!(eval("=(-8)^0.5"), Value::Error(ErrorKind::Num));
        assert_eq!(eval("=10^400"), Value::Error(ErrorKind::Num));
        assert_eq!(eval("=0^0"), Value::Number(1.0));
        assert_eq!(eval("=1e999+1"), Value::Error(ErrorKind::Num));
    }

    #[test]
    fn test_left_error_wins() {
        assert_eq!(eval("=#N/A+#REF!"), Value::Error(ErrorKind::NotAvailable));
        assert_eq!(eval("=1/0&#NAME?"), Value::Error(ErrorKind::DivZero));
        assert_eq!(eval("=\"x\"+#NUM!"), Value::Error(ErrorKind::Num));
        assert_eq!(eval("=#NULL!=#NULL!"), Value::Error(ErrorKind::Null));
    }

    #[test]
    fn test_left_error_wins_inside_ranges() {
        let grid = grid();
        assert_eq!(eval("={#N/A}+#REF!"), Value::Error(ErrorKind::NotAvailable));
        assert_eq!(eval("={#N/A}&{#NUM!}"), Value::Error(ErrorKind::NotAvailable));
        assert_eq!(eval("=1+{#NUM!}"), Value::Error(ErrorKind::Num));
        assert_eq!(eval_in(&grid, "=B1:B1+#REF!"), Value::Error(ErrorKind::DivZero));
        assert_eq!(eval_in(&grid, "=B1+#REF!"), Value::Error(ErrorKind::DivZero));
        assert_eq!(eval_in(&grid, "=#NAME?<B1:B1"), Value::Error(ErrorKind::Name));
        // A multi-cell operand is already a #VALUE! on the left
        assert_eq!(eval_in(&grid, "=A1:A2+#REF!"), Value::Error(ErrorKind::Value));
    }

    #[test]
    fn test_long_operator_chains() {
        let sum = format!("={}", vec!["1"; 300].join("+"));
        assert_eq!(eval(&sum), Value::Number(300.0));

        let sum = format!("={}", vec!["1"; 3_000].join("+"));
        assert_eq!(eval(&sum), Value::Number(3_000.0));

        let text = format!("={}", vec!["\"a\""; 100].join("&"));
        assert_eq!(eval(&text), Value::text("a".repeat(100)));

        // An error early in the chain survives to the end
        let chain = format!("=1+#N/A{}", "+1".repeat(500));
        assert_eq!(eval(&chain), Value::Error(ErrorKind::NotAvailable));
    }

    #[test]
    fn test_parser_nesting_fits_the_default_depth() {
        let calls = format!("={}1{}", "SUM(".repeat(60), ")".repeat(60));
        assert!(parse_formula(&calls).is_ok());
        assert_eq!(eval(&calls), Value::Number(1.0));

        let powers = format!("={}", vec!["1"; 60].join("^"));
        assert_eq!(eval(&powers), Value::Number(1.0));
    }

    #[test]
    fn test_range_size_limit() {
        let grid = grid();
        assert_eq!(
            eval_in(&grid, "=SUM(A1:XFD1048576)"),
            Value::Error(ErrorKind::Value)
        );

        let settings = EvaluationSettings::default().with_max_range_cells(4);
        let ctx = EvaluationContext::new(&grid).with_settings(settings);
        assert_eq!(calculate("=SUM(A1:B2)", &ctx).unwrap(), Value::Error(ErrorKind::DivZero));
        assert_eq!(calculate("=SUM(A1:A5)", &ctx).unwrap(), Value::Error(ErrorKind::Value));
    }

    #[test]
    fn test_cell_references() {
        let grid = grid();
        assert_eq!(eval_in(&grid, "=A1+A2"), Value::Number(30.0));
        assert_eq!(eval_in(&grid, "=A3"), Value::text("abc"));
        assert_eq!(eval_in(&grid, "=Z99"), Value::Blank);
        assert_eq!(eval_in(&grid, "=Z99+1"), Value::Number(1.0));
        assert_eq!(eval_in(&grid, "=A3*2"), Value::Error(ErrorKind::Value));
        assert_eq!(eval_in(&grid, "=B1+1"), Value::Error(ErrorKind::DivZero));
        assert_eq!(eval_in(&grid, "=Data!A1*2"), Value::Number(14.0));
        assert_eq!(eval_in(&grid, "=Missing!A1"), Value::Error(ErrorKind::Ref));
    }

    #[test]
    fn test_current_sheet() {
        let grid = grid();
        let ctx = EvaluationContext::new(&grid).with_sheet("Data");
        assert_eq!(calculate("=A1", &ctx).unwrap(), Value::Number(7.0));
        assert_eq!(calculate("=Sheet1!A1", &ctx).unwrap(), Value::Number(10.0));
    }

    #[test]
    fn test_range_references() {
        let grid = grid();
        assert_eq!(
            eval_in(&grid, "=A1:B2"),
            Value::Range(vec![
                vec![Value::Number(10.0), Value::Error(ErrorKind::DivZero)],
                vec![Value::Number(20.0), Value::Boolean(true)],
            ])
        );
        assert_eq!(eval_in(&grid, "=A1:A1*3"), Value::Number(30.0));
        assert_eq!(eval_in(&grid, "=A1:A2*3"), Value::Error(ErrorKind::Value));
        assert_eq!(eval_in(&grid, "=Nope!A1:A2"), Value::Error(ErrorKind::Ref));
    }

    #[test]
    fn test_named_values() {
        let grid = grid();
        assert_eq!(eval_in(&grid, "=A1*Rate"), Value::Number(2.5));
        assert_eq!(eval_in(&grid, "=A1*rate"), Value::Number(2.5));
        assert_eq!(eval_in(&grid, "=Unknown"), Value::Error(ErrorKind::Name));
    }

    #[test]
    fn test_evaluate_array() {
        assert_eq!(
            eval("={1,2;3,\"x\"}"),
            Value::Range(vec![
                vec![Value::Number(1.0), Value::Number(2.0)],
                vec![Value::Number(3.0), Value::text("x")],
            ])
        );
        assert_eq!(eval("={1+1}"), Value::Range(vec![vec![Value::Number(2.0)]]));
    }

    #[test]
    fn test_function_dispatch() {
        assert_eq!(eval("=UNKNOWNFN(1)"), Value::Error(ErrorKind::Name));
        assert_eq!(eval("=pmt(0,10,1000)"), Value::Number(-100.0));
        // Arity is checked before any argument is evaluated
        assert_eq!(eval("=NOT(1/0,2)"), Value::Error(ErrorKind::NotAvailable));
        assert_eq!(eval("=NA(1)"), Value::Error(ErrorKind::NotAvailable));
    }

    #[test]
    fn test_reference_arguments() {
        let grid = grid();
        let ctx = EvaluationContext::new(&grid).with_cell(CellId::new(3, 9));
        assert_eq!(calculate("=ISREF(A1)", &ctx).unwrap(), Value::Boolean(true));
        assert_eq!(calculate("=ISREF(A1+0)", &ctx).unwrap(), Value::Boolean(false));
        assert_eq!(calculate("=COLUMN(C5)", &ctx).unwrap(), Value::Number(3.0));
        assert_eq!(calculate("=ROW()", &ctx).unwrap(), Value::Number(10.0));
        assert_eq!(calculate("=COLUMN()", &ctx).unwrap(), Value::Number(4.0));
        // The top-level result is the referenced content, not the reference
        assert_eq!(calculate("=IF(TRUE,A1)", &ctx).unwrap(), Value::Number(10.0));
    }

    fn always_seven(_args: &Args) -> Value {
        Value::Number(7.0)
    }

    fn infinite(_args: &Args) -> Value {
        Value::Number(f64::INFINITY)
    }

    #[test]
    fn test_custom_registry() {
        let mut registry = FunctionRegistry::new();
        registry
            .register(FunctionDef {
                name: "SEVEN",
                arity: Arity::Exact(0),
                implementation: always_seven,
                volatile: false,
            })
            .unwrap();
        registry
            .register(FunctionDef {
                name: "INF",
                arity: Arity::Exact(0),
                implementation: infinite,
                volatile: false,
            })
            .unwrap();

        let ctx = EvaluationContext::simple().with_registry(&registry);
        assert_eq!(calculate("=SEVEN()*2", &ctx).unwrap(), Value::Number(14.0));
        assert_eq!(calculate("=INF()", &ctx).unwrap(), Value::Error(ErrorKind::Num));

        // The global registry is unaffected
        assert_eq!(eval("=SEVEN()"), Value::Error(ErrorKind::Name));
    }

    #[test]
    fn test_depth_limit() {
        let ctx = EvaluationContext::simple()
            .with_settings(EvaluationSettings::default().with_max_depth(8));
        assert_eq!(
            calculate("=((((((((((1))))))))))+1", &ctx).unwrap(),
            Value::Number(2.0)
        );
        assert_eq!(
            calculate("=-(-(-(-(-(-(-(-(-(-1)))))))))", &ctx).unwrap(),
            Value::Error(ErrorKind::Value)
        );
        assert_eq!(
            calculate("=-(-(-(1)))", &ctx).unwrap(),
            Value::Number(-1.0)
        );
    }

    #[test]
    fn test_clock_is_injected() {
        let clock = FixedClock::at(2024, 1, 15, 18, 0, 0).unwrap();
        let ctx = EvaluationContext::simple().with_clock(&clock);
        // 2024-01-15 is serial 45306
        assert_eq!(calculate("=TODAY()", &ctx).unwrap(), Value::Number(45306.0));
        assert_eq!(calculate("=NOW()", &ctx).unwrap(), Value::Number(45306.0));
    }

    #[test]
    fn test_calculate_reports_parse_errors() {
        let ctx = EvaluationContext::simple();
        assert!(calculate("=1+", &ctx).is_err());
        assert!(calculate("=(1", &ctx).is_err());
    }

    const BINARY_OPS: [BinaryOperator; 12] = [
        BinaryOperator::Add,
        BinaryOperator::Subtract,
        BinaryOperator::Multiply,
        BinaryOperator::Divide,
        BinaryOperator::Power,
        BinaryOperator::Equal,
        BinaryOperator::NotEqual,
        BinaryOperator::LessThan,
        BinaryOperator::LessEqual,
        BinaryOperator::GreaterThan,
        BinaryOperator::GreaterEqual,
        BinaryOperator::Concat,
    ];

    fn binary(op: BinaryOperator, left: FormulaExpr, right: FormulaExpr) -> FormulaExpr {
        FormulaExpr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Grid with error code `n` in `An`
    fn error_grid() -> MemoryGrid {
        let mut grid = MemoryGrid::new();
        for kind in ErrorKind::ALL {
            grid.set(&format!("A{}", kind.code()), kind).unwrap();
        }
        grid
    }

    /// Formula text for an operand holding `kind` in the given shape
    fn error_operand(kind: ErrorKind, shape: usize) -> String {
        match shape {
            0 => kind.to_string(),
            1 => format!("{{{}}}", kind),
            2 => format!("A{}", kind.code()),
            _ => format!("A{0}:A{0}", kind.code()),
        }
    }

    proptest! {
        #[test]
        fn errors_are_absorbing(
            op_index in 0..BINARY_OPS.len(),
            left_code in 1u8..=7,
            right_code in 1u8..=7,
            n in -1e6f64..1e6,
        ) {
            let op = BINARY_OPS[op_index];
            let left = ErrorKind::from_code(left_code).unwrap();
            let right = ErrorKind::from_code(right_code).unwrap();
            let ctx = EvaluationContext::simple();

            let expr = binary(op, FormulaExpr::Error(left), FormulaExpr::Number(n));
            prop_assert_eq!(evaluate(&expr, &ctx), Value::Error(left));

            let expr = binary(op, FormulaExpr::Text("t".into()), FormulaExpr::Error(right));
            prop_assert_eq!(evaluate(&expr, &ctx), Value::Error(right));

            let expr = binary(op, FormulaExpr::Error(left), FormulaExpr::Error(right));
            prop_assert_eq!(evaluate(&expr, &ctx), Value::Error(left));
        }

        #[test]
        fn errors_are_absorbing_in_any_shape(
            op_index in 0..BINARY_OPS.len(),
            left_code in 1u8..=7,
            right_code in 1u8..=7,
            left_shape in 0usize..4,
            right_shape in 0usize..4,
        ) {
            let op = BINARY_OPS[op_index].symbol();
            let left = ErrorKind::from_code(left_code).unwrap();
            let right = ErrorKind::from_code(right_code).unwrap();
            let grid = error_grid();
            let ctx = EvaluationContext::new(&grid);

            let left_text = error_operand(left, left_shape);
            let right_text = error_operand(right, right_shape);

            let formula = format!("={}{}{}", left_text, op, right_text);
            prop_assert_eq!(calculate(&formula, &ctx).unwrap(), Value::Error(left));

            let formula = format!("=\"t\"{}{}", op, right_text);
            prop_assert_eq!(calculate(&formula, &ctx).unwrap(), Value::Error(right));

            let formula = format!("={}{}1", left_text, op);
            prop_assert_eq!(calculate(&formula, &ctx).unwrap(), Value::Error(left));
        }
    }
}
