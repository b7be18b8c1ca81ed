//! Tests for formula evaluation with cell references

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use tabula::prelude::*;
use tabula::{Arity, FunctionDef};

fn eval(formula: &str) -> Value {
    let ctx = EvaluationContext::simple();
    calculate(formula, &ctx).unwrap()
}

fn number(formula: &str) -> f64 {
    match eval(formula) {
        Value::Number(n) => n,
        other => panic!("{} evaluated to {:?}", formula, other),
    }
}

fn workbook() -> MemoryGrid {
    let mut grid = MemoryGrid::new();
    grid.set("A1", 10.0).unwrap();
    grid.set("A2", 20.0).unwrap();
    grid.set("A3", 30.0).unwrap();
    grid.set("B1", 5.0).unwrap();
    grid.set("C1", "label").unwrap();
    grid.set("D1", ErrorKind::NotAvailable).unwrap();

    grid.add_sheet("Data").unwrap();
    grid.set_on("Data", "A1", 1.5).unwrap();
    grid.set_on("Data", "A2", 2.5).unwrap();
    grid.add_sheet("My Data").unwrap();
    grid.set_on("My Data", "B2", "quoted").unwrap();

    grid.define_name("Rate", 0.05).unwrap();
    grid
}

/// Test basic formula evaluation without cell references
#[test]
fn test_evaluate_simple_formulas() {
    assert_eq!(eval("=1+2*3"), Value::Number(7.0));
    assert_eq!(eval("=2^3^2"), Value::Number(512.0));
    assert_eq!(eval("=\"Hello \"&\"World\""), Value::text("Hello World"));
    assert_eq!(eval("=5>3"), Value::Boolean(true));
    assert_eq!(eval("=50%"), Value::Number(0.5));
    assert_eq!(eval("=-2^2"), Value::Number(4.0));
}

#[test]
fn test_parse_then_evaluate() {
    let ast = parse_formula("=SUM(1,2,3,4,5)").unwrap();
    let ctx = EvaluationContext::simple();
    assert_eq!(evaluate(&ast, &ctx), Value::Number(15.0));
    // Trees are reusable
    assert_eq!(evaluate(&ast, &ctx), Value::Number(15.0));
}

/// Test formula evaluation with cell references
#[test]
fn test_evaluate_with_cell_references() {
    let grid = workbook();
    let ctx = EvaluationContext::new(&grid);

    assert_eq!(calculate("=A1+A2", &ctx).unwrap(), Value::Number(30.0));
    assert_eq!(calculate("=SUM(A1:A3)", &ctx).unwrap(), Value::Number(60.0));
    assert_eq!(calculate("=A1*B1", &ctx).unwrap(), Value::Number(50.0));
    assert_eq!(calculate("=A1", &ctx).unwrap(), Value::Number(10.0));
    assert_eq!(calculate("=Z99", &ctx).unwrap(), Value::Blank);
    assert_eq!(calculate("=Z99+1", &ctx).unwrap(), Value::Number(1.0));
    assert_eq!(calculate("=C1&\"!\"", &ctx).unwrap(), Value::text("label!"));
    assert_eq!(
        calculate("=D1+1", &ctx).unwrap(),
        Value::Error(ErrorKind::NotAvailable)
    );
}

#[test]
fn test_sheet_references() {
    let grid = workbook();
    let ctx = EvaluationContext::new(&grid);

    assert_eq!(calculate("=Data!A1*2", &ctx).unwrap(), Value::Number(3.0));
    assert_eq!(calculate("=SUM(Data!A1:A2)", &ctx).unwrap(), Value::Number(4.0));
    assert_eq!(calculate("='My Data'!B2", &ctx).unwrap(), Value::text("quoted"));
    assert_eq!(
        calculate("=Missing!A1", &ctx).unwrap(),
        Value::Error(ErrorKind::Ref)
    );

    // Unqualified references follow the current sheet
    let ctx = EvaluationContext::new(&grid).with_sheet("Data");
    assert_eq!(calculate("=A1+A2", &ctx).unwrap(), Value::Number(4.0));
}

#[test]
fn test_named_values() {
    let grid = workbook();
    let ctx = EvaluationContext::new(&grid);

    assert_eq!(calculate("=rate*100", &ctx).unwrap(), Value::Number(5.0));
    assert_eq!(
        calculate("=Unknown+1", &ctx).unwrap(),
        Value::Error(ErrorKind::Name)
    );
}

#[test]
fn test_arity_is_checked_before_domain() {
    // -1 would be a #NUM! cost, but the call is short of arguments
    assert_eq!(eval("=DDB(-1, 10, 5)"), Value::Error(ErrorKind::NotAvailable));
    assert_eq!(eval("=DDB(-1, 10, 5, 1)"), Value::Error(ErrorKind::Num));
    assert_eq!(eval("=NOT(1/0, 2)"), Value::Error(ErrorKind::NotAvailable));
}

#[test]
fn test_left_error_wins() {
    assert_eq!(eval("=(1/0)+NA()"), Value::Error(ErrorKind::DivZero));
    assert_eq!(eval("=NA()+(1/0)"), Value::Error(ErrorKind::NotAvailable));
    assert_eq!(eval("=NA()&\"x\""), Value::Error(ErrorKind::NotAvailable));
    assert_eq!(eval("=#REF!=#REF!"), Value::Error(ErrorKind::Ref));
    assert_eq!(eval("={#N/A}+#REF!"), Value::Error(ErrorKind::NotAvailable));

    let grid = workbook();
    let ctx = EvaluationContext::new(&grid);
    assert_eq!(
        calculate("=D1:D1+#REF!", &ctx).unwrap(),
        Value::Error(ErrorKind::NotAvailable)
    );
}

#[test]
fn test_long_sums_and_deep_nesting() {
    let sum = format!("={}", vec!["A1"; 500].join("+"));
    let grid = workbook();
    let ctx = EvaluationContext::new(&grid);
    assert_eq!(calculate(&sum, &ctx).unwrap(), Value::Number(5000.0));

    let nested = format!("={}1{}", "(".repeat(500), ")".repeat(500));
    assert!(matches!(
        calculate(&nested, &ctx),
        Err(FormulaError::NestingTooDeep { .. })
    ));

    let tower = format!("={}", vec!["2"; 2_000].join("^"));
    assert!(calculate(&tower, &ctx).is_err());
}

#[test]
fn test_financial_properties() {
    assert_eq!(number("=DDB(100, 100, 5, 3)"), 0.0);
    assert_eq!(number("=PMT(0, 10, 1000)"), -100.0);

    let rate = 0.05f64;
    let expected = -(1000.0 * rate / (1.0 - (1.0 + rate).powf(-10.0)));
    assert!((number("=PMT(5%, 10, 1000)") - expected).abs() < 1e-9);

    let payment = number("=PMT(0.005, 36, 5000)");
    assert!((number("=CUMPRINC(0.005, 36, 5000, 1, 36, 0)") + 5000.0).abs() < 1e-6);
    assert!(
        (number("=CUMIPMT(0.005, 36, 5000, 1, 36, 0)") + (36.0 * payment.abs() - 5000.0)).abs()
            < 1e-6
    );

    let first_year = number("=DB(1000, 100, 4, 1)");
    let half_year = number("=DB(1000, 100, 4, 1, 6)");
    assert!((first_year - 2.0 * half_year).abs() < 1e-9);
}

#[test]
fn test_iferror_and_error_codes() {
    assert_eq!(eval("=IFERROR(NA(), 5)"), Value::Number(5.0));
    assert_eq!(eval("=IFERROR(5, 99)"), Value::Number(5.0));

    for kind in ErrorKind::ALL {
        let code = number(&format!("=ERROR.TYPE({})", kind));
        assert_eq!(ErrorKind::from_code(code as u8), Some(kind));
    }
}

#[test]
fn test_parse_errors_are_reported() {
    let ctx = EvaluationContext::simple();
    assert!(matches!(
        calculate("=1+", &ctx),
        Err(FormulaError::UnexpectedEnd { .. })
    ));
    assert!(matches!(
        calculate("=(1+2", &ctx),
        Err(FormulaError::Unbalanced { open: '(', .. })
    ));
    assert!(matches!(
        calculate("={1,2;3}", &ctx),
        Err(FormulaError::RaggedArray)
    ));
}

fn double(args: &tabula::Args<'_>) -> Value {
    args.number(0).map(|n| n * 2.0).into()
}

#[test]
fn test_custom_registry() {
    let mut registry = FunctionRegistry::new();
    registry
        .register(FunctionDef {
            name: "DOUBLE",
            arity: Arity::Exact(1),
            implementation: double,
            volatile: false,
        })
        .unwrap();

    let grid = workbook();
    let ctx = EvaluationContext::new(&grid).with_registry(&registry);
    assert_eq!(calculate("=double(A1)+PMT(0,10,1000)", &ctx).unwrap(), Value::Number(-80.0));

    // The global registry is untouched
    assert_eq!(eval("=DOUBLE(1)"), Value::Error(ErrorKind::Name));
}

#[test]
fn test_injected_clock() {
    let clock = FixedClock::at(2024, 1, 15, 12, 0, 0).unwrap();
    let ctx = EvaluationContext::simple().with_clock(&clock);
    assert_eq!(calculate("=TODAY()", &ctx).unwrap(), Value::Number(45306.0));
    assert_eq!(calculate("=NOW()", &ctx).unwrap(), Value::Number(45306.0));
    assert_eq!(
        calculate("=YEARFRAC(DATEVALUE(\"2023-01-15\"), TODAY(), 1)", &ctx).unwrap(),
        Value::Number(1.0)
    );
}

proptest! {
    #[test]
    fn arithmetic_matches_native(a in -1000i32..1000, b in -1000i32..1000, c in -1000i32..1000) {
        let formula = format!("={}+{}*{}", a, b, c);
        let expected = f64::from(a) + f64::from(b) * f64::from(c);
        prop_assert_eq!(eval(&formula), Value::Number(expected));
    }

    #[test]
    fn ddb_is_zero_when_salvage_covers_cost(
        cost in 0u32..10_000,
        extra in 0u32..1_000,
        life in 1u32..40,
        period_seed in 0u32..40,
    ) {
        let period = period_seed % (life + 1);
        let salvage = cost + extra;
        let formula = format!("=DDB({}, {}, {}, {})", cost, salvage, life, period);
        prop_assert_eq!(eval(&formula), Value::Number(0.0));
    }
}
