//! Financial functions
//!
//! Depreciation, annuity and accrued-interest calculations. Domain violations are
//! `#NUM!` and are logged at debug level with the offending parameter.

use super::date::{as_date_serial, yearfrac};
use super::{finite, Args};
use tabula_core::{ErrorKind, Value};

/// Spreadsheet `ROUND` half-up on the binary value (`Math.round` semantics)
fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// Periodic payment of an annuity, as a negative outflow
///
/// `due_at_start` discounts the payment by one extra period.
pub fn pmt(rate: f64, periods: f64, present_value: f64, future_value: f64, due_at_start: bool) -> f64 {
    let result = if rate == 0.0 {
        (present_value + future_value) / periods
    } else {
        let term = (1.0 + rate).powf(periods);
        let payment =
            future_value * rate / (term - 1.0) + present_value * rate / (1.0 - 1.0 / term);
        if due_at_start {
            payment / (1.0 + rate)
        } else {
            payment
        }
    };
    -result
}

/// Negated balance after `periods` payments of `payment` on `value`
fn future_value(rate: f64, periods: f64, payment: f64, value: f64, due_at_start: bool) -> f64 {
    let result = if rate == 0.0 {
        value + payment * periods
    } else {
        let term = (1.0 + rate).powf(periods);
        if due_at_start {
            value * term + payment * (1.0 + rate) * (term - 1.0) / rate
        } else {
            value * term + payment * (term - 1.0) / rate
        }
    };
    -result
}

/// DDB(cost, salvage, life, period, [factor])
pub fn fn_ddb(args: &Args) -> Value {
    ddb(args).into()
}

fn ddb(args: &Args) -> Result<f64, ErrorKind> {
    let cost = args.number(0)?;
    let salvage = args.number(1)?;
    let life = args.number(2)?;
    let period = args.number(3)?;
    let factor = args.number_or(4, 2.0)?;

    for (index, value) in [(0, cost), (1, salvage), (2, life), (3, period)] {
        if value < 0.0 {
            return Err(args.num_error(
                index,
                format_args!("value is {}. It should be greater than or equal to 0.", value),
            ));
        }
    }
    if period > life {
        return Err(args.num_error(
            3,
            format_args!(
                "value is {}. It should be less than or equal to parameter 3 ({}).",
                period, life
            ),
        ));
    }
    if salvage >= cost {
        return Ok(0.0);
    }

    let mut total = 0.0;
    let mut current = 0.0;
    let mut i = 1.0;
    while i <= period {
        if life == 0.0 {
            return Err(ErrorKind::DivZero);
        }
        current = ((cost - total) * (factor / life)).min(cost - salvage - total);
        total += current;
        i += 1.0;
    }
    finite(current)
}

/// DB(cost, salvage, life, period, [month])
pub fn fn_db(args: &Args) -> Value {
    db(args).into()
}

fn db(args: &Args) -> Result<f64, ErrorKind> {
    let cost = args.number(0)?;
    let salvage = args.number(1)?;
    let life = args.number(2)?;
    let period = args.number(3)?;
    let month = args.number_or(4, 12.0)?.floor();

    for (index, value) in [(0, cost), (1, salvage), (2, life), (3, period)] {
        if value < 0.0 {
            return Err(args.num_error(
                index,
                format_args!("value is {}. It should be greater than or equal to 0.", value),
            ));
        }
    }
    if !(1.0..=12.0).contains(&month) {
        return Err(args.num_error(
            4,
            format_args!("value is {}. Valid values are between 1 and 12 inclusive.", month),
        ));
    }
    if period > life {
        return Err(args.num_error(
            3,
            format_args!(
                "value is {}. It should be less than or equal to parameter 3 ({}).",
                period, life
            ),
        ));
    }
    if salvage >= cost {
        return Ok(0.0);
    }
    if cost == 0.0 && salvage != 0.0 {
        return Err(ErrorKind::DivZero);
    }

    let rate = 1.0 - (salvage / cost).powf(1.0 / life);
    let initial = cost * rate * month / 12.0;
    let mut total = initial;
    let mut current = 0.0;
    let ceiling = if period == life { life - 1.0 } else { period };
    let mut i = 2.0;
    while i <= ceiling {
        current = (cost - total) * rate;
        total += current;
        i += 1.0;
    }

    // The last period is taken from the remaining balance, not the loop increment
    let result = if period == 1.0 {
        initial
    } else if period == life {
        (cost - total) * rate
    } else {
        current
    };
    finite(result)
}

/// DOLLAR(number, [places]) - truncates to `places` decimals
pub fn fn_dollar(args: &Args) -> Value {
    dollar(args).into()
}

fn dollar(args: &Args) -> Result<f64, ErrorKind> {
    let v = args.number(0)?;
    let places = args.number_or(1, 2.0)?;

    let sign = if v > 0.0 { 1.0 } else { -1.0 };
    let pow = 10f64.powf(places);
    let divisor = sign * (v.abs() * pow).floor();
    if pow == 0.0 && divisor != 0.0 {
        return Err(ErrorKind::DivZero);
    }
    finite(divisor / pow)
}

/// DOLLARDE(fractional_price, unit)
pub fn fn_dollarde(args: &Args) -> Value {
    dollarde(args).into()
}

fn dollarde(args: &Args) -> Result<f64, ErrorKind> {
    let dollar = args.number(0)?;
    let fraction = args.number(1)?.floor();
    if fraction == 0.0 {
        log::debug!("Function DOLLARDE parameter 2 cannot be zero");
        return Err(ErrorKind::DivZero);
    }

    let mut result = dollar.trunc();
    result += (dollar % 1.0) * 10f64.powf(fraction.log10().ceil()) / fraction;
    let power = 10f64.powf(fraction.log2().ceil() + 1.0);
    if power == 0.0 {
        return Err(ErrorKind::DivZero);
    }
    finite(round_half_up(result * power) / power)
}

/// DOLLARFR(decimal_price, unit)
pub fn fn_dollarfr(args: &Args) -> Value {
    dollarfr(args).into()
}

fn dollarfr(args: &Args) -> Result<f64, ErrorKind> {
    let price = args.number(0)?;
    let unit = args.number(1)?.floor();
    if unit == 0.0 {
        log::debug!("Function DOLLARFR parameter 2 cannot be zero");
        return Err(ErrorKind::DivZero);
    }

    let result = price.trunc() + (price % 1.0) * 10f64.powf(-unit.log10().ceil()) * unit;
    finite(result)
}

/// EFFECT(nominal_rate, periods_per_year)
pub fn fn_effect(args: &Args) -> Value {
    effect(args).into()
}

fn effect(args: &Args) -> Result<f64, ErrorKind> {
    let rate = args.number(0)?;
    let periods = args.number(1)?;
    if rate <= 0.0 {
        return Err(args.num_error(0, format_args!("value is {}. It should be greater than 0.", rate)));
    }
    if periods < 1.0 {
        return Err(args.num_error(
            1,
            format_args!("value is {}. It should be greater than or equal to 1.", periods),
        ));
    }

    let periods = periods.floor();
    finite((1.0 + rate / periods).powf(periods) - 1.0)
}

/// PMT(rate, periods, present_value, [future_value], [end_or_beginning])
pub fn fn_pmt(args: &Args) -> Value {
    payment(args).into()
}

fn payment(args: &Args) -> Result<f64, ErrorKind> {
    let rate = args.number(0)?;
    let periods = args.number(1)?;
    let present_value = args.number(2)?;
    let future_value = args.number_or(3, 0.0)?;
    let due_at_start = args.number_or(4, 0.0)? != 0.0;

    finite(pmt(rate, periods, present_value, future_value, due_at_start))
}

/// Shared argument handling of CUMPRINC and CUMIPMT
struct CumulativeArgs {
    rate: f64,
    periods: f64,
    value: f64,
    start: f64,
    end: f64,
    due_at_start: bool,
}

impl CumulativeArgs {
    fn read(args: &Args) -> Result<Self, ErrorKind> {
        let rate = args.number(0)?;
        let periods = args.number(1)?;
        let value = args.number(2)?;
        let start = args.number(3)?;
        if start < 1.0 {
            return Err(args.num_error(
                3,
                format_args!("value is {}. It should be greater than or equal to 1.", start),
            ));
        }
        let end = args.number(4)?;
        if end < 1.0 {
            return Err(args.num_error(
                4,
                format_args!("value is {}. It should be greater than or equal to 1.", end),
            ));
        }
        if end < start {
            return Err(args.num_error(
                4,
                format_args!("value is {}. It should be greater than or equal to {}.", end, start),
            ));
        }
        let due_at_start = args.boolean(5)?;

        Ok(Self {
            rate,
            periods,
            value,
            start,
            end,
            due_at_start,
        })
    }

    fn payment(&self) -> f64 {
        pmt(self.rate, self.periods, self.value, 0.0, self.due_at_start)
    }

    /// Negated balance entering period `i`
    fn balance_before(&self, i: f64, payment: f64) -> f64 {
        if self.due_at_start {
            future_value(self.rate, i - 2.0, payment, self.value, true) - payment
        } else {
            future_value(self.rate, i - 1.0, payment, self.value, false)
        }
    }
}

/// CUMPRINC(rate, periods, present_value, first_period, last_period, end_or_beginning)
pub fn fn_cumprinc(args: &Args) -> Value {
    cumprinc(args).into()
}

fn cumprinc(args: &Args) -> Result<f64, ErrorKind> {
    let cum = CumulativeArgs::read(args)?;
    let payment = cum.payment();

    let mut principal = 0.0;
    let mut start = cum.start;
    if start == 1.0 {
        principal = if cum.due_at_start {
            payment
        } else {
            payment + cum.value * cum.rate
        };
        start += 1.0;
    }

    let mut i = start;
    while i <= cum.end {
        principal += payment - cum.balance_before(i, payment) * cum.rate;
        i += 1.0;
    }
    finite(principal)
}

/// CUMIPMT(rate, periods, present_value, first_period, last_period, end_or_beginning)
pub fn fn_cumipmt(args: &Args) -> Value {
    cumipmt(args).into()
}

fn cumipmt(args: &Args) -> Result<f64, ErrorKind> {
    let cum = CumulativeArgs::read(args)?;
    let payment = cum.payment();

    let mut interest = 0.0;
    let mut start = cum.start;
    if start == 1.0 {
        // Nothing accrues before a payment due at the start of period 1
        if !cum.due_at_start {
            interest = -cum.value;
        }
        start += 1.0;
    }

    let mut i = start;
    while i <= cum.end {
        interest += cum.balance_before(i, payment);
        i += 1.0;
    }
    finite(interest * cum.rate)
}

/// ACCRINT(issue, first_interest, settlement, rate, par, frequency, [basis])
///
/// Interest accrues from issue to settlement over `YEARFRAC`; `frequency` is validated
/// as a number but does not enter the result.
pub fn fn_accrint(args: &Args) -> Value {
    accrint(args).into()
}

fn accrint(args: &Args) -> Result<f64, ErrorKind> {
    let issue = as_date_serial(args.value(0))?;
    let first_interest = as_date_serial(args.value(1))?;
    if first_interest < 0.0 {
        return Err(args.num_error(
            1,
            format_args!("value is {}. It should be greater than 0.", first_interest),
        ));
    }
    let settlement = as_date_serial(args.value(2))?;
    if issue > settlement {
        return Err(args.num_error(
            0,
            format_args!(
                "({}) should be on or before parameter 3 ({}).",
                issue, settlement
            ),
        ));
    }
    let rate = args.number(3)?;
    let par = args.number(4)?;
    let _frequency = args.number(5)?;
    let basis = args.number_or(6, 1.0)?;

    let factor = yearfrac(issue, settlement, basis.trunc() as i32)?;
    finite(par * rate * factor)
}

#[cfg(test)]
mod tests {
    use crate::evaluator::{calculate, EvaluationContext};
    use pretty_assertions::assert_eq;
    use tabula_core::{ErrorKind, Value};

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

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {} got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_ddb() {
        assert_eq!(number("=DDB(100, 10, 5, 1)"), 40.0);
        assert_eq!(number("=DDB(100, 10, 5, 2)"), 24.0);
        assert_eq!(number("=DDB(100, 10, 5, 1, 1)"), 20.0);
        // Never depreciates below salvage
        assert_eq!(number("=DDB(100, 80, 5, 2)"), 0.0);
        assert_close(number("=DDB(100, 60, 5, 2)"), 0.0, 1e-12);
    }

    #[test]
    fn test_ddb_salvage_at_or_above_cost_is_zero() {
        for period in 0..=5 {
            assert_eq!(number(&format!("=DDB(100, 100, 5, {})", period)), 0.0);
            assert_eq!(number(&format!("=DDB(100, 150, 5, {})", period)), 0.0);
        }
    }

    #[test]
    fn test_ddb_errors() {
        assert_eq!(eval("=DDB(-1, 10, 5, 1)"), Value::Error(ErrorKind::Num));
        assert_eq!(eval("=DDB(100, -1, 5, 1)"), Value::Error(ErrorKind::Num));
        assert_eq!(eval("=DDB(100, 10, -5, 1)"), Value::Error(ErrorKind::Num));
        assert_eq!(eval("=DDB(100, 10, 5, -1)"), Value::Error(ErrorKind::Num));
        assert_eq!(eval("=DDB(100, 10, 5, 6)"), Value::Error(ErrorKind::Num));
        assert_eq!(eval("=DDB(\"x\", 10, 5, 6)"), Value::Error(ErrorKind::Value));
        assert_eq!(eval("=DDB(100, 10, 5)"), Value::Error(ErrorKind::NotAvailable));
    }

    #[test]
    fn test_db_first_year() {
        let rate = 1.0 - (10.0f64 / 100.0).powf(1.0 / 5.0);
        assert_close(number("=DB(100, 10, 5, 1)"), 100.0 * rate * 12.0 / 12.0, 1e-12);
        assert_close(number("=DB(100, 10, 5, 1, 6)"), 100.0 * rate * 6.0 / 12.0, 1e-12);
        assert_close(
            number("=DB(100, 10, 5, 1, 6)") * 2.0,
            number("=DB(100, 10, 5, 1)"),
            1e-12,
        );
    }

    #[test]
    fn test_db_later_periods() {
        let rate = 1.0 - (10.0f64 / 100.0).powf(1.0 / 5.0);
        let mut total = 100.0 * rate;
        let second = (100.0 - total) * rate;
        assert_close(number("=DB(100, 10, 5, 2)"), second, 1e-12);

        total += second;
        for _ in 3..5 {
            total += (100.0 - total) * rate;
        }
        assert_close(number("=DB(100, 10, 5, 5)"), (100.0 - total) * rate, 1e-12);

        // life == 1: the first-period rule wins
        assert_close(number("=DB(100, 10, 1, 1, 6)"), 100.0 * 0.9 * 0.5, 1e-12);
    }

    #[test]
    fn test_db_errors() {
        assert_eq!(eval("=DB(100, 10, 5, 1, 13)"), Value::Error(ErrorKind::Num));
        assert_eq!(eval("=DB(100, 10, 5, 1, 0)"), Value::Error(ErrorKind::Num));
        assert_eq!(eval("=DB(100, 10, 5, 6)"), Value::Error(ErrorKind::Num));
        assert_eq!(eval("=DB(-100, 10, 5, 1)"), Value::Error(ErrorKind::Num));
        assert_eq!(eval("=DB(100, 100, 5, 1)"), Value::Number(0.0));
        // month is floored before validation
        assert_close(number("=DB(100, 10, 5, 1, 12.9)"), number("=DB(100, 10, 5, 1)"), 1e-12);
    }

    #[test]
    fn test_pmt() {
        assert_eq!(number("=PMT(0, 10, 1000)"), -100.0);
        assert_eq!(number("=PMT(0, 10, 1000, 1000)"), -200.0);

        let term = 1.05f64.powf(10.0);
        let expected = -(1000.0 * 0.05 / (1.0 - 1.0 / term));
        assert_close(number("=PMT(0.05, 10, 1000)"), expected, 1e-9);
        assert_close(number("=PMT(0.05, 10, 1000, 0, 1)"), expected / 1.05, 1e-9);
        assert_close(number("=PMT(0.05, 10, 1000, 0, TRUE)"), expected / 1.05, 1e-9);
    }

    #[test]
    fn test_pmt_errors() {
        assert_eq!(eval("=PMT(0, 0, 1000)"), Value::Error(ErrorKind::Num));
        assert_eq!(eval("=PMT(#REF!, 0, 1000)"), Value::Error(ErrorKind::Ref));
        assert_eq!(eval("=PMT(0.1, 10)"), Value::Error(ErrorKind::NotAvailable));
        assert_eq!(eval("=PMT(0.1, 10, 1, 2, 3, 4)"), Value::Error(ErrorKind::NotAvailable));
    }

    #[test]
    fn test_cumulative_totals() {
        let payment = number("=PMT(0.01, 12, 1000)");
        let principal = number("=CUMPRINC(0.01, 12, 1000, 1, 12, 0)");
        let interest = number("=CUMIPMT(0.01, 12, 1000, 1, 12, 0)");

        assert_close(principal, -1000.0, 1e-6);
        assert_close(interest, -(12.0 * payment.abs() - 1000.0), 1e-6);
        assert_close(principal + interest, 12.0 * payment, 1e-6);
    }

    #[test]
    fn test_cumulative_due_at_start() {
        let payment = number("=PMT(0.01, 12, 1000, 0, 1)");
        let principal = number("=CUMPRINC(0.01, 12, 1000, 1, 12, 1)");
        let interest = number("=CUMIPMT(0.01, 12, 1000, 1, 12, 1)");

        assert_close(principal + interest, 12.0 * payment, 1e-6);
        // The first payment is all principal
        assert_close(number("=CUMPRINC(0.01, 12, 1000, 1, 1, 1)"), payment, 1e-12);
        assert_eq!(number("=CUMIPMT(0.01, 12, 1000, 1, 1, 1)"), 0.0);
    }

    #[test]
    fn test_cumulative_sub_range() {
        let whole = number("=CUMPRINC(0.01, 12, 1000, 1, 12, 0)");
        let parts = number("=CUMPRINC(0.01, 12, 1000, 1, 6, 0)")
            + number("=CUMPRINC(0.01, 12, 1000, 7, 12, 0)");
        assert_close(whole, parts, 1e-9);

        let whole = number("=CUMIPMT(0.01, 12, 1000, 1, 12, 0)");
        let parts = number("=CUMIPMT(0.01, 12, 1000, 1, 3, 0)")
            + number("=CUMIPMT(0.01, 12, 1000, 4, 12, 0)");
        assert_close(whole, parts, 1e-9);
    }

    #[test]
    fn test_cumulative_errors() {
        for name in ["CUMPRINC", "CUMIPMT"] {
            let num = Value::Error(ErrorKind::Num);
            assert_eq!(eval(&format!("={}(0.01, 12, 1000, 0, 12, 0)", name)), num);
            assert_eq!(eval(&format!("={}(0.01, 12, 1000, 1, 0, 0)", name)), num);
            assert_eq!(eval(&format!("={}(0.01, 12, 1000, 5, 4, 0)", name)), num);
            // first < 1 is reported before a bad type argument
            assert_eq!(eval(&format!("={}(0.01, 12, 1000, 0, 4, \"x\")", name)), num);
            assert_eq!(
                eval(&format!("={}(0.01, 12, 1000, 1, 4, \"x\")", name)),
                Value::Error(ErrorKind::Value)
            );
            // Arity before domain
            assert_eq!(
                eval(&format!("={}(-1, 12, 1000, 0, 12)", name)),
                Value::Error(ErrorKind::NotAvailable)
            );
        }
    }

    #[test]
    fn test_accrint() {
        assert_close(
            number("=ACCRINT(\"2000-01-01\", \"2000-03-01\", \"2000-07-01\", 0.1, 1000, 2, 0)"),
            50.0,
            1e-9,
        );
        // Default basis is actual/actual
        assert_close(
            number("=ACCRINT(\"2000-01-01\", \"2000-03-01\", \"2000-07-01\", 0.1, 1000, 2)"),
            100.0 * 182.0 / 366.0,
            1e-9,
        );
        // frequency does not change the result
        assert_eq!(
            number("=ACCRINT(36526, 36586, 36708, 0.1, 1000, 1, 2)"),
            number("=ACCRINT(36526, 36586, 36708, 0.1, 1000, 4, 2)")
        );
    }

    #[test]
    fn test_accrint_errors() {
        assert_eq!(
            eval("=ACCRINT(36708, 36586, 36526, 0.1, 1000, 2)"),
            Value::Error(ErrorKind::Num)
        );
        assert_eq!(
            eval("=ACCRINT(36526, -1, 36708, 0.1, 1000, 2)"),
            Value::Error(ErrorKind::Num)
        );
        assert_eq!(
            eval("=ACCRINT(36526, 36586, 36708, 0.1, 1000, 2, 5)"),
            Value::Error(ErrorKind::Num)
        );
        assert_eq!(
            eval("=ACCRINT(36526, 36586, 36708, 0.1, 1000, \"x\")"),
            Value::Error(ErrorKind::Value)
        );
        assert_eq!(
            eval("=ACCRINT(\"not a date\", 36586, 36708, 0.1, 1000, 2)"),
            Value::Error(ErrorKind::Value)
        );
    }

    #[test]
    fn test_dollar_family() {
        assert_eq!(number("=DOLLAR(1.2351)"), 1.23);
        assert_eq!(number("=DOLLAR(-1.2351, 1)"), -1.2);
        assert_eq!(number("=DOLLARDE(1.02, 16)"), 1.125);
        assert_close(number("=DOLLARFR(1.125, 16)"), 1.02, 1e-12);
        assert_eq!(eval("=DOLLARDE(1.02, 0)"), Value::Error(ErrorKind::DivZero));
        assert_eq!(eval("=DOLLARFR(1.02, 0.5)"), Value::Error(ErrorKind::DivZero));
    }

    #[test]
    fn test_effect() {
        assert_close(number("=EFFECT(0.05, 4)"), 1.0125f64.powi(4) - 1.0, 1e-12);
        assert_close(number("=EFFECT(0.05, 4.9)"), number("=EFFECT(0.05, 4)"), 1e-12);
        assert_eq!(eval("=EFFECT(0, 4)"), Value::Error(ErrorKind::Num));
        assert_eq!(eval("=EFFECT(0.05, 0.5)"), Value::Error(ErrorKind::Num));
    }
}
