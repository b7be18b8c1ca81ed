//! Aggregate functions

use super::{collect_numbers, finite, numbers_only, Args};
use tabula_core::{ErrorKind, Value};

/// SUM function
pub fn fn_sum(args: &Args) -> Value {
    collect_numbers(args)
        .and_then(|numbers| finite(numbers.iter().sum()))
        .into()
}

/// AVERAGE function
pub fn fn_average(args: &Args) -> Value {
    let numbers = match collect_numbers(args) {
        Ok(numbers) => numbers,
        Err(e) => return Value::Error(e),
    };
    if numbers.is_empty() {
        return Value::Error(ErrorKind::DivZero);
    }

    let sum: f64 = numbers.iter().sum();
    finite(sum / numbers.len() as f64).into()
}

/// MIN function - 0 when there are no numbers
pub fn fn_min(args: &Args) -> Value {
    collect_numbers(args)
        .map(|numbers| numbers.into_iter().reduce(f64::min).unwrap_or(0.0))
        .into()
}

/// MAX function - 0 when there are no numbers
pub fn fn_max(args: &Args) -> Value {
    collect_numbers(args)
        .map(|numbers| numbers.into_iter().reduce(f64::max).unwrap_or(0.0))
        .into()
}

/// COUNT function
///
/// Errors are not raised, just not counted.
pub fn fn_count(args: &Args) -> Value {
    let mut count = 0usize;
    for value in args.values() {
        match value {
            Value::Reference(..) | Value::Range(_) => {
                count += numbers_only(&value.flatten()).len();
            }
            Value::Blank | Value::Error(_) => {}
            scalar => {
                if scalar.as_number().is_ok() {
                    count += 1;
                }
            }
        }
    }
    Value::Number(count as f64)
}
