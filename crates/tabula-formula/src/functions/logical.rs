//! Logical functions

use super::Args;
use tabula_core::{ErrorKind, Value};

/// IF(condition, value_if_true, [value_if_false])
pub fn fn_if(args: &Args) -> Value {
    let condition = match args.boolean(0) {
        Ok(b) => b,
        Err(e) => return Value::Error(e),
    };

    if condition {
        args.value(1).clone()
    } else {
        args.get(2).cloned().unwrap_or(Value::Boolean(false))
    }
}

/// Logical values of the arguments of `AND` / `OR`
///
/// Direct arguments are coerced, so `AND("TRUE")` works. Inside references and ranges
/// only numbers and booleans count. Any error wins over the result.
fn logical_values(args: &Args) -> Result<Vec<bool>, ErrorKind> {
    let mut logicals = Vec::new();
    for value in args.values() {
        match value {
            Value::Reference(..) | Value::Range(_) => {
                for cell in value.flatten_checked()? {
                    match cell {
                        Value::Boolean(b) => logicals.push(*b),
                        Value::Number(n) => logicals.push(*n != 0.0),
                        Value::Error(e) => return Err(*e),
                        _ => {}
                    }
                }
            }
            Value::Blank => {}
            scalar => logicals.push(scalar.as_bool()?),
        }
    }

    if logicals.is_empty() {
        return Err(ErrorKind::Value);
    }
    Ok(logicals)
}

/// AND(logical1, [logical2], ...)
pub fn fn_and(args: &Args) -> Value {
    logical_values(args)
        .map(|values| Value::Boolean(values.iter().all(|b| *b)))
        .unwrap_or_else(Value::Error)
}

/// OR(logical1, [logical2], ...)
pub fn fn_or(args: &Args) -> Value {
    logical_values(args)
        .map(|values| Value::Boolean(values.iter().any(|b| *b)))
        .unwrap_or_else(Value::Error)
}

/// NOT(logical)
pub fn fn_not(args: &Args) -> Value {
    match args.boolean(0) {
        Ok(b) => Value::Boolean(!b),
        Err(e) => Value::Error(e),
    }
}

/// IFERROR(value, value_if_error) - Returns value_if_error if value is an error, otherwise returns value
pub fn fn_iferror(args: &Args) -> Value {
    let value = args.value(0);
    if value.is_error() {
        args.value(1).clone()
    } else {
        value.clone()
    }
}

/// IFNA(value, value_if_na) - Returns value_if_na if value is #N/A error, otherwise returns value
/// Similar to IFERROR but only catches #N/A errors
pub fn fn_ifna(args: &Args) -> Value {
    let value = args.value(0);
    match value.error() {
        Some(ErrorKind::NotAvailable) => args.value(1).clone(),
        _ => value.clone(),
    }
}

/// TRUE() - Returns the logical value TRUE
pub fn fn_true(_args: &Args) -> Value {
    Value::Boolean(true)
}

/// FALSE() - Returns the logical value FALSE
pub fn fn_false(_args: &Args) -> Value {
    Value::Boolean(false)
}
