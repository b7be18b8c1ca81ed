//! Information functions
//!
//! The `IS*` predicates classify the first value of their argument without raising,
//! so `ISTEXT(NA())` is FALSE rather than `#N/A`.

use super::Args;
use crate::ast::FormulaExpr;
use lazy_regex::{regex_captures, regex_is_match};
use tabula_core::{CellId, ErrorKind, Value};

fn first<'a>(args: &Args<'a>) -> Option<&'a Value> {
    args.value(0).peek_first()
}

/// NA()
pub fn fn_na(_args: &Args) -> Value {
    Value::Error(ErrorKind::NotAvailable)
}

/// ISTEXT(value)
pub fn fn_istext(args: &Args) -> Value {
    Value::Boolean(matches!(first(args), Some(Value::Text(_))))
}

/// ISNONTEXT(value)
pub fn fn_isnontext(args: &Args) -> Value {
    Value::Boolean(!matches!(first(args), Some(Value::Text(_))))
}

/// ISLOGICAL(value)
pub fn fn_islogical(args: &Args) -> Value {
    Value::Boolean(matches!(first(args), Some(Value::Boolean(_))))
}

/// ISNUMBER(value)
pub fn fn_isnumber(args: &Args) -> Value {
    Value::Boolean(matches!(first(args), Some(Value::Number(_))))
}

/// ISBLANK(value)
pub fn fn_isblank(args: &Args) -> Value {
    Value::Boolean(matches!(first(args), Some(Value::Blank)))
}

/// ISERROR(value)
pub fn fn_iserror(args: &Args) -> Value {
    Value::Boolean(matches!(first(args), Some(Value::Error(_))))
}

/// ISERR(value) - any error except `#N/A`
pub fn fn_iserr(args: &Args) -> Value {
    Value::Boolean(matches!(
        first(args),
        Some(Value::Error(e)) if *e != ErrorKind::NotAvailable
    ))
}

/// ISNA(value)
pub fn fn_isna(args: &Args) -> Value {
    Value::Boolean(matches!(
        first(args),
        Some(Value::Error(ErrorKind::NotAvailable))
    ))
}

/// ISREF(value)
pub fn fn_isref(args: &Args) -> Value {
    let written_as_reference = matches!(
        args.expr(0),
        Some(FormulaExpr::CellRef(_) | FormulaExpr::RangeRef(_))
    );
    Value::Boolean(written_as_reference || matches!(args.value(0), Value::Reference(..)))
}

/// ISEMAIL(value)
pub fn fn_isemail(args: &Args) -> Value {
    let text = match first(args) {
        Some(Value::Text(s)) => s,
        _ => return Value::Boolean(false),
    };
    Value::Boolean(regex_is_match!(
        r"[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+(?:[A-Z]{2}|com|org|net|gov|mil|edu|int|biz|info|mobi|name|aero|jobs|museum|ac|ad|ae|af|ag|ai|al|am|an|ao|aq|ar|as|at|au|aw|ax|az|ba|bb|bd|be|bf|bg|bh|bi|bj|bl|bm|bn|bo|bq|br|bs|bt|bv|bw|by|bz|ca|cc|cd|cf|cg|ch|ci|ck|cl|cm|cn|co|cr|cu|cv|cw|cx|cy|cz|de|dj|dk|dm|do|dz|ec|ee|eg|eh|er|es|et|eu|fi|fj|fk|fm|fo|fr|ga|gb|gd|ge|gf|gg|gh|gi|gl|gm|gn|gp|gq|gr|gs|gt|gu|gw|gy|hk|hm|hn|hr|ht|hu|id|ie|il|im|in|io|iq|ir|is|it|je|jm|jo|jp|ke|kg|kh|ki|km|kn|kp|kr|kw|ky|kz|la|lb|lc|li|lk|lr|ls|lt|lu|lv|ly|ma|mc|md|me|mf|mg|mh|mk|ml|mm|mn|mo|mp|mq|mr|ms|mt|mu|mv|mw|mx|my|mz|na|nc|ne|nf|ng|ni|nl|no|np|nr|nu|nz|om|pa|pe|pf|pg|ph|pk|pl|pm|pn|pr|ps|pt|pw|py|qa|re|ro|rs|ru|rw|sa|sb|sc|sd|se|sg|sh|si|sj|sk|sl|sm|sn|so|sr|ss|st|su|sv|sx|sy|sz|tc|td|tf|tg|th|tj|tk|tl|tm|tn|to|tp|tr|tt|tv|tw|tz|ua|ug|uk|um|us|uy|uz|va|vc|ve|vg|vi|vn|vu|wf|ws|ye|yt|za|zm|zw)\b",
        text
    ))
}

/// ISURL(value)
pub fn fn_isurl(args: &Args) -> Value {
    match args.text(0) {
        Ok(text) => Value::Boolean(is_url(&text)),
        Err(e) => Value::Error(e),
    }
}

/// URL syntax check: allowed characters, well-formed percent escapes, and a path that
/// fits the presence or absence of an authority
fn is_url(text: &str) -> bool {
    if regex_is_match!(r"[^a-z0-9:/?#\[\]@!$&'()*+,;=.\-_~%]"i, text) {
        return false;
    }
    if regex_is_match!(r"%[^0-9a-f]"i, text) {
        return false;
    }
    if regex_is_match!(r"%[0-9a-f](:?[^0-9a-f]|$)"i, text) {
        return false;
    }

    let Some((_, _scheme, authority, path)) =
        regex_captures!(r"^(?:([^:/?#]+):)?(?://([^/?#]*))?([^?#]*)", text)
    else {
        return false;
    };
    if authority.is_empty() {
        !path.starts_with("//")
    } else {
        path.is_empty() || path.starts_with('/')
    }
}

/// N(value)
pub fn fn_n(args: &Args) -> Value {
    args.number(0).into()
}

/// TYPE(value) - 1 number, 2 text, 4 boolean, 16 error, 64 range
pub fn fn_type(args: &Args) -> Value {
    let code = match args.value(0).resolved() {
        Value::Number(_) | Value::Blank => 1.0,
        Value::Text(_) => 2.0,
        Value::Boolean(_) => 4.0,
        Value::Error(_) => 16.0,
        Value::Range(_) | Value::Reference(..) => 64.0,
    };
    Value::Number(code)
}

/// ERROR.TYPE(error_value)
pub fn fn_error_type(args: &Args) -> Value {
    match first(args) {
        Some(Value::Error(e)) => Value::Number(f64::from(e.code())),
        _ => Value::Error(ErrorKind::NotAvailable),
    }
}

/// Position named by the argument of `ROW`/`COLUMN`, or the formula's own cell
fn referenced_cell(args: &Args) -> Result<CellId, ErrorKind> {
    if args.is_empty() {
        return Ok(args.ctx().current_cell);
    }
    match args.expr(0) {
        Some(FormulaExpr::CellRef(r)) => Ok(r.address.id()),
        Some(FormulaExpr::RangeRef(r)) => Ok(r.range.start.id()),
        _ => match args.value(0) {
            Value::Reference(id, _) => Ok(*id),
            Value::Error(e) => Err(*e),
            _ => Err(ErrorKind::Value),
        },
    }
}

/// COLUMN([reference])
pub fn fn_column(args: &Args) -> Value {
    referenced_cell(args)
        .map(|id| f64::from(id.col) + 1.0)
        .into()
}

/// ROW([reference])
pub fn fn_row(args: &Args) -> Value {
    referenced_cell(args)
        .map(|id| f64::from(id.row) + 1.0)
        .into()
}
