//! Numeric built-ins. Aggregates accept any mix of scalars and lists, so
//! `sum(getFieldValuesForFieldPathPattern('claims[*].amount'))` and
//! `sum(a, b, c)` both work. Blank values are skipped.

use formwire_core::Value;

use super::{Builtins, CallContext, expect_args, flatten, is_blank, number_arg};
use crate::error::BuiltinError;

pub(super) fn register(b: &mut Builtins) {
    b.add("math", "sum", "Sum of all non-blank values", sum);
    b.add("math", "min", "Smallest non-blank value, or null", min);
    b.add("math", "max", "Largest non-blank value, or null", max);
    b.add("math", "average", "Mean of all non-blank values, or null", average);
    b.add("math", "count", "Number of non-blank values", count);
    b.add("math", "round", "Number rounded to a number of decimals", round);
    b.add("math", "floor", "Largest integer not above a number", floor);
    b.add("math", "ceil", "Smallest integer not below a number", ceil);
    b.add("math", "abs", "Absolute value", abs);
    b.add("math", "number", "A value converted to a number", number);
    b.add("math", "isNumber", "Whether a value converts to a finite number", is_number);
}

/// The non-blank values of `args` as numbers.
fn numbers(name: &str, args: &[Value]) -> Result<Vec<f64>, BuiltinError> {
    let mut out = Vec::new();
    for (i, value) in flatten(args).into_iter().enumerate() {
        if is_blank(value) {
            continue;
        }
        let n = value.to_number();
        if n.is_nan() && !matches!(value, Value::Number(_)) {
            return Err(BuiltinError::invalid_argument(
                name,
                i + 1,
                format!("'{value}' is not a number"),
            ));
        }
        out.push(n);
    }
    Ok(out)
}

fn sum(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    Ok(Value::from(numbers("sum", args)?.into_iter().sum::<f64>()))
}

fn min(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    let values = numbers("min", args)?;
    Ok(values
        .into_iter()
        .reduce(f64::min)
        .map_or(Value::Null, Value::from))
}

fn max(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    let values = numbers("max", args)?;
    Ok(values
        .into_iter()
        .reduce(f64::max)
        .map_or(Value::Null, Value::from))
}

fn average(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    let values = numbers("average", args)?;
    if values.is_empty() {
        return Ok(Value::Null);
    }
    let total: f64 = values.iter().sum();
    Ok(Value::from(total / values.len() as f64))
}

fn count(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    let n = flatten(args).into_iter().filter(|v| !is_blank(v)).count();
    Ok(Value::from(n))
}

fn round(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("round", args, 1, 2)?;
    let n = number_arg("round", args, 0)?;
    let digits = if args.len() > 1 {
        number_arg("round", args, 1)?
    } else {
        0.0
    };
    if !(0.0..=15.0).contains(&digits) || digits.fract() != 0.0 {
        return Err(BuiltinError::invalid_argument(
            "round",
            2,
            "must be a whole number between 0 and 15",
        ));
    }
    let factor = 10f64.powi(digits as i32);
    Ok(Value::from((n * factor).round() / factor))
}

fn floor(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("floor", args, 1, 1)?;
    Ok(Value::from(number_arg("floor", args, 0)?.floor()))
}

fn ceil(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("ceil", args, 1, 1)?;
    Ok(Value::from(number_arg("ceil", args, 0)?.ceil()))
}

fn abs(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("abs", args, 1, 1)?;
    Ok(Value::from(number_arg("abs", args, 0)?.abs()))
}

fn number(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("number", args, 1, 1)?;
    Ok(Value::from(args[0].to_number()))
}

fn is_number(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("isNumber", args, 1, 1)?;
    let value = &args[0];
    Ok(Value::Bool(
        !is_blank(value) && !matches!(value, Value::Bool(_)) && value.to_number().is_finite(),
    ))
}
