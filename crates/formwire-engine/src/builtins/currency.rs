use formwire_core::Value;

use super::{Builtins, CallContext, expect_args, is_blank, number_arg, text_arg};
use crate::error::BuiltinError;

pub(super) fn register(b: &mut Builtins) {
    b.add("currency", "formatCurrency", "Amount formatted in a currency (default: the active one)", format_currency);
    b.add("currency", "currencyCode", "The active ISO currency code", currency_code);
    b.add("currency", "currencySymbol", "Symbol of a currency (default: the active one)", currency_symbol);
}

fn code_arg(ctx: &CallContext<'_>, args: &[Value], pos: usize) -> String {
    match args.get(pos) {
        Some(value) if !is_blank(value) => text_arg(args, pos).trim().to_uppercase(),
        _ => ctx.state.currency_code(),
    }
}

fn format_currency(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("formatCurrency", args, 1, 2)?;
    if is_blank(&args[0]) {
        return Ok(Value::Text(String::new()));
    }
    let amount = number_arg("formatCurrency", args, 0)?;
    let code = code_arg(ctx, args, 1);
    Ok(Value::Text(ctx.currency.format(amount, &code)))
}

fn currency_code(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("currencyCode", args, 0, 0)?;
    Ok(Value::Text(ctx.state.currency_code()))
}

fn currency_symbol(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("currencySymbol", args, 0, 1)?;
    let code = code_arg(ctx, args, 0);
    Ok(Value::Text(ctx.currency.symbol(&code)))
}

#[cfg(test)]
mod tests {
    use super::super::testing::Harness;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn formats_in_the_active_currency() {
        let h = Harness::new();
        assert_eq!(
            h.call("formatCurrency", vec![1500.into()]).unwrap(),
            Value::from("1,500.00 €")
        );
        h.state.set_currency_code("USD");
        assert_eq!(h.call("currencyCode", vec![]).unwrap(), Value::from("USD"));
        assert_eq!(h.call("currencySymbol", vec![]).unwrap(), Value::from("$"));
    }

    #[test]
    fn explicit_code_wins() {
        let h = Harness::new();
        assert_eq!(
            h.call("formatCurrency", vec!["12.5".into(), "gbp".into()]).unwrap(),
            Value::from("12.50 £")
        );
        assert_eq!(
            h.call("formatCurrency", vec![Value::Null]).unwrap(),
            Value::from("")
        );
        assert!(h.call("formatCurrency", vec!["lots".into()]).is_err());
    }
}
