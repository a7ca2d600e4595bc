use formwire_core::Value;

use super::{Builtins, CallContext, expect_args};
use crate::error::BuiltinError;

pub(super) fn register(b: &mut Builtins) {
    b.add("summary", "summaryTable", "Table of labels and values, rendered by the host", summary_table);
}

fn list_arg<'v>(args: &'v [Value], pos: usize) -> Result<&'v [Value], BuiltinError> {
    args[pos]
        .as_list()
        .ok_or_else(|| BuiltinError::invalid_argument("summaryTable", pos + 1, "must be a list"))
}

fn summary_table(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("summaryTable", args, 2, 2)?;
    let labels = list_arg(args, 0)?;
    let values = list_arg(args, 1)?;
    if labels.len() != values.len() {
        return Err(BuiltinError::failed(
            "summaryTable",
            format!("{} labels but {} values", labels.len(), values.len()),
        ));
    }
    let rows: Vec<(String, Value)> = labels
        .iter()
        .map(Value::to_text)
        .zip(values.iter().cloned())
        .collect();
    Ok(Value::Text(ctx.tables.render(&rows)))
}

#[cfg(test)]
mod tests {
    use super::super::testing::Harness;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_rows_in_order() {
        let table = Harness::new()
            .call(
                "summaryTable",
                vec![
                    Value::from(vec![Value::from("Name"), Value::from("Age")]),
                    Value::from(vec![Value::from("Ann"), Value::from(42)]),
                ],
            )
            .unwrap();
        assert_eq!(
            table,
            Value::from(
                "<table><tr><th>Name</th><td>Ann</td></tr><tr><th>Age</th><td>42</td></tr></table>"
            )
        );
    }

    #[test]
    fn mismatched_lengths_fail() {
        let err = Harness::new()
            .call(
                "summaryTable",
                vec![Value::from(vec![Value::from("a")]), Value::List(vec![])],
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "summaryTable(): 1 labels but 0 values");
    }
}
