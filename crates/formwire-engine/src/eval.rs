//! Tree-walking evaluator for compiled expressions.

use std::cmp::Ordering;

use formwire_core::Value;

use crate::ast::{BinaryOp, Expr, InternalArray, Slot, UnaryOp};
use crate::builtins::{Builtins, CallContext};
use crate::error::EvalFailure;

/// The current value of every slot of one expression.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inputs {
    pub field_values: Vec<Value>,
    pub search_terms: Vec<Value>,
    pub validities: Vec<bool>,
    pub repeat_counts: Vec<usize>,
    pub aggregates: Vec<Vec<Value>>,
    /// Paths and values per table tag.
    pub tables: Vec<(Vec<String>, Vec<Value>)>,
    pub question_sets: Vec<bool>,
    pub arguments: Vec<Value>,
}

/// Evaluates `expr` against `inputs`.
pub fn evaluate(
    expr: &Expr,
    inputs: &Inputs,
    builtins: &Builtins,
    ctx: &CallContext<'_>,
) -> Result<Value, EvalFailure> {
    Evaluator {
        inputs,
        builtins,
        ctx,
    }
    .eval(expr)
}

struct Evaluator<'a> {
    inputs: &'a Inputs,
    builtins: &'a Builtins,
    ctx: &'a CallContext<'a>,
}

fn nth<T: Clone + Default>(items: &[T], index: usize) -> T {
    items.get(index).cloned().unwrap_or_default()
}

impl Evaluator<'_> {
    fn eval(&self, expr: &Expr) -> Result<Value, EvalFailure> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            // Regex literals are compiled into `Literal` before evaluation.
            Expr::Regex { source, flags } => Ok(Value::Text(format!("/{source}/{flags}"))),
            Expr::Array(items) => Ok(Value::List(
                items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<_, _>>()?,
            )),
            // Unresolved identifiers only survive in uncompiled trees.
            Expr::Ident(_) => Ok(Value::Null),
            Expr::Member(target, name) => {
                let target = self.eval(target)?;
                target
                    .member(name)
                    .ok_or_else(|| EvalFailure::NullMember { name: name.clone() })
            }
            Expr::Index(target, index) => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                target.index(&index).ok_or_else(|| EvalFailure::NullIndex {
                    index: index.to_text(),
                })
            }
            Expr::Call { name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(self.builtins.call(self.ctx, name, &args)?)
            }
            Expr::Unary(op, operand) => {
                let value = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.is_truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                })
            }
            Expr::Binary(BinaryOp::And, lhs, rhs) => {
                let left = self.eval(lhs)?;
                if left.is_truthy() {
                    self.eval(rhs)
                } else {
                    Ok(left)
                }
            }
            Expr::Binary(BinaryOp::Or, lhs, rhs) => {
                let left = self.eval(lhs)?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    self.eval(rhs)
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let left = self.eval(lhs)?;
                let right = self.eval(rhs)?;
                Ok(binary(*op, &left, &right))
            }
            Expr::Conditional(cond, then, otherwise) => {
                if self.eval(cond)?.is_truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Slot(slot) => Ok(self.slot(*slot)),
            Expr::Internal(array) => Ok(self.internal(*array)),
            Expr::QuestionSets(indices) => Ok(Value::Bool(
                indices
                    .iter()
                    .all(|i| self.inputs.question_sets.get(*i).copied().unwrap_or(false)),
            )),
            Expr::TagTable(index) => {
                let (paths, values) = self
                    .inputs
                    .tables
                    .get(*index)
                    .cloned()
                    .unwrap_or_default();
                let rows: Vec<(String, Value)> = paths.into_iter().zip(values).collect();
                Ok(Value::Text(self.ctx.tables.render(&rows)))
            }
        }
    }

    fn slot(&self, slot: Slot) -> Value {
        let inputs = self.inputs;
        match slot {
            Slot::FieldValue(i) => nth(&inputs.field_values, i),
            Slot::SearchTerm(i) => nth(&inputs.search_terms, i),
            Slot::Validity(i) => Value::Bool(inputs.validities.get(i).copied().unwrap_or(true)),
            Slot::RepeatCount(i) => Value::from(nth(&inputs.repeat_counts, i)),
            Slot::Aggregate(i) => Value::List(nth(&inputs.aggregates, i)),
            Slot::Argument(i) => nth(&inputs.arguments, i),
        }
    }

    fn internal(&self, array: InternalArray) -> Value {
        let inputs = self.inputs;
        match array {
            InternalArray::FieldValues => Value::List(inputs.field_values.clone()),
            InternalArray::FieldValidities => {
                Value::List(inputs.validities.iter().map(|v| Value::Bool(*v)).collect())
            }
            InternalArray::RepeatCounts => Value::List(
                inputs
                    .repeat_counts
                    .iter()
                    .map(|c| Value::from(*c))
                    .collect(),
            ),
        }
    }
}

fn is_textual(value: &Value) -> bool {
    matches!(value, Value::Text(_) | Value::List(_) | Value::Map(_))
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    let ordered = |accept: fn(Ordering) -> bool| {
        Value::Bool(left.compare(right).is_some_and(accept))
    };
    match op {
        BinaryOp::Add if is_textual(left) || is_textual(right) => {
            Value::Text(format!("{}{}", left.to_text(), right.to_text()))
        }
        BinaryOp::Add => Value::Number(left.to_number() + right.to_number()),
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Eq => Value::Bool(left.loose_eq(right)),
        BinaryOp::NotEq => Value::Bool(!left.loose_eq(right)),
        BinaryOp::StrictEq => Value::Bool(left == right),
        BinaryOp::StrictNotEq => Value::Bool(left != right),
        BinaryOp::Lt => ordered(Ordering::is_lt),
        BinaryOp::Le => ordered(Ordering::is_le),
        BinaryOp::Gt => ordered(Ordering::is_gt),
        BinaryOp::Ge => ordered(Ordering::is_ge),
        // Short-circuiting operators are handled before operands are
        // evaluated.
        BinaryOp::And => Value::Bool(left.is_truthy() && right.is_truthy()),
        BinaryOp::Or => Value::Bool(left.is_truthy() || right.is_truthy()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::testing::Harness;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn run(source: &str, inputs: &Inputs) -> Result<Value, EvalFailure> {
        let harness = Harness::new();
        let ctx = CallContext {
            state: &harness.state,
            clock: &harness.clock,
            currency: &harness.currency,
            tables: &harness.tables,
            scope: None,
        };
        let expr = parse(source).unwrap();
        evaluate(&expr, inputs, &Builtins::standard(), &ctx)
    }

    fn value(source: &str) -> Value {
        run(source, &Inputs::default()).unwrap()
    }

    #[test]
    fn arithmetic_and_concatenation() {
        assert_eq!(value("1 + 2 * 3"), Value::from(7));
        assert_eq!(value("'a' + 1"), Value::from("a1"));
        assert_eq!(value("'3' * '4'"), Value::from(12));
        assert_eq!(value("7 % 4 - -1"), Value::from(4));
        assert!(value("1 / 0").as_f64().is_some_and(f64::is_infinite));
    }

    #[test]
    fn equality_flavours() {
        assert_eq!(value("1 == '1'"), Value::Bool(true));
        assert_eq!(value("1 === '1'"), Value::Bool(false));
        assert_eq!(value("null != 0"), Value::Bool(true));
        assert_eq!(value("'b' > 'a'"), Value::Bool(true));
        assert_eq!(value("'x' < 1"), Value::Bool(false));
    }

    #[test]
    fn logical_operators_yield_operands() {
        assert_eq!(value("'' || 'fallback'"), Value::from("fallback"));
        assert_eq!(value("0 && unknownFn()"), Value::from(0));
        assert_eq!(value("!''"), Value::Bool(true));
        assert_eq!(value("1 > 2 ? 'yes' : 'no'"), Value::from("no"));
    }

    #[test]
    fn slots_read_inputs() {
        let inputs = Inputs {
            field_values: vec![Value::from(10)],
            aggregates: vec![vec![Value::from(1), Value::from(2)]],
            validities: vec![false],
            question_sets: vec![true, false],
            ..Inputs::default()
        };
        let sum = Expr::call("sum", vec![Expr::Slot(Slot::Aggregate(0))]);
        let harness = Harness::new();
        let ctx = CallContext {
            state: &harness.state,
            clock: &harness.clock,
            currency: &harness.currency,
            tables: &harness.tables,
            scope: None,
        };
        let builtins = Builtins::standard();
        assert_eq!(evaluate(&sum, &inputs, &builtins, &ctx).unwrap(), Value::from(3));
        assert_eq!(
            evaluate(&Expr::Slot(Slot::Validity(0)), &inputs, &builtins, &ctx).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            evaluate(&Expr::QuestionSets(vec![0, 1]), &inputs, &builtins, &ctx).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            evaluate(&Expr::Internal(InternalArray::FieldValues), &inputs, &builtins, &ctx)
                .unwrap(),
            Value::from(vec![Value::from(10)])
        );
    }

    #[test]
    fn member_of_null_is_an_error() {
        let err = run("null.amount", &Inputs::default()).unwrap_err();
        assert_eq!(
            err,
            EvalFailure::NullMember {
                name: "amount".into()
            }
        );
        assert!(run("null[0]", &Inputs::default()).is_err());
        assert_eq!(value("'abc'.length"), Value::from(3));
    }

    #[test]
    fn builtin_failures_propagate() {
        let err = run("round(1, 99)", &Inputs::default()).unwrap_err();
        assert!(matches!(err, EvalFailure::Builtin(_)));
    }
}
