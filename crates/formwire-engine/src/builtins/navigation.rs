//! Navigation built-ins. Indices are zero-based.

use formwire_core::{Value, path};

use super::{Builtins, CallContext, expect_args};
use crate::error::BuiltinError;

pub(super) fn register(b: &mut Builtins) {
    b.add("navigation", "isFirstArticle", "Whether the first article is shown", is_first_article);
    b.add("navigation", "isLastArticle", "Whether the last article is shown", is_last_article);
    b.add("navigation", "articleIndex", "Index of the current article", article_index);
    b.add("navigation", "elementIndex", "Index of the current element", element_index);
    b.add("navigation", "hasNextElement", "Whether another element follows", has_next_element);
    b.add("navigation", "hasPreviousElement", "Whether an element precedes the current one", has_previous_element);
    b.add("navigation", "repeatIndex", "Innermost repeat index of the expression's scope", repeat_index);
}

fn is_first_article(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("isFirstArticle", args, 0, 0)?;
    Ok(Value::Bool(ctx.state.article_index() == 0))
}

fn is_last_article(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("isLastArticle", args, 0, 0)?;
    let count = ctx.state.article_count();
    Ok(Value::Bool(count == 0 || ctx.state.article_index() + 1 >= count))
}

fn article_index(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("articleIndex", args, 0, 0)?;
    Ok(Value::from(ctx.state.article_index()))
}

fn element_index(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("elementIndex", args, 0, 0)?;
    Ok(Value::from(ctx.state.element_index()))
}

fn has_next_element(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("hasNextElement", args, 0, 0)?;
    Ok(Value::Bool(
        ctx.state.element_index() + 1 < ctx.state.element_count(),
    ))
}

fn has_previous_element(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("hasPreviousElement", args, 0, 0)?;
    Ok(Value::Bool(ctx.state.element_index() > 0))
}

fn repeat_index(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("repeatIndex", args, 0, 0)?;
    Ok(ctx
        .scope
        .and_then(path::repeat_index)
        .map_or(Value::Null, Value::from))
}
