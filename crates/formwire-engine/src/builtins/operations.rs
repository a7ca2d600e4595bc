//! Built-ins reading operation, calculation, workflow and debug state.

use formwire_core::Value;

use super::{Builtins, CallContext, expect_args, text_arg};
use crate::error::BuiltinError;

pub(super) fn register(b: &mut Builtins) {
    b.add("operations", "operationResult", "Last successful result of a named operation", operation_result);
    b.add("operations", "isOperationInProgress", "Whether a named operation (or any, without a name) is running", is_operation_in_progress);
    b.add("operations", "operationError", "Last error message of a named operation, or null", operation_error);
    b.add("operations", "calculationResult", "Latest result of a named calculation", calculation_result);
    b.add("operations", "workflowStep", "Name of the current workflow step, or null", workflow_step);
    b.add("operations", "isWorkflowStep", "Whether the workflow is at the named step", is_workflow_step);
    b.add("operations", "isDebug", "Whether debug mode is enabled", is_debug);
    b.add("operations", "debugLevel", "Current debug verbosity", debug_level);
}

fn operation_result(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("operationResult", args, 1, 1)?;
    Ok(ctx.state.operation_result(&text_arg(args, 0)))
}

fn is_operation_in_progress(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("isOperationInProgress", args, 0, 1)?;
    let running = match args.first() {
        Some(name) => ctx.state.is_operation_in_progress(&name.to_text()),
        None => ctx.state.any_operation_in_progress(),
    };
    Ok(Value::Bool(running))
}

fn operation_error(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("operationError", args, 1, 1)?;
    Ok(ctx
        .state
        .operation_error(&text_arg(args, 0))
        .map_or(Value::Null, Value::Text))
}

fn calculation_result(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("calculationResult", args, 1, 1)?;
    Ok(ctx.state.calculation_result(&text_arg(args, 0)))
}

fn workflow_step(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("workflowStep", args, 0, 0)?;
    Ok(ctx.state.workflow_step().map_or(Value::Null, Value::Text))
}

fn is_workflow_step(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("isWorkflowStep", args, 1, 1)?;
    let wanted = text_arg(args, 0);
    Ok(Value::Bool(
        ctx.state.workflow_step().is_some_and(|step| step == wanted),
    ))
}

fn is_debug(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("isDebug", args, 0, 0)?;
    Ok(Value::Bool(ctx.state.is_debug()))
}

fn debug_level(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("debugLevel", args, 0, 0)?;
    Ok(Value::from(ctx.state.debug_level() as i64))
}
