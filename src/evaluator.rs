use std::collections::HashMap;
use std::sync::LazyLock;

use crate::ast::{Closure, Value};
use crate::environment::{Environment, Globals};
use crate::{Error, MAX_EVAL_DEPTH, ensure_sufficient_stack};

pub mod intooperation;

/// Handler for a special form: receives the unevaluated operands
type SpecialFormFn = fn(&[Value], &Environment, &mut Globals, usize) -> Result<Value, Error>;

/// Special forms, dispatched by operator name before any operand is
/// evaluated
static SPECIAL_FORMS: LazyLock<HashMap<&'static str, SpecialFormFn>> = LazyLock::new(|| {
    let forms: [(&'static str, SpecialFormFn); 6] = [
        ("if", eval_if),
        ("and", eval_and),
        ("or", eval_or),
        ("define", eval_define),
        ("let", eval_let),
        ("function", eval_function),
    ];
    forms.into_iter().collect()
});

/// Whether `name` is a special form keyword
pub fn is_special_form(name: &str) -> bool {
    SPECIAL_FORMS.contains_key(name)
}

/// Evaluate an expression in a lexical environment (public API)
///
/// `define` writes to `globals`; everything else only reads it.
pub fn eval(expr: &Value, env: &Environment, globals: &mut Globals) -> Result<Value, Error> {
    eval_with_depth_tracking(expr, env, globals, 0)
}

/// Apply a function value to already evaluated operands (public API)
pub fn apply(func: &Value, args: Vec<Value>, globals: &mut Globals) -> Result<Value, Error> {
    apply_with_depth(func, args, globals, 0)
}

/// Evaluate an expression with depth tracking to prevent runaway recursion
fn eval_with_depth_tracking(
    expr: &Value,
    env: &Environment,
    globals: &mut Globals,
    depth: usize,
) -> Result<Value, Error> {
    if depth >= MAX_EVAL_DEPTH {
        return Err(Error::EvalError(format!(
            "Evaluation depth limit exceeded (max: {MAX_EVAL_DEPTH})"
        )));
    }

    ensure_sufficient_stack(|| match expr {
        // Variable lookup: frames first, then the global table
        Value::Symbol(name) => env.lookup(name, globals),

        // Special form or application
        Value::Pair(pair) => {
            if let Value::Symbol(name) = &pair.head
                && let Some(special_form) = SPECIAL_FORMS.get(name.as_str())
            {
                let operands = pair.tail.to_vec()?;
                return special_form(&operands, env, globals, depth);
            }
            eval_application(expr, env, globals, depth)
        }

        // Everything else evaluates to itself
        Value::Number(_)
        | Value::String(_)
        | Value::Bool(_)
        | Value::Null
        | Value::Primitive(_)
        | Value::Closure(_)
        | Value::Unspecified => Ok(expr.clone()),
    })
}

/// Evaluate every element of the form left to right, operator included,
/// then apply the operator to the operands
fn eval_application(
    expr: &Value,
    env: &Environment,
    globals: &mut Globals,
    depth: usize,
) -> Result<Value, Error> {
    let elements = expr.to_vec()?;
    let (func_expr, arg_exprs) = match elements.split_first() {
        Some(parts) => parts,
        None => return Err(Error::EvalError("Cannot evaluate empty form".to_owned())),
    };

    let func = eval_with_depth_tracking(func_expr, env, globals, depth + 1)?;
    let args = eval_args(arg_exprs, env, globals, depth)?;

    apply_with_depth(&func, args, globals, depth)
}

/// Evaluate operand expressions in order
fn eval_args(
    args: &[Value],
    env: &Environment,
    globals: &mut Globals,
    depth: usize,
) -> Result<Vec<Value>, Error> {
    args.iter()
        .map(|arg| eval_with_depth_tracking(arg, env, globals, depth + 1))
        .collect()
}

fn apply_with_depth(
    func: &Value,
    args: Vec<Value>,
    globals: &mut Globals,
    depth: usize,
) -> Result<Value, Error> {
    match func {
        Value::Primitive(primitive) => {
            if args.len() != primitive.arity {
                return Err(Error::arity_error_with_expr(
                    primitive.arity,
                    args.len(),
                    primitive.id.as_str(),
                ));
            }
            tracing::trace!(primitive = %primitive.id, argc = args.len(), "apply");
            primitive.call(args)
        }
        Value::Closure(closure) => {
            if closure.params.len() != args.len() {
                return Err(Error::arity_error(closure.params.len(), args.len()));
            }
            tracing::trace!(params = ?closure.params, depth, "apply closure");

            // New frame on the closure's captured chain, not the caller's
            let frame = closure.env.extend(&closure.params, args);
            eval_with_depth_tracking(&closure.body, &frame, globals, depth + 1)
        }
        other => Err(Error::NotAFunction(other.to_string())),
    }
}

/// Evaluate if special form
fn eval_if(
    args: &[Value],
    env: &Environment,
    globals: &mut Globals,
    depth: usize,
) -> Result<Value, Error> {
    match args {
        [condition_expr, then_expr, else_expr] => {
            let condition = eval_with_depth_tracking(condition_expr, env, globals, depth + 1)?;
            if condition.is_truthy() {
                eval_with_depth_tracking(then_expr, env, globals, depth + 1)
            } else {
                eval_with_depth_tracking(else_expr, env, globals, depth + 1)
            }
        }
        _ => Err(Error::arity_error_with_expr(3, args.len(), "if")),
    }
}

/// Short-circuiting binary operators. When the left operand does not decide
/// the result, the right operand's value is returned as is.
macro_rules! short_circuit_op {
    ($name:ident, $op_name:literal, $decides_when_truthy:literal) => {
        fn $name(
            args: &[Value],
            env: &Environment,
            globals: &mut Globals,
            depth: usize,
        ) -> Result<Value, Error> {
            match args {
                [left_expr, right_expr] => {
                    let left = eval_with_depth_tracking(left_expr, env, globals, depth + 1)?;
                    if left.is_truthy() == $decides_when_truthy {
                        Ok(Value::Bool($decides_when_truthy))
                    } else {
                        eval_with_depth_tracking(right_expr, env, globals, depth + 1)
                    }
                }
                _ => Err(Error::arity_error_with_expr(2, args.len(), $op_name)),
            }
        }
    };
}

short_circuit_op!(eval_and, "and", false);
short_circuit_op!(eval_or, "or", true);

/// Evaluate define special form
fn eval_define(
    args: &[Value],
    env: &Environment,
    globals: &mut Globals,
    depth: usize,
) -> Result<Value, Error> {
    match args {
        [Value::Symbol(name), expr] => {
            let value = eval_with_depth_tracking(expr, env, globals, depth + 1)?;
            tracing::debug!(name = %name, "define");
            Ok(globals.define(name.clone(), value))
        }
        [other, _] => Err(Error::TypeError(format!(
            "define requires a symbol, got {}",
            other.type_name()
        ))),
        _ => Err(Error::arity_error_with_expr(2, args.len(), "define")),
    }
}

/// Evaluate let special form: one binding, visible in the body only
fn eval_let(
    args: &[Value],
    env: &Environment,
    globals: &mut Globals,
    depth: usize,
) -> Result<Value, Error> {
    match args {
        [Value::Symbol(name), value_expr, body] => {
            let value = eval_with_depth_tracking(value_expr, env, globals, depth + 1)?;
            let inner = env.extend(std::slice::from_ref(name), vec![value]);
            eval_with_depth_tracking(body, &inner, globals, depth + 1)
        }
        [other, _, _] => Err(Error::TypeError(format!(
            "let requires a symbol, got {}",
            other.type_name()
        ))),
        _ => Err(Error::arity_error_with_expr(3, args.len(), "let")),
    }
}

/// Evaluate function special form
fn eval_function(
    args: &[Value],
    env: &Environment,
    _globals: &mut Globals,
    _depth: usize,
) -> Result<Value, Error> {
    match args {
        [param_list, body] => {
            let param_values = param_list.to_vec().map_err(|_| {
                Error::TypeError(format!(
                    "function parameters must be a list, got {}",
                    param_list.type_name()
                ))
            })?;

            let mut params: Vec<String> = Vec::with_capacity(param_values.len());
            for param in param_values {
                match param {
                    Value::Symbol(name) => {
                        if params.contains(&name) {
                            return Err(Error::TypeError(format!(
                                "Duplicate parameter name: {name}"
                            )));
                        }
                        params.push(name);
                    }
                    other => {
                        return Err(Error::TypeError(format!(
                            "function parameters must be symbols, got {}",
                            other.type_name()
                        )));
                    }
                }
            }

            Ok(Value::from(Closure {
                params,
                body: body.clone(),
                env: env.clone(),
            }))
        }
        _ => Err(Error::arity_error_with_expr(2, args.len(), "function")),
    }
}
