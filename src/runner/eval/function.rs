//! Function call execution.
//!
//! This module provides function call execution logic for the interpreter:
//! closures over script functions, natives and bound functions.

use std::cell::Cell;
use std::rc::Rc;

use crate::parser::ast::{FunctionBodyOrExpression, FunctionData};
use crate::runner::ds::error::{JErrorType, JsResult};
use crate::runner::ds::function_object::JsFunction;
use crate::runner::ds::object::{get_property, new_array_value, JsObject, JsObjectType};
use crate::runner::ds::scope::Scope;
use crate::runner::ds::value::JsValue;

use super::expression::evaluate_expression;
use super::statement::{execute_statements, hoist_var_declarations};
use super::types::{CompletionType, ValueResult};

const MAX_CALL_DEPTH: usize = 256;

/// Stack a script may use below its outermost call. Fits a 2MB thread.
const MAX_STACK_BYTES: usize = 768 * 1024;

thread_local! {
    static CALL_DEPTH: Cell<usize> = Cell::new(0);
    static STACK_BASE: Cell<usize> = Cell::new(0);
}

fn stack_address() -> usize {
    let marker = 0u8;
    &marker as *const u8 as usize
}

fn stack_overflow() -> JsResult<CallFrame> {
    Err(JErrorType::RangeError("Maximum call stack size exceeded".to_string()).into())
}

/// Tracks nesting of calls on this thread. Dropping it leaves the frame.
struct CallFrame;

impl CallFrame {
    fn enter() -> JsResult<CallFrame> {
        let depth = CALL_DEPTH.with(|d| d.get());
        let here = stack_address();
        if depth == 0 {
            STACK_BASE.with(|b| b.set(here));
        } else if depth >= MAX_CALL_DEPTH
            || STACK_BASE.with(|b| b.get()).abs_diff(here) > MAX_STACK_BYTES
        {
            return stack_overflow();
        }
        CALL_DEPTH.with(|d| d.set(depth + 1));
        Ok(CallFrame)
    }
}

impl Drop for CallFrame {
    fn drop(&mut self) {
        CALL_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

/// Instantiate a closure for `data` over `scope`.
pub fn create_function_object(data: &Rc<FunctionData>, scope: &Rc<Scope>) -> JsValue {
    JsValue::from_object(JsObject::new_function(JsFunction::Script {
        data: data.clone(),
        closure: scope.clone(),
    }))
}

/// The function behind a value. The clone lets the call run without
/// holding a borrow of the object.
fn function_of(func: &JsValue) -> JsResult<(JsObjectType, JsFunction)> {
    if let JsValue::Object(o) = func {
        if let Some(f) = o.borrow().as_function() {
            return Ok((o.clone(), f.clone()));
        }
    }
    Err(JErrorType::TypeError(format!("{} is not a function", func.type_of())).into())
}

/// Name of a function value, empty for anonymous ones and non-functions.
pub fn function_name(func: &JsValue) -> String {
    match function_of(func) {
        Ok((_, f)) => f.name(),
        Err(_) => String::new(),
    }
}

/// Call a function with the given receiver and arguments.
pub fn call_function(func: &JsValue, this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let (_, function) = function_of(func)?;
    let _frame = CallFrame::enter()?;
    match function {
        JsFunction::Native { call, .. } => call(this, args),
        JsFunction::Bound {
            target,
            this: bound_this,
            args: mut bound_args,
        } => {
            bound_args.extend(args);
            call_function(&JsValue::Object(target), bound_this, bound_args)
        }
        JsFunction::Script { data, closure } => {
            call_script_function(func, &data, &closure, this, args)
        }
    }
}

fn call_script_function(
    func: &JsValue,
    data: &Rc<FunctionData>,
    closure: &Rc<Scope>,
    this: JsValue,
    args: Vec<JsValue>,
) -> ValueResult {
    let scope = if data.is_arrow {
        Scope::new_function(closure, closure.this_value())
    } else {
        let scope = Scope::new_function(closure, this);
        // A named function expression can refer to itself.
        if let Some(name) = &data.name {
            scope.declare_var(name, Some(func.clone()))?;
        }
        scope.declare_var("arguments", Some(new_array_value(args.clone())))?;
        scope
    };
    let mut args = args.into_iter();
    for param in &data.params {
        scope.declare_var(param, Some(args.next().unwrap_or(JsValue::Undefined)))?;
    }
    match &data.body {
        FunctionBodyOrExpression::Expression(expression) => evaluate_expression(expression, &scope),
        FunctionBodyOrExpression::FunctionBody(body) => {
            hoist_var_declarations(body, &scope)?;
            let completion = execute_statements(body, &scope)?;
            Ok(match completion.completion_type {
                CompletionType::Return => completion.get_value(),
                _ => JsValue::Undefined,
            })
        }
    }
}

/// Can `new` be applied to this value?
pub fn is_constructor(value: &JsValue) -> bool {
    match function_of(value) {
        Ok((_, JsFunction::Native { constructor, .. })) => constructor,
        Ok((_, JsFunction::Script { data, .. })) => {
            !data.is_arrow
                && data
                    .name
                    .as_deref()
                    .and_then(|n| n.chars().next())
                    .map_or(false, |c| c.is_uppercase())
        }
        Ok((_, JsFunction::Bound { target, .. })) => is_constructor(&JsValue::Object(target)),
        Err(_) => false,
    }
}

/// `new func(...args)`.
pub fn construct(func: &JsValue, args: Vec<JsValue>) -> ValueResult {
    let (object, function) = function_of(func)?;
    match function {
        JsFunction::Bound {
            target,
            args: mut bound_args,
            ..
        } => {
            bound_args.extend(args);
            construct(&JsValue::Object(target), bound_args)
        }
        JsFunction::Native {
            name, constructor, ..
        } => {
            if !constructor {
                return Err(JErrorType::TypeError(format!("{} is not a constructor", name)).into());
            }
            let this = JsValue::from_object(JsObject::new_ordinary());
            let result = call_function(func, this.clone(), args)?;
            Ok(if result.as_object().is_some() { result } else { this })
        }
        JsFunction::Script { data, .. } => {
            if data.is_arrow {
                return Err(JErrorType::TypeError(format!(
                    "{} is not a constructor",
                    data.name.clone().unwrap_or_else(|| "anonymous".to_string())
                ))
                .into());
            }
            let mut instance = JsObject::new_ordinary();
            if let JsValue::Object(prototype) = get_property(&object, "prototype")? {
                instance.prototype = Some(prototype);
            }
            let this = JsValue::from_object(instance);
            let result = call_function(func, this.clone(), args)?;
            Ok(if result.as_object().is_some() { result } else { this })
        }
    }
}
