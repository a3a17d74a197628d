//! Array built-in.
//!
//! Provides the Array constructor and the methods reachable on arrays.

use crate::runner::ds::error::{JErrorType, JsResult};
use crate::runner::ds::object::{new_array_value, JsObjectType, ObjectKind};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::call_function;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{native_value, BuiltInObject, NativeFn};

use super::{arg, relative_index};

/// Register the Array built-in with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let array = BuiltInObject::new("Array")
        .with_constructor(array_constructor)
        .add_method("isArray", array_is_array);

    registry.register_object(array);
}

/// Array method by name.
pub fn array_method(key: &str) -> Option<JsValue> {
    let method: NativeFn = match key {
        "push" => array_push,
        "pop" => array_pop,
        "join" => array_join,
        "indexOf" => array_index_of,
        "includes" => array_includes,
        "slice" => array_slice,
        "concat" => array_concat,
        "forEach" => array_for_each,
        "map" => array_map,
        "filter" => array_filter,
        "toString" => array_to_string,
        _ => return None,
    };
    Some(native_value(key, method))
}

fn array_constructor(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    if let [JsValue::Number(n)] = args.as_slice() {
        if *n < 0.0 || n.fract() != 0.0 {
            return Err(JErrorType::RangeError("Invalid array length".to_string()).into());
        }
        return Ok(new_array_value(vec![JsValue::Undefined; *n as usize]));
    }
    Ok(new_array_value(args))
}

fn array_is_array(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    Ok(JsValue::Boolean(arg(&args, 0).is_array()))
}

fn this_array(this: &JsValue) -> JsResult<JsObjectType> {
    match this {
        JsValue::Object(o) if this.is_array() => Ok(o.clone()),
        _ => Err(JErrorType::TypeError("receiver is not an array".to_string()).into()),
    }
}

/// Snapshot of the elements. Callbacks may mutate the array while we iterate.
fn items_of(array: &JsObjectType) -> Vec<JsValue> {
    match &array.borrow().kind {
        ObjectKind::Array(items) => items.clone(),
        _ => vec![],
    }
}

/// Array.prototype.push
fn array_push(this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let array = this_array(&this)?;
    let mut o = array.borrow_mut();
    match &mut o.kind {
        ObjectKind::Array(items) => {
            items.extend(args);
            Ok(JsValue::Number(items.len() as f64))
        }
        _ => Ok(JsValue::Undefined),
    }
}

/// Array.prototype.pop
fn array_pop(this: JsValue, _args: Vec<JsValue>) -> JsResult<JsValue> {
    let array = this_array(&this)?;
    let mut o = array.borrow_mut();
    match &mut o.kind {
        ObjectKind::Array(items) => Ok(items.pop().unwrap_or(JsValue::Undefined)),
        _ => Ok(JsValue::Undefined),
    }
}

/// Array.prototype.join
fn array_join(this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let items = items_of(&this_array(&this)?);
    let separator = match arg(&args, 0) {
        JsValue::Undefined => ",".to_string(),
        s => s.to_display(),
    };
    Ok(JsValue::String(
        items
            .iter()
            .map(|v| if v.is_nullish() { String::new() } else { v.to_display() })
            .collect::<Vec<_>>()
            .join(&separator),
    ))
}

fn array_to_string(this: JsValue, _args: Vec<JsValue>) -> JsResult<JsValue> {
    array_join(this, vec![])
}

/// Array.prototype.indexOf
fn array_index_of(this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let items = items_of(&this_array(&this)?);
    let needle = arg(&args, 0);
    let from = relative_index(&arg(&args, 1), items.len(), 0);
    Ok(JsValue::Number(
        items
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, v)| v.strict_equals(&needle))
            .map_or(-1.0, |(i, _)| i as f64),
    ))
}

/// Array.prototype.includes. Unlike `indexOf` it finds NaN.
fn array_includes(this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let items = items_of(&this_array(&this)?);
    let needle = arg(&args, 0);
    let is_nan = matches!(needle, JsValue::Number(n) if n.is_nan());
    Ok(JsValue::Boolean(items.iter().any(|v| {
        v.strict_equals(&needle) || (is_nan && matches!(v, JsValue::Number(n) if n.is_nan()))
    })))
}

/// Array.prototype.slice
fn array_slice(this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let items = items_of(&this_array(&this)?);
    let start = relative_index(&arg(&args, 0), items.len(), 0);
    let end = relative_index(&arg(&args, 1), items.len(), items.len());
    Ok(new_array_value(if start < end {
        items[start..end].to_vec()
    } else {
        vec![]
    }))
}

/// Array.prototype.concat
fn array_concat(this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let mut items = items_of(&this_array(&this)?);
    for value in args {
        match &value {
            JsValue::Object(o) if value.is_array() => items.extend(items_of(o)),
            _ => items.push(value),
        }
    }
    Ok(new_array_value(items))
}

/// Runs `callback(item, index, array)` for every element.
fn each_result(this: &JsValue, args: &[JsValue]) -> JsResult<Vec<(JsValue, JsValue)>> {
    let items = items_of(&this_array(this)?);
    let callback = arg(args, 0);
    if !callback.is_callable() {
        return Err(JErrorType::TypeError(format!(
            "{} is not a function",
            callback.to_display()
        ))
        .into());
    }
    let this_arg = arg(args, 1);
    let mut results = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let result = call_function(
            &callback,
            this_arg.clone(),
            vec![item.clone(), JsValue::Number(index as f64), this.clone()],
        )?;
        results.push((item, result));
    }
    Ok(results)
}

/// Array.prototype.forEach
fn array_for_each(this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    each_result(&this, &args)?;
    Ok(JsValue::Undefined)
}

/// Array.prototype.map
fn array_map(this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let results = each_result(&this, &args)?;
    Ok(new_array_value(
        results.into_iter().map(|(_, result)| result).collect(),
    ))
}

/// Array.prototype.filter
fn array_filter(this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let results = each_result(&this, &args)?;
    Ok(new_array_value(
        results
            .into_iter()
            .filter(|(_, keep)| keep.truthy())
            .map(|(item, _)| item)
            .collect(),
    ))
}
