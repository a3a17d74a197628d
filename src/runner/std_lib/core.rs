//! Core built-ins registration, global functions and the members every
//! primitive and function value answers for.

use crate::runner::ds::error::{JErrorType, JsResult};
use crate::runner::ds::function_object::JsFunction;
use crate::runner::ds::object::{JsObject, JsObjectType, ObjectKind};
use crate::runner::ds::value::{number_to_string, JsValue};
use crate::runner::eval::function::call_function;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::native_value;

use super::{arg, array, console, error, json, math, object, string};

/// Register all core built-in objects with the registry.
pub fn register_core_builtins(registry: &mut BuiltInRegistry) {
    object::register(registry);
    array::register(registry);
    string::register(registry);
    registry.register_constructor("Number", number_constructor);
    registry.register_constructor("Boolean", boolean_constructor);
    math::register(registry);
    json::register(registry);
    error::register(registry);
    console::register(registry);

    registry.register_function("parseInt", parse_int);
    registry.register_function("parseFloat", parse_float);
    registry.register_function("isNaN", is_nan);
    registry.register_function("isFinite", is_finite);
    registry.register_function("encodeURIComponent", encode_uri_component);
    registry.register_function("decodeURIComponent", decode_uri_component);
}

fn number_constructor(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    Ok(JsValue::Number(match args.first() {
        Some(v) => v.to_number(),
        None => 0.0,
    }))
}

fn boolean_constructor(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    Ok(JsValue::Boolean(arg(&args, 0).truthy()))
}

fn parse_int(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let text = arg(&args, 0).to_display();
    let mut s = text.trim_start();
    let mut sign = 1.0;
    if let Some(rest) = s.strip_prefix('-') {
        sign = -1.0;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }
    let mut radix = match arg(&args, 1) {
        JsValue::Undefined => 0,
        r => r.to_number() as u32,
    };
    if radix == 0 || radix == 16 {
        if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            s = rest;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return Ok(JsValue::Number(f64::NAN));
    }
    let mut result: Option<f64> = None;
    for c in s.chars() {
        match c.to_digit(radix) {
            Some(d) => result = Some(result.unwrap_or(0.0) * radix as f64 + d as f64),
            None => break,
        }
    }
    Ok(JsValue::Number(result.map_or(f64::NAN, |n| sign * n)))
}

fn parse_float(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let text = arg(&args, 0).to_display();
    let s = text.trim_start();
    for prefix in ["Infinity", "+Infinity"] {
        if s.starts_with(prefix) {
            return Ok(JsValue::Number(f64::INFINITY));
        }
    }
    if s.starts_with("-Infinity") {
        return Ok(JsValue::Number(f64::NEG_INFINITY));
    }
    // Longest prefix that parses.
    let candidate: String = s
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
        .collect();
    let mut end = candidate.len();
    while end > 0 {
        if let Ok(n) = candidate[..end].parse::<f64>() {
            return Ok(JsValue::Number(n));
        }
        end -= 1;
    }
    Ok(JsValue::Number(f64::NAN))
}

fn is_nan(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    Ok(JsValue::Boolean(arg(&args, 0).to_number().is_nan()))
}

fn is_finite(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    Ok(JsValue::Boolean(arg(&args, 0).to_number().is_finite()))
}

fn encode_uri_component(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let text = arg(&args, 0).to_display();
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        if byte.is_ascii_alphanumeric() || b"-_.!~*'()".contains(&byte) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    Ok(JsValue::String(out))
}

fn decode_uri_component(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let text = arg(&args, 0).to_display();
    let malformed = || JErrorType::TypeError("URI malformed".to_string());
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = text.get(i + 1..i + 3).ok_or_else(malformed)?;
            out.push(u8::from_str_radix(hex, 16).map_err(|_| malformed())?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(JsValue::String(String::from_utf8(out).map_err(|_| malformed())?))
}

/// Methods shared by numbers and booleans.
pub fn primitive_method(key: &str) -> Option<JsValue> {
    match key {
        "toString" => Some(native_value("toString", primitive_to_string)),
        "valueOf" => Some(native_value("valueOf", primitive_value_of)),
        "toFixed" => Some(native_value("toFixed", number_to_fixed)),
        _ => None,
    }
}

fn primitive_to_string(this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    if let (JsValue::Number(n), JsValue::Number(radix)) = (&this, arg(&args, 0)) {
        let radix = radix as u32;
        if radix != 10 && (2..=36).contains(&radix) && n.fract() == 0.0 && n.is_finite() {
            let mut digits = vec![];
            let mut m = n.abs() as u64;
            loop {
                digits.push(std::char::from_digit((m % radix as u64) as u32, radix).unwrap_or('0'));
                m /= radix as u64;
                if m == 0 {
                    break;
                }
            }
            if *n < 0.0 {
                digits.push('-');
            }
            return Ok(JsValue::String(digits.into_iter().rev().collect()));
        }
    }
    Ok(JsValue::String(this.to_display()))
}

fn primitive_value_of(this: JsValue, _args: Vec<JsValue>) -> JsResult<JsValue> {
    Ok(this)
}

fn number_to_fixed(this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let digits = match arg(&args, 0) {
        JsValue::Undefined => 0.0,
        d => d.to_number(),
    };
    if !(0.0..=100.0).contains(&digits) {
        return Err(JErrorType::RangeError(
            "toFixed() digits argument must be between 0 and 100".to_string(),
        )
        .into());
    }
    let n = this.to_number();
    if !n.is_finite() {
        return Ok(JsValue::String(number_to_string(n)));
    }
    Ok(JsValue::String(format!("{:.*}", digits as usize, n)))
}

/// `call`, `apply`, `bind`, `name` and `length` of a function object.
pub fn function_property(object: &JsObjectType, key: &str) -> Option<JsValue> {
    match key {
        "call" => Some(native_value("call", function_call)),
        "apply" => Some(native_value("apply", function_apply)),
        "bind" => Some(native_value("bind", function_bind)),
        "name" | "length" => {
            let o = object.borrow();
            let f = o.as_function()?;
            Some(if key == "name" {
                JsValue::String(f.name())
            } else {
                JsValue::Number(f.param_count() as f64)
            })
        }
        _ => None,
    }
}

fn function_call(this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let mut args = args.into_iter();
    let receiver = args.next().unwrap_or(JsValue::Undefined);
    call_function(&this, receiver, args.collect())
}

fn function_apply(this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let receiver = arg(&args, 0);
    let list = match arg(&args, 1) {
        JsValue::Undefined | JsValue::Null => vec![],
        JsValue::Object(o) => match &o.borrow().kind {
            ObjectKind::Array(items) => items.clone(),
            _ => vec![],
        },
        _ => {
            return Err(JErrorType::TypeError(
                "CreateListFromArrayLike called on non-object".to_string(),
            )
            .into())
        }
    };
    call_function(&this, receiver, list)
}

fn function_bind(this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let target = match &this {
        JsValue::Object(o) if this.is_callable() => o.clone(),
        _ => {
            return Err(
                JErrorType::TypeError("Bind must be called on a function".to_string()).into(),
            )
        }
    };
    let mut args = args.into_iter();
    let bound_this = args.next().unwrap_or(JsValue::Undefined);
    Ok(JsValue::from_object(JsObject::new_function(
        JsFunction::Bound {
            target,
            this: bound_this,
            args: args.collect(),
        },
    )))
}

/// Script functions that can be constructed get an empty `prototype` object
/// the first time one is asked for.
pub fn lazy_prototype(object: &JsObjectType) -> Option<JsValue> {
    let constructable = {
        let o = object.borrow();
        match o.as_function() {
            Some(JsFunction::Script { data, .. }) => !data.is_arrow,
            _ => false,
        }
    };
    if !constructable {
        return None;
    }
    let prototype = JsValue::from_object(JsObject::new_ordinary());
    object
        .borrow_mut()
        .properties
        .insert("prototype".to_string(), prototype.clone());
    Some(prototype)
}
