//! Math built-in object.
//!
//! Provides mathematical constants and functions.

use crate::runner::ds::error::JsResult;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::BuiltInObject;

use super::arg;

/// Register the Math object with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let math = BuiltInObject::new("Math")
        // Constants
        .add_property("E", JsValue::Number(std::f64::consts::E))
        .add_property("PI", JsValue::Number(std::f64::consts::PI))
        .add_property("SQRT2", JsValue::Number(std::f64::consts::SQRT_2))
        // Methods
        .add_method("abs", math_abs)
        .add_method("floor", math_floor)
        .add_method("ceil", math_ceil)
        .add_method("round", math_round)
        .add_method("trunc", math_trunc)
        .add_method("sign", math_sign)
        .add_method("min", math_min)
        .add_method("max", math_max)
        .add_method("sqrt", math_sqrt)
        .add_method("pow", math_pow);

    registry.register_object(math);
}

fn num(args: &[JsValue], index: usize) -> f64 {
    arg(args, index).to_number()
}

fn math_abs(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    Ok(JsValue::Number(num(&args, 0).abs()))
}

fn math_floor(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    Ok(JsValue::Number(num(&args, 0).floor()))
}

fn math_ceil(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    Ok(JsValue::Number(num(&args, 0).ceil()))
}

/// Math.round - halves round towards +Infinity.
fn math_round(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    Ok(JsValue::Number((num(&args, 0) + 0.5).floor()))
}

fn math_trunc(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    Ok(JsValue::Number(num(&args, 0).trunc()))
}

fn math_sign(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let n = num(&args, 0);
    Ok(JsValue::Number(if n.is_nan() || n == 0.0 {
        n
    } else {
        n.signum()
    }))
}

fn math_min(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let mut result = f64::INFINITY;
    for value in &args {
        let n = value.to_number();
        if n.is_nan() {
            return Ok(JsValue::Number(f64::NAN));
        }
        result = result.min(n);
    }
    Ok(JsValue::Number(result))
}

fn math_max(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let mut result = f64::NEG_INFINITY;
    for value in &args {
        let n = value.to_number();
        if n.is_nan() {
            return Ok(JsValue::Number(f64::NAN));
        }
        result = result.max(n);
    }
    Ok(JsValue::Number(result))
}

fn math_sqrt(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    Ok(JsValue::Number(num(&args, 0).sqrt()))
}

fn math_pow(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    Ok(JsValue::Number(num(&args, 0).powf(num(&args, 1))))
}
