//! Object built-in.
//!
//! Provides the Object constructor, its static helpers and the methods every
//! object answers for.

use crate::runner::ds::error::{JErrorType, JsResult};
use crate::runner::ds::object::{
    get_property, has_own_property, new_array_value, own_keys, set_property, JsObject,
};
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{native_value, BuiltInObject};

use super::arg;

/// Register the Object built-in with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let object = BuiltInObject::new("Object")
        .with_constructor(object_constructor)
        .add_method("keys", object_keys)
        .add_method("values", object_values)
        .add_method("assign", object_assign);

    registry.register_object(object);
}

/// Methods inherited by every object.
pub fn object_method(key: &str) -> Option<JsValue> {
    match key {
        "hasOwnProperty" => Some(native_value("hasOwnProperty", object_has_own_property)),
        "toString" => Some(native_value("toString", object_to_string)),
        _ => None,
    }
}

/// Object constructor: objects pass through, anything else gets a fresh one.
fn object_constructor(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    match arg(&args, 0) {
        value @ JsValue::Object(_) => Ok(value),
        _ => Ok(JsValue::from_object(JsObject::new_ordinary())),
    }
}

/// Object.keys
fn object_keys(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let keys = match arg(&args, 0) {
        JsValue::Object(o) => own_keys(&o),
        JsValue::String(s) => (0..s.chars().count()).map(|i| i.to_string()).collect(),
        JsValue::Undefined | JsValue::Null => {
            return Err(JErrorType::TypeError(
                "Cannot convert undefined or null to object".to_string(),
            )
            .into())
        }
        _ => vec![],
    };
    Ok(new_array_value(keys.into_iter().map(JsValue::from).collect()))
}

/// Object.values
fn object_values(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    match arg(&args, 0) {
        JsValue::Object(o) => {
            let mut values = vec![];
            for key in own_keys(&o) {
                values.push(get_property(&o, &key)?);
            }
            Ok(new_array_value(values))
        }
        _ => Ok(new_array_value(vec![])),
    }
}

/// Object.assign
fn object_assign(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let target = match arg(&args, 0) {
        JsValue::Object(o) => o,
        _ => {
            return Err(JErrorType::TypeError(
                "Cannot convert undefined or null to object".to_string(),
            )
            .into())
        }
    };
    for source in args.iter().skip(1) {
        if let JsValue::Object(source) = source {
            for key in own_keys(source) {
                let value = get_property(source, &key)?;
                set_property(&target, &key, value)?;
            }
        }
    }
    Ok(JsValue::Object(target))
}

/// Object.prototype.hasOwnProperty
fn object_has_own_property(this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let key = arg(&args, 0).to_display();
    Ok(JsValue::Boolean(match &this {
        JsValue::Object(o) => has_own_property(o, &key),
        _ => false,
    }))
}

/// Object.prototype.toString
fn object_to_string(this: JsValue, _args: Vec<JsValue>) -> JsResult<JsValue> {
    Ok(JsValue::String(this.to_display()))
}
