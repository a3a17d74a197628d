//! JSON built-in object.
//!
//! Provides JSON.parse and JSON.stringify on top of `serde_json`.

use std::rc::Rc;

use serde_json::{Map, Number, Value};

use crate::runner::ds::error::{JErrorType, JsResult};
use crate::runner::ds::object::{
    get_property, new_array_value, object_from_entries, own_keys, JsObjectType, ObjectKind,
};
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::BuiltInObject;

use super::arg;

/// Register the JSON object with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let json = BuiltInObject::new("JSON")
        .add_method("parse", json_parse)
        .add_method("stringify", json_stringify);

    registry.register_object(json);
}

/// JSON.parse - Parse JSON string to a script value.
fn json_parse(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let text = arg(&args, 0).to_display();
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| JErrorType::SyntaxError(format!("JSON.parse: {}", e)))?;
    Ok(from_json(value))
}

/// JSON.stringify - `undefined` and functions at the top level give `undefined`.
fn json_stringify(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let mut stack = vec![];
    let value = match to_json(&arg(&args, 0), &mut stack)? {
        Some(value) => value,
        None => return Ok(JsValue::Undefined),
    };
    let indent = match arg(&args, 2) {
        JsValue::Number(n) if n >= 1.0 => " ".repeat((n as usize).min(10)),
        JsValue::String(s) => s.chars().take(10).collect(),
        _ => String::new(),
    };
    let text = if indent.is_empty() {
        serde_json::to_string(&value)
    } else {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        serde::Serialize::serialize(&value, &mut serializer)
            .map(|_| String::from_utf8_lossy(&out).into_owned())
    };
    text.map(JsValue::String)
        .map_err(|e| JErrorType::TypeError(e.to_string()).into())
}

/// Converts a parsed JSON document into script values.
pub fn from_json(value: Value) -> JsValue {
    match value {
        Value::Null => JsValue::Null,
        Value::Bool(b) => JsValue::Boolean(b),
        Value::Number(n) => JsValue::Number(n.as_f64().unwrap_or(f64::NAN)),
        Value::String(s) => JsValue::String(s),
        Value::Array(items) => new_array_value(items.into_iter().map(from_json).collect()),
        Value::Object(map) => object_from_entries(map.into_iter().map(|(k, v)| (k, from_json(v)))),
    }
}

/// Converts a script value into JSON. `None` stands for values JSON skips
/// (`undefined` and functions).
pub fn to_json(value: &JsValue, stack: &mut Vec<JsObjectType>) -> JsResult<Option<Value>> {
    Ok(Some(match value {
        JsValue::Undefined => return Ok(None),
        JsValue::Null => Value::Null,
        JsValue::Boolean(b) => Value::Bool(*b),
        JsValue::Number(n) => number_to_json(*n),
        JsValue::String(s) => Value::String(s.clone()),
        JsValue::Object(o) => {
            if value.is_callable() {
                return Ok(None);
            }
            if stack.iter().any(|seen| Rc::ptr_eq(seen, o)) {
                return Err(JErrorType::TypeError(
                    "Converting circular structure to JSON".to_string(),
                )
                .into());
            }
            stack.push(o.clone());
            let result = object_to_json(o, stack);
            stack.pop();
            result?
        }
    }))
}

fn object_to_json(object: &JsObjectType, stack: &mut Vec<JsObjectType>) -> JsResult<Value> {
    let items = match &object.borrow().kind {
        ObjectKind::Array(items) => Some(items.clone()),
        _ => None,
    };
    if let Some(items) = items {
        let mut out = Vec::with_capacity(items.len());
        for item in &items {
            out.push(to_json(item, stack)?.unwrap_or(Value::Null));
        }
        return Ok(Value::Array(out));
    }
    let mut map = Map::new();
    for key in own_keys(object) {
        let value = get_property(object, &key)?;
        if let Some(json) = to_json(&value, stack)? {
            map.insert(key, json);
        }
    }
    Ok(Value::Object(map))
}

fn number_to_json(n: f64) -> Value {
    if !n.is_finite() {
        return Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map_or(Value::Null, Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_numbers_serialize_without_fraction() {
        assert_eq!(number_to_json(3.0).to_string(), "3");
        assert_eq!(number_to_json(0.5).to_string(), "0.5");
        assert_eq!(number_to_json(f64::NAN), Value::Null);
    }

    #[test]
    fn circular_structure_is_a_type_error() {
        let object = object_from_entries(Vec::<(String, JsValue)>::new());
        let o = object.as_object().unwrap().clone();
        o.borrow_mut()
            .properties
            .insert("self".to_string(), object.clone());
        let err = to_json(&object, &mut vec![]).err().unwrap().into_error();
        assert!(matches!(err, JErrorType::TypeError(_)));
    }

    #[test]
    fn skips_undefined_members() {
        let object = object_from_entries([
            ("a", JsValue::Number(1.0)),
            ("b", JsValue::Undefined),
        ]);
        let json = to_json(&object, &mut vec![]).unwrap().unwrap();
        assert_eq!(json.to_string(), r#"{"a":1}"#);
    }
}
