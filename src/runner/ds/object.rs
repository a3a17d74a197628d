use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::runner::ds::error::{JErrorType, JsResult};
use crate::runner::ds::function_object::JsFunction;
use crate::runner::ds::value::{number_to_string, JsValue};
use crate::runner::plugin::resolver::PropertyResolver;
use crate::runner::std_lib;

pub type JsObjectType = Rc<RefCell<JsObject>>;

pub enum ObjectKind {
    Ordinary,
    Array(Vec<JsValue>),
    Function(JsFunction),
    /// Every property access is answered by the resolver.
    Exotic(Rc<dyn PropertyResolver>),
}

pub struct JsObject {
    pub properties: IndexMap<String, JsValue>,
    pub prototype: Option<JsObjectType>,
    pub kind: ObjectKind,
}

impl JsObject {
    pub fn new_ordinary() -> Self {
        JsObject {
            properties: IndexMap::new(),
            prototype: None,
            kind: ObjectKind::Ordinary,
        }
    }

    pub fn new_array(items: Vec<JsValue>) -> Self {
        JsObject {
            properties: IndexMap::new(),
            prototype: None,
            kind: ObjectKind::Array(items),
        }
    }

    pub fn new_function(function: JsFunction) -> Self {
        JsObject {
            properties: IndexMap::new(),
            prototype: None,
            kind: ObjectKind::Function(function),
        }
    }

    pub fn new_exotic(resolver: Rc<dyn PropertyResolver>) -> Self {
        JsObject {
            properties: IndexMap::new(),
            prototype: None,
            kind: ObjectKind::Exotic(resolver),
        }
    }

    pub fn with_property(mut self, key: &str, value: JsValue) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }

    pub fn into_ref(self) -> JsObjectType {
        Rc::new(RefCell::new(self))
    }

    pub fn as_function(&self) -> Option<&JsFunction> {
        match &self.kind {
            ObjectKind::Function(f) => Some(f),
            _ => None,
        }
    }
}

/// Builds a plain object from key/value pairs, preserving their order.
pub fn object_from_entries<I, K>(entries: I) -> JsValue
where
    I: IntoIterator<Item = (K, JsValue)>,
    K: Into<String>,
{
    let mut object = JsObject::new_ordinary();
    for (k, v) in entries {
        object.properties.insert(k.into(), v);
    }
    JsValue::from_object(object)
}

pub fn new_array_value(items: Vec<JsValue>) -> JsValue {
    JsValue::from_object(JsObject::new_array(items))
}

/// Converts a computed member key into a property name.
pub fn to_property_key(key: &JsValue) -> String {
    match key {
        JsValue::Number(n) => number_to_string(*n),
        other => other.to_display(),
    }
}

fn exotic_resolver(object: &JsObjectType) -> Option<Rc<dyn PropertyResolver>> {
    match &object.borrow().kind {
        ObjectKind::Exotic(r) => Some(r.clone()),
        _ => None,
    }
}

pub fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    key.parse::<usize>().ok()
}

/// Property read on a value, including built-in methods of primitives.
pub fn get_value_property(target: &JsValue, key: &str) -> JsResult<JsValue> {
    match target {
        JsValue::Undefined | JsValue::Null => Err(JErrorType::TypeError(format!(
            "Cannot read properties of {} (reading '{}')",
            target.to_display(),
            key
        ))
        .into()),
        JsValue::String(s) => Ok(std_lib::string::string_property(s, key)),
        JsValue::Number(_) | JsValue::Boolean(_) => {
            Ok(std_lib::core::primitive_method(key).unwrap_or(JsValue::Undefined))
        }
        JsValue::Object(o) => get_property(o, key),
    }
}

pub fn get_property(object: &JsObjectType, key: &str) -> JsResult<JsValue> {
    if let Some(resolver) = exotic_resolver(object) {
        return resolver.get(key);
    }
    let prototype = {
        let o = object.borrow();
        if let ObjectKind::Array(items) = &o.kind {
            if key == "length" {
                return Ok(JsValue::Number(items.len() as f64));
            }
            if let Some(index) = array_index(key) {
                return Ok(items.get(index).cloned().unwrap_or(JsValue::Undefined));
            }
        }
        if let Some(value) = o.properties.get(key) {
            return Ok(value.clone());
        }
        o.prototype.clone()
    };
    if key == "prototype" {
        if let Some(prototype) = std_lib::core::lazy_prototype(object) {
            return Ok(prototype);
        }
    }
    if let Some(prototype) = prototype {
        let value = get_property(&prototype, key)?;
        if !value.is_undefined() {
            return Ok(value);
        }
    }
    Ok(builtin_method(object, key).unwrap_or(JsValue::Undefined))
}

fn builtin_method(object: &JsObjectType, key: &str) -> Option<JsValue> {
    let (is_array, is_function) = {
        let o = object.borrow();
        (
            matches!(o.kind, ObjectKind::Array(_)),
            matches!(o.kind, ObjectKind::Function(_)),
        )
    };
    if is_array {
        if let Some(method) = std_lib::array::array_method(key) {
            return Some(method);
        }
    }
    if is_function {
        if let Some(value) = std_lib::core::function_property(object, key) {
            return Some(value);
        }
    }
    std_lib::object::object_method(key)
}

/// Property write on a value. Writes to primitives are dropped.
pub fn set_value_property(target: &JsValue, key: &str, value: JsValue) -> JsResult<()> {
    match target {
        JsValue::Undefined | JsValue::Null => Err(JErrorType::TypeError(format!(
            "Cannot set properties of {} (setting '{}')",
            target.to_display(),
            key
        ))
        .into()),
        JsValue::Object(o) => set_property(o, key, value),
        _ => Ok(()),
    }
}

pub fn set_property(object: &JsObjectType, key: &str, value: JsValue) -> JsResult<()> {
    if let Some(resolver) = exotic_resolver(object) {
        return resolver.set(key, value);
    }
    // Computed before borrowing, the value may be this very object.
    let len = if key == "length" { value.to_number() } else { 0.0 };
    let mut o = object.borrow_mut();
    if let ObjectKind::Array(items) = &mut o.kind {
        if key == "length" {
            if len.is_nan() || len < 0.0 || len.fract() != 0.0 {
                return Err(JErrorType::RangeError("Invalid array length".to_string()).into());
            }
            items.resize(len as usize, JsValue::Undefined);
            return Ok(());
        }
        if let Some(index) = array_index(key) {
            if index >= items.len() {
                items.resize(index + 1, JsValue::Undefined);
            }
            items[index] = value;
            return Ok(());
        }
    }
    o.properties.insert(key.to_string(), value);
    Ok(())
}

pub fn has_own_property(object: &JsObjectType, key: &str) -> bool {
    if let Some(resolver) = exotic_resolver(object) {
        return resolver.has(key);
    }
    let o = object.borrow();
    if let ObjectKind::Array(items) = &o.kind {
        if key == "length" || array_index(key).map_or(false, |i| i < items.len()) {
            return true;
        }
    }
    o.properties.contains_key(key)
}

/// Enumerable own keys in insertion order (array indices first).
pub fn own_keys(object: &JsObjectType) -> Vec<String> {
    if let Some(resolver) = exotic_resolver(object) {
        return resolver.keys();
    }
    let o = object.borrow();
    let mut keys = vec![];
    if let ObjectKind::Array(items) = &o.kind {
        keys.extend((0..items.len()).map(|i| i.to_string()));
    }
    keys.extend(o.properties.keys().cloned());
    keys
}
