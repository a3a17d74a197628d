//! Core types for registering built-ins.

use indexmap::IndexMap;

use crate::runner::ds::error::JsResult;
use crate::runner::ds::function_object::JsFunction;
use crate::runner::ds::object::JsObject;
use crate::runner::ds::value::JsValue;

/// Function signature for built-in methods.
/// Native functions receive the `this` value and the arguments.
pub type NativeFn = fn(this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue>;

/// Wrap a native fn into a callable value.
pub fn native_value(name: &str, func: NativeFn) -> JsValue {
    JsValue::from_object(JsObject::new_function(JsFunction::native(name, func)))
}

/// Like [`native_value`] for closures over host state.
pub fn native_closure<F>(name: &str, func: F) -> JsValue
where
    F: Fn(JsValue, Vec<JsValue>) -> JsResult<JsValue> + 'static,
{
    JsValue::from_object(JsObject::new_function(JsFunction::native(name, func)))
}

/// Built-in object definition, e.g. `JSON`, `console` or `Array`.
pub struct BuiltInObject {
    /// Global name of the object.
    pub name: String,

    /// Static methods, in registration order.
    pub methods: IndexMap<String, NativeFn>,

    /// Static properties.
    pub properties: IndexMap<String, JsValue>,

    /// Constructor function, if this object is constructable.
    pub constructor: Option<NativeFn>,
}

impl BuiltInObject {
    /// Create a new built-in object with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        BuiltInObject {
            name: name.into(),
            methods: IndexMap::new(),
            properties: IndexMap::new(),
            constructor: None,
        }
    }

    /// Add a native method.
    pub fn add_method(mut self, name: impl Into<String>, func: NativeFn) -> Self {
        self.methods.insert(name.into(), func);
        self
    }

    /// Add a property.
    pub fn add_property(mut self, name: impl Into<String>, value: JsValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Set the constructor function.
    pub fn with_constructor(mut self, constructor: NativeFn) -> Self {
        self.constructor = Some(constructor);
        self
    }

    /// Materialize a fresh script value. A constructable object becomes a
    /// function carrying the static members as own properties.
    pub fn build(&self) -> JsValue {
        let mut object = match self.constructor {
            Some(constructor) => {
                JsObject::new_function(JsFunction::native_constructor(&self.name, constructor))
            }
            None => JsObject::new_ordinary(),
        };
        for (name, func) in &self.methods {
            object
                .properties
                .insert(name.clone(), native_value(name, *func));
        }
        for (name, value) in &self.properties {
            object.properties.insert(name.clone(), value.clone());
        }
        JsValue::from_object(object)
    }
}
