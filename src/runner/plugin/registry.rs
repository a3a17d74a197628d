//! Built-in registry.
//!
//! Collects the standard globals once so every host can materialize its own
//! fresh copies of them.

use indexmap::IndexMap;

use crate::runner::ds::function_object::JsFunction;
use crate::runner::ds::object::JsObject;
use crate::runner::ds::value::JsValue;
use crate::runner::std_lib::register_core_builtins;

use super::types::{native_value, BuiltInObject, NativeFn};

enum BuiltIn {
    Object(BuiltInObject),
    Function { func: NativeFn, constructor: bool },
}

/// Registry for built-in globals, in registration order.
pub struct BuiltInRegistry {
    entries: IndexMap<String, BuiltIn>,
}

impl BuiltInRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        BuiltInRegistry {
            entries: IndexMap::new(),
        }
    }

    /// Create a registry with the standard globals.
    pub fn with_core() -> Self {
        let mut registry = Self::new();
        register_core_builtins(&mut registry);
        registry
    }

    /// Register a built-in object.
    pub fn register_object(&mut self, obj: BuiltInObject) {
        self.entries.insert(obj.name.clone(), BuiltIn::Object(obj));
    }

    /// Register a global function such as `parseInt`.
    pub fn register_function(&mut self, name: &str, func: NativeFn) {
        self.entries.insert(
            name.to_string(),
            BuiltIn::Function {
                func,
                constructor: false,
            },
        );
    }

    /// Register a global function that `new` may be applied to.
    pub fn register_constructor(&mut self, name: &str, func: NativeFn) {
        self.entries.insert(
            name.to_string(),
            BuiltIn::Function {
                func,
                constructor: true,
            },
        );
    }

    /// Get a registered object by name.
    pub fn get_object(&self, name: &str) -> Option<&BuiltInObject> {
        match self.entries.get(name) {
            Some(BuiltIn::Object(obj)) => Some(obj),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Fresh values for every registered global.
    pub fn globals(&self) -> Vec<(String, JsValue)> {
        self.entries
            .iter()
            .map(|(name, entry)| {
                let value = match entry {
                    BuiltIn::Object(obj) => obj.build(),
                    BuiltIn::Function {
                        func,
                        constructor: false,
                    } => native_value(name, *func),
                    BuiltIn::Function {
                        func,
                        constructor: true,
                    } => JsValue::from_object(JsObject::new_function(
                        JsFunction::native_constructor(name, *func),
                    )),
                };
                (name.clone(), value)
            })
            .collect()
    }
}

impl Default for BuiltInRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_registry_lists_standard_globals() {
        let registry = BuiltInRegistry::with_core();
        for name in ["Object", "Array", "JSON", "console", "parseInt", "Error", "Math"] {
            assert!(registry.contains(name), "{} missing", name);
        }
        assert!(registry.get_object("JSON").is_some());
        assert!(registry.get_object("parseInt").is_none());
    }

    #[test]
    fn globals_are_fresh_per_call() {
        let registry = BuiltInRegistry::with_core();
        let first = registry.globals();
        let second = registry.globals();
        let json_a = &first.iter().find(|(n, _)| n == "JSON").unwrap().1;
        let json_b = &second.iter().find(|(n, _)| n == "JSON").unwrap().1;
        assert!(!json_a.strict_equals(json_b));
    }
}
