//! Error built-in objects.
//!
//! Provides Error, TypeError, ReferenceError, SyntaxError and RangeError
//! constructors. Instances are plain `{ name, message }` objects, the same
//! shape a `catch` clause sees for runtime errors.

use crate::runner::ds::error::JsResult;
use crate::runner::ds::object::object_from_entries;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;

/// Register all error types with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    registry.register_constructor("Error", error_constructor);
    registry.register_constructor("TypeError", type_error_constructor);
    registry.register_constructor("ReferenceError", reference_error_constructor);
    registry.register_constructor("SyntaxError", syntax_error_constructor);
    registry.register_constructor("RangeError", range_error_constructor);
}

/// Always builds a fresh object, so `Error("x")` and `new Error("x")` agree.
fn create_error(name: &str, args: Vec<JsValue>) -> JsResult<JsValue> {
    let message = match args.first() {
        Some(JsValue::Undefined) | None => String::new(),
        Some(m) => m.to_display(),
    };
    Ok(object_from_entries([
        ("name", JsValue::from(name)),
        ("message", JsValue::String(message)),
    ]))
}

fn error_constructor(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    create_error("Error", args)
}

fn type_error_constructor(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    create_error("TypeError", args)
}

fn reference_error_constructor(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    create_error("ReferenceError", args)
}

fn syntax_error_constructor(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    create_error("SyntaxError", args)
}

fn range_error_constructor(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    create_error("RangeError", args)
}
