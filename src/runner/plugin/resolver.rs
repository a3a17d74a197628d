//! Resolver trait for objects whose properties are computed on access.
//!
//! A resolver backs the outermost scope of a script run (so a sandbox can
//! hand out its own global object) and every exotic object: host windows,
//! documents, DOM elements and the virtual head/body containers.

use std::any::Any;

use crate::runner::ds::error::JsResult;
use crate::runner::ds::value::JsValue;

pub trait PropertyResolver {
    /// Read a property. Missing properties read as `undefined`.
    fn get(&self, key: &str) -> JsResult<JsValue>;

    /// Write a property.
    fn set(&self, key: &str, value: JsValue) -> JsResult<()>;

    /// Does the resolver answer for `key`?
    ///
    /// Free identifiers only resolve through the resolver when this returns
    /// `true`; otherwise the lookup is a `ReferenceError`.
    fn has(&self, key: &str) -> bool;

    /// Enumerable keys, used by `Object.keys` and `JSON.stringify`.
    fn keys(&self) -> Vec<String> {
        vec![]
    }

    /// Human-readable name for this resolver (for debugging/logging).
    fn name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}
