//! Standard library built-in objects.
//!
//! This module contains the built-in globals (`console`, `Object`, `Array`,
//! `JSON`, `Math`, the error constructors and the global functions) plus the
//! methods reachable on primitives, arrays and functions.

pub mod array;
pub mod console;
pub mod core;
pub mod error;
pub mod json;
pub mod math;
pub mod object;
pub mod string;

pub use self::core::register_core_builtins;

use crate::runner::ds::value::JsValue;

/// Argument at `index`, `undefined` when missing.
pub fn arg(args: &[JsValue], index: usize) -> JsValue {
    args.get(index).cloned().unwrap_or(JsValue::Undefined)
}

/// Relative index as used by `slice`: negatives count from the end, the
/// result is clamped to `0..=len`.
pub fn relative_index(value: &JsValue, len: usize, default: usize) -> usize {
    if value.is_undefined() {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}
