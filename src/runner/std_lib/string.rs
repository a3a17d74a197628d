//! String built-in.
//!
//! Provides the `String` conversion function and the methods reachable on
//! string values. Indices count characters.

use crate::runner::ds::error::JsResult;
use crate::runner::ds::object::{array_index, new_array_value};
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::native_value;

use super::{arg, relative_index};

/// Register the String built-in with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    registry.register_constructor("String", string_constructor);
}

fn string_constructor(_this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    Ok(JsValue::String(match args.first() {
        Some(v) => v.to_display(),
        None => String::new(),
    }))
}

/// Property read on a string value.
pub fn string_property(s: &str, key: &str) -> JsValue {
    if key == "length" {
        return JsValue::Number(s.chars().count() as f64);
    }
    if let Some(index) = array_index(key) {
        return match s.chars().nth(index) {
            Some(c) => JsValue::String(c.to_string()),
            None => JsValue::Undefined,
        };
    }
    let method: fn(JsValue, Vec<JsValue>) -> JsResult<JsValue> = match key {
        "indexOf" => string_index_of,
        "slice" => string_slice,
        "substring" => string_substring,
        "toUpperCase" => string_to_upper_case,
        "toLowerCase" => string_to_lower_case,
        "trim" => string_trim,
        "split" => string_split,
        "startsWith" => string_starts_with,
        "endsWith" => string_ends_with,
        "includes" => string_includes,
        "charAt" => string_char_at,
        "toString" | "valueOf" => string_value_of,
        _ => return JsValue::Undefined,
    };
    native_value(key, method)
}

fn chars_of(value: &JsValue) -> Vec<char> {
    value.to_display().chars().collect()
}

fn find_from(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(from.min(haystack.len()));
    }
    if needle.len() > haystack.len() {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&i| haystack[i..i + needle.len()] == *needle)
}

/// String.prototype.indexOf
fn string_index_of(this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let haystack = chars_of(&this);
    let needle = chars_of(&arg(&args, 0));
    let from = relative_index(&arg(&args, 1), haystack.len(), 0);
    Ok(JsValue::Number(
        find_from(&haystack, &needle, from).map_or(-1.0, |i| i as f64),
    ))
}

/// String.prototype.slice
fn string_slice(this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let chars = chars_of(&this);
    let start = relative_index(&arg(&args, 0), chars.len(), 0);
    let end = relative_index(&arg(&args, 1), chars.len(), chars.len());
    Ok(JsValue::String(if start < end {
        chars[start..end].iter().collect()
    } else {
        String::new()
    }))
}

/// String.prototype.substring: negatives clamp to zero and the bounds swap.
fn string_substring(this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let chars = chars_of(&this);
    let clamp = |v: JsValue, default: usize| -> usize {
        if v.is_undefined() {
            return default;
        }
        let n = v.to_number();
        if n.is_nan() || n < 0.0 {
            0
        } else {
            (n as usize).min(chars.len())
        }
    };
    let a = clamp(arg(&args, 0), 0);
    let b = clamp(arg(&args, 1), chars.len());
    let (start, end) = if a <= b { (a, b) } else { (b, a) };
    Ok(JsValue::String(chars[start..end].iter().collect()))
}

fn string_to_upper_case(this: JsValue, _args: Vec<JsValue>) -> JsResult<JsValue> {
    Ok(JsValue::String(this.to_display().to_uppercase()))
}

fn string_to_lower_case(this: JsValue, _args: Vec<JsValue>) -> JsResult<JsValue> {
    Ok(JsValue::String(this.to_display().to_lowercase()))
}

fn string_trim(this: JsValue, _args: Vec<JsValue>) -> JsResult<JsValue> {
    Ok(JsValue::String(this.to_display().trim().to_string()))
}

/// String.prototype.split
fn string_split(this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let s = this.to_display();
    let limit = match arg(&args, 1) {
        JsValue::Undefined => usize::MAX,
        l => l.to_number().max(0.0) as usize,
    };
    let parts: Vec<JsValue> = match arg(&args, 0) {
        JsValue::Undefined => vec![JsValue::String(s)],
        separator => {
            let separator = separator.to_display();
            if separator.is_empty() {
                s.chars().map(|c| JsValue::String(c.to_string())).collect()
            } else {
                s.split(separator.as_str()).map(JsValue::from).collect()
            }
        }
    };
    Ok(new_array_value(parts.into_iter().take(limit).collect()))
}

fn string_starts_with(this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let chars = chars_of(&this);
    let needle = chars_of(&arg(&args, 0));
    let position = relative_index(&arg(&args, 1), chars.len(), 0);
    Ok(JsValue::Boolean(chars[position..].starts_with(&needle)))
}

fn string_ends_with(this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let chars = chars_of(&this);
    let needle = chars_of(&arg(&args, 0));
    let end = relative_index(&arg(&args, 1), chars.len(), chars.len());
    Ok(JsValue::Boolean(chars[..end].ends_with(&needle)))
}

fn string_includes(this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let haystack = chars_of(&this);
    let needle = chars_of(&arg(&args, 0));
    let from = relative_index(&arg(&args, 1), haystack.len(), 0);
    Ok(JsValue::Boolean(find_from(&haystack, &needle, from).is_some()))
}

fn string_char_at(this: JsValue, args: Vec<JsValue>) -> JsResult<JsValue> {
    let index = arg(&args, 0).to_number();
    let index = if index.is_nan() { 0.0 } else { index.trunc() };
    let c = if index < 0.0 {
        None
    } else {
        this.to_display().chars().nth(index as usize)
    };
    Ok(JsValue::String(c.map(String::from).unwrap_or_default()))
}

fn string_value_of(this: JsValue, _args: Vec<JsValue>) -> JsResult<JsValue> {
    Ok(JsValue::String(this.to_display()))
}
