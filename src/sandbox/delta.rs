//! Record of global keys a sandbox added or overwrote.

use indexmap::IndexMap;

use crate::runner::ds::value::JsValue;

/// `added` holds keys the host did not have when the sandbox first wrote
/// them, with their latest value. `original` holds the host value of keys
/// the sandbox overwrote, captured on the first write only. A key is never
/// in both.
#[derive(Debug, Default, Clone)]
pub struct PropertyDelta {
    added: IndexMap<String, JsValue>,
    original: IndexMap<String, JsValue>,
}

impl PropertyDelta {
    pub fn new() -> Self {
        PropertyDelta::default()
    }

    /// Records a write of `value` to `key`. `host_value` is what the host
    /// global holds for `key` right now, `None` when it has no such key.
    pub fn record_write(&mut self, key: &str, value: &JsValue, host_value: Option<JsValue>) {
        if let Some(entry) = self.added.get_mut(key) {
            *entry = value.clone();
            return;
        }
        match host_value {
            None => {
                self.added.insert(key.to_string(), value.clone());
            }
            Some(previous) => {
                if !self.original.contains_key(key) {
                    self.original.insert(key.to_string(), previous);
                }
            }
        }
    }

    pub fn added(&self) -> &IndexMap<String, JsValue> {
        &self.added
    }

    pub fn original(&self) -> &IndexMap<String, JsValue> {
        &self.original
    }

    pub fn is_added(&self, key: &str) -> bool {
        self.added.contains_key(key)
    }

    /// Forgets captured originals once they are restored. Added keys stay.
    pub fn clear_original(&mut self) {
        self.original.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_keys_are_added_with_latest_value() {
        let mut delta = PropertyDelta::new();
        delta.record_write("foo", &JsValue::Number(1.0), None);
        delta.record_write("foo", &JsValue::Number(2.0), None);
        assert_eq!(delta.added().get("foo"), Some(&JsValue::Number(2.0)));
        assert!(delta.original().is_empty());
    }

    #[test]
    fn original_is_captured_once() {
        let mut delta = PropertyDelta::new();
        delta.record_write("title", &JsValue::from("a"), Some(JsValue::from("host")));
        delta.record_write("title", &JsValue::from("b"), Some(JsValue::from("a")));
        assert_eq!(delta.original().get("title"), Some(&JsValue::from("host")));
        assert!(!delta.is_added("title"));
    }

    #[test]
    fn added_key_stays_added_after_write_through() {
        let mut delta = PropertyDelta::new();
        delta.record_write("legacy", &JsValue::Number(1.0), None);
        // The host now has the key because of write-through.
        delta.record_write("legacy", &JsValue::Number(2.0), Some(JsValue::Number(1.0)));
        assert_eq!(delta.added().get("legacy"), Some(&JsValue::Number(2.0)));
        assert!(delta.original().get("legacy").is_none());
    }

    #[test]
    fn clear_original_keeps_added() {
        let mut delta = PropertyDelta::new();
        delta.record_write("a", &JsValue::Null, None);
        delta.record_write("b", &JsValue::Null, Some(JsValue::Boolean(true)));
        delta.clear_original();
        assert!(delta.is_added("a"));
        assert!(delta.original().is_empty());
    }
}
