//! Window-level event listeners.

use std::cell::RefCell;

use indexmap::IndexMap;
use log::error;

use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::call_function;

#[derive(Default)]
pub struct EventBus {
    listeners: RefCell<IndexMap<String, Vec<JsValue>>>,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus::default()
    }

    /// Adding the same listener twice for one type is a no-op.
    pub fn add(&self, event_type: &str, listener: JsValue) {
        let mut listeners = self.listeners.borrow_mut();
        let entry = listeners.entry(event_type.to_string()).or_default();
        if !entry.iter().any(|l| l.strict_equals(&listener)) {
            entry.push(listener);
        }
    }

    pub fn remove(&self, event_type: &str, listener: &JsValue) {
        if let Some(entry) = self.listeners.borrow_mut().get_mut(event_type) {
            entry.retain(|l| !l.strict_equals(listener));
        }
    }

    pub fn count(&self, event_type: &str) -> usize {
        self.listeners
            .borrow()
            .get(event_type)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Calls every listener registered for `event_type` at the time of the
    /// call. A failing listener is logged and does not stop the others.
    pub fn dispatch(&self, event_type: &str, event: &JsValue, this: &JsValue) -> usize {
        let snapshot = self
            .listeners
            .borrow()
            .get(event_type)
            .cloned()
            .unwrap_or_default();
        for listener in &snapshot {
            if let Err(e) = call_function(listener, this.clone(), vec![event.clone()]) {
                error!("listener for `{}` failed: {}", event_type, e.into_error());
            }
        }
        snapshot.len()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::runner::plugin::types::native_closure;

    #[test]
    fn listeners_are_deduplicated_and_removable() {
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let listener = native_closure("listener", move |_, _| {
            counter.set(counter.get() + 1);
            Ok(JsValue::Undefined)
        });
        bus.add("ready", listener.clone());
        bus.add("ready", listener.clone());
        assert_eq!(bus.count("ready"), 1);

        bus.dispatch("ready", &JsValue::Undefined, &JsValue::Undefined);
        assert_eq!(hits.get(), 1);

        bus.remove("ready", &listener);
        assert_eq!(bus.dispatch("ready", &JsValue::Undefined, &JsValue::Undefined), 0);
        assert_eq!(hits.get(), 1);
    }
}
