//! Timers on a virtual clock.
//!
//! Nothing fires on its own: the embedder moves the clock with
//! [`TimerQueue::advance`] and due callbacks run in order of due time, then
//! of creation.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use log::{error, warn};

use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::call_function;

pub type TimerId = u32;

struct Timer {
    due: u64,
    interval: Option<u64>,
    callback: JsValue,
    args: Vec<JsValue>,
}

#[derive(Default)]
pub struct TimerQueue {
    now: Cell<u64>,
    next_id: Cell<TimerId>,
    timers: RefCell<BTreeMap<TimerId, Timer>>,
}

impl TimerQueue {
    pub fn new() -> Self {
        TimerQueue::default()
    }

    /// Current clock in milliseconds.
    pub fn now(&self) -> u64 {
        self.now.get()
    }

    fn schedule(&self, callback: JsValue, delay: u64, args: Vec<JsValue>, repeat: bool) -> TimerId {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        if !callback.is_callable() {
            warn!("timer {} was given a {}, it will never run", id, callback.type_of());
        }
        self.timers.borrow_mut().insert(
            id,
            Timer {
                due: self.now().saturating_add(delay),
                interval: if repeat { Some(delay) } else { None },
                callback,
                args,
            },
        );
        id
    }

    pub fn set_timeout(&self, callback: JsValue, delay: u64, args: Vec<JsValue>) -> TimerId {
        self.schedule(callback, delay, args, false)
    }

    pub fn set_interval(&self, callback: JsValue, delay: u64, args: Vec<JsValue>) -> TimerId {
        self.schedule(callback, delay, args, true)
    }

    /// Cancels a timeout or interval. Unknown ids are ignored.
    pub fn clear(&self, id: TimerId) -> bool {
        self.timers.borrow_mut().remove(&id).is_some()
    }

    pub fn pending(&self) -> usize {
        self.timers.borrow().len()
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.timers.borrow().contains_key(&id)
    }

    fn next_due(&self, until: u64) -> Option<(TimerId, u64)> {
        self.timers
            .borrow()
            .iter()
            .filter(|(_, t)| t.due <= until)
            .min_by_key(|(id, t)| (t.due, **id))
            .map(|(id, t)| (*id, t.due))
    }

    /// Moves the clock forward by `ms`, running every callback that becomes
    /// due. Callbacks run with `this` set to `global`; their errors are
    /// logged.
    pub fn advance(&self, ms: u64, global: &JsValue) {
        let until = self.now().saturating_add(ms);
        while let Some((id, due)) = self.next_due(until) {
            self.now.set(due);
            let fired = {
                let mut timers = self.timers.borrow_mut();
                match timers.get_mut(&id) {
                    Some(timer) => match timer.interval {
                        Some(interval) => {
                            timer.due = timer.due.saturating_add(interval.max(1));
                            Some((timer.callback.clone(), timer.args.clone()))
                        }
                        None => timers
                            .remove(&id)
                            .map(|timer| (timer.callback, timer.args)),
                    },
                    None => None,
                }
            };
            if let Some((callback, args)) = fired {
                if !callback.is_callable() {
                    continue;
                }
                if let Err(e) = call_function(&callback, global.clone(), args) {
                    error!("timer {} callback failed: {}", id, e.into_error());
                }
            }
        }
        self.now.set(until);
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::runner::plugin::types::native_closure;

    fn recorder(log: &Rc<RefCell<Vec<String>>>, label: &str) -> JsValue {
        let log = log.clone();
        let label = label.to_string();
        native_closure("recorder", move |_, _| {
            log.borrow_mut().push(label.clone());
            Ok(JsValue::Undefined)
        })
    }

    #[test]
    fn timeouts_fire_in_due_order() {
        let timers = TimerQueue::new();
        let log = Rc::new(RefCell::new(vec![]));
        timers.set_timeout(recorder(&log, "late"), 20, vec![]);
        timers.set_timeout(recorder(&log, "early"), 10, vec![]);
        timers.set_timeout(recorder(&log, "also-early"), 10, vec![]);

        timers.advance(15, &JsValue::Undefined);
        assert_eq!(*log.borrow(), vec!["early", "also-early"]);
        timers.advance(5, &JsValue::Undefined);
        assert_eq!(*log.borrow(), vec!["early", "also-early", "late"]);
        assert_eq!(timers.pending(), 0);
        assert_eq!(timers.now(), 20);
    }

    #[test]
    fn clock_saturates_instead_of_overflowing() {
        let timers = TimerQueue::new();
        let log = Rc::new(RefCell::new(vec![]));
        timers.advance(5, &JsValue::Undefined);
        timers.set_timeout(recorder(&log, "far"), u64::MAX, vec![]);
        timers.advance(u64::MAX, &JsValue::Undefined);
        assert_eq!(timers.now(), u64::MAX);
        assert_eq!(*log.borrow(), vec!["far"]);
    }

    #[test]
    fn intervals_repeat_until_cleared() {
        let timers = TimerQueue::new();
        let log = Rc::new(RefCell::new(vec![]));
        let id = timers.set_interval(recorder(&log, "tick"), 10, vec![]);
        timers.advance(35, &JsValue::Undefined);
        assert_eq!(log.borrow().len(), 3);
        assert!(timers.clear(id));
        timers.advance(100, &JsValue::Undefined);
        assert_eq!(log.borrow().len(), 3);
        assert!(!timers.clear(id));
    }
}
