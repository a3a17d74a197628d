//! The host page: global object, document, events, timers, async tasks and
//! the registries sandboxes and virtual documents are looked up in.
//!
//! Everything a module would normally reach through the ambient browser
//! global lives on a [`HostWindow`]. Scripts evaluated directly on the host
//! see it through an exotic global object; sandboxes virtualize it.

pub mod events;
pub mod tasks;
pub mod timers;

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use log::debug;

use crate::dom::css::{CssScoper, NoopScoper};
use crate::dom::node::Document;
use crate::dom::virtual_document::VirtualDocument;
use crate::fetch::{Fetch, HttpFetch};
use crate::runner::api::run_script;
use crate::runner::ds::error::{JErrorType, JsResult};
use crate::runner::ds::object::{get_value_property, JsObject};
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::resolver::PropertyResolver;
use crate::runner::plugin::types::native_closure;
use crate::sandbox::Sandbox;

use self::events::EventBus;
use self::tasks::TaskQueue;
use self::timers::{TimerId, TimerQueue};

/// Keys that always resolve to the global object itself.
pub const GLOBAL_ALIASES: &[&str] = &["window", "self", "top", "globalThis"];

pub struct HostWindow {
    globals: RefCell<IndexMap<String, JsValue>>,
    resolver: Rc<HostGlobalResolver>,
    global_object: JsValue,
    document: Rc<Document>,
    fetch: RefCell<Rc<dyn Fetch>>,
    timers: TimerQueue,
    events: EventBus,
    tasks: TaskQueue,
    sandboxes: RefCell<HashMap<String, Weak<Sandbox>>>,
    virtual_documents: RefCell<HashMap<String, Rc<VirtualDocument>>>,
    interception_supported: Cell<bool>,
    warned_unsupported: Cell<bool>,
    css_scoper: RefCell<Rc<dyn CssScoper>>,
}

/// Largest delay a timer keeps as given.
pub const MAX_TIMER_DELAY: u64 = i32::MAX as u64;

fn delay_arg(args: &[JsValue]) -> u64 {
    let delay = args.get(1).map(JsValue::to_number).unwrap_or(0.0);
    if delay.is_nan() || delay < 0.0 {
        0
    } else if delay > MAX_TIMER_DELAY as f64 {
        // Browsers store delays as a signed 32 bit value and treat overflow as 1.
        1
    } else {
        delay as u64
    }
}

fn host_of(host: &Weak<HostWindow>) -> JsResult<Rc<HostWindow>> {
    host.upgrade()
        .ok_or_else(|| JErrorType::TypeError("The window has been discarded".to_string()).into())
}

/// Splits `(callback, delay, ...args)` as passed to `setTimeout`.
pub(crate) fn timer_args(args: &[JsValue]) -> (JsValue, u64, Vec<JsValue>) {
    let callback = args.first().cloned().unwrap_or(JsValue::Undefined);
    let rest = args.iter().skip(2).cloned().collect();
    (callback, delay_arg(args), rest)
}

impl HostWindow {
    pub fn new() -> Rc<HostWindow> {
        HostWindow::with_fetch(Rc::new(HttpFetch::default()))
    }

    pub fn with_fetch(fetch: Rc<dyn Fetch>) -> Rc<HostWindow> {
        let host = Rc::new_cyclic(|me: &Weak<HostWindow>| {
            let resolver = Rc::new(HostGlobalResolver { host: me.clone() });
            let global_object = JsValue::from_object(JsObject::new_exotic(resolver.clone()));
            HostWindow {
                globals: RefCell::new(IndexMap::new()),
                resolver,
                global_object,
                document: Document::new(),
                fetch: RefCell::new(fetch),
                timers: TimerQueue::new(),
                events: EventBus::new(),
                tasks: TaskQueue::new(),
                sandboxes: RefCell::new(HashMap::new()),
                virtual_documents: RefCell::new(HashMap::new()),
                interception_supported: Cell::new(true),
                warned_unsupported: Cell::new(false),
                css_scoper: RefCell::new(Rc::new(NoopScoper)),
            }
        });
        host.install_globals();
        host
    }

    fn install_globals(self: &Rc<Self>) {
        for (name, value) in BuiltInRegistry::with_core().globals() {
            self.set_global(&name, value);
        }
        self.set_global("document", self.document.document_object());

        let me = Rc::downgrade(self);
        let natives: Vec<(&str, JsValue)> = vec![
            ("addEventListener", {
                let me = me.clone();
                native_closure("addEventListener", move |_, args| {
                    let host = host_of(&me)?;
                    let event_type = args.first().map(JsValue::to_display).unwrap_or_default();
                    if let Some(listener) = args.get(1).filter(|l| l.is_callable()) {
                        host.add_event_listener(&event_type, listener.clone());
                    }
                    Ok(JsValue::Undefined)
                })
            }),
            ("removeEventListener", {
                let me = me.clone();
                native_closure("removeEventListener", move |_, args| {
                    let host = host_of(&me)?;
                    let event_type = args.first().map(JsValue::to_display).unwrap_or_default();
                    if let Some(listener) = args.get(1) {
                        host.remove_event_listener(&event_type, listener);
                    }
                    Ok(JsValue::Undefined)
                })
            }),
            ("dispatchEvent", {
                let me = me.clone();
                native_closure("dispatchEvent", move |_, args| {
                    let host = host_of(&me)?;
                    let event = args.first().cloned().unwrap_or(JsValue::Undefined);
                    let event_type = get_value_property(&event, "type")?.to_display();
                    host.dispatch_event(&event_type, event);
                    Ok(JsValue::Boolean(true))
                })
            }),
            ("setTimeout", {
                let me = me.clone();
                native_closure("setTimeout", move |_, args| {
                    let (callback, delay, rest) = timer_args(&args);
                    let id = host_of(&me)?.set_timeout(callback, delay, rest);
                    Ok(JsValue::Number(id as f64))
                })
            }),
            ("setInterval", {
                let me = me.clone();
                native_closure("setInterval", move |_, args| {
                    let (callback, delay, rest) = timer_args(&args);
                    let id = host_of(&me)?.set_interval(callback, delay, rest);
                    Ok(JsValue::Number(id as f64))
                })
            }),
            ("clearTimeout", {
                let me = me.clone();
                native_closure("clearTimeout", move |_, args| {
                    if let Some(id) = args.first() {
                        host_of(&me)?.clear_timer(id.to_number() as TimerId);
                    }
                    Ok(JsValue::Undefined)
                })
            }),
            ("clearInterval", {
                let me = me.clone();
                native_closure("clearInterval", move |_, args| {
                    if let Some(id) = args.first() {
                        host_of(&me)?.clear_timer(id.to_number() as TimerId);
                    }
                    Ok(JsValue::Undefined)
                })
            }),
        ];
        for (name, value) in natives {
            self.set_global(name, value);
        }
    }

    // ── global object ──

    /// The script value of the host global object.
    pub fn global_object(&self) -> JsValue {
        self.global_object.clone()
    }

    pub fn resolver(&self) -> Rc<dyn PropertyResolver> {
        self.resolver.clone()
    }

    pub fn get_global(&self, key: &str) -> JsValue {
        if GLOBAL_ALIASES.contains(&key) {
            return self.global_object();
        }
        self.globals
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or(JsValue::Undefined)
    }

    pub fn set_global(&self, key: &str, value: JsValue) {
        self.globals.borrow_mut().insert(key.to_string(), value);
    }

    /// Own key check. A key set to `undefined` still counts.
    pub fn has_global(&self, key: &str) -> bool {
        GLOBAL_ALIASES.contains(&key) || self.globals.borrow().contains_key(key)
    }

    pub fn delete_global(&self, key: &str) -> Option<JsValue> {
        self.globals.borrow_mut().shift_remove(key)
    }

    pub fn global_keys(&self) -> Vec<String> {
        self.globals.borrow().keys().cloned().collect()
    }

    /// Runs a script directly on the host global object.
    pub fn eval(&self, source: &str) -> Result<JsValue, JErrorType> {
        run_script(source, self.resolver(), self.global_object())
    }

    // ── document ──

    pub fn document(&self) -> &Rc<Document> {
        &self.document
    }

    pub fn virtual_document(&self, name_key: &str) -> Option<Rc<VirtualDocument>> {
        self.virtual_documents.borrow().get(name_key).cloned()
    }

    pub(crate) fn cache_virtual_document(&self, name_key: &str, document: Rc<VirtualDocument>) {
        self.virtual_documents
            .borrow_mut()
            .insert(name_key.to_string(), document);
    }

    pub fn css_scoper(&self) -> Rc<dyn CssScoper> {
        self.css_scoper.borrow().clone()
    }

    pub fn set_css_scoper(&self, scoper: Rc<dyn CssScoper>) {
        *self.css_scoper.borrow_mut() = scoper;
    }

    // ── fetch ──

    pub fn fetch(&self) -> Rc<dyn Fetch> {
        self.fetch.borrow().clone()
    }

    pub fn set_fetch(&self, fetch: Rc<dyn Fetch>) {
        *self.fetch.borrow_mut() = fetch;
    }

    // ── timers ──

    pub fn set_timeout(&self, callback: JsValue, delay: u64, args: Vec<JsValue>) -> TimerId {
        self.timers.set_timeout(callback, delay, args)
    }

    pub fn set_interval(&self, callback: JsValue, delay: u64, args: Vec<JsValue>) -> TimerId {
        self.timers.set_interval(callback, delay, args)
    }

    pub fn clear_timer(&self, id: TimerId) -> bool {
        self.timers.clear(id)
    }

    pub fn is_timer_pending(&self, id: TimerId) -> bool {
        self.timers.is_pending(id)
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    /// Moves the virtual clock forward, firing due timers.
    pub fn advance(&self, ms: u64) {
        self.timers.advance(ms, &self.global_object);
    }

    // ── events ──

    pub fn add_event_listener(&self, event_type: &str, listener: JsValue) {
        self.events.add(event_type, listener);
    }

    pub fn remove_event_listener(&self, event_type: &str, listener: &JsValue) {
        self.events.remove(event_type, listener);
    }

    /// Returns how many listeners were called.
    pub fn dispatch_event(&self, event_type: &str, event: JsValue) -> usize {
        debug!("dispatching `{}` on window", event_type);
        self.events.dispatch(event_type, &event, &self.global_object)
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.events.count(event_type)
    }

    // ── tasks ──

    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + 'static,
    {
        self.tasks.spawn(task);
    }

    /// Waits for every spawned task, and the tasks those spawn.
    pub async fn settle(&self) {
        self.tasks.settle().await;
    }

    // ── sandboxes ──

    pub(crate) fn register_sandbox(&self, name_key: &str, sandbox: &Rc<Sandbox>) {
        let mut sandboxes = self.sandboxes.borrow_mut();
        sandboxes.retain(|_, weak| weak.strong_count() > 0);
        sandboxes.insert(name_key.to_string(), Rc::downgrade(sandbox));
    }

    /// Number of registry entries, live or not.
    pub fn registered_sandboxes(&self) -> usize {
        self.sandboxes.borrow().len()
    }

    /// The live sandbox registered for a module name and key.
    pub fn sandbox(&self, name: &str, key: &str) -> Option<Rc<Sandbox>> {
        self.sandboxes
            .borrow()
            .get(&name_key(name, key))
            .and_then(Weak::upgrade)
    }

    // ── capabilities ──

    pub fn interception_supported(&self) -> bool {
        self.interception_supported.get()
    }

    pub fn set_interception_supported(&self, supported: bool) {
        self.interception_supported.set(supported);
    }

    /// True the first time it is called on this host.
    pub(crate) fn first_unsupported_warning(&self) -> bool {
        !self.warned_unsupported.replace(true)
    }
}

/// Registry key for a module instance.
pub fn name_key(name: &str, key: &str) -> String {
    format!("{}_{}", name, key)
}

/// The host global object as seen by scripts.
pub struct HostGlobalResolver {
    host: Weak<HostWindow>,
}

impl PropertyResolver for HostGlobalResolver {
    fn get(&self, key: &str) -> JsResult<JsValue> {
        Ok(host_of(&self.host)?.get_global(key))
    }

    fn set(&self, key: &str, value: JsValue) -> JsResult<()> {
        host_of(&self.host)?.set_global(key, value);
        Ok(())
    }

    fn has(&self, key: &str) -> bool {
        self.host
            .upgrade()
            .map_or(false, |host| host.has_global(key))
    }

    fn keys(&self) -> Vec<String> {
        self.host
            .upgrade()
            .map(|host| host.global_keys())
            .unwrap_or_default()
    }

    fn name(&self) -> &str {
        "window"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_on_the_host_write_host_globals() {
        let host = HostWindow::new();
        host.eval("var answer = 42; window.other = answer + 1;").unwrap();
        assert_eq!(host.get_global("answer"), JsValue::Number(42.0));
        assert_eq!(host.get_global("other"), JsValue::Number(43.0));
        assert_eq!(
            host.eval("window === self && top === globalThis").unwrap(),
            JsValue::Boolean(true)
        );
    }

    #[test]
    fn standard_globals_are_installed() {
        let host = HostWindow::new();
        for name in ["Object", "Array", "JSON", "console", "parseInt", "document", "setTimeout"] {
            assert!(host.has_global(name), "{} missing", name);
        }
        assert_eq!(
            host.eval("typeof Date").unwrap(),
            JsValue::from("undefined")
        );
    }

    #[test]
    fn script_timers_and_events() {
        let host = HostWindow::new();
        host.eval(
            "var fired = 0;
             var id = setTimeout(function (n) { fired += n; }, 50, 2);
             setTimeout(function () { fired += 100; }, 10);
             clearTimeout(id);
             addEventListener('ping', function (e) { fired += e.detail; });",
        )
        .unwrap();
        host.advance(100);
        assert_eq!(host.get_global("fired"), JsValue::Number(100.0));

        host.eval("dispatchEvent({ type: 'ping', detail: 5 })").unwrap();
        assert_eq!(host.get_global("fired"), JsValue::Number(105.0));
        assert_eq!(host.listener_count("ping"), 1);
    }

    #[test]
    fn unsupported_warning_is_reported_once() {
        let host = HostWindow::new();
        assert!(host.first_unsupported_warning());
        assert!(!host.first_unsupported_warning());
    }
}
