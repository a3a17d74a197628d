//! The virtual global object module code runs against.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use log::trace;

use crate::host::timers::TimerId;
use crate::host::{timer_args, HostWindow, GLOBAL_ALIASES};
use crate::runner::ds::error::{JErrorType, JsResult};
use crate::runner::ds::function_object::JsFunction;
use crate::runner::ds::object::{own_keys, JsObject};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::{function_name, is_constructor};
use crate::runner::plugin::resolver::PropertyResolver;
use crate::runner::plugin::types::native_closure;

use super::delta::PropertyDelta;
use super::DependencyBag;

lazy_static! {
    /// Host constructors handed out unbound.
    pub static ref CONSTRUCTOR_LIST: Vec<&'static str> = vec![
        "Array",
        "Object",
        "String",
        "Boolean",
        "Function",
        "Date",
        "Proxy",
        "Set",
        "Map",
        "Symbol",
        "Promise",
        "RegExp",
        "WeakMap",
        "WeakSet",
        "Error",
        "HTMLElement",
        "HTMLIFrameElement",
    ];
    /// Plain host functions that are snapshotted with the constructors.
    pub static ref NON_CONSTRUCTOR_LIST: Vec<&'static str> = vec![
        "isNaN",
        "parseInt",
        "parseFloat",
        "isFinite",
        "encodeURIComponent",
        "decodeURIComponent",
    ];
}

fn in_allow_list(key: &str) -> bool {
    CONSTRUCTOR_LIST.contains(&key) || NON_CONSTRUCTOR_LIST.contains(&key)
}

/// Whether a host value has to be handed out as is rather than bound.
fn is_host_constructor(value: &JsValue) -> bool {
    let name = function_name(value);
    if CONSTRUCTOR_LIST.contains(&name.as_str()) {
        return true;
    }
    if NON_CONSTRUCTOR_LIST.contains(&name.as_str()) || name == "clearTimeout" {
        return false;
    }
    is_constructor(value)
}

/// Listeners and timers a sandbox registered on the host, released on
/// teardown.
#[derive(Default)]
pub struct InstanceRegistry {
    pub listeners: IndexMap<String, Vec<JsValue>>,
    pub timeouts: Vec<TimerId>,
    pub intervals: Vec<TimerId>,
}

pub(crate) struct ContextConfig {
    pub module: String,
    pub multi_mode: bool,
    pub injections: DependencyBag,
    pub delta: Rc<RefCell<PropertyDelta>>,
    pub registry: Rc<RefCell<InstanceRegistry>>,
    pub document: JsValue,
}

pub struct VirtualGlobal {
    me: Weak<VirtualGlobal>,
    host: Weak<HostWindow>,
    module: String,
    multi_mode: bool,
    local: RefCell<IndexMap<String, JsValue>>,
    injections: DependencyBag,
    allow_list: IndexMap<String, JsValue>,
    delta: Rc<RefCell<PropertyDelta>>,
    /// Bound wrappers of host functions, with the host value they wrap.
    bound: RefCell<HashMap<String, (JsValue, JsValue)>>,
    handle: JsValue,
    disposed: Cell<bool>,
}

fn host_of(host: &Weak<HostWindow>) -> JsResult<Rc<HostWindow>> {
    host.upgrade()
        .ok_or_else(|| JErrorType::TypeError("The window has been discarded".to_string()).into())
}

impl VirtualGlobal {
    pub(crate) fn new(host: &Rc<HostWindow>, config: ContextConfig) -> Rc<VirtualGlobal> {
        let allow_list = CONSTRUCTOR_LIST
            .iter()
            .chain(NON_CONSTRUCTOR_LIST.iter())
            .filter(|name| host.has_global(name))
            .map(|name| (name.to_string(), host.get_global(name)))
            .collect();

        let context = Rc::new_cyclic(|me: &Weak<VirtualGlobal>| VirtualGlobal {
            me: me.clone(),
            host: Rc::downgrade(host),
            module: config.module,
            multi_mode: config.multi_mode,
            local: RefCell::new(IndexMap::new()),
            injections: config.injections,
            allow_list,
            delta: config.delta,
            bound: RefCell::new(HashMap::new()),
            handle: JsValue::from_object(JsObject::new_exotic(Rc::new(GlobalHandle {
                context: me.clone(),
            }))),
            disposed: Cell::new(false),
        });
        context.install_hijacks(host, &config.registry, config.document);
        context
    }

    fn install_hijacks(
        &self,
        host: &Rc<HostWindow>,
        registry: &Rc<RefCell<InstanceRegistry>>,
        document: JsValue,
    ) {
        let mut local = self.local.borrow_mut();
        let weak_host = Rc::downgrade(host);

        let (h, r) = (weak_host.clone(), registry.clone());
        local.insert(
            "addEventListener".to_string(),
            native_closure("addEventListener", move |_, args| {
                let host = host_of(&h)?;
                let event_type = args.first().map(JsValue::to_display).unwrap_or_default();
                if let Some(listener) = args.get(1).filter(|l| l.is_callable()) {
                    r.borrow_mut()
                        .listeners
                        .entry(event_type.clone())
                        .or_default()
                        .push(listener.clone());
                    host.add_event_listener(&event_type, listener.clone());
                }
                Ok(JsValue::Undefined)
            }),
        );

        let (h, r) = (weak_host.clone(), registry.clone());
        local.insert(
            "removeEventListener".to_string(),
            native_closure("removeEventListener", move |_, args| {
                let host = host_of(&h)?;
                let event_type = args.first().map(JsValue::to_display).unwrap_or_default();
                if let Some(listener) = args.get(1) {
                    if let Some(listeners) = r.borrow_mut().listeners.get_mut(&event_type) {
                        if let Some(index) = listeners.iter().position(|l| l.strict_equals(listener)) {
                            listeners.remove(index);
                        }
                    }
                    host.remove_event_listener(&event_type, listener);
                }
                Ok(JsValue::Undefined)
            }),
        );

        let (h, r) = (weak_host.clone(), registry.clone());
        local.insert(
            "setTimeout".to_string(),
            native_closure("setTimeout", move |_, args| {
                let (callback, delay, rest) = timer_args(&args);
                let id = host_of(&h)?.set_timeout(callback, delay, rest);
                r.borrow_mut().timeouts.push(id);
                Ok(JsValue::Number(id as f64))
            }),
        );

        let (h, r) = (weak_host, registry.clone());
        local.insert(
            "setInterval".to_string(),
            native_closure("setInterval", move |_, args| {
                let (callback, delay, rest) = timer_args(&args);
                let id = host_of(&h)?.set_interval(callback, delay, rest);
                r.borrow_mut().intervals.push(id);
                Ok(JsValue::Number(id as f64))
            }),
        );

        local.insert("document".to_string(), document);
    }

    /// The object scripts see as `window`, `self`, `top` and `globalThis`.
    pub fn handle(&self) -> JsValue {
        self.handle.clone()
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// Drops everything the context holds so script closures stored in it
    /// no longer keep it alive.
    pub fn dispose(&self) {
        self.disposed.set(true);
        self.local.borrow_mut().clear();
        self.bound.borrow_mut().clear();
    }

    fn local_value(&self, key: &str) -> Option<JsValue> {
        self.local
            .borrow()
            .get(key)
            .filter(|v| !v.is_undefined())
            .cloned()
    }

    /// `hasOwnProperty` as module code sees it: true when the sandbox holds
    /// a truthy value for the key or the host has it.
    fn has_own_property_fn(&self) -> JsValue {
        let host = self.host.clone();
        let context = self.me.clone();
        native_closure("hasOwnProperty", move |_, args| {
            let key = args.first().map(JsValue::to_display).unwrap_or_default();
            let local = context
                .upgrade()
                .and_then(|c| c.local_value(&key))
                .map_or(false, |v| v.truthy());
            Ok(JsValue::Boolean(
                local || host.upgrade().map_or(false, |h| h.has_global(&key)),
            ))
        })
    }

    /// Host functions come back bound to the host global with their own
    /// properties copied over. The wrapper is reused until the host value
    /// changes.
    fn bind_host_function(&self, host: &HostWindow, key: &str, value: JsValue) -> JsValue {
        if let Some((wrapped, bound)) = self.bound.borrow().get(key) {
            if wrapped.strict_equals(&value) {
                return bound.clone();
            }
        }
        let target = match &value {
            JsValue::Object(o) => o.clone(),
            _ => return value,
        };
        let mut wrapper = JsObject::new_function(JsFunction::Bound {
            target: target.clone(),
            this: host.global_object(),
            args: vec![],
        });
        for name in own_keys(&target) {
            if let Some(property) = target.borrow().properties.get(&name) {
                wrapper.properties.insert(name.clone(), property.clone());
            }
        }
        let bound = JsValue::from_object(wrapper);
        trace!("module `{}` bound host function `{}`", self.module, key);
        self.bound
            .borrow_mut()
            .insert(key.to_string(), (value, bound.clone()));
        bound
    }
}

impl PropertyResolver for VirtualGlobal {
    fn get(&self, key: &str) -> JsResult<JsValue> {
        if let Some(value) = self.local_value(key) {
            return Ok(value);
        }
        if GLOBAL_ALIASES.contains(&key) {
            return Ok(self.handle());
        }
        if key == "hasOwnProperty" {
            return Ok(self.has_own_property_fn());
        }
        if let Some(value) = self.injections.get(key).filter(|v| !v.is_undefined()) {
            return Ok(value.clone());
        }
        if let Some(value) = self.allow_list.get(key) {
            return Ok(value.clone());
        }
        let host = host_of(&self.host)?;
        let value = host.get_global(key);
        if value.is_callable() && !is_host_constructor(&value) {
            return Ok(self.bind_host_function(&host, key, value));
        }
        Ok(value)
    }

    fn set(&self, key: &str, value: JsValue) -> JsResult<()> {
        let host = host_of(&self.host)?;
        let host_value = if host.has_global(key) {
            Some(host.get_global(key))
        } else {
            None
        };
        self.delta.borrow_mut().record_write(key, &value, host_value);
        if !self.multi_mode {
            host.set_global(key, value.clone());
        }
        self.local.borrow_mut().insert(key.to_string(), value);
        Ok(())
    }

    fn has(&self, key: &str) -> bool {
        if in_allow_list(key) || GLOBAL_ALIASES.contains(&key) || key == "hasOwnProperty" {
            return true;
        }
        if self.local.borrow().contains_key(key) {
            return true;
        }
        if self.injections.get(key).map_or(false, |v| !v.is_undefined()) {
            return true;
        }
        self.host.upgrade().map_or(false, |h| h.has_global(key))
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.local.borrow().keys().cloned().collect();
        if let Some(host) = self.host.upgrade() {
            for key in host.global_keys() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    fn name(&self) -> &str {
        &self.module
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Resolver behind the `window` value module code sees.
struct GlobalHandle {
    context: Weak<VirtualGlobal>,
}

impl GlobalHandle {
    fn context(&self) -> JsResult<Rc<VirtualGlobal>> {
        self.context.upgrade().ok_or_else(|| {
            JErrorType::TypeError("The sandbox context has been cleared".to_string()).into()
        })
    }
}

impl PropertyResolver for GlobalHandle {
    fn get(&self, key: &str) -> JsResult<JsValue> {
        self.context()?.get(key)
    }

    fn set(&self, key: &str, value: JsValue) -> JsResult<()> {
        self.context()?.set(key, value)
    }

    fn has(&self, key: &str) -> bool {
        self.context().map_or(false, |c| c.has(key))
    }

    fn keys(&self) -> Vec<String> {
        self.context().map(|c| c.keys()).unwrap_or_default()
    }

    fn name(&self) -> &str {
        "window"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
