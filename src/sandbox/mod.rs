//! Per-module execution contexts.
//!
//! A [`Sandbox`] runs module code against its own [`VirtualGlobal`]: reads
//! fall back to the host window, writes stay local (and are tracked in a
//! [`PropertyDelta`]) unless multi-mode is off. [`Sandbox::clear`] undoes
//! what the module left on the host.

pub mod context;
pub mod delta;

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use log::{debug, error, warn};
use uuid::Uuid;

use crate::dom::node::NodeId;
use crate::dom::virtual_document::VirtualDocument;
use crate::error::SandboxError;
use crate::host::{name_key, HostWindow};
use crate::runner::api::run_program;
use crate::runner::api::parse_script;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::resolver::PropertyResolver;

pub use self::context::{InstanceRegistry, VirtualGlobal};
pub use self::delta::PropertyDelta;
use self::context::ContextConfig;

/// Values threaded from one runtime to the next, by global name.
pub type DependencyBag = IndexMap<String, JsValue>;

/// What teardown does with globals a sandbox added to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddedPropertyPolicy {
    /// Leave them, other code may hold on to them.
    #[default]
    Retain,
    /// Delete them from the host. Only matters when multi-mode is off.
    Remove,
}

#[derive(Debug, Clone)]
pub struct SandboxProps {
    pub name: String,
    pub key: String,
    pub container: Option<NodeId>,
    pub scoped_css: bool,
    pub multi_mode: bool,
    pub added_policy: AddedPropertyPolicy,
}

impl Default for SandboxProps {
    fn default() -> Self {
        SandboxProps {
            name: String::new(),
            key: String::new(),
            container: None,
            scoped_css: true,
            multi_mode: true,
            added_policy: AddedPropertyPolicy::Retain,
        }
    }
}

impl SandboxProps {
    pub fn new(name: impl Into<String>) -> Self {
        SandboxProps {
            name: name.into(),
            ..SandboxProps::default()
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn container(mut self, container: NodeId) -> Self {
        self.container = Some(container);
        self
    }

    pub fn scoped_css(mut self, scoped_css: bool) -> Self {
        self.scoped_css = scoped_css;
        self
    }

    pub fn multi_mode(mut self, multi_mode: bool) -> Self {
        self.multi_mode = multi_mode;
        self
    }

    pub fn added_policy(mut self, policy: AddedPropertyPolicy) -> Self {
        self.added_policy = policy;
        self
    }
}

pub struct Sandbox {
    id: Uuid,
    props: SandboxProps,
    host: Weak<HostWindow>,
    disabled: bool,
    delta: Rc<RefCell<PropertyDelta>>,
    registry: Rc<RefCell<InstanceRegistry>>,
    context: RefCell<Option<Rc<VirtualGlobal>>>,
    runs: Cell<usize>,
}

impl Sandbox {
    /// Creates a sandbox and registers it on the host under its name and key,
    /// where intercepted `<script>` insertions look it up.
    pub fn new(host: &Rc<HostWindow>, props: SandboxProps) -> Rc<Sandbox> {
        let disabled = !host.interception_supported();
        if disabled && host.first_unsupported_warning() {
            warn!("global interception is not supported by this host, sandboxes are disabled");
        }
        if let Some(container) = props.container.filter(|_| !props.name.is_empty()) {
            host.document().add_class(container, &props.name);
        }
        let sandbox = Rc::new(Sandbox {
            id: Uuid::new_v4(),
            props,
            host: Rc::downgrade(host),
            disabled,
            delta: Rc::new(RefCell::new(PropertyDelta::new())),
            registry: Rc::new(RefCell::new(InstanceRegistry::default())),
            context: RefCell::new(None),
            runs: Cell::new(0),
        });
        host.register_sandbox(&name_key(&sandbox.props.name, &sandbox.props.key), &sandbox);
        debug!("sandbox {} created for module `{}`", sandbox.id, sandbox.props.name);
        sandbox
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.props.name
    }

    pub fn key(&self) -> &str {
        &self.props.key
    }

    pub fn props(&self) -> &SandboxProps {
        &self.props
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Number of scripts run since creation.
    pub fn runs(&self) -> usize {
        self.runs.get()
    }

    fn host(&self) -> Result<Rc<HostWindow>, SandboxError> {
        self.host
            .upgrade()
            .ok_or(SandboxError::HostPrimitiveUnavailable)
    }

    /// Builds the virtual global object, replacing any previous one, and
    /// returns the value scripts see as `window`.
    pub fn create_context(
        &self,
        injections: Option<DependencyBag>,
    ) -> Result<JsValue, SandboxError> {
        if self.disabled {
            return Err(SandboxError::HostPrimitiveUnavailable);
        }
        let host = self.host()?;
        let document = VirtualDocument::obtain(
            &host,
            &self.props.name,
            &self.props.key,
            self.props.container,
            self.props.scoped_css,
        );
        let context = VirtualGlobal::new(
            &host,
            ContextConfig {
                module: self.props.name.clone(),
                multi_mode: self.props.multi_mode,
                injections: injections.unwrap_or_default(),
                delta: self.delta.clone(),
                registry: self.registry.clone(),
                document: document.document_object(),
            },
        );
        let handle = context.handle();
        if let Some(previous) = self.context.replace(Some(context)) {
            previous.dispose();
        }
        Ok(handle)
    }

    /// The current virtual global object, if a context exists.
    pub fn context(&self) -> Option<Rc<VirtualGlobal>> {
        self.context.borrow().clone()
    }

    /// Runs `code` as a classic script against the virtual global object,
    /// creating it first if needed. A disabled sandbox runs nothing.
    pub fn run(&self, code: &str) -> Result<JsValue, SandboxError> {
        if self.disabled {
            return Ok(JsValue::Undefined);
        }
        let context = match self.context() {
            Some(context) => context,
            None => {
                self.create_context(None)?;
                self.context()
                    .ok_or(SandboxError::HostPrimitiveUnavailable)?
            }
        };
        self.runs.set(self.runs.get() + 1);
        let handle = context.handle();
        let resolver: Rc<dyn PropertyResolver> = context;
        let result = parse_script(code).and_then(|program| run_program(&program, resolver, handle));
        result.map_err(|source| {
            error!(
                "error occurs when executing script in sandbox `{}`: {}",
                self.props.name, source
            );
            SandboxError::Execution {
                module: self.props.name.clone(),
                source,
            }
        })
    }

    /// Globals this sandbox introduced, with their latest values.
    pub fn added_properties(&self) -> DependencyBag {
        self.delta.borrow().added().clone()
    }

    /// Host values this sandbox overwrote and has not restored yet.
    pub fn original_values(&self) -> DependencyBag {
        self.delta.borrow().original().clone()
    }

    /// Releases what the sandbox registered on the host: listeners, timers,
    /// overwritten globals. Then drops the context.
    pub fn clear(&self) {
        if self.disabled {
            return;
        }
        let host = match self.host.upgrade() {
            Some(host) => host,
            None => return,
        };
        let registry = std::mem::take(&mut *self.registry.borrow_mut());
        for (event_type, listeners) in &registry.listeners {
            for listener in listeners {
                host.remove_event_listener(event_type, listener);
            }
        }
        for id in registry.timeouts.iter().chain(registry.intervals.iter()) {
            host.clear_timer(*id);
        }

        let (original, added) = {
            let delta = self.delta.borrow();
            (delta.original().clone(), delta.added().clone())
        };
        for (key, value) in original {
            host.set_global(&key, value);
        }
        if self.props.added_policy == AddedPropertyPolicy::Remove && !self.props.multi_mode {
            for key in added.keys() {
                host.delete_global(key);
            }
        }
        self.delta.borrow_mut().clear_original();

        if let Some(context) = self.context.borrow_mut().take() {
            context.dispose();
        }
        debug!("sandbox {} for module `{}` cleared", self.id, self.props.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn props_defaults() {
        let props = SandboxProps::new("app");
        assert!(props.scoped_css);
        assert!(props.multi_mode);
        assert_eq!(props.added_policy, AddedPropertyPolicy::Retain);
        assert_eq!(props.key, "");
    }

    #[test]
    fn registered_on_the_host() {
        let host = HostWindow::new();
        let sandbox = Sandbox::new(&host, SandboxProps::new("app").key("1"));
        let found = host.sandbox("app", "1").unwrap();
        assert!(Rc::ptr_eq(&sandbox, &found));
        drop(found);
        drop(sandbox);
        assert!(host.sandbox("app", "1").is_none());
    }

    #[test]
    fn writes_stay_local_in_multi_mode() {
        let host = HostWindow::new();
        let sandbox = Sandbox::new(&host, SandboxProps::new("app"));
        sandbox.run("var foo = 1; window.bar = foo + 1;").unwrap();
        assert!(!host.has_global("foo"));
        assert!(!host.has_global("bar"));
        assert_eq!(
            sandbox.run("foo + bar").unwrap(),
            JsValue::Number(3.0)
        );
        let added = sandbox.added_properties();
        assert_eq!(added.keys().collect::<Vec<_>>(), vec!["foo", "bar"]);
    }
}
