//! # micro-sandbox
//!
//! Isolation primitives for running several independently built front-end
//! modules inside one host page:
//!
//! - a **property delta tracker** recording which globals a module added and
//!   which host values it overwrote,
//! - a **virtual global object** giving each module its own view of the
//!   window, with writes kept local and host functions bound back to the
//!   real window,
//! - an **insertion interceptor** redirecting `<style>`, `<link>`,
//!   `<script>` and other nodes that module code puts into `head`/`body`
//!   towards private containers,
//! - a **runtime loader** fetching shared bundles once, running them in a
//!   throwaway sandbox and handing their globals to later modules.
//!
//! Module code is ordinary script source, run by the interpreter in
//! [`runner`] against a simulated [`host::HostWindow`] with its own
//! [`dom`] document.
//!
//! ## Quick start
//!
//! ```
//! use micro_sandbox::host::HostWindow;
//! use micro_sandbox::runner::ds::value::JsValue;
//! use micro_sandbox::sandbox::{Sandbox, SandboxProps};
//!
//! let host = HostWindow::new();
//! let sandbox = Sandbox::new(&host, SandboxProps::new("app"));
//! sandbox.run("var counter = 1; window.counter = counter + 1;").unwrap();
//!
//! // The host never saw the write.
//! assert!(!host.has_global("counter"));
//! assert_eq!(sandbox.run("counter").unwrap(), JsValue::Number(2.0));
//!
//! sandbox.clear();
//! ```
//!
//! ## Architecture
//!
//! - **[`parser`]** - PEG parser and AST types
//! - **[`runner`]** - tree-walking interpreter and the resolver seam for
//!   global objects
//! - **[`host`]** - the window: globals, timers, events, pending tasks
//! - **[`dom`]** - node arena, element objects, virtual documents
//! - **[`sandbox`]** - delta tracking and virtual globals
//! - **[`runtime`]** - runtime descriptors and the caching loader
//! - **[`fetch`]** - the injectable network layer

#[macro_use]
extern crate lazy_static;

pub mod dom;
pub mod error;
pub mod fetch;
pub mod host;
pub mod parser;
pub mod runner;
pub mod runtime;
pub mod sandbox;

pub use error::SandboxError;
pub use host::HostWindow;
pub use runtime::{Runtime, RuntimeDescriptor, RuntimeLoader};
pub use sandbox::{AddedPropertyPolicy, DependencyBag, Sandbox, SandboxProps};
