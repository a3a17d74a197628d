//! Shared runtime bundles loaded once and injected into module sandboxes.
//!
//! A runtime is a list of CSS and JS URLs under an id. Its scripts run in a
//! throwaway sandbox; the globals they define become a [`DependencyBag`]
//! that later runtimes and modules receive as injections.
//!
//! [`DependencyBag`]: crate::sandbox::DependencyBag

pub mod assets;
pub mod descriptor;
pub mod loader;

pub use self::descriptor::{Runtime, RuntimeDescriptor, UrlList};
pub use self::loader::{AssetState, RuntimeLoader};
