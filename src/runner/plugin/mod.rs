//! Built-in registration and the resolver seam.
//!
//! - [`types`]: the `BuiltInObject` builder and the native fn signature
//! - [`registry`]: the set of standard globals a host installs
//! - [`resolver`]: trait for objects and scopes whose properties are computed

pub mod registry;
pub mod resolver;
pub mod types;

pub use registry::BuiltInRegistry;
pub use resolver::PropertyResolver;
pub use types::{BuiltInObject, NativeFn};
