//! Script execution: value model, evaluator, built-ins and the resolver seam
//! through which callers supply the global object.

pub mod api;
pub mod ds;
pub mod eval;
pub mod plugin;
pub mod std_lib;
