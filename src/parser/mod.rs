mod api;
pub mod ast;

pub use api::{JsParser, Rule};
