pub mod error;
pub mod function_object;
pub mod object;
pub mod scope;
pub mod value;
