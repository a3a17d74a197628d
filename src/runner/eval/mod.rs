//! Evaluation module for executing the script AST.
//!
//! This module contains the core evaluation logic for the interpreter.

pub mod expression;
pub mod function;
pub mod statement;
pub mod types;

pub use types::{Completion, CompletionType, Reference};
