//! A small document model: an arena of nodes, the script-facing element
//! objects, and the per-module virtual documents that redirect insertions
//! into private containers.

pub mod css;
pub mod element;
pub mod node;
pub mod selector;
pub mod virtual_document;
