//! Shared domain models.

pub mod object_reference;

pub use object_reference::{ObjectReference, ReferenceCollection};
