//! Domain layer: content records and path semantics.

pub mod entities;
pub mod error;
pub mod paths;
