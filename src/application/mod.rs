//! Application services: loading and rendering content, error mapping.

pub mod error;
pub mod loader;
pub mod render;
