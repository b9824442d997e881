//! Ink: a markdown content server that renders a directory tree to HTML and
//! keeps a bounded in-memory cache fresh from filesystem notifications.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;

pub(crate) mod lock;
