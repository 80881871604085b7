//! HTTP handlers for entity CRUD and entity introspection.

pub mod entity;
pub mod meta;
