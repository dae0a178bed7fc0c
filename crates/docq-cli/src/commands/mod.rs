//! CLI command implementations

pub mod delete;
pub mod qa;
pub mod status;
pub mod submit;
