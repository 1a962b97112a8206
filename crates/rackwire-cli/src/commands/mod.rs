//! CLI command implementations.

pub mod common;
pub mod modules;
pub mod render;
pub mod schedule;
