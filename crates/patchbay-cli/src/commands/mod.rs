//! CLI command implementations.

pub mod common;
pub mod kinds;
pub mod play;
pub mod render;
