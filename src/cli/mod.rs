//! CLI command implementations.

pub mod configure;
