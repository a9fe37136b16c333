//! Feature schema
//!
//! This module defines the typed vocabulary of the engine: dimension keys and
//! their polarity, validated vertical names, concrete column keys, and the
//! versioned registry that maps raw column names onto them.

mod dimension;
mod registry;

pub use dimension::*;
pub use registry::*;
