#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
//! Decoded game record model consumed by the questgraph analysis crates.

pub mod defs;
pub mod validate;

pub use defs::*;
pub use validate::{ValidationError, validate_records};
