// src/cli/mod.rs

pub mod args;
pub mod inputs;

pub use args::Options;
pub use inputs::{resolve_items, WorkItem, SOURCE_EXT};
