// src/gen/mod.rs
//! Java source emission: the printer sink, module metadata, and the code
//! generator proper.

pub mod java;
pub mod metadata;
pub mod printer;
