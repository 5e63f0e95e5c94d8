//! Binary support crate
//!
//! Shared CLI parsing and logging initialization for the fen binaries.

pub mod common;
