#![forbid(unsafe_code)]

//! Core definitions shared by the Selo XML signing crates.

pub mod algorithm;
pub mod error;
pub mod ns;

pub use error::{Error, Result};
