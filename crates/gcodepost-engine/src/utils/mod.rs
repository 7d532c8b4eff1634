//! Utility functions

pub mod file_io;

pub use file_io::*;
