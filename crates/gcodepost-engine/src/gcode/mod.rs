//! G-code stream decomposition
//!
//! This module provides:
//! - Linear move parsing
//! - Position tracking and move classification
//! - Sentinel-driven region toggles
//! - Slicer configuration lookup
//! - Print / layer / segment decomposition
//! - Cursor-safe line splicing

pub mod config;
pub mod parser;
pub mod segmenter;
pub mod splicer;
pub mod toggle;
pub mod tracker;

pub use config::*;
pub use parser::*;
pub use segmenter::*;
pub use splicer::*;
pub use toggle::*;
pub use tracker::*;
