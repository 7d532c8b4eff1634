//! # GCodePost Core
//!
//! Core types and utilities shared by every GCodePost crate:
//! the linear move record, the nullable three-axis position,
//! move classification, G-code number formatting and the error taxonomy.

pub mod data;
pub mod error;
pub mod units;

pub use data::{LinearMove, MoveKind, Position};

pub use error::{ConfigError, Error, Result, StructureError};

pub use units::{
    format_extrusion, format_feed_rate, format_number, format_position, EXTRUSION_PRECISION,
    POSITION_PRECISION,
};
