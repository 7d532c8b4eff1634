//! Error handling for GCodePost
//!
//! Provides the error types for every layer of a post-processing run:
//! - Configuration errors (slicer settings embedded as trailing comments)
//! - Structure errors (sentinel markers the rewrite depends on)
//!
//! Malformed move lines are not errors: the move parser reports them as
//! "not a move" and the line is carried through as opaque text.
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Configuration error type
///
/// Raised while resolving slicer settings, before any segmentation work.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// None of the accepted keys is present in the configuration block
    #[error("Missing configuration key: {}", keys.join(" / "))]
    MissingKey {
        /// The keys that were tried, in lookup order.
        keys: Vec<String>,
    },

    /// A key is present but its value cannot be interpreted
    #[error("Invalid value '{value}' for configuration key '{key}': {reason}")]
    InvalidValue {
        /// The configuration key.
        key: String,
        /// The raw value found in the file.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The slicer was configured with a feature the rewrite does not model
    #[error("Unsupported slicer feature: {feature}")]
    UnsupportedFeature {
        /// Human readable feature name.
        feature: String,
    },
}

/// Structure error type
///
/// Raised when a sentinel the rewrite relies on is absent and the
/// missing region cannot be degraded to "treat the remainder as one region".
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructureError {
    /// An expected marker line does not occur in the stream
    #[error("Could not find marker '{marker}'")]
    MarkerNotFound {
        /// The marker text.
        marker: String,
    },

    /// A layer is missing a per-layer marker
    #[error("Layer {layer} has no '{marker}' marker")]
    LayerMarkerMissing {
        /// Zero-based layer index.
        layer: usize,
        /// The marker text.
        marker: String,
    },

    /// Toolchange numbering does not identify the block to rewrite
    #[error("Toolchange #{found} does not follow the last real toolchange ({total} total)")]
    ToolchangeMismatch {
        /// Toolchange number of the last toolchange block.
        found: u32,
        /// Total toolchanges reported by the slicer.
        total: u32,
    },
}

/// Main error type for GCodePost
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Structure error
    #[error(transparent)]
    Structure(#[from] StructureError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// Check if this is a structure error
    pub fn is_structure_error(&self) -> bool {
        matches!(self, Error::Structure(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingKey {
            keys: vec!["filament_retract_length".into(), "retract_length".into()],
        };
        assert_eq!(
            err.to_string(),
            "Missing configuration key: filament_retract_length / retract_length"
        );

        let err = ConfigError::UnsupportedFeature {
            feature: "Arc Fitting".into(),
        };
        assert_eq!(err.to_string(), "Unsupported slicer feature: Arc Fitting");
    }

    #[test]
    fn test_structure_error_display() {
        let err = StructureError::LayerMarkerMissing {
            layer: 3,
            marker: ";AFTER_LAYER_CHANGE".into(),
        };
        assert_eq!(err.to_string(), "Layer 3 has no ';AFTER_LAYER_CHANGE' marker");
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = ConfigError::MissingKey {
            keys: vec!["nozzle_diameter".into()],
        }
        .into();
        assert!(err.is_config_error());
        assert!(!err.is_structure_error());

        let err: Error = StructureError::MarkerNotFound {
            marker: "; CP TOOLCHANGE START".into(),
        }
        .into();
        assert!(err.is_structure_error());
    }
}
