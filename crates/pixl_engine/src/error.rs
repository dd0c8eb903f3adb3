//! Unified error types for pixl_engine

use thiserror::Error;

/// Main error type for pixl_engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    // === Document Errors ===
    #[error("Layer {layer} out of range (0..{max})")]
    LayerOutOfRange { layer: usize, max: usize },

    #[error("Tileset {tileset} out of range (0..{max})")]
    TilesetOutOfRange { tileset: usize, max: usize },

    #[error("Tile {tile} out of range (0..{max})")]
    TileOutOfRange { tile: u32, max: u32 },

    // === Image Errors ===
    #[error("Pixmap size mismatch: expected {expected}, got {actual}")]
    PixmapSizeMismatch { expected: crate::Size, actual: crate::Size },

    #[error("{0}")]
    Generic(String),
}

/// Result type alias for pixl_engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

// === Convenience constructors ===
impl EngineError {
    /// Create a generic error from any displayable type
    pub fn generic(msg: impl std::fmt::Display) -> Self {
        Self::Generic(msg.to_string())
    }
}
