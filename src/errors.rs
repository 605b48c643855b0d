//! Error Types
//!
//! This module defines the error types used throughout the rasterizer.
//!
//! # Overview
//!
//! The main error type [`RasterError`] covers all recoverable failure modes:
//! - Pipeline state values outside their defined range
//! - Blend unit compilation and code buffer allocation failures
//! - Texel formats without a fetch or store path
//! - Stale resource handles and malformed image descriptors
//!
//! Failures never leave the specialization cache or any bound resource in a
//! partially updated state.
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for `std::result::Result<T, RasterError>`.
//!
//! ```rust,ignore
//! use myth_raster::errors::{RasterError, Result};
//!
//! fn bind_target() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::resources::{Format, ImageType};

/// The main error type for the rasterizer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RasterError {
    // ========================================================================
    // Pipeline State Errors
    // ========================================================================
    /// A raw state value does not name any variant of its enum.
    #[error("Unsupported {field} value: {value:#x}")]
    UnsupportedState {
        /// Name of the state field being converted
        field: &'static str,
        /// The rejected raw value
        value: u32,
    },

    /// The generated blend program failed verification or lowering.
    #[error("Blend unit compilation failed: {0}")]
    Compile(String),

    // ========================================================================
    // Memory Errors
    // ========================================================================
    /// An allocation request could not be satisfied.
    #[error("Out of memory allocating {what} ({bytes} bytes)")]
    OutOfMemory {
        /// What was being allocated
        what: &'static str,
        /// Requested size in bytes
        bytes: usize,
    },

    // ========================================================================
    // Format Errors
    // ========================================================================
    /// No texel fetch path exists for this format on this image type.
    #[error("Format {format:?} cannot be sampled from a {image_type:?} image")]
    UnsupportedFetch { format: Format, image_type: ImageType },

    /// The format cannot be written as the requested render target aspect.
    #[error("Format {format:?} is not renderable as a {aspect} target")]
    UnsupportedRenderTarget {
        format: Format,
        /// "color", "depth" or "stencil"
        aspect: &'static str,
    },

    /// A view tried to reinterpret an image with a format of different texel size.
    #[error("View format {view:?} is incompatible with image format {image:?}")]
    IncompatibleViewFormat { image: Format, view: Format },

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// A handle refers to a destroyed or foreign resource.
    #[error("Invalid {0} handle")]
    InvalidHandle(&'static str),

    /// An image descriptor or its upload data is malformed.
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// A texture unit index exceeds the configured unit count.
    #[error("Texture unit {unit} out of range (max {max})")]
    TextureUnitOutOfRange { unit: usize, max: usize },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Settings failed validation.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}

/// Alias for `Result<T, RasterError>`.
pub type Result<T> = std::result::Result<T, RasterError>;
