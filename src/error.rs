//! Error types for model assembly.

use thiserror::Error;

/// Errors raised while validating a configuration or assembling the networks.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Image size must be a power of two so every down/up-sampling stage is exact
    #[error("img_size must be a power of two, got {0}")]
    ImageSizeNotPowerOfTwo(usize),

    /// Image size below the smallest size the discriminator can collapse to 1x1
    #[error("img_size must be at least {min}, got {actual}")]
    ImageSizeTooSmall { actual: usize, min: usize },

    /// A width, depth or head count that must be non-zero
    #[error("{0} must be greater than zero")]
    ZeroDimension(&'static str),

    /// The transformer stem output width does not match the projection input
    #[error("hidden_size must equal img_size / 2 ({expected}), got {actual}")]
    HiddenSizeMismatch { expected: usize, actual: usize },

    /// Config file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
