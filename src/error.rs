use thiserror::Error;

use crate::ImageFormat;

/// Errors while compressing image data.
///
/// All validation happens before any block is encoded,
/// so a failing call never produces partial output.
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("surface dimensions {width} x {height} contain no pixels")]
    ZeroSizedSurface { width: u32, height: u32 },

    #[error("surface pixel count {width} x {height} would overflow")]
    PixelCountWouldOverflow { width: u32, height: u32 },

    #[error("expected surface to have at least {expected} bytes but found {actual}")]
    NotEnoughData { expected: usize, actual: usize },

    #[error("expected output buffer to have at least {expected} bytes but found {actual}")]
    BufferTooSmall { expected: usize, actual: usize },

    #[error("compressing data to format {format:?} is not supported")]
    UnsupportedEncodeFormat { format: ImageFormat },
}
