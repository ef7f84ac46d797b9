//! # bcenc_rs
//! A pure Rust encoder for BC1, BC3, BC4, and BC5 block compressed texture data.
//!
//! The encoder operates on tightly packed RGBA8 pixel data in row-major order
//! and produces the standard block layouts consumed by GPU texture upload paths
//! and DDS readers. Compression is stateless, so a single image can be encoded
//! from multiple threads over disjoint regions, or the optional `rayon` feature
//! can parallelize over blocks within a single call.
//!
//! ```rust no_run
//! use bcenc_rs::{bcn_from_rgba8, ErrorMetric, ImageFormat, Quality};
//!
//! # fn main() -> Result<(), bcenc_rs::SurfaceError> {
//! let rgba = vec![0u8; 64 * 64 * 4];
//! let compressed = bcn_from_rgba8(
//!     64,
//!     64,
//!     &rgba,
//!     ImageFormat::BC3Unorm,
//!     Quality::Normal,
//!     ErrorMetric::Uniform,
//! )?;
//! # Ok(())
//! # }
//! ```
mod bcn;
mod error;

pub use bcn::{bcn_from_rgba8, bcn_from_rgba8_into, required_storage};
pub use error::SurfaceError;

/// The conversion quality when converting to compressed formats.
///
/// Higher quality settings run significantly slower.
/// Block compressed formats use a fixed compression ratio,
/// so lower quality settings do not use less space than slower ones.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Quality {
    /// Fit endpoints to the extremes of the principal axis.
    Fast,
    /// Least squares cluster fit over the principal axis ordering.
    Normal,
    /// Iteratively refined cluster fit for slightly higher quality.
    Slow,
}

/// The per-channel weighting used when measuring color error.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorMetric {
    /// Weight the red, green, and blue channels equally.
    Uniform,
    /// Weight channels by their contribution to perceived luma.
    Perceptual,
}

/// Supported block compressed formats.
///
/// Srgb variants use identical block data to their Unorm counterparts.
/// The gamma interpretation only affects sampling, not encoding.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ImageFormat {
    BC1Unorm,
    BC1Srgb,
    BC2Unorm,
    BC2Srgb,
    BC3Unorm,
    BC3Srgb,
    BC4Unorm,
    BC5Unorm,
}

impl ImageFormat {
    /// The size in bytes of a compressed 4x4 pixel block.
    pub fn bytes_per_block(&self) -> usize {
        match self {
            ImageFormat::BC1Unorm | ImageFormat::BC1Srgb => 8,
            ImageFormat::BC2Unorm | ImageFormat::BC2Srgb => 16,
            ImageFormat::BC3Unorm | ImageFormat::BC3Srgb => 16,
            ImageFormat::BC4Unorm => 8,
            ImageFormat::BC5Unorm => 16,
        }
    }

    /// The format corresponding to the `DXGI_FORMAT` enum value `dxgi`
    /// or `None` if the value is unrecognized.
    pub fn from_dxgi(dxgi: u32) -> Option<ImageFormat> {
        match dxgi {
            71 => Some(ImageFormat::BC1Unorm),
            72 => Some(ImageFormat::BC1Srgb),
            74 => Some(ImageFormat::BC2Unorm),
            75 => Some(ImageFormat::BC2Srgb),
            77 => Some(ImageFormat::BC3Unorm),
            78 => Some(ImageFormat::BC3Srgb),
            80 => Some(ImageFormat::BC4Unorm),
            83 => Some(ImageFormat::BC5Unorm),
            _ => None,
        }
    }

    /// The corresponding `DXGI_FORMAT` enum value.
    pub fn dxgi(&self) -> u32 {
        match self {
            ImageFormat::BC1Unorm => 71,
            ImageFormat::BC1Srgb => 72,
            ImageFormat::BC2Unorm => 74,
            ImageFormat::BC2Srgb => 75,
            ImageFormat::BC3Unorm => 77,
            ImageFormat::BC3Srgb => 78,
            ImageFormat::BC4Unorm => 80,
            ImageFormat::BC5Unorm => 83,
        }
    }
}

fn div_round_up(x: usize, d: usize) -> usize {
    (x + d - 1) / d
}
