use crate::{div_round_up, error::SurfaceError, ErrorMetric, ImageFormat, Quality};

mod alpha;
mod color;
mod fit;

// All supported formats use 4x4 blocks.
const BLOCK_WIDTH: usize = 4;
const BLOCK_HEIGHT: usize = 4;
const PIXELS_PER_BLOCK: usize = BLOCK_WIDTH * BLOCK_HEIGHT;
const CHANNELS: usize = 4;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) struct EncodeParams {
    pub quality: Quality,
    pub metric: ErrorMetric,
}

trait Bcn {
    const BYTES_PER_BLOCK: usize;

    // Pixels are row-major RGBA with a bit set in mask for each
    // pixel inside the image bounds. Padded pixels replicate the
    // nearest valid pixel and carry no weight when fitting.
    fn compress_block(
        pixels: &[[u8; CHANNELS]; PIXELS_PER_BLOCK],
        mask: u32,
        params: EncodeParams,
        output: &mut [u8],
    );
}

struct Bc1;
impl Bcn for Bc1 {
    const BYTES_PER_BLOCK: usize = 8;

    fn compress_block(
        pixels: &[[u8; CHANNELS]; PIXELS_PER_BLOCK],
        mask: u32,
        params: EncodeParams,
        output: &mut [u8],
    ) {
        color::compress_bc1_block(pixels, mask, params, output);
    }
}

struct Bc3;
impl Bcn for Bc3 {
    const BYTES_PER_BLOCK: usize = 16;

    fn compress_block(
        pixels: &[[u8; CHANNELS]; PIXELS_PER_BLOCK],
        mask: u32,
        params: EncodeParams,
        output: &mut [u8],
    ) {
        alpha::compress_alpha_block(pixels, mask, 3, &mut output[0..8]);
        color::compress_bc3_color_block(pixels, mask, params, &mut output[8..16]);
    }
}

struct Bc4;
impl Bcn for Bc4 {
    const BYTES_PER_BLOCK: usize = 8;

    fn compress_block(
        pixels: &[[u8; CHANNELS]; PIXELS_PER_BLOCK],
        mask: u32,
        _: EncodeParams,
        output: &mut [u8],
    ) {
        alpha::compress_alpha_block(pixels, mask, 0, output);
    }
}

struct Bc5;
impl Bcn for Bc5 {
    const BYTES_PER_BLOCK: usize = 16;

    fn compress_block(
        pixels: &[[u8; CHANNELS]; PIXELS_PER_BLOCK],
        mask: u32,
        _: EncodeParams,
        output: &mut [u8],
    ) {
        alpha::compress_alpha_block(pixels, mask, 0, &mut output[0..8]);
        alpha::compress_alpha_block(pixels, mask, 1, &mut output[8..16]);
    }
}

/// The number of bytes required to store a `width` x `height`
/// surface compressed to `format`.
///
/// Dimensions that are not a multiple of the block dimensions
/// round up to the next full block.
pub fn required_storage(
    width: u32,
    height: u32,
    format: ImageFormat,
) -> Result<usize, SurfaceError> {
    if width == 0 || height == 0 {
        return Err(SurfaceError::ZeroSizedSurface { width, height });
    }

    // Dimensions close to u32::MAX may overflow the byte count.
    div_round_up(width as usize, BLOCK_WIDTH)
        .checked_mul(div_round_up(height as usize, BLOCK_HEIGHT))
        .and_then(|blocks| blocks.checked_mul(format.bytes_per_block()))
        .ok_or(SurfaceError::PixelCountWouldOverflow { width, height })
}

/// Compress the RGBA8 bytes in `data` to the given `format`,
/// allocating the output buffer with [required_storage].
pub fn bcn_from_rgba8(
    width: u32,
    height: u32,
    data: &[u8],
    format: ImageFormat,
    quality: Quality,
    metric: ErrorMetric,
) -> Result<Vec<u8>, SurfaceError> {
    let mut output = vec![0u8; required_storage(width, height, format)?];
    bcn_from_rgba8_into(width, height, data, format, quality, metric, &mut output)?;
    Ok(output)
}

/// Compress the RGBA8 bytes in `data` to the given `format`
/// into a caller allocated buffer.
///
/// `output` must have at least [required_storage] bytes,
/// and exactly that many bytes are written on success.
pub fn bcn_from_rgba8_into(
    width: u32,
    height: u32,
    data: &[u8],
    format: ImageFormat,
    quality: Quality,
    metric: ErrorMetric,
    output: &mut [u8],
) -> Result<(), SurfaceError> {
    let compressed_size = required_storage(width, height, format)?;
    if output.len() < compressed_size {
        return Err(SurfaceError::BufferTooSmall {
            expected: compressed_size,
            actual: output.len(),
        });
    }

    let expected_size = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(CHANNELS))
        .ok_or(SurfaceError::PixelCountWouldOverflow { width, height })?;
    if data.len() < expected_size {
        return Err(SurfaceError::NotEnoughData {
            expected: expected_size,
            actual: data.len(),
        });
    }

    let data = &data[..expected_size];
    let output = &mut output[..compressed_size];
    let params = EncodeParams { quality, metric };

    match format {
        ImageFormat::BC1Unorm | ImageFormat::BC1Srgb => {
            compress_blocks::<Bc1>(width, height, data, params, output)
        }
        ImageFormat::BC3Unorm | ImageFormat::BC3Srgb => {
            compress_blocks::<Bc3>(width, height, data, params, output)
        }
        ImageFormat::BC4Unorm => compress_blocks::<Bc4>(width, height, data, params, output),
        ImageFormat::BC5Unorm => compress_blocks::<Bc5>(width, height, data, params, output),
        ImageFormat::BC2Unorm | ImageFormat::BC2Srgb => {
            return Err(SurfaceError::UnsupportedEncodeFormat { format })
        }
    }

    Ok(())
}

// Blocks are laid out in row-major order.
// Each block writes only its own output slot,
// so the blocks can be encoded in any order or in parallel.
fn compress_blocks<T: Bcn>(
    width: u32,
    height: u32,
    data: &[u8],
    params: EncodeParams,
    output: &mut [u8],
) {
    let width = width as usize;
    let height = height as usize;
    let blocks_x = div_round_up(width, BLOCK_WIDTH);

    let encode_block = |(block_index, block_bytes): (usize, &mut [u8])| {
        let x = (block_index % blocks_x) * BLOCK_WIDTH;
        let y = (block_index / blocks_x) * BLOCK_HEIGHT;
        let (pixels, mask) = get_rgba_block(data, x, y, width, height);
        T::compress_block(&pixels, mask, params, block_bytes);
    };

    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;
        output
            .par_chunks_mut(T::BYTES_PER_BLOCK)
            .enumerate()
            .for_each(encode_block);
    }

    #[cfg(not(feature = "rayon"))]
    output
        .chunks_mut(T::BYTES_PER_BLOCK)
        .enumerate()
        .for_each(encode_block);
}

// Edge blocks clamp out of bounds positions to the nearest valid pixel.
// The mask records which positions were actually inside the image.
fn get_rgba_block(
    data: &[u8],
    x: usize,
    y: usize,
    width: usize,
    height: usize,
) -> ([[u8; CHANNELS]; PIXELS_PER_BLOCK], u32) {
    let rgba: &[[u8; CHANNELS]] = bytemuck::cast_slice(data);

    let mut pixels = [[0u8; CHANNELS]; PIXELS_PER_BLOCK];
    let mut mask = 0u32;
    for row in 0..BLOCK_HEIGHT {
        for col in 0..BLOCK_WIDTH {
            let i = row * BLOCK_WIDTH + col;
            let px = (x + col).min(width - 1);
            let py = (y + row).min(height - 1);
            pixels[i] = rgba[py * width + px];
            if x + col < width && y + row < height {
                mask |= 1 << i;
            }
        }
    }

    (pixels, mask)
}
