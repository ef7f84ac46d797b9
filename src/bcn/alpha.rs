//! Encoding of the 8 byte smooth alpha block used by BC3, BC4, and BC5.
use crate::bcn::{CHANNELS, PIXELS_PER_BLOCK};

/// Compress one channel of the block into 8 bytes of smooth alpha data.
pub(crate) fn compress_alpha_block(
    pixels: &[[u8; CHANNELS]; PIXELS_PER_BLOCK],
    mask: u32,
    channel: usize,
    output: &mut [u8],
) {
    let mut min = u8::MAX;
    let mut max = u8::MIN;
    for (i, pixel) in pixels.iter().enumerate() {
        if mask & (1 << i) == 0 {
            continue;
        }
        let value = pixel[channel];
        min = min.min(value);
        max = max.max(value);
    }
    if min > max {
        // No pixels selected by the mask.
        min = 0;
        max = 0;
    }

    if min == max {
        // Equal endpoints make index 0 exact for every pixel.
        output[0] = min;
        output[1] = min;
        output[2..8].fill(0);
        return;
    }

    // a0 > a1 selects the eight entry palette.
    let seven = evaluate(pixels, mask, channel, max, min);

    // The six entry palette reserves indices for 0 and 255, so the
    // endpoints only need to cover the interior values.
    let min5 = pixels
        .iter()
        .enumerate()
        .filter(|&(i, p)| mask & (1 << i) != 0 && p[channel] != 0)
        .map(|(_, p)| p[channel])
        .min();
    let max5 = pixels
        .iter()
        .enumerate()
        .filter(|&(i, p)| mask & (1 << i) != 0 && p[channel] != u8::MAX)
        .map(|(_, p)| p[channel])
        .max();
    let (a0, a1) = match (min5, max5) {
        (Some(min5), Some(max5)) if min5 <= max5 => (min5, max5),
        // Only 0 and 255 remain, which the fixed entries cover exactly.
        _ => (0, 0),
    };
    let five = evaluate(pixels, mask, channel, a0, a1);

    let best = if five.error < seven.error {
        five
    } else {
        seven
    };

    let mut indices = 0u64;
    for (i, &index) in best.indices.iter().enumerate() {
        indices |= (index as u64) << (3 * i);
    }
    let block = (indices << 16) | ((best.alpha1 as u64) << 8) | best.alpha0 as u64;
    output[0..8].copy_from_slice(&block.to_le_bytes());
}

struct EncodedAlpha {
    alpha0: u8,
    alpha1: u8,
    indices: [u8; PIXELS_PER_BLOCK],
    error: u32,
}

// Assign each pixel the nearest palette entry for the mode
// selected by the endpoint ordering.
fn evaluate(
    pixels: &[[u8; CHANNELS]; PIXELS_PER_BLOCK],
    mask: u32,
    channel: usize,
    alpha0: u8,
    alpha1: u8,
) -> EncodedAlpha {
    let palette = decode_palette(alpha0, alpha1);

    let mut indices = [0u8; PIXELS_PER_BLOCK];
    let mut error = 0u32;
    for (i, pixel) in pixels.iter().enumerate() {
        let value = pixel[channel] as i32;

        let mut best_index = 0;
        let mut best_error = i32::MAX;
        for (j, &entry) in palette.iter().enumerate() {
            let diff = entry - value;
            let e = diff * diff;
            // Strictly smaller resolves ties toward the lower index.
            if e < best_error {
                best_error = e;
                best_index = j;
            }
        }
        indices[i] = best_index as u8;
        if mask & (1 << i) != 0 {
            error += best_error as u32;
        }
    }

    EncodedAlpha {
        alpha0,
        alpha1,
        indices,
        error,
    }
}

// The interpolated values a decoder derives from the endpoint bytes.
fn decode_palette(alpha0: u8, alpha1: u8) -> [i32; 8] {
    let a0 = alpha0 as i32;
    let a1 = alpha1 as i32;
    if a0 > a1 {
        [
            a0,
            a1,
            (6 * a0 + a1 + 1) / 7,
            (5 * a0 + 2 * a1 + 1) / 7,
            (4 * a0 + 3 * a1 + 1) / 7,
            (3 * a0 + 4 * a1 + 1) / 7,
            (2 * a0 + 5 * a1 + 1) / 7,
            (a0 + 6 * a1 + 1) / 7,
        ]
    } else {
        [
            a0,
            a1,
            (4 * a0 + a1 + 1) / 5,
            (3 * a0 + 2 * a1 + 1) / 5,
            (2 * a0 + 3 * a1 + 1) / 5,
            (a0 + 4 * a1 + 1) / 5,
            0,
            255,
        ]
    }
}
