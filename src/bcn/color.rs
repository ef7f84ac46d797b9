//! Encoding of the 8 byte 565 color block shared by BC1 and BC3.
use crate::bcn::fit::{self, cluster_fit, range_fit, Endpoints, Vec3};
use crate::bcn::{EncodeParams, CHANNELS, PIXELS_PER_BLOCK};
use crate::{ErrorMetric, Quality};

// BC1 pixels below this alpha decode as transparent black.
const ALPHA_THRESHOLD: u8 = 128;

fn metric_weights(metric: ErrorMetric) -> Vec3 {
    match metric {
        ErrorMetric::Uniform => Vec3::new(1.0, 1.0, 1.0),
        // Rec. 709 luma weights.
        ErrorMetric::Perceptual => Vec3::new(0.2126, 0.7152, 0.0722),
    }
}

pub(crate) fn compress_bc1_block(
    pixels: &[[u8; CHANNELS]; PIXELS_PER_BLOCK],
    mask: u32,
    params: EncodeParams,
    output: &mut [u8],
) {
    compress_color_block(pixels, mask, params, output, false);
}

// The BC3 color block always decodes with the four color palette,
// so alpha never influences the color endpoints.
pub(crate) fn compress_bc3_color_block(
    pixels: &[[u8; CHANNELS]; PIXELS_PER_BLOCK],
    mask: u32,
    params: EncodeParams,
    output: &mut [u8],
) {
    compress_color_block(pixels, mask, params, output, true);
}

fn compress_color_block(
    pixels: &[[u8; CHANNELS]; PIXELS_PER_BLOCK],
    mask: u32,
    params: EncodeParams,
    output: &mut [u8],
    always_four: bool,
) {
    let metric = metric_weights(params.metric);

    let mut points = Vec::with_capacity(PIXELS_PER_BLOCK);
    let mut has_transparent = false;
    for (i, pixel) in pixels.iter().enumerate() {
        if mask & (1 << i) == 0 {
            continue;
        }
        if !always_four && pixel[3] < ALPHA_THRESHOLD {
            has_transparent = true;
            continue;
        }
        points.push(Vec3::new(
            pixel[0] as f32 / 255.0,
            pixel[1] as f32 / 255.0,
            pixel[2] as f32 / 255.0,
        ));
    }
    let three_color = !always_four && has_transparent;

    if points.is_empty() {
        // Fully transparent block. Equal zero endpoints select the three
        // color mode, so index 3 decodes as transparent black.
        output[..4].fill(0);
        output[4..8].fill(0xFF);
        return;
    }

    let mut best = evaluate(
        pixels,
        mask,
        metric,
        range_fit(&points),
        three_color,
        always_four,
    );
    if params.quality != Quality::Fast {
        let iterations = match params.quality {
            Quality::Slow => fit::MAX_CLUSTER_ITERATIONS,
            _ => 1,
        };
        let clustered = evaluate(
            pixels,
            mask,
            metric,
            cluster_fit(&points, metric, three_color, iterations),
            three_color,
            always_four,
        );
        // Strictly smaller, so the cluster fit never loses to the range fit.
        if clustered.error < best.error {
            best = clustered;
        }
    }

    output[0..2].copy_from_slice(&best.color0.to_le_bytes());
    output[2..4].copy_from_slice(&best.color1.to_le_bytes());
    let mut indices = 0u32;
    for (i, &index) in best.indices.iter().enumerate() {
        indices |= (index as u32) << (2 * i);
    }
    output[4..8].copy_from_slice(&indices.to_le_bytes());
}

struct EncodedColors {
    color0: u16,
    color1: u16,
    indices: [u8; PIXELS_PER_BLOCK],
    error: f32,
}

// Quantize the endpoints, rebuild the palette a decoder would see,
// and assign every pixel its best index.
fn evaluate(
    pixels: &[[u8; CHANNELS]; PIXELS_PER_BLOCK],
    mask: u32,
    metric: Vec3,
    endpoints: Endpoints,
    three_color: bool,
    always_four: bool,
) -> EncodedColors {
    let qa = pack_565(endpoints.start);
    let qb = pack_565(endpoints.end);
    let (color0, color1) = if three_color {
        // c0 <= c1 selects the three color mode with a transparent index.
        (qa.min(qb), qa.max(qb))
    } else {
        // c0 >= c1 keeps the four color mode. Equal endpoints are mode
        // agnostic since every opaque entry decodes to the same color.
        (qa.max(qb), qa.min(qb))
    };

    let four_entries = always_four || color0 > color1;
    let palette = decode_palette(color0, color1, four_entries);
    let opaque_entries = if four_entries { 4 } else { 3 };

    let mut indices = [0u8; PIXELS_PER_BLOCK];
    let mut error = 0.0f32;
    for (i, pixel) in pixels.iter().enumerate() {
        if three_color && pixel[3] < ALPHA_THRESHOLD {
            indices[i] = 3;
            continue;
        }

        let mut best_index = 0;
        let mut best_error = f32::INFINITY;
        for (j, entry) in palette[..opaque_entries].iter().enumerate() {
            let dr = (entry[0] - pixel[0] as i32) as f32;
            let dg = (entry[1] - pixel[1] as i32) as f32;
            let db = (entry[2] - pixel[2] as i32) as f32;
            let e = metric.x * dr * dr + metric.y * dg * dg + metric.z * db * db;
            // Strictly smaller resolves ties toward the lower index.
            if e < best_error {
                best_error = e;
                best_index = j;
            }
        }
        indices[i] = best_index as u8;
        if mask & (1 << i) != 0 {
            error += best_error;
        }
    }

    EncodedColors {
        color0,
        color1,
        indices,
        error,
    }
}

// Round each component to the nearest representable 565 value.
fn pack_565(color: Vec3) -> u16 {
    let r = (color.x.clamp(0.0, 1.0) * 31.0).round() as u16;
    let g = (color.y.clamp(0.0, 1.0) * 63.0).round() as u16;
    let b = (color.z.clamp(0.0, 1.0) * 31.0).round() as u16;
    (r << 11) | (g << 5) | b
}

// Expand 565 to 888 exactly like bcdec based decoders.
fn unpack_565(color: u16) -> [i32; 3] {
    let r = ((color >> 11) & 0x1F) as i32;
    let g = ((color >> 5) & 0x3F) as i32;
    let b = (color & 0x1F) as i32;
    [
        (r * 527 + 23) >> 6,
        (g * 259 + 33) >> 6,
        (b * 527 + 23) >> 6,
    ]
}

fn decode_palette(color0: u16, color1: u16, four_entries: bool) -> [[i32; 3]; 4] {
    let c0 = unpack_565(color0);
    let c1 = unpack_565(color1);
    if four_entries {
        [
            c0,
            c1,
            [
                (2 * c0[0] + c1[0] + 1) / 3,
                (2 * c0[1] + c1[1] + 1) / 3,
                (2 * c0[2] + c1[2] + 1) / 3,
            ],
            [
                (c0[0] + 2 * c1[0] + 1) / 3,
                (c0[1] + 2 * c1[1] + 1) / 3,
                (c0[2] + 2 * c1[2] + 1) / 3,
            ],
        ]
    } else {
        [
            c0,
            c1,
            [
                (c0[0] + c1[0] + 1) / 2,
                (c0[1] + c1[1] + 1) / 2,
                (c0[2] + c1[2] + 1) / 2,
            ],
            // Index 3 decodes as transparent black.
            [0, 0, 0],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_MASK: u32 = u16::MAX as u32;

    fn params(quality: Quality) -> EncodeParams {
        EncodeParams {
            quality,
            metric: ErrorMetric::Uniform,
        }
    }

    fn decode_bc1(block: &[u8]) -> [[u8; 4]; 16] {
        let mut decompressed = [0u8; 64];
        bcdec_rs::bc1(block, &mut decompressed, 4 * 4);
        let mut pixels = [[0u8; 4]; 16];
        for (pixel, bytes) in pixels.iter_mut().zip(decompressed.chunks_exact(4)) {
            pixel.copy_from_slice(bytes);
        }
        pixels
    }

    fn block_sse(pixels: &[[u8; 4]; 16], decoded: &[[u8; 4]; 16]) -> u32 {
        pixels
            .iter()
            .zip(decoded)
            .map(|(p, d)| {
                (0..3)
                    .map(|c| {
                        let diff = p[c] as i32 - d[c] as i32;
                        (diff * diff) as u32
                    })
                    .sum::<u32>()
            })
            .sum()
    }

    fn gradient_block() -> [[u8; 4]; 16] {
        let mut pixels = [[0u8; 4]; 16];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = [
                (i * 16) as u8,
                (255 - i * 13) as u8,
                (40 + i * 7) as u8,
                255,
            ];
        }
        pixels
    }

    #[test]
    fn uniform_block_equal_endpoints_zero_indices() {
        let pixels = [[128u8, 64, 200, 255]; 16];
        for quality in [Quality::Fast, Quality::Normal, Quality::Slow] {
            let mut block = [0u8; 8];
            compress_bc1_block(&pixels, FULL_MASK, params(quality), &mut block);

            // Both endpoints are the nearest quantized color with all indices 0.
            assert_eq!(block[0..2], block[2..4]);
            assert_eq!([0u8; 4], block[4..8]);

            let decoded = decode_bc1(&block);
            for pixel in decoded {
                assert_eq!(decoded[0], pixel);
                assert_eq!(255, pixel[3]);
                // At most half a 5 bit quantization step per channel.
                assert!((pixel[0] as i32 - 128).abs() <= 4);
                assert!((pixel[1] as i32 - 64).abs() <= 4);
                assert!((pixel[2] as i32 - 200).abs() <= 4);
            }
        }
    }

    #[test]
    fn cluster_fit_not_worse_than_range_fit() {
        let pixels = gradient_block();
        let mut fast = [0u8; 8];
        compress_bc1_block(&pixels, FULL_MASK, params(Quality::Fast), &mut fast);
        let fast_sse = block_sse(&pixels, &decode_bc1(&fast));

        for quality in [Quality::Normal, Quality::Slow] {
            let mut block = [0u8; 8];
            compress_bc1_block(&pixels, FULL_MASK, params(quality), &mut block);
            let sse = block_sse(&pixels, &decode_bc1(&block));
            assert!(sse <= fast_sse, "{sse} > {fast_sse} for {quality:?}");
        }
    }

    #[test]
    fn round_trip_error_within_palette_step() {
        // Colors on a line from (0,0,0) to (60,120,180) with spacing 20.
        // The palette quantization step is bounded by a third of the range
        // plus 565 rounding.
        let mut pixels = [[0u8; 4]; 16];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            let t = (i % 4) as i32;
            *pixel = [(t * 20) as u8, (t * 40) as u8, (t * 60) as u8, 255];
        }

        for quality in [Quality::Fast, Quality::Normal, Quality::Slow] {
            let mut block = [0u8; 8];
            compress_bc1_block(&pixels, FULL_MASK, params(quality), &mut block);
            let decoded = decode_bc1(&block);
            for (pixel, actual) in pixels.iter().zip(&decoded) {
                for c in 0..3 {
                    let diff = (pixel[c] as i32 - actual[c] as i32).abs();
                    assert!(diff <= 14, "channel {c} off by {diff}");
                }
            }
        }
    }

    #[test]
    fn fully_transparent_block() {
        let pixels = [[90u8, 90, 90, 0]; 16];
        let mut block = [0u8; 8];
        compress_bc1_block(&pixels, FULL_MASK, params(Quality::Normal), &mut block);

        assert_eq!([0u8, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF], block);
        let decoded = decode_bc1(&block);
        for pixel in decoded {
            assert_eq!([0u8, 0, 0, 0], pixel);
        }
    }

    #[test]
    fn punch_through_alpha_preserved() {
        // Transparent pixels decode as transparent and opaque pixels keep
        // their color within the quantization bound.
        let mut pixels = [[200u8, 50, 90, 255]; 16];
        for pixel in pixels.iter_mut().take(8) {
            *pixel = [10, 10, 10, 0];
        }

        for quality in [Quality::Fast, Quality::Normal, Quality::Slow] {
            let mut block = [0u8; 8];
            compress_bc1_block(&pixels, FULL_MASK, params(quality), &mut block);
            let decoded = decode_bc1(&block);

            for (pixel, actual) in pixels.iter().zip(&decoded) {
                if pixel[3] == 0 {
                    assert_eq!(0, actual[3]);
                } else {
                    assert_eq!(255, actual[3]);
                    assert!((pixel[0] as i32 - actual[0] as i32).abs() <= 8);
                    assert!((pixel[1] as i32 - actual[1] as i32).abs() <= 8);
                    assert!((pixel[2] as i32 - actual[2] as i32).abs() <= 8);
                }
            }
        }
    }

    #[test]
    fn bc3_color_block_ignores_alpha() {
        // The color endpoints shouldn't change if only alpha changes.
        let opaque = gradient_block();
        let mut transparent = opaque;
        for pixel in transparent.iter_mut() {
            pixel[3] = 0;
        }

        let mut block_opaque = [0u8; 8];
        let mut block_transparent = [0u8; 8];
        compress_bc3_color_block(&opaque, FULL_MASK, params(Quality::Normal), &mut block_opaque);
        compress_bc3_color_block(
            &transparent,
            FULL_MASK,
            params(Quality::Normal),
            &mut block_transparent,
        );
        assert_eq!(block_opaque, block_transparent);
    }

    #[test]
    fn perceptual_metric_changes_index_selection() {
        // The range fit picks the pure green and blue extremes as endpoints,
        // giving the palette (0,255,0), (0,0,255), (0,170,85), (0,85,170).
        // The last pixel sits between the two interpolated entries with a
        // green error of 60 against a blue error of 5 for one and a green
        // error of 25 against a blue error of 80 for the other. Uniform
        // weighting takes the smaller combined error while luma weighting
        // takes the smaller green error.
        let mut pixels = [[0u8, 0, 255, 255]; 16];
        for pixel in pixels.iter_mut().take(7) {
            *pixel = [0, 255, 0, 255];
        }
        pixels[15] = [0, 145, 165, 255];

        let mut uniform = [0u8; 8];
        compress_bc1_block(&pixels, FULL_MASK, params(Quality::Fast), &mut uniform);
        let mut perceptual = [0u8; 8];
        compress_bc1_block(
            &pixels,
            FULL_MASK,
            EncodeParams {
                quality: Quality::Fast,
                metric: ErrorMetric::Perceptual,
            },
            &mut perceptual,
        );
        assert_ne!(uniform, perceptual);

        // Luma weighting trades blue accuracy for green accuracy.
        let uniform_green = decode_bc1(&uniform)[15][1] as i32;
        let perceptual_green = decode_bc1(&perceptual)[15][1] as i32;
        assert_eq!(85, uniform_green);
        assert_eq!(170, perceptual_green);
        assert!((perceptual_green - 145).abs() < (uniform_green - 145).abs());
    }

    #[test]
    fn pack_565_rounds_to_nearest() {
        assert_eq!(0, pack_565(Vec3::new(0.0, 0.0, 0.0)));
        assert_eq!(0xFFFF, pack_565(Vec3::new(1.0, 1.0, 1.0)));
        // 128/255 * 31 = 15.56 rounds to 16.
        assert_eq!(16 << 11, pack_565(Vec3::new(128.0 / 255.0, 0.0, 0.0)));
    }

    #[test]
    fn unpack_565_matches_decoder_expansion() {
        assert_eq!([0, 0, 0], unpack_565(0));
        assert_eq!([255, 255, 255], unpack_565(0xFFFF));
        assert_eq!([132, 65, 197], unpack_565((16 << 11) | (16 << 5) | 24));
    }
}
