//! Frame preprocessing: image bytes to planar float32 tensor.
//!
//! The conversion matches the detection model's expected input exactly:
//! - resize to `input_size x input_size`, stretching both axes
//!   independently (keep_ratio=false, no letterbox padding)
//! - normalize per channel: `px / 255 / std[c] - mean[c] / std[c]`
//! - reorder interleaved RGB into three contiguous planes (CHW)
//!
//! Sampling is nearest-neighbor: `src = floor((dst / input_size) * src_dim)`
//! clamped to the source bounds. Per-axis source-index lookup tables are
//! built once per call so the inner loop is a pair of indexed reads.

use std::path::Path;

use image::GenericImageView;

use crate::config::ModelConfig;
use crate::error::PipelineError;

/// Planar input tensor plus the geometry needed to map detections back
/// into original-image pixel space. Created once per frame, consumed by
/// the inference backend and decoder, then discarded.
#[derive(Clone, Debug)]
pub struct PreprocessResult {
    /// Channel-major buffer, length `3 * input_size * input_size`.
    pub planar: Vec<f32>,
    pub original_width: u32,
    pub original_height: u32,
    /// `input_size / original_width`.
    pub scale_x: f32,
    /// `input_size / original_height`.
    pub scale_y: f32,
}

/// Decode, resize, normalize and planarize a captured image.
pub fn preprocess(bytes: &[u8], config: &ModelConfig) -> Result<PreprocessResult, PipelineError> {
    let decoded = image::load_from_memory(bytes)?;
    let (original_width, original_height) = decoded.dimensions();
    if original_width == 0 || original_height == 0 {
        return Err(PipelineError::EmptyImage {
            width: original_width,
            height: original_height,
        });
    }

    let rgb = decoded.into_rgb8();
    let size = config.input_size as usize;
    let src_w = original_width as usize;
    let src_h = original_height as usize;

    let inv_scale = [
        1.0 / (255.0 * config.std[0]),
        1.0 / (255.0 * config.std[1]),
        1.0 / (255.0 * config.std[2]),
    ];
    let mean_norm = [
        config.mean[0] / config.std[0],
        config.mean[1] / config.std[1],
        config.mean[2] / config.std[2],
    ];

    // Source row byte offsets and source x byte offsets, one table per axis.
    let src_y_offset: Vec<usize> = (0..size)
        .map(|y| source_index(y, size, src_h) * src_w * 3)
        .collect();
    let src_x_offset: Vec<usize> = (0..size)
        .map(|x| source_index(x, size, src_w) * 3)
        .collect();

    let raw = rgb.as_raw();
    let plane = size * size;
    let mut planar = vec![0.0f32; 3 * plane];

    for y in 0..size {
        let row = src_y_offset[y];
        let dst_row = y * size;
        for x in 0..size {
            let src = row + src_x_offset[x];
            let dst = dst_row + x;
            planar[dst] = raw[src] as f32 * inv_scale[0] - mean_norm[0];
            planar[plane + dst] = raw[src + 1] as f32 * inv_scale[1] - mean_norm[1];
            planar[2 * plane + dst] = raw[src + 2] as f32 * inv_scale[2] - mean_norm[2];
        }
    }

    Ok(PreprocessResult {
        planar,
        original_width,
        original_height,
        scale_x: config.input_size as f32 / original_width as f32,
        scale_y: config.input_size as f32 / original_height as f32,
    })
}

/// Read an image file and preprocess it. The live pipeline captures to a
/// temp file and hands the path here.
pub fn preprocess_file<P: AsRef<Path>>(
    path: P,
    config: &ModelConfig,
) -> Result<PreprocessResult, PipelineError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| {
        PipelineError::Capture(format!("failed to read frame {}: {}", path.display(), e))
    })?;
    preprocess(&bytes, config)
}

fn source_index(dst: usize, dst_size: usize, src_size: usize) -> usize {
    let idx = (dst as f32 / dst_size as f32 * src_size as f32).floor() as usize;
    idx.min(src_size - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_png(pixels: image::RgbImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        pixels
            .write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageFormat::Png,
            )
            .expect("encode test image");
        bytes
    }

    fn test_config(input_size: u32) -> ModelConfig {
        ModelConfig {
            input_size,
            ..ModelConfig::default()
        }
    }

    #[test]
    fn output_has_planar_length_and_finite_values() {
        let img = image::RgbImage::from_fn(31, 17, |x, y| {
            image::Rgb([(x * 7) as u8, (y * 11) as u8, 200])
        });
        let bytes = encode_png(img);

        let config = test_config(16);
        let result = preprocess(&bytes, &config).expect("preprocess");

        assert_eq!(result.planar.len(), 3 * 16 * 16);
        assert!(result.planar.iter().all(|v| v.is_finite()));
        assert_eq!(result.original_width, 31);
        assert_eq!(result.original_height, 17);
    }

    #[test]
    fn scale_factors_are_per_axis() {
        let img = image::RgbImage::from_pixel(320, 240, image::Rgb([0, 0, 0]));
        let bytes = encode_png(img);

        let config = test_config(320);
        let result = preprocess(&bytes, &config).expect("preprocess");

        assert!((result.scale_x - 1.0).abs() < 1e-6);
        assert!((result.scale_y - 320.0 / 240.0).abs() < 1e-6);
    }

    #[test]
    fn mean_valued_image_normalizes_to_zero() {
        let config = test_config(8);
        // A pixel equal to round(255 * mean[c]) must land on (approximately)
        // zero after normalization in plane c.
        let px = image::Rgb([
            (255.0 * config.mean[0]).round() as u8,
            (255.0 * config.mean[1]).round() as u8,
            (255.0 * config.mean[2]).round() as u8,
        ]);
        let bytes = encode_png(image::RgbImage::from_pixel(12, 12, px));

        let result = preprocess(&bytes, &config).expect("preprocess");

        // Rounding 255*mean to u8 costs up to 0.5/255 in pixel space; allow
        // that error divided by the smallest std.
        let eps = 0.5 / 255.0 / 0.224 + 1e-5;
        for (i, v) in result.planar.iter().enumerate() {
            assert!(v.abs() <= eps, "plane value {} at {} not near zero", v, i);
        }
    }

    #[test]
    fn garbage_bytes_fail_with_decode_error() {
        let config = test_config(8);
        let err = preprocess(b"not an image", &config).unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
    }

    #[test]
    fn nearest_sampling_picks_expected_pixels() {
        // 2x1 source: left red, right blue. Upscaled to 4x4, the left two
        // columns must be red and the right two blue.
        let mut img = image::RgbImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgb([255, 0, 0]));
        img.put_pixel(1, 0, image::Rgb([0, 0, 255]));
        let bytes = encode_png(img);

        let config = test_config(4);
        let result = preprocess(&bytes, &config).expect("preprocess");

        let plane = 16;
        let red_max = 255.0 / 255.0 / config.std[0] - config.mean[0] / config.std[0];
        let red_min = -config.mean[0] / config.std[0];
        for y in 0..4 {
            for x in 0..2 {
                let v = result.planar[y * 4 + x];
                assert!((v - red_max).abs() < 1e-4, "left red plane: {}", v);
            }
            for x in 2..4 {
                let v = result.planar[y * 4 + x];
                assert!((v - red_min).abs() < 1e-4, "right red plane: {}", v);
            }
        }
        // Blue plane mirrors it.
        for y in 0..4 {
            let left = result.planar[2 * plane + y * 4];
            let right = result.planar[2 * plane + y * 4 + 3];
            assert!(left < right);
        }
    }
}
