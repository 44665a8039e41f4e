//! Pixel normalization shared by the dataset loader and anything rendering model inputs.

use crate::label_map::ValidationError;

/// `pixel / PIXEL_SCALE - 1` maps `[0, 255]` onto `[-1, 1]`.
pub const PIXEL_SCALE: f32 = 127.5;

pub fn normalize_pixel(v: u8) -> f32 {
    v as f32 / PIXEL_SCALE - 1.0
}

pub fn denormalize_pixel(x: f32) -> f32 {
    (x + 1.0) * PIXEL_SCALE
}

/// Interleaved RGB bytes (row-major, HWC) into normalized CHW floats.
pub fn normalize_rgb_to_chw(
    width: u32,
    height: u32,
    rgb: &[u8],
) -> Result<Vec<f32>, ValidationError> {
    let plane = width as usize * height as usize;
    if rgb.len() != plane * 3 {
        return Err(ValidationError::BufferLength {
            expected: plane * 3,
            actual: rgb.len(),
        });
    }
    let mut out = vec![0.0f32; plane * 3];
    for (p, px) in rgb.chunks_exact(3).enumerate() {
        for c in 0..3 {
            out[c * plane + p] = normalize_pixel(px[c]);
        }
    }
    Ok(out)
}

/// Inverse of [`normalize_rgb_to_chw`], rounding and clamping back to bytes.
pub fn denormalize_chw_to_rgb(
    width: u32,
    height: u32,
    chw: &[f32],
) -> Result<Vec<u8>, ValidationError> {
    let plane = width as usize * height as usize;
    if chw.len() != plane * 3 {
        return Err(ValidationError::BufferLength {
            expected: plane * 3,
            actual: chw.len(),
        });
    }
    let mut out = vec![0u8; plane * 3];
    for p in 0..plane {
        for c in 0..3 {
            out[p * 3 + c] = denormalize_pixel(chw[c * plane + p]).round().clamp(0.0, 255.0) as u8;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_map_to_unit_range() {
        assert_eq!(normalize_pixel(0), -1.0);
        assert_eq!(normalize_pixel(255), 1.0);
        assert!(normalize_pixel(127).abs() < 0.01);
    }

    #[test]
    fn round_trip_every_byte() {
        for v in 0..=255u8 {
            let back = denormalize_pixel(normalize_pixel(v));
            assert!((back - v as f32).abs() < 1e-3, "{v} -> {back}");
        }
    }

    #[test]
    fn chw_layout_and_inverse() {
        // 2x1 image: red, then blue.
        let rgb = [255, 0, 0, 0, 0, 255];
        let chw = normalize_rgb_to_chw(2, 1, &rgb).unwrap();
        assert_eq!(chw, vec![1.0, -1.0, -1.0, -1.0, -1.0, 1.0]);
        assert_eq!(denormalize_chw_to_rgb(2, 1, &chw).unwrap(), rgb.to_vec());
        assert!(normalize_rgb_to_chw(2, 2, &rgb).is_err());
    }
}
