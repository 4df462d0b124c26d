//! Frame payload codec: data URLs, decode, resample and JPEG encode.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::error::FrameError;

pub const DEFAULT_JPEG_QUALITY: u8 = 85;

const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Decode a frame sent as a data URL (`data:image/...;base64,`) or as bare
/// base64.
pub fn decode_data_url(payload: &str) -> Result<RgbImage, FrameError> {
    let encoded = match payload.split_once(',') {
        Some((header, data)) if header.starts_with("data:") => data,
        Some(_) => {
            return Err(FrameError::InvalidFrame("malformed data URL".to_string()));
        }
        None => payload,
    };

    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| FrameError::InvalidFrame(format!("invalid base64: {e}")))?;
    decode_bytes(&bytes)
}

/// Decode raw image bytes (JPEG, PNG or WebP).
pub fn decode_bytes(bytes: &[u8]) -> Result<RgbImage, FrameError> {
    if bytes.is_empty() {
        return Err(FrameError::InvalidFrame("empty image payload".to_string()));
    }
    let image = image::load_from_memory(bytes)
        .map_err(|e| FrameError::InvalidFrame(format!("cannot decode image: {e}")))?;
    let rgb = image.to_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(FrameError::InvalidFrame("image has no pixels".to_string()));
    }
    Ok(rgb)
}

/// Encode as JPEG. `quality` is clamped to `1..=100`.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, FrameError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode_image(image)
        .map_err(|e| FrameError::Processing(format!("JPEG encode failed: {e}")))?;
    Ok(buf)
}

pub fn encode_data_url(image: &RgbImage, quality: u8) -> Result<String, FrameError> {
    let jpeg = encode_jpeg(image, quality)?;
    Ok(format!("{JPEG_DATA_URL_PREFIX}{}", STANDARD.encode(jpeg)))
}

/// Shrink `image` to at most `max_width` pixels wide, keeping aspect ratio.
///
/// Returns the (possibly unchanged) image and the applied scale factor
/// (`1.0` when no resize happened).
pub fn downscale(image: RgbImage, max_width: u32) -> (RgbImage, f64) {
    let (w, h) = image.dimensions();
    if max_width == 0 || w <= max_width {
        return (image, 1.0);
    }
    let scale = f64::from(max_width) / f64::from(w);
    let new_h = ((f64::from(h) * scale).round() as u32).max(1);
    (imageops::resize(&image, max_width, new_h, FilterType::Triangle), scale)
}

/// Resize `image` back to `width` × `height` (no-op if it already matches).
pub fn resize_to(image: RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image;
    }
    imageops::resize(&image, width, height, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use image::Rgb;

    fn sample(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([10, 200, 30]))
    }

    #[test]
    fn data_url_survives_encode_and_decode() {
        let url = encode_data_url(&sample(16, 8), 90).unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));

        let decoded = decode_data_url(&url).unwrap();
        assert_eq!(decoded.dimensions(), (16, 8));
    }

    #[test]
    fn bare_base64_is_accepted() {
        let jpeg = encode_jpeg(&sample(4, 4), 80).unwrap();
        let decoded = decode_data_url(&STANDARD.encode(jpeg)).unwrap();
        assert_eq!(decoded.dimensions(), (4, 4));
    }

    #[test]
    fn garbage_is_invalid_frame() {
        assert_matches!(decode_data_url("not base64!!"), Err(FrameError::InvalidFrame(_)));
        assert_matches!(
            decode_data_url("data:image/jpeg;base64,aGVsbG8="),
            Err(FrameError::InvalidFrame(_))
        );
        assert_matches!(decode_data_url("foo,bar"), Err(FrameError::InvalidFrame(_)));
        assert_matches!(decode_bytes(&[]), Err(FrameError::InvalidFrame(_)));
    }

    #[test]
    fn downscale_only_when_wider_than_limit() {
        let (same, scale) = downscale(sample(320, 240), 640);
        assert_eq!(same.dimensions(), (320, 240));
        assert_eq!(scale, 1.0);

        let (small, scale) = downscale(sample(1280, 720), 640);
        assert_eq!(small.dimensions(), (640, 360));
        assert_eq!(scale, 0.5);
    }

    #[test]
    fn resize_to_restores_dimensions() {
        let out = resize_to(sample(640, 360), 1280, 720);
        assert_eq!(out.dimensions(), (1280, 720));
    }
}
