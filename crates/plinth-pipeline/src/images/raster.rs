//! Raster re-encoding pass.
//!
//! | Format | Encoder |
//! |---|---|
//! | PNG | `image::codecs::png::PngEncoder`, best compression, adaptive filter |
//! | Baseline JPEG | `image::codecs::jpeg::JpegEncoder`, only when a quality is configured |
//! | Progressive JPEG | skipped; left to the metadata pass |
//!
//! JPEG re-encoding is lossy, so it is opt-in. Re-encoded files carry the
//! original's orientation and ICC profile.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::ImageFormat;

use super::strip::rendering_segments;
use super::{ImageError, ImageKind, ImageOptimizer};

/// JPEG start-of-frame marker for progressive DCT.
const SOF2: u8 = 0xC2;

/// Re-encodes decodable rasters.
#[derive(Debug, Clone)]
pub struct RasterOptimizer {
    /// Baseline JPEGs are left alone when unset
    pub jpeg_quality: Option<u8>,
}

impl RasterOptimizer {
    pub fn new(jpeg_quality: Option<u8>) -> Self {
        Self {
            jpeg_quality: jpeg_quality.map(|q| q.clamp(1, 100)),
        }
    }
}

impl ImageOptimizer for RasterOptimizer {
    fn name(&self) -> &'static str {
        "raster"
    }

    fn optimize(&self, kind: ImageKind, data: &[u8]) -> Result<Option<Vec<u8>>, ImageError> {
        match kind {
            ImageKind::Png => {
                let img = image::load_from_memory_with_format(data, ImageFormat::Png)
                    .map_err(|e| ImageError::Decode(e.to_string()))?;
                let mut out = Vec::new();
                let encoder = PngEncoder::new_with_quality(
                    &mut out,
                    CompressionType::Best,
                    FilterType::Adaptive,
                );
                img.write_with_encoder(encoder)
                    .map_err(|e| ImageError::Encode(e.to_string()))?;
                Ok(Some(out))
            }
            ImageKind::Jpeg if is_progressive(data) => Ok(None),
            ImageKind::Jpeg => {
                let Some(quality) = self.jpeg_quality else {
                    return Ok(None);
                };
                let img = image::load_from_memory_with_format(data, ImageFormat::Jpeg)
                    .map_err(|e| ImageError::Decode(e.to_string()))?;
                let mut out = Vec::new();
                let encoder = JpegEncoder::new_with_quality(&mut out, quality);
                img.write_with_encoder(encoder)
                    .map_err(|e| ImageError::Encode(e.to_string()))?;
                Ok(Some(splice_after_jfif(out, &rendering_segments(data))))
            }
            _ => Ok(None),
        }
    }
}

/// Insert `segments` after SOI and the encoder's JFIF header.
fn splice_after_jfif(encoded: Vec<u8>, segments: &[u8]) -> Vec<u8> {
    if segments.is_empty() || encoded.len() < 4 {
        return encoded;
    }

    let mut at = 2;
    if encoded[2..4] == [0xFF, 0xE0] && encoded.len() >= 6 {
        at = (4 + u16::from_be_bytes([encoded[4], encoded[5]]) as usize).min(encoded.len());
    }

    let mut out = Vec::with_capacity(encoded.len() + segments.len());
    out.extend_from_slice(&encoded[..at]);
    out.extend_from_slice(segments);
    out.extend_from_slice(&encoded[at..]);
    out
}

/// Check for a progressive (SOF2) frame header before the scan data.
pub fn is_progressive(data: &[u8]) -> bool {
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return false;
        }
        let marker = data[pos + 1];
        if marker == SOF2 {
            return true;
        }
        // Start of scan: no frame header beyond this point
        if marker == 0xDA {
            return false;
        }
        let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        pos += 2 + len;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::strip::{jpeg_orientation, orientation_segment};
    use image::{ImageEncoder, RgbImage};

    fn sample_png(compression: CompressionType) -> Vec<u8> {
        let img = RgbImage::from_fn(64, 64, |x, y| image::Rgb([(x * 4) as u8, (y * 4) as u8, 0]));
        let mut out = Vec::new();
        PngEncoder::new_with_quality(&mut out, compression, FilterType::NoFilter)
            .write_image(img.as_raw(), 64, 64, image::ExtendedColorType::Rgb8)
            .unwrap();
        out
    }

    fn sample_jpeg() -> Vec<u8> {
        let img = RgbImage::from_fn(32, 32, |x, y| image::Rgb([x as u8, y as u8, 128]));
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, 100)
            .write_image(img.as_raw(), 32, 32, image::ExtendedColorType::Rgb8)
            .unwrap();
        out
    }

    #[test]
    fn recompresses_png_losslessly() {
        let input = sample_png(CompressionType::Fast);
        let optimizer = RasterOptimizer::new(None);

        let out = optimizer.optimize(ImageKind::Png, &input).unwrap().unwrap();

        let before = image::load_from_memory(&input).unwrap().to_rgb8();
        let after = image::load_from_memory(&out).unwrap().to_rgb8();
        assert_eq!(before, after);
    }

    #[test]
    fn reencodes_baseline_jpeg() {
        let input = sample_jpeg();
        let optimizer = RasterOptimizer::new(Some(60));

        let out = optimizer.optimize(ImageKind::Jpeg, &input).unwrap().unwrap();

        assert!(out.len() < input.len());
        assert!(!is_progressive(&input));
    }

    #[test]
    fn jpeg_is_untouched_without_quality() {
        let out = RasterOptimizer::new(None)
            .optimize(ImageKind::Jpeg, &sample_jpeg())
            .unwrap();

        assert!(out.is_none());
    }

    #[test]
    fn reencoded_jpeg_keeps_orientation_and_icc() {
        let icc = [0xFF, 0xE2, 0x00, 0x08, b'I', b'C', b'C', b'_', 0x01, 0x01];
        let plain = sample_jpeg();
        let jfif_end = 4 + u16::from_be_bytes([plain[4], plain[5]]) as usize;
        let mut input = plain[..jfif_end].to_vec();
        input.extend(orientation_segment(6));
        input.extend_from_slice(&icc);
        input.extend_from_slice(&plain[jfif_end..]);

        let out = RasterOptimizer::new(Some(60))
            .optimize(ImageKind::Jpeg, &input)
            .unwrap()
            .unwrap();

        assert_eq!(jpeg_orientation(&out), Some(6));
        assert!(out.windows(icc.len()).any(|w| w == icc));
        assert_eq!(&out[2..4], &[0xFF, 0xE0]);
        image::load_from_memory(&out).unwrap();
    }

    #[test]
    fn detects_progressive_frames() {
        let mut data = vec![0xFF, 0xD8];
        data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00]);
        data.extend_from_slice(&[0xFF, SOF2, 0x00, 0x04, 0x00, 0x00]);

        assert!(is_progressive(&data));
        assert_eq!(
            RasterOptimizer::new(Some(85)).optimize(ImageKind::Jpeg, &data).unwrap(),
            None
        );
    }

    #[test]
    fn undecodable_png_is_an_error() {
        let result = RasterOptimizer::new(None).optimize(ImageKind::Png, b"not a png");

        assert!(matches!(result, Err(ImageError::Decode(_))));
    }

    #[test]
    fn ignores_other_kinds() {
        let out = RasterOptimizer::new(None)
            .optimize(ImageKind::Svg, b"<svg/>")
            .unwrap();

        assert!(out.is_none());
    }
}
