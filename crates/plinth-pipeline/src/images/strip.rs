//! Metadata stripping pass.
//!
//! Lossless for every format: only ancillary data that does not affect
//! rendering is removed. EXIF survives as its orientation tag alone.

use super::{ImageError, ImageKind, ImageOptimizer};

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// PNG chunks carrying text or timestamps.
const PNG_DROPPED: &[&[u8; 4]] = &[b"tEXt", b"zTXt", b"iTXt", b"tIME"];

/// JPEG APPn segments kept verbatim: JFIF (APP0), ICC profile (APP2), Adobe (APP14).
const JPEG_KEPT_APP: &[u8] = &[0xE0, 0xE2, 0xEE];

const APP1: u8 = 0xE1;
const APP2: u8 = 0xE2;
const EXIF_HEADER: &[u8] = b"Exif\0\0";
const ORIENTATION_TAG: u16 = 0x0112;

/// SVG content whose rendering depends on whitespace, scripting or CSS.
const SVG_UNTOUCHED: &[&str] = &["<text", "<script", "<style", "<animate", "<set", "<foreignObject"];

/// Strips metadata from PNG, JPEG and SVG files.
#[derive(Debug, Clone, Default)]
pub struct MetadataStripper;

impl ImageOptimizer for MetadataStripper {
    fn name(&self) -> &'static str {
        "strip"
    }

    fn optimize(&self, kind: ImageKind, data: &[u8]) -> Result<Option<Vec<u8>>, ImageError> {
        match kind {
            ImageKind::Png => strip_png(data).map(Some),
            ImageKind::Jpeg => strip_jpeg(data).map(Some),
            ImageKind::Svg => Ok(optimize_svg(data)),
            ImageKind::Other => Ok(None),
        }
    }
}

/// Drop text and time chunks from a PNG stream.
pub fn strip_png(data: &[u8]) -> Result<Vec<u8>, ImageError> {
    if !data.starts_with(PNG_SIGNATURE) {
        return Err(ImageError::Malformed("missing PNG signature".to_string()));
    }

    let mut out = Vec::with_capacity(data.len());
    out.extend_from_slice(PNG_SIGNATURE);

    let mut pos = PNG_SIGNATURE.len();
    while pos < data.len() {
        if pos + 8 > data.len() {
            return Err(ImageError::Malformed("truncated PNG chunk header".to_string()));
        }
        let len = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize;
        let kind = &data[pos + 4..pos + 8];
        let end = pos + 12 + len;
        if end > data.len() {
            return Err(ImageError::Malformed("truncated PNG chunk".to_string()));
        }

        if !PNG_DROPPED.iter().any(|d| d.as_slice() == kind) {
            out.extend_from_slice(&data[pos..end]);
        }
        pos = end;

        if kind == b"IEND" {
            break;
        }
    }

    Ok(out)
}

/// Drop comments and non-essential APPn segments from a JPEG stream.
pub fn strip_jpeg(data: &[u8]) -> Result<Vec<u8>, ImageError> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return Err(ImageError::Malformed("missing JPEG SOI marker".to_string()));
    }

    let mut out = Vec::with_capacity(data.len());
    out.extend_from_slice(&data[..2]);

    let mut pos = 2;
    while pos < data.len() {
        if data[pos] != 0xFF {
            return Err(ImageError::Malformed(format!("expected marker at byte {pos}")));
        }
        // Fill bytes
        let mut marker_pos = pos + 1;
        while marker_pos < data.len() && data[marker_pos] == 0xFF {
            marker_pos += 1;
        }
        if marker_pos >= data.len() {
            break;
        }
        let marker = data[marker_pos];

        // Standalone markers
        if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            out.extend_from_slice(&[0xFF, marker]);
            pos = marker_pos + 1;
            continue;
        }
        if marker == 0xD9 {
            out.extend_from_slice(&[0xFF, 0xD9]);
            break;
        }

        if marker_pos + 3 > data.len() {
            return Err(ImageError::Malformed("truncated JPEG segment".to_string()));
        }
        let len = u16::from_be_bytes([data[marker_pos + 1], data[marker_pos + 2]]) as usize;
        let end = marker_pos + 1 + len;
        if end > data.len() {
            return Err(ImageError::Malformed("truncated JPEG segment".to_string()));
        }

        // Entropy-coded data follows the scan header; copy the rest verbatim
        if marker == 0xDA {
            out.push(0xFF);
            out.extend_from_slice(&data[marker_pos..]);
            break;
        }

        let is_app = (0xE0..=0xEF).contains(&marker);
        let dropped = marker == 0xFE || (is_app && !JPEG_KEPT_APP.contains(&marker));
        if marker == APP1 {
            // EXIF shrinks to its orientation tag; the decoder needs it to rotate
            if let Some(orientation) = exif_orientation(&data[marker_pos + 3..end]).filter(|&o| o != 1) {
                out.extend(orientation_segment(orientation));
            }
        } else if !dropped {
            out.push(0xFF);
            out.extend_from_slice(&data[marker_pos..end]);
        }
        pos = end;
    }

    Ok(out)
}

/// Marker and payload of every segment before the first scan.
///
/// Stops quietly at the first malformed segment.
fn header_segments(data: &[u8]) -> Vec<(u8, &[u8])> {
    let mut segments = Vec::new();
    if !data.starts_with(&[0xFF, 0xD8]) {
        return segments;
    }

    let mut pos = 2;
    while pos + 4 <= data.len() && data[pos] == 0xFF {
        let marker = data[pos + 1];
        if marker == 0xDA || marker == 0xD9 {
            break;
        }
        let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let end = pos + 2 + len;
        if len < 2 || end > data.len() {
            break;
        }
        segments.push((marker, &data[pos + 4..end]));
        pos = end;
    }

    segments
}

/// Orientation tag (1-8) of an APP1 EXIF payload.
pub fn exif_orientation(payload: &[u8]) -> Option<u16> {
    let tiff = payload.strip_prefix(EXIF_HEADER)?;
    let big_endian = match tiff.get(..2)? {
        b"MM" => true,
        b"II" => false,
        _ => return None,
    };

    let u16_at = |pos: usize| -> Option<u16> {
        let b = tiff.get(pos..pos + 2)?;
        Some(if big_endian {
            u16::from_be_bytes([b[0], b[1]])
        } else {
            u16::from_le_bytes([b[0], b[1]])
        })
    };
    let u32_at = |pos: usize| -> Option<u32> {
        let b = tiff.get(pos..pos + 4)?;
        Some(if big_endian {
            u32::from_be_bytes([b[0], b[1], b[2], b[3]])
        } else {
            u32::from_le_bytes([b[0], b[1], b[2], b[3]])
        })
    };

    if u16_at(2)? != 42 {
        return None;
    }
    let ifd = u32_at(4)? as usize;
    let count = u16_at(ifd)? as usize;

    (0..count)
        .map(|i| ifd + 2 + i * 12)
        .find(|&entry| u16_at(entry) == Some(ORIENTATION_TAG))
        .and_then(|entry| u16_at(entry + 8))
}

/// Orientation of a JPEG stream, if its EXIF carries one.
pub fn jpeg_orientation(data: &[u8]) -> Option<u16> {
    header_segments(data)
        .into_iter()
        .filter(|(marker, _)| *marker == APP1)
        .find_map(|(_, payload)| exif_orientation(payload))
}

/// A minimal APP1 EXIF segment holding only the orientation tag.
pub fn orientation_segment(orientation: u16) -> Vec<u8> {
    let mut segment = vec![0xFF, APP1, 0x00, 0x22];
    segment.extend_from_slice(EXIF_HEADER);
    // Big-endian TIFF header, IFD0 at offset 8
    segment.extend_from_slice(&[b'M', b'M', 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08]);
    segment.extend_from_slice(&1u16.to_be_bytes());
    segment.extend_from_slice(&ORIENTATION_TAG.to_be_bytes());
    // SHORT, one value, left-aligned in the value field
    segment.extend_from_slice(&3u16.to_be_bytes());
    segment.extend_from_slice(&1u32.to_be_bytes());
    segment.extend_from_slice(&orientation.to_be_bytes());
    segment.extend_from_slice(&[0, 0]);
    segment.extend_from_slice(&0u32.to_be_bytes());
    segment
}

/// Segments a re-encoded JPEG must carry over to render like the original:
/// a non-default orientation and the ICC profile chunks.
pub fn rendering_segments(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();

    for (marker, payload) in header_segments(data) {
        match marker {
            APP1 => {
                if let Some(orientation) = exif_orientation(payload).filter(|&o| o != 1) {
                    out.extend(orientation_segment(orientation));
                }
            }
            APP2 => {
                out.extend_from_slice(&[0xFF, APP2]);
                out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
                out.extend_from_slice(payload);
            }
            _ => {}
        }
    }

    out
}

/// Re-serialize an SVG through usvg's normalized tree.
///
/// Documents with text, scripts, stylesheets or animation are left alone:
/// the normalized tree would not render them the same way.
pub fn optimize_svg(data: &[u8]) -> Option<Vec<u8>> {
    let text = std::str::from_utf8(data).ok()?;
    if SVG_UNTOUCHED.iter().any(|tag| text.contains(tag)) {
        return None;
    }

    let tree = usvg::Tree::from_data(data, &usvg::Options::default()).ok()?;
    let write_options = usvg::WriteOptions {
        indent: usvg::Indent::None,
        ..Default::default()
    };

    Some(tree.to_string(&write_options).into_bytes())
}
