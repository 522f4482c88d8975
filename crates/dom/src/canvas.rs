//! Canvas bitmap helpers: blank detection and `toDataURL` encoding

use crate::error::{DomError, Result};
use crate::types::{CanvasState, DataUrlOptions};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageOutputFormat, RgbaImage};
use std::io::Cursor;

/// Side of the square blocks the blank check scans at a time
const BLANK_CHUNK: u32 = 50;

/// True when every pixel is transparent black
///
/// Scans in 50×50 blocks so a drawn corner is found without touching the
/// rest of a large bitmap.
pub fn is_blank(canvas: &CanvasState) -> bool {
    let (width, height) = (canvas.width, canvas.height);
    let mut y = 0;
    while y < height {
        let mut x = 0;
        while x < width {
            let chunk_w = BLANK_CHUNK.min(width - x);
            let chunk_h = BLANK_CHUNK.min(height - y);
            for row in y..y + chunk_h {
                let Some(slice) = row_span(row, x, width, chunk_w).and_then(|span| canvas.pixels.get(span)) else {
                    return true;
                };
                if slice.iter().any(|b| *b != 0) {
                    return false;
                }
            }
            x += BLANK_CHUNK;
        }
        y += BLANK_CHUNK;
    }
    true
}

/// Byte range of `len` pixels starting at (`x`, `row`), None on overflow
fn row_span(row: u32, x: u32, width: u32, len: u32) -> Option<std::ops::Range<usize>> {
    let start = (row as usize)
        .checked_mul(width as usize)?
        .checked_add(x as usize)?
        .checked_mul(4)?;
    let end = start.checked_add((len as usize).checked_mul(4)?)?;
    Some(start..end)
}

/// Encode an RGBA8 bitmap as a `data:` URL
///
/// `image/jpeg` honours `quality` (0.0–1.0, default 0.92); anything else
/// falls back to PNG like a browser does for unsupported types.
pub fn encode_data_url(width: u32, height: u32, pixels: &[u8], options: &DataUrlOptions) -> Result<String> {
    if width == 0 || height == 0 {
        return Ok("data:,".to_string());
    }

    let bitmap = RgbaImage::from_raw(width, height, pixels.to_vec()).ok_or_else(|| {
        DomError::Encode(format!(
            "pixel buffer of {} bytes does not fit {}x{}",
            pixels.len(),
            width,
            height
        ))
    })?;
    let image = DynamicImage::ImageRgba8(bitmap);

    let (mime, format, image) = match options.mime_type.as_str() {
        "image/jpeg" => {
            let quality = (options.quality.unwrap_or(0.92).clamp(0.0, 1.0) * 100.0).round() as u8;
            (
                "image/jpeg",
                ImageOutputFormat::Jpeg(quality.max(1)),
                DynamicImage::ImageRgb8(image.to_rgb8()),
            )
        }
        _ => ("image/png", ImageOutputFormat::Png, image),
    };

    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), format)
        .map_err(|e| DomError::Encode(e.to_string()))?;

    Ok(format!("data:{};base64,{}", mime, BASE64_STANDARD.encode(&buf)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_detection() {
        let mut canvas = CanvasState::new(120, 80);
        assert!(is_blank(&canvas));

        // last pixel of the last chunk
        let last = canvas.pixels.len() - 1;
        canvas.pixels[last] = 255;
        assert!(!is_blank(&canvas));
    }

    #[test]
    fn test_row_span_beyond_u32() {
        let span = row_span(60_000, 10, 100_000, 50).unwrap();
        assert_eq!(span.start, 24_000_000_040);
        assert_eq!(span.end, 24_000_000_240);
    }

    #[test]
    fn test_encode_png_and_jpeg() {
        let canvas = CanvasState::new(4, 4);
        let png = encode_data_url(4, 4, &canvas.pixels, &DataUrlOptions::default()).unwrap();
        assert!(png.starts_with("data:image/png;base64,"));

        let jpeg_options = DataUrlOptions {
            mime_type: "image/jpeg".to_string(),
            quality: Some(0.5),
        };
        let jpeg = encode_data_url(4, 4, &canvas.pixels, &jpeg_options).unwrap();
        assert!(jpeg.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_empty_canvas_encodes_to_empty_url() {
        assert_eq!(
            encode_data_url(0, 10, &[], &DataUrlOptions::default()).unwrap(),
            "data:,"
        );
    }

    #[test]
    fn test_short_buffer_is_an_error() {
        assert!(encode_data_url(2, 2, &[0; 4], &DataUrlOptions::default()).is_err());
    }
}
