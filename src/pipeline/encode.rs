//! Image encoding: `DynamicImage` → PNG → `data:` URL.
//!
//! Rasterised pages travel inside folio content and the import JSON, so
//! they are embedded as base64 data URLs rather than written to disk. PNG
//! keeps scanned text crisp; JPEG artefacts around glyph edges make later
//! OCR noticeably worse.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Encode a rasterised page as a `data:image/png;base64,…` URL.
pub fn to_data_url(img: &DynamicImage) -> Result<String, image::ImageError> {
    let png = encode_png(img)?;
    let b64 = STANDARD.encode(&png);
    debug!(
        "Encoded {}x{} page image → {} bytes base64",
        img.width(),
        img.height(),
        b64.len()
    );
    Ok(format!("data:image/png;base64,{}", b64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let url = to_data_url(&img).expect("encode should succeed");
        let b64 = url
            .strip_prefix("data:image/png;base64,")
            .expect("data url prefix");
        let decoded = STANDARD.decode(b64).expect("valid base64");
        assert_eq!(&decoded[1..4], b"PNG");
    }
}
