//! Artifact encoding: raster preview → PNG bytes, and bytes → base64.
//!
//! Both artifacts travel inside a JSON envelope, so they are base64-encoded
//! with the standard alphabet and padding. The preview additionally becomes
//! a `data:image/png;base64,` URI that a browser can display directly.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// MIME prefix of every preview URI.
pub const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Encode a rasterised page as PNG.
///
/// PNG is lossless, so rendered text stays crisp in the preview.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "Encoded {}x{} preview → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

/// Standard-alphabet, padded base64.
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Wrap PNG bytes in a `data:` URI.
pub fn png_data_uri(png: &[u8]) -> String {
    let b64 = to_base64(png);
    let mut uri = String::with_capacity(PNG_DATA_URI_PREFIX.len() + b64.len());
    uri.push_str(PNG_DATA_URI_PREFIX);
    uri.push_str(&b64);
    uri
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let png = encode_png(&img).expect("encode should succeed");
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&png).expect("valid png");
        assert_eq!((decoded.width(), decoded.height()), (10, 10));
    }

    #[test]
    fn base64_is_padded_standard_alphabet() {
        assert_eq!(to_base64(b"%PDF-"), "JVBERi0=");
        assert_eq!(to_base64(&[0xfb, 0xff]), "+/8=");
    }

    #[test]
    fn data_uri_prefix() {
        let uri = png_data_uri(b"abc");
        assert_eq!(uri, "data:image/png;base64,YWJj");
        let payload = uri.strip_prefix(PNG_DATA_URI_PREFIX).unwrap();
        assert_eq!(STANDARD.decode(payload).unwrap(), b"abc");
    }
}
