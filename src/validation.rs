//! Inbound image validation
//!
//! Gate applied to every base64 image before it is forwarded to the provider.
//! Validation never transforms the image; callers keep the original string.

use crate::error::ValidationError;
use base64::Engine as _;
use image::{ImageFormat, ImageReader, Limits};
use std::io::Cursor;

/// Largest decoded image accepted, in bytes.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Largest width or height accepted by the integrity decode.
pub const MAX_IMAGE_DIMENSION: u32 = 8192;

/// Allocation ceiling for the integrity decode.
pub const MAX_DECODE_ALLOC: u64 = 128 * 1024 * 1024;

/// Drop a `data:<mime>;base64,` prefix (everything up to the first comma).
pub fn strip_data_url(raw: &str) -> &str {
    match raw.split_once(',') {
        Some((_, payload)) => payload,
        None => raw,
    }
}

/// The base64 body of `raw` with any data-URL prefix and all ASCII whitespace removed.
///
/// This is both what validation decodes and what gets forwarded upstream.
pub fn compact_base64(raw: &str) -> String {
    strip_data_url(raw)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect()
}

/// Check that `raw` is a base64 JPEG, PNG, GIF or WebP image of at most 5 MiB.
pub fn validate(raw: &str) -> Result<(), ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::EmptyInput);
    }

    // Line-wrapped base64 is common in pasted data URLs.
    let compact = compact_base64(raw);
    if compact.is_empty() {
        return Err(ValidationError::EmptyInput);
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|_| ValidationError::DecodeError)?;

    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ValidationError::TooLarge { size: bytes.len() });
    }

    check_image_structure(&bytes, decode_limits())
}

fn decode_limits() -> Limits {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_IMAGE_DIMENSION);
    limits.max_image_height = Some(MAX_IMAGE_DIMENSION);
    limits.max_alloc = Some(MAX_DECODE_ALLOC);
    limits
}

fn check_image_structure(bytes: &[u8], limits: Limits) -> Result<(), ValidationError> {
    let format = image::guess_format(bytes).map_err(|_| ValidationError::UnsupportedFormat)?;

    if !matches!(
        format,
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Gif | ImageFormat::WebP
    ) {
        tracing::debug!("Rejecting image in unsupported format {:?}", format);
        return Err(ValidationError::UnsupportedFormat);
    }

    // A full decode catches truncated or corrupted bodies behind a valid header.
    let mut reader = ImageReader::with_format(Cursor::new(bytes), format);
    reader.limits(limits);
    reader.decode().map_err(|e| {
        tracing::debug!("Image failed integrity check as {:?}: {}", format, e);
        ValidationError::UnsupportedFormat
    })?;

    Ok(())
}


#[cfg(test)]
mod tests {
    use super::fixtures::{encode_image, png_base64};
    use super::*;

    fn b64(bytes: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    #[test]
    fn test_accepts_png_fixture() {
        assert_eq!(validate(&png_base64()), Ok(()));
    }

    #[test]
    fn test_accepts_every_supported_format() {
        for format in [
            ImageFormat::Jpeg,
            ImageFormat::Png,
            ImageFormat::Gif,
            ImageFormat::WebP,
        ] {
            let encoded = b64(&encode_image(format));
            assert_eq!(validate(&encoded), Ok(()), "format {:?}", format);
        }
    }

    #[test]
    fn test_rejects_empty_input() {
        assert_eq!(validate(""), Err(ValidationError::EmptyInput));
        assert_eq!(validate("   "), Err(ValidationError::EmptyInput));
        assert_eq!(
            validate("data:image/png;base64,"),
            Err(ValidationError::EmptyInput)
        );
        assert_eq!(
            validate("data:image/png;base64,  \n"),
            Err(ValidationError::EmptyInput)
        );
    }

    #[test]
    fn test_rejects_non_base64() {
        for input in ["not base64 at all!", "@@@@", "abc$", "====", "YWJj*"] {
            assert_eq!(
                validate(input),
                Err(ValidationError::DecodeError),
                "input {:?}",
                input
            );
        }
    }

    #[test]
    fn test_rejects_oversized_payload_with_actual_size() {
        let mut bytes = vec![0u8; MAX_IMAGE_BYTES + 1024];
        bytes[..4].copy_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0]);

        match validate(&b64(&bytes)) {
            Err(ValidationError::TooLarge { size }) => {
                assert_eq!(size, bytes.len());
                let reported = size as f64 / (1024.0 * 1024.0);
                let actual = bytes.len() as f64 / (1024.0 * 1024.0);
                assert!((reported - actual).abs() < 0.1);
            }
            other => panic!("expected TooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_exactly_five_mib_is_not_too_large() {
        let bytes = vec![0u8; MAX_IMAGE_BYTES];
        // Passes the size gate, then fails the format check.
        assert_eq!(
            validate(&b64(&bytes)),
            Err(ValidationError::UnsupportedFormat)
        );
    }

    #[test]
    fn test_rejects_bytes_that_are_not_an_image() {
        assert_eq!(
            validate(&b64(b"plain text, definitely not an image")),
            Err(ValidationError::UnsupportedFormat)
        );
    }

    #[test]
    fn test_rejects_truncated_png_behind_valid_header() {
        let png = encode_image(ImageFormat::Png);
        let truncated = &png[..png.len() / 2];
        assert_eq!(
            validate(&b64(truncated)),
            Err(ValidationError::UnsupportedFormat)
        );
    }

    #[test]
    fn test_rejects_decodable_but_unsupported_format() {
        let bmp = encode_image(ImageFormat::Bmp);
        assert_eq!(validate(&b64(&bmp)), Err(ValidationError::UnsupportedFormat));
    }

    #[test]
    fn test_data_url_prefix_behaves_like_bare_payload() {
        let bare = png_base64();
        let prefixed = format!("data:image/png;base64,{}", bare);
        assert_eq!(validate(&prefixed), validate(&bare));

        let garbage = "%%%%";
        let prefixed_garbage = format!("data:image/png;base64,{}", garbage);
        assert_eq!(validate(&prefixed_garbage), validate(garbage));
        assert_eq!(validate(garbage), Err(ValidationError::DecodeError));
    }

    #[test]
    fn test_tolerates_line_wrapped_base64() {
        let bare = png_base64();
        let (head, tail) = bare.split_at(bare.len() / 2);
        let wrapped = format!("{}\n{}", head, tail);
        assert_eq!(validate(&wrapped), Ok(()));
    }

    #[test]
    fn test_dimensions_beyond_decode_limits_are_rejected() {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([0, 0, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let mut tight = Limits::default();
        tight.max_image_width = Some(2);
        tight.max_image_height = Some(2);

        assert_eq!(
            check_image_structure(&bytes, tight),
            Err(ValidationError::UnsupportedFormat)
        );
        assert_eq!(check_image_structure(&bytes, decode_limits()), Ok(()));
    }

    #[test]
    fn test_compact_base64_drops_prefix_and_inner_whitespace() {
        assert_eq!(
            compact_base64("data:image/png;base64, AA\r\nBB\tCC \n"),
            "AABBCC"
        );
        assert_eq!(compact_base64("AAAA"), "AAAA");
    }

    #[test]
    fn test_strip_data_url() {
        assert_eq!(strip_data_url("data:image/png;base64,AAAA"), "AAAA");
        assert_eq!(strip_data_url("AAAA"), "AAAA");
    }
}
