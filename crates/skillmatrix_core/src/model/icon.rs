//! Caller-side icon checks applied before upload.
//!
//! The object-store connector stores any bytes it is given; the ceiling and
//! format sniffing live here.

use super::ModelValidationError;

/// Largest accepted icon upload.
pub const ICON_MAX_BYTES: usize = 512 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconFormat {
    Png,
    Jpeg,
    Gif,
    Svg,
}

impl IconFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Svg => "image/svg+xml",
        }
    }
}

/// Checks size and magic bytes, returning the detected format.
pub fn validate_icon(bytes: &[u8]) -> Result<IconFormat, ModelValidationError> {
    if bytes.is_empty() {
        return Err(ModelValidationError::EmptyIcon);
    }
    if bytes.len() > ICON_MAX_BYTES {
        return Err(ModelValidationError::IconTooLarge {
            size: bytes.len(),
            max: ICON_MAX_BYTES,
        });
    }
    sniff(bytes).ok_or(ModelValidationError::UnsupportedIconFormat)
}

fn sniff(bytes: &[u8]) -> Option<IconFormat> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Some(IconFormat::Png);
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(IconFormat::Jpeg);
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some(IconFormat::Gif);
    }
    let head = &bytes[..bytes.len().min(256)];
    let text = String::from_utf8_lossy(head);
    let text = text.trim_start_matches('\u{feff}').trim_start();
    if text.starts_with("<svg") || (text.starts_with("<?xml") && text.contains("<svg")) {
        return Some(IconFormat::Svg);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::{validate_icon, IconFormat, ICON_MAX_BYTES};
    use crate::model::ModelValidationError;

    #[test]
    fn detects_supported_formats() {
        assert_eq!(validate_icon(b"\x89PNG\r\n\x1a\n....").unwrap(), IconFormat::Png);
        assert_eq!(validate_icon(b"GIF89a....").unwrap(), IconFormat::Gif);
        assert_eq!(
            validate_icon(b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>").unwrap(),
            IconFormat::Svg
        );
        assert_eq!(
            validate_icon(b"plain text"),
            Err(ModelValidationError::UnsupportedIconFormat)
        );
    }

    #[test]
    fn rejects_empty_and_oversized_payloads() {
        assert_eq!(validate_icon(b""), Err(ModelValidationError::EmptyIcon));

        let mut oversized = b"\x89PNG\r\n\x1a\n".to_vec();
        oversized.resize(ICON_MAX_BYTES + 1, 0);
        assert_eq!(
            validate_icon(&oversized),
            Err(ModelValidationError::IconTooLarge {
                size: ICON_MAX_BYTES + 1,
                max: ICON_MAX_BYTES,
            })
        );
    }
}
