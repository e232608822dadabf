//! History entry types
//!
//! [`ContentType`] is the closed set of formats the daemon stores. Everything
//! downstream of the negotiator branches on it instead of on raw MIME strings.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Supported clipboard content types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ContentType {
    /// `text/plain`, UTF-8 encoded
    Text = 0,
    /// `image/png`, original encoded bytes
    Png = 1,
    /// `image/jpeg`, original encoded bytes
    Jpeg = 2,
}

impl ContentType {
    /// All content types in capture preference order
    pub const PREFERENCE: [ContentType; 3] = [ContentType::Text, ContentType::Png, ContentType::Jpeg];

    /// Canonical MIME type
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Text => "text/plain",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    /// Wire tag
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse a wire tag
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Text),
            1 => Some(Self::Png),
            2 => Some(Self::Jpeg),
            _ => None,
        }
    }

    /// Returns true for image types
    pub fn is_image(self) -> bool {
        matches!(self, Self::Png | Self::Jpeg)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// One captured clipboard snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Stable handle, never reused within a daemon lifetime
    pub id: u64,
    /// Normalized content type
    pub content_type: ContentType,
    /// Immutable payload bytes
    pub payload: Bytes,
    /// Milliseconds since the Unix epoch of the last insert or promotion
    pub captured_at: u64,
}

impl Entry {
    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

/// Manifest row returned by `LIST`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySummary {
    /// Entry id
    pub id: u64,
    /// Content type
    pub content_type: ContentType,
    /// Payload size in bytes
    pub size: u64,
    /// Milliseconds since the Unix epoch
    pub captured_at: u64,
    /// Short single-line text preview (empty for images)
    pub preview: String,
}

/// Build a single-line preview of at most `max_chars` characters.
///
/// Whitespace runs collapse to one space so multi-line snippets stay on one row.
pub fn make_preview(content_type: ContentType, payload: &[u8], max_chars: usize) -> String {
    if content_type != ContentType::Text || max_chars == 0 {
        return String::new();
    }

    let text = String::from_utf8_lossy(payload);
    let mut preview = String::with_capacity(max_chars.min(text.len()));
    let mut count = 0;
    let mut last_was_space = false;

    for c in text.trim().chars() {
        if count == max_chars {
            break;
        }
        if c.is_whitespace() {
            if last_was_space {
                continue;
            }
            preview.push(' ');
            last_was_space = true;
        } else {
            preview.push(c);
            last_was_space = false;
        }
        count += 1;
    }

    preview
}

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_tags() {
        for content_type in ContentType::PREFERENCE {
            assert_eq!(ContentType::from_u8(content_type.as_u8()), Some(content_type));
        }
        assert_eq!(ContentType::from_u8(3), None);
        assert_eq!(ContentType::Png.to_string(), "image/png");
        assert!(ContentType::Jpeg.is_image());
        assert!(!ContentType::Text.is_image());
    }

    #[test]
    fn test_preview_collapses_whitespace() {
        let preview = make_preview(ContentType::Text, b"  fn main() {\n\n    run();\n}\n", 100);
        assert_eq!(preview, "fn main() { run(); }");
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let preview = make_preview(ContentType::Text, "héllo wörld".as_bytes(), 4);
        assert_eq!(preview, "héll");
    }

    #[test]
    fn test_preview_empty_for_images() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        assert!(make_preview(ContentType::Png, &png, 100).is_empty());
    }
}
