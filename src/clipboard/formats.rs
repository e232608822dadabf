//! Content Negotiation
//!
//! Maps the identifiers a clipboard source offers onto the closed
//! [`ContentType`] set and reads the winning one.
//!
//! Identifiers are compared on their MIME essence: the type/subtype pair,
//! lowercased, with parameters dropped. `text/plain;charset=utf-8` is therefore
//! text, as is the X11 `UTF8_STRING` atom that Xwayland clients advertise.
//! When several text identifiers are offered the most specific one is read:
//! `text/plain;charset=utf-8`, then any other `text/plain`, then `UTF8_STRING`.

use bytes::Bytes;
use std::time::Duration;
use tracing::{debug, trace};

use crate::clipboard::backend::ClipboardBackend;
use crate::clipboard::error::{ClipboardError, Result};
use crate::history::ContentType;

/// X11 UTF-8 text atom
pub const UTF8_STRING: &str = "UTF8_STRING";

/// Default maximum payload size (50 MB)
pub const DEFAULT_MAX_ENTRY_SIZE: usize = 50_000_000;

/// Default read timeout
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 5000;

/// Outcome of negotiation: what to store and which offered identifier to read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiated {
    /// Normalized content type
    pub content_type: ContentType,
    /// Identifier exactly as offered
    pub mime_type: String,
}

/// Successfully captured clipboard content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    /// Normalized content type
    pub content_type: ContentType,
    /// Identifier the bytes were read as
    pub mime_type: String,
    /// Raw payload
    pub payload: Bytes,
}

/// Bounds applied while reading offered content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureLimits {
    /// Largest payload accepted, in bytes
    pub max_entry_size: usize,
    /// Upper bound on a single read
    pub read_timeout: Duration,
}

impl Default for CaptureLimits {
    fn default() -> Self {
        Self {
            max_entry_size: DEFAULT_MAX_ENTRY_SIZE,
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
        }
    }
}

/// Lowercased type/subtype with parameters stripped
pub fn mime_essence(identifier: &str) -> String {
    identifier
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn has_utf8_charset(identifier: &str) -> bool {
    identifier.split(';').skip(1).any(|param| {
        let mut kv = param.splitn(2, '=');
        let key = kv.next().unwrap_or_default().trim();
        let value = kv.next().unwrap_or_default().trim().trim_matches('"');
        key.eq_ignore_ascii_case("charset")
            && (value.eq_ignore_ascii_case("utf-8") || value.eq_ignore_ascii_case("utf8"))
    })
}

/// Rank of an identifier for `content_type`, lower is better; `None` if it is not that type
fn rank(content_type: ContentType, identifier: &str) -> Option<u8> {
    let essence = mime_essence(identifier);

    match content_type {
        ContentType::Text => {
            if essence == "text/plain" {
                Some(if has_utf8_charset(identifier) { 0 } else { 1 })
            } else if identifier.trim() == UTF8_STRING {
                Some(2)
            } else {
                None
            }
        }
        ContentType::Png => (essence == "image/png").then_some(0),
        ContentType::Jpeg => (essence == "image/jpeg").then_some(0),
    }
}

/// Pick the best supported type among `offered`
///
/// Content types are tried in [`ContentType::PREFERENCE`] order and the first
/// one with any matching identifier wins.
pub fn negotiate<S: AsRef<str>>(offered: &[S]) -> Option<Negotiated> {
    for content_type in ContentType::PREFERENCE {
        let best = offered
            .iter()
            .map(|s| s.as_ref())
            .filter_map(|id| rank(content_type, id).map(|r| (r, id)))
            .min_by_key(|(r, _)| *r);

        if let Some((_, identifier)) = best {
            trace!("Negotiated {} via {:?}", content_type, identifier);
            return Some(Negotiated {
                content_type,
                mime_type: identifier.to_string(),
            });
        }
    }

    None
}

/// Check a payload read for `content_type` before it is stored
pub fn validate_payload(
    content_type: ContentType,
    mime_type: &str,
    payload: &[u8],
    max_entry_size: usize,
) -> Result<()> {
    if payload.is_empty() {
        return Err(ClipboardError::EmptyPayload(mime_type.to_string()));
    }
    if payload.len() > max_entry_size {
        return Err(ClipboardError::DataSizeExceeded(payload.len(), max_entry_size));
    }
    if content_type == ContentType::Text && std::str::from_utf8(payload).is_err() {
        return Err(ClipboardError::InvalidUtf8);
    }
    Ok(())
}

/// Negotiate and read the offered content
///
/// The backend is asked for at most `max_entry_size + 1` bytes so an oversized
/// payload is detected without buffering all of it.
pub async fn capture<S: AsRef<str>>(
    backend: &dyn ClipboardBackend,
    offered: &[S],
    limits: &CaptureLimits,
) -> Result<Captured> {
    let Some(negotiated) = negotiate(offered) else {
        return Err(ClipboardError::UnsupportedType(
            offered.iter().map(|s| s.as_ref().to_string()).collect(),
        ));
    };

    let read_limit = limits.max_entry_size.saturating_add(1);
    let read = backend.read(&negotiated.mime_type, read_limit);

    let payload = match tokio::time::timeout(limits.read_timeout, read).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(ClipboardError::ReadTimeout(
                limits.read_timeout.as_millis() as u64,
            ))
        }
    };

    validate_payload(
        negotiated.content_type,
        &negotiated.mime_type,
        &payload,
        limits.max_entry_size,
    )?;

    debug!(
        "Read {} bytes of {} ({})",
        payload.len(),
        negotiated.content_type,
        negotiated.mime_type
    );

    Ok(Captured {
        content_type: negotiated.content_type,
        mime_type: negotiated.mime_type,
        payload: Bytes::from(payload),
    })
}
