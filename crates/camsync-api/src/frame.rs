//! Preview frame decoding for binary channel messages.
//!
//! Frame layout:
//!
//! ```text
//! Device-Key: cam1\r\n
//! Content-Length: 48213\r\n
//! \r\n
//! <image bytes until end of message>
//! ```
//!
//! Only the device key is required. Scanning stops at the first header
//! that names the device; the rest of the header block is not validated.

use bytes::Bytes;
use thiserror::Error;

/// Header names (case-insensitive) that carry the device key.
pub const DEVICE_KEY_HEADERS: [&str; 4] = ["device-key", "x-device-key", "camera-key", "camera"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// No blank line separates the header block from the payload.
    #[error("no header terminator found")]
    MissingTerminator,

    /// Header block parsed, but none of its lines names a device.
    #[error("no device key header")]
    MissingKey,
}

/// A decoded preview frame: which device it belongs to, and the raw image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub device_key: String,
    /// Image payload, sliced from the original message without copying.
    pub payload: Bytes,
}

/// Decode one binary channel message.
pub fn decode_frame(message: Bytes) -> Result<DecodedFrame, FrameError> {
    let (header_end, payload_start) =
        find_header_end(&message).ok_or(FrameError::MissingTerminator)?;

    let device_key = message[..header_end]
        .split(|b| *b == b'\n')
        .filter_map(|line| std::str::from_utf8(line).ok())
        .find_map(|line| {
            let (name, value) = line.trim_end_matches('\r').split_once(':')?;
            let name = name.trim();
            let value = value.trim();
            let is_key = DEVICE_KEY_HEADERS
                .iter()
                .any(|h| h.eq_ignore_ascii_case(name));
            (is_key && !value.is_empty()).then(|| value.to_owned())
        })
        .ok_or(FrameError::MissingKey)?;

    Ok(DecodedFrame {
        device_key,
        payload: message.slice(payload_start..),
    })
}

/// Build a frame in the wire layout. Used by tooling and tests that stand
/// in for the control service.
pub fn encode_frame(device_key: &str, extra_headers: &[(&str, &str)], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 64);
    out.extend_from_slice(b"Device-Key: ");
    out.extend_from_slice(device_key.as_bytes());
    out.extend_from_slice(b"\r\n");
    for (name, value) in extra_headers {
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(payload);
    out
}

/// Locate the blank-line sentinel.
///
/// Returns `(end of header block, start of payload)`. `\r\n\r\n` is the
/// canonical terminator; `\n\n` is accepted from lenient senders. The
/// earliest terminator wins so payload bytes are never scanned.
fn find_header_end(message: &[u8]) -> Option<(usize, usize)> {
    // A message that opens with a blank line has an empty header block.
    if message.starts_with(b"\r\n") {
        return Some((0, 2));
    }
    if message.starts_with(b"\n") {
        return Some((0, 1));
    }

    let crlf = find(message, b"\r\n\r\n").map(|i| (i, i + 4));
    let lf = find(message, b"\n\n").map(|i| (i, i + 2));
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
