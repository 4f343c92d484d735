//! Parsing of the raw header lines curl hands to us.

use http::header::{HeaderName, HeaderValue};
use http::StatusCode;

/// Parse an HTTP status line, returning the status code.
pub(crate) fn parse_status_line(line: &[u8]) -> Option<StatusCode> {
    let mut parts = line
        .split(u8::is_ascii_whitespace)
        .filter(|part| !part.is_empty());

    if !parts.next()?.starts_with(b"HTTP/") {
        return None;
    }

    StatusCode::from_bytes(parts.next()?).ok()
}

/// Parse a single `name: value` header line.
pub(crate) fn parse_header(line: &[u8]) -> Option<(HeaderName, HeaderValue)> {
    let colon = line.iter().position(|byte| *byte == b':')?;
    let (name, value) = line.split_at(colon);

    let name = HeaderName::from_bytes(name).ok()?;
    let value = HeaderValue::from_bytes(trim(&value[1..])).ok()?;

    Some((name, value))
}

fn trim(mut bytes: &[u8]) -> &[u8] {
    while let Some((byte, rest)) = bytes.split_first() {
        if !byte.is_ascii_whitespace() {
            break;
        }
        bytes = rest;
    }

    while let Some((byte, rest)) = bytes.split_last() {
        if !byte.is_ascii_whitespace() {
            break;
        }
        bytes = rest;
    }

    bytes
}
