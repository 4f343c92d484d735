//! Response body normalization.

use crate::error::{Error, ErrorKind};
use flate2::read::MultiGzDecoder;
use http::{header, HeaderMap};
use std::io::Read;

/// Returns true if the response declares a gzip content encoding.
pub(crate) fn is_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_ENCODING)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().eq_ignore_ascii_case("gzip"))
        .unwrap_or(false)
}

/// Bring a received response body into its final form.
///
/// Bodies declared as gzip are decompressed, and the headers describing the
/// encoded form are removed since they no longer apply. Anything else is
/// returned untouched.
pub(crate) fn normalize(headers: &mut HeaderMap, body: Vec<u8>) -> Result<Vec<u8>, Error> {
    if body.is_empty() || !is_gzip(headers) {
        return Ok(body);
    }

    let mut decoded = Vec::with_capacity(body.len() * 2);

    MultiGzDecoder::new(body.as_slice())
        .read_to_end(&mut decoded)
        .map_err(|e| Error::new(ErrorKind::Decode, e))?;

    tracing::trace!(
        encoded = body.len(),
        decoded = decoded.len(),
        "decompressed gzip response body"
    );

    headers.remove(header::CONTENT_ENCODING);
    headers.remove(header::CONTENT_LENGTH);

    Ok(decoded)
}
