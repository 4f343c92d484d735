//! Line-oriented rendering of exchange results.

use crate::exchange::ExchangeResult;
use std::io::{self, Write};

/// Write one line for a completed exchange.
///
/// A successful exchange is written as its raw body. A failed one is written
/// as `error[<kind>]: <message>`, so a reader can tell the two apart.
pub fn write_result<W: Write + ?Sized>(out: &mut W, result: &ExchangeResult) -> io::Result<()> {
    match result.error() {
        None => out.write_all(result.body())?,
        Some(e) => write!(out, "error[{}]: {}", e.kind().name(), e)?,
    }

    out.write_all(b"\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};
    use http::{HeaderMap, StatusCode};

    #[test]
    fn body_is_written_verbatim() {
        let result =
            ExchangeResult::success(0, Some(StatusCode::OK), HeaderMap::new(), b"{\"ok\":1}".to_vec());
        let mut out = Vec::new();

        write_result(&mut out, &result).unwrap();

        assert_eq!(out, b"{\"ok\":1}\n");
    }

    #[test]
    fn failure_is_written_with_its_kind() {
        let result = ExchangeResult::failure(
            1,
            Error::with_context(ErrorKind::InvalidRequest, "invalid request method ``"),
        );
        let mut out = Vec::new();

        write_result(&mut out, &result).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "error[invalid-request]: invalid request method ``\n"
        );
    }
}
