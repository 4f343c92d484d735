use crate::error::Error;
use http::{HeaderMap, StatusCode};
use std::fmt;

/// The outcome of a single exchange.
///
/// Every request of a batch produces exactly one result, whether it
/// succeeded or not. Failures are carried in [`ExchangeResult::error`]
/// instead of aborting anything else.
pub struct ExchangeResult {
    index: usize,
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
    error: Option<Error>,
}

impl ExchangeResult {
    pub(crate) fn success(
        index: usize,
        status: Option<StatusCode>,
        headers: HeaderMap,
        body: Vec<u8>,
    ) -> Self {
        Self {
            index,
            status,
            headers,
            body,
            error: None,
        }
    }

    pub(crate) fn failure(index: usize, error: Error) -> Self {
        Self {
            index,
            status: None,
            headers: HeaderMap::new(),
            body: Vec::new(),
            error: Some(error),
        }
    }

    /// Position of the originating request within its batch.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Status code of the final response, if one was received.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Headers of the final response.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The response body, already decompressed if it was gzip encoded.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consume the result and take the body.
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// The error that ended this exchange, if any.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Returns true if the exchange completed without an error. Note that any
    /// HTTP status counts as completed, including 4xx and 5xx.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl fmt::Debug for ExchangeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeResult")
            .field("index", &self.index)
            .field("status", &self.status)
            .field("body_len", &self.body.len())
            .field("error", &self.error)
            .finish()
    }
}
