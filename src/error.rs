//! Types for error handling.
//!
//! Errors produced while executing a single exchange are always confined to
//! that exchange's [`ExchangeResult`](crate::ExchangeResult). The only error
//! that stops a whole batch is a [`PayloadError`](crate::PayloadError), which
//! lives next to the payload parser.

use std::{error::Error as StdError, fmt, io, sync::Arc};

/// A non-exhaustive list of the ways an exchange can fail.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The connection to the server could not be established. This includes
    /// DNS resolution failures, refused connections, TLS negotiation failures
    /// and running out of time before the connection was ready.
    Connection,

    /// The exchange was connected but did not complete within the overall
    /// timeout.
    Timeout,

    /// The response declared a gzip content encoding, but the body could not
    /// be decompressed.
    Decode,

    /// The response body could not be fully read.
    Read,

    /// The request could not be constructed from its specification, such as
    /// an empty or malformed URL or method, or an invalid header.
    InvalidRequest,

    /// Some other failure reported by the transport, such as the request
    /// failing to send on an established connection.
    Unknown,
}

impl ErrorKind {
    /// A short, stable name for this kind of error.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Timeout => "timeout",
            Self::Decode => "decode",
            Self::Read => "read",
            Self::InvalidRequest => "invalid-request",
            Self::Unknown => "unknown",
        }
    }

    #[inline]
    fn description(&self) -> &'static str {
        match self {
            Self::Connection => "failed to connect to the server",
            Self::Timeout => "request took longer than the configured timeout",
            Self::Decode => "response body could not be decompressed",
            Self::Read => "response body could not be read",
            Self::InvalidRequest => "request is not a valid HTTP request",
            Self::Unknown => "unknown error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// An error encountered while executing an exchange.
///
/// Errors are cheap to clone.
#[derive(Clone)]
pub struct Error(Arc<Inner>);

struct Inner {
    kind: ErrorKind,
    context: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    /// Create a new error from a given error kind and source error.
    pub fn new<E>(kind: ErrorKind, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Arc::new(Inner {
            kind,
            context: None,
            source: Some(Box::new(source)),
        }))
    }

    /// Create a new error with a kind and a human readable message but no
    /// underlying source.
    pub(crate) fn with_context(kind: ErrorKind, context: impl Into<String>) -> Self {
        Self(Arc::new(Inner {
            kind,
            context: Some(context.into()),
            source: None,
        }))
    }

    /// The exchange was torn down before the transport reported a result.
    pub(crate) fn aborted() -> Self {
        Self::with_context(
            ErrorKind::Unknown,
            "exchange was aborted before it completed",
        )
    }

    /// Classify an error reported by curl for a finished transfer.
    ///
    /// Curl reports connect timeouts and transfer timeouts with the same code,
    /// so `established` says whether the transfer ever got past the connection
    /// phase.
    pub(crate) fn from_transfer(error: curl::Error, established: bool) -> Self {
        let error = Self::from(error);

        if error.kind() == &ErrorKind::Timeout && !established {
            Self(Arc::new(Inner {
                kind: ErrorKind::Connection,
                context: Some(String::from("timed out while connecting")),
                source: Arc::try_unwrap(error.0)
                    .ok()
                    .and_then(|inner| inner.source),
            }))
        } else {
            error
        }
    }

    /// Get the kind of error this is.
    pub fn kind(&self) -> &ErrorKind {
        &self.0.kind
    }

    /// Returns true if this error was caused by a failure to connect.
    pub fn is_connection(&self) -> bool {
        self.kind() == &ErrorKind::Connection
    }

    /// Returns true if this error was caused by a timeout after connecting.
    pub fn is_timeout(&self) -> bool {
        self.kind() == &ErrorKind::Timeout
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0
            .source
            .as_ref()
            .map(|source| &**source as &(dyn StdError + 'static))
    }
}

impl PartialEq<ErrorKind> for Error {
    fn eq(&self, other: &ErrorKind) -> bool {
        self.kind().eq(other)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind())
            .field("context", &self.0.context)
            .field("source", &self.source())
            .finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.0.context, &self.0.source) {
            (Some(context), Some(source)) => write!(f, "{}: {}", context, source),
            (Some(context), None) => f.write_str(context),
            (None, Some(source)) => write!(f, "{}: {}", self.kind(), source),
            (None, None) => write!(f, "{}", self.kind()),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self(Arc::new(Inner {
            kind,
            context: None,
            source: None,
        }))
    }
}

#[doc(hidden)]
impl From<curl::Error> for Error {
    fn from(error: curl::Error) -> Error {
        let kind = if error.is_couldnt_connect()
            || error.is_couldnt_resolve_host()
            || error.is_couldnt_resolve_proxy()
            || error.is_ssl_connect_error()
            || error.is_peer_failed_verification()
            || error.is_ssl_cacert()
            || error.is_ssl_cacert_badfile()
            || error.is_ssl_certproblem()
            || error.is_ssl_cipher()
            || error.is_ssl_engine_initfailed()
            || error.is_ssl_engine_notfound()
            || error.is_ssl_engine_setfailed()
        {
            ErrorKind::Connection
        } else if error.is_operation_timedout() {
            ErrorKind::Timeout
        } else if error.is_bad_content_encoding() {
            ErrorKind::Decode
        } else if error.is_partial_file()
            || error.is_recv_error()
            || error.is_write_error()
            || error.is_got_nothing()
        {
            ErrorKind::Read
        } else if error.is_url_malformed()
            || error.is_unsupported_protocol()
            || error.is_bad_function_argument()
            || error.is_conv_failed()
        {
            ErrorKind::InvalidRequest
        } else {
            ErrorKind::Unknown
        };

        Self::new(kind, error)
    }
}

#[doc(hidden)]
impl From<curl::MultiError> for Error {
    fn from(error: curl::MultiError) -> Error {
        Self::new(ErrorKind::Unknown, error)
    }
}

#[doc(hidden)]
impl From<http::Error> for Error {
    fn from(error: http::Error) -> Error {
        Self::new(ErrorKind::InvalidRequest, error)
    }
}

#[doc(hidden)]
impl From<io::Error> for Error {
    fn from(error: io::Error) -> Error {
        let kind = match error.kind() {
            io::ErrorKind::ConnectionRefused => ErrorKind::Connection,
            io::ErrorKind::TimedOut => ErrorKind::Timeout,
            io::ErrorKind::InvalidData => ErrorKind::Decode,
            io::ErrorKind::UnexpectedEof => ErrorKind::Read,
            _ => ErrorKind::Unknown,
        };

        Self::new(kind, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_impl_all!(Error: Send, Sync);

    #[test]
    fn connect_timeout_is_a_connection_error() {
        let timeout = curl::Error::new(curl_code::OPERATION_TIMEDOUT);

        assert_eq!(
            Error::from_transfer(timeout, false).kind(),
            &ErrorKind::Connection
        );
    }

    #[test]
    fn timeout_after_connecting_stays_a_timeout() {
        let timeout = curl::Error::new(curl_code::OPERATION_TIMEDOUT);

        assert!(Error::from_transfer(timeout, true).is_timeout());
    }

    #[test]
    fn refused_connection_is_a_connection_error() {
        let refused = curl::Error::new(curl_code::COULDNT_CONNECT);

        assert!(Error::from_transfer(refused, false).is_connection());
    }

    #[test]
    fn partial_body_is_a_read_error() {
        assert_eq!(
            Error::from(curl::Error::new(curl_code::PARTIAL_FILE)),
            ErrorKind::Read
        );
    }

    #[test]
    fn send_failure_after_connecting_is_not_a_connection_error() {
        let error = Error::from_transfer(curl::Error::new(curl_code::SEND_ERROR), true);

        assert_eq!(error.kind(), &ErrorKind::Unknown);
    }

    #[test]
    fn display_includes_context_and_source() {
        let error = Error::with_context(ErrorKind::InvalidRequest, "header `X` is not a string");

        assert_eq!(error.to_string(), "header `X` is not a string");
        assert_eq!(
            Error::from(ErrorKind::Timeout).to_string(),
            "request took longer than the configured timeout"
        );
    }

    /// Raw curl result codes, so tests don't need to depend on curl-sys.
    mod curl_code {
        pub(super) const COULDNT_CONNECT: u32 = 7;
        pub(super) const PARTIAL_FILE: u32 = 18;
        pub(super) const OPERATION_TIMEDOUT: u32 = 28;
        pub(super) const SEND_ERROR: u32 = 55;
    }
}
