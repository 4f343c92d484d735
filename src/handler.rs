use crate::{decode, error::Error, exchange::ExchangeResult, parse};
use async_channel::Sender;
use curl::easy::{InfoType, ReadError, SeekResult, WriteError};
use http::{HeaderMap, StatusCode};
use std::{
    ascii,
    fmt,
    io::{self, Cursor, Read},
};

/// Manages the state of a single request/response life cycle.
///
/// During the lifetime of a handler, it will receive callbacks from curl about
/// the progress of the exchange, feeding it the request body and collecting
/// the response as it arrives. Once curl reports the transfer as finished the
/// handler normalizes the response and publishes exactly one
/// [`ExchangeResult`] on its completion channel.
///
/// If dropped before a result was published, the handler publishes an aborted
/// result instead. Whoever waits on the completion channel can therefore rely
/// on getting one message per handler.
pub(crate) struct ExchangeHandler {
    /// Position of the request within its batch.
    index: usize,

    /// Token assigned by the agent while the transfer is active.
    id: Option<usize>,

    /// The body to be sent in the request.
    request_body: Cursor<Vec<u8>>,

    /// Status code of the most recent response.
    response_status: Option<StatusCode>,

    /// Headers of the most recent response.
    response_headers: HeaderMap,

    /// Response body received so far.
    response_body: Vec<u8>,

    /// Where to publish the result. Taken once the result is sent.
    completion: Option<Sender<ExchangeResult>>,
}

impl ExchangeHandler {
    pub(crate) fn new(index: usize, request_body: Vec<u8>, completion: Sender<ExchangeResult>) -> Self {
        Self {
            index,
            id: None,
            request_body: Cursor::new(request_body),
            response_status: None,
            response_headers: HeaderMap::new(),
            response_body: Vec::new(),
            completion: Some(completion),
        }
    }

    /// Initialize the handler when its transfer is registered with an agent.
    pub(crate) fn init(&mut self, id: usize) {
        debug_assert!(self.id.is_none());

        tracing::debug!(id, index = self.index, "initializing handler for exchange");
        self.id = Some(id);
    }

    /// Handle the result curl produced for this handler's transfer.
    ///
    /// `established` tells whether the transfer got past the connection phase,
    /// which curl does not distinguish in its timeout errors.
    pub(crate) fn on_result(&mut self, result: Result<(), curl::Error>, established: bool) {
        let result = match result {
            Ok(()) => self.finish(),
            Err(e) => {
                tracing::debug!(index = self.index, "curl error: {}", e);
                ExchangeResult::failure(self.index, Error::from_transfer(e, established))
            }
        };

        self.complete(result);
    }

    /// Fail the exchange without it ever reaching the transport.
    pub(crate) fn fail(&mut self, error: Error) {
        self.complete(ExchangeResult::failure(self.index, error));
    }

    /// Build the final result from everything received.
    fn finish(&mut self) -> ExchangeResult {
        let mut headers = std::mem::take(&mut self.response_headers);
        let body = std::mem::take(&mut self.response_body);

        match decode::normalize(&mut headers, body) {
            Ok(body) => ExchangeResult::success(self.index, self.response_status, headers, body),
            Err(e) => ExchangeResult::failure(self.index, e),
        }
    }

    /// Publish the result of this exchange.
    fn complete(&mut self, result: ExchangeResult) {
        if let Some(completion) = self.completion.take() {
            if let Some(e) = result.error() {
                tracing::warn!(index = self.index, "exchange completed with error: {}", e);
            } else {
                tracing::debug!(index = self.index, status = ?result.status(), "exchange completed");
            }

            if completion.try_send(result).is_err() {
                tracing::debug!(index = self.index, "nobody is waiting for the exchange result");
            }
        }
    }
}

impl curl::easy::Handler for ExchangeHandler {
    /// Gets called by curl for each line of data in the HTTP response header.
    fn header(&mut self, data: &[u8]) -> bool {
        // Curl calls this for every line of every response it receives,
        // including intermediate ones that precede a redirect. A status line
        // starts a new response, so anything collected so far is discarded.
        if let Some(status) = parse::parse_status_line(data) {
            self.response_status = Some(status);
            self.response_headers.clear();
            self.response_body.clear();
            return true;
        }

        if let Some((name, value)) = parse::parse_header(data) {
            self.response_headers.append(name, value);
            return true;
        }

        // End of the header block.
        if data == b"\r\n" || data == b"\n" {
            return true;
        }

        tracing::debug!(index = self.index, "ignoring unparseable header line");
        true
    }

    /// Gets called by curl when attempting to send bytes of the request body.
    fn read(&mut self, data: &mut [u8]) -> Result<usize, ReadError> {
        self.request_body.read(data).map_err(|e| {
            tracing::error!(index = self.index, "error reading request body: {}", e);
            ReadError::Abort
        })
    }

    /// Gets called by curl when it needs to send the request body again, for
    /// example after a redirect.
    fn seek(&mut self, whence: io::SeekFrom) -> SeekResult {
        match whence {
            io::SeekFrom::Start(0) => {
                self.request_body.set_position(0);
                SeekResult::Ok
            }
            _ => {
                tracing::warn!(index = self.index, "unsupported seek requested for request body");
                SeekResult::CantSeek
            }
        }
    }

    /// Gets called by curl when bytes from the response body are received.
    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        tracing::trace!(index = self.index, "received {} bytes of data", data.len());

        self.response_body.extend_from_slice(data);

        Ok(data.len())
    }

    /// Gets called by curl whenever it wishes to log a debug message.
    fn debug(&mut self, kind: InfoType, data: &[u8]) {
        fn format_byte_string(bytes: impl AsRef<[u8]>) -> String {
            String::from_utf8(
                bytes
                    .as_ref()
                    .iter()
                    .flat_map(|byte| ascii::escape_default(*byte))
                    .collect(),
            )
            .unwrap_or_else(|_| String::from("<binary>"))
        }

        match kind {
            InfoType::Text => {
                tracing::debug!(target: "volley::curl", "{}", String::from_utf8_lossy(data).trim_end())
            }
            InfoType::HeaderIn | InfoType::DataIn => {
                tracing::trace!(target: "volley::wire", "<< {}", format_byte_string(data))
            }
            InfoType::HeaderOut | InfoType::DataOut => {
                tracing::trace!(target: "volley::wire", ">> {}", format_byte_string(data))
            }
            _ => (),
        }
    }
}

impl Drop for ExchangeHandler {
    fn drop(&mut self) {
        if self.completion.is_some() {
            self.fail(Error::aborted());
        }
    }
}

impl fmt::Debug for ExchangeHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExchangeHandler(index={}, id={:?})", self.index, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curl::easy::Handler;

    static_assertions::assert_impl_all!(ExchangeHandler: Send);

    fn handler() -> (ExchangeHandler, async_channel::Receiver<ExchangeResult>) {
        let (tx, rx) = async_channel::unbounded();
        (ExchangeHandler::new(3, b"hi".to_vec(), tx), rx)
    }

    #[test]
    fn successful_transfer_publishes_response() {
        let (mut handler, rx) = handler();

        assert!(handler.header(b"HTTP/1.1 200 OK\r\n"));
        assert!(handler.header(b"X-Test: yes\r\n"));
        assert!(handler.header(b"\r\n"));
        assert_eq!(handler.write(b"hello").unwrap(), 5);
        handler.on_result(Ok(()), true);

        let result = rx.try_recv().unwrap();
        assert_eq!(result.index(), 3);
        assert_eq!(result.status(), Some(StatusCode::OK));
        assert_eq!(result.headers()["x-test"], "yes");
        assert_eq!(result.body(), b"hello");
        assert!(result.is_ok());
    }

    #[test]
    fn redirect_response_is_replaced_by_final_response() {
        let (mut handler, rx) = handler();

        handler.header(b"HTTP/1.1 301 Moved Permanently\r\n");
        handler.header(b"Location: /next\r\n");
        handler.write(b"moved").unwrap();
        handler.header(b"HTTP/1.1 200 OK\r\n");
        handler.write(b"final").unwrap();
        handler.on_result(Ok(()), true);

        let result = rx.try_recv().unwrap();
        assert_eq!(result.status(), Some(StatusCode::OK));
        assert!(result.headers().get("location").is_none());
        assert_eq!(result.body(), b"final");
    }

    #[test]
    fn request_body_is_read_and_rewound() {
        let (mut handler, _rx) = handler();
        let mut buf = [0; 8];

        assert_eq!(handler.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"hi");
        assert_eq!(handler.read(&mut buf).unwrap(), 0);
        assert!(matches!(handler.seek(io::SeekFrom::Start(0)), SeekResult::Ok));
        assert_eq!(handler.read(&mut buf).unwrap(), 2);
    }

    #[test]
    fn dropped_handler_publishes_aborted_result() {
        let (handler, rx) = handler();

        drop(handler);

        let result = rx.try_recv().unwrap();
        assert_eq!(result.index(), 3);
        assert!(result.error().is_some());
    }

    #[test]
    fn result_is_published_only_once() {
        let (mut handler, rx) = handler();

        handler.fail(Error::aborted());
        handler.on_result(Ok(()), true);
        drop(handler);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
