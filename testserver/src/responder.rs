use crate::{request::Request, response::Response};
use std::io::Write;

/// Produces responses for a mock. Each responder may either answer the
/// request through the context or leave it to the next responder.
pub trait Responder: Send + Sync + 'static {
    fn respond(&self, ctx: &mut RequestContext<'_>);
}

/// A request being handled, along with the means to answer it.
pub struct RequestContext<'r> {
    request: &'r Request,
    pub(crate) http_request: Option<tiny_http::Request>,
}

impl<'r> RequestContext<'r> {
    pub(crate) fn new(request: &'r Request, http_request: tiny_http::Request) -> Self {
        Self {
            request,
            http_request: Some(http_request),
        }
    }

    pub fn request(&self) -> &Request {
        self.request
    }

    /// Answer the request with the given response.
    pub fn send(&mut self, response: Response) {
        if let Some(request) = self.http_request.take() {
            let _ = request.respond(response.into_http_response());
        }
    }

    /// Take over the connection and write a raw response.
    pub fn into_raw(&mut self) -> Box<dyn Write + Send + 'static> {
        match self.http_request.take() {
            Some(request) => request.into_writer(),
            None => Box::new(std::io::sink()),
        }
    }
}
