use std::io::Cursor;

/// A response to be sent by a mock.
#[derive(Clone, Debug)]
pub struct Response {
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,

    /// When `None` the body is sent with chunked encoding.
    pub body_len: Option<usize>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status_code: 200,
            headers: Vec::new(),
            body: Vec::new(),
            body_len: Some(0),
        }
    }
}

impl Response {
    pub fn with_body_buf(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self.body_len = Some(self.body.len());
        self
    }

    pub(crate) fn into_http_response(self) -> tiny_http::Response<Cursor<Vec<u8>>> {
        tiny_http::Response::new(
            self.status_code.into(),
            self.headers
                .into_iter()
                .filter_map(|(name, value)| tiny_http::Header::from_bytes(name, value).ok())
                .collect(),
            Cursor::new(self.body),
            self.body_len,
            None,
        )
    }
}
