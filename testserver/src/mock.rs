use crate::{
    pool::pool,
    request::Request,
    responder::{RequestContext, Responder},
    response::Response,
};
use std::{
    io::{Cursor, Read, Write},
    net::{SocketAddr, TcpStream},
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
        Mutex,
    },
    thread,
    time::Duration,
};
use tiny_http::Server;

/// A mock HTTP endpoint.
#[derive(Clone)]
pub struct Mock(Arc<Inner>);

struct Inner {
    server: Server,

    requests: Mutex<Vec<Request>>,

    /// Number of requests received since the mock was created.
    request_counter: AtomicU32,

    /// Tried in order until one of them answers.
    responders: Vec<Box<dyn Responder>>,
}

impl Mock {
    /// Create a new mock server with a single responder.
    pub fn new<R: Responder>(responder: R) -> Self {
        Self::builder().responder(responder).build()
    }

    pub fn builder() -> Builder {
        Builder {
            responders: vec![],
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.0
            .server
            .server_addr()
            .to_ip()
            .expect("mock server listens on TCP")
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr())
    }

    pub fn requests_received(&self) -> u32 {
        self.0.request_counter.load(Ordering::SeqCst)
    }

    /// Get the first request received by this mock.
    pub fn request(&self) -> Request {
        let request = self.0.requests.lock().unwrap().first().cloned();

        request.expect("no request received")
    }

    /// Get every request received so far, ordered by arrival.
    pub fn requests(&self) -> Vec<Request> {
        let mut requests = self.0.requests.lock().unwrap().clone();
        requests.sort_by_key(Request::number);
        requests
    }

    #[rustfmt::skip]
    fn is_ready(&self) -> bool {
        TcpStream::connect(self.addr())
            .and_then(|mut stream| {
                stream.write_all(b"\
                    GET /health HTTP/1.1\r\n\
                    host: api.mock.local\r\n\
                    connection: close\r\n\
                    \r\n\
                ")?;

                let mut response = Vec::new();
                stream.read_to_end(&mut response)?;

                Ok(response.ends_with(b"\r\nOK"))
            })
            .unwrap_or(false)
    }

    fn wait_until_ready(&self) {
        for _ in 0..9 {
            if self.is_ready() {
                return;
            }
            thread::sleep(Duration::from_millis(50));
        }

        panic!("mock server did not become ready after 9 tries");
    }

    fn handle_request(&self, mut request: tiny_http::Request) {
        if request
            .headers()
            .iter()
            .any(|h| h.field.as_str() == "host" && h.value == "api.mock.local")
        {
            self.handle_api_request(request);
            return;
        }

        let mut body = Vec::new();

        if let Some(len) = request.body_length() {
            body.reserve(len);
        }

        let _ = request.as_reader().read_to_end(&mut body);

        let mock_request = Request {
            number: self.0.request_counter.fetch_add(1, Ordering::SeqCst),
            method: request.method().to_string(),
            url: request.url().to_string(),
            headers: request
                .headers()
                .iter()
                .map(|header| (header.field.to_string(), header.value.to_string()))
                .collect(),
            body: Some(body),
        };

        self.0.requests.lock().unwrap().push(mock_request.clone());

        let mut ctx = RequestContext::new(&mock_request, request);

        for responder in &self.0.responders {
            responder.respond(&mut ctx);

            if ctx.http_request.is_none() {
                break;
            }
        }

        ctx.send(Response {
            status_code: 404,
            ..Response::default()
        });
    }

    fn handle_api_request(&self, request: tiny_http::Request) {
        if request.url() == "/health" {
            let _ = request.respond(tiny_http::Response::new(
                200.into(),
                vec![],
                Cursor::new(b"OK".to_vec()),
                Some(2),
                None,
            ));
        }
    }
}

/// A builder for creating mock servers.
pub struct Builder {
    responders: Vec<Box<dyn Responder>>,
}

impl Builder {
    /// Add a responder to the mock. Responders are tried in the order that they
    /// are added to the builder.
    pub fn responder<R: Responder + 'static>(mut self, responder: R) -> Self {
        self.responders.push(Box::new(responder));
        self
    }

    /// Start a new mock server.
    pub fn build(self) -> Mock {
        let mock = Mock(Arc::new(Inner {
            server: Server::http("127.0.0.1:0").unwrap(),
            requests: Default::default(),
            request_counter: AtomicU32::new(0),
            responders: self.responders,
        }));

        pool().execute({
            let mock = mock.clone();

            move || {
                for request in mock.0.server.incoming_requests() {
                    let mock = mock.clone();

                    // Requests of a batch arrive together; answer them
                    // independently.
                    pool().execute(move || mock.handle_request(request));
                }
            }
        });

        mock.wait_until_ready();

        mock
    }
}
