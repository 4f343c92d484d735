//! The exchange executor.

use crate::{
    agent::{self, AgentBuilder, EasyHandle},
    config::ExchangeConfig,
    error::{Error, ErrorKind},
    exchange::ExchangeResult,
    handler::ExchangeHandler,
    headers,
    payload::RequestSpec,
};
use async_channel::Sender;
use http::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Method,
};
use once_cell::sync::Lazy;
use std::{convert::TryFrom, fmt, sync::Arc, time::Duration};
use url::Url;

static USER_AGENT: Lazy<String> = Lazy::new(|| format!("volley/{}", env!("CARGO_PKG_VERSION")));

/// A builder for [`Client`] instances with customized behavior.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
///
/// let client = volley::Client::builder()
///     .connect_timeout(Duration::from_secs(1))
///     .timeout(Duration::from_secs(5))
///     .max_connections(16)
///     .build()?;
/// # Ok::<(), volley::Error>(())
/// ```
pub struct ClientBuilder {
    agent_builder: AgentBuilder,
    config: ExchangeConfig,
    default_headers: HeaderMap,
    error: Option<Error>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    /// Create a new builder with the default configuration: 3 second connect
    /// and TLS handshake timeouts, a 20 second overall timeout, up to 10
    /// redirects, and no limit on simultaneous connections.
    pub fn new() -> Self {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            http::header::USER_AGENT,
            HeaderValue::from_str(&USER_AGENT).unwrap_or_else(|_| HeaderValue::from_static("volley")),
        );
        default_headers.insert(
            http::header::ACCEPT_ENCODING,
            HeaderValue::from_static("gzip"),
        );

        Self {
            agent_builder: AgentBuilder::default(),
            config: ExchangeConfig::default(),
            default_headers,
            error: None,
        }
    }

    /// Set the time allowed for establishing a connection.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the additional time allowed for the TLS handshake of `https`
    /// requests.
    pub fn tls_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.tls_handshake_timeout = timeout;
        self
    }

    /// Set the time allowed for a whole exchange.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set how many redirects to follow. `None` returns redirect responses as
    /// they are.
    pub fn redirect_limit(mut self, limit: Option<u32>) -> Self {
        self.config.redirect_limit = limit;
        self
    }

    /// Set a maximum number of simultaneous connections.
    ///
    /// Exchanges that would need a connection beyond the limit stay pending
    /// until another exchange finishes. Setting this value to `0` disables the
    /// limit entirely, which is the default.
    pub fn max_connections(mut self, max: usize) -> Self {
        self.agent_builder = self.agent_builder.max_connections(max);
        self
    }

    /// Add a default header to be sent with every request, replacing any
    /// previous default of the same name.
    ///
    /// Headers of an individual request always override default headers. If
    /// the name or value is malformed, [`ClientBuilder::build`] will return an
    /// error.
    pub fn default_header<K, V>(mut self, key: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        match HeaderName::try_from(key) {
            Ok(key) => match HeaderValue::try_from(value) {
                Ok(value) => {
                    self.default_headers.insert(key, value);
                }
                Err(e) => {
                    self.error = Some(e.into().into());
                }
            },
            Err(e) => {
                self.error = Some(e.into().into());
            }
        }
        self
    }

    /// Build a [`Client`] using the configured options.
    ///
    /// If the client fails to initialize, an error will be returned.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn build(self) -> Result<Client, Error> {
        if let Some(err) = self.error {
            return Err(err);
        }

        Ok(Client {
            agent: Arc::new(self.agent_builder.spawn()?),
            config: self.config,
            default_headers: self.default_headers,
        })
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("default_headers", &self.default_headers)
            .finish()
    }
}

/// Executes exchanges on a background agent.
///
/// Every exchange gets its own connection, and all exchanges submitted to a
/// client run concurrently. Cloning a client is cheap and shares the agent.
/// The agent shuts down when the last clone is dropped.
#[derive(Clone)]
pub struct Client {
    agent: Arc<agent::Handle>,
    config: ExchangeConfig,
    default_headers: HeaderMap,
}

impl Client {
    /// Create a new client with the default configuration.
    pub fn new() -> Result<Self, Error> {
        ClientBuilder::default().build()
    }

    /// Create a new builder for building a custom client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Execute a single exchange and wait for its result.
    pub fn send(&self, request: RequestSpec) -> ExchangeResult {
        futures_lite::future::block_on(self.send_async(request))
    }

    /// Execute a single exchange asynchronously.
    pub async fn send_async(&self, request: RequestSpec) -> ExchangeResult {
        let (tx, rx) = async_channel::bounded(1);

        self.submit(0, request, tx);

        match rx.recv().await {
            Ok(result) => result,
            Err(_) => ExchangeResult::failure(0, Error::aborted()),
        }
    }

    /// Start executing an exchange. Its result, and nothing else, is published
    /// on `completion` once it is done, whatever happens.
    pub(crate) fn submit(&self, index: usize, request: RequestSpec, completion: Sender<ExchangeResult>) {
        tracing::debug!(index, method = request.method(), url = request.url(), "submitting exchange");

        let handler = ExchangeHandler::new(index, request.body_str().as_bytes().to_vec(), completion);
        let mut easy = curl::easy::Easy2::new(handler);

        if let Err(e) = self.configure(&mut easy, &request) {
            easy.get_mut().fail(e);
            return;
        }

        if let Err(e) = self.agent.submit(easy) {
            tracing::error!(index, "failed to hand exchange to the agent: {}", e);
        }
    }

    /// Prepare a curl handle to perform the given request.
    fn configure(&self, easy: &mut EasyHandle, request: &RequestSpec) -> Result<(), Error> {
        let method = Method::from_bytes(request.method().as_bytes()).map_err(|_| {
            Error::with_context(
                ErrorKind::InvalidRequest,
                format!("invalid request method `{}`", request.method()),
            )
        })?;

        let url = Url::parse(request.url()).map_err(|e| Error::new(ErrorKind::InvalidRequest, e))?;

        let headers = headers::merge(&self.default_headers, request.headers())?;
        let body_len = request.body_str().len() as u64;
        let has_body = body_len > 0;

        // Curl generates verbose debug data only when someone is listening.
        easy.verbose(log::log_enabled!(target: "volley::curl", log::Level::Debug))?;
        easy.signal(false)?;

        self.config.apply(easy, url.scheme() == "https")?;

        // Curl ties in behavior with the request method, so we need to
        // configure this carefully.
        match (&method, has_body) {
            (&Method::GET, false) => {
                easy.get(true)?;
            }
            (&Method::HEAD, false) => {
                easy.nobody(true)?;
            }
            (&Method::POST, _) => {
                easy.post(true)?;
                easy.post_field_size(body_len)?;
            }
            (method, true) => {
                easy.upload(true)?;
                easy.in_filesize(body_len)?;
                easy.custom_request(method.as_str())?;
            }
            (method, false) => {
                easy.custom_request(method.as_str())?;
            }
        }

        easy.url(url.as_str())?;
        easy.http_headers(headers::to_curl_list(&headers)?)?;

        Ok(())
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish()
    }
}
