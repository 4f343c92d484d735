//! Transport configuration applied to every exchange.
//!
//! Configuration is fixed per client rather than per request. Each value type
//! knows how to apply itself to a curl handle through [`SetOpt`].

use curl::easy::Easy2;
use std::time::Duration;

/// Time allowed for establishing the TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Additional time allowed for the TLS handshake of secure connections.
pub const DEFAULT_TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(3);

/// Time allowed for the whole exchange, from connecting until the last byte
/// of the response body.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Maximum number of redirects followed before giving up.
pub const DEFAULT_REDIRECT_LIMIT: u32 = 10;

/// A helper trait for applying a configuration value to a given curl handle.
pub(crate) trait SetOpt {
    /// Apply this configuration property to the given curl handle.
    fn set_opt<H>(&self, easy: &mut Easy2<H>) -> Result<(), curl::Error>;
}

/// Overall timeout of an exchange.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Timeout(pub(crate) Duration);

impl SetOpt for Timeout {
    fn set_opt<H>(&self, easy: &mut Easy2<H>) -> Result<(), curl::Error> {
        easy.timeout(self.0)
    }
}

/// Time allowed for the connection phase.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ConnectTimeout(pub(crate) Duration);

impl SetOpt for ConnectTimeout {
    fn set_opt<H>(&self, easy: &mut Easy2<H>) -> Result<(), curl::Error> {
        easy.connect_timeout(self.0)
    }
}

/// How redirects are handled.
#[derive(Clone, Copy, Debug)]
pub(crate) enum RedirectPolicy {
    /// Return the redirect response as is.
    None,

    /// Follow up to this many redirects.
    Limit(u32),
}

impl SetOpt for RedirectPolicy {
    fn set_opt<H>(&self, easy: &mut Easy2<H>) -> Result<(), curl::Error> {
        match self {
            Self::None => easy.follow_location(false),
            Self::Limit(max) => {
                easy.follow_location(true)?;
                easy.max_redirections(*max)
            }
        }
    }
}

/// Every exchange gets a connection of its own, which is closed once the
/// exchange is done.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ExclusiveConnection;

impl SetOpt for ExclusiveConnection {
    fn set_opt<H>(&self, easy: &mut Easy2<H>) -> Result<(), curl::Error> {
        easy.fresh_connect(true)?;
        easy.forbid_reuse(true)
    }
}

/// Configuration shared by all exchanges of a client.
#[derive(Clone, Debug)]
pub(crate) struct ExchangeConfig {
    pub(crate) connect_timeout: Duration,
    pub(crate) tls_handshake_timeout: Duration,
    pub(crate) timeout: Duration,
    pub(crate) redirect_limit: Option<u32>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            tls_handshake_timeout: DEFAULT_TLS_HANDSHAKE_TIMEOUT,
            timeout: DEFAULT_TIMEOUT,
            redirect_limit: Some(DEFAULT_REDIRECT_LIMIT),
        }
    }
}

impl ExchangeConfig {
    /// Curl bounds the TCP connect and the TLS handshake with a single
    /// timeout, so secure connections get both budgets.
    pub(crate) fn connect_timeout_for(&self, secure: bool) -> ConnectTimeout {
        if secure {
            ConnectTimeout(self.connect_timeout + self.tls_handshake_timeout)
        } else {
            ConnectTimeout(self.connect_timeout)
        }
    }

    fn redirect_policy(&self) -> RedirectPolicy {
        match self.redirect_limit {
            Some(max) => RedirectPolicy::Limit(max),
            None => RedirectPolicy::None,
        }
    }

    /// Apply every option to a curl handle for a request to a plain or secure
    /// URL.
    pub(crate) fn apply<H>(&self, easy: &mut Easy2<H>, secure: bool) -> Result<(), curl::Error> {
        Timeout(self.timeout).set_opt(easy)?;
        self.connect_timeout_for(secure).set_opt(easy)?;
        self.redirect_policy().set_opt(easy)?;
        ExclusiveConnection.set_opt(easy)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_timeouts() {
        let config = ExchangeConfig::default();

        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.tls_handshake_timeout, Duration::from_secs(3));
        assert_eq!(config.timeout, Duration::from_secs(20));
        assert_eq!(config.redirect_limit, Some(10));
    }

    #[test]
    fn secure_connections_include_handshake_budget() {
        let config = ExchangeConfig::default();

        assert_eq!(config.connect_timeout_for(false).0, Duration::from_secs(3));
        assert_eq!(config.connect_timeout_for(true).0, Duration::from_secs(6));
    }
}
