//! Fire a batch of HTTP requests concurrently and wait for all of them.
//!
//! A batch is described by a JSON payload, an array where every element is
//! one request:
//!
//! ```json
//! [
//!     {"method": "GET", "url": "http://host/a", "headers": {"X": "1"}, "body": ""},
//!     {"method": "POST", "url": "http://host/b", "headers": {}, "body": "hi"}
//! ]
//! ```
//!
//! Every request of a batch is executed as its own exchange, all of them at
//! once, on a single background thread driving curl. Exchanges are bounded by
//! a connect timeout (3 seconds by default, plus 3 more for the TLS handshake
//! of `https` URLs) and an overall timeout (20 seconds by default). Gzip
//! encoded response bodies are decompressed transparently.
//!
//! Dispatching a batch returns only once every exchange has completed, one way
//! or another. A failing exchange never affects any other; its failure is
//! reported in its own [`ExchangeResult`].
//!
//! # Examples
//!
//! ```no_run
//! let batch = volley::Batch::parse(r#"[
//!     {"method": "GET", "url": "http://example.org/a"},
//!     {"method": "POST", "url": "http://example.org/b", "body": "hi"}
//! ]"#)?;
//!
//! let report = volley::dispatch(batch, |result| match result.error() {
//!     None => println!("{}", String::from_utf8_lossy(result.body())),
//!     Some(e) => eprintln!("request #{} failed: {}", result.index(), e),
//! })?;
//!
//! println!("{} of {} succeeded", report.succeeded(), report.dispatched());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Logging
//!
//! Diagnostics are emitted through [`tracing`](https://docs.rs/tracing), with
//! its `log` compatibility enabled so that any `log` implementation picks them
//! up as well. Raw curl output uses the `volley::curl` target, and wire traffic
//! the `volley::wire` target, both at a verbose level.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

mod agent;
mod client;
pub mod config;
mod decode;
mod dispatch;
mod error;
mod exchange;
mod handler;
mod headers;
mod info;
pub mod output;
mod parse;
mod payload;

pub use crate::{
    client::{Client, ClientBuilder},
    dispatch::{BatchReport, Order},
    error::{Error, ErrorKind},
    exchange::ExchangeResult,
    info::version,
    payload::{Batch, FieldValue, Headers, PayloadError, PayloadErrorKind, RequestSpec},
};

/// Re-export of the standard HTTP types.
pub extern crate http;

/// Execute a batch with a default client, blocking until every exchange has
/// completed. Results are handed to `emit` in completion order.
///
/// Fails only if the client cannot be initialized.
pub fn dispatch<F>(batch: Batch, emit: F) -> Result<BatchReport, Error>
where
    F: FnMut(ExchangeResult),
{
    Ok(Client::new()?.dispatch(batch, emit))
}
