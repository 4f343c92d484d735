//! A tiny mock HTTP server that lets tests inspect the requests they send and
//! control the responses they get back.
//!
//! Every request is handled on its own pooled thread, so a slow response never
//! holds up the others. This matters when a whole batch hits the same mock at
//! once.

mod macros;
mod mock;
mod pool;
mod request;
mod responder;
mod response;

#[doc(hidden)]
pub use macros::macro_api;
pub use mock::{Builder, Mock};
pub use request::Request;
pub use responder::{RequestContext, Responder};
pub use response::Response;
