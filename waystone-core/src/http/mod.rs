//! Request/response model and the interception front-end
//!
//! # Architecture
//!
//! - [`request`] - Intercepted request, destination classes and cache keys
//! - [`response`] - Buffered responses and synthesized fallbacks
//! - [`async_server`] - Hyper HTTP/1 server feeding requests to a
//!   [`Registration`](crate::lifecycle::Registration)

pub mod async_server;
pub mod request;
pub mod response;

pub use async_server::InterceptServer;
pub use request::{CacheMode, Destination, InterceptedRequest, RequestKey, RequestMode};
pub use response::{ResponseType, StoredResponse};

/// Header name/value pairs in wire order; names may repeat
pub type HeaderList = Vec<(String, String)>;
