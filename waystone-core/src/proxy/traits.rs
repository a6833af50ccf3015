//! Core traits for upstream fetching

use std::time::Duration;

use crate::http::{InterceptedRequest, StoredResponse};

/// Why an upstream fetch produced no response at all.
///
/// Any response, including 4xx/5xx, is a success at this level; status
/// handling is the validator's business.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// DNS, connect, reset or abort
    #[error("network error: {0}")]
    Network(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("response body exceeds {0} bytes")]
    TooLarge(usize),
}

/// Per-fetch options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Ask every intermediate HTTP cache to stay out of the way
    pub bypass_http_cache: bool,
}

impl FetchOptions {
    pub fn no_store() -> Self {
        Self { bypass_http_cache: true }
    }
}

/// The network as seen by the engine.
///
/// Redirects are followed; the returned response reports whether one was
/// taken and whether it is same-origin (`basic`).
#[async_trait::async_trait]
pub trait Upstream: Send + Sync {
    async fn fetch(
        &self,
        request: &InterceptedRequest,
        options: FetchOptions,
    ) -> Result<StoredResponse, FetchError>;
}
