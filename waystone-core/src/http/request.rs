//! Intercepted request model
//!
//! An [`InterceptedRequest`] is everything the engine is told about an
//! outgoing client request: method, URL, destination class, cache mode and
//! request mode. It is the sole input of the router.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use http::Method;
use serde::{Deserialize, Serialize};
use url::Url;

use super::HeaderList;

/// Coarse category of a request, derived from the request itself.
///
/// Drives strategy selection and strict validation; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Destination {
    Document,
    Style,
    Script,
    Image,
    Font,
    #[default]
    Other,
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Document => "document",
            Destination::Style => "style",
            Destination::Script => "script",
            Destination::Image => "image",
            Destination::Font => "font",
            Destination::Other => "other",
        }
    }

    /// Map a `Sec-Fetch-Dest` value onto a destination class.
    ///
    /// Anything outside the five named classes (`empty`, `manifest`, `iframe`,
    /// `video`, ...) is [`Destination::Other`].
    pub fn from_fetch_dest(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "document" => Destination::Document,
            "style" => Destination::Style,
            "script" => Destination::Script,
            "image" => Destination::Image,
            "font" => Destination::Font,
            _ => Destination::Other,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request mode (`Sec-Fetch-Mode`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    Navigate,
    SameOrigin,
    #[default]
    NoCors,
    Cors,
    Websocket,
}

impl FromStr for RequestMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "navigate" => Ok(RequestMode::Navigate),
            "same-origin" => Ok(RequestMode::SameOrigin),
            "no-cors" => Ok(RequestMode::NoCors),
            "cors" => Ok(RequestMode::Cors),
            "websocket" => Ok(RequestMode::Websocket),
            other => Err(format!("unknown request mode: {}", other)),
        }
    }
}

/// Browser cache directive attached to the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Default,
    NoStore,
    Reload,
    NoCache,
    ForceCache,
    OnlyIfCached,
}

impl FromStr for CacheMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(CacheMode::Default),
            "no-store" => Ok(CacheMode::NoStore),
            "reload" => Ok(CacheMode::Reload),
            "no-cache" => Ok(CacheMode::NoCache),
            "force-cache" => Ok(CacheMode::ForceCache),
            "only-if-cached" => Ok(CacheMode::OnlyIfCached),
            other => Err(format!("unknown cache mode: {}", other)),
        }
    }
}

/// Key of a cached entry: method plus URL without fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey(String);

impl RequestKey {
    pub fn new(method: &Method, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self(format!("{} {}", method.as_str(), url))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// URL part of the key
    pub fn url(&self) -> &str {
        self.0.split_once(' ').map(|(_, url)| url).unwrap_or(&self.0)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A request seen at the interception boundary
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub method: Method,
    pub url: Url,
    pub destination: Destination,
    pub cache: CacheMode,
    pub mode: RequestMode,
    pub headers: HeaderList,
    /// Only forwarded on pass-through; handled requests are all `GET`
    pub body: Bytes,
}

impl InterceptedRequest {
    /// Create a `GET` request with default mode and cache directive
    pub fn get(url: Url, destination: Destination) -> Self {
        Self {
            method: Method::GET,
            url,
            destination,
            cache: CacheMode::Default,
            mode: RequestMode::NoCors,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Create a top-level navigation request
    pub fn navigate(url: Url) -> Self {
        Self::get(url, Destination::Document).with_mode(RequestMode::Navigate)
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_cache(mut self, cache: CacheMode) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn key(&self) -> RequestKey {
        RequestKey::new(&self.method, &self.url)
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Whether this request targets the given origin (scheme, host and port)
    pub fn is_same_origin(&self, origin: &Url) -> bool {
        self.url.origin() == origin.origin()
    }
}
