//! Response snapshots
//!
//! A [`StoredResponse`] is a fully-buffered response: it is what upstream
//! fetches produce, what strategies return, and what the cache persists.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::HeaderList;

/// Response headers never persisted; a replayed cookie could overwrite a newer one
const UNSTORED_HEADERS: &[&str] = &["set-cookie", "set-cookie2"];

/// Offline page served when a navigation fails with nothing cached
const OFFLINE_DOCUMENT: &str = concat!(
    "<!doctype html><title>Offline</title>",
    "<meta name=\"viewport\" content=\"width=device-width,initial-scale=1\">",
    "<h1>Offline</h1><p>This page isn\u{2019}t available without a connection.</p>",
);

/// Origin classification of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response whose status and headers are fully visible
    #[default]
    Basic,
    /// Cross-origin response obtained under CORS
    Cors,
    /// Cross-origin response whose contents cannot be inspected
    Opaque,
    /// Network error placeholder
    Error,
}

/// A buffered HTTP response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderList,
    pub body: Bytes,
    /// Final URL after redirects, empty for synthesized responses
    pub url: String,
    /// Whether the response is the result of following a redirect
    pub redirected: bool,
    pub response_type: ResponseType,
}

impl StoredResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            status_text: http::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("")
                .to_string(),
            headers: Vec::new(),
            body: body.into(),
            url: String::new(),
            redirected: false,
            response_type: ResponseType::Basic,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_content_type(self, content_type: &str) -> Self {
        self.with_header("content-type", content_type)
    }

    pub fn with_status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = status_text.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_redirected(mut self, redirected: bool) -> Self {
        self.redirected = redirected;
        self
    }

    pub fn with_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    /// Case-insensitive header lookup; first match wins
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Status in the 200-299 range
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Copy fit for persisting, without cookie-setting headers
    pub fn for_storage(mut self) -> Self {
        self.headers.retain(|(name, _)| !UNSTORED_HEADERS.iter().any(|h| name.eq_ignore_ascii_case(h)));
        self
    }

    /// Synthesized offline document for failed navigations (503)
    pub fn offline_document() -> Self {
        Self::new(503, OFFLINE_DOCUMENT).with_content_type("text/html; charset=utf-8")
    }

    /// Empty failure response for failed non-navigation requests (504)
    pub fn offline_fallback() -> Self {
        Self::new(504, Bytes::new()).with_status_text("Offline")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let res = StoredResponse::new(200, "x").with_header("Content-Type", "text/css");
        assert_eq!(res.content_type(), Some("text/css"));
        assert_eq!(res.header("CONTENT-TYPE"), Some("text/css"));
        assert_eq!(res.header("etag"), None);
    }

    #[test]
    fn test_offline_document() {
        let res = StoredResponse::offline_document();
        assert_eq!(res.status, 503);
        assert!(!res.body.is_empty());
        assert!(res.content_type().unwrap().starts_with("text/html"));
    }

    #[test]
    fn test_offline_fallback() {
        let res = StoredResponse::offline_fallback();
        assert_eq!(res.status, 504);
        assert_eq!(res.status_text, "Offline");
        assert!(res.body.is_empty());
        assert!(!res.is_ok());
    }

    #[test]
    fn test_for_storage_drops_cookies() {
        let res = StoredResponse::new(200, "x")
            .with_content_type("text/css")
            .with_header("Set-Cookie", "session=abc123; HttpOnly")
            .with_header("set-cookie2", "legacy=1")
            .for_storage();
        assert_eq!(res.headers, vec![("content-type".to_string(), "text/css".to_string())]);
    }

    #[test]
    fn test_status_text_defaults_to_reason() {
        assert_eq!(StoredResponse::new(404, "").status_text, "Not Found");
    }
}
