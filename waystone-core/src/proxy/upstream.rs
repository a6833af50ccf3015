//! HTTP upstream backed by reqwest

use std::time::Duration;

use bytes::BytesMut;
use url::Url;

use super::traits::{FetchError, FetchOptions, Upstream};
use crate::http::{InterceptedRequest, ResponseType, StoredResponse};

/// Request headers that are connection-scoped and never forwarded
const HOP_BY_HOP: &[&str] = &[
    "host",
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Fetches from the network with a shared reqwest client.
#[derive(Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    origin: Url,
    max_body_size: usize,
}

impl HttpUpstream {
    /// Client following redirects, classifying responses against `origin`
    pub fn new(origin: Url) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FetchError::InvalidRequest(e.to_string()))?;
        Ok(Self { client, origin, max_body_size: DEFAULT_MAX_BODY_SIZE })
    }

    /// Responses with larger bodies fail with [`FetchError::TooLarge`]
    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    async fn read_body(&self, mut response: reqwest::Response) -> Result<bytes::Bytes, FetchError> {
        if response.content_length().is_some_and(|len| len > self.max_body_size as u64) {
            return Err(FetchError::TooLarge(self.max_body_size));
        }
        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(classify_error)? {
            if body.len() + chunk.len() > self.max_body_size {
                return Err(FetchError::TooLarge(self.max_body_size));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }
}

#[async_trait::async_trait]
impl Upstream for HttpUpstream {
    async fn fetch(
        &self,
        request: &InterceptedRequest,
        options: FetchOptions,
    ) -> Result<StoredResponse, FetchError> {
        let mut builder = self.client.request(request.method.clone(), request.url.clone());

        for (name, value) in &request.headers {
            if HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h)) {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }
        if options.bypass_http_cache {
            builder = builder.header("cache-control", "no-store").header("pragma", "no-cache");
        }

        let response = builder.send().await.map_err(classify_error)?;

        let final_url = response.url().clone();
        let mut requested = request.url.clone();
        requested.set_fragment(None);
        let redirected = final_url != requested;
        let response_type = if final_url.origin() == self.origin.origin() {
            ResponseType::Basic
        } else {
            ResponseType::Cors
        };

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = self.read_body(response).await?;

        log::debug!("Upstream {} {} -> {}", request.method, request.url, status.as_u16());

        Ok(StoredResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body,
            url: final_url.to_string(),
            redirected,
            response_type,
        })
    }
}

fn classify_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(Duration::ZERO)
    } else if err.is_builder() {
        FetchError::InvalidRequest(err.to_string())
    } else {
        FetchError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Destination;

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Port 9 (discard) on localhost is closed on test machines.
        let origin = Url::parse("http://127.0.0.1:9").unwrap();
        let upstream = HttpUpstream::new(origin.clone()).unwrap();
        let req = InterceptedRequest::get(origin.join("/x.css").unwrap(), Destination::Style);

        let err = upstream.fetch(&req, FetchOptions::default()).await.unwrap_err();
        assert!(matches!(err, FetchError::Network(_) | FetchError::Timeout(_)));
    }

    /// Serve one canned HTTP/1.1 response on a local port
    async fn canned(body: &'static str) -> Url {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await;
            let head = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                body.len()
            );
            stream.write_all(head.as_bytes()).await.unwrap();
            stream.write_all(body.as_bytes()).await.unwrap();
        });
        Url::parse(&format!("http://{}", addr)).unwrap()
    }

    #[tokio::test]
    async fn test_same_origin_response_is_basic() {
        let origin = canned("hello").await;
        let upstream = HttpUpstream::new(origin.clone()).unwrap();
        let req = InterceptedRequest::get(origin.join("/a.txt").unwrap(), Destination::Other);

        let res = upstream.fetch(&req, FetchOptions::default()).await.unwrap();
        assert_eq!(res.status, 200);
        assert_eq!(&res.body[..], b"hello");
        assert_eq!(res.response_type, ResponseType::Basic);
        assert!(!res.redirected);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let origin = canned("more than eight bytes").await;
        let upstream = HttpUpstream::new(origin.clone()).unwrap().with_max_body_size(8);
        let req = InterceptedRequest::get(origin.join("/big.txt").unwrap(), Destination::Other);

        let err = upstream.fetch(&req, FetchOptions::default()).await.unwrap_err();
        assert_eq!(err, FetchError::TooLarge(8));
    }
}
