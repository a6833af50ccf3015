//! Async interception server using Hyper
//!
//! Every incoming request is converted into an [`InterceptedRequest`] and
//! handed to the active worker. Requests the worker passes through are
//! forwarded to the upstream unchanged. Two control endpoints live under
//! `/__waystone/`: `POST message` delivers the update signal and
//! `GET status` reports the registration state.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::request::Parts;
use http::{HeaderName, HeaderValue, Method, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{body::Incoming, Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use url::Url;

use super::{CacheMode, Destination, InterceptedRequest, RequestMode, StoredResponse};
use crate::lifecycle::Registration;
use crate::proxy::{Decision, FetchOptions};
use crate::{Error, Result};

const MESSAGE_PATH: &str = "/__waystone/message";
const STATUS_PATH: &str = "/__waystone/status";

/// Response headers recomputed by hyper or scoped to the upstream connection
const SKIPPED_RESPONSE_HEADERS: &[&str] =
    &["connection", "keep-alive", "transfer-encoding", "content-length", "upgrade"];

const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

type HyperResponse = Response<Full<Bytes>>;

struct Shared {
    registration: Arc<Registration>,
    origin: Url,
    max_body_size: usize,
}

/// HTTP front-end for a [`Registration`]
pub struct InterceptServer {
    registration: Arc<Registration>,
    addr: String,
    origin: Url,
    max_body_size: usize,
}

impl InterceptServer {
    /// Listen on `addr` (`host:port`); `origin` is the site being cached and
    /// origin-form targets resolve against it
    pub fn new(registration: Arc<Registration>, addr: impl Into<String>, origin: Url) -> Self {
        Self { registration, addr: addr.into(), origin, max_body_size: DEFAULT_MAX_BODY_SIZE }
    }

    /// Larger request bodies are answered with 413
    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    /// Serve until Ctrl-C, then finish open connections and drain background work
    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(self.addr.as_str()).await?;
        self.serve_on(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let local = listener.local_addr()?;
        log::info!("Waystone listening on http://{} (origin {})", local, self.origin);

        let shared = Arc::new(Shared {
            registration: self.registration,
            origin: self.origin,
            max_body_size: self.max_body_size,
        });
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            log::warn!("Accept failed: {}", e);
                            continue;
                        }
                    };
                    connections.spawn(serve_connection(stream, peer, shared.clone(), stop_rx.clone()));
                }
            }
        }

        log::info!("Shutting down, closing {} connections", connections.len());
        let _ = stop_tx.send(true);
        while let Some(result) = connections.join_next().await {
            if let Err(e) = result {
                log::error!("Connection task failed: {}", e);
            }
        }

        shared.registration.drain().await;
        log::info!("Background work drained");
        Ok(())
    }
}

async fn serve_connection(
    stream: tokio::net::TcpStream,
    peer: SocketAddr,
    shared: Arc<Shared>,
    mut stop: watch::Receiver<bool>,
) {
    let client = shared.registration.client_connected();
    log::debug!("{} connected from {}", client, peer);

    let service = {
        let shared = shared.clone();
        service_fn(move |req| {
            let shared = shared.clone();
            async move { handle_request(req, shared).await }
        })
    };
    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = stop.changed() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };
    if let Err(e) = result {
        log::debug!("Connection from {} ended with error: {}", peer, e);
    }

    if let Err(e) = shared.registration.client_disconnected(client).await {
        log::warn!("Activation after {} left failed: {}", client, e);
    }
}

async fn handle_request(
    req: Request<Incoming>,
    shared: Arc<Shared>,
) -> std::result::Result<HyperResponse, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match Limited::new(body, shared.max_body_size).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            return Ok(text_response(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large"));
        }
        Err(e) => return Ok(text_response(StatusCode::BAD_REQUEST, &format!("Unreadable body: {}", e))),
    };

    if let Some(response) = handle_control(&parts, &body, &shared).await {
        return Ok(response);
    }

    let request = match intercepted_from_parts(&parts, body, &shared.origin) {
        Ok(request) => request,
        Err(e) => return Ok(text_response(StatusCode::BAD_REQUEST, &e.to_string())),
    };

    let response = match shared.registration.handle(&request).await {
        Decision::Respond(response) => response,
        Decision::PassThrough => {
            match shared.registration.upstream().fetch(&request, FetchOptions::default()).await {
                Ok(response) => response,
                Err(e) => {
                    log::warn!("Pass-through {} {} failed: {}", request.method, request.url, e);
                    return Ok(text_response(StatusCode::BAD_GATEWAY, "Bad Gateway"));
                }
            }
        }
    };

    Ok(to_hyper_response(response))
}

/// `None` when the request is not for a control endpoint
async fn handle_control(parts: &Parts, body: &Bytes, shared: &Shared) -> Option<HyperResponse> {
    match (&parts.method, parts.uri.path()) {
        (&Method::POST, MESSAGE_PATH) => {
            let message = String::from_utf8_lossy(body);
            let response = match shared.registration.post_message(&message).await {
                Ok(accepted) => json_response(
                    StatusCode::ACCEPTED,
                    &serde_json::json!({ "accepted": accepted }),
                ),
                Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
            };
            Some(response)
        }
        (&Method::GET, STATUS_PATH) => {
            Some(json_response(StatusCode::OK, &shared.registration.status()))
        }
        (_, MESSAGE_PATH | STATUS_PATH) => {
            Some(text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"))
        }
        _ => None,
    }
}

/// Build an intercepted request from hyper request parts.
///
/// `Sec-Fetch-Dest` and `Sec-Fetch-Mode` give the destination and mode;
/// `Cache-Control` gives the cache mode. Origin-form targets resolve against
/// `origin`; absolute-form targets keep their own origin.
pub fn intercepted_from_parts(parts: &Parts, body: Bytes, origin: &Url) -> Result<InterceptedRequest> {
    let target = parts.uri.to_string();
    let url = if parts.uri.scheme().is_some() {
        Url::parse(&target)
    } else {
        origin.join(&target)
    }
    .map_err(|e| Error::Http(format!("invalid request target {:?}: {}", target, e)))?;

    let header = |name: &str| parts.headers.get(name).and_then(|v| v.to_str().ok());

    let destination = header("sec-fetch-dest").map(Destination::from_fetch_dest).unwrap_or_default();
    let mode = header("sec-fetch-mode").and_then(|v| v.parse::<RequestMode>().ok()).unwrap_or_default();
    let cache = header("cache-control").map(cache_mode_from_header).unwrap_or_default();

    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
        .collect();

    Ok(InterceptedRequest {
        method: parts.method.clone(),
        url,
        destination,
        cache,
        mode,
        headers,
        body,
    })
}

fn cache_mode_from_header(value: &str) -> CacheMode {
    let directives: Vec<String> =
        value.split(',').map(|d| d.trim().to_ascii_lowercase()).collect();
    let has = |d: &str| directives.iter().any(|x| x == d);

    if has("only-if-cached") {
        CacheMode::OnlyIfCached
    } else if has("no-store") {
        CacheMode::NoStore
    } else if has("no-cache") {
        CacheMode::NoCache
    } else {
        CacheMode::Default
    }
}

fn to_hyper_response(stored: StoredResponse) -> HyperResponse {
    let mut response = Response::new(Full::new(stored.body));
    *response.status_mut() = StatusCode::from_u16(stored.status).unwrap_or(StatusCode::BAD_GATEWAY);

    let headers = response.headers_mut();
    for (name, value) in &stored.headers {
        if SKIPPED_RESPONSE_HEADERS.iter().any(|h| name.eq_ignore_ascii_case(h)) {
            continue;
        }
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => log::debug!("Dropping unrepresentable header {:?}", name),
        }
    }
    response
}

fn text_response(status: StatusCode, text: &str) -> HyperResponse {
    to_hyper_response(
        StoredResponse::new(status.as_u16(), text.to_string())
            .with_content_type("text/plain; charset=utf-8"),
    )
}

fn json_response<T: serde::Serialize>(status: StatusCode, value: &T) -> HyperResponse {
    match serde_json::to_vec(value) {
        Ok(body) => to_hyper_response(
            StoredResponse::new(status.as_u16(), body).with_content_type("application/json"),
        ),
        Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}
