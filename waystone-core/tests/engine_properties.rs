//! End-to-end properties of the caching engine, driven through a
//! `Registration` with in-memory storage and a scripted upstream.

use std::sync::Arc;
use std::time::Duration;

use url::Url;
use waystone_core::prelude::*;
use waystone_core::testing::ScriptedUpstream;

const ORIGIN: &str = "https://catalog.test";

fn at(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

fn engine(version: &str) -> EngineConfig {
    EngineConfig::new(version, Url::parse(ORIGIN).unwrap())
        .with_precache_urls(["/css/sc.css", "/js/scripts.js"])
        .with_bounds(3, 2)
        .with_fetch_timeout(Some(Duration::from_millis(200)))
}

fn script_precache(upstream: &ScriptedUpstream) {
    upstream.respond(&at("/css/sc.css"), StoredResponse::new(200, "body{}").with_content_type("text/css"));
    upstream.respond(
        &at("/js/scripts.js"),
        StoredResponse::new(200, "run()").with_content_type("application/javascript"),
    );
}

struct Harness {
    registration: Registration,
    storage: Arc<MemoryCacheStorage>,
    upstream: ScriptedUpstream,
}

async fn harness(version: &str) -> Harness {
    let storage = Arc::new(MemoryCacheStorage::new());
    let upstream = ScriptedUpstream::new();
    script_precache(&upstream);
    let registration = Registration::new(storage.clone(), Arc::new(upstream.clone()));
    registration.register(engine(version)).await.unwrap();
    Harness { registration, storage, upstream }
}

async fn respond(registration: &Registration, request: &InterceptedRequest) -> StoredResponse {
    match registration.handle(request).await {
        Decision::Respond(response) => response,
        Decision::PassThrough => panic!("{} was passed through", request.url),
    }
}

#[tokio::test]
async fn test_install_precaches_manifest() {
    let h = harness("v1").await;
    let status = h.registration.status();
    assert_eq!(status.active.unwrap().state, WorkerState::Active);

    let keys = h.storage.keys("precache-v1").await.unwrap();
    assert_eq!(keys.len(), 2);
    assert!(keys.iter().any(|k| k.url() == at("/css/sc.css").as_str()));
}

#[tokio::test]
async fn test_activation_is_idempotent() {
    let h = harness("v1").await;
    let clients = ClientRegistry::new();
    let worker = h.registration.active().unwrap();

    worker.activate(&clients).await.unwrap();
    let first = h.storage.namespaces().await.unwrap();
    worker.activate(&clients).await.unwrap();
    let second = h.storage.namespaces().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(worker.state(), WorkerState::Active);
}

#[tokio::test]
async fn test_version_bump_purges_old_namespaces() {
    let h = harness("v1").await;
    let req = InterceptedRequest::get(at("/api/items"), Destination::Other);
    h.upstream.respond(&req.url, StoredResponse::new(200, "[]"));
    respond(&h.registration, &req).await;
    h.registration.drain().await;
    assert!(h.storage.namespaces().await.unwrap().contains(&"runtime-v1".to_string()));

    assert_eq!(h.registration.register(engine("v2")).await.unwrap(), WorkerState::Active);

    let names = h.storage.namespaces().await.unwrap();
    assert_eq!(names, vec!["precache-v2".to_string()]);
    for name in names {
        assert!(name.ends_with("-v2"));
    }
}

#[tokio::test]
async fn test_strict_type_rejection() {
    let h = harness("v1").await;
    let req = InterceptedRequest::get(at("/js/app.js"), Destination::Script);
    // Captive portal answering a script request with HTML
    h.upstream.respond(&req.url, StoredResponse::new(200, "<html>login</html>").with_content_type("text/html"));

    let res = respond(&h.registration, &req).await;
    assert_eq!(res.content_type(), Some("text/html"));
    h.registration.drain().await;

    assert!(h.storage.get("runtime-v1", &req.key()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_bounded_growth_evicts_oldest() {
    let h = harness("v1").await;
    let mut keys = Vec::new();

    for i in 0..5 {
        let req = InterceptedRequest::get(at(&format!("/img/{}.png", i)), Destination::Image);
        h.upstream.respond(&req.url, StoredResponse::new(200, vec![i as u8]).with_content_type("image/png"));
        respond(&h.registration, &req).await;
        // Each write lands before the next request so insertion order is deterministic.
        h.registration.drain().await;
        keys.push(req.key());
    }

    let stored = h.storage.keys("runtime-v1").await.unwrap();
    assert_eq!(stored, keys[2..].to_vec());
}

#[tokio::test]
async fn test_network_first_fallbacks() {
    let h = harness("v1").await;
    let page = InterceptedRequest::navigate(at("/products"));
    h.upstream.respond(&page.url, StoredResponse::new(200, "<h1>Products</h1>").with_content_type("text/html"));

    assert_eq!(respond(&h.registration, &page).await.status, 200);
    h.registration.drain().await;

    // Offline: the stored copy is served.
    h.upstream.clear(&page.url);
    let offline = respond(&h.registration, &page).await;
    assert_eq!(&offline.body[..], b"<h1>Products</h1>");

    // Offline with nothing stored: a non-empty 503 document.
    let missing = respond(&h.registration, &InterceptedRequest::navigate(at("/never-seen"))).await;
    assert_eq!(missing.status, 503);
    assert!(!missing.body.is_empty());
}

#[tokio::test]
async fn test_stale_first_latency() {
    let h = harness("v1").await;
    let req = InterceptedRequest::get(at("/css/theme.css"), Destination::Style);
    h.upstream.respond(&req.url, StoredResponse::new(200, "old").with_content_type("text/css"));
    respond(&h.registration, &req).await;
    h.registration.drain().await;

    // Revalidation is held open; the cached copy must still come back at once.
    h.upstream.respond(&req.url, StoredResponse::new(200, "new").with_content_type("text/css"));
    let gate = h.upstream.gate(&req.url);
    let served = tokio::time::timeout(Duration::from_millis(100), respond(&h.registration, &req))
        .await
        .expect("cached response was delayed by revalidation");
    assert_eq!(&served.body[..], b"old");

    gate.open();
    h.registration.drain().await;
    let stored = h.storage.get("runtime-v1", &req.key()).await.unwrap().unwrap();
    assert_eq!(&stored.body[..], b"new");
}

#[tokio::test]
async fn test_last_writer_wins() {
    let h = harness("v1").await;
    let req = InterceptedRequest::get(at("/api/feed"), Destination::Other);
    h.upstream.enqueue(&req.url, StoredResponse::new(200, "slow"));
    h.upstream.enqueue(&req.url, StoredResponse::new(200, "fast"));

    // The first fetch is held; the second completes and writes before it.
    let gate = h.upstream.gate(&req.url);
    let first = respond(&h.registration, &req);
    let later = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        h.upstream.ungate(&req.url);
        let second = respond(&h.registration, &req).await;
        assert_eq!(&second.body[..], b"fast");
        gate.open();
    };
    let (first, ()) = tokio::join!(first, later);
    assert_eq!(&first.body[..], b"slow");
    h.registration.drain().await;

    let stored = h.storage.get("runtime-v1", &req.key()).await.unwrap().unwrap();
    assert_eq!(&stored.body[..], b"slow");
}

#[tokio::test]
async fn test_timeout_falls_back() {
    let h = harness("v1").await;
    let req = InterceptedRequest::get(at("/api/slow"), Destination::Other);
    h.upstream.respond(&req.url, StoredResponse::new(200, "late"));
    h.upstream.delay(&req.url, Duration::from_secs(10));

    let res = respond(&h.registration, &req).await;
    assert_eq!(res.status, 504);
    assert_eq!(res.status_text, "Offline");
}

#[tokio::test]
async fn test_cross_origin_and_non_get_pass_through() {
    let h = harness("v1").await;
    let cdn = InterceptedRequest::get(Url::parse("https://cdn.test/lib.js").unwrap(), Destination::Script);
    assert_eq!(h.registration.handle(&cdn).await, Decision::PassThrough);

    let post = InterceptedRequest::get(at("/api/items"), Destination::Other).with_method(http::Method::POST);
    assert_eq!(h.registration.handle(&post).await, Decision::PassThrough);
}

#[tokio::test]
async fn test_failed_update_keeps_active_worker() {
    let h = harness("v1").await;
    h.upstream.clear(&at("/js/scripts.js"));

    let err = h.registration.register(engine("v2")).await.unwrap_err();
    assert!(matches!(err, Error::Install(_)));
    assert_eq!(h.registration.active().unwrap().version(), "v1");
    assert!(h.registration.waiting().is_none());
}

#[tokio::test]
async fn test_skip_waiting_message_flow() {
    let h = harness("v1").await;
    let client = h.registration.client_connected();

    let state = h
        .registration
        .register(engine("v2").with_skip_waiting_on_install(false))
        .await
        .unwrap();
    assert_eq!(state, WorkerState::Waiting);
    assert_eq!(h.registration.clients().controller_of(client).as_deref(), Some("v1"));

    assert!(h.registration.post_message(SKIP_WAITING).await.unwrap());
    let status = h.registration.status();
    assert_eq!(status.active.unwrap().version, "v2");
    assert!(status.waiting.is_none());
    assert_eq!(h.registration.clients().controller_of(client).as_deref(), Some("v2"));
}

#[tokio::test]
async fn test_in_flight_request_cannot_revive_purged_namespace() {
    let h = harness("v1").await;
    let page = InterceptedRequest::navigate(at("/products"));
    h.upstream.respond(&page.url, StoredResponse::new(200, "<h1>v1</h1>").with_content_type("text/html"));
    let gate = h.upstream.gate(&page.url);

    // v1 is still fetching the page when v2 takes over and purges v1's caches.
    let in_flight = respond(&h.registration, &page);
    let update = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.registration.register(engine("v2")).await.unwrap(), WorkerState::Active);
        assert_eq!(h.storage.namespaces().await.unwrap(), vec!["precache-v2".to_string()]);
        gate.open();
    };
    let (served, ()) = tokio::join!(in_flight, update);
    assert_eq!(served.status, 200);
    h.registration.drain().await;

    assert_eq!(h.storage.namespaces().await.unwrap(), vec!["precache-v2".to_string()]);
}

#[tokio::test]
async fn test_fonts_trim_to_font_bound() {
    let h = harness("v1").await;
    let mut keys = Vec::new();

    for i in 0..4 {
        let req = InterceptedRequest::get(at(&format!("/fonts/{}.woff2", i)), Destination::Font);
        h.upstream.respond(&req.url, StoredResponse::new(200, vec![i as u8]).with_content_type("font/woff2"));
        respond(&h.registration, &req).await;
        h.registration.drain().await;
        keys.push(req.key());
    }

    assert_eq!(h.storage.keys("runtime-v1").await.unwrap(), keys[2..].to_vec());
}

#[tokio::test]
async fn test_cached_hit_carries_no_cookie() {
    let h = harness("v1").await;
    let req = InterceptedRequest::get(at("/css/theme.css"), Destination::Style);
    h.upstream.respond(
        &req.url,
        StoredResponse::new(200, "body{}")
            .with_content_type("text/css")
            .with_header("set-cookie", "session=abc123; HttpOnly"),
    );
    respond(&h.registration, &req).await;
    h.registration.drain().await;

    h.upstream.clear(&req.url);
    let cached = respond(&h.registration, &req).await;
    assert_eq!(&cached.body[..], b"body{}");
    assert_eq!(cached.header("set-cookie"), None);
}
