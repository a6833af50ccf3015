//! Request routing
//!
//! Decides, per intercepted request, whether the engine handles it at all
//! and with which strategy. Unhandled requests are passed through and go to
//! the network untouched.

use std::sync::Arc;

use http::Method;

use super::strategy::{Strategy, StrategySet};
use crate::config::EngineConfig;
use crate::http::{CacheMode, Destination, InterceptedRequest, RequestMode, StoredResponse};

/// Routing outcome before any I/O
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    PassThrough,
    Handle(Strategy),
}

/// Routing outcome after serving
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// The host performs the request itself
    PassThrough,
    Respond(StoredResponse),
}

pub struct Router {
    config: Arc<EngineConfig>,
    strategies: StrategySet,
}

impl Router {
    pub fn new(config: Arc<EngineConfig>, strategies: StrategySet) -> Self {
        Self { config, strategies }
    }

    pub fn strategies(&self) -> &StrategySet {
        &self.strategies
    }

    pub fn classify(&self, request: &InterceptedRequest) -> Route {
        if request.method != Method::GET {
            return Route::PassThrough;
        }
        // Browsers reject only-if-cached outside same-origin mode.
        if request.cache == CacheMode::OnlyIfCached && request.mode != RequestMode::SameOrigin {
            return Route::PassThrough;
        }
        if !request.is_same_origin(&self.config.origin) {
            return Route::PassThrough;
        }
        Route::Handle(self.strategy_for(request))
    }

    pub fn strategy_for(&self, request: &InterceptedRequest) -> Strategy {
        if request.is_navigation() {
            return Strategy::NetworkFirst;
        }
        if let Some(max_entries) = self.config.bound_for(request.destination) {
            return Strategy::CacheFirst { max_entries };
        }
        match request.destination {
            Destination::Document => Strategy::NetworkFirst,
            Destination::Style | Destination::Script => {
                Strategy::StaleWhileRevalidate { strict: true }
            }
            _ => Strategy::StaleWhileRevalidate { strict: false },
        }
    }

    pub async fn handle(&self, request: &InterceptedRequest) -> Decision {
        match self.classify(request) {
            Route::PassThrough => {
                log::trace!("Passing through {} {}", request.method, request.url);
                Decision::PassThrough
            }
            Route::Handle(strategy) => {
                log::debug!("{} {} via {:?}", request.method, request.url, strategy);
                Decision::Respond(self.strategies.serve(strategy, request).await)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{BoundedCacheStore, MemoryCacheStorage};
    use crate::lifecycle::BackgroundTasks;
    use crate::testing::ScriptedUpstream;
    use url::Url;

    fn router() -> (Router, ScriptedUpstream) {
        let config = Arc::new(
            EngineConfig::new("v1", Url::parse("https://app.test").unwrap()).with_bounds(7, 3),
        );
        let upstream = ScriptedUpstream::new();
        let runtime = BoundedCacheStore::new(Arc::new(MemoryCacheStorage::new()), "runtime-v1");
        let strategies =
            StrategySet::new(config.clone(), runtime, Arc::new(upstream.clone()), BackgroundTasks::new());
        (Router::new(config, strategies), upstream)
    }

    fn get(path: &str, dest: Destination) -> InterceptedRequest {
        InterceptedRequest::get(Url::parse("https://app.test").unwrap().join(path).unwrap(), dest)
    }

    #[test]
    fn test_non_get_passes_through() {
        let (router, _) = router();
        let req = get("/api", Destination::Other).with_method(Method::POST);
        assert_eq!(router.classify(&req), Route::PassThrough);
    }

    #[test]
    fn test_only_if_cached_outside_same_origin_mode() {
        let (router, _) = router();
        let req = get("/a.js", Destination::Script).with_cache(CacheMode::OnlyIfCached);
        assert_eq!(router.classify(&req), Route::PassThrough);

        let req = req.with_mode(RequestMode::SameOrigin);
        assert_eq!(router.classify(&req), Route::Handle(Strategy::StaleWhileRevalidate { strict: true }));
    }

    #[test]
    fn test_cross_origin_passes_through() {
        let (router, _) = router();
        let req = InterceptedRequest::get(
            Url::parse("https://cdn.test/lib.js").unwrap(),
            Destination::Script,
        );
        assert_eq!(router.classify(&req), Route::PassThrough);
    }

    #[test]
    fn test_strategy_table() {
        let (router, _) = router();
        let nav = InterceptedRequest::navigate(Url::parse("https://app.test/page").unwrap());
        assert_eq!(router.classify(&nav), Route::Handle(Strategy::NetworkFirst));
        assert_eq!(
            router.classify(&get("/x", Destination::Document)),
            Route::Handle(Strategy::NetworkFirst)
        );
        assert_eq!(
            router.classify(&get("/s.css", Destination::Style)),
            Route::Handle(Strategy::StaleWhileRevalidate { strict: true })
        );
        assert_eq!(
            router.classify(&get("/i.png", Destination::Image)),
            Route::Handle(Strategy::CacheFirst { max_entries: 7 })
        );
        assert_eq!(
            router.classify(&get("/f.woff2", Destination::Font)),
            Route::Handle(Strategy::CacheFirst { max_entries: 3 })
        );
        assert_eq!(
            router.classify(&get("/data.json", Destination::Other)),
            Route::Handle(Strategy::StaleWhileRevalidate { strict: false })
        );
    }

    #[tokio::test]
    async fn test_handle_responds_for_handled_routes() {
        let (router, upstream) = router();
        let req = get("/data.json", Destination::Other);
        upstream.respond(&req.url, StoredResponse::new(200, "{}"));

        match router.handle(&req).await {
            Decision::Respond(res) => assert_eq!(res.status, 200),
            Decision::PassThrough => panic!("expected a response"),
        }
        assert_eq!(router.handle(&req.clone().with_method(Method::PUT)).await, Decision::PassThrough);
    }
}
