//! Test doubles
//!
//! [`ScriptedUpstream`] stands in for the network in unit and integration
//! tests. Replies are scripted per URL; a URL with no script fails with a
//! network error, which is how tests model being offline.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use url::Url;

use crate::http::{InterceptedRequest, StoredResponse};
use crate::proxy::{FetchError, FetchOptions, Upstream};

#[derive(Clone)]
enum Reply {
    Respond(StoredResponse),
    Fail(FetchError),
}

#[derive(Default)]
struct Script {
    /// One-shot replies, consumed before `sticky`
    queue: VecDeque<Reply>,
    sticky: Option<Reply>,
    delay: Option<Duration>,
    gate: Option<watch::Receiver<bool>>,
    calls: usize,
    last_options: Option<FetchOptions>,
}

/// Holds fetches of a URL until opened
pub struct Gate {
    tx: watch::Sender<bool>,
}

impl Gate {
    pub fn open(&self) {
        let _ = self.tx.send(true);
    }
}

/// Upstream fake with per-URL scripted replies
#[derive(Clone, Default)]
pub struct ScriptedUpstream {
    scripts: Arc<Mutex<HashMap<String, Script>>>,
}

impl ScriptedUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `url` with `response`
    pub fn respond(&self, url: &Url, response: StoredResponse) {
        self.with_script(url, |s| s.sticky = Some(Reply::Respond(response)));
    }

    /// Always fail fetches of `url`
    pub fn fail(&self, url: &Url, error: FetchError) {
        self.with_script(url, |s| s.sticky = Some(Reply::Fail(error)));
    }

    /// Answer the next fetch of `url` with `response`, then fall back to the
    /// sticky reply
    pub fn enqueue(&self, url: &Url, response: StoredResponse) {
        self.with_script(url, |s| s.queue.push_back(Reply::Respond(response)));
    }

    /// Delay every fetch of `url`
    pub fn delay(&self, url: &Url, delay: Duration) {
        self.with_script(url, |s| s.delay = Some(delay));
    }

    /// Block fetches of `url` until the returned gate is opened
    pub fn gate(&self, url: &Url) -> Gate {
        let (tx, rx) = watch::channel(false);
        self.with_script(url, |s| s.gate = Some(rx));
        Gate { tx }
    }

    /// Stop gating new fetches of `url`; fetches already held stay held
    pub fn ungate(&self, url: &Url) {
        self.with_script(url, |s| s.gate = None);
    }

    /// Remove every script for `url`; it behaves offline afterwards
    pub fn clear(&self, url: &Url) {
        self.lock().remove(&normalize(url));
    }

    /// Number of fetches issued for `url`
    pub fn calls(&self, url: &Url) -> usize {
        self.lock().get(&normalize(url)).map(|s| s.calls).unwrap_or(0)
    }

    /// Options of the latest fetch of `url`
    pub fn last_options(&self, url: &Url) -> Option<FetchOptions> {
        self.lock().get(&normalize(url)).and_then(|s| s.last_options)
    }

    fn with_script(&self, url: &Url, f: impl FnOnce(&mut Script)) {
        f(self.lock().entry(normalize(url)).or_default());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Script>> {
        self.scripts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn normalize(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}

#[async_trait::async_trait]
impl Upstream for ScriptedUpstream {
    async fn fetch(
        &self,
        request: &InterceptedRequest,
        options: FetchOptions,
    ) -> Result<StoredResponse, FetchError> {
        let key = normalize(&request.url);

        let (reply, delay, gate) = {
            let mut scripts = self.lock();
            let script = scripts.entry(key.clone()).or_default();
            script.calls += 1;
            script.last_options = Some(options);
            let reply = script.queue.pop_front().or_else(|| script.sticky.clone());
            (reply, script.delay, script.gate.clone())
        };

        if let Some(mut gate) = gate {
            // A dropped gate releases its waiters.
            let _ = gate.wait_for(|open| *open).await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match reply {
            Some(Reply::Respond(mut response)) => {
                if response.url.is_empty() {
                    response.url = key;
                }
                Ok(response)
            }
            Some(Reply::Fail(error)) => Err(error),
            None => Err(FetchError::Network(format!("offline: {}", key))),
        }
    }
}
