//! Shared fakes for session integration tests: a routing HTTP transport,
//! a scripted stream engine and a canned spider.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vodpipe_core::channel::{MainThread, Outcome, Subscription};
use vodpipe_core::model::Site;
use vodpipe_core::net::{HttpRequest, HttpTransport};
use vodpipe_core::source::extractors::{EngineListener, EngineProfile, StreamEngine};
use vodpipe_core::spider::{Spider, SpiderLoader};

struct Route {
    prefix: String,
    param: Option<(String, String)>,
    body: String,
}

/// Answers requests whose URL starts with a prefix (and optionally carries a param).
#[derive(Default)]
pub struct RoutedTransport {
    routes: Mutex<Vec<Route>>,
    seen: Mutex<Vec<HttpRequest>>,
}

impl RoutedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(&self, prefix: &str, body: &str) {
        self.routes.lock().unwrap().push(Route {
            prefix: prefix.to_string(),
            param: None,
            body: body.to_string(),
        });
    }

    pub fn route_param(&self, prefix: &str, key: &str, value: &str, body: &str) {
        self.routes.lock().unwrap().push(Route {
            prefix: prefix.to_string(),
            param: Some((key.to_string(), value.to_string())),
            body: body.to_string(),
        });
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl HttpTransport for RoutedTransport {
    fn execute(&self, request: &HttpRequest) -> Result<String> {
        self.seen.lock().unwrap().push(request.clone());
        let routes = self.routes.lock().unwrap();
        routes
            .iter()
            .find(|r| {
                request.url.starts_with(&r.prefix)
                    && r.param
                        .as_ref()
                        .map_or(true, |(k, v)| request.param_value(k) == Some(v.as_str()))
            })
            .map(|r| r.body.clone())
            .ok_or_else(|| anyhow::anyhow!("no route for {}", request.url))
    }
}

/// Engine that answers `start` synchronously with a scripted callback.
#[derive(Default)]
pub struct ScriptedEngine {
    listener: Mutex<Option<EngineListener>>,
    pub hls: Mutex<String>,
    pub inits: AtomicUsize,
    pub starts: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new(hls: &str) -> Arc<Self> {
        let engine = Self::default();
        *engine.hls.lock().unwrap() = hls.to_string();
        Arc::new(engine)
    }

    pub fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }
}

impl StreamEngine for ScriptedEngine {
    fn init(&self, _profile: &EngineProfile, listener: EngineListener) -> Result<()> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        *self.listener.lock().unwrap() = Some(listener);
        Ok(())
    }

    fn start(&self, _url: &str) {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let listener = self.listener.lock().unwrap().clone();
        if let Some(listener) = listener {
            let payload = serde_json::json!({ "hls": *self.hls.lock().unwrap() });
            listener.on_prepared(&payload.to_string());
        }
    }

    fn stop(&self) {}
}

/// Spider answering every call with fixed JSON.
pub struct CannedSpider {
    pub home: String,
    pub detail: String,
    pub player: String,
}

#[async_trait]
impl Spider for CannedSpider {
    async fn home_content(&self, _filter: bool) -> Result<String> {
        Ok(self.home.clone())
    }

    async fn category_content(
        &self,
        _tid: &str,
        _page: &str,
        _filter: bool,
        _extend: &HashMap<String, String>,
    ) -> Result<String> {
        Ok(self.home.clone())
    }

    async fn detail_content(&self, _ids: &[String]) -> Result<String> {
        Ok(self.detail.clone())
    }

    async fn player_content(&self, _flag: &str, _id: &str, _vip_flags: &[String]) -> Result<String> {
        Ok(self.player.clone())
    }

    async fn search_content(&self, _keyword: &str, _quick: bool, _page: &str) -> Result<String> {
        Ok(self.home.clone())
    }
}

/// Hands out the same spider for every plugin site.
pub struct OneSpider(pub Arc<CannedSpider>);

impl SpiderLoader for OneSpider {
    fn spider(&self, _site: &Site) -> Result<Arc<dyn Spider>> {
        Ok(self.0.clone())
    }
}

pub fn main_thread() -> MainThread {
    MainThread::spawn().0
}

pub fn site(key: &str, site_type: i32, api: &str) -> Site {
    Site {
        key: key.to_string(),
        name: key.to_uppercase(),
        site_type,
        api: api.to_string(),
        ..Site::default()
    }
}

/// Next outcome, failing the test after a generous wait.
pub async fn next<T>(sub: &mut Subscription<T>) -> Outcome<T> {
    sub.recv_timeout(Duration::from_secs(5))
        .await
        .expect("outcome within 5s")
}
