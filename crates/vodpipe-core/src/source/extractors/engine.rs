//! Native P2P stream engine bridged into a request/response `fetch`.
//!
//! `fetch` starts the engine on a URL and waits on a one-shot gate. The
//! engine reports back through `EngineListener` callbacks carrying JSON
//! payloads: `on_prepared` with `{"hls": "<url>"}` opens the gate with the
//! local stream URL, `on_stop` with a negative `errno` fails it.
//!
//! The engine is initialized once per process with an `EngineProfile`. If a
//! later fetch needs a different profile the extractor does not re-initialize
//! in place; it requests a process restart and fails with
//! `ExtractError::RestartRequired`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

use crate::restart::{RestartRequest, RestartSignal};
use crate::source::error::ExtractError;
use crate::source::extractor::Extractor;
use crate::source::gate::{gate, GateOpener};

/// Identity and options the engine is initialized with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineProfile {
    /// Where the engine library comes from.
    #[serde(default)]
    pub library: String,
    #[serde(default)]
    pub auth: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pass: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub broker: String,
    /// Extra engine options as key/value pairs.
    #[serde(default)]
    pub options: Vec<(String, String)>,
}

/// Boundary to the native engine.
pub trait StreamEngine: Send + Sync {
    /// Initialize once. `listener` receives every later callback.
    fn init(&self, profile: &EngineProfile, listener: EngineListener) -> anyhow::Result<()>;

    /// Start playing `url`; completion arrives through the listener.
    fn start(&self, url: &str);

    fn stop(&self);

    /// Release native resources. Called on exit.
    fn quit(&self) {}
}

type GateSlot = Arc<Mutex<Option<(u64, Arc<GateOpener>)>>>;

/// Callback sink handed to the engine; routes results to the open gate.
#[derive(Clone)]
pub struct EngineListener {
    gate: GateSlot,
}

fn parse_payload(payload: &str) -> Option<serde_json::Value> {
    match serde_json::from_str(payload) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("unparseable engine payload: {}", e);
            None
        }
    }
}

impl EngineListener {
    fn current(&self) -> Option<Arc<GateOpener>> {
        self.gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(_, opener)| Arc::clone(opener))
    }

    pub fn on_prepared(&self, payload: &str) {
        tracing::debug!(payload, "engine prepared");
        let Some(json) = parse_payload(payload) else {
            return;
        };
        let Some(hls) = json.get("hls").and_then(|v| v.as_str()) else {
            return;
        };
        if let Some(opener) = self.current() {
            opener.succeed(hls);
        }
    }

    pub fn on_stop(&self, payload: &str) {
        tracing::debug!(payload, "engine stopped");
        let Some(json) = parse_payload(payload) else {
            return;
        };
        let errno = match json.get("errno") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => return,
        };
        if errno.starts_with('-') {
            if let Some(opener) = self.current() {
                opener.fail(errno);
            }
        }
    }

    pub fn on_inited(&self, payload: &str) {
        tracing::debug!(payload, "engine inited");
    }

    pub fn on_start(&self, payload: &str) {
        tracing::debug!(payload, "engine started");
    }

    pub fn on_info(&self, _payload: &str) {}

    pub fn on_quit(&self, payload: &str) {
        tracing::debug!(payload, "engine quit");
    }
}

#[derive(Default)]
struct EngineState {
    active: Option<EngineProfile>,
    next_gate: u64,
}

/// Extractor for `tvbus://` links served by a native engine.
pub struct EngineExtractor {
    engine: Arc<dyn StreamEngine>,
    profile: watch::Receiver<Option<EngineProfile>>,
    restart: RestartSignal,
    gate: GateSlot,
    state: Mutex<EngineState>,
}

impl EngineExtractor {
    /// `profile` is read on every fetch; the host publishes the live source's profile into it.
    pub fn new(
        engine: Arc<dyn StreamEngine>,
        profile: watch::Receiver<Option<EngineProfile>>,
        restart: RestartSignal,
    ) -> Self {
        Self {
            engine,
            profile,
            restart,
            gate: Arc::new(Mutex::new(None)),
            state: Mutex::new(EngineState::default()),
        }
    }

    fn listener(&self) -> EngineListener {
        EngineListener {
            gate: Arc::clone(&self.gate),
        }
    }

    fn request_restart(&self) -> ExtractError {
        let reason = "stream engine settings changed; restart required".to_string();
        self.restart.request(RestartRequest {
            reason: reason.clone(),
            resume_live: true,
        });
        ExtractError::RestartRequired(reason)
    }

    fn release_gate(&self) {
        let opener = self
            .gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((_, opener)) = opener {
            opener.cancel();
        }
    }

    fn is_initialized(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .active
            .is_some()
    }
}

#[async_trait]
impl Extractor for EngineExtractor {
    fn name(&self) -> &'static str {
        "engine"
    }

    fn matches(&self, scheme: &str, _host: &str) -> bool {
        scheme == "tvbus"
    }

    async fn fetch(&self, url: &str) -> Result<String, ExtractError> {
        let wanted = self
            .profile
            .borrow()
            .clone()
            .ok_or_else(|| ExtractError::failed("no stream engine configured for this source"))?;

        let (id, waiter) = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match &state.active {
                Some(active) if *active != wanted => return Err(self.request_restart()),
                Some(_) => {}
                None => {
                    self.engine
                        .init(&wanted, self.listener())
                        .map_err(|e| ExtractError::failed(format!("stream engine init failed: {:#}", e)))?;
                    tracing::info!(name = %wanted.name, "stream engine initialized");
                    state.active = Some(wanted);
                }
            }

            let mut slot = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.as_ref().is_some_and(|(_, opener)| opener.is_open()) {
                return Err(ExtractError::Busy);
            }
            state.next_gate += 1;
            let id = state.next_gate;
            let (opener, waiter) = gate();
            *slot = Some((id, Arc::new(opener)));
            (id, waiter)
        };

        self.engine.start(url);
        let result = waiter.wait().await;

        let mut slot = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|(current, _)| *current == id) {
            *slot = None;
        }
        result
    }

    fn stop(&self) {
        if self.is_initialized() {
            self.engine.stop();
        }
        self.release_gate();
    }

    fn exit(&self) {
        self.release_gate();
        if self.is_initialized() {
            self.engine.stop();
            self.engine.quit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Engine double: answers `start` with a scripted callback.
    #[derive(Default)]
    struct ScriptedEngine {
        listener: Mutex<Option<EngineListener>>,
        reply: Mutex<Option<(&'static str, String)>>,
        inits: AtomicUsize,
        stops: AtomicUsize,
    }

    impl ScriptedEngine {
        fn reply(&self, kind: &'static str, payload: &str) {
            *self.reply.lock().unwrap() = Some((kind, payload.to_string()));
        }
    }

    impl StreamEngine for ScriptedEngine {
        fn init(&self, _profile: &EngineProfile, listener: EngineListener) -> anyhow::Result<()> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            *self.listener.lock().unwrap() = Some(listener);
            Ok(())
        }

        fn start(&self, _url: &str) {
            let listener = self.listener.lock().unwrap().clone().unwrap();
            match self.reply.lock().unwrap().clone() {
                Some(("prepared", p)) => listener.on_prepared(&p),
                Some(("stop", p)) => listener.on_stop(&p),
                _ => {}
            }
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn profile(name: &str) -> EngineProfile {
        EngineProfile {
            name: name.into(),
            ..EngineProfile::default()
        }
    }

    fn setup(
        name: &str,
    ) -> (
        Arc<ScriptedEngine>,
        watch::Sender<Option<EngineProfile>>,
        RestartSignal,
        Arc<EngineExtractor>,
    ) {
        let engine = Arc::new(ScriptedEngine::default());
        let (tx, rx) = watch::channel(Some(profile(name)));
        let restart = RestartSignal::default();
        let extractor = Arc::new(EngineExtractor::new(engine.clone(), rx, restart.clone()));
        (engine, tx, restart, extractor)
    }

    #[tokio::test]
    async fn prepared_callback_resolves_fetch() {
        let (engine, _tx, _restart, extractor) = setup("a");
        engine.reply("prepared", r#"{"hls":"http://127.0.0.1:8902/tvbus.m3u8"}"#);
        let url = extractor.fetch("tvbus://abc").await.unwrap();
        assert_eq!(url, "http://127.0.0.1:8902/tvbus.m3u8");
        extractor.fetch("tvbus://def").await.unwrap();
        assert_eq!(engine.inits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn negative_errno_is_typed_error() {
        let (engine, _tx, _restart, extractor) = setup("a");
        engine.reply("stop", r#"{"errno":"-12"}"#);
        let err = extractor.fetch("tvbus://abc").await.unwrap_err();
        assert_eq!(err, ExtractError::EngineCode("-12".into()));
    }

    #[tokio::test]
    async fn stop_releases_waiting_fetch_and_busy_is_rejected() {
        let (engine, _tx, _restart, extractor) = setup("a");
        let pending = {
            let extractor = Arc::clone(&extractor);
            tokio::spawn(async move { extractor.fetch("tvbus://silent").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(
            extractor.fetch("tvbus://other").await,
            Err(ExtractError::Busy)
        );
        extractor.stop();
        assert_eq!(pending.await.unwrap(), Err(ExtractError::Stopped));
        assert_eq!(engine.stops.load(Ordering::SeqCst), 1);

        engine.reply("prepared", r#"{"hls":"http://127.0.0.1:8902/next.m3u8"}"#);
        assert!(extractor.fetch("tvbus://next").await.is_ok());
    }

    #[tokio::test]
    async fn profile_change_requests_restart() {
        let (engine, tx, restart, extractor) = setup("a");
        engine.reply("prepared", r#"{"hls":"http://127.0.0.1:8902/a.m3u8"}"#);
        extractor.fetch("tvbus://abc").await.unwrap();

        tx.send_replace(Some(profile("b")));
        let err = extractor.fetch("tvbus://abc").await.unwrap_err();
        assert!(err.is_restart_required());
        assert_eq!(engine.inits.load(Ordering::SeqCst), 1);
        assert!(restart.requested().unwrap().resume_live);
    }

    #[tokio::test]
    async fn exit_is_safe_when_unused() {
        let (engine, _tx, _restart, extractor) = setup("a");
        extractor.exit();
        assert_eq!(engine.stops.load(Ordering::SeqCst), 0);
    }
}
