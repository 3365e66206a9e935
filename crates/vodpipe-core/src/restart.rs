//! Process-restart requests raised by the core.
//!
//! Some failures cannot be recovered in-process (a native engine that was
//! initialized with one identity and now needs another). The core records
//! what to resume after the restart, notifies the host and fails the current
//! operation with a distinct error kind. It never retries past the request;
//! the host decides how to restart.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

/// Flags read at startup to resume where the previous process stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootFlags {
    /// Reopen live playback on the next start.
    #[serde(default)]
    pub resume_live: bool,
}

impl BootFlags {
    /// Default path: `~/.local/state/vodpipe/boot.toml`.
    pub fn default_path() -> Result<PathBuf> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("vodpipe")?;
        Ok(xdg_dirs.get_state_home().join("boot.toml"))
    }

    /// Load flags; a missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<BootFlags> {
        let data = match std::fs::read_to_string(path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BootFlags::default()),
            Err(e) => return Err(e).with_context(|| format!("read boot flags: {}", path.display())),
        };
        toml::from_str(&data).with_context(|| format!("parse boot flags: {}", path.display()))
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir: {}", parent.display()))?;
        }
        let data = toml::to_string_pretty(self).context("serialize boot flags")?;
        std::fs::write(path, data).with_context(|| format!("write boot flags: {}", path.display()))
    }
}

/// A request for a full process restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartRequest {
    pub reason: String,
    pub resume_live: bool,
}

struct Inner {
    tx: watch::Sender<Option<RestartRequest>>,
    flags_path: Option<PathBuf>,
}

/// Shared restart notifier. Cheap to clone.
#[derive(Clone)]
pub struct RestartSignal {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RestartSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestartSignal")
            .field("requested", &self.requested())
            .field("flags_path", &self.inner.flags_path)
            .finish()
    }
}

impl Default for RestartSignal {
    fn default() -> Self {
        Self::new(None)
    }
}

impl RestartSignal {
    /// `flags_path`: where `BootFlags` are persisted on request (None = memory only).
    pub fn new(flags_path: Option<PathBuf>) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            inner: Arc::new(Inner { tx, flags_path }),
        }
    }

    /// Record the request, persist the resume flag and wake subscribers.
    pub fn request(&self, request: RestartRequest) {
        tracing::warn!(reason = %request.reason, resume_live = request.resume_live, "process restart requested");
        if let Some(path) = &self.inner.flags_path {
            let flags = BootFlags {
                resume_live: request.resume_live,
            };
            if let Err(e) = flags.save_to_path(path) {
                tracing::warn!("could not persist boot flags: {:#}", e);
            }
        }
        self.inner.tx.send_replace(Some(request));
    }

    pub fn requested(&self) -> Option<RestartRequest> {
        self.inner.tx.borrow().clone()
    }

    /// Receiver that changes once a restart is requested.
    pub fn subscribe(&self) -> watch::Receiver<Option<RestartRequest>> {
        self.inner.tx.subscribe()
    }
}
