// src/config/hot_reload.rs
//! Hot-reloadable engine config with per-batch snapshots.
//!
//! `snapshot()` checks the file's modified time and reloads when it changed.
//! Callers take one snapshot at batch start and keep it for the whole batch,
//! so a reload never lands mid-batch. An invalid file is logged and ignored;
//! the previous config stays active.

use anyhow::Result;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
    time::SystemTime,
};
use tracing::{info, warn};

use super::engine::EngineConfig;

#[derive(Debug)]
pub struct HotReloadConfig {
    path: Option<PathBuf>,
    inner: RwLock<State>,
}

#[derive(Debug)]
struct State {
    config: Arc<EngineConfig>,
    last_modified: Option<SystemTime>,
}

impl HotReloadConfig {
    /// Watch `path`; starts from defaults until the file is readable.
    pub fn new(path: Option<&Path>) -> Self {
        Self {
            path: path.map(Path::to_path_buf),
            inner: RwLock::new(State {
                config: Arc::new(EngineConfig::default()),
                last_modified: None,
            }),
        }
    }

    /// Watch `path`, starting from an already loaded config.
    pub fn with_initial(path: Option<&Path>, initial: EngineConfig) -> Self {
        let last_modified = path.and_then(mtime);
        Self {
            path: path.map(Path::to_path_buf),
            inner: RwLock::new(State {
                config: Arc::new(initial),
                last_modified,
            }),
        }
    }

    /// Fixed config, never reloaded.
    pub fn fixed(config: EngineConfig) -> Self {
        Self::with_initial(None, config)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Current config, reloading first if the file changed.
    pub fn snapshot(&self) -> Arc<EngineConfig> {
        let Some(path) = &self.path else {
            return self.current();
        };

        let new_mtime = match mtime(path) {
            Some(m) => m,
            None => return self.current(),
        };

        {
            let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            if guard.last_modified == Some(new_mtime) {
                return guard.config.clone();
            }
        }

        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        // Double-check in case another thread reloaded meanwhile.
        if guard.last_modified != Some(new_mtime) {
            match EngineConfig::load_from(path) {
                Ok(cfg) => {
                    info!(path = %path.display(), "engine config reloaded");
                    guard.config = Arc::new(cfg);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %format!("{e:#}"), "engine config reload rejected; keeping previous");
                }
            }
            guard.last_modified = Some(new_mtime);
        }
        guard.config.clone()
    }

    /// Force a reload regardless of mtime. Errors leave the current config in place.
    pub fn reload(&self) -> Result<Arc<EngineConfig>> {
        let Some(path) = &self.path else {
            return Ok(self.current());
        };
        let cfg = Arc::new(EngineConfig::load_from(path)?);
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.config = cfg.clone();
        guard.last_modified = mtime(path);
        info!(path = %path.display(), "engine config reloaded on request");
        Ok(cfg)
    }

    fn current(&self) -> Arc<EngineConfig> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .config
            .clone()
    }
}

fn mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
