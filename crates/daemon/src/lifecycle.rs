// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application lifecycle: container wiring, savegame handling, pid/lock
//! file, privilege drop, shutdown ordering.

use crate::config::Config;
use chrono::Utc;
use fs2::FileExt;
use serde_json::Value;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tbot_adapters::{ExchangeError, ExchangeRegistry, NoopMailer, PaperExchange, PaperQuotes};
use tbot_core::EventName;
use tbot_engine::{Bus, JobCtx, JobRegistry, MemStore, TaskManager};
use tbot_storage::Savegame;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum InitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("another instance holds the lock on {0}")]
    Locked(PathBuf),

    #[error("cannot drop privileges to '{0}': {1}")]
    Privileges(String, String),

    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// The application container: every shared subsystem, built once at
/// startup and handed by reference to jobs and server handlers.
pub struct App {
    pub config: Config,
    pub bus: Bus,
    pub memstore: Arc<MemStore>,
    pub exchanges: Arc<ExchangeRegistry>,
    pub manager: Arc<TaskManager>,
}

impl App {
    /// Wire the container from a loaded config.
    ///
    /// Every configured exchange id resolves to a paper adapter; real
    /// venue transports are external collaborators plugged in through
    /// the same registry.
    pub fn build(config: Config) -> Arc<Self> {
        let bus = Bus::new();
        let memstore = Arc::new(MemStore::new(bus.clone()));

        let known: Vec<String> = config.exchanges.keys().cloned().collect();
        let exchanges = Arc::new(ExchangeRegistry::new(
            config.server.default_exchange.clone(),
            move |id| {
                if id == "paper" || known.iter().any(|k| k == id) {
                    Ok(Arc::new(PaperExchange::new(id)))
                } else {
                    Err(ExchangeError::MissingConfig(id.to_string()))
                }
            },
        ));

        let ctx = JobCtx {
            bus: bus.clone(),
            memstore: Arc::clone(&memstore),
            exchanges: Arc::clone(&exchanges),
            quotes: Arc::new(PaperQuotes),
            mailer: Arc::new(NoopMailer),
        };
        let manager = TaskManager::new(ctx, JobRegistry::builtin());

        Arc::new(Self {
            config,
            bus,
            memstore,
            exchanges,
            manager,
        })
    }

    /// Restore the savegame, start the condition/cron loops, and hook
    /// the asynchronous save listener.
    pub fn start(&self) {
        Arc::clone(&self.manager).spawn_listeners();
        self.load_savegame();
        Arc::clone(&self.manager).start_scheduler();
        self.spawn_savegame_listener();
    }

    /// Load the savegame if persistence is enabled. Errors are logged;
    /// the daemon continues with empty state.
    pub fn load_savegame(&self) {
        let Some(path) = self.config.datafile.clone() else {
            info!("No datafile specified!");
            return;
        };
        info!("Loading data from {}", path.display());
        match Savegame::load(&path) {
            Ok(Some(savegame)) => self.manager.from_savegame(savegame),
            Ok(None) => {}
            Err(e) => error!("Loading data failed: {}", e),
        }
    }

    /// Write the savegame synchronously (shutdown path).
    pub fn save_savegame(&self) {
        let Some(path) = self.config.datafile.clone() else {
            return;
        };
        save_to(&path, &self.memstore, &self.manager);
    }

    /// `SAVEGAME` events trigger an asynchronous save.
    fn spawn_savegame_listener(&self) {
        let datafile = self.config.datafile.clone();
        let memstore = Arc::clone(&self.memstore);
        let manager = Arc::clone(&self.manager);
        let mut sub = self.bus.subscribe(EventName::Savegame);
        tokio::spawn(async move {
            while sub.recv().await.is_some() {
                let Some(path) = datafile.clone() else { continue };
                let memstore = Arc::clone(&memstore);
                let manager = Arc::clone(&manager);
                let _ = tokio::task::spawn_blocking(move || {
                    save_to(&path, &memstore, &manager);
                })
                .await;
            }
        });
    }

    /// Graceful shutdown: adapters first, then tasks, then the snapshot.
    /// Control servers are closed by the caller dropping their listeners.
    pub async fn shutdown(&self) {
        self.exchanges.close_all().await;
        self.manager.shutdown();
        self.save_savegame();
    }
}

/// Stamp the save time into the store, then write the savegame.
fn save_to(path: &Path, memstore: &MemStore, manager: &TaskManager) {
    info!("Saving data to {}", path.display());
    memstore.add(
        "savegame_last_update",
        Value::String(Utc::now().to_rfc3339()),
    );
    if let Err(e) = manager.to_savegame().save(path) {
        error!("Saving data failed: {}", e);
    }
}

/// Take the exclusive pid-file lock and record our pid in it.
///
/// The returned file must stay open for the lifetime of the process;
/// dropping it releases the lock.
pub fn acquire_pidfile(path: &Path) -> Result<File, InitError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    // Open without truncating: a losing contender must not wipe the
    // winner's pid.
    let mut file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)?;
    if file.try_lock_exclusive().is_err() {
        return Err(InitError::Locked(path.to_path_buf()));
    }
    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(file)
}

/// Drop to `user[:group]` after binding sockets.
pub fn drop_privileges(spec: &str) -> Result<(), InitError> {
    let (user_name, group_name) = match spec.split_once(':') {
        Some((user, group)) => (user, Some(group)),
        None => (spec, None),
    };

    let user = nix::unistd::User::from_name(user_name)
        .map_err(|e| InitError::Privileges(spec.into(), e.to_string()))?
        .ok_or_else(|| InitError::Privileges(spec.into(), "unknown user".into()))?;

    let gid = match group_name {
        Some(name) => nix::unistd::Group::from_name(name)
            .map_err(|e| InitError::Privileges(spec.into(), e.to_string()))?
            .ok_or_else(|| InitError::Privileges(spec.into(), "unknown group".into()))?
            .gid,
        None => user.gid,
    };

    nix::unistd::setgid(gid).map_err(|e| InitError::Privileges(spec.into(), e.to_string()))?;
    nix::unistd::setuid(user.uid)
        .map_err(|e| InitError::Privileges(spec.into(), e.to_string()))?;
    info!("dropped privileges to {}", spec);
    Ok(())
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
