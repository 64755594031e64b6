// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Savegame persistence.
//!
//! The whole runtime state (task snapshots, cron and condition lists,
//! the MemStore contents, and the id counter) round-trips through a
//! single zstd-compressed JSON file. Writes are atomic: temp file,
//! fsync, rename, directory fsync. Loads are best-effort: a missing
//! file is not an error, and a corrupt file is rotated to `.bak` so the
//! daemon can start with empty state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tbot_core::{CronEntry, IftttEntry, TaskSnapshot};
use thiserror::Error;
use tracing::warn;

/// Current on-disk format version. Unknown versions are rejected.
pub const CURRENT_SAVEGAME_VERSION: u32 = 1;

/// zstd level 3 is a good balance of speed and compression
const COMPRESSION_LEVEL: i32 = 3;

#[derive(Debug, Error)]
pub enum SavegameError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("compression error: {0}")]
    Compress(String),

    #[error("unsupported savegame version {found} (current {current})")]
    Version { found: u32, current: u32 },
}

/// The complete persisted state of a quiescent runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Savegame {
    pub version: u32,
    /// Task id counter; restored so ids are never reused.
    pub counter: u32,
    pub tasks: Vec<TaskSnapshot>,
    pub cron_list: Vec<CronEntry>,
    pub ifttt_list: Vec<IftttEntry>,
    pub memstore: Map<String, Value>,
    /// When this savegame was written.
    pub created_at: DateTime<Utc>,
}

impl Savegame {
    pub fn new(
        counter: u32,
        tasks: Vec<TaskSnapshot>,
        cron_list: Vec<CronEntry>,
        ifttt_list: Vec<IftttEntry>,
        memstore: Map<String, Value>,
    ) -> Self {
        Self {
            version: CURRENT_SAVEGAME_VERSION,
            counter,
            tasks,
            cron_list,
            ifttt_list,
            memstore,
            created_at: Utc::now(),
        }
    }

    /// Save atomically (write to .tmp, fsync, rename, fsync dir).
    ///
    /// A crash mid-save leaves the previous file intact.
    pub fn save(&self, path: &Path) -> Result<(), SavegameError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json_bytes = serde_json::to_vec(self)?;
        let compressed = zstd::encode_all(json_bytes.as_slice(), COMPRESSION_LEVEL)
            .map_err(|e| SavegameError::Compress(e.to_string()))?;

        let tmp_path = path.with_extension("tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&compressed)?;
            file.sync_all()?;
        }

        fs::rename(&tmp_path, path)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Ok(dir) = File::open(parent) {
                    let _ = dir.sync_all();
                }
            }
        }

        Ok(())
    }

    /// Load a savegame if one exists.
    ///
    /// Returns `Ok(None)` when the file is missing or corrupt. A corrupt
    /// file is rotated to `.bak` so the next save starts clean. A parseable
    /// file with an unknown version is a hard error; silently dropping a
    /// newer format would lose state.
    pub fn load(path: &Path) -> Result<Option<Self>, SavegameError> {
        if !path.exists() {
            return Ok(None);
        }

        let parsed: Result<Savegame, SavegameError> = (|| {
            let file = File::open(path)?;
            let decoder = zstd::stream::read::Decoder::new(file)
                .map_err(|e| SavegameError::Compress(e.to_string()))?;
            let value: Value = serde_json::from_reader(decoder)?;

            let found = value
                .get("version")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32;
            if found != CURRENT_SAVEGAME_VERSION {
                return Err(SavegameError::Version {
                    found,
                    current: CURRENT_SAVEGAME_VERSION,
                });
            }

            Ok(serde_json::from_value(value)?)
        })();

        match parsed {
            Ok(savegame) => Ok(Some(savegame)),
            Err(e @ SavegameError::Version { .. }) => Err(e),
            Err(e) => {
                let bak_path = rotate_bak_path(path);
                warn!(
                    error = %e,
                    path = %path.display(),
                    bak = %bak_path.display(),
                    "Corrupt savegame, moving to .bak and starting fresh",
                );
                fs::rename(path, &bak_path)?;
                Ok(None)
            }
        }
    }
}

const MAX_BAK_FILES: u32 = 3;

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out.
///
/// Keeps up to [`MAX_BAK_FILES`] backups: `.bak`, `.bak.2`, `.bak.3`.
/// The oldest backup is removed when the limit is reached.
fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    // Remove the oldest if at capacity
    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }

    // Shift existing backups up by one
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }

    bak(1)
}

#[cfg(test)]
#[path = "savegame_tests.rs"]
mod tests;
