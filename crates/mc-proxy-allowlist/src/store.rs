//! The allow-list file.
//!
//! Read on first use, not at startup. Every change is written to
//! `<file>.upd` and renamed over the file.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::AllowListError;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowListEntry {
    pub player_name: String,
}

impl AllowListEntry {
    pub fn new(player_name: impl Into<String>) -> Self {
        Self {
            player_name: player_name.into(),
        }
    }
}

/// On-disk layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowListFile {
    #[serde(default)]
    pub allow_list_entries: Vec<AllowListEntry>,
    #[serde(default)]
    pub update_number: u64,
}

#[derive(Default)]
struct Contents {
    loaded: bool,
    entries: BTreeSet<AllowListEntry>,
    update_number: u64,
}

/// Player names allowed through the proxy.
pub struct AllowList {
    path: PathBuf,
    enabled: AtomicBool,
    contents: Mutex<Contents>,
}

impl AllowList {
    /// Does not touch the file yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            enabled: AtomicBool::new(true),
            contents: Mutex::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// A disabled list lets everyone in.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn contains(&self, player_name: &str) -> Result<bool, AllowListError> {
        let contents = self.loaded()?;
        Ok(contents.entries.contains(&AllowListEntry::new(player_name)))
    }

    /// Entries sorted by player name.
    pub fn entries(&self) -> Result<Vec<AllowListEntry>, AllowListError> {
        Ok(self.loaded()?.entries.iter().cloned().collect())
    }

    pub fn update_number(&self) -> Result<u64, AllowListError> {
        Ok(self.loaded()?.update_number)
    }

    /// Add a player. Returns `false` if already listed, in which case nothing is written.
    ///
    /// If saving fails the change still applies until the process exits.
    pub fn grant(&self, player_name: &str) -> Result<bool, AllowListError> {
        let mut contents = self.loaded()?;
        if !contents.entries.insert(AllowListEntry::new(player_name)) {
            return Ok(false);
        }
        info!("Granting {player_name} access");
        self.save(&mut contents)?;
        Ok(true)
    }

    /// Remove a player. Returns `false` if not listed.
    pub fn revoke(&self, player_name: &str) -> Result<bool, AllowListError> {
        let mut contents = self.loaded()?;
        if !contents.entries.remove(&AllowListEntry::new(player_name)) {
            return Ok(false);
        }
        info!("Revoking access of {player_name}");
        self.save(&mut contents)?;
        Ok(true)
    }

    /// Lock the contents, reading the file first if that has not happened yet.
    /// A failed read is retried on the next call.
    fn loaded(&self) -> Result<MutexGuard<'_, Contents>, AllowListError> {
        let mut contents = self
            .contents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !contents.loaded {
            let file = self.read()?;
            info!(
                "Loaded allow-list {} (update {}, {} entries)",
                self.path.display(),
                file.update_number,
                file.allow_list_entries.len()
            );
            contents.entries = file.allow_list_entries.into_iter().collect();
            contents.update_number = file.update_number;
            contents.loaded = true;
        }
        Ok(contents)
    }

    fn read(&self) -> Result<AllowListFile, AllowListError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No allow-list at {}, starting empty", self.path.display());
                return Ok(AllowListFile::default());
            }
            Err(source) => {
                return Err(AllowListError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&text).map_err(|source| AllowListError::Format {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, contents: &mut Contents) -> Result<(), AllowListError> {
        contents.update_number += 1;
        let file = AllowListFile {
            allow_list_entries: contents.entries.iter().cloned().collect(),
            update_number: contents.update_number,
        };
        let json = serde_json::to_string_pretty(&file).map_err(|source| AllowListError::Format {
            path: self.path.clone(),
            source,
        })?;

        let mut update_path = self.path.clone().into_os_string();
        update_path.push(".upd");
        let update_path = PathBuf::from(update_path);
        let io_error = |source| AllowListError::Io {
            path: update_path.clone(),
            source,
        };
        fs::write(&update_path, json).map_err(io_error)?;
        fs::rename(&update_path, &self.path).map_err(io_error)?;

        info!(
            "Saved allow-list {} (update {}, {} entries)",
            self.path.display(),
            file.update_number,
            file.allow_list_entries.len()
        );
        Ok(())
    }
}

impl std::fmt::Debug for AllowList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllowList")
            .field("path", &self.path)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
