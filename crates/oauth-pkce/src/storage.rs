//! Session store: durable and ephemeral key/value storage
//!
//! The durable half holds the token set and survives a restart of the shell
//! when the store is backed by a file. Writes go through an atomic temp-file +
//! rename, and a tokio Mutex serializes concurrent writers (callback install,
//! background refresh, teardown).
//!
//! The ephemeral half holds the PKCE verifier and CSRF state for exactly one
//! authorization round-trip. It lives in process memory only and is never
//! written to disk. Its operations are synchronous so that cleanup can run
//! from a drop guard.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::PoisonError;

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Durable + ephemeral key/value store for one session.
///
/// Mutating durable operations always update the in-memory view first; an
/// `Err` only reports that persisting it to the backing file failed.
pub struct SessionStore {
    path: Option<PathBuf>,
    durable: Mutex<HashMap<String, String>>,
    ephemeral: std::sync::Mutex<HashMap<String, String>>,
}

impl SessionStore {
    /// A store whose durable half lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            durable: Mutex::new(HashMap::new()),
            ephemeral: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Load the durable half from the given file path.
    ///
    /// If the file doesn't exist, creates it as `{}` so a cold start and a
    /// logged-out restart look the same.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let durable = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading session file: {e}")))?;
            let entries: HashMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| Error::StoreParse(format!("parsing session file: {e}")))?;
            info!(path = %path.display(), entries = entries.len(), "loaded session store");
            entries
        } else {
            info!(path = %path.display(), "session file not found, starting empty");
            let entries = HashMap::new();
            write_atomic(&path, &entries).await?;
            entries
        };

        Ok(Self {
            path: Some(path),
            durable: Mutex::new(durable),
            ephemeral: std::sync::Mutex::new(HashMap::new()),
        })
    }

    /// Read one durable entry.
    pub async fn durable_get(&self, key: &str) -> Option<String> {
        let durable = self.durable.lock().await;
        durable.get(key).cloned()
    }

    /// Clone the whole durable map.
    pub async fn durable_snapshot(&self) -> HashMap<String, String> {
        self.durable.lock().await.clone()
    }

    /// Apply `update` to the durable map and persist the result in one write.
    pub async fn update_durable<F>(&self, update: F) -> Result<()>
    where
        F: FnOnce(&mut HashMap<String, String>),
    {
        let mut durable = self.durable.lock().await;
        update(&mut *durable);
        self.persist(&durable).await
    }

    /// Remove the given durable keys. Skips the write when none was present.
    pub async fn durable_remove(&self, keys: &[&str]) -> Result<()> {
        let mut durable = self.durable.lock().await;
        let mut removed = false;
        for key in keys {
            removed |= durable.remove(*key).is_some();
        }
        if removed {
            debug!(keys = keys.len(), "removed durable entries");
            self.persist(&durable).await?;
        }
        Ok(())
    }

    /// Whether the durable half holds any entry for the given keys.
    pub async fn durable_contains_any(&self, keys: &[&str]) -> bool {
        let durable = self.durable.lock().await;
        keys.iter().any(|key| durable.contains_key(*key))
    }

    /// Read one ephemeral entry without consuming it.
    pub fn ephemeral_get(&self, key: &str) -> Option<String> {
        self.ephemeral_map().get(key).cloned()
    }

    /// Set one ephemeral entry, replacing any earlier value.
    pub fn ephemeral_set(&self, key: &str, value: &str) {
        self.ephemeral_map()
            .insert(key.to_owned(), value.to_owned());
    }

    /// Read and delete one ephemeral entry. A second take returns `None`.
    pub fn ephemeral_take(&self, key: &str) -> Option<String> {
        self.ephemeral_map().remove(key)
    }

    /// Delete the given ephemeral entries.
    pub fn ephemeral_remove(&self, keys: &[&str]) {
        let mut ephemeral = self.ephemeral_map();
        for key in keys {
            ephemeral.remove(*key);
        }
    }

    /// Whether the ephemeral half is empty.
    pub fn ephemeral_is_empty(&self) -> bool {
        self.ephemeral_map().is_empty()
    }

    fn ephemeral_map(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A panicking writer cannot leave a half-written HashMap entry, so the
        // poisoned map is still usable.
        self.ephemeral
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn persist(&self, data: &HashMap<String, String>) -> Result<()> {
        match &self.path {
            Some(path) => write_atomic(path, data).await,
            None => Ok(()),
        }
    }
}

/// Sibling of `path` used as the write target before the rename. Named
/// after the store file so stores sharing a directory never collide.
fn temp_path_for(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| Error::Io(format!("{} does not name a file", path.display())))?;
    let mut temp = std::ffi::OsString::from(".");
    temp.push(name);
    temp.push(format!(".tmp.{}", std::process::id()));
    Ok(path.with_file_name(temp))
}

/// Replace the store file in one step: fill a 0600 sibling, flush it, then
/// rename it over `path`. Readers see the old map or the new one.
async fn write_atomic(path: &Path, data: &HashMap<String, String>) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(data)
        .map_err(|e| Error::StoreParse(format!("serializing session store: {e}")))?;
    let temp = temp_path_for(path)?;

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options
        .open(&temp)
        .await
        .map_err(|e| Error::Io(format!("opening {}: {e}", temp.display())))?;
    file.write_all(&bytes)
        .await
        .map_err(|e| Error::Io(format!("writing {}: {e}", temp.display())))?;
    file.sync_all()
        .await
        .map_err(|e| Error::Io(format!("flushing {}: {e}", temp.display())))?;
    drop(file);

    tokio::fs::rename(&temp, path)
        .await
        .map_err(|e| Error::Io(format!("replacing {}: {e}", path.display())))?;

    debug!(path = %path.display(), "persisted session store");
    Ok(())
}
