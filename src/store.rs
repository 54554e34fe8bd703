//! # Persisted State
//!
//! The small JSON record that survives restarts: commander mode and the
//! three actuator targets.
//!
//! ```json
//! {"commander":true,"grab":40,"drop":153,"load":50}
//! ```
//!
//! [`ConfigStore`] owns the record. Every mutation runs under its lock and
//! rewrites the whole record before the lock is released, so concurrent
//! commands never interleave partial writes.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Persisted configuration record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedConfig {
    /// `true` = Commanded, `false` = Standalone
    pub commander: bool,
    pub grab: u8,
    pub drop: u8,
    pub load: u8,
}

/// Same record with every field optional, so older files missing a key
/// still load.
#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    commander: Option<bool>,
    grab: Option<u8>,
    drop: Option<u8>,
    load: Option<u8>,
}

impl PersistedConfig {
    /// Read the record at `path`, creating it from `defaults` if absent
    ///
    /// Keys missing from an existing file take their value from `defaults`.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed, or if
    /// the default file cannot be written. Callers treat this as non-fatal.
    pub async fn load_or_create(path: &Path, defaults: PersistedConfig) -> Result<Self> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            info!("No persisted state at {}, writing defaults", path.display());
            defaults.write(path).await?;
            return Ok(defaults);
        }

        let contents = tokio::fs::read(path).await?;
        let partial: PartialConfig = serde_json::from_slice(&contents)?;

        Ok(Self {
            commander: partial.commander.unwrap_or(defaults.commander),
            grab: partial.grab.unwrap_or(defaults.grab),
            drop: partial.drop.unwrap_or(defaults.drop),
            load: partial.load.unwrap_or(defaults.load),
        })
    }

    /// Write the full record to `path`
    ///
    /// The record goes to a sibling temp file that is then renamed over
    /// `path`, so a reader never sees half a document.
    pub async fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec(self)?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, path).await?;

        debug!("Persisted state to {}", path.display());
        Ok(())
    }
}

/// Single owner of the persisted record
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    state: Mutex<PersistedConfig>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>, initial: PersistedConfig) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(initial),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current record.
    pub async fn snapshot(&self) -> PersistedConfig {
        *self.state.lock().await
    }

    /// Apply `change` and persist the full resulting record
    ///
    /// The in-memory record keeps the change even if the write fails; the
    /// failure is logged and returned to the caller.
    pub async fn update<F>(&self, change: F) -> Result<PersistedConfig>
    where
        F: FnOnce(&mut PersistedConfig),
    {
        let mut state = self.state.lock().await;
        change(&mut state);
        let updated = *state;

        if let Err(e) = updated.write(&self.path).await {
            warn!("Failed to persist state to {}: {}", self.path.display(), e);
            return Err(e);
        }
        Ok(updated)
    }
}
