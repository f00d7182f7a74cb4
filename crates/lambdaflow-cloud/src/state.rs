//! Local record store
//!
//! Manages the `.lambdaflow/state.json` file which keeps the records produced
//! by successful reconciliations (deployments, releases) so that later
//! release and teardown calls receive them verbatim. The remote platform stays
//! the source of truth; this file never drives a create/update decision.

use crate::error::{CloudError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".lambdaflow";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const LOCK_FILE: &str = "lock.json";

/// All stored records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalState {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Records indexed by `app:kind`
    pub records: BTreeMap<String, StoredRecord>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            records: BTreeMap::new(),
        }
    }
}

fn record_key(app: &str, kind: &str) -> String {
    format!("{}:{}", app, kind)
}

impl GlobalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record, replacing any previous one of the same kind
    pub fn put_record<T: Serialize>(&mut self, app: &str, kind: &str, record: &T) -> Result<()> {
        let now = Utc::now();
        let key = record_key(app, kind);
        let created_at = self
            .records
            .get(&key)
            .map(|r| r.created_at)
            .unwrap_or(now);

        self.records.insert(
            key,
            StoredRecord {
                app: app.to_string(),
                kind: kind.to_string(),
                data: serde_json::to_value(record)?,
                created_at,
                updated_at: now,
            },
        );
        self.updated_at = now;
        Ok(())
    }

    /// Read a record back into its typed form
    pub fn get_record<T: DeserializeOwned>(&self, app: &str, kind: &str) -> Result<Option<T>> {
        match self.records.get(&record_key(app, kind)) {
            Some(stored) => Ok(Some(serde_json::from_value(stored.data.clone())?)),
            None => Ok(None),
        }
    }

    /// Remove a record
    pub fn remove_record(&mut self, app: &str, kind: &str) -> Option<StoredRecord> {
        let result = self.records.remove(&record_key(app, kind));
        if result.is_some() {
            self.updated_at = Utc::now();
        }
        result
    }

    /// Remove every record of an application
    pub fn remove_app(&mut self, app: &str) -> usize {
        let before = self.records.len();
        self.records.retain(|_, r| r.app != app);
        let removed = before - self.records.len();
        if removed > 0 {
            self.updated_at = Utc::now();
        }
        removed
    }

    /// Records belonging to one application
    pub fn records_for(&self, app: &str) -> Vec<&StoredRecord> {
        self.records.values().filter(|r| r.app == app).collect()
    }
}

/// One stored record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub app: String,

    /// Record kind (e.g., "deployment", "release")
    pub kind: String,

    pub data: serde_json::Value,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// State manager for reading/writing state files
pub struct StateManager {
    /// Project root directory
    project_root: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    fn state_dir(&self) -> PathBuf {
        self.project_root.join(STATE_DIR)
    }

    fn state_path(&self) -> PathBuf {
        self.state_dir().join(STATE_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir().join(STATE_BACKUP)
    }

    fn lock_path(&self) -> PathBuf {
        self.state_dir().join(LOCK_FILE)
    }

    async fn ensure_state_dir(&self) -> Result<()> {
        let dir = self.state_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }
        Ok(())
    }

    /// Load the current state
    pub async fn load(&self) -> Result<GlobalState> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("State file not found, returning empty state");
            return Ok(GlobalState::new());
        }

        let content = fs::read_to_string(&path).await?;
        let state: GlobalState = serde_json::from_str(&content)?;

        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!("Loaded state with {} records", state.records.len());
        Ok(state)
    }

    /// Save the state, keeping the previous file as a backup
    pub async fn save(&self, state: &GlobalState) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let backup = self.backup_path();

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
            tracing::debug!("Created state backup");
        }

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&path, content).await?;

        tracing::debug!("Saved state with {} records", state.records.len());
        Ok(())
    }

    /// Acquire a lock for exclusive access
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        self.ensure_state_dir().await?;

        let lock_path = self.lock_path();

        if lock_path.exists() {
            let content = fs::read_to_string(&lock_path).await?;
            let lock_info: LockInfo = serde_json::from_str(&content)?;

            // Locks older than one hour are stale
            let age = Utc::now().signed_duration_since(lock_info.acquired_at);
            if age.num_hours() < 1 {
                return Err(CloudError::LockError(format!(
                    "State is locked by {} since {}",
                    lock_info.holder, lock_info.acquired_at
                )));
            }

            tracing::warn!("Removing stale lock from {}", lock_info.holder);
        }

        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            acquired_at: Utc::now(),
        };

        let content = serde_json::to_string_pretty(&lock_info)?;
        fs::write(&lock_path, content).await?;

        tracing::debug!("Acquired state lock");
        Ok(StateLock {
            lock_path,
            released: false,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for state lock
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    /// Release the lock
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
