// # File State Store
//
// File-based implementation of the store traits with crash recovery.
//
// ## Purpose
//
// Keeps alert counters, open incidents and the DNS record mirror across
// daemon restarts, so a restart neither re-fires an active alert nor loses
// an open downtime window.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good state
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "tables": {
//     "alerts": {
//       "42:http": {
//         "domain_id": 42,
//         "check_type": "http",
//         "consecutive_failure_count": 3,
//         "alert_active": true,
//         "alerted_at": "2026-01-09T12:00:00Z",
//         "recovered_at": null
//       }
//     },
//     "incidents": {},
//     "dns_records": {},
//     "next_incident_id": 0,
//     "next_record_id": 0
//   }
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

use super::tables::StateTables;
use crate::Error;
use crate::model::{
    AlertKey, AlertState, DnsRecord, DomainId, NewDnsRecord, NewIncident, UptimeIncident,
};
use crate::traits::{AlertStateStore, DnsRecordStore, IncidentStore};

/// State file format version
/// Used for future migration if format changes
const STATE_FILE_VERSION: &str = "1.0";

/// File-based state store with crash recovery
///
/// Every mutation is written through to disk before the call returns.
///
/// # Example
///
/// ```rust,no_run
/// use domwatch_core::state::FileStateStore;
/// use domwatch_core::traits::AlertStateStore;
/// use domwatch_core::model::{AlertState, CheckType};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStateStore::new("/var/lib/domwatch/state.json").await?;
///     store.put_alert_state(&AlertState::new(1, CheckType::Ssl)).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
    /// Serializes mutations so two writers never share the temp path
    write_lock: Mutex<()>,
}

#[derive(Debug)]
struct FileState {
    tables: StateTables,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StateFileFormat {
    version: String,
    tables: StateTables,
}

impl FileStateStore {
    /// Create or load a file state store
    ///
    /// This will:
    /// 1. Try to load existing state file
    /// 2. If corruption detected, try to load from backup
    /// 3. If both fail, start with empty state
    /// 4. Create parent directories if needed
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::store(format!(
                        "Failed to create state directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let tables = Self::load_state_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState { tables })),
            write_lock: Mutex::new(()),
        })
    }

    /// Load state from file with automatic recovery
    ///
    /// Recovery strategy:
    /// 1. Try to load main state file
    /// 2. If JSON parse error, try loading backup
    /// 3. If backup also fails, start with empty state
    async fn load_state_with_recovery(path: &Path) -> Result<StateTables, Error> {
        match Self::load_state(path).await {
            Ok(tables) => Ok(tables),
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "State file appears corrupted: {}. Attempting recovery from backup.",
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with empty state.");
                    return Ok(StateTables::default());
                }

                match Self::load_state(&backup_path).await {
                    Ok(tables) => {
                        tracing::info!("Recovered state from backup");
                        if let Err(restore_err) =
                            Self::restore_from_backup(path, &backup_path).await
                        {
                            tracing::error!(
                                "Failed to restore state file from backup: {}",
                                restore_err
                            );
                        }
                        Ok(tables)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup also corrupted: {}. Starting with empty state.",
                            backup_err
                        );
                        Ok(StateTables::default())
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Load state from file
    async fn load_state(path: &Path) -> Result<StateTables, Error> {
        if !path.exists() {
            tracing::debug!("State file does not exist: {}", path.display());
            return Ok(StateTables::default());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::store(format!(
                "Failed to read state file {}: {}",
                path.display(),
                e
            ))
        })?;

        let state_file: StateFileFormat = serde_json::from_str(&content)?;

        if state_file.version != STATE_FILE_VERSION {
            tracing::warn!(
                "State file version mismatch: expected {}, got {}. \
                Attempting to load anyway.",
                STATE_FILE_VERSION,
                state_file.version
            );
        }

        Ok(state_file.tables)
    }

    /// Write the given tables to file atomically
    ///
    /// Callers hold `write_lock`.
    async fn write_tables(&self, tables: &StateTables) -> Result<(), Error> {
        let state_file = StateFileFormat {
            version: STATE_FILE_VERSION.to_string(),
            tables: tables.clone(),
        };
        let json = serde_json::to_string_pretty(&state_file)
            .map_err(|e| Error::store(format!("Failed to serialize state: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("State written to file: {}", self.path.display());
        Ok(())
    }

    /// Apply a mutation to a copy of the tables, write it, then publish it
    ///
    /// A failed write leaves the in-memory tables untouched, so a retried
    /// operation sees the same state as the first attempt.
    async fn mutate<T>(&self, apply: impl FnOnce(&mut StateTables) -> T) -> Result<T, Error> {
        let _write_guard = self.write_lock.lock().await;

        let mut tables = self.state.read().await.tables.clone();
        let output = apply(&mut tables);
        self.write_tables(&tables).await?;

        self.state.write().await.tables = tables;
        Ok(output)
    }

    async fn restore_from_backup(path: &Path, backup_path: &Path) -> Result<(), Error> {
        fs::copy(backup_path, path).await.map_err(|e| {
            Error::store(format!(
                "Failed to restore from backup {} to {}: {}",
                backup_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::info!("Restored state file from backup");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    /// Force immediate write to disk
    pub async fn sync(&self) -> Result<(), Error> {
        let _write_guard = self.write_lock.lock().await;
        let tables = self.state.read().await.tables.clone();
        self.write_tables(&tables).await
    }
}

#[async_trait]
impl AlertStateStore for FileStateStore {
    async fn get_alert_state(&self, key: AlertKey) -> Result<Option<AlertState>, Error> {
        Ok(self.state.read().await.tables.get_alert(key))
    }

    async fn put_alert_state(&self, state: &AlertState) -> Result<(), Error> {
        self.mutate(|tables| tables.put_alert(state)).await
    }

    async fn list_alert_states(&self, domain_id: DomainId) -> Result<Vec<AlertState>, Error> {
        Ok(self.state.read().await.tables.list_alerts(domain_id))
    }

    async fn flush(&self) -> Result<(), Error> {
        // Mutations are written through; this only rewrites the current copy
        self.sync().await
    }
}

#[async_trait]
impl IncidentStore for FileStateStore {
    async fn find_open_incident(
        &self,
        domain_id: DomainId,
    ) -> Result<Option<UptimeIncident>, Error> {
        Ok(self.state.read().await.tables.find_open_incident(domain_id))
    }

    async fn insert_incident(&self, incident: NewIncident) -> Result<UptimeIncident, Error> {
        self.mutate(|tables| tables.insert_incident(incident)).await
    }

    async fn close_incident(
        &self,
        incident_id: u64,
        ended_at: DateTime<Utc>,
    ) -> Result<UptimeIncident, Error> {
        self.mutate(|tables| tables.close_incident(incident_id, ended_at))
            .await?
    }

    async fn list_incidents(&self, domain_id: DomainId) -> Result<Vec<UptimeIncident>, Error> {
        Ok(self.state.read().await.tables.list_incidents(domain_id))
    }
}

#[async_trait]
impl DnsRecordStore for FileStateStore {
    async fn get_dns_record(&self, id: u64) -> Result<Option<DnsRecord>, Error> {
        Ok(self.state.read().await.tables.get_record(id))
    }

    async fn insert_dns_record(&self, record: NewDnsRecord) -> Result<DnsRecord, Error> {
        self.mutate(|tables| tables.insert_record(record)).await
    }

    async fn update_dns_record(&self, record: &DnsRecord) -> Result<(), Error> {
        self.mutate(|tables| tables.update_record(record)).await?
    }

    async fn delete_dns_record(&self, id: u64) -> Result<(), Error> {
        self.mutate(|tables| tables.delete_record(id)).await
    }

    async fn list_dns_records(&self, domain_id: DomainId) -> Result<Vec<DnsRecord>, Error> {
        Ok(self.state.read().await.tables.list_records(domain_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CheckType;
    use tempfile::tempdir;

    fn failing_state(count: u32) -> AlertState {
        let mut state = AlertState::new(42, CheckType::Http);
        state.consecutive_failure_count = count;
        state
    }

    #[tokio::test]
    async fn test_file_store_basic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStateStore::new(&path).await.unwrap();
        assert!(store.list_alert_states(42).await.unwrap().is_empty());

        store.put_alert_state(&failing_state(2)).await.unwrap();
        let incident = store
            .insert_incident(NewIncident {
                domain_id: 42,
                started_at: Utc::now(),
                status_code: Some(502),
                error_message: Some("bad gateway".to_string()),
            })
            .await
            .unwrap();

        assert!(path.exists());

        // Load new instance and verify persistence
        let store2 = FileStateStore::new(&path).await.unwrap();
        let retrieved = store2.get_alert_state((42, CheckType::Http)).await.unwrap();
        assert_eq!(retrieved, Some(failing_state(2)));
        let open = store2.find_open_incident(42).await.unwrap();
        assert_eq!(open.map(|i| i.id), Some(incident.id));
    }

    #[tokio::test]
    async fn test_file_store_corruption_recovery() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStateStore::new(&path).await.unwrap();
        store.put_alert_state(&failing_state(1)).await.unwrap();
        // Second write leaves the first one in the backup
        store.put_alert_state(&failing_state(2)).await.unwrap();

        let backup_path = FileStateStore::backup_path(&path);
        assert!(backup_path.exists(), "Backup file should exist after write");

        fs::write(&path, b"corrupted json data").await.unwrap();

        let store2 = FileStateStore::new(&path).await.unwrap();
        let recovered = store2.get_alert_state((42, CheckType::Http)).await.unwrap();
        assert_eq!(
            recovered,
            Some(failing_state(1)),
            "Backup should contain previous state, not latest"
        );
    }

    #[tokio::test]
    async fn test_file_store_incident_ids_survive_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStateStore::new(&path).await.unwrap();
        let first = store
            .insert_incident(NewIncident {
                domain_id: 1,
                started_at: Utc::now(),
                status_code: None,
                error_message: None,
            })
            .await
            .unwrap();
        store.close_incident(first.id, Utc::now()).await.unwrap();

        let store2 = FileStateStore::new(&path).await.unwrap();
        let second = store2
            .insert_incident(NewIncident {
                domain_id: 1,
                started_at: Utc::now(),
                status_code: None,
                error_message: None,
            })
            .await
            .unwrap();
        assert!(second.id > first.id);
        assert_eq!(store2.list_incidents(1).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_file_store_rapid_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStateStore::new(&path).await.unwrap();
        for count in 0..10 {
            store.put_alert_state(&failing_state(count)).await.unwrap();
        }

        let store2 = FileStateStore::new(&path).await.unwrap();
        let final_state = store2.get_alert_state((42, CheckType::Http)).await.unwrap();
        assert_eq!(final_state, Some(failing_state(9)));
    }

    #[tokio::test]
    async fn test_file_store_failed_write_keeps_previous_tables() {
        let dir = tempdir().unwrap();
        let state_dir = dir.path().join("state");
        let path = state_dir.join("state.json");

        let store = FileStateStore::new(&path).await.unwrap();
        store.put_alert_state(&failing_state(2)).await.unwrap();

        fs::remove_dir_all(&state_dir).await.unwrap();
        let result = store.put_alert_state(&failing_state(3)).await;
        assert!(matches!(result, Err(Error::StateStore(_))));
        assert_eq!(
            store.get_alert_state((42, CheckType::Http)).await.unwrap(),
            Some(failing_state(2))
        );

        fs::create_dir_all(&state_dir).await.unwrap();
        store.put_alert_state(&failing_state(3)).await.unwrap();

        let reloaded = FileStateStore::new(&path).await.unwrap();
        assert_eq!(
            reloaded.get_alert_state((42, CheckType::Http)).await.unwrap(),
            Some(failing_state(3))
        );
    }
}
