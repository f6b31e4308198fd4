//! services/client/src/adapters/store.rs
//!
//! Concrete implementations of the `CredentialStore` port. The file-backed store
//! is the durable one used by the binary; the in-memory store backs ephemeral
//! sessions and tests.

use chrono::{DateTime, Utc};
use justgo_core::domain::{CredentialRecord, User};
use justgo_core::ports::{CredentialStore, StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The fixed key under which the session credential is stored.
pub const CREDENTIAL_KEY: &str = "justgo.session";

//=========================================================================================
// "Impure" Persisted Record Structs
//=========================================================================================

#[derive(Serialize, Deserialize)]
struct UserEntry {
    id: i64,
    email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct CredentialEntry {
    token: String,
    user: UserEntry,
    saved_at: DateTime<Utc>,
}

impl CredentialEntry {
    fn from_domain(record: &CredentialRecord) -> Self {
        Self {
            token: record.token.clone(),
            user: UserEntry {
                id: record.user.id,
                email: record.user.email.clone(),
                username: record.user.username.clone(),
            },
            saved_at: record.saved_at,
        }
    }

    fn to_domain(self) -> CredentialRecord {
        CredentialRecord {
            token: self.token,
            user: User {
                id: self.user.id,
                email: self.user.email,
                username: self.user.username,
            },
            saved_at: self.saved_at,
        }
    }
}

//=========================================================================================
// File-backed Store
//=========================================================================================

/// A JSON key/value file on disk. Other keys present in the file are preserved.
pub struct FileCredentialStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> StoreResult<BTreeMap<String, serde_json::Value>> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| StoreError::Serialization(e.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StoreError::Storage(format!(
                "failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn write_entries(&self, entries: &BTreeMap<String, serde_json::Value>) -> StoreResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::Storage(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        // Write to a sibling file first so a crash never leaves a torn record.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json).map_err(|e| StoreError::Storage(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::Storage(e.to_string()))
    }

    fn guard(&self) -> StoreResult<std::sync::MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| StoreError::Storage("credential store lock poisoned".to_string()))
    }
}

impl CredentialStore for FileCredentialStore {
    fn save(&self, record: &CredentialRecord) -> StoreResult<()> {
        let _guard = self.guard()?;
        let mut entries = self.read_entries()?;
        let value = serde_json::to_value(CredentialEntry::from_domain(record))
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        entries.insert(CREDENTIAL_KEY.to_string(), value);
        self.write_entries(&entries)
    }

    fn load(&self) -> StoreResult<Option<CredentialRecord>> {
        let _guard = self.guard()?;
        let mut entries = self.read_entries()?;
        match entries.remove(CREDENTIAL_KEY) {
            Some(value) => {
                let entry: CredentialEntry = serde_json::from_value(value)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(entry.to_domain()))
            }
            None => Ok(None),
        }
    }

    fn clear(&self) -> StoreResult<()> {
        let _guard = self.guard()?;
        let mut entries = self.read_entries()?;
        if entries.remove(CREDENTIAL_KEY).is_none() {
            return Ok(());
        }
        self.write_entries(&entries)
    }
}

//=========================================================================================
// In-memory Store
//=========================================================================================

/// Keeps the credential for the lifetime of the process only.
#[derive(Default)]
pub struct MemoryCredentialStore {
    record: Mutex<Option<CredentialRecord>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> StoreResult<std::sync::MutexGuard<'_, Option<CredentialRecord>>> {
        self.record
            .lock()
            .map_err(|_| StoreError::Storage("credential store lock poisoned".to_string()))
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn save(&self, record: &CredentialRecord) -> StoreResult<()> {
        *self.slot()? = Some(record.clone());
        Ok(())
    }

    fn load(&self) -> StoreResult<Option<CredentialRecord>> {
        Ok(self.slot()?.clone())
    }

    fn clear(&self) -> StoreResult<()> {
        *self.slot()? = None;
        Ok(())
    }
}
