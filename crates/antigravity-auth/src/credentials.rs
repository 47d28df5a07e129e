//! Credential records and the store they live in
//!
//! A credential record is an opaque id, an optional direct provider tag, and a
//! free-form attribute map. The quota pipeline only reads records and rewrites
//! the token attributes of existing ones; it never creates them.
//!
//! `CredentialSource` is the narrow interface the pipeline consumes.
//! `FileCredentialStore` implements it over a JSON file mapping record ids to
//! records. The file is re-read on every access; writes merge one record into
//! the current contents and use atomic temp-file + rename, with a tokio Mutex
//! serializing this process's writers.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// One stored credential.
///
/// The `id` is the key the record is stored under and is not repeated inside
/// the serialized body.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CredentialRecord {
    #[serde(skip)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl CredentialRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// String attribute, or None when absent or not a string.
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    pub fn set_attr(&mut self, key: &str, value: impl Into<Value>) {
        self.attributes.insert(key.to_string(), value.into());
    }
}

// Attribute values hold tokens, so Debug only lists keys.
impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Read/update access to an external credential store.
///
/// Uses `Pin<Box<dyn Future>>` return types so the store can be shared as
/// `Arc<dyn CredentialSource>`.
pub trait CredentialSource: Send + Sync {
    /// Snapshot of every stored record.
    fn list(&self) -> Pin<Box<dyn Future<Output = Result<Vec<CredentialRecord>>> + Send + '_>>;

    /// Fetch a single record by id.
    fn get_by_id<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<CredentialRecord>> + Send + 'a>>;

    /// Replace an existing record. Fails with `NotFound` if the id is unknown.
    fn update(&self, record: CredentialRecord)
    -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// JSON-file backed credential store.
///
/// The file belongs to whichever tool manages the accounts, so every read goes
/// back to disk and every write merges a single record into the current file
/// contents. The mutex only orders this process's read-modify-write cycles.
pub struct FileCredentialStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Open the store at `path` and check that it parses.
    ///
    /// A missing file is created as `{}` so the service can start before any
    /// account has been added.
    pub async fn load(path: PathBuf) -> Result<Self> {
        if path.exists() {
            let records = read_records(&path).await?;
            info!(path = %path.display(), records = records.len(), "loaded credentials");
        } else {
            info!(path = %path.display(), "credential file not found, starting with empty store");
            write_atomic(&path, &HashMap::new()).await?;
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Insert or replace a record and persist to disk.
    pub async fn add(&self, record: CredentialRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut records = read_records(&self.path).await?;
        debug!(record_id = record.id, "added credential");
        records.insert(record.id.clone(), record);
        write_atomic(&self.path, &records).await
    }

    /// Current version of one record. Read failures are logged and yield None.
    pub async fn get(&self, id: &str) -> Option<CredentialRecord> {
        match read_records(&self.path).await {
            Ok(mut records) => records.remove(id),
            Err(e) => {
                warn!(path = %self.path.display(), record_id = id, error = %e, "failed to read credential file");
                None
            }
        }
    }

    /// All records, sorted by id for stable output.
    pub async fn records(&self) -> Result<Vec<CredentialRecord>> {
        let mut records: Vec<_> = read_records(&self.path).await?.into_values().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    /// Replace an existing record and persist to disk.
    ///
    /// Other records are taken from the file as it is now, so entries added or
    /// changed by another writer since the last read survive.
    pub async fn replace(&self, record: CredentialRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut records = read_records(&self.path).await?;
        let slot = records.get_mut(&record.id).ok_or_else(|| {
            Error::NotFound(format!("record {} not in credential store", record.id))
        })?;
        debug!(record_id = record.id, "updated credential");
        *slot = record;
        write_atomic(&self.path, &records).await
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(read_records(&self.path).await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

impl CredentialSource for FileCredentialStore {
    fn list(&self) -> Pin<Box<dyn Future<Output = Result<Vec<CredentialRecord>>> + Send + '_>> {
        Box::pin(self.records())
    }

    fn get_by_id<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<CredentialRecord>> + Send + 'a>> {
        Box::pin(self.get(id))
    }

    fn update(
        &self,
        record: CredentialRecord,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(self.replace(record))
    }
}

/// Read and parse the credential file, filling in each record's id from its key.
async fn read_records(path: &Path) -> Result<HashMap<String, CredentialRecord>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
    let mut records: HashMap<String, CredentialRecord> = serde_json::from_str(&contents)
        .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;
    for (id, record) in records.iter_mut() {
        record.id = id.clone();
    }
    Ok(records)
}

/// Write records to a file atomically with 0600 permissions.
async fn write_atomic(path: &Path, data: &HashMap<String, CredentialRecord>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::CredentialParse(format!("serializing credentials: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("credential path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".credentials.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credentials");
    Ok(())
}
