//! Storage backends for persisted sessions
//!
//! A backend stores opaque encoded documents keyed by subject. Encoding and
//! validation live in [`crate::schema`]; backends only guarantee that a write
//! is observed either completely or not at all.

use async_trait::async_trait;
use deepthink_core::{Error, Result, SubjectId};
use std::collections::HashMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const TEMP_PREFIX: &str = ".deepthink-";
const TEMP_SUFFIX: &str = ".tmp";

/// Age after which an abandoned temp file is swept by [`FileBackend::open`]
pub const STALE_TEMP_AGE: Duration = Duration::from_secs(60 * 60);

/// Durable key-value storage for encoded session documents
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Read the stored document, `None` when the subject has no record
    async fn load_raw(&self, subject: &SubjectId) -> Result<Option<Vec<u8>>>;

    /// Replace the stored document atomically
    async fn store_raw(&self, subject: &SubjectId, bytes: &[u8]) -> Result<()>;

    /// Delete the record; returns whether one existed
    async fn remove(&self, subject: &SubjectId) -> Result<bool>;

    /// Human readable location of a subject's record, used in logs
    fn location(&self, subject: &SubjectId) -> String;
}

/// One JSON file per subject under a directory
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Open (and create) the storage directory
    ///
    /// Temp files abandoned by an interrupted write are removed once they are
    /// older than [`STALE_TEMP_AGE`]; younger ones may belong to a writer in
    /// another process and are left alone.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::storage(&dir, e))?;

        let backend = Self { dir };
        backend.remove_stale_temp_files().await;
        Ok(backend)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<SUBJECT>_memory.json`
    pub fn session_path(&self, subject: &SubjectId) -> PathBuf {
        self.dir.join(format!("{subject}_memory.json"))
    }

    async fn remove_stale_temp_files(&self) {
        let Ok(mut entries) = fs::read_dir(&self.dir).await else {
            return;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            if !is_temp_name(&entry.file_name().to_string_lossy()) {
                continue;
            }
            let age = entry
                .metadata()
                .await
                .and_then(|meta| meta.modified())
                .ok()
                .and_then(|modified| modified.elapsed().ok());
            if !age.is_some_and(|age| age >= STALE_TEMP_AGE) {
                continue;
            }

            let path = entry.path();
            debug!(path = %path.display(), "Removing interrupted session write");
            if let Err(e) = fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %e, "Failed to remove stale temp file");
            }
        }
    }
}

#[async_trait]
impl SessionBackend for FileBackend {
    async fn load_raw(&self, subject: &SubjectId) -> Result<Option<Vec<u8>>> {
        let path = self.session_path(subject);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::storage(path, e)),
        }
    }

    async fn store_raw(&self, subject: &SubjectId, bytes: &[u8]) -> Result<()> {
        write_atomic(&self.session_path(subject), bytes).await
    }

    async fn remove(&self, subject: &SubjectId) -> Result<bool> {
        let path = self.session_path(subject);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::storage(path, e)),
        }
    }

    fn location(&self, subject: &SubjectId) -> String {
        self.session_path(subject).display().to_string()
    }
}

/// Write `bytes` to `path` through a synced temp file and a rename
///
/// Each call writes its own uniquely named temp file next to `path`, so
/// concurrent writers never touch each other's partial output. Readers
/// observe either the previous content or the new content.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::storage(parent, e))?;
            parent.to_path_buf()
        }
        None => PathBuf::from("."),
    };

    let target = path.to_path_buf();
    let contents = bytes.to_vec();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&dir)?;
        tmp.write_all(&contents)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| Error::storage(path, std::io::Error::other(e)))?
    .map_err(|e| Error::storage(path, e))?;

    debug!(path = %path.display(), bytes = bytes.len(), "Atomic write completed");
    Ok(())
}

fn is_temp_name(name: &str) -> bool {
    name.starts_with(TEMP_PREFIX) && name.ends_with(TEMP_SUFFIX)
}

/// Process-local backend, mainly for tests
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    records: RwLock<HashMap<SubjectId, Vec<u8>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw bytes without any encoding, e.g. to simulate corruption
    pub async fn insert_raw(&self, subject: &SubjectId, bytes: impl Into<Vec<u8>>) {
        self.records
            .write()
            .await
            .insert(subject.clone(), bytes.into());
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl SessionBackend for InMemoryBackend {
    async fn load_raw(&self, subject: &SubjectId) -> Result<Option<Vec<u8>>> {
        Ok(self.records.read().await.get(subject).cloned())
    }

    async fn store_raw(&self, subject: &SubjectId, bytes: &[u8]) -> Result<()> {
        self.insert_raw(subject, bytes).await;
        Ok(())
    }

    async fn remove(&self, subject: &SubjectId) -> Result<bool> {
        Ok(self.records.write().await.remove(subject).is_some())
    }

    fn location(&self, subject: &SubjectId) -> String {
        format!("memory://{subject}")
    }
}
