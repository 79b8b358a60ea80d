//! Snapshot persistence for cold-start fallback.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::cache::snapshot::{ConfigSnapshot, SnapshotSource};
use crate::error::{CorruptCacheError, PersistenceError};

/// On-disk form of a snapshot for one namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedCacheFile {
    /// Namespace the file belongs to.
    pub namespace: String,
    /// Revision marker of the persisted snapshot.
    pub release_key: String,
    /// Fetch time of the snapshot (milliseconds since epoch).
    pub fetched_at_ms: u64,
    /// Key/value pairs, sorted for stable files.
    pub configurations: BTreeMap<String, String>,
}

impl PersistedCacheFile {
    fn from_snapshot(namespace: &str, snapshot: &ConfigSnapshot) -> Self {
        Self {
            namespace: namespace.to_string(),
            release_key: snapshot.revision().to_string(),
            fetched_at_ms: snapshot.fetched_at_ms(),
            configurations: snapshot
                .entries()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    fn into_snapshot(self) -> ConfigSnapshot {
        let entries: HashMap<String, String> = self.configurations.into_iter().collect();
        ConfigSnapshot::from_fallback(self.release_key, entries, self.fetched_at_ms)
    }
}

/// Durable store of the last known-good snapshot per namespace.
///
/// Saves of one namespace are serialized, and every write goes through its
/// own temp file before being renamed over the target.
#[derive(Debug)]
pub struct DiskCacheStore {
    dir: PathBuf,
    app_id: String,
    /// Per-namespace write lock holding the ticket of the last ordered save.
    writers: DashMap<String, Arc<Mutex<u64>>>,
    /// Suffix for temp file names, unique per write.
    next_write: AtomicU64,
}

impl DiskCacheStore {
    /// Open the store, creating the cache directory if needed.
    pub fn new(dir: impl Into<PathBuf>, app_id: &str) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| PersistenceError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            app_id: app_id.to_string(),
            writers: DashMap::new(),
            next_write: AtomicU64::new(1),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the cache file for a namespace.
    pub fn path_for(&self, namespace: &str) -> PathBuf {
        self.dir.join(format!(
            "{}_configuration_{}.json",
            encode_component(&self.app_id),
            encode_component(namespace)
        ))
    }

    /// Load the persisted snapshot for `namespace`.
    ///
    /// A missing file is `Ok(None)`. An unreadable file, or one written for a
    /// different namespace, is a [`CorruptCacheError`].
    pub fn load(&self, namespace: &str) -> Result<Option<ConfigSnapshot>, CorruptCacheError> {
        let path = self.path_for(namespace);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CorruptCacheError::Read { path, source }),
        };

        let persisted: PersistedCacheFile = serde_json::from_reader(BufReader::new(file))
            .map_err(|source| CorruptCacheError::Parse {
                path: path.clone(),
                source,
            })?;

        if persisted.namespace != namespace {
            return Err(CorruptCacheError::NamespaceMismatch {
                path,
                expected: namespace.to_string(),
                found: persisted.namespace,
            });
        }

        Ok(Some(persisted.into_snapshot()))
    }

    /// Like [`load`](Self::load), but a corrupt file is logged and treated as absent.
    pub fn load_best_effort(&self, namespace: &str) -> Option<ConfigSnapshot> {
        match self.load(namespace) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(namespace = %namespace, error = %e, "Ignoring unreadable disk cache");
                None
            }
        }
    }

    /// Atomically persist a remote snapshot, regardless of ordering.
    pub fn save(&self, namespace: &str, snapshot: &ConfigSnapshot) -> Result<(), PersistenceError> {
        let writer = self.writer(namespace);
        let _last = writer.lock().unwrap_or_else(|e| e.into_inner());
        self.write_file(namespace, snapshot)
    }

    /// Persist `snapshot` unless a save with an equal or newer ticket already
    /// happened for `namespace`. Returns whether the file was written.
    pub fn save_if_newer(
        &self,
        namespace: &str,
        snapshot: &ConfigSnapshot,
        ticket: u64,
    ) -> Result<bool, PersistenceError> {
        let writer = self.writer(namespace);
        let mut last = writer.lock().unwrap_or_else(|e| e.into_inner());
        if ticket <= *last {
            tracing::debug!(
                namespace = %namespace,
                ticket,
                last_saved = *last,
                "Skipping save of an older snapshot"
            );
            return Ok(false);
        }
        self.write_file(namespace, snapshot)?;
        *last = ticket;
        Ok(true)
    }

    fn writer(&self, namespace: &str) -> Arc<Mutex<u64>> {
        self.writers
            .entry(namespace.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Temp file, sync, rename: the previous good file survives a crash mid-write.
    fn write_file(&self, namespace: &str, snapshot: &ConfigSnapshot) -> Result<(), PersistenceError> {
        if snapshot.source() == SnapshotSource::Fallback {
            return Err(PersistenceError::FallbackSnapshot(namespace.to_string()));
        }

        let path = self.path_for(namespace);
        let seq = self.next_write.fetch_add(1, Ordering::Relaxed);
        let temp_path = path.with_extension(format!("json.{}.tmp", seq));
        let persisted = PersistedCacheFile::from_snapshot(namespace, snapshot);

        let content = serde_json::to_vec_pretty(&persisted).map_err(|source| {
            PersistenceError::Serialize {
                namespace: namespace.to_string(),
                source,
            }
        })?;

        if let Err(source) = write_synced(&temp_path, &content) {
            let _ = fs::remove_file(&temp_path);
            return Err(PersistenceError::Write {
                path: temp_path,
                source,
            });
        }

        fs::rename(&temp_path, &path).map_err(|source| {
            let _ = fs::remove_file(&temp_path);
            PersistenceError::Write {
                path: path.clone(),
                source,
            }
        })?;

        tracing::debug!(
            namespace = %namespace,
            revision = %snapshot.revision(),
            keys = snapshot.len(),
            "Saved snapshot to disk cache"
        );
        Ok(())
    }

    /// Delete the persisted snapshot, if any.
    pub fn remove(&self, namespace: &str) -> Result<(), PersistenceError> {
        let writer = self.writer(namespace);
        let _last = writer.lock().unwrap_or_else(|e| e.into_inner());
        let path = self.path_for(namespace);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PersistenceError::Write { path, source }),
        }
    }
}

fn write_synced(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(content)?;
    writer.flush()?;
    writer.get_ref().sync_all()
}

/// Percent-encode everything outside `[A-Za-z0-9.-]` so every namespace maps
/// to exactly one file name.
fn encode_component(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'-' => encoded.push(byte as char),
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}
