//! File-backed cache storage
//!
//! Each namespace is one `<name>.wcache` file in the data directory holding
//! its entries (oldest first) in bincode. All namespaces are loaded into
//! memory when the storage is opened and reads never touch the disk.
//!
//! A mutation updates the in-memory table, takes a snapshot of the namespace
//! stamped with a generation number, and releases the table lock before
//! encoding and writing the snapshot through a temporary file and an atomic
//! rename. File writes are serialized separately; a snapshot older than the
//! one already on disk is skipped, so a slow writer cannot restore stale
//! entries or a deleted namespace.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use tokio::sync::{Mutex, RwLock};

use super::entries::EntryTable;
use super::traits::CacheStorage;
use crate::http::{RequestKey, StoredResponse};
use crate::{Error, Result};

const EXTENSION: &str = "wcache";

/// State of one namespace to bring to disk; `entries: None` removes its file
struct Snapshot {
    namespace: String,
    generation: u64,
    entries: Option<Vec<(RequestKey, StoredResponse)>>,
}

/// Persistent cache storage rooted at a directory
#[derive(Clone)]
pub struct FileCacheStorage {
    root: PathBuf,
    namespaces: Arc<RwLock<HashMap<String, EntryTable>>>,
    /// Generation on disk per namespace; held while files are touched
    written: Arc<Mutex<HashMap<String, u64>>>,
    generation: Arc<AtomicU64>,
}

impl FileCacheStorage {
    /// Open (creating if needed) a storage directory and load every namespace in it
    pub async fn open_dir(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;

        let mut namespaces = HashMap::new();
        let mut dir = tokio::fs::read_dir(&root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let bytes = tokio::fs::read(&path).await?;
            let (entries, _): (Vec<(RequestKey, StoredResponse)>, usize) =
                decode_from_slice(&bytes, standard()).map_err(|e| {
                    Error::Serialization(format!("corrupt namespace file {}: {}", path.display(), e))
                })?;
            namespaces.insert(name.to_string(), EntryTable::from_entries(entries));
        }

        log::info!("Loaded {} cache namespaces from {}", namespaces.len(), root.display());

        Ok(Self {
            root,
            namespaces: Arc::new(RwLock::new(namespaces)),
            written: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_path(&self, namespace: &str) -> Result<PathBuf> {
        if namespace.is_empty()
            || namespace.contains(['/', '\\'])
            || namespace.starts_with('.')
        {
            return Err(Error::Storage(format!("invalid namespace name: {:?}", namespace)));
        }
        Ok(self.root.join(format!("{}.{}", namespace, EXTENSION)))
    }

    /// Must be called with the table lock held so generations follow mutation order
    fn snapshot(&self, namespace: &str, table: Option<&EntryTable>) -> Snapshot {
        Snapshot {
            namespace: namespace.to_string(),
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
            entries: table.map(EntryTable::entries),
        }
    }

    async fn write(&self, snapshot: Snapshot) -> Result<()> {
        let path = self.namespace_path(&snapshot.namespace)?;
        let bytes = match &snapshot.entries {
            Some(entries) => Some(
                encode_to_vec(entries, standard()).map_err(|e| Error::Serialization(e.to_string()))?,
            ),
            None => None,
        };

        let mut written = self.written.lock().await;
        if written.get(&snapshot.namespace).is_some_and(|on_disk| *on_disk >= snapshot.generation) {
            log::trace!("Skipping stale snapshot of {}", snapshot.namespace);
            return Ok(());
        }

        match bytes {
            Some(bytes) => {
                let tmp = path.with_extension(format!("{}.tmp", EXTENSION));
                tokio::fs::write(&tmp, bytes).await?;
                tokio::fs::rename(&tmp, &path).await?;
            }
            None => match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        written.insert(snapshot.namespace, snapshot.generation);
        Ok(())
    }
}

#[async_trait::async_trait]
impl CacheStorage for FileCacheStorage {
    async fn open(&self, namespace: &str) -> Result<()> {
        self.namespace_path(namespace)?;
        let snapshot = {
            let mut namespaces = self.namespaces.write().await;
            if namespaces.contains_key(namespace) {
                return Ok(());
            }
            let table = namespaces.entry(namespace.to_string()).or_default();
            self.snapshot(namespace, Some(&*table))
        };
        self.write(snapshot).await
    }

    async fn namespaces(&self) -> Result<Vec<String>> {
        let namespaces = self.namespaces.read().await;
        let mut names: Vec<String> = namespaces.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool> {
        self.namespace_path(namespace)?;
        let snapshot = {
            let mut namespaces = self.namespaces.write().await;
            if namespaces.remove(namespace).is_none() {
                return Ok(false);
            }
            self.snapshot(namespace, None)
        };
        self.write(snapshot).await?;
        Ok(true)
    }

    async fn get(&self, namespace: &str, key: &RequestKey) -> Result<Option<StoredResponse>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces.get(namespace).and_then(|table| table.get(key)).cloned())
    }

    async fn put(&self, namespace: &str, key: RequestKey, response: StoredResponse) -> Result<()> {
        self.namespace_path(namespace)?;
        let snapshot = {
            let mut namespaces = self.namespaces.write().await;
            let table = namespaces.entry(namespace.to_string()).or_default();
            table.insert(key, response);
            self.snapshot(namespace, Some(&*table))
        };
        self.write(snapshot).await
    }

    async fn delete(&self, namespace: &str, key: &RequestKey) -> Result<bool> {
        let snapshot = {
            let mut namespaces = self.namespaces.write().await;
            let Some(table) = namespaces.get_mut(namespace) else {
                return Ok(false);
            };
            if !table.remove(key) {
                return Ok(false);
            }
            self.snapshot(namespace, Some(&*table))
        };
        self.write(snapshot).await?;
        Ok(true)
    }

    async fn keys(&self, namespace: &str) -> Result<Vec<RequestKey>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces.get(namespace).map(|table| table.keys()).unwrap_or_default())
    }

    async fn len(&self, namespace: &str) -> Result<usize> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces.get(namespace).map(|table| table.len()).unwrap_or(0))
    }
}
