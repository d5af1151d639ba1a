use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use super::error::ReloadError;
use super::space_objects::{parse_space_objects, CuratedList};

/// Immutable, versioned set of tracked NORAD IDs. An empty ID set tracks
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    version: u64,
    ids: BTreeSet<u32>,
    labels: HashMap<u32, String>,
}

impl AllowList {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only(ids: impl IntoIterator<Item = u32>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_labels(mut self, labels: HashMap<u32, String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn tracks_all(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, norad_id: u32) -> bool {
        self.tracks_all() || self.ids.contains(&norad_id)
    }

    pub fn ids(&self) -> &BTreeSet<u32> {
        &self.ids
    }

    pub fn label(&self, norad_id: u32) -> Option<&str> {
        self.labels.get(&norad_id).map(String::as_str)
    }
}

/// Static part of the selection: what applies when no curated list does.
#[derive(Debug, Clone, Default)]
pub struct SelectionPolicy {
    pub track_all: bool,
    pub only_norad_ids: BTreeSet<u32>,
}

impl SelectionPolicy {
    /// `track_all`, then the curated list, then `only_norad_ids`, then
    /// everything.
    pub fn resolve(&self, curated: &CuratedList) -> AllowList {
        let list = if self.track_all {
            AllowList::all()
        } else if !curated.monitored.is_empty() {
            AllowList::only(curated.monitored.iter().copied())
        } else {
            AllowList::only(self.only_norad_ids.iter().copied())
        };
        list.with_labels(curated.labels.clone())
    }
}

struct Inner {
    current: RwLock<Arc<AllowList>>,
    next_version: AtomicU64,
    policy: SelectionPolicy,
}

/// Cloneable handle to the current allowlist. Readers take an `Arc` snapshot;
/// writers publish a whole new list.
#[derive(Clone)]
pub struct EntityRegistry {
    inner: Arc<Inner>,
}

impl EntityRegistry {
    pub fn new(policy: SelectionPolicy) -> Self {
        let initial = AllowList {
            version: 1,
            ..policy.resolve(&CuratedList::default())
        };
        Self {
            inner: Arc::new(Inner {
                current: RwLock::new(Arc::new(initial)),
                next_version: AtomicU64::new(2),
                policy,
            }),
        }
    }

    pub fn current(&self) -> Arc<AllowList> {
        self.inner
            .current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Publishes `list` under a fresh version number. The version is taken
    /// under the write lock, so published versions only ever increase.
    pub fn reload(&self, mut list: AllowList) -> Arc<AllowList> {
        let mut current = self.inner.current.write().unwrap_or_else(|e| e.into_inner());
        list.version = self.inner.next_version.fetch_add(1, Ordering::SeqCst);
        let published = Arc::new(list);
        *current = published.clone();
        drop(current);
        log::debug!("Published allowlist version {}", published.version);
        published
    }

    pub fn reload_curated(&self, curated: &CuratedList) -> Arc<AllowList> {
        self.reload(self.inner.policy.resolve(curated))
    }

    pub fn reload_from_str(&self, json: &str) -> Result<Arc<AllowList>, ReloadError> {
        let curated = parse_space_objects(json)?;
        Ok(self.reload_curated(&curated))
    }

    /// `Ok(None)` when the file does not exist: the current list is kept.
    pub async fn reload_from_file(
        &self,
        path: &Path,
    ) -> Result<Option<Arc<AllowList>>, ReloadError> {
        let json = match tokio::fs::read_to_string(path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        self.reload_from_str(&json).map(Some)
    }
}
