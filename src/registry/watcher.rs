use std::path::PathBuf;
use std::time::SystemTime;

use async_trait::async_trait;

use super::allowlist::EntityRegistry;
use crate::event::{Event, TrackKind};
use crate::scheduler::Track;

/// Reloads the curated space-objects file whenever its mtime changes.
///
/// A failed reload leaves the stored mtime alone, so the next poll retries
/// even if the file is not touched again.
pub struct AllowlistWatcher {
    registry: EntityRegistry,
    path: PathBuf,
    last_mtime: Option<SystemTime>,
}

impl AllowlistWatcher {
    pub fn new(registry: EntityRegistry, path: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            path: path.into(),
            last_mtime: None,
        }
    }

    pub async fn poll(&mut self) -> Option<Event> {
        let mtime = match tokio::fs::metadata(&self.path).await.and_then(|m| m.modified()) {
            Ok(mtime) => mtime,
            Err(_) => return None,
        };
        if self.last_mtime == Some(mtime) {
            return None;
        }

        let file = self.path.display().to_string();
        match self.registry.reload_from_file(&self.path).await {
            Ok(Some(list)) => {
                self.last_mtime = Some(mtime);
                log::info!(
                    "Space objects reloaded from {} (version {}, {} ids)",
                    file,
                    list.version(),
                    list.ids().len()
                );
                Some(
                    Event::info(TrackKind::SpaceObject, "space_objects", "space_objects_loaded")
                        .with("file", file)
                        .with("version", list.version())
                        .with("count_monitoring", list.ids().len())
                        .with("tracks_all", list.tracks_all()),
                )
            }
            // Removed between stat and read.
            Ok(None) => None,
            Err(e) => {
                log::warn!("Space objects reload from {} failed: {}", file, e);
                Some(
                    Event::warn(
                        TrackKind::SpaceObject,
                        "space_objects",
                        "space_objects_reload_failed",
                    )
                    .with("file", file)
                    .with("error", e.to_string()),
                )
            }
        }
    }
}

#[async_trait]
impl Track for AllowlistWatcher {
    fn name(&self) -> &'static str {
        "space_objects"
    }

    async fn cycle(&mut self) -> Vec<Event> {
        self.poll().await.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::registry::SelectionPolicy;
    use std::fs;
    use std::time::Duration;

    fn touch(path: &std::path::Path, secs_ahead: u64) {
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() + Duration::from_secs(secs_ahead))
            .unwrap();
    }

    #[tokio::test]
    async fn reloads_only_on_mtime_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("space_objects.json");
        fs::write(&path, r#"{"objects": {"25544": {"short_name": "ISS"}}}"#).unwrap();

        let registry = EntityRegistry::new(SelectionPolicy::default());
        let mut watcher = AllowlistWatcher::new(registry.clone(), &path);

        let event = watcher.poll().await.unwrap();
        assert_eq!(event.kind, EventKind::Info);
        assert_eq!(event.label, "space_objects_loaded");
        assert!(registry.current().contains(25544));
        assert!(!registry.current().contains(1));

        assert!(watcher.poll().await.is_none());

        fs::write(&path, r#"{"objects": {"1": {}}}"#).unwrap();
        touch(&path, 10);
        assert!(watcher.poll().await.is_some());
        assert!(registry.current().contains(1));
        assert!(!registry.current().contains(25544));
    }

    #[tokio::test]
    async fn failed_reload_is_retried_next_poll() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("space_objects.json");
        fs::write(&path, r#"{"objects": {"25544": {}"#).unwrap();

        let registry = EntityRegistry::new(SelectionPolicy {
            track_all: false,
            only_norad_ids: [7].into_iter().collect(),
        });
        let before = registry.current();
        let mut watcher = AllowlistWatcher::new(registry.clone(), &path);

        let event = watcher.poll().await.unwrap();
        assert_eq!(event.kind, EventKind::Warn);
        assert_eq!(event.label, "space_objects_reload_failed");
        assert_eq!(registry.current(), before);

        // Same mtime, still retried.
        assert_eq!(watcher.poll().await.unwrap().label, "space_objects_reload_failed");

        fs::write(&path, r#"{"objects": {"25544": {}}}"#).unwrap();
        touch(&path, 10);
        assert_eq!(watcher.poll().await.unwrap().label, "space_objects_loaded");
        assert!(registry.current().contains(25544));
    }

    #[tokio::test]
    async fn missing_file_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let registry = EntityRegistry::new(SelectionPolicy::default());
        let mut watcher = AllowlistWatcher::new(registry.clone(), dir.path().join("nope.json"));
        assert!(watcher.poll().await.is_none());
        assert_eq!(registry.current().version(), 1);
    }
}
