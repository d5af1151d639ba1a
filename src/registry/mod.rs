//! Which space objects are tracked, and the curated file that decides it.

mod allowlist;
mod error;
mod space_objects;
mod watcher;

pub use allowlist::{AllowList, EntityRegistry, SelectionPolicy};
pub use error::ReloadError;
pub use space_objects::{parse_space_objects, CuratedList};
pub use watcher::AllowlistWatcher;
