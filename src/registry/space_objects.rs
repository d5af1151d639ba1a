use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Deserialize;

use super::error::ReloadError;

#[derive(Debug, Deserialize)]
struct SpaceObjectsDocument {
    #[serde(default)]
    objects: BTreeMap<String, SpaceObjectEntry>,
}

#[derive(Debug, Deserialize)]
struct SpaceObjectEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default = "monitor_default")]
    monitor: bool,
}

fn monitor_default() -> bool {
    true
}

/// Parsed curated space-objects document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CuratedList {
    /// IDs with `monitor` set (the default).
    pub monitored: BTreeSet<u32>,
    /// Display label for every listed object, monitored or not.
    pub labels: HashMap<u32, String>,
}

/// Parses `{"objects": {"<norad>": {"name", "short_name", "monitor"}}}`.
///
/// The whole document is rejected on any malformed part so a half-written
/// file never replaces a good list.
pub fn parse_space_objects(json: &str) -> Result<CuratedList, ReloadError> {
    let document: SpaceObjectsDocument =
        serde_json::from_str(json).map_err(|e| ReloadError::Rejected(e.to_string()))?;

    let mut curated = CuratedList::default();
    for (key, entry) in document.objects {
        let norad_id: u32 = key
            .trim()
            .parse()
            .map_err(|_| ReloadError::Rejected(format!("invalid NORAD ID {:?}", key)))?;

        let label = [entry.short_name, entry.name]
            .into_iter()
            .flatten()
            .map(|s| s.trim().to_string())
            .find(|s| !s.is_empty());
        if let Some(label) = label {
            curated.labels.insert(norad_id, label);
        }
        if entry.monitor {
            curated.monitored.insert(norad_id);
        }
    }

    Ok(curated)
}
