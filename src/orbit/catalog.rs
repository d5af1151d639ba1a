use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::elements::ElementSet;
use super::tle::parse_multi_tle;

/// Element sets keyed by NORAD ID, as loaded from one TLE document.
#[derive(Debug, Default)]
pub struct Catalog {
    sets: HashMap<u32, Arc<ElementSet>>,
    skipped: usize,
    loaded_at: Option<DateTime<Utc>>,
}

impl Catalog {
    /// Parses every triple in `text`. Malformed element sets are counted and
    /// skipped, the rest of the document still loads.
    pub fn from_tle_text(text: &str) -> Self {
        let mut sets = HashMap::new();
        let mut skipped = 0;

        for (name, line1, line2) in parse_multi_tle(text) {
            match ElementSet::from_tle(name, &line1, &line2) {
                Ok(set) => {
                    sets.insert(set.norad_id(), Arc::new(set));
                }
                Err(e) => {
                    log::debug!("Skipping malformed element set: {}", e);
                    skipped += 1;
                }
            }
        }

        Self {
            sets,
            skipped,
            loaded_at: Some(Utc::now()),
        }
    }

    pub fn get(&self, norad_id: u32) -> Option<&Arc<ElementSet>> {
        self.sets.get(&norad_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ElementSet>> {
        self.sets.values()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orbit::elements::tests::{ISS_LINE1, ISS_LINE2, ISS_NAME};

    #[test]
    fn loads_valid_and_counts_malformed() {
        let broken = ISS_LINE2.replace("51.6416", "5x.6416");
        let text = format!(
            "{ISS_NAME}\n{ISS_LINE1}\n{ISS_LINE2}\nBROKEN\n{}\n{}\n",
            ISS_LINE1.replace("25544", "99999"),
            broken.replace("25544", "99999"),
        );
        let catalog = Catalog::from_tle_text(&text);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.skipped(), 1);
        assert_eq!(catalog.get(25544).unwrap().name(), ISS_NAME);
        assert!(catalog.get(99999).is_none());
    }

    #[test]
    fn empty_document() {
        let catalog = Catalog::from_tle_text("");
        assert!(catalog.is_empty());
        assert_eq!(catalog.skipped(), 0);
    }
}
