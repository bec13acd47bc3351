//! Item catalog: display name to external item id
//!
//! Only the price-history lookup needs this. Current prices are matched by
//! name against the cached listing instead.

use crate::error::ConfigError;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
struct RawCatalogEntry {
    name_id: String,
}

/// Catalog entries in document order
struct RawCatalog(Vec<(String, RawCatalogEntry)>);

impl<'de> Deserialize<'de> for RawCatalog {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = RawCatalog;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of item names to catalog entries")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, RawCatalogEntry>()? {
                    entries.push(entry);
                }
                Ok(RawCatalog(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// A catalog item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    /// Name as written in the catalog file
    pub name: String,
    /// External id used by the price service
    pub item_id: String,
}

/// Case-insensitive item catalog
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    items: HashMap<String, CatalogItem>,
}

impl ItemCatalog {
    /// Parses a catalog document: `{"Iron Ore": {"name_id": "ironoret1"}, ...}`
    ///
    /// Extra fields per entry are ignored. When names differ only by case,
    /// the first one in the document wins.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let RawCatalog(entries) = serde_json::from_str(json)?;

        let mut items = HashMap::with_capacity(entries.len());
        for (name, entry) in entries {
            let key = name.to_lowercase();
            if items.contains_key(&key) {
                tracing::debug!(item = %name, "Ignoring duplicate catalog entry");
                continue;
            }
            items.insert(
                key,
                CatalogItem {
                    name,
                    item_id: entry.name_id,
                },
            );
        }

        Ok(Self { items })
    }

    /// Loads a catalog file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_json_str(&content).map_err(|e| {
            ConfigError::invalid("item_catalog_path", format!("{}: {}", path.display(), e))
        })
    }

    /// Finds an item by name, ignoring case
    pub fn lookup(&self, name: &str) -> Option<&CatalogItem> {
        self.items.get(&name.trim().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
