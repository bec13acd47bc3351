//! Static directory of known game servers

use crate::{constants::DEFAULT_SERVERS, error::ConfigError, types::ServerId};
use std::collections::{BTreeMap, HashMap};

/// Case-insensitive mapping from server display name to `ServerId`
///
/// Built once from configuration and never mutated. Servers outside this
/// directory are ignored by the refresh cycle and rejected by lookups.
#[derive(Debug, Clone)]
pub struct ServerDirectory {
    by_name: HashMap<String, ServerId>,
    names: BTreeMap<ServerId, String>,
}

impl ServerDirectory {
    /// Builds a directory from (name, id) pairs
    ///
    /// Rejects empty names, id 0, and names or ids that appear twice.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (&'a str, u32)>,
    {
        let mut by_name = HashMap::new();
        let mut names = BTreeMap::new();

        for (name, raw_id) in pairs {
            let key = name.trim().to_lowercase();
            if key.is_empty() {
                return Err(ConfigError::invalid("servers", "empty server name"));
            }
            if raw_id == 0 {
                return Err(ConfigError::invalid(
                    "servers",
                    format!("server {:?} has id 0", name),
                ));
            }

            let id = ServerId::new(raw_id);
            if by_name.insert(key.clone(), id).is_some() {
                return Err(ConfigError::invalid(
                    "servers",
                    format!("duplicate server name {:?}", key),
                ));
            }
            if names.insert(id, key).is_some() {
                return Err(ConfigError::invalid(
                    "servers",
                    format!("duplicate server id {}", id),
                ));
            }
        }

        Ok(Self { by_name, names })
    }

    /// Resolves a display name, ignoring case and surrounding whitespace
    pub fn resolve(&self, name: &str) -> Option<ServerId> {
        self.by_name.get(&name.trim().to_lowercase()).copied()
    }

    /// Returns the configured (lowercase) name for an id
    pub fn name_of(&self, id: ServerId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn contains(&self, id: ServerId) -> bool {
        self.names.contains_key(&id)
    }

    /// Known server ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = ServerId> + '_ {
        self.names.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for ServerDirectory {
    fn default() -> Self {
        // The built-in table has unique, non-zero entries.
        Self {
            by_name: DEFAULT_SERVERS
                .iter()
                .map(|(name, id)| (name.to_string(), ServerId::new(*id)))
                .collect(),
            names: DEFAULT_SERVERS
                .iter()
                .map(|(name, id)| (ServerId::new(*id), name.to_string()))
                .collect(),
        }
    }
}
