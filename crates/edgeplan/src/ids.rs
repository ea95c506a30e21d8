//! Case-insensitive identifiers.
//!
//! Component and dependency ids compare without regard to case everywhere:
//! in the manifest, in persisted state and in request overrides.

use std::collections::BTreeMap;

/// Normalized lookup key for an id.
#[must_use]
pub fn fold(id: &str) -> String {
    id.to_lowercase()
}

/// Whether two ids name the same thing.
#[must_use]
pub fn same(a: &str, b: &str) -> bool {
    a == b || fold(a) == fold(b)
}

/// Find a value in a map whose keys are ids, ignoring case.
pub fn lookup<'a, V>(map: &'a BTreeMap<String, V>, id: &str) -> Option<&'a V> {
    map.get(id)
        .or_else(|| map.iter().find(|(k, _)| same(k, id)).map(|(_, v)| v))
}

/// Remove every entry whose key names `id`, returning the last one removed.
pub fn remove<V>(map: &mut BTreeMap<String, V>, id: &str) -> Option<V> {
    let keys: Vec<String> = map.keys().filter(|k| same(k, id)).cloned().collect();
    keys.into_iter().filter_map(|k| map.remove(&k)).last()
}

/// Ordered set of ids that remembers the spelling it first saw.
///
/// Iteration is lexicographic by folded id, which keeps planning output
/// stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdSet {
    entries: BTreeMap<String, String>,
}

impl IdSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an id. Returns `true` when it was not already present.
    pub fn insert(&mut self, id: &str) -> bool {
        let key = fold(id);
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, id.to_string());
        true
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(&fold(id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids in their original spelling, ordered by folded id.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(String::as_str)
    }
}

impl<'a> FromIterator<&'a str> for IdSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = Self::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_ignores_case() {
        assert!(same("Redis", "redis"));
        assert!(!same("redis", "redis-core"));
    }

    #[test]
    fn test_lookup_and_remove() {
        let mut map = BTreeMap::new();
        map.insert("Collector".to_string(), 1);
        assert_eq!(lookup(&map, "collector"), Some(&1));
        assert_eq!(remove(&mut map, "COLLECTOR"), Some(1));
        assert!(map.is_empty());
        assert_eq!(remove(&mut map, "collector"), None);
    }

    #[test]
    fn test_id_set_keeps_first_spelling() {
        let mut set = IdSet::new();
        assert!(set.insert("Redis"));
        assert!(!set.insert("redis"));
        assert!(set.insert("agent"));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["agent", "Redis"]);
        assert!(set.contains("REDIS"));
        assert_eq!(set.len(), 2);
    }
}
