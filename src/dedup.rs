use std::collections::HashMap;
use std::hash::Hash;
use crate::manifest::PackageEntry;

/// An insertion-ordered map where re-inserting a key moves it to the end.
///
/// Replaced entries leave an empty slot behind so positions of untouched keys
/// never shift.
#[derive(Debug)]
pub struct LastWriteWins<K, V> {
    slots: Vec<Option<V>>,
    index: HashMap<K, usize>,
}

impl<K: Eq + Hash, V> LastWriteWins<K, V> {
    pub fn new() -> Self {
        LastWriteWins {
            slots: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Inserts `value` at the end, dropping any earlier value for `key`.
    pub fn insert(&mut self, key: K, value: V) {
        if let Some(old) = self.index.insert(key, self.slots.len()) {
            self.slots[old] = None;
        }
        self.slots.push(Some(value));
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn into_values(self) -> Vec<V> {
        self.slots.into_iter().flatten().collect()
    }
}

impl<K: Eq + Hash, V> Default for LastWriteWins<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Collapses packages sharing a dedup key (path + original subdir).
///
/// The last occurrence wins and takes the position of that last write;
/// keys seen only once keep their relative order.
pub fn deduplicate_packages(packages: &[PackageEntry]) -> Vec<PackageEntry> {
    let mut deduped = LastWriteWins::new();
    for package in packages {
        deduped.insert(package.dedup_key(), package.clone());
    }
    deduped.into_values()
}
