use std::collections::BTreeMap;

use minicbor::{Encode, Decode};

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct CacheEntry<T> {
  #[n(0)] pub created: u32,
  #[n(1)] pub value: T,
}

impl<T> CacheEntry<T> {
  #[inline]
  pub fn is_fresh(&self, now: u32, lifetime: u32) -> bool {
    now.saturating_sub(self.created) <= lifetime
  }
}

/// Keyed values stamped with the tick they were made on.
///
/// Nothing expires on its own: readers ask for a value no older than some
/// lifetime, and the owner prunes down to a size ceiling, oldest first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TtlCache<T> {
  map: BTreeMap<String, CacheEntry<T>>,
}

impl<T> Default for TtlCache<T> {
  fn default() -> Self {
    TtlCache { map: BTreeMap::new() }
  }
}

impl<T> TtlCache<T> {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn get(&self, key: &str) -> Option<&CacheEntry<T>> {
    self.map.get(key)
  }

  /// The value for `key`, as long as it's no older than `lifetime` ticks.
  pub fn get_fresh(&self, key: &str, now: u32, lifetime: u32) -> Option<&T> {
    match self.map.get(key) {
      Some(entry) if entry.is_fresh(now, lifetime) => Some(&entry.value),
      _ => None,
    }
  }

  pub fn insert(&mut self, key: String, now: u32, value: T) {
    self.map.insert(key, CacheEntry { created: now, value });
  }

  pub fn remove(&mut self, key: &str) -> Option<T> {
    self.map.remove(key).map(|entry| entry.value)
  }

  pub fn len(&self) -> usize {
    self.map.len()
  }

  pub fn is_empty(&self) -> bool {
    self.map.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &CacheEntry<T>)> {
    self.map.iter()
  }

  /// Drop the oldest entries until at most `max_entries` remain. Returns
  /// how many were dropped.
  pub fn prune(&mut self, max_entries: usize) -> usize {
    if self.map.len() <= max_entries {
      return 0;
    }
    let excess = self.map.len() - max_entries;
    let mut by_age: Vec<(u32, String)> = self.map.iter()
      .map(|(key, entry)| (entry.created, key.clone()))
      .collect();
    // keys break ties so pruning is repeatable.
    by_age.sort();
    for (_, key) in by_age.into_iter().take(excess) {
      self.map.remove(&key);
    }
    excess
  }
}

impl<T> FromIterator<(String, CacheEntry<T>)> for TtlCache<T> {
  fn from_iter<I: IntoIterator<Item = (String, CacheEntry<T>)>>(iter: I) -> Self {
    TtlCache { map: iter.into_iter().collect() }
  }
}
