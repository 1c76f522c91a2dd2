//! # String-keyed chained hash map
//!
//! `IniMap` is the table both levels of an [`Ini`](crate::Ini) store are built on:
//! the outer map holds [`Section`](crate::Section)s and each section holds an
//! `IniMap<Option<String>>` of values.
//!
//! Keys are hashed with djb2 and resolved by separate chaining. The bucket count is
//! always a power of two, so the bucket index is `hash & (capacity - 1)`. The table
//! doubles once more than three quarters of its buckets are occupied.
//!
//! Iteration walks the bucket array front to back and each chain head to tail. This
//! is *not* insertion order, and the serializer relies on it being exactly this order.

use std::fmt;

use crate::error::{Error, Result};

/// djb2 over the raw bytes of `key` (`hash * 33 + byte`, seeded with 5381).
pub fn djb2(key: &str) -> u32 {
    key.bytes()
        .fold(5381u32, |hash, byte| {
            (hash << 5).wrapping_add(hash).wrapping_add(byte as u32)
        })
}

const fn bucket_index(hash: u32, capacity: usize) -> usize {
    hash as usize & (capacity - 1)
}

type Link<V> = Option<Box<Entry<V>>>;

struct Entry<V> {
    hash: u32,
    key: Box<str>,
    value: V,
    next: Link<V>,
}

impl<V> Entry<V> {
    fn new(hash: u32, key: &str, value: V) -> Self {
        Self {
            hash,
            key: key.into(),
            value,
            next: None,
        }
    }

    fn matches(&self, hash: u32, key: &str) -> bool {
        self.hash == hash && &*self.key == key
    }
}

/// Hash map from owned string keys to `V`, with bucket-order iteration.
pub struct IniMap<V> {
    buckets: Vec<Link<V>>,
    len: usize,
}

impl<V> IniMap<V> {
    /// Number of buckets a fresh map starts with.
    pub const START_CAPACITY: usize = 16;
    /// The table grows once `len / capacity` exceeds this ratio.
    pub const MAX_LOAD_FACTOR: f64 = 0.75;

    pub fn new() -> Self {
        let mut buckets = Vec::with_capacity(Self::START_CAPACITY);
        buckets.resize_with(Self::START_CAPACITY, || None);
        Self { buckets, len: 0 }
    }

    /// Creates a map with at least `capacity` buckets, rounded up to a power of two.
    ///
    /// Returns [`Error::Allocation`] if the bucket array cannot be reserved.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let capacity = capacity
            .max(Self::START_CAPACITY)
            .checked_next_power_of_two()
            .ok_or_else(|| {
                Error::InvalidArgument(format!("capacity {capacity} is too large"))
            })?;
        Ok(Self {
            buckets: empty_buckets(capacity)?,
            len: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of buckets currently allocated.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Inserts `value` under `key`, dropping any value previously stored there.
    ///
    /// Returns `true` if an existing entry was replaced and `false` if a new entry
    /// was added. An empty key is rejected with [`Error::InvalidArgument`].
    pub fn put(&mut self, key: &str, value: V) -> Result<bool> {
        check_key(key)?;
        let hash = djb2(key);

        if let Some(entry) = self.slot(hash, key) {
            entry.value = value;
            return Ok(true);
        }

        self.len += 1;
        self.grow();
        *self.slot(hash, key) = Some(Box::new(Entry::new(hash, key, value)));
        Ok(false)
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        let hash = djb2(key);
        let mut link = &self.buckets[bucket_index(hash, self.buckets.len())];

        while let Some(entry) = link {
            if entry.matches(hash, key) {
                return Some(&entry.value);
            }
            link = &entry.next;
        }

        None
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        let hash = djb2(key);
        self.slot(hash, key).as_mut().map(|entry| &mut entry.value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Returns the value stored under `key`, inserting `make()` first if it is missing.
    pub fn get_or_insert_with<F>(&mut self, key: &str, make: F) -> Result<&mut V>
    where
        F: FnOnce() -> V,
    {
        check_key(key)?;
        let hash = djb2(key);

        if !self.contains_key(key) {
            self.len += 1;
            self.grow();
        }

        let entry = self
            .slot(hash, key)
            .get_or_insert_with(|| Box::new(Entry::new(hash, key, make())));
        Ok(&mut entry.value)
    }

    /// Unlinks the entry for `key` and hands its value back to the caller.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let hash = djb2(key);
        let slot = self.slot(hash, key);
        let entry = slot.take()?;
        let Entry { value, next, .. } = *entry;
        *slot = next;
        self.len -= 1;
        Some(value)
    }

    /// Drops every entry, keeping the current bucket array.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            let mut link = bucket.take();
            while let Some(mut entry) = link {
                link = entry.next.take();
            }
        }
        self.len = 0;
    }

    /// Iterates over all entries in bucket order, then chain order within a bucket.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            buckets: self.buckets.iter(),
            chain: None,
            remaining: self.len,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|(key, _)| key)
    }

    /// Returns the link holding the entry for `key`, or the empty link terminating
    /// its chain when the key is absent.
    fn slot(&mut self, hash: u32, key: &str) -> &mut Link<V> {
        let index = bucket_index(hash, self.buckets.len());
        let mut link = &mut self.buckets[index];

        while link.as_ref().is_some_and(|entry| !entry.matches(hash, key)) {
            if let Some(entry) = link {
                link = &mut entry.next;
            }
        }

        link
    }

    /// Doubles the bucket array and rehashes every entry if the load factor is exceeded.
    fn grow(&mut self) {
        let capacity = self.buckets.len();
        if self.len * 4 <= capacity * 3 {
            return;
        }

        let new_capacity = capacity << 1;
        let mut buckets = match empty_buckets(new_capacity) {
            Ok(buckets) => buckets,
            Err(e) => {
                tracing::warn!(
                    capacity,
                    new_capacity,
                    "Failed to grow map, keeping current buckets: {}",
                    e
                );
                return;
            }
        };

        for bucket in &mut self.buckets {
            let mut link = bucket.take();
            while let Some(mut entry) = link {
                link = entry.next.take();
                let index = bucket_index(entry.hash, new_capacity);
                entry.next = buckets[index].take();
                buckets[index] = Some(entry);
            }
        }

        tracing::trace!(len = self.len, capacity = new_capacity, "Map grown");
        self.buckets = buckets;
    }
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidArgument("key must not be empty".to_string()));
    }
    Ok(())
}

fn empty_buckets<V>(capacity: usize) -> Result<Vec<Link<V>>> {
    let mut buckets = Vec::new();
    buckets.try_reserve_exact(capacity)?;
    buckets.resize_with(capacity, || None);
    Ok(buckets)
}

impl<V> Default for IniMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Drop for IniMap<V> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<V: fmt::Debug> fmt::Debug for IniMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, V> IntoIterator for &'a IniMap<V> {
    type Item = (&'a str, &'a V);
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Bucket-order iterator over an [`IniMap`].
pub struct Iter<'a, V> {
    buckets: std::slice::Iter<'a, Link<V>>,
    chain: Option<&'a Entry<V>>,
    remaining: usize,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a str, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.chain {
                self.chain = entry.next.as_deref();
                self.remaining -= 1;
                return Some((&*entry.key, &entry.value));
            }
            self.chain = self.buckets.next()?.as_deref();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_djb2() {
        assert_eq!(djb2(""), 5381);
        // 5381 * 33 + 'a'
        assert_eq!(djb2("a"), 177670);
        assert_eq!(djb2("ab"), 177670 * 33 + 98);
        assert_ne!(djb2("ab"), djb2("ba"));
    }

    #[test]
    fn test_put_get_replace() {
        let mut map = IniMap::new();

        assert!(!map.put("name", "Alice".to_string()).unwrap());
        assert!(!map.put("port", "5432".to_string()).unwrap());
        assert_eq!(map.len(), 2);

        assert!(map.put("name", "Bob".to_string()).unwrap());
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("name").map(String::as_str), Some("Bob"));
        assert_eq!(map.get("port").map(String::as_str), Some("5432"));
        assert!(map.get("missing").is_none());
    }

    #[test]
    fn test_empty_key_rejected() {
        let mut map = IniMap::new();
        assert!(matches!(map.put("", 1), Err(Error::InvalidArgument(_))));
        assert!(matches!(
            map.get_or_insert_with("", || 1),
            Err(Error::InvalidArgument(_))
        ));
        assert!(map.is_empty());
        assert!(map.get("").is_none());
    }

    #[test]
    fn test_remove() {
        let mut map = IniMap::new();
        map.put("a", 1).unwrap();
        map.put("b", 2).unwrap();

        assert_eq!(map.remove("a"), Some(1));
        assert_eq!(map.remove("a"), None);
        assert_eq!(map.len(), 1);
        assert!(!map.contains_key("a"));
        assert_eq!(map.get("b"), Some(&2));
    }

    #[test]
    fn test_remove_from_middle_of_chain() {
        // With 16 buckets these keys all land in the same bucket.
        let keys: Vec<String> = (0..2000)
            .map(|i| format!("k{i}"))
            .filter(|k| bucket_index(djb2(k), 16) == 3)
            .take(3)
            .collect();
        assert_eq!(keys.len(), 3);

        let mut map = IniMap::new();
        for (i, key) in keys.iter().enumerate() {
            map.put(key, i).unwrap();
        }
        assert_eq!(map.capacity(), 16);

        assert_eq!(map.remove(&keys[1]), Some(1));
        assert_eq!(map.get(&keys[0]), Some(&0));
        assert_eq!(map.get(&keys[2]), Some(&2));
        assert_eq!(map.iter().count(), 2);
    }

    #[test]
    fn test_growth_uses_load_factor() {
        let mut map = IniMap::new();
        for i in 0..12 {
            map.put(&format!("key{i}"), i).unwrap();
        }
        // 12 / 16 is exactly 0.75, not above it
        assert_eq!(map.capacity(), 16);

        map.put("key12", 12).unwrap();
        assert_eq!(map.capacity(), 32);
    }

    #[test]
    fn test_growth_keeps_every_key() {
        let mut map = IniMap::new();
        for i in 0..1000 {
            map.put(&format!("key{i}"), i).unwrap();
        }
        for i in 0..1000 {
            map.put(&format!("key{i}"), i * 2).unwrap();
        }

        assert_eq!(map.len(), 1000);
        assert!(map.capacity().is_power_of_two());
        assert!(map.len() * 4 <= map.capacity() * 3);
        for i in 0..1000 {
            assert_eq!(map.get(&format!("key{i}")), Some(&(i * 2)));
        }
    }

    #[test]
    fn test_iter_is_bucket_order() {
        let mut map = IniMap::new();
        for key in ["zeta", "alpha", "mid", "omega", "beta"] {
            map.put(key, ()).unwrap();
        }

        let order: Vec<usize> = map
            .keys()
            .map(|key| bucket_index(djb2(key), map.capacity()))
            .collect();
        let mut sorted = order.clone();
        sorted.sort();

        assert_eq!(order, sorted);
        assert_eq!(map.iter().len(), 5);
    }

    #[test]
    fn test_get_or_insert_with() {
        let mut map: IniMap<Vec<u32>> = IniMap::new();

        map.get_or_insert_with("list", Vec::new).unwrap().push(1);
        map.get_or_insert_with("list", || vec![99]).unwrap().push(2);

        assert_eq!(map.len(), 1);
        assert_eq!(map.get("list"), Some(&vec![1, 2]));
    }

    #[test]
    fn test_with_capacity_rounds_up() {
        let map: IniMap<()> = IniMap::with_capacity(100).unwrap();
        assert_eq!(map.capacity(), 128);

        let map: IniMap<()> = IniMap::with_capacity(0).unwrap();
        assert_eq!(map.capacity(), IniMap::<()>::START_CAPACITY);
    }

    #[test]
    fn test_replaced_values_are_dropped() {
        use std::rc::Rc;

        let tracker = Rc::new(());
        let mut map = IniMap::new();
        for _ in 0..100 {
            map.put("same", Rc::clone(&tracker)).unwrap();
        }
        assert_eq!(Rc::strong_count(&tracker), 2);

        map.put("other", Rc::clone(&tracker)).unwrap();
        drop(map);
        assert_eq!(Rc::strong_count(&tracker), 1);
    }

    #[test]
    fn test_clear() {
        let mut map = IniMap::new();
        for i in 0..50 {
            map.put(&i.to_string(), i).unwrap();
        }
        let capacity = map.capacity();

        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.iter().count(), 0);
        assert_eq!(map.capacity(), capacity);
    }
}
