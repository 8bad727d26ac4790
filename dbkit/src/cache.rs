//! Bounded LRU cache shared across threads

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};

#[derive(Debug)]
pub(crate) struct LruCache<K, V> {
    inner: Mutex<LruInner<K, V>>,
}

#[derive(Debug)]
struct LruInner<K, V> {
    capacity: usize,
    map: HashMap<K, V>,
    order: VecDeque<K>,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruInner {
                capacity,
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub(crate) fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let value = inner.map.get(key).cloned()?;
        inner.touch(key);
        Some(value)
    }

    /// Insert `value` unless another thread got there first; returns the
    /// cached entry either way.
    pub(crate) fn insert_if_absent(&self, key: K, value: V) -> V {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = inner.map.get(&key).cloned() {
            inner.touch(&key);
            return existing;
        }

        inner.map.insert(key.clone(), value.clone());
        inner.order.push_back(key);
        inner.evict_if_needed();
        value
    }

    pub(crate) fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map
            .len()
    }
}

impl<K: Eq + Hash, V> LruInner<K, V> {
    fn touch(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }

    fn evict_if_needed(&mut self) {
        if self.capacity == 0 {
            self.map.clear();
            self.order.clear();
            return;
        }

        while self.map.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            let _ = self.map.remove(&oldest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_and_least_recent_evicted() {
        let cache = LruCache::new(2);
        cache.insert_if_absent("a", 1);
        cache.insert_if_absent("b", 2);
        assert_eq!(cache.get(&"a"), Some(1));
        cache.insert_if_absent("c", 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn test_first_insert_wins() {
        let cache = LruCache::new(4);
        assert_eq!(cache.insert_if_absent("k", 1), 1);
        assert_eq!(cache.insert_if_absent("k", 2), 1);
    }

    #[test]
    fn test_zero_capacity_holds_nothing() {
        let cache = LruCache::new(0);
        assert_eq!(cache.insert_if_absent(1, "x"), "x");
        assert_eq!(cache.len(), 0);
    }
}
