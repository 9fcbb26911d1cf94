//! LRU chunk cache for the EWF handle (like libfcache)
//!
//! A 1 MiB sequential read spans many 32 KiB chunks and usually ends inside
//! one; the cache keeps that chunk decompressed for the next read.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

pub(crate) struct ChunkCache {
    cache: HashMap<usize, Arc<[u8]>>,
    lru_queue: VecDeque<usize>,
    max_entries: usize,
}

impl ChunkCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            cache: HashMap::new(),
            lru_queue: VecDeque::new(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn get(&mut self, chunk_index: usize) -> Option<Arc<[u8]>> {
        let data = self.cache.get(&chunk_index)?;
        if self.lru_queue.front() != Some(&chunk_index) {
            self.lru_queue.retain(|&x| x != chunk_index);
            self.lru_queue.push_front(chunk_index);
        }
        Some(Arc::clone(data))
    }

    pub fn insert(&mut self, chunk_index: usize, data: Vec<u8>) -> Arc<[u8]> {
        if self.cache.len() >= self.max_entries && !self.cache.contains_key(&chunk_index) {
            if let Some(old_index) = self.lru_queue.pop_back() {
                self.cache.remove(&old_index);
            }
        }

        let data: Arc<[u8]> = data.into();
        if self.cache.insert(chunk_index, Arc::clone(&data)).is_none() {
            self.lru_queue.push_front(chunk_index);
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = ChunkCache::new(2);
        cache.insert(0, vec![0]);
        cache.insert(1, vec![1]);
        assert!(cache.get(0).is_some());

        cache.insert(2, vec![2]);
        assert!(cache.get(1).is_none());
        assert_eq!(&*cache.get(0).unwrap(), &[0]);
        assert_eq!(&*cache.get(2).unwrap(), &[2]);
    }

    #[test]
    fn test_reinsert_does_not_grow() {
        let mut cache = ChunkCache::new(2);
        cache.insert(7, vec![1]);
        cache.insert(7, vec![2]);
        cache.insert(8, vec![3]);
        assert_eq!(&*cache.get(7).unwrap(), &[2]);
        assert!(cache.get(8).is_some());
        assert_eq!(cache.cache.len(), 2);
    }
}
