//! In-memory store for tests and embedding.

use super::{Commit, RecordStore, StoreError};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
pub struct MemoryStore<T> {
    records: Mutex<Vec<T>>,
}

impl<T> MemoryStore<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_records(records: Vec<T>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    fn guard(&self) -> MutexGuard<'_, Vec<T>> {
        // A panic inside an update closure never leaves a half-applied list
        // behind, because mutations run on a scratch copy.
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone + Send> RecordStore<T> for MemoryStore<T> {
    fn load(&self) -> Vec<T> {
        self.guard().clone()
    }

    fn save(&self, records: &[T]) -> Result<(), StoreError> {
        *self.guard() = records.to_vec();
        Ok(())
    }

    fn update<R, F>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Vec<T>) -> Commit<R>,
    {
        let mut current = self.guard();
        let mut scratch = current.clone();
        match f(&mut scratch) {
            Commit::Save(value) => {
                *current = scratch;
                Ok(value)
            }
            Commit::Discard(value) => Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn discard_leaves_records_untouched() {
        let store = MemoryStore::with_records(vec![1, 2]);
        let n = store
            .update(|records| {
                records.clear();
                Commit::Discard(records.len())
            })
            .unwrap();
        assert_eq!(n, 0);
        assert_eq!(store.load(), vec![1, 2]);
    }

    #[test]
    fn save_replaces_records() {
        let store = MemoryStore::new();
        store.append(7).unwrap();
        store.save(&[1, 2, 3]).unwrap();
        assert_eq!(store.load(), vec![1, 2, 3]);
    }

    #[test]
    fn concurrent_updates_are_serialized() {
        let store = Arc::new(MemoryStore::with_records(vec![0u32]));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..100 {
                        store
                            .update(|records| {
                                records[0] += 1;
                                Commit::Save(())
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.load(), vec![800]);
    }
}
