//! Record persistence with an explicit locking contract.
//!
//! A store holds one list of records. [`RecordStore::update`] is the only
//! way to change it: load, mutate and save run as a single critical section
//! per store, so two callers can never both observe and act on the same
//! stale state.
//!
//! Reads fail open (missing or corrupt data reads as an empty list). Writes
//! fail loud with a [`StoreError`].

pub mod file;
pub mod memory;
pub mod timestamp;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialize: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Outcome of an [`RecordStore::update`] closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit<R> {
    /// Persist the mutated list, then return the value.
    Save(R),
    /// Drop any mutation and return the value without writing.
    Discard(R),
}

impl<R> Commit<R> {
    pub fn into_inner(self) -> R {
        match self {
            Self::Save(value) | Self::Discard(value) => value,
        }
    }

    #[must_use]
    pub const fn is_save(&self) -> bool {
        matches!(self, Self::Save(_))
    }
}

pub trait RecordStore<T>: Send + Sync {
    /// Snapshot of all records. Never fails; unreadable data is empty.
    fn load(&self) -> Vec<T>;

    /// Replace the whole list atomically.
    ///
    /// # Errors
    /// Returns an error if the list cannot be written.
    fn save(&self, records: &[T]) -> Result<(), StoreError>;

    /// Run `f` over the records inside the store's exclusive lock.
    ///
    /// # Errors
    /// Returns an error if the lock cannot be taken or a `Save` cannot be written.
    fn update<R, F>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Vec<T>) -> Commit<R>;

    /// Add one record under the lock.
    ///
    /// # Errors
    /// Returns an error if the list cannot be written.
    fn append(&self, record: T) -> Result<(), StoreError> {
        self.update(|records| {
            records.push(record);
            Commit::Save(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_into_inner_ignores_variant() {
        assert_eq!(Commit::Save(3).into_inner(), 3);
        assert_eq!(Commit::Discard("x").into_inner(), "x");
        assert!(Commit::Save(()).is_save());
        assert!(!Commit::Discard(()).is_save());
    }
}
