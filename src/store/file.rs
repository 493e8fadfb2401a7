//! JSON file store guarded by an advisory lock file.
//!
//! Layout for a store at `dir/name.json`:
//! - `dir/name.json` holds the pretty-printed record list,
//! - `dir/name.json.lock` is held exclusively for every update.
//!
//! Writes go to a temporary file in the same directory which is fsynced and
//! renamed over the target, so a concurrent reader sees either the old or
//! the new list, never a partial one.

use super::{Commit, RecordStore, StoreError};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    marker::PhantomData,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};
use tracing::{debug, warn};
use ulid::Ulid;

#[derive(Debug)]
pub struct JsonFileStore<T> {
    path: PathBuf,
    lock_path: PathBuf,
    // flock does not order threads sharing one store value; this does.
    local: Mutex<()>,
    _records: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    /// Open (and create the parent directory of) a store at `path`.
    ///
    /// # Errors
    /// Returns an error if the parent directory cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut lock_name = path.as_os_str().to_owned();
        lock_name.push(".lock");

        Ok(Self {
            lock_path: PathBuf::from(lock_name),
            path,
            local: Mutex::new(()),
            _records: PhantomData,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T: Serialize + DeserializeOwned> JsonFileStore<T> {
    /// Strict read used inside the lock.
    ///
    /// A missing file is empty. A file that does not parse is moved aside so
    /// the following save cannot silently overwrite it.
    fn read_for_update(&self) -> Result<Vec<T>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        match parse(&bytes) {
            Ok(records) => Ok(records),
            Err(err) => {
                let mut aside = self.path.as_os_str().to_owned();
                aside.push(format!(".corrupt-{}", Ulid::new()));
                warn!(
                    path = %self.path.display(),
                    moved_to = %Path::new(&aside).display(),
                    error = %err,
                    "store unreadable, starting from an empty list"
                );
                fs::rename(&self.path, &aside)?;
                Ok(Vec::new())
            }
        }
    }

    fn write(&self, records: &[T]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(records)?;
        atomic_write(&self.path, &bytes)?;
        debug!(path = %self.path.display(), count = records.len(), "store saved");
        Ok(())
    }

    fn with_lock<R>(&self, f: impl FnOnce() -> Result<R, StoreError>) -> Result<R, StoreError> {
        let _local = self.local.lock().unwrap_or_else(PoisonError::into_inner);
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)?;
        let mut lock = fd_lock::RwLock::new(lock_file);
        let _guard = lock.write()?;
        f()
    }
}

impl<T> RecordStore<T> for JsonFileStore<T>
where
    T: Serialize + DeserializeOwned,
{
    fn load(&self) -> Vec<T> {
        match fs::read(&self.path) {
            Ok(bytes) => parse(&bytes).unwrap_or_else(|err| {
                warn!(path = %self.path.display(), error = %err, "store unreadable, treating as empty");
                Vec::new()
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Vec::new(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "store unreadable, treating as empty");
                Vec::new()
            }
        }
    }

    fn save(&self, records: &[T]) -> Result<(), StoreError> {
        self.with_lock(|| self.write(records))
    }

    fn update<R, F>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Vec<T>) -> Commit<R>,
    {
        self.with_lock(|| {
            let mut records = self.read_for_update()?;
            match f(&mut records) {
                Commit::Save(value) => {
                    self.write(&records)?;
                    Ok(value)
                }
                Commit::Discard(value) => Ok(value),
            }
        })
    }
}

fn parse<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>, serde_json::Error> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(bytes)
}

/// Write bytes via `NamedTempFile` + fsync + persist.
///
/// The file holds TOTP secrets, so it is created `0o600` on Unix.
fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    temp.as_file_mut().write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::{sync::Arc, thread};

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct Row {
        name: String,
        hits: u32,
    }

    fn row(name: &str) -> Row {
        Row {
            name: name.to_string(),
            hits: 0,
        }
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonFileStore<Row> = JsonFileStore::open(dir.path().join("rows.json")).unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/rows.json");
        let store: JsonFileStore<Row> = JsonFileStore::open(&path).unwrap();
        store.append(row("x")).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn append_and_save_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.append(row("a")).unwrap();
        store.append(row("b")).unwrap();

        let reopened: JsonFileStore<Row> = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.load(), vec![row("a"), row("b")]);

        reopened.save(&[row("c")]).unwrap();
        assert_eq!(store.load(), vec![row("c")]);
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        fs::write(&path, b"{ not json").unwrap();
        let store: JsonFileStore<Row> = JsonFileStore::open(&path).unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn corrupt_file_is_moved_aside_before_update() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        fs::write(&path, b"garbage").unwrap();
        let store = JsonFileStore::open(&path).unwrap();
        store.append(row("fresh")).unwrap();

        assert_eq!(store.load(), vec![row("fresh")]);
        let kept_aside = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .any(|entry| entry.file_name().to_string_lossy().contains(".corrupt-"));
        assert!(kept_aside);
    }

    #[test]
    fn repeated_corruption_keeps_every_copy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        let store = JsonFileStore::open(&path).unwrap();

        for garbage in ["first garbage", "second garbage", "third garbage"] {
            fs::write(&path, garbage).unwrap();
            store.append(row("fresh")).unwrap();
        }

        let mut kept: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().contains(".corrupt-"))
            .map(|entry| fs::read_to_string(entry.path()).unwrap())
            .collect();
        kept.sort();
        assert_eq!(kept, ["first garbage", "second garbage", "third garbage"]);
    }

    #[test]
    fn discard_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        let store: JsonFileStore<Row> = JsonFileStore::open(&path).unwrap();
        store
            .update(|rows| {
                rows.push(row("ghost"));
                Commit::Discard(())
            })
            .unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        let store: JsonFileStore<Row> = JsonFileStore::open(&path).unwrap();
        // A directory in place of the target makes the rename fail.
        fs::create_dir(&path).unwrap();
        assert!(store.save(&[row("x")]).is_err());
    }

    #[test]
    fn updates_from_separate_instances_do_not_lose_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = Arc::new(dir.path().join("rows.json"));
        JsonFileStore::open(path.as_path())
            .unwrap()
            .save(&[row("counter")])
            .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let path = Arc::clone(&path);
                thread::spawn(move || {
                    let store: JsonFileStore<Row> = JsonFileStore::open(path.as_path()).unwrap();
                    for _ in 0..25 {
                        store
                            .update(|rows| {
                                rows[0].hits += 1;
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

        let store: JsonFileStore<Row> = JsonFileStore::open(path.as_path()).unwrap();
        assert_eq!(store.load()[0].hits, 100);
    }
}
