//! Durable JSON documents
//!
//! Each store owns exactly one pretty-printed JSON file that is rewritten in
//! full on every mutation. All access goes through one mutex per document, so
//! a read-modify-write cycle (load, mutate, write, reload) never interleaves
//! with another writer.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;
use crate::infra::filesystem;

/// A JSON document on disk holding a `T`
#[derive(Debug)]
pub struct JsonDocument<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonDocument<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    /// Open (and if needed initialize) the document at `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let doc = Self {
            path: path.into(),
            lock: Mutex::new(()),
            _marker: PhantomData,
        };
        {
            let _guard = doc.guard()?;
            doc.load()?;
        }
        Ok(doc)
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the latest committed state
    pub fn read(&self) -> Result<T, StoreError> {
        let _guard = self.guard()?;
        self.load()
    }

    /// Apply `f` to the current state and persist the result
    ///
    /// Nothing is written when `f` fails. On success the document is reloaded
    /// from disk and returned alongside `f`'s output.
    pub fn update<R, E>(&self, f: impl FnOnce(&mut T) -> Result<R, E>) -> Result<(R, T), E>
    where
        E: From<StoreError>,
    {
        self.update_then(f, |_, _| {})
    }

    /// Like [`update`](Self::update), then run `on_commit` before the lock
    /// is released
    ///
    /// Successive `on_commit` calls observe commits in the order they were
    /// written. `on_commit` must not touch this document.
    pub fn update_then<R, E>(
        &self,
        f: impl FnOnce(&mut T) -> Result<R, E>,
        on_commit: impl FnOnce(&R, &T),
    ) -> Result<(R, T), E>
    where
        E: From<StoreError>,
    {
        let _guard = self.guard()?;
        let mut value = self.load()?;
        let out = f(&mut value)?;
        self.save(&value)?;
        let committed = self.load()?;
        on_commit(&out, &committed);
        Ok((out, committed))
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.lock.lock().map_err(|_| StoreError::LockPoisoned {
            path: self.path.clone(),
        })
    }

    fn load(&self) -> Result<T, StoreError> {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "Initializing empty document");
            let value = T::default();
            self.save(&value)?;
            return Ok(value);
        }

        let content = filesystem::read_file(&self.path).map_err(|e| StoreError::Io {
            path: self.path.clone(),
            error: e.to_string(),
        })?;

        match serde_json::from_str(&content) {
            Ok(value) => Ok(value),
            Err(e) => {
                let backup = self.corrupt_backup_path();
                tracing::warn!(
                    path = %self.path.display(),
                    backup = %backup.display(),
                    error = %e,
                    "Document is corrupt; moving it aside and starting empty"
                );
                filesystem::rename(&self.path, &backup).map_err(|e| StoreError::Io {
                    path: self.path.clone(),
                    error: e.to_string(),
                })?;
                let value = T::default();
                self.save(&value)?;
                Ok(value)
            }
        }
    }

    fn save(&self, value: &T) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(value).map_err(|e| StoreError::Serialize {
            path: self.path.clone(),
            error: e.to_string(),
        })?;
        filesystem::write_file_atomic(&self.path, &content).map_err(|e| StoreError::Io {
            path: self.path.clone(),
            error: e.to_string(),
        })
    }

    fn corrupt_backup_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".corrupt");
        self.path.with_file_name(name)
    }
}
