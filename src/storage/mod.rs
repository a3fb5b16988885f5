//! The storage contract and its backends
//!
//! Every backend implements [`Storage`]. Paths handed to any operation may be
//! bare keys, slash-prefixed keys or full object URLs; backends normalize
//! them with [`crate::key`] before addressing the underlying store.
//!
//! Backends:
//! - [`FileSystemStorage`]: a directory on the local disk
//! - [`BucketStorage`]: any bucket-style object store reachable through a
//!   [`BucketClient`], such as [`MemoryClient`]

mod bucket;
mod filesystem;
mod memory;

pub use bucket::{
    content_type_for, BucketClient, BucketStorage, ListEntry, ListPage, PutOptions, MAX_BATCH_DELETE,
};
pub use filesystem::FileSystemStorage;
pub use memory::{Fault, MemoryClient, RequestKind};

use crate::model::Object;
use crate::{key, Result};
use std::io::{Read, Seek, SeekFrom};
use std::time::Duration;
use tempfile::NamedTempFile;

/// Lifetime of signed URLs handed out by [`Storage::public_url`]
pub const DEFAULT_URL_EXPIRY: Duration = Duration::from_secs(60 * 60);

/// Operations every storage backend provides
///
/// Calls block the current thread, including while a backend waits between
/// retries. Run each call on its own thread if it must be cancellable.
pub trait Storage: Send + Sync {
    /// Short backend identifier, used in logs
    fn name(&self) -> &str;

    /// Write `content` from its current position to the end, replacing any
    /// object at the same key
    ///
    /// Rewinding a partially read source is the caller's job; see
    /// [`StorageExt::store_from_start`].
    fn store(&self, path: &str, content: &mut dyn Read) -> Result<Object>;

    /// Stream an object's full content
    ///
    /// Fails with [`Error::NotFound`](crate::Error::NotFound) if the key does
    /// not exist.
    fn retrieve(&self, path: &str) -> Result<Box<dyn Read + Send>>;

    /// Download an object into a new temp file, rewound to its start
    ///
    /// The file belongs to the caller: it is removed when the returned value
    /// is dropped unless the caller persists it.
    fn retrieve_to_temp_file(&self, path: &str) -> Result<NamedTempFile> {
        let mut reader = self.retrieve(path)?;

        let key = key::KeyNormalizer::unscoped().normalize(path);
        let suffix = key::extension(&key)
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();
        let mut file = tempfile::Builder::new()
            .prefix(&format!("{}-", self.name()))
            .suffix(&suffix)
            .tempfile()?;

        std::io::copy(&mut reader, file.as_file_mut())?;
        file.as_file_mut().seek(SeekFrom::Start(0))?;
        Ok(file)
    }

    /// Remove an object; removing a missing key succeeds
    fn delete(&self, path: &str) -> Result<()>;

    /// Remove several objects
    ///
    /// Not atomic: when this fails, some of the keys may already be gone.
    fn delete_many(&self, paths: &[&str]) -> Result<()> {
        for path in paths {
            self.delete(path)?;
        }
        Ok(())
    }

    /// Every object under `prefix`, across all pages
    ///
    /// A non-empty prefix names a directory: `list("photos")` returns
    /// `photos/a.png` but not `photos-old/a.png`. If a page fails after its
    /// retries, the objects gathered so far come back inside
    /// [`Error::PartialList`](crate::Error::PartialList).
    fn list(&self, prefix: &str) -> Result<Vec<Object>>;

    /// URL the object can be fetched from directly
    ///
    /// Backends that keep objects private return a signed URL valid for
    /// [`DEFAULT_URL_EXPIRY`].
    fn public_url(&self, path: &str) -> Result<String>;

    /// Copy an object without routing its content through the caller
    fn copy(&self, from: &str, to: &str) -> Result<()>;

    /// Host (or URL prefix) objects are served from
    fn endpoint(&self) -> String;
}

/// Convenience helpers available on every backend
pub trait StorageExt: Storage {
    fn store_bytes(&self, path: &str, data: &[u8]) -> Result<Object> {
        let mut reader = data;
        self.store(path, &mut reader)
    }

    /// Rewind `content` to its start, then store all of it
    fn store_from_start<R: Read + Seek>(&self, path: &str, content: &mut R) -> Result<Object> {
        content.seek(SeekFrom::Start(0))?;
        self.store(path, content)
    }

    fn retrieve_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.retrieve(path)?.read_to_end(&mut data)?;
        Ok(data)
    }
}

impl<T: Storage + ?Sized> StorageExt for T {}
