//! Object descriptor returned by every backend

use super::BackendHandle;
use crate::key;
use crate::storage::Storage;
use crate::Result;
use std::io::Read;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::NamedTempFile;

/// A stored artifact
///
/// Objects are lightweight descriptors, not content caches: fetching the
/// content goes back to the backend that produced the object. `path` is the
/// canonical key, so passing it to the same backend addresses the same item.
#[derive(Clone, Debug)]
pub struct Object {
    /// Canonical backend-relative key, never slash-prefixed
    pub path: String,
    /// Last segment of `path`
    pub name: String,
    pub last_modified: Option<SystemTime>,
    /// Only filesystem listings report directories
    pub is_dir: bool,
    owner: BackendHandle,
}

impl Object {
    pub fn new(path: impl Into<String>, owner: BackendHandle) -> Self {
        let path = path.into();
        let name = key::base_name(&path).to_string();
        Object {
            path,
            name,
            last_modified: None,
            is_dir: false,
            owner,
        }
    }

    pub fn with_last_modified(mut self, last_modified: Option<SystemTime>) -> Self {
        self.last_modified = last_modified;
        self
    }

    pub fn with_dir(mut self, is_dir: bool) -> Self {
        self.is_dir = is_dir;
        self
    }

    pub fn owner(&self) -> &BackendHandle {
        &self.owner
    }

    /// The backend this object came from, if it is still alive
    pub fn storage(&self) -> Result<Arc<dyn Storage>> {
        self.owner.upgrade()
    }

    /// Stream this object's content from its backend
    pub fn retrieve(&self) -> Result<Box<dyn Read + Send>> {
        self.storage()?.retrieve(&self.path)
    }

    /// Download this object's content into a fresh temp file
    pub fn retrieve_to_temp_file(&self) -> Result<NamedTempFile> {
        self.storage()?.retrieve_to_temp_file(&self.path)
    }

    /// Modification time as unix seconds
    pub fn last_modified_secs(&self) -> Option<u64> {
        self.last_modified
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
    }
}
