//! Non-owning reference from an object back to its backend

use crate::storage::Storage;
use crate::{Error, Result};
use std::fmt;
use std::sync::{Arc, Weak};

/// Weak handle to the backend that produced an [`Object`](super::Object)
///
/// Holding a handle never keeps a backend alive. Once every `Arc` to the
/// backend is dropped, [`upgrade`](BackendHandle::upgrade) fails with
/// [`Error::BackendReleased`].
#[derive(Clone, Default)]
pub struct BackendHandle(Option<Weak<dyn Storage>>);

impl BackendHandle {
    pub fn new(storage: Weak<dyn Storage>) -> Self {
        BackendHandle(Some(storage))
    }

    /// Handle to an existing backend
    pub fn of(storage: &Arc<dyn Storage>) -> Self {
        BackendHandle::new(Arc::downgrade(storage))
    }

    /// A handle that refers to no backend
    pub fn detached() -> Self {
        BackendHandle(None)
    }

    pub fn upgrade(&self) -> Result<Arc<dyn Storage>> {
        self.0
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or(Error::BackendReleased)
    }

    pub fn is_live(&self) -> bool {
        self.0.as_ref().map_or(false, |weak| weak.strong_count() > 0)
    }

    /// Whether both handles point at the same backend instance
    pub fn same_backend(&self, other: &BackendHandle) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Weak::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for BackendHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_ref().and_then(Weak::upgrade) {
            Some(storage) => write!(f, "BackendHandle({})", storage.name()),
            None => write!(f, "BackendHandle(<released>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileSystemConfig;
    use crate::storage::FileSystemStorage;
    use tempfile::tempdir;

    fn filesystem(dir: &std::path::Path) -> Arc<dyn Storage> {
        FileSystemStorage::new(FileSystemConfig::new(dir)).unwrap()
    }

    #[test]
    fn test_detached_handle() {
        let handle = BackendHandle::detached();
        assert!(!handle.is_live());
        assert!(matches!(handle.upgrade(), Err(Error::BackendReleased)));
        assert!(!handle.same_backend(&BackendHandle::default()));
    }

    #[test]
    fn test_handle_does_not_keep_backend_alive() {
        let dir = tempdir().unwrap();
        let storage = filesystem(dir.path());
        let handle = BackendHandle::of(&storage);

        assert!(handle.is_live());
        assert_eq!(handle.upgrade().unwrap().name(), "filesystem");
        assert_eq!(format!("{:?}", handle), "BackendHandle(filesystem)");

        drop(storage);
        assert!(!handle.is_live());
        assert!(handle.upgrade().err().map_or(false, |e| e.is_config()));
        assert_eq!(format!("{:?}", handle), "BackendHandle(<released>)");
    }

    #[test]
    fn test_same_backend() {
        let dir = tempdir().unwrap();
        let first = filesystem(&dir.path().join("a"));
        let second = filesystem(&dir.path().join("b"));

        let handle = BackendHandle::of(&first);
        assert!(handle.same_backend(&handle.clone()));
        assert!(handle.same_backend(&BackendHandle::of(&first)));
        assert!(!handle.same_backend(&BackendHandle::of(&second)));
    }
}
