//! Local filesystem backend
//!
//! Keys map to files under a root directory:
//! ```text
//! {root}/
//!   photos/
//!     2024/
//!       cat.png      # key "photos/2024/cat.png"
//! ```
//! There is no network, so nothing is retried.

use super::Storage;
use crate::config::FileSystemConfig;
use crate::key::{self, KeyNormalizer};
use crate::model::{BackendHandle, Object};
use crate::{Error, Result};
use std::collections::VecDeque;
use std::fs::{self, File, Metadata};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Storage backed by a local directory
pub struct FileSystemStorage {
    root: PathBuf,
    public_base_url: Option<String>,
    normalizer: KeyNormalizer,
    /// Lets objects point back at this backend
    me: Weak<FileSystemStorage>,
}

impl FileSystemStorage {
    /// Open (creating if needed) the root directory
    pub fn new(config: FileSystemConfig) -> Result<Arc<Self>> {
        let root = config.root;
        if root.exists() && !root.is_dir() {
            return Err(Error::Config(format!(
                "Storage root {} is not a directory",
                root.display()
            )));
        }
        fs::create_dir_all(&root).map_err(|e| {
            Error::Config(format!(
                "Failed to create storage root {}: {}",
                root.display(),
                e
            ))
        })?;

        info!(root = %root.display(), "filesystem storage ready");
        Ok(Arc::new_cyclic(|me| FileSystemStorage {
            root,
            public_base_url: config.public_base_url,
            normalizer: KeyNormalizer::unscoped(),
            me: me.clone(),
        }))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn handle(&self) -> BackendHandle {
        let me: Weak<dyn Storage> = self.me.clone();
        BackendHandle::new(me)
    }

    /// Location and canonical key for an object path
    fn resolve(&self, path: &str) -> Result<(PathBuf, String)> {
        let (location, key) = self.resolve_prefix(path)?;
        if key.is_empty() {
            return Err(Error::InvalidKey(format!("{:?} names no object", path)));
        }
        Ok((location, key))
    }

    /// Like `resolve`, but the empty key (the root itself) is allowed
    fn resolve_prefix(&self, path: &str) -> Result<(PathBuf, String)> {
        let normalized = self.normalizer.normalize(path);
        let mut location = self.root.clone();
        let mut segments = Vec::new();
        for segment in normalized.split('/') {
            match segment {
                "" => continue,
                "." | ".." => {
                    return Err(Error::InvalidKey(format!(
                        "{:?} leaves the storage root",
                        path
                    )))
                }
                segment => {
                    location.push(segment);
                    segments.push(segment);
                }
            }
        }
        Ok((location, segments.join("/")))
    }

    /// Key of a file below the root
    fn relative_key(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn object_for(&self, key: String, metadata: &Metadata) -> Object {
        Object::new(key, self.handle())
            .with_last_modified(metadata.modified().ok())
            .with_dir(metadata.is_dir())
    }

    /// Every entry below `dir`, directories included
    fn walk_dir(&self, dir: &Path) -> io::Result<Vec<(PathBuf, Metadata)>> {
        let mut entries = Vec::new();
        let mut dirs = VecDeque::new();
        dirs.push_back(dir.to_path_buf());
        while let Some(current) = dirs.pop_front() {
            let read_dir = match fs::read_dir(&current) {
                Ok(read_dir) => read_dir,
                // removed while walking
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err),
            };
            for entry in read_dir {
                let entry = entry?;
                let path = entry.path();
                let metadata = entry.metadata()?;
                if metadata.is_dir() {
                    dirs.push_back(path.clone());
                }
                entries.push((path, metadata));
            }
        }
        Ok(entries)
    }
}

fn not_found(err: io::Error, key: &str) -> Error {
    if err.kind() == io::ErrorKind::NotFound {
        Error::NotFound(key.to_string())
    } else {
        Error::Io(err)
    }
}

impl Storage for FileSystemStorage {
    fn name(&self) -> &str {
        "filesystem"
    }

    fn store(&self, path: &str, content: &mut dyn Read) -> Result<Object> {
        let (target, key) = self.resolve(path)?;
        if target.is_dir() {
            return Err(Error::InvalidKey(format!("{} is a directory", key)));
        }
        let parent = target.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent)?;

        // write beside the target, then rename over it
        let mut staged = NamedTempFile::new_in(parent)?;
        io::copy(content, staged.as_file_mut())?;
        staged.persist(&target).map_err(|e| Error::Io(e.error))?;

        let metadata = fs::metadata(&target)?;
        debug!(backend = "filesystem", key = %key, size = metadata.len(), "stored object");
        Ok(self.object_for(key, &metadata))
    }

    fn retrieve(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let (target, key) = self.resolve(path)?;
        let metadata = fs::metadata(&target).map_err(|e| not_found(e, &key))?;
        if metadata.is_dir() {
            return Err(Error::NotFound(key));
        }
        let file = File::open(&target).map_err(|e| not_found(e, &key))?;
        debug!(backend = "filesystem", key = %key, "retrieving object");
        Ok(Box::new(file))
    }

    fn delete(&self, path: &str) -> Result<()> {
        let (target, key) = self.resolve(path)?;
        let result = match fs::symlink_metadata(&target) {
            Ok(metadata) if metadata.is_dir() => fs::remove_dir(&target),
            Ok(_) => fs::remove_file(&target),
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => {
                debug!(backend = "filesystem", key = %key, "deleted object");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::Io(err)),
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<Object>> {
        let (base, _) = self.resolve_prefix(prefix)?;
        match fs::metadata(&base) {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => return Ok(Vec::new()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(Error::Io(err)),
        }

        let mut objects: Vec<Object> = self
            .walk_dir(&base)?
            .into_iter()
            .map(|(path, metadata)| self.object_for(self.relative_key(&path), &metadata))
            .collect();
        objects.sort_by(|a, b| a.path.cmp(&b.path));

        debug!(backend = "filesystem", prefix, count = objects.len(), "listed objects");
        Ok(objects)
    }

    fn public_url(&self, path: &str) -> Result<String> {
        let (_, key) = self.resolve(path)?;
        match self.public_base_url.as_deref() {
            Some(base) => Ok(format!(
                "{}/{}",
                base.trim_end_matches('/'),
                key::encode_path(&key)
            )),
            // bare paths are never percent-decoded, so they stay unencoded
            None => Ok(format!("/{}", key)),
        }
    }

    fn copy(&self, from: &str, to: &str) -> Result<()> {
        let (source, from_key) = self.resolve(from)?;
        let (target, to_key) = self.resolve(to)?;
        let metadata = fs::metadata(&source).map_err(|e| not_found(e, &from_key))?;
        if metadata.is_dir() {
            return Err(Error::NotFound(from_key));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&source, &target).map_err(|e| not_found(e, &from_key))?;
        debug!(backend = "filesystem", from = %from_key, to = %to_key, "copied object");
        Ok(())
    }

    fn endpoint(&self) -> String {
        self.public_base_url
            .clone()
            .unwrap_or_else(|| "/".to_string())
    }
}
