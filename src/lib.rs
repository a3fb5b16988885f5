//! # omnistore
//!
//! One storage contract over object-storage buckets and the local
//! filesystem.
//!
//! Callers store, retrieve, list and delete named byte blobs through the
//! [`Storage`] trait without depending on a provider's API shape. Paths may
//! be bare keys, slash-prefixed keys or the full URL an object is served
//! from; every backend reduces them to the same canonical key.
//!
//! ## Core Concepts
//!
//! - **Storage**: the operation set every backend implements
//! - **Object**: a descriptor of a stored blob that can fetch its content
//!   back from the backend that produced it
//! - **Key normalization**: caller paths and URLs → canonical keys
//! - **Retries**: each wire request is retried with exponential backoff
//!
//! ## Example
//!
//! ```ignore
//! use omnistore::{FileSystemConfig, FileSystemStorage, StorageExt};
//!
//! let storage = FileSystemStorage::new(FileSystemConfig::new("/var/lib/assets"))?;
//! let object = storage.store_bytes("/avatars/42.png", &png)?;
//! assert_eq!(object.path, "avatars/42.png");
//! let content = object.retrieve()?;
//! ```

pub mod config;
pub mod key;
pub mod model;
pub mod retry;
pub mod storage;

mod error;

pub use config::{
    Acl, BucketConfig, Credentials, FileSystemConfig, RegionTable, RetryConfig, StorageConfig,
};
pub use error::{Error, Result};
pub use key::{normalize_key, AddressingStyle, KeyNormalizer};
pub use model::{BackendHandle, Object};
pub use retry::{retry, retry_if, RetryPolicy};
pub use storage::{
    BucketClient, BucketStorage, FileSystemStorage, ListEntry, ListPage, MemoryClient, PutOptions,
    Storage, StorageExt, DEFAULT_URL_EXPIRY,
};
