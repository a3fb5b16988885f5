//! Backend configuration records
//!
//! Every backend is built once from one of these records and never changes
//! afterwards. Records are plain serde values so they can live in whatever
//! configuration file the application already has.

use crate::key::AddressingStyle;
use crate::storage::{BucketStorage, FileSystemStorage, MemoryClient, Storage};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default number of keys requested per list page
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Retry settings applied to each wire call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each further one
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_retries: 3,
            backoff_ms: 100,
        }
    }
}

/// Canned access policy applied to stored objects
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Acl {
    Private,
    #[default]
    PublicRead,
    PublicReadWrite,
    AuthenticatedRead,
}

impl Acl {
    /// Whether direct URLs are refused, so public URLs must be signed
    pub fn requires_signed_urls(&self) -> bool {
        matches!(self, Acl::Private | Acl::AuthenticatedRead)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Acl::Private => "private",
            Acl::PublicRead => "public-read",
            Acl::PublicReadWrite => "public-read-write",
            Acl::AuthenticatedRead => "authenticated-read",
        }
    }
}

/// Static access credentials
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub access_id: String,
    pub access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_id", &self.access_id)
            .field("access_key", &"<redacted>")
            .finish()
    }
}

/// Explicit region name → endpoint host mapping, handed to a backend at construction
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionTable {
    regions: BTreeMap<String, String>,
}

impl RegionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a region; names are matched case-insensitively
    pub fn with_region(mut self, name: impl AsRef<str>, endpoint: impl Into<String>) -> Self {
        self.regions
            .insert(name.as_ref().to_ascii_lowercase(), endpoint.into());
        self
    }

    pub fn endpoint(&self, region: &str) -> Option<&str> {
        self.regions
            .get(&region.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }
}

impl<N: AsRef<str>, E: Into<String>> FromIterator<(N, E)> for RegionTable {
    fn from_iter<I: IntoIterator<Item = (N, E)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(RegionTable::new(), |table, (name, endpoint)| {
                table.with_region(name, endpoint)
            })
    }
}

/// Settings for a bucket-backed store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketConfig {
    pub bucket: String,
    #[serde(default)]
    pub region: Option<String>,
    /// Service endpoint, e.g. `s3.amazonaws.com` or `http://localhost:9000`
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Host objects are publicly served from (CDN); overrides URL construction
    #[serde(default)]
    pub public_endpoint: Option<String>,
    #[serde(default)]
    pub addressing: AddressingStyle,
    #[serde(default)]
    pub acl: Acl,
    #[serde(default)]
    pub credentials: Option<Credentials>,
    #[serde(default)]
    pub cache_control: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl BucketConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        BucketConfig {
            bucket: bucket.into(),
            region: None,
            endpoint: None,
            public_endpoint: None,
            addressing: AddressingStyle::default(),
            acl: Acl::default(),
            credentials: None,
            cache_control: None,
            page_size: DEFAULT_PAGE_SIZE,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_addressing(mut self, addressing: AddressingStyle) -> Self {
        self.addressing = addressing;
        self
    }

    pub fn with_acl(mut self, acl: Acl) -> Self {
        self.acl = acl;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_public_endpoint(mut self, public_endpoint: impl Into<String>) -> Self {
        self.public_endpoint = Some(public_endpoint.into());
        self
    }
}

/// Settings for a local filesystem store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemConfig {
    /// Directory all keys resolve under
    pub root: PathBuf,
    /// URL prefix files are publicly served from
    #[serde(default)]
    pub public_base_url: Option<String>,
}

impl FileSystemConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileSystemConfig {
            root: root.into(),
            public_base_url: None,
        }
    }
}

/// Any backend this crate can build on its own
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "kebab-case")]
pub enum StorageConfig {
    #[serde(rename = "filesystem")]
    FileSystem(FileSystemConfig),
    /// Bucket adapter over an in-process [`MemoryClient`]
    Memory(BucketConfig),
}

impl StorageConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a config record from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json_str(&content)
    }

    /// Build the backend this record describes
    pub fn build(&self) -> Result<Arc<dyn Storage>> {
        match self {
            StorageConfig::FileSystem(config) => {
                let storage: Arc<dyn Storage> = FileSystemStorage::new(config.clone())?;
                Ok(storage)
            }
            StorageConfig::Memory(config) => {
                let client = MemoryClient::new(config.bucket.clone());
                let storage: Arc<dyn Storage> = BucketStorage::new(config.clone(), client)?;
                Ok(storage)
            }
        }
    }
}
