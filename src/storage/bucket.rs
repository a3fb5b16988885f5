//! Bucket adapter
//!
//! [`BucketStorage`] implements the whole storage contract for bucket-style
//! object stores. A provider only supplies a [`BucketClient`]: one method per
//! wire request, with its own authentication and signing. The adapter adds
//! key normalization, per-request retries, pagination, batch chunking and
//! URL construction on top.

use super::{Storage, DEFAULT_URL_EXPIRY};
use crate::config::{Acl, BucketConfig, Credentials, RegionTable};
use crate::key::{self, AddressingStyle, KeyNormalizer};
use crate::model::{BackendHandle, Object};
use crate::retry::RetryPolicy;
use crate::{Error, Result};
use bytes::Bytes;
use std::collections::HashSet;
use std::io::Read;
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

/// Most keys a single batch delete request may carry
pub const MAX_BATCH_DELETE: usize = 1000;

/// Request metadata for an upload
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: Option<String>,
    pub acl: Acl,
    pub cache_control: Option<String>,
}

/// One listed key
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListEntry {
    pub key: String,
    pub last_modified: Option<SystemTime>,
    pub size: u64,
}

/// One page of a listing
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListPage {
    pub entries: Vec<ListEntry>,
    /// Token for the next page; `None` on the last page
    pub next_token: Option<String>,
}

/// Provider wire calls, one request each
///
/// Implementations report failures with the crate's error classes so the
/// adapter knows what to retry: [`Error::Transient`] for network and 5xx
/// failures, [`Error::NotFound`] for missing keys, [`Error::Unauthorized`]
/// for denied requests.
pub trait BucketClient: Send + Sync {
    /// Short provider identifier, used in logs
    fn name(&self) -> &str;

    fn get_object(&self, bucket: &str, key: &str) -> Result<Box<dyn Read + Send>>;

    fn put_object(&self, bucket: &str, key: &str, body: Bytes, options: &PutOptions) -> Result<()>;

    fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// Delete up to [`MAX_BATCH_DELETE`] keys in one request
    fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()>;

    /// Keys starting with `prefix`, at most `max_keys` of them
    fn list_objects_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<&str>,
        max_keys: usize,
    ) -> Result<ListPage>;

    fn copy_object(&self, bucket: &str, from_key: &str, to_key: &str) -> Result<()>;

    /// Time-limited GET URL for a private object
    fn presign_get(&self, bucket: &str, key: &str, expires_in: Duration) -> Result<String>;
}

/// Where the service lives, split into scheme and host
#[derive(Clone, Debug, PartialEq, Eq)]
struct ServiceEndpoint {
    scheme: String,
    host: String,
}

impl ServiceEndpoint {
    fn parse(endpoint: &str) -> Result<Self> {
        let (scheme, rest) = match endpoint.split_once("://") {
            Some((scheme, rest)) => (scheme.to_ascii_lowercase(), rest),
            None => ("https".to_string(), endpoint),
        };
        if scheme != "http" && scheme != "https" {
            return Err(Error::Config(format!(
                "Unsupported endpoint scheme {:?} in {}",
                scheme, endpoint
            )));
        }
        let host = rest.trim_end_matches('/');
        if host.is_empty() || host.contains('/') {
            return Err(Error::Config(format!("Invalid endpoint {:?}", endpoint)));
        }
        Ok(ServiceEndpoint {
            scheme,
            host: host.to_string(),
        })
    }
}

/// Storage over one bucket of an object store
pub struct BucketStorage<C: BucketClient> {
    client: C,
    bucket: String,
    endpoint: ServiceEndpoint,
    public_endpoint: Option<ServiceEndpoint>,
    acl: Acl,
    cache_control: Option<String>,
    page_size: usize,
    normalizer: KeyNormalizer,
    retry: RetryPolicy,
    me: Weak<BucketStorage<C>>,
}

impl<C: BucketClient + 'static> BucketStorage<C> {
    /// Build a backend whose endpoint is given in the config
    pub fn new(config: BucketConfig, client: C) -> Result<Arc<Self>> {
        Self::with_regions(config, &RegionTable::new(), client)
    }

    /// Build a backend, resolving the config's region through `regions`
    ///
    /// Every setting is checked here; a bad config never reaches a request.
    pub fn with_regions(config: BucketConfig, regions: &RegionTable, client: C) -> Result<Arc<Self>> {
        validate_bucket_name(&config.bucket)?;
        if let Some(credentials) = &config.credentials {
            validate_credentials(credentials)?;
        }
        if config.page_size == 0 {
            return Err(Error::Config("page_size must be at least 1".into()));
        }

        let region_endpoint = match config.region.as_deref() {
            Some(region) if !regions.is_empty() => match regions.endpoint(region) {
                Some(endpoint) => Some(endpoint),
                None => {
                    return Err(Error::Config(format!(
                        "Region {} is invalid, expected one of: {}",
                        region,
                        regions.names().collect::<Vec<_>>().join(", ")
                    )))
                }
            },
            _ => None,
        };
        // bare host, optionally with a scheme
        let public_endpoint = config
            .public_endpoint
            .as_deref()
            .map(ServiceEndpoint::parse)
            .transpose()?;
        let endpoint = match (config.endpoint.as_deref(), region_endpoint) {
            (Some(endpoint), _) => ServiceEndpoint::parse(endpoint)?,
            (None, Some(endpoint)) => ServiceEndpoint::parse(endpoint)?,
            (None, None) => {
                return Err(Error::Config(format!(
                    "Bucket {} needs an endpoint or a known region",
                    config.bucket
                )))
            }
        };

        info!(
            backend = client.name(),
            bucket = %config.bucket,
            host = %endpoint.host,
            "bucket storage ready"
        );
        let normalizer = KeyNormalizer::new(config.addressing, config.bucket.clone());
        let retry = RetryPolicy::from(&config.retry);
        Ok(Arc::new_cyclic(|me| BucketStorage {
            client,
            bucket: config.bucket,
            endpoint,
            public_endpoint,
            acl: config.acl,
            cache_control: config.cache_control,
            page_size: config.page_size,
            normalizer,
            retry,
            me: me.clone(),
        }))
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Canonical key for a caller path
    pub fn key(&self, path: &str) -> String {
        self.normalizer.normalize(path)
    }

    fn handle(&self) -> BackendHandle {
        let me: Weak<dyn Storage> = self.me.clone();
        BackendHandle::new(me)
    }

    fn non_empty_key(&self, path: &str) -> Result<String> {
        let key = self.key(path);
        if key.is_empty() {
            return Err(Error::InvalidKey(format!("{:?} names no object", path)));
        }
        // "//a" keeps one slash after normalizing
        if key.starts_with('/') {
            return Err(Error::InvalidKey(format!("{:?} has extra leading slashes", path)));
        }
        Ok(key)
    }

    /// URL of the object on the service itself, unsigned
    fn direct_url(&self, key: &str) -> String {
        let encoded = key::encode_path(key);
        match self.normalizer.style() {
            AddressingStyle::PathStyle => format!(
                "{}://{}/{}/{}",
                self.endpoint.scheme, self.endpoint.host, self.bucket, encoded
            ),
            AddressingStyle::VirtualHosted => format!(
                "{}://{}.{}/{}",
                self.endpoint.scheme, self.bucket, self.endpoint.host, encoded
            ),
        }
    }

    /// Accumulate pages until the backend stops returning a token
    fn list_pages(&self, prefix: &str, objects: &mut Vec<Object>) -> Result<()> {
        let mut token: Option<String> = None;
        let mut seen = HashSet::new();
        loop {
            let page = self.retry.run("list", || {
                self.client
                    .list_objects_page(&self.bucket, prefix, token.as_deref(), self.page_size)
            })?;

            objects.extend(page.entries.into_iter().map(|entry| {
                Object::new(entry.key, self.handle()).with_last_modified(entry.last_modified)
            }));

            match page.next_token {
                Some(next) if !next.is_empty() => {
                    if !seen.insert(next.clone()) {
                        return Err(Error::Backend(format!(
                            "listing {} repeated continuation token {}",
                            self.bucket, next
                        )));
                    }
                    token = Some(next);
                }
                _ => return Ok(()),
            }
        }
    }
}

fn validate_bucket_name(bucket: &str) -> Result<()> {
    if bucket.is_empty() {
        return Err(Error::Config("Bucket name must not be empty".into()));
    }
    if bucket.contains('/') || bucket.chars().any(char::is_whitespace) {
        return Err(Error::Config(format!("Invalid bucket name {:?}", bucket)));
    }
    Ok(())
}

fn validate_credentials(credentials: &Credentials) -> Result<()> {
    if credentials.access_id.is_empty() || credentials.access_key.is_empty() {
        return Err(Error::Config(
            "Credentials need both access_id and access_key".into(),
        ));
    }
    Ok(())
}

/// MIME type for a key, judged by its extension
pub fn content_type_for(key: &str) -> &'static str {
    let ext = key::extension(key).map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("txt") => "text/plain; charset=utf-8",
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("csv") => "text/csv; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz") => "application/gzip",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        Some("mp3") => "audio/mpeg",
        _ => "application/octet-stream",
    }
}

impl<C: BucketClient + 'static> Storage for BucketStorage<C> {
    fn name(&self) -> &str {
        self.client.name()
    }

    fn store(&self, path: &str, content: &mut dyn Read) -> Result<Object> {
        let key = self.non_empty_key(path)?;
        let mut buffer = Vec::new();
        content.read_to_end(&mut buffer)?;
        let body = Bytes::from(buffer);

        let options = PutOptions {
            content_type: Some(content_type_for(&key).to_string()),
            acl: self.acl,
            cache_control: self.cache_control.clone(),
        };
        // Bytes clones share the buffer
        self.retry.run("put", || {
            self.client
                .put_object(&self.bucket, &key, body.clone(), &options)
        })?;

        debug!(backend = self.name(), key = %key, size = body.len(), "stored object");
        Ok(Object::new(key, self.handle()).with_last_modified(Some(SystemTime::now())))
    }

    fn retrieve(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let key = self.non_empty_key(path)?;
        let reader = self
            .retry
            .run("get", || self.client.get_object(&self.bucket, &key))?;
        debug!(backend = self.name(), key = %key, "retrieving object");
        Ok(reader)
    }

    fn delete(&self, path: &str) -> Result<()> {
        let key = self.non_empty_key(path)?;
        match self
            .retry
            .run("delete", || self.client.delete_object(&self.bucket, &key))
        {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }
        debug!(backend = self.name(), key = %key, "deleted object");
        Ok(())
    }

    fn delete_many(&self, paths: &[&str]) -> Result<()> {
        let keys = paths
            .iter()
            .map(|path| self.non_empty_key(path))
            .collect::<Result<Vec<_>>>()?;

        for chunk in keys.chunks(MAX_BATCH_DELETE) {
            self.retry.run("delete-batch", || {
                self.client.delete_objects(&self.bucket, chunk)
            })?;
        }
        debug!(backend = self.name(), count = keys.len(), "deleted objects");
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<Object>> {
        let prefix = key::list_prefix(&self.key(prefix));
        let mut objects = Vec::new();
        match self.list_pages(&prefix, &mut objects) {
            Ok(()) => {
                debug!(backend = self.name(), prefix = %prefix, count = objects.len(), "listed objects");
                Ok(objects)
            }
            Err(err) => Err(Error::PartialList {
                objects,
                source: Box::new(err),
            }),
        }
    }

    fn public_url(&self, path: &str) -> Result<String> {
        let key = self.non_empty_key(path)?;
        if let Some(public) = &self.public_endpoint {
            return Ok(format!(
                "{}://{}/{}",
                public.scheme,
                public.host,
                key::encode_path(&key)
            ));
        }
        if self.acl.requires_signed_urls() {
            return self.retry.run("presign", || {
                self.client
                    .presign_get(&self.bucket, &key, DEFAULT_URL_EXPIRY)
            });
        }
        Ok(self.direct_url(&key))
    }

    fn copy(&self, from: &str, to: &str) -> Result<()> {
        let from_key = self.non_empty_key(from)?;
        let to_key = self.non_empty_key(to)?;
        self.retry.run("copy", || {
            self.client.copy_object(&self.bucket, &from_key, &to_key)
        })?;
        debug!(backend = self.name(), from = %from_key, to = %to_key, "copied object");
        Ok(())
    }

    fn endpoint(&self) -> String {
        if let Some(public) = &self.public_endpoint {
            return public.host.clone();
        }
        match self.normalizer.style() {
            AddressingStyle::PathStyle => format!("{}/{}", self.endpoint.host, self.bucket),
            AddressingStyle::VirtualHosted => format!("{}.{}", self.bucket, self.endpoint.host),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::storage::{Fault, MemoryClient, RequestKind, StorageExt};

    fn config(style: AddressingStyle) -> BucketConfig {
        BucketConfig::new("assets")
            .with_endpoint("https://storage.example.com")
            .with_addressing(style)
            .with_retry(RetryConfig {
                max_retries: 3,
                backoff_ms: 1,
            })
    }

    fn bucket(style: AddressingStyle) -> Arc<BucketStorage<MemoryClient>> {
        BucketStorage::new(config(style), MemoryClient::new("assets")).unwrap()
    }

    #[test]
    fn test_store_normalizes_url_paths() {
        let storage = bucket(AddressingStyle::PathStyle);

        let object = storage
            .store_bytes("https://storage.example.com/assets/img/a.png", b"png")
            .unwrap();
        assert_eq!(object.path, "img/a.png");
        assert_eq!(object.name, "a.png");
        assert!(object.last_modified.is_some());
        assert_eq!(storage.retrieve_bytes("/img/a.png").unwrap(), b"png");
    }

    #[test]
    fn test_store_sets_content_type_and_acl() {
        let storage = BucketStorage::new(
            config(AddressingStyle::VirtualHosted).with_acl(Acl::Private),
            MemoryClient::new("assets"),
        )
        .unwrap();
        storage.store_bytes("doc.pdf", b"%PDF").unwrap();

        let options = storage.client().put_options("doc.pdf").unwrap();
        assert_eq!(options.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(options.acl, Acl::Private);
    }

    #[test]
    fn test_store_retries_transient_failures() {
        let storage = bucket(AddressingStyle::VirtualHosted);
        storage.client().fail_next(2, Fault::Transient);

        storage.store_bytes("a.txt", b"a").unwrap();
        assert_eq!(storage.client().request_count(RequestKind::Put), 3);
        assert_eq!(storage.retrieve_bytes("a.txt").unwrap(), b"a");
    }

    #[test]
    fn test_store_gives_up_after_bound() {
        let storage = bucket(AddressingStyle::VirtualHosted);
        storage.client().fail_next(10, Fault::Transient);

        let result = storage.store_bytes("a.txt", b"a");
        assert!(matches!(result, Err(Error::Transient(_))));
        assert_eq!(storage.client().request_count(RequestKind::Put), 4);
    }

    #[test]
    fn test_unauthorized_is_not_retried() {
        let storage = bucket(AddressingStyle::VirtualHosted);
        storage.client().fail_next(1, Fault::Unauthorized);

        assert!(matches!(storage.retrieve("a.txt"), Err(Error::Unauthorized(_))));
        assert_eq!(storage.client().request_count(RequestKind::Get), 1);
    }

    #[test]
    fn test_retrieve_missing_is_not_found() {
        let storage = bucket(AddressingStyle::VirtualHosted);
        assert!(matches!(storage.retrieve("nope"), Err(Error::NotFound(_))));
        assert_eq!(storage.client().request_count(RequestKind::Get), 1);
    }

    #[test]
    fn test_list_follows_pages() {
        let storage = BucketStorage::new(
            config(AddressingStyle::VirtualHosted).with_page_size(3),
            MemoryClient::new("assets"),
        )
        .unwrap();
        for i in 0..10 {
            storage.store_bytes(&format!("logs/{:02}.log", i), b"x").unwrap();
        }
        storage.store_bytes("logs-old/a.log", b"x").unwrap();

        let objects = storage.list("logs").unwrap();
        let mut paths: Vec<_> = objects.iter().map(|o| o.path.clone()).collect();
        assert_eq!(paths.len(), 10);
        paths.dedup();
        assert_eq!(paths.len(), 10);
        assert!(paths.iter().all(|p| p.starts_with("logs/")));
        assert_eq!(storage.client().request_count(RequestKind::ListPage), 4);
    }

    #[test]
    fn test_list_failure_keeps_accumulated_pages() {
        let storage = BucketStorage::new(
            config(AddressingStyle::VirtualHosted)
                .with_page_size(2)
                .with_retry(RetryConfig {
                    max_retries: 1,
                    backoff_ms: 1,
                }),
            MemoryClient::new("assets"),
        )
        .unwrap();
        for name in ["d/a", "d/b", "d/c", "d/e"] {
            storage.store_bytes(name, b"x").unwrap();
        }
        storage
            .client()
            .fail_after(RequestKind::ListPage, 1, 2, Fault::Transient);

        match storage.list("d") {
            Err(Error::PartialList { objects, source }) => {
                let paths: Vec<_> = objects.iter().map(|o| o.path.as_str()).collect();
                assert_eq!(paths, vec!["d/a", "d/b"]);
                assert!(source.is_transient());
            }
            other => panic!("expected partial list, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_missing_succeeds() {
        let storage = bucket(AddressingStyle::VirtualHosted);
        storage.delete("never-stored.txt").unwrap();
    }

    #[test]
    fn test_delete_many_chunks_requests() {
        let storage = bucket(AddressingStyle::VirtualHosted);
        let names: Vec<String> = (0..(MAX_BATCH_DELETE + 5))
            .map(|i| format!("bulk/{}", i))
            .collect();
        for name in &names {
            storage.store_bytes(name, b"").unwrap();
        }

        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        storage.delete_many(&refs).unwrap();

        assert_eq!(storage.client().request_count(RequestKind::DeleteBatch), 2);
        assert!(storage.list("bulk").unwrap().is_empty());
    }

    #[test]
    fn test_copy() {
        let storage = bucket(AddressingStyle::VirtualHosted);
        storage.store_bytes("a/src.txt", b"payload").unwrap();

        storage.copy("/a/src.txt", "b/dst.txt").unwrap();
        assert_eq!(storage.retrieve_bytes("b/dst.txt").unwrap(), b"payload");
        assert!(matches!(storage.copy("missing", "x"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_direct_urls_round_trip() {
        let path_style = bucket(AddressingStyle::PathStyle);
        let url = path_style.public_url("my docs/a.txt").unwrap();
        assert_eq!(url, "https://storage.example.com/assets/my%20docs/a.txt");
        assert_eq!(path_style.key(&url), "my docs/a.txt");
        assert_eq!(path_style.endpoint(), "storage.example.com/assets");

        let virtual_hosted = bucket(AddressingStyle::VirtualHosted);
        let url = virtual_hosted.public_url("a.txt").unwrap();
        assert_eq!(url, "https://assets.storage.example.com/a.txt");
        assert_eq!(virtual_hosted.key(&url), "a.txt");
        assert_eq!(virtual_hosted.endpoint(), "assets.storage.example.com");
    }

    #[test]
    fn test_private_acl_signs_urls() {
        let storage = BucketStorage::new(
            config(AddressingStyle::PathStyle).with_acl(Acl::Private),
            MemoryClient::new("assets"),
        )
        .unwrap();

        let url = storage.public_url("secret/report.pdf").unwrap();
        assert!(url.contains("signature="));
        assert!(storage.client().verify_presigned(&url));
        assert_eq!(storage.key(&url), "secret/report.pdf");
        assert_eq!(storage.client().request_count(RequestKind::Presign), 1);
    }

    #[test]
    fn test_public_endpoint_overrides_urls() {
        let storage = BucketStorage::new(
            config(AddressingStyle::VirtualHosted)
                .with_acl(Acl::Private)
                .with_public_endpoint("cdn.example.com"),
            MemoryClient::new("assets"),
        )
        .unwrap();

        assert_eq!(
            storage.public_url("/a/b.png").unwrap(),
            "https://cdn.example.com/a/b.png"
        );
        assert_eq!(storage.endpoint(), "cdn.example.com");
        assert_eq!(storage.client().request_count(RequestKind::Presign), 0);
    }

    #[test]
    fn test_extra_leading_slashes_rejected() {
        let storage = bucket(AddressingStyle::VirtualHosted);

        let result = storage.store_bytes("//a.txt", b"data");
        assert!(matches!(result, Err(Error::InvalidKey(_))));
        assert!(storage.client().is_empty());
        assert_eq!(storage.client().request_count(RequestKind::Put), 0);

        // every object that is handed out addresses itself again
        let object = storage.store_bytes("/a.txt", b"data").unwrap();
        assert_eq!(object.path, "a.txt");
        assert_eq!(storage.retrieve_bytes(&object.path).unwrap(), b"data");
        let listed: Vec<_> = storage.list("").unwrap().into_iter().map(|o| o.path).collect();
        assert_eq!(listed, vec!["a.txt".to_string()]);
    }

    /// Client whose listing hands back tokens in a cycle
    struct CyclingClient {
        tokens: Vec<&'static str>,
    }

    impl BucketClient for CyclingClient {
        fn name(&self) -> &str {
            "cycling"
        }

        fn get_object(&self, _bucket: &str, key: &str) -> Result<Box<dyn Read + Send>> {
            Err(Error::NotFound(key.to_string()))
        }

        fn put_object(&self, _: &str, _: &str, _: Bytes, _: &PutOptions) -> Result<()> {
            Ok(())
        }

        fn delete_object(&self, _bucket: &str, _key: &str) -> Result<()> {
            Ok(())
        }

        fn delete_objects(&self, _bucket: &str, _keys: &[String]) -> Result<()> {
            Ok(())
        }

        fn list_objects_page(
            &self,
            _bucket: &str,
            prefix: &str,
            continuation: Option<&str>,
            _max_keys: usize,
        ) -> Result<ListPage> {
            let position = continuation
                .and_then(|token| self.tokens.iter().position(|t| *t == token))
                .map_or(0, |i| i + 1);
            let next = self.tokens[position % self.tokens.len()];
            Ok(ListPage {
                entries: vec![ListEntry {
                    key: format!("{}{}", prefix, position),
                    last_modified: None,
                    size: 0,
                }],
                next_token: Some(next.to_string()),
            })
        }

        fn copy_object(&self, _bucket: &str, _from: &str, _to: &str) -> Result<()> {
            Ok(())
        }

        fn presign_get(&self, _bucket: &str, key: &str, _expires_in: Duration) -> Result<String> {
            Ok(format!("https://cycling.local/{}", key))
        }
    }

    #[test]
    fn test_list_aborts_on_token_cycle() {
        let storage = BucketStorage::new(
            config(AddressingStyle::VirtualHosted),
            CyclingClient {
                tokens: vec!["A", "B"],
            },
        )
        .unwrap();

        match storage.list("logs") {
            Err(Error::PartialList { objects, source }) => {
                // pages for: start, A, B; the next token (A again) stops the loop
                assert_eq!(objects.len(), 3);
                assert!(matches!(*source, Error::Backend(_)));
            }
            _ => panic!("expected partial list"),
        }
    }

    #[test]
    fn test_public_endpoint_with_path_rejected() {
        let result = BucketStorage::new(
            config(AddressingStyle::VirtualHosted).with_public_endpoint("https://cdn.example.com/static"),
            MemoryClient::new("assets"),
        );
        assert!(matches!(result, Err(Error::Config(_))));

        let storage = BucketStorage::new(
            config(AddressingStyle::VirtualHosted).with_public_endpoint("http://cdn.example.com/"),
            MemoryClient::new("assets"),
        )
        .unwrap();
        let url = storage.public_url("a b.txt").unwrap();
        assert_eq!(url, "http://cdn.example.com/a%20b.txt");
        assert_eq!(storage.key(&url), "a b.txt");
    }

    #[test]
    fn test_empty_key_rejected() {
        let storage = bucket(AddressingStyle::VirtualHosted);
        assert!(matches!(storage.store_bytes("/", b"x"), Err(Error::InvalidKey(_))));
    }

    #[test]
    fn test_construction_errors() {
        let client = || MemoryClient::new("assets");

        let result = BucketStorage::new(BucketConfig::new("").with_endpoint("s3.example.com"), client());
        assert!(matches!(result, Err(Error::Config(_))));

        let result = BucketStorage::new(BucketConfig::new("assets"), client());
        assert!(matches!(result, Err(Error::Config(_))));

        let result = BucketStorage::new(
            BucketConfig::new("assets").with_endpoint("ftp://files.example.com"),
            client(),
        );
        assert!(matches!(result, Err(Error::Config(_))));

        let result = BucketStorage::new(
            BucketConfig::new("assets")
                .with_endpoint("s3.example.com")
                .with_page_size(0),
            client(),
        );
        assert!(matches!(result, Err(Error::Config(_))));

        let mut incomplete = BucketConfig::new("assets").with_endpoint("s3.example.com");
        incomplete.credentials = Some(Credentials {
            access_id: "id".into(),
            access_key: String::new(),
            session_token: None,
        });
        assert!(matches!(
            BucketStorage::new(incomplete, client()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_region_table_resolves_endpoint() {
        let regions: RegionTable = [("huadong", "up-z0.example.com"), ("huabei", "up-z1.example.com")]
            .into_iter()
            .collect();

        let storage = BucketStorage::with_regions(
            BucketConfig::new("assets").with_region("HuaBei"),
            &regions,
            MemoryClient::new("assets"),
        )
        .unwrap();
        assert_eq!(storage.endpoint(), "assets.up-z1.example.com");

        let result = BucketStorage::with_regions(
            BucketConfig::new("assets").with_region("mars"),
            &regions,
            MemoryClient::new("assets"),
        );
        match result {
            Err(Error::Config(message)) => assert!(message.contains("huabei, huadong")),
            _ => panic!("expected config error"),
        }
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("a/b.PNG"), "image/png");
        assert_eq!(content_type_for("notes.txt"), "text/plain; charset=utf-8");
        assert_eq!(content_type_for("blob"), "application/octet-stream");
    }
}
