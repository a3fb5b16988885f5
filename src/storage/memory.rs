//! In-process bucket client
//!
//! [`MemoryClient`] answers [`BucketClient`] requests from a sorted map. Pages
//! can be made small, failures can be injected ahead of time and every
//! request is counted, which makes it the reference client for exercising
//! [`BucketStorage`](super::BucketStorage) without a network.

use super::bucket::{BucketClient, ListEntry, ListPage, PutOptions};
use crate::key::{self, AddressingStyle};
use crate::{Error, Result};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read};
use std::ops::Bound;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use url::Url;

/// Host used in presigned URLs
const PRESIGN_HOST: &str = "memory.local";

/// Request types, for counting and fault targeting
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Get,
    Put,
    Delete,
    DeleteBatch,
    ListPage,
    Copy,
    Presign,
}

/// Failure a request can be made to return
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Like a timeout or a 503
    Transient,
    /// Like a 403
    Unauthorized,
}

impl Fault {
    fn to_error(self, kind: RequestKind) -> Error {
        match self {
            Fault::Transient => Error::Transient(format!("injected failure on {:?}", kind)),
            Fault::Unauthorized => Error::Unauthorized(format!("injected denial on {:?}", kind)),
        }
    }
}

struct StoredObject {
    data: Bytes,
    last_modified: SystemTime,
    options: PutOptions,
}

/// Pending injected failures
struct FaultPlan {
    /// `None` targets every request kind
    kind: Option<RequestKind>,
    /// Matching requests to let through first
    skip: usize,
    remaining: usize,
    fault: Fault,
}

/// A bucket client holding one bucket in memory
pub struct MemoryClient {
    bucket: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    page_limit: Option<usize>,
    signing_key: [u8; 32],
    faults: Mutex<Vec<FaultPlan>>,
    requests: Mutex<HashMap<RequestKind, usize>>,
}

impl MemoryClient {
    /// Serve an empty bucket named `bucket`
    pub fn new(bucket: impl Into<String>) -> Self {
        MemoryClient {
            bucket: bucket.into(),
            objects: RwLock::new(BTreeMap::new()),
            page_limit: None,
            signing_key: *blake3::hash(b"omnistore memory client").as_bytes(),
            faults: Mutex::new(Vec::new()),
            requests: Mutex::new(HashMap::new()),
        }
    }

    /// Cap list pages at `page_size` keys, whatever the caller asks for
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_limit = Some(page_size.max(1));
        self
    }

    pub fn with_signing_key(mut self, signing_key: [u8; 32]) -> Self {
        self.signing_key = signing_key;
        self
    }

    /// Make the next `count` requests of any kind fail
    pub fn fail_next(&self, count: usize, fault: Fault) {
        self.faults.lock().push(FaultPlan {
            kind: None,
            skip: 0,
            remaining: count,
            fault,
        });
    }

    /// Let `skip` requests of `kind` succeed, then fail the following `count`
    pub fn fail_after(&self, kind: RequestKind, skip: usize, count: usize, fault: Fault) {
        self.faults.lock().push(FaultPlan {
            kind: Some(kind),
            skip,
            remaining: count,
            fault,
        });
    }

    /// Requests of `kind` received so far, failed ones included
    pub fn request_count(&self, kind: RequestKind) -> usize {
        self.requests.lock().get(&kind).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// All stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }

    /// Upload metadata recorded for `key`
    pub fn put_options(&self, key: &str) -> Option<PutOptions> {
        self.objects.read().get(key).map(|o| o.options.clone())
    }

    /// Check the signature and expiry of a URL from `presign_get`
    pub fn verify_presigned(&self, url: &str) -> bool {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(_) => return false,
        };
        if parsed.host_str() != Some(PRESIGN_HOST) {
            return false;
        }
        let mut expires = None;
        let mut signature = None;
        for (name, value) in parsed.query_pairs() {
            match name.as_ref() {
                "expires" => expires = value.parse::<u64>().ok(),
                "signature" => signature = blake3::Hash::from_hex(value.as_bytes()).ok(),
                _ => {}
            }
        }
        let (expires, signature) = match (expires, signature) {
            (Some(expires), Some(signature)) => (expires, signature),
            _ => return false,
        };
        if expires < unix_now() {
            return false;
        }
        let key = key::normalize_key(url, AddressingStyle::PathStyle, &self.bucket);
        // blake3::Hash equality is constant time
        self.sign(&self.bucket, &key, expires) == signature
    }

    fn sign(&self, bucket: &str, key: &str, expires: u64) -> blake3::Hash {
        let message = format!("GET\n{}\n{}\n{}", bucket, key, expires);
        blake3::keyed_hash(&self.signing_key, message.as_bytes())
    }

    /// Count the request, apply any injected fault, check the bucket name
    fn begin(&self, kind: RequestKind, bucket: &str) -> Result<()> {
        *self.requests.lock().entry(kind).or_insert(0) += 1;

        let mut faults = self.faults.lock();
        let mut injected = None;
        for plan in faults.iter_mut() {
            if plan.kind.map_or(false, |k| k != kind) {
                continue;
            }
            if plan.skip > 0 {
                plan.skip -= 1;
            } else if plan.remaining > 0 {
                plan.remaining -= 1;
                injected = Some(plan.fault.to_error(kind));
            }
            break;
        }
        faults.retain(|plan| plan.remaining > 0);
        drop(faults);

        if let Some(err) = injected {
            return Err(err);
        }
        if bucket != self.bucket {
            return Err(Error::NotFound(format!("bucket {}", bucket)));
        }
        Ok(())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl BucketClient for MemoryClient {
    fn name(&self) -> &str {
        "memory"
    }

    fn get_object(&self, bucket: &str, key: &str) -> Result<Box<dyn Read + Send>> {
        self.begin(RequestKind::Get, bucket)?;
        let objects = self.objects.read();
        let object = objects
            .get(key)
            .ok_or_else(|| Error::NotFound(key.to_string()))?;
        Ok(Box::new(Cursor::new(object.data.clone())))
    }

    fn put_object(&self, bucket: &str, key: &str, body: Bytes, options: &PutOptions) -> Result<()> {
        self.begin(RequestKind::Put, bucket)?;
        self.objects.write().insert(
            key.to_string(),
            StoredObject {
                data: body,
                last_modified: SystemTime::now(),
                options: options.clone(),
            },
        );
        Ok(())
    }

    fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.begin(RequestKind::Delete, bucket)?;
        match self.objects.write().remove(key) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(key.to_string())),
        }
    }

    fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()> {
        self.begin(RequestKind::DeleteBatch, bucket)?;
        let mut objects = self.objects.write();
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }

    fn list_objects_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<&str>,
        max_keys: usize,
    ) -> Result<ListPage> {
        self.begin(RequestKind::ListPage, bucket)?;
        let limit = match self.page_limit {
            Some(cap) => max_keys.min(cap),
            None => max_keys,
        }
        .max(1);

        let lower = match continuation {
            Some(token) => Bound::Excluded(token.to_string()),
            None => Bound::Included(prefix.to_string()),
        };
        let objects = self.objects.read();
        let mut entries: Vec<ListEntry> = objects
            .range((lower, Bound::Unbounded))
            .skip_while(|(key, _)| key.as_str() < prefix)
            .take_while(|(key, _)| key.starts_with(prefix))
            .take(limit + 1)
            .map(|(key, object)| ListEntry {
                key: key.clone(),
                last_modified: Some(object.last_modified),
                size: object.data.len() as u64,
            })
            .collect();

        let next_token = if entries.len() > limit {
            entries.truncate(limit);
            entries.last().map(|entry| entry.key.clone())
        } else {
            None
        };
        Ok(ListPage {
            entries,
            next_token,
        })
    }

    fn copy_object(&self, bucket: &str, from_key: &str, to_key: &str) -> Result<()> {
        self.begin(RequestKind::Copy, bucket)?;
        let mut objects = self.objects.write();
        let source = objects
            .get(from_key)
            .ok_or_else(|| Error::NotFound(from_key.to_string()))?;
        let copy = StoredObject {
            data: source.data.clone(),
            last_modified: SystemTime::now(),
            options: source.options.clone(),
        };
        objects.insert(to_key.to_string(), copy);
        Ok(())
    }

    fn presign_get(&self, bucket: &str, key: &str, expires_in: Duration) -> Result<String> {
        self.begin(RequestKind::Presign, bucket)?;
        let expires = unix_now().saturating_add(expires_in.as_secs());
        let signature = self.sign(bucket, key, expires);
        Ok(format!(
            "https://{}/{}/{}?expires={}&signature={}",
            PRESIGN_HOST,
            bucket,
            key::encode_path(key),
            expires,
            hex::encode(signature.as_bytes())
        ))
    }
}
