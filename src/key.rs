//! Key normalization
//!
//! Callers may address an object by its bare key (`folder/file.txt`), by a
//! slash-prefixed path (`/folder/file.txt`) or by the full URL the object is
//! served from. Every backend turns those into one canonical key before
//! talking to its storage. Canonical keys never start with a slash.
//!
//! Normalization never fails: input that looks like a URL but cannot be
//! parsed falls back to plain slash stripping.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Optional http(s) scheme, `//`, then a dotted (or `host:port`) authority and a slash
static URL_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https?:)?//(?:[\w-]+[.:])+[\w-]+/").expect("static regex is valid")
});

/// Where the bucket name appears in an object URL
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressingStyle {
    /// `https://bucket.endpoint/key`
    #[default]
    VirtualHosted,
    /// `https://endpoint/bucket/key`
    PathStyle,
}

/// Turns caller-supplied paths into canonical keys for one bucket
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyNormalizer {
    style: AddressingStyle,
    bucket: String,
}

impl KeyNormalizer {
    pub fn new(style: AddressingStyle, bucket: impl Into<String>) -> Self {
        KeyNormalizer {
            style,
            bucket: bucket.into(),
        }
    }

    /// A normalizer with no bucket segment to strip (filesystem backends)
    pub fn unscoped() -> Self {
        KeyNormalizer::new(AddressingStyle::VirtualHosted, "")
    }

    pub fn style(&self) -> AddressingStyle {
        self.style
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Canonical key for `input`
    pub fn normalize(&self, input: &str) -> String {
        normalize_key(input, self.style, &self.bucket)
    }
}

/// Whether `input` should be parsed as a URL rather than taken as a key
pub fn is_url_shaped(input: &str) -> bool {
    URL_SHAPE.is_match(input)
}

/// Canonical key for `input` given the backend's addressing style and bucket
pub fn normalize_key(input: &str, style: AddressingStyle, bucket: &str) -> String {
    if is_url_shaped(input) {
        if let Some(path) = url_path(input) {
            let path = match style {
                AddressingStyle::PathStyle => strip_bucket_segment(&path, bucket),
                AddressingStyle::VirtualHosted => &path,
            };
            return strip_one_slash(path).to_string();
        }
    }

    let path = match style {
        AddressingStyle::PathStyle if !bucket.is_empty() => input
            .strip_prefix('/')
            .and_then(|rest| rest.strip_prefix(bucket))
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(input),
        _ => input,
    };
    strip_one_slash(path).to_string()
}

/// Prefix handed to a backend listing: non-empty prefixes name a directory
pub fn list_prefix(key: &str) -> String {
    let trimmed = key.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

/// Last segment of a key
pub fn base_name(key: &str) -> &str {
    let key = key.trim_end_matches('/');
    key.rsplit('/').next().unwrap_or(key)
}

/// Extension of the key's last segment, without the dot
pub fn extension(key: &str) -> Option<&str> {
    let name = base_name(key);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}

/// Percent-encode each segment of a key for use in a URL path
pub fn encode_path(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Percent-decoded path component of a URL-shaped input
fn url_path(input: &str) -> Option<String> {
    let parsed = if input.starts_with("//") {
        Url::parse(&format!("https:{}", input))
    } else {
        Url::parse(input)
    };
    let url = parsed.ok()?;
    let raw = url.path();
    let decoded = urlencoding::decode(raw)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    Some(decoded)
}

/// Drop a leading `/bucket` path segment; partial segment matches are kept
fn strip_bucket_segment<'a>(path: &'a str, bucket: &str) -> &'a str {
    if bucket.is_empty() {
        return path;
    }
    match path.strip_prefix('/').and_then(|rest| rest.strip_prefix(bucket)) {
        Some("") => "",
        Some(rest) if rest.starts_with('/') => rest,
        _ => path,
    }
}

fn strip_one_slash(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}
