//! Path parsing and path/key translation
//!
//! Filesystem paths look like `/bucket/dir/file`. The first component of an
//! absolute path names the bucket; the remaining components, joined with `/`,
//! form the object key. The bucket root maps to the empty key.
//!
//! URIs look like `s3://[access[:secret]@][host]/bucket/key`.

use std::fmt;

use crate::error::{Error, Result};

/// URI scheme handled by this filesystem
pub const SCHEME: &str = "s3";

/// Endpoint host assumed when a URI carries none
pub const DEFAULT_ENDPOINT: &str = "s3.amazonaws.com";

const REDACTED: &str = "***";

/// `uri` with any secret in its user-info replaced, for logs and messages
pub fn redact_uri(uri: &str) -> String {
    let Some((scheme, rest)) = uri.split_once("://") else {
        return uri.to_string();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    let (authority, path) = rest.split_at(authority_end);
    match authority.rfind('@') {
        Some(at) => {
            let (user_info, host) = authority.split_at(at);
            format!("{scheme}://{}{host}{path}", redact_principal(user_info))
        }
        None => uri.to_string(),
    }
}

/// Identity key (`principal@host`) with any secret in the principal replaced
pub fn redact_identity(key: &str) -> String {
    match key.rsplit_once('@') {
        Some((principal, host)) => format!("{}@{host}", redact_principal(principal)),
        None => key.to_string(),
    }
}

fn redact_principal(principal: &str) -> String {
    match principal.split_once(':') {
        Some((access, _)) => format!("{access}:{REDACTED}"),
        None => principal.to_string(),
    }
}

/// A hierarchical path inside an object-store filesystem
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectPath {
    absolute: bool,
    bucket: Option<String>,
    components: Vec<String>,
}

impl ObjectPath {
    /// Parse a path string. A leading `/` makes the path absolute and its
    /// first component the bucket.
    pub fn parse(path: &str) -> Self {
        let absolute = path.starts_with('/');
        let mut parts = path
            .split('/')
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        let bucket = if absolute { parts.next() } else { None };

        Self {
            absolute,
            bucket,
            components: parts.collect(),
        }
    }

    /// Build an absolute path from a bucket and an object key
    pub fn from_key(bucket: impl Into<String>, key: &str) -> Self {
        Self {
            absolute: true,
            bucket: Some(bucket.into()),
            components: key
                .split('/')
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    /// Bucket name, or an error for paths that do not name one
    pub fn require_bucket(&self) -> Result<&str> {
        self.bucket
            .as_deref()
            .ok_or_else(|| Error::InvalidPath(format!("path has no bucket: {self}")))
    }

    /// Object key: non-empty components joined with `/`
    pub fn key(&self) -> String {
        self.components.join("/")
    }

    /// Key of the zero-length object materializing this path as a directory
    pub fn marker_key(&self) -> String {
        if self.components.is_empty() {
            String::new()
        } else {
            format!("{}/", self.key())
        }
    }

    /// True for `/bucket` (and `/bucket/`)
    pub fn is_bucket_root(&self) -> bool {
        self.absolute && self.bucket.is_some() && self.components.is_empty()
    }

    /// Last name component; the bucket name for a bucket root
    pub fn file_name(&self) -> Option<&str> {
        self.components
            .last()
            .map(String::as_str)
            .or(self.bucket.as_deref())
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn parent(&self) -> Option<Self> {
        if !self.components.is_empty() {
            let mut parent = self.clone();
            parent.components.pop();
            return Some(parent);
        }
        if self.bucket.is_some() {
            return Some(Self {
                absolute: true,
                bucket: None,
                components: Vec::new(),
            });
        }
        None
    }

    /// Append a relative name (may contain `/`)
    pub fn join(&self, name: &str) -> Self {
        let mut joined = self.clone();
        let mut parts = name.split('/').filter(|p| !p.is_empty());
        if joined.absolute && joined.bucket.is_none() {
            joined.bucket = parts.next().map(str::to_string);
        }
        joined.components.extend(parts.map(str::to_string));
        joined
    }

    /// Resolve `other` against this path; absolute paths win
    pub fn resolve(&self, other: &ObjectPath) -> Self {
        if other.absolute {
            return other.clone();
        }
        let mut resolved = self.clone();
        if resolved.absolute && resolved.bucket.is_none() {
            let mut parts = other.components.iter();
            resolved.bucket = parts.next().cloned();
            resolved.components.extend(parts.cloned());
        } else {
            resolved.components.extend(other.components.iter().cloned());
        }
        resolved
    }

    /// Stable identity used to key per-path state such as cached attributes
    pub fn identity(&self) -> String {
        format!("{}/{}", self.bucket.as_deref().unwrap_or_default(), self.key())
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            write!(f, "/")?;
            if let Some(bucket) = &self.bucket {
                write!(f, "{bucket}")?;
                if !self.components.is_empty() {
                    write!(f, "/")?;
                }
            }
        }
        write!(f, "{}", self.components.join("/"))
    }
}

/// A parsed filesystem URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsUri {
    raw: String,
    pub scheme: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub host: Option<String>,
    pub path: String,
}

impl FsUri {
    /// Parse a URI by string scanning. Credentials in the user-info part may
    /// contain characters a strict URI parser would reject.
    pub fn parse(uri: &str) -> Result<Self> {
        let (scheme, rest) = uri
            .split_once("://")
            .ok_or_else(|| Error::InvalidPath(format!("not a URI: {}", redact_uri(uri))))?;

        if scheme.is_empty() {
            return Err(Error::InvalidPath(format!("URI has no scheme: {}", redact_uri(uri))));
        }

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };

        let (user_info, host) = match authority.rfind('@') {
            Some(idx) => (Some(&authority[..idx]), &authority[idx + 1..]),
            None => (None, authority),
        };

        let (access_key, secret_key) = match user_info {
            Some(info) => match info.split_once(':') {
                Some((access, secret)) => (Some(access.to_string()), Some(secret.to_string())),
                None => (Some(info.to_string()), None),
            },
            None => (None, None),
        };

        Ok(Self {
            raw: uri.to_string(),
            scheme: scheme.to_string(),
            access_key: access_key.filter(|k| !k.is_empty()),
            secret_key,
            host: (!host.is_empty()).then(|| host.to_string()),
            path: path.to_string(),
        })
    }

    /// The URI exactly as supplied
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Fail unless the URI uses the given scheme
    pub fn require_scheme(&self, scheme: &str) -> Result<()> {
        if self.scheme != scheme {
            return Err(Error::InvalidPath(format!(
                "uri scheme must be '{scheme}': '{self}'"
            )));
        }
        Ok(())
    }

    /// Endpoint host, falling back to the canonical endpoint
    pub fn endpoint_host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    /// Filesystem path named by this URI
    pub fn object_path(&self) -> ObjectPath {
        if self.path.is_empty() {
            ObjectPath::parse("/")
        } else {
            ObjectPath::parse(&self.path)
        }
    }

    /// Identity key of the filesystem this URI addresses.
    ///
    /// With user-info present the key is `principal@host`, taken verbatim
    /// from the URI text. Without it the key is `access_key@host`, using the
    /// access key from configuration (empty when there is none).
    pub fn identity_key(&self, access_key: Option<&str>) -> String {
        let prefix = format!("{}://", self.scheme);
        let rest = self.raw.strip_prefix(&prefix).unwrap_or(&self.raw);

        match rest.find('@') {
            Some(idx) if idx > 0 => {
                let principal = &rest[..idx];
                let after = &rest[idx + 1..];
                let host = after.split('/').next().unwrap_or_default();
                let host = if host.is_empty() { DEFAULT_ENDPOINT } else { host };
                format!("{principal}@{host}")
            }
            _ => format!("{}@{}", access_key.unwrap_or_default(), self.endpoint_host()),
        }
    }
}

/// Displays the URI with any secret redacted; [`FsUri::as_str`] keeps it
impl fmt::Display for FsUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&redact_uri(&self.raw))
    }
}
