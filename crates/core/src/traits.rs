//! Store capability traits
//!
//! The filesystem talks to the object store only through [`ObjectClient`].
//! This keeps the core independent of any specific S3 SDK and lets tests
//! substitute mocks or in-memory stores.

use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::error::Result;
use crate::path::FsUri;

/// Metadata returned by a HEAD request
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Object key
    pub key: String,
    /// Content length in bytes (of the requested part, when one was given)
    pub size: u64,
    /// Last modification time
    pub last_modified: Option<Timestamp>,
    /// Entity tag without surrounding quotes
    pub etag: Option<String>,
    /// Number of parts for objects assembled by multipart upload
    pub parts_count: Option<u32>,
}

impl ObjectMeta {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            ..Default::default()
        }
    }
}

/// Parameters for a single list request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListRequest {
    pub bucket: String,
    pub prefix: String,
    pub delimiter: Option<String>,
    pub max_keys: Option<i32>,
    pub continuation_token: Option<String>,
}

impl ListRequest {
    /// One level of a directory: `prefix` with a `/` delimiter
    pub fn directory(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
            delimiter: Some("/".to_string()),
            ..Default::default()
        }
    }

    /// First key under `prefix`, ignoring hierarchy
    pub fn first_key(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
            max_keys: Some(1),
            ..Default::default()
        }
    }
}

/// One page of a listing
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListPage {
    /// Objects directly matched by the request
    pub objects: Vec<ObjectMeta>,
    /// Rolled-up prefixes, each ending with the delimiter
    pub common_prefixes: Vec<String>,
    /// Token for the next page, if truncated
    pub next_token: Option<String>,
}

/// ACL permission levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    FullControl,
    Read,
    Write,
    ReadAcp,
    WriteAcp,
}

/// Account or group a grant applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grantee {
    /// Canonical account id
    Account(String),
    /// Predefined group URI (all users, authenticated users, ...)
    Group(String),
    /// Grant by e-mail address
    Email(String),
}

/// A single ACL grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub grantee: Grantee,
    pub permission: Permission,
}

/// Owner of a bucket or object
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
    pub display_name: Option<String>,
}

/// Grants and owner of an object
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectAcl {
    pub grants: Vec<Grant>,
    pub owner: Owner,
}

/// Entity tag recorded for one copied part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

/// Object-store operations used by the filesystem.
///
/// Implementations must set server-side encryption (AES-256) on every put,
/// copy and multipart initiation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Download an object
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Upload an object
    async fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()>;

    /// Delete an object; succeeds when the key does not exist
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// Server-side copy in a single request
    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<()>;

    /// Fetch object metadata, optionally for one part of a multipart object
    async fn head_object(&self, bucket: &str, key: &str, part_number: Option<u32>)
    -> Result<ObjectMeta>;

    /// Open a multipart upload and return its upload id
    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> Result<String>;

    /// Copy `range` (inclusive byte bounds) of the source into one part.
    /// Returns the part's entity tag.
    #[allow(clippy::too_many_arguments)]
    async fn upload_part_copy(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
        upload_id: &str,
        part_number: u32,
        range: (u64, u64),
    ) -> Result<String>;

    /// Assemble the recorded parts into the final object
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<()>;

    /// List one page of keys
    async fn list_objects(&self, request: ListRequest) -> Result<ListPage>;

    /// Fetch an object's ACL
    async fn get_object_acl(&self, bucket: &str, key: &str) -> Result<ObjectAcl>;

    /// Owner of a bucket, i.e. the principal this filesystem acts as
    async fn bucket_owner(&self, bucket: &str) -> Result<Owner>;

    /// Check whether a bucket exists
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// Create a bucket
    async fn create_bucket(&self, bucket: &str) -> Result<()>;
}

/// Builds clients for newly created filesystems
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn create_client(&self, uri: &FsUri, config: &ClientConfig)
    -> Result<Arc<dyn ObjectClient>>;
}
