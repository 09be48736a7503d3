//! Filesystem operations over a flat object store
//!
//! Directory semantics:
//! - a key ending in `/` is a directory marker; `a` and `a/` may coexist as
//!   independent objects
//! - `a` is a directory if the marker `a/` exists or any key starts with
//!   `a/` (implicit directory)
//! - deleting a path removes both `a` and `a/` and succeeds even when neither
//!   exists
//!
//! None of the mutating operations are atomic.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, TryStreamExt};

use crate::acl::{AccessControlList, AccessMode};
use crate::attributes::{AttributeSelector, FileAttributes, PosixAttributes, PosixPermissions};
use crate::cache::AttributeCache;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::multipart::{CopySettings, MULTIPART_THRESHOLD, MultipartCopier, ObjectLocation};
use crate::path::{ObjectPath, redact_identity};
use crate::traits::{ListPage, ListRequest, ObjectClient, ObjectMeta};

/// Options accepted by copy and move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CopyOption {
    /// Overwrite an existing target
    ReplaceExisting,
    /// Request an atomic move (never supported)
    AtomicMove,
    /// Carry attributes over to the target
    CopyAttributes,
}

/// What a path resolves to in the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// An object exists at the bare key
    Object(ObjectMeta),
    /// No object at the bare key, but a marker or child exists; holds the
    /// first key found under `key/`
    Directory(ObjectMeta),
    Missing,
}

impl Probe {
    pub fn exists(&self) -> bool {
        !matches!(self, Probe::Missing)
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Probe::Directory(_))
    }
}

/// One object-store filesystem, identified by `principal@endpoint`
pub struct ObjectFileSystem {
    key: String,
    endpoint: String,
    client: Arc<dyn ObjectClient>,
    cache: AttributeCache,
    copy_settings: CopySettings,
}

impl ObjectFileSystem {
    /// Create a filesystem using settings from a resolved configuration
    pub fn new(
        key: impl Into<String>,
        endpoint: impl Into<String>,
        client: Arc<dyn ObjectClient>,
        config: &ClientConfig,
    ) -> Self {
        let copy_settings = CopySettings {
            concurrency: config.copy_concurrency(),
            ..CopySettings::default()
        };
        Self::with_settings(key, endpoint, client, config.cache_ttl(), copy_settings)
    }

    pub fn with_settings(
        key: impl Into<String>,
        endpoint: impl Into<String>,
        client: Arc<dyn ObjectClient>,
        cache_ttl: Duration,
        copy_settings: CopySettings,
    ) -> Self {
        Self {
            key: key.into(),
            endpoint: endpoint.into(),
            client,
            cache: AttributeCache::new(cache_ttl),
            copy_settings,
        }
    }

    /// Identity key (`principal@endpoint`)
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn client(&self) -> &Arc<dyn ObjectClient> {
        &self.client
    }

    pub fn cache(&self) -> &AttributeCache {
        &self.cache
    }

    /// Parse a path string in this filesystem
    pub fn path(&self, path: &str) -> ObjectPath {
        ObjectPath::parse(path)
    }

    /// Resolve what `path` denotes in the store
    pub async fn probe(&self, path: &ObjectPath) -> Result<Probe> {
        let bucket = path.require_bucket()?;

        if path.is_bucket_root() {
            return Ok(if self.client.bucket_exists(bucket).await? {
                Probe::Directory(ObjectMeta::default())
            } else {
                Probe::Missing
            });
        }

        match self.client.head_object(bucket, &path.key(), None).await {
            Ok(meta) => return Ok(Probe::Object(meta)),
            Err(Error::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let page = match self
            .client
            .list_objects(ListRequest::first_key(bucket, path.marker_key()))
            .await
        {
            Ok(page) => page,
            Err(Error::NotFound(_)) => return Ok(Probe::Missing),
            Err(e) => return Err(e),
        };

        Ok(match page.objects.into_iter().next() {
            Some(first) => Probe::Directory(first),
            None => Probe::Missing,
        })
    }

    pub async fn exists(&self, path: &ObjectPath) -> Result<bool> {
        Ok(self.probe(path).await?.exists())
    }

    pub async fn is_directory(&self, path: &ObjectPath) -> Result<bool> {
        Ok(self.probe(path).await?.is_directory())
    }

    /// True if at least one key other than the marker lives under `path/`
    async fn has_children(&self, bucket: &str, path: &ObjectPath) -> Result<bool> {
        let marker = path.marker_key();
        let request = ListRequest {
            max_keys: Some(2),
            ..ListRequest::first_key(bucket, marker.clone())
        };
        match self.client.list_objects(request).await {
            Ok(page) => Ok(page.objects.iter().any(|o| o.key != marker)
                || page.common_prefixes.iter().any(|p| *p != marker)),
            Err(Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Immediate children of a directory
    pub fn list_children(&self, dir: &ObjectPath) -> Result<DirectoryListing<'_>> {
        let bucket = dir.require_bucket()?.to_string();
        Ok(DirectoryListing {
            fs: self,
            dir: dir.clone(),
            bucket,
            prefix: dir.marker_key(),
        })
    }

    /// Create a directory marker. Creates the bucket when missing.
    pub async fn create_directory(&self, path: &ObjectPath) -> Result<()> {
        let bucket = path.require_bucket()?;

        if self.exists(path).await? {
            return Err(Error::AlreadyExists(path.to_string()));
        }

        if !self.client.bucket_exists(bucket).await? {
            tracing::info!(bucket = bucket, "Creating bucket");
            self.client.create_bucket(bucket).await?;
        }

        if !path.is_bucket_root() {
            self.client
                .put_object(bucket, &path.marker_key(), Vec::new())
                .await?;
        }
        self.cache.evict(path);
        tracing::debug!(path = %path, "Created directory");
        Ok(())
    }

    /// Delete a file or empty directory. Missing paths are not an error.
    /// Buckets are never removed: deleting an empty bucket root is a no-op.
    pub async fn delete(&self, path: &ObjectPath) -> Result<()> {
        let bucket = path.require_bucket()?;

        if self.has_children(bucket, path).await? {
            return Err(Error::DirectoryNotEmpty(path.to_string()));
        }
        if path.is_bucket_root() {
            return Ok(());
        }

        // Either representation may exist; remove both.
        for key in [path.key(), path.marker_key()] {
            match self.client.delete_object(bucket, &key).await {
                Ok(()) | Err(Error::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        self.cache.evict(path);
        tracing::debug!(path = %path, "Deleted");
        Ok(())
    }

    pub fn is_same_file(&self, a: &ObjectPath, b: &ObjectPath) -> bool {
        a.is_absolute() && b.is_absolute() && a == b
    }

    /// Object stores have no hidden files
    pub fn is_hidden(&self, _path: &ObjectPath) -> bool {
        false
    }

    /// Copy one object. Objects of 5 GiB or more go through a multipart copy.
    pub async fn copy(
        &self,
        source: &ObjectPath,
        target: &ObjectPath,
        options: &[CopyOption],
    ) -> Result<()> {
        if self.is_same_file(source, target) {
            return Ok(());
        }

        if let Some(option) = options.iter().find(|o| **o != CopyOption::ReplaceExisting) {
            return Err(Error::UnsupportedOption(format!("{option:?}")));
        }

        let src_bucket = source.require_bucket()?;
        let dst_bucket = target.require_bucket()?;

        if !options.contains(&CopyOption::ReplaceExisting) && self.exists(target).await? {
            return Err(Error::AlreadyExists(target.to_string()));
        }

        let size = self.object_size(source).await?;
        if size >= MULTIPART_THRESHOLD {
            let copier = MultipartCopier::new(self.client.clone(), self.copy_settings.clone());
            copier
                .copy(
                    ObjectLocation::new(src_bucket, source.key()),
                    ObjectLocation::new(dst_bucket, target.key()),
                    size,
                )
                .await?;
        } else {
            self.client
                .copy_object(src_bucket, &source.key(), dst_bucket, &target.key())
                .await?;
        }

        self.cache.evict(target);
        tracing::debug!(source = %source, target = %target, size = size, "Copied");
        Ok(())
    }

    /// Copy then delete the source
    pub async fn move_path(
        &self,
        source: &ObjectPath,
        target: &ObjectPath,
        options: &[CopyOption],
    ) -> Result<()> {
        if options.contains(&CopyOption::AtomicMove) {
            return Err(Error::AtomicMoveUnsupported {
                source_path: source.to_string(),
                target_path: target.to_string(),
            });
        }
        if self.is_same_file(source, target) {
            return Ok(());
        }

        self.copy(source, target, options).await?;
        self.delete(source).await
    }

    /// Size of an object. Multipart objects are measured part by part.
    pub async fn object_size(&self, path: &ObjectPath) -> Result<u64> {
        let bucket = path.require_bucket()?;
        let key = path.key();
        let meta = self.client.head_object(bucket, &key, None).await?;

        match meta.parts_count {
            Some(parts) if parts > 1 => {
                let mut total = 0;
                for part in 1..=parts {
                    total += self.client.head_object(bucket, &key, Some(part)).await?.size;
                }
                Ok(total)
            }
            _ => Ok(meta.size),
        }
    }

    /// Check `modes` against the path's ACL; with no modes, check existence
    pub async fn check_access(&self, path: &ObjectPath, modes: &[AccessMode]) -> Result<()> {
        if !path.is_absolute() {
            return Err(Error::InvalidPath(format!("path must be absolute: {path}")));
        }

        let object_key = match self.probe(path).await? {
            Probe::Missing => return Err(Error::NotFound(path.to_string())),
            _ if modes.is_empty() => return Ok(()),
            Probe::Object(meta) | Probe::Directory(meta) => meta.key,
        };

        // The bucket root has no object of its own; its owner is the principal.
        if object_key.is_empty() {
            return Ok(());
        }

        let bucket = path.require_bucket()?;
        let denied = |e: Error| Error::AccessDenied(format!("{path}: {e}"));
        let acl = self
            .client
            .get_object_acl(bucket, &object_key)
            .await
            .map_err(denied)?;
        let principal = self.client.bucket_owner(bucket).await.map_err(denied)?;

        AccessControlList::new(bucket, object_key, acl).check_access(&principal, modes)
    }

    /// Fetch attributes and the key of the object they were derived from
    async fn fetch_attributes(&self, path: &ObjectPath) -> Result<(FileAttributes, String)> {
        match self.probe(path).await? {
            Probe::Object(meta) => Ok((FileAttributes::file(&meta), meta.key)),
            Probe::Directory(meta) => Ok((
                FileAttributes::directory(path.marker_key(), Some(&meta)),
                meta.key,
            )),
            Probe::Missing => Err(Error::NotFound(path.to_string())),
        }
    }

    /// Basic attributes, served once from the cache when fresh
    pub async fn read_attributes(&self, path: &ObjectPath) -> Result<FileAttributes> {
        if let Some(cached) = self.cache.take(path) {
            tracing::trace!(path = %path, "Attribute cache hit");
            return Ok(cached);
        }

        let (attributes, _) = self.fetch_attributes(path).await?;
        self.cache.put(path, attributes.clone());
        Ok(attributes)
    }

    /// Attributes including POSIX owner and permission bits
    pub async fn read_posix_attributes(&self, path: &ObjectPath) -> Result<FileAttributes> {
        if let Some(cached) = self.cache.take_if(path, |a| a.posix.is_some()) {
            return Ok(cached);
        }

        let bucket = path.require_bucket()?;
        let (attributes, object_key) = self.fetch_attributes(path).await?;

        let posix = if object_key.is_empty() {
            let owner = self.client.bucket_owner(bucket).await?;
            PosixAttributes {
                owner: owner.display_name.or(Some(owner.id)),
                group: None,
                permissions: PosixPermissions::from_mode(0o600),
            }
        } else {
            let acl = self.client.get_object_acl(bucket, &object_key).await?;
            PosixAttributes::from_acl(&acl)
        };

        let attributes = attributes.with_posix(posix);
        self.cache.put(path, attributes.clone());
        Ok(attributes)
    }

    /// Attribute map for a selector such as `basic:*` or `posix:size,owner`
    pub async fn read_attribute_map(
        &self,
        path: &ObjectPath,
        selector: &str,
    ) -> Result<std::collections::BTreeMap<String, serde_json::Value>> {
        let selector = AttributeSelector::parse(selector)?;
        let attributes = if selector.posix {
            self.read_posix_attributes(path).await?
        } else {
            self.read_attributes(path).await?
        };
        Ok(attributes.to_map(&selector))
    }

    /// Download an object's content
    pub async fn read_bytes(&self, path: &ObjectPath) -> Result<Vec<u8>> {
        let bucket = path.require_bucket()?;
        if path.is_bucket_root() {
            return Err(Error::InvalidPath(format!("cannot read bucket root: {path}")));
        }
        self.client.get_object(bucket, &path.key()).await
    }

    /// Upload an object's content, replacing any existing object
    pub async fn write_bytes(&self, path: &ObjectPath, data: Vec<u8>) -> Result<()> {
        let bucket = path.require_bucket()?;
        if path.is_bucket_root() {
            return Err(Error::InvalidPath(format!("cannot write bucket root: {path}")));
        }
        self.client.put_object(bucket, &path.key(), data).await?;
        self.cache.evict(path);
        Ok(())
    }
}

impl std::fmt::Debug for ObjectFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectFileSystem")
            .field("key", &redact_identity(&self.key))
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// Lazily listed children of one directory. Each call to
/// [`stream`](Self::stream) starts a fresh listing.
pub struct DirectoryListing<'a> {
    fs: &'a ObjectFileSystem,
    dir: ObjectPath,
    bucket: String,
    prefix: String,
}

struct ListingState {
    next_token: Option<String>,
    finished: bool,
    seen: HashSet<String>,
    pending: VecDeque<ObjectPath>,
}

impl<'a> DirectoryListing<'a> {
    pub fn directory(&self) -> &ObjectPath {
        &self.dir
    }

    pub fn stream(&self) -> impl Stream<Item = Result<ObjectPath>> + Send + '_ {
        let state = ListingState {
            next_token: None,
            finished: false,
            seen: HashSet::new(),
            pending: VecDeque::new(),
        };

        futures::stream::try_unfold(state, move |mut state| async move {
            loop {
                if let Some(child) = state.pending.pop_front() {
                    return Ok::<_, Error>(Some((child, state)));
                }
                if state.finished {
                    return Ok(None);
                }

                let request = ListRequest {
                    continuation_token: state.next_token.take(),
                    ..ListRequest::directory(&self.bucket, &self.prefix)
                };
                let page = self.fs.client.list_objects(request).await?;
                state.finished = page.next_token.is_none();
                state.next_token = page.next_token.clone();
                self.absorb(page, &mut state);
            }
        })
    }

    /// Collect every child
    pub async fn collect(&self) -> Result<Vec<ObjectPath>> {
        self.stream().try_collect().await
    }

    /// Immediate child name of `key`, if it lies below this directory
    fn child_name<'k>(&self, key: &'k str) -> Option<&'k str> {
        let rest = key.strip_prefix(self.prefix.as_str())?;
        let name = rest.split('/').next().unwrap_or_default();
        (!name.is_empty()).then_some(name)
    }

    fn push_child(&self, state: &mut ListingState, name: &str, attributes: Option<FileAttributes>) {
        if !state.seen.insert(name.to_string()) {
            return;
        }
        let child = self.dir.join(name);
        if let Some(attributes) = attributes {
            self.fs.cache.put(&child, attributes);
        }
        state.pending.push_back(child);
    }

    fn absorb(&self, page: ListPage, state: &mut ListingState) {
        let (markers, files): (Vec<_>, Vec<_>) = page
            .objects
            .into_iter()
            .filter(|o| o.key != self.prefix)
            .partition(|o| o.key.ends_with('/'));

        for marker in &markers {
            if let Some(name) = self.child_name(&marker.key) {
                let attributes = FileAttributes::directory(marker.key.clone(), Some(marker));
                self.push_child(state, name, Some(attributes));
            }
        }

        for prefix in &page.common_prefixes {
            if let Some(name) = self.child_name(prefix) {
                self.push_child(state, name, None);
            }
        }

        for file in &files {
            if let Some(name) = self.child_name(&file.key) {
                self.push_child(state, name, Some(FileAttributes::file(file)));
            }
        }
    }
}
