//! In-memory object store for behavior tests

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;

use objfs_core::{
    ClientConfig, ClientFactory, CompletedPart, Error, FsUri, Grant, Grantee, ListPage,
    ListRequest, ObjectAcl, ObjectClient, ObjectMeta, Owner, Permission, Result,
};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    /// Logical size; may exceed `data.len()` for objects created by size only
    size: u64,
    part_sizes: Vec<u64>,
    last_modified: Timestamp,
}

#[derive(Debug, Default)]
struct Upload {
    bucket: String,
    key: String,
    parts: BTreeMap<u32, u64>,
}

#[derive(Debug, Default)]
struct State {
    buckets: BTreeMap<String, BTreeMap<String, StoredObject>>,
    acls: HashMap<(String, String), ObjectAcl>,
    uploads: HashMap<String, Upload>,
    next_upload: usize,
}

/// Object store kept in memory. Tracks concurrent part copies and call counts.
pub struct MemoryClient {
    state: Mutex<State>,
    owner: Owner,
    page_size: usize,
    part_delay: Duration,
    failing_part: Option<u32>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryClient {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            owner: Owner {
                id: "owner-id".to_string(),
                display_name: Some("owner".to_string()),
            },
            page_size: 1000,
            part_delay: Duration::ZERO,
            failing_part: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Return at most `page_size` entries per listing page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Hold every part copy for `delay`
    pub fn with_part_delay(mut self, delay: Duration) -> Self {
        self.part_delay = delay;
        self
    }

    /// Fail every copy of part `part_number`
    pub fn with_failing_part(mut self, part_number: u32) -> Self {
        self.failing_part = Some(part_number);
        self
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    pub fn add_bucket(&self, bucket: &str) {
        self.state()
            .buckets
            .entry(bucket.to_string())
            .or_default();
    }

    pub fn add_object(&self, bucket: &str, key: &str, data: &[u8]) {
        self.insert(bucket, key, data.to_vec(), data.len() as u64, Vec::new());
    }

    /// Object with a logical size but no content
    pub fn add_sized_object(&self, bucket: &str, key: &str, size: u64) {
        self.insert(bucket, key, Vec::new(), size, Vec::new());
    }

    /// Object assembled from parts of the given sizes
    pub fn add_multipart_object(&self, bucket: &str, key: &str, part_sizes: Vec<u64>) {
        let size = part_sizes.iter().sum();
        self.insert(bucket, key, Vec::new(), size, part_sizes);
    }

    pub fn set_acl(&self, bucket: &str, key: &str, acl: ObjectAcl) {
        self.state()
            .acls
            .insert((bucket.to_string(), key.to_string()), acl);
    }

    /// Remove one key directly, bypassing the filesystem
    pub fn remove(&self, bucket: &str, key: &str) {
        if let Some(objects) = self.state().buckets.get_mut(bucket) {
            objects.remove(key);
        }
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.state()
            .buckets
            .get(bucket)
            .is_some_and(|b| b.contains_key(key))
    }

    pub fn size_of(&self, bucket: &str, key: &str) -> Option<u64> {
        self.state()
            .buckets
            .get(bucket)
            .and_then(|b| b.get(key))
            .map(|o| o.size)
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.state()
            .buckets
            .get(bucket)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Total store calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of part copies observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn open_uploads(&self) -> usize {
        self.state().uploads.len()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn insert(&self, bucket: &str, key: &str, data: Vec<u8>, size: u64, part_sizes: Vec<u64>) {
        self.state().buckets.entry(bucket.to_string()).or_default().insert(
            key.to_string(),
            StoredObject {
                data,
                size,
                part_sizes,
                last_modified: Timestamp::now(),
            },
        );
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn object(&self, bucket: &str, key: &str) -> Result<StoredObject> {
        let state = self.state();
        let objects = state
            .buckets
            .get(bucket)
            .ok_or_else(|| Error::NotFound(format!("no such bucket: {bucket}")))?;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("{bucket}/{key}")))
    }
}

#[async_trait]
impl ObjectClient for MemoryClient {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.record_call();
        Ok(self.object(bucket, key)?.data)
    }

    async fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()> {
        self.record_call();
        if !self.state().buckets.contains_key(bucket) {
            return Err(Error::NotFound(format!("no such bucket: {bucket}")));
        }
        let size = data.len() as u64;
        self.insert(bucket, key, data, size, Vec::new());
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.record_call();
        let mut state = self.state();
        let objects = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| Error::NotFound(format!("no such bucket: {bucket}")))?;
        objects.remove(key);
        Ok(())
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<()> {
        self.record_call();
        let object = self.object(src_bucket, src_key)?;
        self.insert(dst_bucket, dst_key, object.data, object.size, Vec::new());
        Ok(())
    }

    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
        part_number: Option<u32>,
    ) -> Result<ObjectMeta> {
        self.record_call();
        let object = self.object(bucket, key)?;
        let parts_count = (!object.part_sizes.is_empty()).then_some(object.part_sizes.len() as u32);

        let size = match part_number {
            None => object.size,
            Some(n) if object.part_sizes.is_empty() && n == 1 => object.size,
            Some(n) => *object
                .part_sizes
                .get(n as usize - 1)
                .ok_or_else(|| Error::io(format!("{bucket}/{key}"), "InvalidPartNumber"))?,
        };

        Ok(ObjectMeta {
            key: key.to_string(),
            size,
            last_modified: Some(object.last_modified),
            etag: Some(format!("etag-{key}")),
            parts_count,
        })
    }

    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> Result<String> {
        self.record_call();
        let mut state = self.state();
        state.next_upload += 1;
        let id = format!("upload-{}", state.next_upload);
        state.uploads.insert(
            id.clone(),
            Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                parts: BTreeMap::new(),
            },
        );
        Ok(id)
    }

    async fn upload_part_copy(
        &self,
        src_bucket: &str,
        src_key: &str,
        _dst_bucket: &str,
        _dst_key: &str,
        upload_id: &str,
        part_number: u32,
        range: (u64, u64),
    ) -> Result<String> {
        self.record_call();
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if !self.part_delay.is_zero() {
            tokio::time::sleep(self.part_delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        let result = (|| {
            if self.failing_part == Some(part_number) {
                return Err(Error::io(format!("{src_bucket}/{src_key}"), "InternalError"));
            }
            let source = self.object(src_bucket, src_key)?;
            if range.1 >= source.size || range.0 > range.1 {
                return Err(Error::io(format!("{src_bucket}/{src_key}"), "InvalidRange"));
            }
            let mut state = self.state();
            let upload = state
                .uploads
                .get_mut(upload_id)
                .ok_or_else(|| Error::NotFound(format!("upload {upload_id}")))?;
            upload.parts.insert(part_number, range.1 - range.0 + 1);
            Ok(format!("etag-{part_number}"))
        })();

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<()> {
        self.record_call();
        let upload = self
            .state()
            .uploads
            .remove(upload_id)
            .ok_or_else(|| Error::NotFound(format!("upload {upload_id}")))?;
        assert_eq!((upload.bucket.as_str(), upload.key.as_str()), (bucket, key));

        let mut part_sizes = Vec::with_capacity(parts.len());
        for (expected, part) in (1..).zip(&parts) {
            if part.part_number != expected {
                return Err(Error::io(format!("{bucket}/{key}"), "InvalidPartOrder"));
            }
            let size = upload
                .parts
                .get(&part.part_number)
                .ok_or_else(|| Error::io(format!("{bucket}/{key}"), "InvalidPart"))?;
            part_sizes.push(*size);
        }

        let size = part_sizes.iter().sum();
        self.insert(bucket, key, Vec::new(), size, part_sizes);
        Ok(())
    }

    async fn list_objects(&self, request: ListRequest) -> Result<ListPage> {
        self.record_call();
        let state = self.state();
        let objects = state
            .buckets
            .get(&request.bucket)
            .ok_or_else(|| Error::NotFound(format!("no such bucket: {}", request.bucket)))?;

        let limit = request
            .max_keys
            .map(|n| n.max(1) as usize)
            .unwrap_or(self.page_size)
            .min(self.page_size);
        let after = request.continuation_token.clone().unwrap_or_default();

        let mut page = ListPage::default();
        let mut last = None;
        let mut emitted = 0;
        let mut truncated = false;

        for (key, object) in objects.range(request.prefix.clone()..) {
            if !key.starts_with(&request.prefix) {
                break;
            }
            if !after.is_empty() && (key.as_str() <= after.as_str() || (after.ends_with('/') && key.starts_with(&after))) {
                continue;
            }

            let rest = &key[request.prefix.len()..];
            let common = request
                .delimiter
                .as_deref()
                .and_then(|d| rest.find(d).map(|idx| format!("{}{}", request.prefix, &rest[..idx + d.len()])));

            if let Some(common) = &common {
                if page.common_prefixes.last() == Some(common) {
                    continue;
                }
            }

            if emitted == limit {
                truncated = true;
                break;
            }
            emitted += 1;

            match common {
                Some(common) => {
                    last = Some(common.clone());
                    page.common_prefixes.push(common);
                }
                None => {
                    last = Some(key.clone());
                    page.objects.push(ObjectMeta {
                        key: key.clone(),
                        size: object.size,
                        last_modified: Some(object.last_modified),
                        etag: None,
                        parts_count: None,
                    });
                }
            }
        }

        if truncated {
            page.next_token = last;
        }
        Ok(page)
    }

    async fn get_object_acl(&self, bucket: &str, key: &str) -> Result<ObjectAcl> {
        self.record_call();
        self.object(bucket, key)?;
        Ok(self
            .state()
            .acls
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .unwrap_or_else(|| ObjectAcl {
                grants: vec![Grant {
                    grantee: Grantee::Account(self.owner.id.clone()),
                    permission: Permission::FullControl,
                }],
                owner: self.owner.clone(),
            }))
    }

    async fn bucket_owner(&self, _bucket: &str) -> Result<Owner> {
        self.record_call();
        Ok(self.owner.clone())
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        self.record_call();
        Ok(self.state().buckets.contains_key(bucket))
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.record_call();
        self.add_bucket(bucket);
        Ok(())
    }
}

/// Factory handing out one shared [`MemoryClient`]
pub struct MemoryFactory {
    pub client: Arc<MemoryClient>,
    created: AtomicUsize,
    delay: Duration,
}

impl MemoryFactory {
    pub fn new(client: Arc<MemoryClient>) -> Self {
        Self {
            client,
            created: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    /// Slow down client construction to widen race windows
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientFactory for MemoryFactory {
    async fn create_client(
        &self,
        _uri: &FsUri,
        _config: &ClientConfig,
    ) -> Result<Arc<dyn ObjectClient>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.client.clone())
    }
}
