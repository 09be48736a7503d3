//! Multipart copy engine
//!
//! Objects at or above [`MULTIPART_THRESHOLD`] cannot be copied with a single
//! request. They are split into contiguous byte ranges, each copied into one
//! part by a bounded set of workers, and assembled with a completion call.
//!
//! A failed part aborts the whole copy. The multipart upload itself is left
//! open; bucket lifecycle rules are expected to reap it.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinError, JoinSet};

use crate::config::DEFAULT_MAX_CONNECTIONS;
use crate::error::{Error, Result};
use crate::retry::{RetryConfig, is_retryable_error, retry_with_backoff};
use crate::traits::{CompletedPart, ObjectClient};

/// Largest object a single copy request may handle (5 GiB)
pub const MULTIPART_THRESHOLD: u64 = 5 * 1024 * 1024 * 1024;

/// Smallest part the store accepts (5 MiB)
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Most parts one upload may have
pub const MAX_PARTS: u64 = 10_000;

/// Delay before the single completion retry
pub const COMPLETION_BACKOFF: Duration = Duration::from_millis(1234);

/// Part size for an object of `total_size` bytes
pub fn part_size(total_size: u64) -> u64 {
    total_size.div_ceil(MAX_PARTS).max(MIN_PART_SIZE)
}

/// Inclusive byte range copied into one part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRange {
    pub part_number: u32,
    pub first_byte: u64,
    pub last_byte: u64,
}

impl PartRange {
    /// Number of bytes in the range
    pub fn size(&self) -> u64 {
        self.last_byte - self.first_byte + 1
    }
}

/// Split `[0, total_size)` into parts numbered from 1 in range order
pub fn plan_parts(total_size: u64) -> Vec<PartRange> {
    let size = part_size(total_size);
    let mut parts = Vec::with_capacity(usize::try_from(total_size.div_ceil(size)).unwrap_or(0));
    let mut position = 0;
    let mut part_number = 1;

    while position < total_size {
        let last_byte = (position + size - 1).min(total_size - 1);
        parts.push(PartRange {
            part_number,
            first_byte: position,
            last_byte,
        });
        position += size;
        part_number += 1;
    }

    parts
}

/// Bucket and key of one side of a copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Lifecycle of a multipart copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Initiated,
    PartsInFlight,
    Completed,
    Aborted,
}

/// A copied part and the entity tag the store assigned to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartRecord {
    pub range: PartRange,
    pub etag: String,
}

/// State of one multipart copy
#[derive(Debug, Clone)]
pub struct MultipartCopyJob {
    pub upload_id: String,
    pub source: ObjectLocation,
    pub target: ObjectLocation,
    pub total_size: u64,
    pub part_size: u64,
    pub planned_parts: usize,
    pub parts: Vec<PartRecord>,
    pub state: JobState,
}

impl MultipartCopyJob {
    fn new(upload_id: String, source: ObjectLocation, target: ObjectLocation, total_size: u64) -> Self {
        Self {
            upload_id,
            source,
            target,
            total_size,
            part_size: part_size(total_size),
            planned_parts: plan_parts(total_size).len(),
            parts: Vec::new(),
            state: JobState::Initiated,
        }
    }

    /// Parts for the completion call: every planned part exactly once,
    /// ascending by part number
    pub fn completed_parts(&self) -> Result<Vec<CompletedPart>> {
        if self.parts.len() != self.planned_parts {
            return Err(Error::io(
                self.target.to_string(),
                format!(
                    "multipart copy recorded {} of {} parts",
                    self.parts.len(),
                    self.planned_parts
                ),
            ));
        }

        self.parts
            .iter()
            .enumerate()
            .map(|(idx, record)| {
                if usize::try_from(record.range.part_number).ok() != Some(idx + 1) {
                    return Err(Error::io(
                        self.target.to_string(),
                        format!("multipart copy is missing part {}", idx + 1),
                    ));
                }
                Ok(CompletedPart {
                    part_number: record.range.part_number,
                    etag: record.etag.clone(),
                })
            })
            .collect()
    }
}

/// Tuning for multipart copies
#[derive(Debug, Clone)]
pub struct CopySettings {
    /// Maximum part copies in flight
    pub concurrency: usize,
    /// Policy for the completion call
    pub completion_retry: RetryConfig,
}

impl Default for CopySettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_MAX_CONNECTIONS,
            completion_retry: RetryConfig::fixed(2, COMPLETION_BACKOFF),
        }
    }
}

/// Runs multipart copies against one client
pub struct MultipartCopier {
    client: Arc<dyn ObjectClient>,
    settings: CopySettings,
}

impl MultipartCopier {
    pub fn new(client: Arc<dyn ObjectClient>, settings: CopySettings) -> Self {
        Self { client, settings }
    }

    /// Copy `source` (of `total_size` bytes) to `target`
    pub async fn copy(
        &self,
        source: ObjectLocation,
        target: ObjectLocation,
        total_size: u64,
    ) -> Result<MultipartCopyJob> {
        let upload_id = self
            .client
            .create_multipart_upload(&target.bucket, &target.key)
            .await?;

        let mut job = MultipartCopyJob::new(upload_id, source, target, total_size);
        tracing::info!(
            source = %job.source,
            target = %job.target,
            size = total_size,
            part_size = job.part_size,
            parts = job.planned_parts,
            concurrency = self.settings.concurrency,
            upload_id = %job.upload_id,
            "Starting multipart copy"
        );

        job.state = JobState::PartsInFlight;
        match self.copy_parts(&job).await {
            Ok(records) => job.parts = records,
            Err(e) => {
                job.state = JobState::Aborted;
                tracing::error!(
                    upload_id = %job.upload_id,
                    target = %job.target,
                    error = %e,
                    "Multipart copy aborted, upload left open"
                );
                return Err(e);
            }
        }

        let parts = match job.completed_parts() {
            Ok(parts) => parts,
            Err(e) => {
                job.state = JobState::Aborted;
                return Err(e);
            }
        };

        let client = &self.client;
        let (bucket, key, upload_id) = (&job.target.bucket, &job.target.key, &job.upload_id);
        let completed = retry_with_backoff(
            &self.settings.completion_retry,
            || client.complete_multipart_upload(bucket, key, upload_id, parts.clone()),
            is_retryable_error,
        )
        .await;

        match completed {
            Ok(()) => {
                job.state = JobState::Completed;
                tracing::info!(upload_id = %job.upload_id, target = %job.target, "Multipart copy complete");
                Ok(job)
            }
            Err(e) => {
                job.state = JobState::Aborted;
                Err(e)
            }
        }
    }

    /// Copy every planned part, returning records sorted by part number.
    /// Workers never outlive this call.
    async fn copy_parts(&self, job: &MultipartCopyJob) -> Result<Vec<PartRecord>> {
        let mut workers = JoinSet::new();
        let outcome = self.submit_and_join(job, &mut workers).await;
        if outcome.is_err() {
            workers.shutdown().await;
        }

        let mut records = outcome?;
        records.sort_by_key(|r| r.range.part_number);
        Ok(records)
    }

    async fn submit_and_join(
        &self,
        job: &MultipartCopyJob,
        workers: &mut JoinSet<Result<PartRecord>>,
    ) -> Result<Vec<PartRecord>> {
        let concurrency = self.settings.concurrency.max(1);
        let mut records = Vec::with_capacity(job.planned_parts);

        for range in plan_parts(job.total_size) {
            // Surface failures of finished parts before submitting more.
            while let Some(joined) = workers.try_join_next() {
                records.push(Self::part_result(job, joined)?);
            }
            // At capacity, a slot frees only once a finished part is joined,
            // so a failure is seen before the next range goes out.
            while workers.len() >= concurrency {
                match workers.join_next().await {
                    Some(joined) => records.push(Self::part_result(job, joined)?),
                    None => break,
                }
            }

            let client = self.client.clone();
            let source = job.source.clone();
            let target = job.target.clone();
            let upload_id = job.upload_id.clone();

            workers.spawn(async move {
                tracing::debug!(
                    part = range.part_number,
                    first_byte = range.first_byte,
                    last_byte = range.last_byte,
                    "Copying part"
                );
                let etag = client
                    .upload_part_copy(
                        &source.bucket,
                        &source.key,
                        &target.bucket,
                        &target.key,
                        &upload_id,
                        range.part_number,
                        (range.first_byte, range.last_byte),
                    )
                    .await?;
                Ok(PartRecord { range, etag })
            });
        }

        while let Some(joined) = workers.join_next().await {
            records.push(Self::part_result(job, joined)?);
        }

        Ok(records)
    }

    fn part_result(
        job: &MultipartCopyJob,
        joined: std::result::Result<Result<PartRecord>, JoinError>,
    ) -> Result<PartRecord> {
        joined.map_err(|e| Error::io(job.target.to_string(), format!("part copy task failed: {e}")))?
    }
}
