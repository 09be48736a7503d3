//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectClient trait from objfs-core.
//! Every write, copy and multipart initiation requests AES-256 server-side
//! encryption.

use async_trait::async_trait;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CompletedMultipartUpload, CreateBucketConfiguration,
    ServerSideEncryption,
};
use aws_smithy_types::DateTime;
use bytes::Bytes;
use jiff::Timestamp;
use objfs_core::{
    CompletedPart, Error, Grant, Grantee, ListPage, ListRequest, ObjectAcl, ObjectClient,
    ObjectMeta, Owner, Permission, Result,
};

use crate::error::map_sdk_error;

/// Region for which buckets are created without a location constraint
pub const DEFAULT_REGION: &str = "us-east-1";

/// S3 client wrapper
pub struct S3Client {
    inner: aws_sdk_s3::Client,
    region: String,
}

impl S3Client {
    pub fn new(inner: aws_sdk_s3::Client, region: impl Into<String>) -> Self {
        Self {
            inner,
            region: region.into(),
        }
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }
}

fn location(bucket: &str, key: &str) -> String {
    format!("{bucket}/{key}")
}

fn timestamp(dt: Option<&DateTime>) -> Option<Timestamp> {
    dt.and_then(|dt| Timestamp::from_second(dt.secs()).ok())
}

fn etag(tag: Option<&str>) -> Option<String> {
    tag.map(|t| t.trim_matches('"').to_string())
}

fn size(length: Option<i64>) -> u64 {
    length.and_then(|l| u64::try_from(l).ok()).unwrap_or(0)
}

fn owner(owner: Option<&aws_sdk_s3::types::Owner>) -> Owner {
    Owner {
        id: owner.and_then(|o| o.id()).unwrap_or_default().to_string(),
        display_name: owner.and_then(|o| o.display_name()).map(str::to_string),
    }
}

pub(crate) fn permission(permission: &aws_sdk_s3::types::Permission) -> Option<Permission> {
    use aws_sdk_s3::types::Permission as Aws;
    match permission {
        Aws::FullControl => Some(Permission::FullControl),
        Aws::Read => Some(Permission::Read),
        Aws::Write => Some(Permission::Write),
        Aws::ReadAcp => Some(Permission::ReadAcp),
        Aws::WriteAcp => Some(Permission::WriteAcp),
        _ => None,
    }
}

fn grantee(grantee: &aws_sdk_s3::types::Grantee) -> Option<Grantee> {
    if let Some(uri) = grantee.uri() {
        return Some(Grantee::Group(uri.to_string()));
    }
    if let Some(id) = grantee.id() {
        return Some(Grantee::Account(id.to_string()));
    }
    grantee
        .email_address()
        .map(|email| Grantee::Email(email.to_string()))
}

#[async_trait]
impl ObjectClient for S3Client {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let loc = location(bucket, key);
        let response = self
            .inner
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &loc))?;

        let data: Bytes = response
            .body
            .collect()
            .await
            .map_err(|e| Error::io(&loc, e.to_string()))?
            .into_bytes();

        Ok(data.to_vec())
    }

    async fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()> {
        let body = aws_sdk_s3::primitives::ByteStream::from(data);

        self.inner
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .server_side_encryption(ServerSideEncryption::Aes256)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &location(bucket, key)))?;

        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.inner
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &location(bucket, key)))?;

        Ok(())
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<()> {
        // Build copy source: bucket/key
        let copy_source = location(src_bucket, src_key);

        self.inner
            .copy_object()
            .copy_source(&copy_source)
            .bucket(dst_bucket)
            .key(dst_key)
            .server_side_encryption(ServerSideEncryption::Aes256)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &copy_source))?;

        Ok(())
    }

    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
        part_number: Option<u32>,
    ) -> Result<ObjectMeta> {
        let loc = location(bucket, key);
        let part_number = part_number
            .map(i32::try_from)
            .transpose()
            .map_err(|_| Error::io(&loc, "part number out of range"))?;

        let response = self
            .inner
            .head_object()
            .bucket(bucket)
            .key(key)
            .set_part_number(part_number)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &loc))?;

        Ok(ObjectMeta {
            key: key.to_string(),
            size: size(response.content_length()),
            last_modified: timestamp(response.last_modified()),
            etag: etag(response.e_tag()),
            parts_count: response.parts_count().and_then(|n| u32::try_from(n).ok()),
        })
    }

    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> Result<String> {
        let loc = location(bucket, key);
        let response = self
            .inner
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .server_side_encryption(ServerSideEncryption::Aes256)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &loc))?;

        response
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| Error::io(loc, "multipart upload created without an upload id"))
    }

    async fn upload_part_copy(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
        upload_id: &str,
        part_number: u32,
        range: (u64, u64),
    ) -> Result<String> {
        let loc = location(dst_bucket, dst_key);
        let part = i32::try_from(part_number)
            .map_err(|_| Error::io(&loc, format!("part number {part_number} out of range")))?;

        let response = self
            .inner
            .upload_part_copy()
            .copy_source(location(src_bucket, src_key))
            .copy_source_range(format!("bytes={}-{}", range.0, range.1))
            .bucket(dst_bucket)
            .key(dst_key)
            .upload_id(upload_id)
            .part_number(part)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &loc))?;

        response
            .copy_part_result()
            .and_then(|r| etag(r.e_tag()))
            .ok_or_else(|| Error::io(loc, format!("part {part_number} copied without an entity tag")))
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<()> {
        let loc = location(bucket, key);
        let parts = parts
            .into_iter()
            .map(|p| {
                let number = i32::try_from(p.part_number)
                    .map_err(|_| Error::io(&loc, format!("part number {} out of range", p.part_number)))?;
                Ok(aws_sdk_s3::types::CompletedPart::builder()
                    .part_number(number)
                    .e_tag(p.etag)
                    .build())
            })
            .collect::<Result<Vec<_>>>()?;

        let upload = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        self.inner
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(upload)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &loc))?;

        Ok(())
    }

    async fn list_objects(&self, request: ListRequest) -> Result<ListPage> {
        let loc = location(&request.bucket, &request.prefix);
        let response = self
            .inner
            .list_objects_v2()
            .bucket(&request.bucket)
            .prefix(&request.prefix)
            .set_delimiter(request.delimiter)
            .set_max_keys(request.max_keys)
            .set_continuation_token(request.continuation_token)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &loc))?;

        let objects = response
            .contents()
            .iter()
            .map(|object| ObjectMeta {
                key: object.key().unwrap_or_default().to_string(),
                size: size(object.size()),
                last_modified: timestamp(object.last_modified()),
                etag: etag(object.e_tag()),
                parts_count: None,
            })
            .collect();

        let common_prefixes = response
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(str::to_string))
            .collect();

        let next_token = if response.is_truncated().unwrap_or(false) {
            response.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage {
            objects,
            common_prefixes,
            next_token,
        })
    }

    async fn get_object_acl(&self, bucket: &str, key: &str) -> Result<ObjectAcl> {
        let loc = location(bucket, key);
        let response = self
            .inner
            .get_object_acl()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &loc))?;

        let grants = response
            .grants()
            .iter()
            .filter_map(|g| {
                Some(Grant {
                    grantee: grantee(g.grantee()?)?,
                    permission: permission(g.permission()?)?,
                })
            })
            .collect();

        Ok(ObjectAcl {
            grants,
            owner: owner(response.owner()),
        })
    }

    async fn bucket_owner(&self, bucket: &str) -> Result<Owner> {
        let response = self
            .inner
            .get_bucket_acl()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, bucket))?;

        Ok(owner(response.owner()))
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.inner.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => match map_sdk_error(e, bucket) {
                Error::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let mut request = self.inner.create_bucket().bucket(bucket);

        if self.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        request
            .send()
            .await
            .map_err(|e| map_sdk_error(e, bucket))?;

        tracing::debug!(bucket = bucket, region = %self.region, "Created bucket");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::types::Permission as AwsPermission;

    #[test]
    fn test_permission_conversion() {
        assert_eq!(permission(&AwsPermission::FullControl), Some(Permission::FullControl));
        assert_eq!(permission(&AwsPermission::Read), Some(Permission::Read));
        assert_eq!(permission(&AwsPermission::Write), Some(Permission::Write));
        assert_eq!(permission(&AwsPermission::from("SOMETHING_NEW")), None);
    }

    #[test]
    fn test_etag_quotes_are_trimmed() {
        assert_eq!(etag(Some("\"abc\"")), Some("abc".to_string()));
        assert_eq!(etag(None), None);
    }

    #[test]
    fn test_negative_sizes_read_as_zero() {
        assert_eq!(size(Some(-1)), 0);
        assert_eq!(size(Some(42)), 42);
        assert_eq!(size(None), 0);
    }
}
