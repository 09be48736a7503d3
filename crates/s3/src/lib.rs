//! objfs-s3: aws-sdk-s3 backend for objfs
//!
//! Provides [`S3Client`], an [`objfs_core::ObjectClient`] over aws-sdk-s3,
//! and [`S3ClientFactory`], the default client factory for the registry.

mod client;
mod error;
mod factory;

pub use client::{DEFAULT_REGION, S3Client};
pub use factory::{S3ClientFactory, endpoint_url};
