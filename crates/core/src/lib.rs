//! objfs-core: hierarchical filesystem semantics over a flat object store
//!
//! This crate provides:
//! - Path parsing and path/key translation
//! - Directory semantics over markers, prefixes and plain keys
//! - A registry of filesystems keyed by identity
//! - Single-use attribute caching and ACL-based access checks
//! - Parallel multipart copies for large objects
//! - Layered client configuration
//!
//! The crate is independent of any specific S3 SDK. Stores are reached
//! through the [`ObjectClient`] trait.

pub mod acl;
pub mod attributes;
pub mod cache;
pub mod config;
pub mod error;
pub mod filesystem;
pub mod multipart;
pub mod path;
pub mod registry;
pub mod retry;
pub mod traits;

pub use acl::{AccessControlList, AccessMode};
pub use attributes::{AttributeSelector, FileAttributes, PosixAttributes, PosixPermissions};
pub use cache::AttributeCache;
pub use config::{ClientConfig, ConfigResolver, Properties};
pub use error::{Error, Result};
pub use filesystem::{CopyOption, DirectoryListing, ObjectFileSystem, Probe};
pub use multipart::{CopySettings, MultipartCopier, MultipartCopyJob, ObjectLocation};
pub use path::{FsUri, ObjectPath};
pub use registry::FileSystemRegistry;
pub use retry::{RetryConfig, is_retryable_error, retry_with_backoff};
pub use traits::{
    ClientFactory, CompletedPart, Grant, Grantee, ListPage, ListRequest, ObjectAcl, ObjectClient,
    ObjectMeta, Owner, Permission,
};
