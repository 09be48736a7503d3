//! Filesystem registry
//!
//! Owns every open [`ObjectFileSystem`], keyed by identity
//! (`principal@endpoint`). Construction happens at most once per identity;
//! later acquirers get the existing instance regardless of the credentials
//! they supply.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::{ConfigResolver, Properties};
use crate::error::{Error, Result};
use crate::filesystem::ObjectFileSystem;
use crate::path::{FsUri, ObjectPath, SCHEME, redact_identity};
use crate::traits::ClientFactory;

pub struct FileSystemRegistry {
    default_factory: Arc<dyn ClientFactory>,
    factories: HashMap<String, Arc<dyn ClientFactory>>,
    resolver: ConfigResolver,
    filesystems: RwLock<HashMap<String, Arc<ObjectFileSystem>>>,
}

impl FileSystemRegistry {
    /// Registry that builds clients with `factory` and resolves configuration
    /// from request parameters and URIs only
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            default_factory: factory,
            factories: HashMap::new(),
            resolver: ConfigResolver::empty(),
            filesystems: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the configuration resolver
    pub fn with_resolver(mut self, resolver: ConfigResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Register a client factory selectable through `s3fs_client_factory`
    pub fn with_factory(mut self, name: impl Into<String>, factory: Arc<dyn ClientFactory>) -> Self {
        self.factories.insert(name.into(), factory);
        self
    }

    fn factory(&self, name: Option<&str>) -> Result<Arc<dyn ClientFactory>> {
        match name {
            None => Ok(self.default_factory.clone()),
            Some(name) => self
                .factories
                .get(name)
                .cloned()
                .ok_or_else(|| Error::Config(format!("unknown client factory: {name}"))),
        }
    }

    fn parse_uri(uri: &str) -> Result<FsUri> {
        let uri = FsUri::parse(uri)?;
        uri.require_scheme(SCHEME)?;
        Ok(uri)
    }

    /// Identity key for `uri` under the given request parameters
    fn identity_of(&self, uri: &FsUri, params: &Properties) -> String {
        let props = self.resolver.resolve_properties(uri, params);
        let access_key = props
            .get(crate::config::ACCESS_KEY)
            .filter(|k| !k.is_empty());
        uri.identity_key(access_key.map(String::as_str))
    }

    /// Return the filesystem for `uri`, creating it on first use
    pub async fn acquire(&self, uri: &str, params: &Properties) -> Result<Arc<ObjectFileSystem>> {
        let uri = Self::parse_uri(uri)?;
        let config = self.resolver.resolve(&uri, params)?;
        let factory = self.factory(config.client_factory.as_deref())?;
        let key = uri.identity_key(config.access_key.as_deref());

        if let Some(fs) = self.filesystems.read().await.get(&key) {
            return Ok(fs.clone());
        }

        let mut filesystems = self.filesystems.write().await;
        if let Some(fs) = filesystems.get(&key) {
            return Ok(fs.clone());
        }

        let client = factory.create_client(&uri, &config).await?;
        let fs = Arc::new(ObjectFileSystem::new(
            key.clone(),
            uri.endpoint_host(),
            client,
            &config,
        ));
        filesystems.insert(key.clone(), fs.clone());

        tracing::info!(
            key = %redact_identity(&key),
            endpoint = uri.endpoint_host(),
            "Created filesystem"
        );
        Ok(fs)
    }

    /// Existing filesystem for `uri`
    pub async fn lookup_existing(&self, uri: &str) -> Result<Arc<ObjectFileSystem>> {
        let uri = Self::parse_uri(uri)?;
        self.lookup(&uri, &Properties::new()).await
    }

    async fn lookup(&self, uri: &FsUri, params: &Properties) -> Result<Arc<ObjectFileSystem>> {
        let key = self.identity_of(uri, params);
        self.filesystems
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| {
                Error::NotFound(format!("no filesystem open for {}", redact_identity(&key)))
            })
    }

    /// Existing filesystem for the identity `uri` and `params` name, or a new
    /// one built from them
    pub async fn get_or_acquire(&self, uri: &str, params: &Properties) -> Result<Arc<ObjectFileSystem>> {
        let parsed = Self::parse_uri(uri)?;
        match self.lookup(&parsed, params).await {
            Ok(fs) => Ok(fs),
            Err(Error::NotFound(_)) => self.acquire(uri, params).await,
            Err(e) => Err(e),
        }
    }

    /// Filesystem and path named by `uri`. The filesystem must already be open.
    pub async fn resolve_path(&self, uri: &str) -> Result<(Arc<ObjectFileSystem>, ObjectPath)> {
        let fs = self.lookup_existing(uri).await?;
        let path = Self::parse_uri(uri)?.object_path();
        Ok((fs, path))
    }

    /// Remove a filesystem from the registry. Releasing twice is harmless.
    pub async fn release(&self, fs: &Arc<ObjectFileSystem>) {
        let mut filesystems = self.filesystems.write().await;
        if filesystems
            .get(fs.key())
            .is_some_and(|open| Arc::ptr_eq(open, fs))
        {
            filesystems.remove(fs.key());
            tracing::debug!(key = %redact_identity(fs.key()), "Released filesystem");
        }
    }

    pub async fn is_open(&self, fs: &Arc<ObjectFileSystem>) -> bool {
        self.filesystems
            .read()
            .await
            .get(fs.key())
            .is_some_and(|open| Arc::ptr_eq(open, fs))
    }

    /// Number of open filesystems
    pub async fn len(&self) -> usize {
        self.filesystems.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl std::fmt::Debug for FileSystemRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystemRegistry")
            .field("factories", &self.factories.keys().collect::<Vec<_>>())
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}
