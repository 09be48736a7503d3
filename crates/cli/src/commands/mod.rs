//! Command implementations

use std::sync::Arc;

use clap::{Args, Subcommand};
use objfs_core::config::{ACCESS_KEY, ENDPOINT, PATH_STYLE_ACCESS, REGION, SECRET_KEY};
use objfs_core::path::redact_uri;
use objfs_core::{ConfigResolver, FileSystemRegistry, FsUri, ObjectFileSystem, ObjectPath, Properties};
use objfs_s3::S3ClientFactory;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

pub mod access;
pub mod cp;
pub mod ls;
pub mod mkdir;
pub mod rm;
pub mod stat;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the children of a directory
    Ls(ls::LsArgs),

    /// Show attributes of a file or directory
    Stat(stat::StatArgs),

    /// Create a directory (and its bucket, if missing)
    Mkdir(mkdir::MkdirArgs),

    /// Remove a file or empty directory
    Rm(rm::RmArgs),

    /// Copy an object
    Cp(cp::CopyArgs),

    /// Move an object (copy, then delete the source)
    Mv(cp::CopyArgs),

    /// Check access to a path
    Access(access::AccessArgs),
}

/// Credentials and endpoint settings, forwarded as request parameters
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Access key
    #[arg(long, global = true)]
    pub access_key: Option<String>,

    /// Secret key
    #[arg(long, global = true)]
    pub secret_key: Option<String>,

    /// Endpoint host or URL
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Region
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Use path-style bucket addressing
    #[arg(long, global = true)]
    pub path_style: bool,
}

impl ConnectionArgs {
    /// Request parameters for the registry
    pub fn params(&self) -> Properties {
        let mut params = Properties::new();
        let mut set = |key: &str, value: &Option<String>| {
            if let Some(value) = value {
                params.insert(key.to_string(), value.clone());
            }
        };
        set(ACCESS_KEY, &self.access_key);
        set(SECRET_KEY, &self.secret_key);
        set(ENDPOINT, &self.endpoint);
        set(REGION, &self.region);
        if self.path_style {
            params.insert(PATH_STYLE_ACCESS.to_string(), "true".to_string());
        }
        params
    }
}

/// Registry plus the request parameters every command passes to it
pub struct Session {
    registry: FileSystemRegistry,
    params: Properties,
}

impl Session {
    pub fn new(connection: &ConnectionArgs) -> objfs_core::Result<Self> {
        let registry = FileSystemRegistry::new(Arc::new(S3ClientFactory::new()))
            .with_resolver(ConfigResolver::new()?);
        Ok(Self::with_registry(registry, connection.params()))
    }

    pub fn with_registry(registry: FileSystemRegistry, params: Properties) -> Self {
        Self { registry, params }
    }

    /// Filesystem and path named by `uri`
    pub async fn open(&self, uri: &str) -> objfs_core::Result<(Arc<ObjectFileSystem>, ObjectPath)> {
        tracing::debug!(uri = %redact_uri(uri), "Opening filesystem");
        let fs = self.registry.get_or_acquire(uri, &self.params).await?;
        let path = FsUri::parse(uri)?.object_path();
        Ok((fs, path))
    }
}

/// Execute a command
pub async fn execute(command: Commands, session: &Session, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    match command {
        Commands::Ls(args) => ls::execute(args, session, &formatter).await,
        Commands::Stat(args) => stat::execute(args, session, &formatter).await,
        Commands::Mkdir(args) => mkdir::execute(args, session, &formatter).await,
        Commands::Rm(args) => rm::execute(args, session, &formatter).await,
        Commands::Cp(args) => cp::execute(args, cp::Mode::Copy, session, &formatter).await,
        Commands::Mv(args) => cp::execute(args, cp::Mode::Move, session, &formatter).await,
        Commands::Access(args) => access::execute(args, session, &formatter).await,
    }
}

/// Report `error` and return its exit code
pub fn fail(formatter: &Formatter, context: &str, error: &objfs_core::Error) -> ExitCode {
    formatter.error(&format!("{context}: {error}"));
    ExitCode::from_error(error)
}
