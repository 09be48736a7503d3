//! Client configuration and layered property resolution
//!
//! Properties are flat `s3fs_*` string pairs. They are resolved from, in
//! order of precedence:
//! 1. credentials embedded in the URI user-info
//! 2. request parameters supplied by the caller
//! 3. process environment variables with the same names
//! 4. the config file (`$OBJFS_CONFIG_DIR/config.toml`, or
//!    `<user config dir>/objfs/config.toml`)

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::path::FsUri;

/// Flat property map
pub type Properties = BTreeMap<String, String>;

pub const ACCESS_KEY: &str = "s3fs_access_key";
pub const SECRET_KEY: &str = "s3fs_secret_key";
pub const ENDPOINT: &str = "s3fs_endpoint";
pub const REGION: &str = "s3fs_region";
pub const PROTOCOL: &str = "s3fs_protocol";
pub const PROXY_HOST: &str = "s3fs_proxy_host";
pub const PROXY_PORT: &str = "s3fs_proxy_port";
pub const PROXY_USERNAME: &str = "s3fs_proxy_username";
pub const PROXY_PASSWORD: &str = "s3fs_proxy_password";
pub const PROXY_DOMAIN: &str = "s3fs_proxy_domain";
pub const PROXY_WORKSTATION: &str = "s3fs_proxy_workstation";
pub const CONNECTION_TIMEOUT: &str = "s3fs_connection_timeout";
pub const SOCKET_TIMEOUT: &str = "s3fs_socket_timeout";
pub const MAX_CONNECTIONS: &str = "s3fs_max_connections";
pub const MAX_ERROR_RETRY: &str = "s3fs_max_retry_error";
pub const USER_AGENT: &str = "s3fs_user_agent";
pub const PATH_STYLE_ACCESS: &str = "s3fs_path_style_access";
pub const SIGNER_OVERRIDE: &str = "s3fs_signer_override";
pub const CLIENT_FACTORY: &str = "s3fs_client_factory";
pub const CACHE_ATTRIBUTES_TTL: &str = "s3fs_cache_attributes_ttl";

/// Keys that the environment may override
const OVERRIDABLE_KEYS: &[&str] = &[
    ACCESS_KEY,
    SECRET_KEY,
    ENDPOINT,
    REGION,
    PROTOCOL,
    PROXY_HOST,
    PROXY_PORT,
    PROXY_USERNAME,
    PROXY_PASSWORD,
    PROXY_DOMAIN,
    PROXY_WORKSTATION,
    CONNECTION_TIMEOUT,
    SOCKET_TIMEOUT,
    MAX_CONNECTIONS,
    MAX_ERROR_RETRY,
    USER_AGENT,
    PATH_STYLE_ACCESS,
    SIGNER_OVERRIDE,
    CLIENT_FACTORY,
    CACHE_ATTRIBUTES_TTL,
];

/// Default concurrency ceiling for multipart copies
pub const DEFAULT_MAX_CONNECTIONS: usize = 50;

/// Default lifetime of a cached attribute snapshot
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// Proxy settings forwarded to the client factory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProxyConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub domain: Option<String>,
    pub workstation: Option<String>,
}

impl ProxyConfig {
    pub fn is_configured(&self) -> bool {
        self.host.is_some()
    }
}

/// Fully resolved client configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientConfig {
    pub access_key: Option<String>,
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub protocol: Option<String>,
    pub proxy: ProxyConfig,
    pub connection_timeout: Option<Duration>,
    pub socket_timeout: Option<Duration>,
    pub max_connections: Option<usize>,
    pub max_error_retry: Option<u32>,
    pub user_agent: Option<String>,
    pub path_style_access: bool,
    pub signer_override: Option<String>,
    pub client_factory: Option<String>,
    pub cache_attributes_ttl: Option<Duration>,
    /// Properties with no dedicated field, passed through untouched
    pub extra: Properties,
}

impl ClientConfig {
    /// Interpret a resolved property map
    pub fn from_properties(props: &Properties) -> Result<Self> {
        let get = |key: &str| props.get(key).filter(|v| !v.is_empty()).cloned();

        let extra = props
            .iter()
            .filter(|(k, _)| !OVERRIDABLE_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            access_key: get(ACCESS_KEY),
            secret_key: get(SECRET_KEY),
            endpoint: get(ENDPOINT),
            region: get(REGION),
            protocol: get(PROTOCOL),
            proxy: ProxyConfig {
                host: get(PROXY_HOST),
                port: parse_number(props, PROXY_PORT)?,
                username: get(PROXY_USERNAME),
                password: get(PROXY_PASSWORD),
                domain: get(PROXY_DOMAIN),
                workstation: get(PROXY_WORKSTATION),
            },
            connection_timeout: parse_number(props, CONNECTION_TIMEOUT)?.map(Duration::from_millis),
            socket_timeout: parse_number(props, SOCKET_TIMEOUT)?.map(Duration::from_millis),
            max_connections: parse_number(props, MAX_CONNECTIONS)?,
            max_error_retry: parse_number(props, MAX_ERROR_RETRY)?,
            user_agent: get(USER_AGENT),
            path_style_access: parse_bool(props, PATH_STYLE_ACCESS)?.unwrap_or(false),
            signer_override: get(SIGNER_OVERRIDE),
            client_factory: get(CLIENT_FACTORY),
            cache_attributes_ttl: parse_number(props, CACHE_ATTRIBUTES_TTL)?.map(Duration::from_millis),
            extra,
        })
    }

    /// Access and secret key must be supplied together or not at all
    pub fn validate(&self) -> Result<()> {
        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err(Error::Config(format!(
                "{ACCESS_KEY} and {SECRET_KEY} should both be provided or should both be omitted"
            )));
        }
        if self.max_connections == Some(0) {
            return Err(Error::Config(format!("{MAX_CONNECTIONS} must be at least 1")));
        }
        Ok(())
    }

    /// Concurrency ceiling for multipart copies
    pub fn copy_concurrency(&self) -> usize {
        self.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS)
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_attributes_ttl.unwrap_or(DEFAULT_CACHE_TTL)
    }
}

fn parse_number<T: std::str::FromStr>(props: &Properties, key: &str) -> Result<Option<T>> {
    match props.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{key}: expected a number, got '{value}'"))),
        None => Ok(None),
    }
}

fn parse_bool(props: &Properties, key: &str) -> Result<Option<bool>> {
    match props.get(key).map(|v| v.trim().to_lowercase()) {
        None => Ok(None),
        Some(v) if v.is_empty() => Ok(None),
        Some(v) if v == "true" => Ok(Some(true)),
        Some(v) if v == "false" => Ok(Some(false)),
        Some(v) => Err(Error::Config(format!("{key}: expected true or false, got '{v}'"))),
    }
}

/// Directory holding `config.toml`
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("OBJFS_CONFIG_DIR") {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join("objfs"))
}

/// Load a flat TOML table of properties. A missing file yields no properties.
pub fn load_properties_file(path: &Path) -> Result<Properties> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Properties::new()),
        Err(e) => return Err(Error::Config(format!("{}: {e}", path.display()))),
    };

    let table: toml::Table = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;

    Ok(table
        .into_iter()
        .map(|(k, v)| {
            let value = match v {
                toml::Value::String(s) => s,
                other => other.to_string(),
            };
            (k, value)
        })
        .collect())
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves a [`ClientConfig`] from layered property sources
pub struct ConfigResolver {
    file: Properties,
    env: EnvLookup,
}

impl ConfigResolver {
    /// Resolver backed by the default config file and the process environment
    pub fn new() -> Result<Self> {
        let file = match config_dir() {
            Some(dir) => load_properties_file(&dir.join("config.toml"))?,
            None => Properties::new(),
        };
        Ok(Self::with_sources(file, |key| std::env::var(key).ok()))
    }

    /// Resolver with explicit file properties and environment lookup
    pub fn with_sources<F>(file: Properties, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            file,
            env: Box::new(env),
        }
    }

    /// Resolver that only looks at request parameters and the URI
    pub fn empty() -> Self {
        Self::with_sources(Properties::new(), |_| None)
    }

    /// Merge all layers into a property map
    pub fn resolve_properties(&self, uri: &FsUri, params: &Properties) -> Properties {
        let mut props = self.file.clone();

        for key in OVERRIDABLE_KEYS {
            if let Some(value) = params.get(*key) {
                props.insert((*key).to_string(), value.clone());
            } else if let Some(value) = (self.env)(key) {
                props.insert((*key).to_string(), value);
            }
        }

        for (key, value) in params {
            if !OVERRIDABLE_KEYS.contains(&key.as_str()) {
                props.insert(key.clone(), value.clone());
            }
        }

        if let Some(access) = &uri.access_key {
            props.insert(ACCESS_KEY.to_string(), access.clone());
            if let Some(secret) = &uri.secret_key {
                props.insert(SECRET_KEY.to_string(), secret.clone());
            }
        }

        props
    }

    /// Resolve and validate a client configuration for `uri`
    pub fn resolve(&self, uri: &FsUri, params: &Properties) -> Result<ClientConfig> {
        let props = self.resolve_properties(uri, params);
        let config = ClientConfig::from_properties(&props)?;
        config.validate()?;
        tracing::debug!(
            uri = %uri,
            access_key = config.access_key.as_deref().unwrap_or(""),
            endpoint = config.endpoint.as_deref().unwrap_or(""),
            "Resolved client configuration"
        );
        Ok(config)
    }
}

impl std::fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigResolver")
            .field("file_keys", &self.file.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
