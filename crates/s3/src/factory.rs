//! Builds [`S3Client`]s from resolved client configuration

use std::sync::Arc;

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::{AppName, BehaviorVersion, Region};
use objfs_core::path::DEFAULT_ENDPOINT;
use objfs_core::{ClientConfig, ClientFactory, FsUri, ObjectClient, Result};

use crate::client::{DEFAULT_REGION, S3Client};

/// Default [`ClientFactory`] backed by aws-sdk-s3
#[derive(Debug, Clone, Copy, Default)]
pub struct S3ClientFactory;

impl S3ClientFactory {
    pub fn new() -> Self {
        Self
    }

    /// Build an S3 client for `uri`
    pub async fn build(&self, uri: &FsUri, config: &ClientConfig) -> Result<S3Client> {
        let region = config
            .region
            .clone()
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.clone()));

        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            let credentials = aws_credential_types::Credentials::new(
                access_key,
                secret_key,
                None, // session token
                None, // expiry
                "objfs-static-credentials",
            );
            loader = loader.credentials_provider(credentials);
        }

        if let Some(url) = endpoint_url(uri, config) {
            loader = loader.endpoint_url(url);
        }

        let mut timeouts = TimeoutConfig::builder();
        if let Some(timeout) = config.connection_timeout {
            timeouts = timeouts.connect_timeout(timeout);
        }
        if let Some(timeout) = config.socket_timeout {
            timeouts = timeouts.read_timeout(timeout);
        }
        loader = loader.timeout_config(timeouts.build());

        if let Some(retries) = config.max_error_retry {
            loader = loader.retry_config(RetryConfig::standard().with_max_attempts(retries + 1));
        }

        if let Some(user_agent) = &config.user_agent {
            match AppName::new(user_agent.clone()) {
                Ok(app_name) => loader = loader.app_name(app_name),
                Err(e) => tracing::warn!(user_agent = %user_agent, error = %e, "Ignoring user agent"),
            }
        }

        if config.proxy.is_configured() {
            tracing::warn!(
                proxy_host = config.proxy.host.as_deref().unwrap_or_default(),
                "Proxy settings are not supported by the S3 client, ignoring"
            );
        }
        if let Some(signer) = &config.signer_override {
            tracing::warn!(signer = %signer, "Signer override is not supported, using SigV4");
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.path_style_access)
            .build();

        tracing::debug!(
            endpoint = uri.endpoint_host(),
            region = %region,
            path_style = config.path_style_access,
            "Built S3 client"
        );

        Ok(S3Client::new(aws_sdk_s3::Client::from_conf(s3_config), region))
    }
}

#[async_trait]
impl ClientFactory for S3ClientFactory {
    async fn create_client(&self, uri: &FsUri, config: &ClientConfig) -> Result<Arc<dyn ObjectClient>> {
        Ok(Arc::new(self.build(uri, config).await?))
    }
}

/// Endpoint URL for the SDK. `None` leaves endpoint resolution to the SDK,
/// which is what the canonical endpoint needs.
pub fn endpoint_url(uri: &FsUri, config: &ClientConfig) -> Option<String> {
    let protocol = config.protocol.as_deref().unwrap_or("https");

    let host = match &config.endpoint {
        Some(endpoint) if endpoint.contains("://") => return Some(endpoint.clone()),
        Some(endpoint) => endpoint.as_str(),
        None => uri.host.as_deref()?,
    };

    if host == DEFAULT_ENDPOINT {
        return None;
    }
    Some(format!("{protocol}://{host}"))
}
