//! Registry behavior under concurrent acquisition

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{MemoryClient, MemoryFactory};
use objfs_core::{ConfigResolver, Error, FileSystemRegistry, ObjectPath, Properties};
use objfs_core::config::{ACCESS_KEY, SECRET_KEY};

fn credentials(access: &str, secret: &str) -> Properties {
    Properties::from([
        (ACCESS_KEY.to_string(), access.to_string()),
        (SECRET_KEY.to_string(), secret.to_string()),
    ])
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_acquire_yields_one_instance() {
    let factory = Arc::new(
        MemoryFactory::new(Arc::new(MemoryClient::new())).with_delay(Duration::from_millis(20)),
    );
    let registry = Arc::new(FileSystemRegistry::new(factory.clone()));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            registry
                .acquire("s3://endpoint.example/bucket", &credentials("AK", "SK"))
                .await
        }));
    }

    let mut instances = Vec::new();
    for handle in handles {
        instances.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(factory.created(), 1);
    assert!(instances.iter().all(|fs| Arc::ptr_eq(fs, &instances[0])));
    assert_eq!(instances[0].key(), "AK@endpoint.example");
}

#[tokio::test]
async fn identity_keys() {
    let factory = Arc::new(MemoryFactory::new(Arc::new(MemoryClient::new())));
    let registry = FileSystemRegistry::new(factory);

    let fs = registry.acquire("s3://AK:SK@host/b", &Properties::new()).await.unwrap();
    assert_eq!(fs.key(), "AK:SK@host");
    assert_eq!(fs.endpoint(), "host");

    let fs = registry.acquire("s3://AK:SK@/b", &Properties::new()).await.unwrap();
    assert_eq!(fs.key(), "AK:SK@s3.amazonaws.com");

    let fs = registry.acquire("s3://host/b", &credentials("K", "S")).await.unwrap();
    assert_eq!(fs.key(), "K@host");

    let fs = registry.acquire("s3:///b", &Properties::new()).await.unwrap();
    assert_eq!(fs.key(), "@s3.amazonaws.com");

    assert_eq!(registry.len().await, 4);
}

#[tokio::test]
async fn environment_credentials_shape_the_identity() {
    let factory = Arc::new(MemoryFactory::new(Arc::new(MemoryClient::new())));
    let resolver = ConfigResolver::with_sources(Properties::new(), |key| match key {
        ACCESS_KEY => Some("ENV".to_string()),
        SECRET_KEY => Some("SECRET".to_string()),
        _ => None,
    });
    let registry = FileSystemRegistry::new(factory).with_resolver(resolver);

    let fs = registry.acquire("s3://host/b", &Properties::new()).await.unwrap();
    assert_eq!(fs.key(), "ENV@host");

    let (found, path) = registry.resolve_path("s3://host/b/k").await.unwrap();
    assert!(Arc::ptr_eq(&fs, &found));
    assert_eq!(path, ObjectPath::parse("/b/k"));
}

#[tokio::test]
async fn request_credentials_select_their_own_instance() {
    let factory = Arc::new(MemoryFactory::new(Arc::new(MemoryClient::new())));
    let registry = FileSystemRegistry::new(factory.clone());

    let anonymous = registry.acquire("s3://host/b", &Properties::new()).await.unwrap();
    assert_eq!(anonymous.key(), "@host");

    let acquired = registry.acquire("s3://host/b", &credentials("K", "S")).await.unwrap();
    let looked_up = registry.get_or_acquire("s3://host/b", &credentials("K", "S")).await.unwrap();
    assert_eq!(looked_up.key(), "K@host");
    assert!(Arc::ptr_eq(&acquired, &looked_up));
    assert!(!Arc::ptr_eq(&anonymous, &looked_up));
    assert_eq!(factory.created(), 2);
}

#[tokio::test]
async fn released_filesystem_is_rebuilt_on_next_acquire() {
    let factory = Arc::new(MemoryFactory::new(Arc::new(MemoryClient::new())));
    let registry = FileSystemRegistry::new(factory.clone());

    let first = registry.acquire("s3://host/b", &Properties::new()).await.unwrap();
    registry.release(&first).await;
    assert!(matches!(
        registry.lookup_existing("s3://host/b").await,
        Err(Error::NotFound(_))
    ));

    let second = registry.acquire("s3://host/b", &Properties::new()).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(!registry.is_open(&first).await);
    assert!(registry.is_open(&second).await);
    assert_eq!(factory.created(), 2);

    // Releasing a stale handle leaves the live one alone.
    registry.release(&first).await;
    assert!(registry.is_open(&second).await);
}
