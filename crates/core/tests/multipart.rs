//! Multipart copies against the in-memory store

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::MemoryClient;
use objfs_core::multipart::{JobState, MULTIPART_THRESHOLD};
use objfs_core::{
    CopySettings, Error, MultipartCopier, ObjectFileSystem, ObjectLocation, ObjectPath,
};

const SOURCE_SIZE: u64 = 26_000_000_000;

fn settings(concurrency: usize) -> CopySettings {
    CopySettings {
        concurrency,
        ..CopySettings::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn large_copy_covers_every_part_with_bounded_concurrency() {
    let client = Arc::new(MemoryClient::new().with_part_delay(Duration::from_millis(1)));
    client.add_sized_object("src", "huge", SOURCE_SIZE);

    let copier = MultipartCopier::new(client.clone(), settings(8));
    let job = copier
        .copy(
            ObjectLocation::new("src", "huge"),
            ObjectLocation::new("dst", "copy"),
            SOURCE_SIZE,
        )
        .await
        .unwrap();

    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.part_size, 5_242_880);
    assert_eq!(job.planned_parts, 4960);

    let numbers: Vec<u32> = job.parts.iter().map(|p| p.range.part_number).collect();
    assert_eq!(numbers, (1..=4960).collect::<Vec<_>>());

    assert_eq!(client.size_of("dst", "copy"), Some(SOURCE_SIZE));
    assert_eq!(client.open_uploads(), 0);
    assert!(client.max_in_flight() <= 8, "max in flight: {}", client.max_in_flight());
}

#[tokio::test]
async fn failed_part_aborts_without_completion() {
    let client = Arc::new(MemoryClient::new().with_failing_part(3));
    client.add_sized_object("src", "huge", MULTIPART_THRESHOLD);

    let copier = MultipartCopier::new(client.clone(), settings(4));
    let err = copier
        .copy(
            ObjectLocation::new("src", "huge"),
            ObjectLocation::new("dst", "copy"),
            MULTIPART_THRESHOLD,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Io { ref message, .. } if message == "InternalError"));
    assert!(!client.contains("dst", "copy"));
    // The upload stays open.
    assert_eq!(client.open_uploads(), 1);
}

#[tokio::test]
async fn filesystem_copy_switches_to_multipart_at_threshold() {
    let client = Arc::new(MemoryClient::new());
    client.add_bucket("bucket");
    client.add_sized_object("bucket", "at-threshold", MULTIPART_THRESHOLD);
    client.add_sized_object("bucket", "below", MULTIPART_THRESHOLD - 1);

    let fs = ObjectFileSystem::with_settings(
        "@host",
        "host",
        client.clone(),
        Duration::from_secs(60),
        settings(16),
    );

    fs.copy(
        &ObjectPath::parse("/bucket/at-threshold"),
        &ObjectPath::parse("/bucket/large-copy"),
        &[],
    )
    .await
    .unwrap();
    // 5 GiB in 5 MiB parts
    assert_eq!(
        fs.object_size(&ObjectPath::parse("/bucket/large-copy")).await.unwrap(),
        MULTIPART_THRESHOLD
    );
    let meta = fs.probe(&ObjectPath::parse("/bucket/large-copy")).await.unwrap();
    assert!(matches!(meta, objfs_core::Probe::Object(m) if m.parts_count == Some(1024)));

    fs.copy(
        &ObjectPath::parse("/bucket/below"),
        &ObjectPath::parse("/bucket/small-copy"),
        &[],
    )
    .await
    .unwrap();
    let meta = fs.probe(&ObjectPath::parse("/bucket/small-copy")).await.unwrap();
    assert!(matches!(meta, objfs_core::Probe::Object(m) if m.parts_count.is_none()));
}
