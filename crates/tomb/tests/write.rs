//! Integration tests for Mount write and read operations

mod common;

use std::path::PathBuf;
use std::sync::Arc;

use uuid::Uuid;

use tomb::client::TombClient;
use tomb::crypto::SecretKey;
use tomb::mount::{MountError, NodeKind};
use tomb::store::{BucketType, MemoryContentStore, MemoryMetadataStore, Remote, StorageClass};

#[tokio::test]
async fn test_write_read_roundtrip() {
    let env = common::setup().await;

    env.mount
        .write(&PathBuf::from("/hello.txt"), b"hello world")
        .await
        .unwrap();
    let data = env.mount.read(&PathBuf::from("/hello.txt")).await.unwrap();
    assert_eq!(data, b"hello world");
}

#[tokio::test]
async fn test_write_replaces() {
    let env = common::setup().await;
    let path = PathBuf::from("/config.json");

    env.mount.write(&path, b"{\"v\":1}").await.unwrap();
    env.mount.write(&path, b"{\"v\":2}").await.unwrap();

    assert_eq!(env.mount.read(&path).await.unwrap(), b"{\"v\":2}");
    // replacement, not duplication
    let items = env.mount.ls(&PathBuf::from("/")).await.unwrap();
    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn test_write_keeps_created_timestamp() {
    let env = common::setup().await;
    let path = PathBuf::from("/a.txt");

    env.mount.write(&path, b"one").await.unwrap();
    let before = env.mount.ls(&PathBuf::from("/")).await.unwrap();
    env.mount.write(&path, b"two longer").await.unwrap();
    let after = env.mount.ls(&PathBuf::from("/")).await.unwrap();

    assert_eq!(after[0].created, before[0].created);
    assert!(after[0].modified >= before[0].modified);
    assert_eq!(after[0].size, 10);
}

#[tokio::test]
async fn test_write_requires_parent() {
    let env = common::setup().await;

    let result = env
        .mount
        .write(&PathBuf::from("/missing/file.txt"), b"data")
        .await;
    assert!(matches!(result, Err(MountError::InvalidPath(_))));
}

#[tokio::test]
async fn test_write_over_directory() {
    let env = common::setup().await;

    env.mount.mkdir(&PathBuf::from("/docs")).await.unwrap();
    let result = env.mount.write(&PathBuf::from("/docs"), b"data").await;
    assert!(matches!(result, Err(MountError::PathAlreadyExists(_))));
}

#[tokio::test]
async fn test_write_into_subdirectory() {
    let env = common::setup().await;

    env.mount.mkdir(&PathBuf::from("/docs")).await.unwrap();
    env.mount
        .write(&PathBuf::from("/docs/readme.md"), b"# README")
        .await
        .unwrap();

    let items = env.mount.ls(&PathBuf::from("/docs")).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "readme.md");
    assert_eq!(items[0].kind, NodeKind::File);
    assert_eq!(items[0].size, 8);
    assert_eq!(items[0].mime.as_deref(), Some("text/markdown"));
}

#[tokio::test]
async fn test_read_missing_file() {
    let env = common::setup().await;

    let result = env.mount.read(&PathBuf::from("/nope.txt")).await;
    assert!(matches!(result, Err(MountError::PathNotFound(_))));
}

#[tokio::test]
async fn test_read_directory_fails() {
    let env = common::setup().await;

    env.mount.mkdir(&PathBuf::from("/docs")).await.unwrap();
    let result = env.mount.read(&PathBuf::from("/docs")).await;
    assert!(matches!(result, Err(MountError::PathNotNode(_))));
}

#[tokio::test]
async fn test_quota_enforced() {
    let env = common::setup_with_limit(100).await;

    // fits
    env.mount
        .write(&PathBuf::from("/small.bin"), &[0u8; 60])
        .await
        .unwrap();
    assert_eq!(env.client.get_usage().await.unwrap(), 60);

    // would exceed the limit
    let result = env.mount.write(&PathBuf::from("/big.bin"), &[0u8; 60]).await;
    assert!(matches!(result, Err(MountError::QuotaExceeded { .. })));

    // no version was produced by the failed write
    assert_eq!(env.mount.height().await, 1);
    assert_eq!(env.client.get_usage().await.unwrap(), 60);
}

#[tokio::test]
async fn test_quota_counts_replacement_delta() {
    let env = common::setup_with_limit(100).await;
    let path = PathBuf::from("/data.bin");

    env.mount.write(&path, &[0u8; 90]).await.unwrap();
    // replacing 90 bytes with 95 only needs 5 more
    env.mount.write(&path, &[0u8; 95]).await.unwrap();
    assert_eq!(env.client.get_usage().await.unwrap(), 95);

    let result = env.mount.write(&path, &[0u8; 101]).await;
    assert!(matches!(result, Err(MountError::QuotaExceeded { .. })));
}

#[tokio::test]
async fn test_write_empty_file() {
    let env = common::setup().await;

    env.mount.write(&PathBuf::from("/empty"), b"").await.unwrap();
    assert_eq!(env.mount.read(&PathBuf::from("/empty")).await.unwrap(), b"");
    let items = env.mount.ls(&PathBuf::from("/")).await.unwrap();
    assert_eq!(items[0].size, 0);
}

#[tokio::test]
async fn test_usage_outage_does_not_wedge_the_mount() {
    common::init_tracing();
    let memory = MemoryMetadataStore::new();
    let account_id = Uuid::new_v4();
    memory.register_account(account_id, common::USAGE_LIMIT);
    let flaky = common::FlakyMetadataStore::new(memory);
    let remote = Remote::new(
        Arc::new(flaky.clone()),
        Arc::new(MemoryContentStore::new()),
    );

    let session_key = SecretKey::generate();
    let client = TombClient::new(&session_key.to_pem(), account_id, remote.clone())
        .await
        .unwrap();
    let bucket_key = SecretKey::generate();
    let (_, mount) = client
        .create_bucket_and_mount(
            "test",
            StorageClass::Hot,
            BucketType::Interactive,
            &bucket_key.to_pem(),
            &bucket_key.public().to_pem(),
        )
        .await
        .unwrap();

    // the append lands, then the usage update fails; the write must still
    // succeed and the mount must track the new head
    flaky.fail_add_usage(true);
    mount
        .write(&PathBuf::from("/a.bin"), &[0u8; 100])
        .await
        .unwrap();
    assert_eq!(mount.height().await, 1);
    assert!(!mount.dirty().await);

    // once the usage service is back, the next mutation appends cleanly
    // instead of pushing a stale parent
    flaky.fail_add_usage(false);
    mount
        .write(&PathBuf::from("/b.bin"), &[0u8; 50])
        .await
        .unwrap();
    assert_eq!(mount.height().await, 2);
    assert_eq!(mount.read(&PathBuf::from("/a.bin")).await.unwrap().len(), 100);

    // only the counter is skewed, by exactly the dropped delta
    assert_eq!(client.get_usage().await.unwrap(), 50);
}
