//! Integration tests for Mount mkdir operations

mod common;

use std::path::PathBuf;

use tomb::mount::{MountError, NodeKind};

#[tokio::test]
async fn test_mkdir() {
    let env = common::setup().await;

    env.mount.mkdir(&PathBuf::from("/docs")).await.unwrap();

    let items = env.mount.ls(&PathBuf::from("/")).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "docs");
    assert_eq!(items[0].kind, NodeKind::Dir);
}

#[tokio::test]
async fn test_mkdir_requires_parent() {
    let env = common::setup().await;

    // parents are never created implicitly
    let result = env.mount.mkdir(&PathBuf::from("/a/b/c")).await;
    assert!(matches!(result, Err(MountError::InvalidPath(_))));

    env.mount.mkdir(&PathBuf::from("/a")).await.unwrap();
    env.mount.mkdir(&PathBuf::from("/a/b")).await.unwrap();
    env.mount.mkdir(&PathBuf::from("/a/b/c")).await.unwrap();

    let items = env.mount.ls(&PathBuf::from("/a/b")).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "c");
}

#[tokio::test]
async fn test_mkdir_already_exists() {
    let env = common::setup().await;

    env.mount.mkdir(&PathBuf::from("/docs")).await.unwrap();
    let result = env.mount.mkdir(&PathBuf::from("/docs")).await;
    assert!(matches!(result, Err(MountError::PathAlreadyExists(_))));
}

#[tokio::test]
async fn test_mkdir_over_file() {
    let env = common::setup().await;

    env.mount
        .write(&PathBuf::from("/notes.txt"), b"data")
        .await
        .unwrap();
    let result = env.mount.mkdir(&PathBuf::from("/notes.txt")).await;
    assert!(matches!(result, Err(MountError::PathAlreadyExists(_))));
}

#[tokio::test]
async fn test_mkdir_produces_versions() {
    let env = common::setup().await;
    assert_eq!(env.mount.height().await, 0);

    env.mount.mkdir(&PathBuf::from("/one")).await.unwrap();
    env.mount.mkdir(&PathBuf::from("/two")).await.unwrap();
    assert_eq!(env.mount.height().await, 2);
    assert!(!env.mount.dirty().await);
}

#[tokio::test]
async fn test_mkdir_rejects_relative_and_dotted_paths() {
    let env = common::setup().await;

    for path in ["docs", "/docs/../etc", "/docs/."] {
        let result = env.mount.mkdir(&PathBuf::from(path)).await;
        assert!(
            matches!(result, Err(MountError::InvalidPath(_))),
            "path {:?} should be invalid",
            path
        );
    }
}
