//! Integration tests for Mount mv operations

mod common;

use std::path::PathBuf;

use tomb::mount::MountError;

#[tokio::test]
async fn test_mv_rename_file() {
    let env = common::setup().await;

    env.mount
        .write(&PathBuf::from("/old.txt"), b"contents")
        .await
        .unwrap();
    env.mount
        .mv(&PathBuf::from("/old.txt"), &PathBuf::from("/new.txt"))
        .await
        .unwrap();

    assert_eq!(
        env.mount.read(&PathBuf::from("/new.txt")).await.unwrap(),
        b"contents"
    );
    let result = env.mount.read(&PathBuf::from("/old.txt")).await;
    assert!(matches!(result, Err(MountError::PathNotFound(_))));
}

#[tokio::test]
async fn test_mv_across_directories() {
    let env = common::setup().await;

    env.mount.mkdir(&PathBuf::from("/src")).await.unwrap();
    env.mount.mkdir(&PathBuf::from("/dst")).await.unwrap();
    env.mount
        .write(&PathBuf::from("/src/file.txt"), b"data")
        .await
        .unwrap();

    env.mount
        .mv(
            &PathBuf::from("/src/file.txt"),
            &PathBuf::from("/dst/file.txt"),
        )
        .await
        .unwrap();

    assert!(env.mount.ls(&PathBuf::from("/src")).await.unwrap().is_empty());
    assert_eq!(
        env.mount
            .read(&PathBuf::from("/dst/file.txt"))
            .await
            .unwrap(),
        b"data"
    );
}

#[tokio::test]
async fn test_mv_directory_keeps_subtree() {
    let env = common::setup().await;

    env.mount.mkdir(&PathBuf::from("/proj")).await.unwrap();
    env.mount.mkdir(&PathBuf::from("/proj/src")).await.unwrap();
    env.mount
        .write(&PathBuf::from("/proj/src/main.rs"), b"fn main() {}")
        .await
        .unwrap();

    env.mount
        .mv(&PathBuf::from("/proj"), &PathBuf::from("/archive"))
        .await
        .unwrap();

    assert_eq!(
        env.mount
            .read(&PathBuf::from("/archive/src/main.rs"))
            .await
            .unwrap(),
        b"fn main() {}"
    );
}

#[tokio::test]
async fn test_mv_missing_source() {
    let env = common::setup().await;
    let result = env
        .mount
        .mv(&PathBuf::from("/nope"), &PathBuf::from("/dest"))
        .await;
    assert!(matches!(result, Err(MountError::PathNotFound(_))));
}

#[tokio::test]
async fn test_mv_destination_exists() {
    let env = common::setup().await;

    env.mount.write(&PathBuf::from("/a"), b"a").await.unwrap();
    env.mount.write(&PathBuf::from("/b"), b"b").await.unwrap();

    let result = env.mount.mv(&PathBuf::from("/a"), &PathBuf::from("/b")).await;
    assert!(matches!(result, Err(MountError::PathAlreadyExists(_))));
    // nothing changed
    assert_eq!(env.mount.read(&PathBuf::from("/a")).await.unwrap(), b"a");
    assert_eq!(env.mount.read(&PathBuf::from("/b")).await.unwrap(), b"b");
}

#[tokio::test]
async fn test_mv_into_self() {
    let env = common::setup().await;

    env.mount.mkdir(&PathBuf::from("/dir")).await.unwrap();
    let result = env
        .mount
        .mv(&PathBuf::from("/dir"), &PathBuf::from("/dir/sub"))
        .await;
    assert!(matches!(result, Err(MountError::MoveIntoSelf { .. })));

    let result = env
        .mount
        .mv(&PathBuf::from("/dir"), &PathBuf::from("/dir"))
        .await;
    assert!(matches!(result, Err(MountError::MoveIntoSelf { .. })));
}

#[tokio::test]
async fn test_mv_destination_parent_missing() {
    let env = common::setup().await;

    env.mount.write(&PathBuf::from("/file"), b"x").await.unwrap();
    let result = env
        .mount
        .mv(&PathBuf::from("/file"), &PathBuf::from("/nodir/file"))
        .await;
    assert!(matches!(result, Err(MountError::InvalidPath(_))));
}
