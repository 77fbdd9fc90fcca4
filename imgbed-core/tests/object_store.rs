use imgbed_core::{
    DeleteOutcome, MemoryBackend, RepositoryObjectStore, RepositoryRef, StoreError, StoreState,
};
use std::sync::Arc;

const NOW: i64 = 1_700_000_000_000;

fn repo() -> RepositoryRef {
    RepositoryRef::new("alice", "pics", "oss")
}

fn store(backend: &Arc<MemoryBackend>) -> RepositoryObjectStore {
    RepositoryObjectStore::new(repo(), backend.clone()).with_clock(|| NOW)
}

/// Backend with the working branch and root marker already in place
fn ready_backend() -> Arc<MemoryBackend> {
    Arc::new(
        MemoryBackend::new("main")
            .with_branch("oss")
            .with_file("oss", "images/.gitkeep", b""),
    )
}

#[tokio::test]
async fn test_initialize_brand_new_repository() {
    let backend = Arc::new(MemoryBackend::new("main"));
    let main_head = backend.branch_head("main").unwrap();
    let mut store = store(&backend);

    assert!(store.initialize().await.unwrap());
    assert_eq!(store.state(), StoreState::Ready);

    assert_eq!(backend.call_count("create_branch"), 1);
    assert!(backend.calls().contains(&"create_branch:oss".to_string()));
    // The marker commit advances the working branch past the default head
    assert_ne!(backend.branch_head("oss"), Some(main_head));
    assert_eq!(backend.file("oss", "images/.gitkeep"), Some(Vec::new()));
    assert_eq!(backend.file("main", "images/.gitkeep"), None);
}

#[tokio::test]
async fn test_initialize_existing_branch_is_not_recreated() {
    let backend = Arc::new(MemoryBackend::new("main").with_branch("oss"));
    let mut store = store(&backend);

    assert!(store.initialize().await.unwrap());
    assert_eq!(backend.call_count("create_branch"), 0);
    assert_eq!(backend.call_count("put_file"), 1);
}

#[tokio::test]
async fn test_initialize_existing_marker_is_not_recreated() {
    let backend = ready_backend();
    let mut store = store(&backend);

    assert!(store.initialize().await.unwrap());
    assert_eq!(backend.call_count("create_branch"), 0);
    assert_eq!(backend.call_count("put_file"), 0);

    // Idempotent across repeated calls
    assert!(store.initialize().await.unwrap());
    assert_eq!(backend.call_count("put_file"), 0);
}

#[tokio::test]
async fn test_initialize_missing_repository() {
    let backend = Arc::new(MemoryBackend::without_repository());
    let mut store = store(&backend);

    let err = store.initialize().await.unwrap_err();
    assert!(matches!(err, StoreError::Access { ref repo, .. } if repo == "alice/pics"));
    assert_eq!(store.state(), StoreState::Failed);
}

#[tokio::test]
async fn test_initialize_forbidden_repository() {
    let backend = Arc::new(MemoryBackend::new("main"));
    backend.fail_on("get_repository", 403);
    let mut store = store(&backend);

    assert!(matches!(
        store.initialize().await.unwrap_err(),
        StoreError::Access { .. }
    ));
}

#[tokio::test]
async fn test_initialize_without_write_scope() {
    let backend = Arc::new(MemoryBackend::new("main"));
    backend.fail_on("create_branch", 403);
    let mut store = store(&backend);

    assert!(matches!(
        store.initialize().await.unwrap_err(),
        StoreError::Permission(_)
    ));
    assert_eq!(store.state(), StoreState::Failed);
}

#[tokio::test]
async fn test_upload_path_and_url() {
    let backend = ready_backend();
    let store = store(&backend);

    let url = store.upload_object(b"\x89PNG", "cat.png", None).await.unwrap();

    let expected_path = format!("images/{}-cat.png", NOW);
    assert_eq!(
        url,
        format!("https://cdn.jsdelivr.net/gh/alice/pics@oss/{}", expected_path)
    );
    assert!(url.contains(&expected_path));
    assert_eq!(backend.file("oss", &expected_path), Some(b"\x89PNG".to_vec()));
}

#[tokio::test]
async fn test_upload_into_folder() {
    let backend = ready_backend();
    let store = store(&backend);

    let url = store
        .upload_object(b"gif", "dog.gif", Some("pets"))
        .await
        .unwrap();

    let path = format!("images/pets/{}-dog.gif", NOW);
    assert!(url.ends_with(&path));
    assert!(backend.paths("oss").contains(&path));
}

#[tokio::test]
async fn test_upload_without_write_scope() {
    let backend = ready_backend();
    backend.fail_on("put_file", 403);
    let store = store(&backend);

    let err = store.upload_object(b"x", "cat.png", None).await.unwrap_err();
    assert!(matches!(err, StoreError::Permission(_)));
}

#[tokio::test]
async fn test_upload_other_failure_wraps_message() {
    let backend = ready_backend();
    backend.fail_on("put_file", 500);
    let store = store(&backend);

    let err = store.upload_object(b"x", "cat.png", None).await.unwrap_err();
    match err {
        StoreError::Upload(message) => assert_eq!(message, "injected failure"),
        other => panic!("expected upload error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_list_folders_without_root() {
    let backend = Arc::new(MemoryBackend::new("main").with_branch("oss"));
    let store = store(&backend);

    assert!(store.list_folders().await.is_empty());
}

#[tokio::test]
async fn test_list_folders_swallows_outage() {
    let backend = ready_backend();
    backend.fail_on("get_content", 502);
    let store = store(&backend);

    assert!(store.list_folders().await.is_empty());
}

#[tokio::test]
async fn test_create_and_list_folders() {
    let backend = ready_backend();
    let store = store(&backend);

    assert!(store.create_folder("pets").await);
    assert!(store.create_folder("2024").await);
    store.upload_object(b"x", "top.png", None).await.unwrap();

    assert_eq!(store.list_folders().await, vec!["2024", "pets"]);
    assert_eq!(backend.file("oss", "images/pets/.gitkeep"), Some(Vec::new()));
}

#[tokio::test]
async fn test_create_folder_failure_is_false() {
    let backend = ready_backend();
    backend.fail_on("put_file", 403);
    let store = store(&backend);

    assert!(!store.create_folder("pets").await);
}

#[tokio::test]
async fn test_list_objects_excludes_marker() {
    let backend = ready_backend();
    let store = store(&backend);

    // Only the marker exists
    assert!(store.list_objects(None).await.is_empty());

    store.upload_object(b"a", "a.png", None).await.unwrap();
    assert!(store.create_folder("pets").await);
    store.upload_object(b"b", "b.png", Some("pets")).await.unwrap();

    let root = store.list_objects(None).await;
    assert_eq!(root.len(), 1);
    assert_eq!(root[0].name, format!("{}-a.png", NOW));
    assert_eq!(root[0].path, format!("images/{}-a.png", NOW));
    assert_eq!(
        root[0].url,
        format!("https://cdn.jsdelivr.net/gh/alice/pics@oss/images/{}-a.png", NOW)
    );

    let pets = store.list_objects(Some("pets")).await;
    assert_eq!(pets.len(), 1);
    assert_eq!(pets[0].name, format!("{}-b.png", NOW));
    assert!(pets.iter().all(|o| o.name != ".gitkeep"));
}

#[tokio::test]
async fn test_list_objects_missing_folder() {
    let backend = ready_backend();
    let store = store(&backend);

    assert!(store.list_objects(Some("nope")).await.is_empty());
}

#[tokio::test]
async fn test_delete_object() {
    let backend = Arc::new(
        MemoryBackend::new("main")
            .with_branch("oss")
            .with_file("oss", "images/.gitkeep", b"")
            .with_file("oss", "images/old.png", b"old"),
    );
    let store = store(&backend);

    let outcome = store.delete_object("images/old.png").await.unwrap();
    assert!(outcome.success);
    assert!(!outcome.hash.is_empty());
    assert_eq!(backend.file("oss", "images/old.png"), None);
    assert_eq!(backend.call_count("delete_file"), 1);
}

#[tokio::test]
async fn test_delete_missing_object() {
    let backend = ready_backend();
    let store = store(&backend);

    let err = store.delete_object("images/missing.png").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { ref path } if path == "images/missing.png"));
    assert_eq!(backend.call_count("delete_file"), 0);
}

#[tokio::test]
async fn test_delete_directory_is_noop() {
    let backend = Arc::new(
        MemoryBackend::new("main")
            .with_branch("oss")
            .with_file("oss", "images/old.png/.gitkeep", b""),
    );
    let store = store(&backend);

    let outcome = store.delete_object("images/old.png").await.unwrap();
    assert_eq!(
        outcome,
        DeleteOutcome {
            success: false,
            hash: String::new()
        }
    );
    assert_eq!(backend.call_count("delete_file"), 0);
}

#[tokio::test]
async fn test_delete_without_write_scope() {
    let backend = Arc::new(
        MemoryBackend::new("main")
            .with_branch("oss")
            .with_file("oss", "images/old.png", b"old"),
    );
    backend.fail_on("delete_file", 403);
    let store = store(&backend);

    let err = store.delete_object("images/old.png").await.unwrap_err();
    assert!(matches!(err, StoreError::Permission(_)));
    assert!(backend.file("oss", "images/old.png").is_some());
}

#[tokio::test]
async fn test_derive_cdn_url_is_pure() {
    let backend = ready_backend();
    let store = store(&backend);

    let first = store.derive_cdn_url("sha-one", "images/1-a.png");
    let second = store.derive_cdn_url("sha-two", "images/1-a.png");
    assert_eq!(first, second);
    assert_eq!(first, store.derive_cdn_url("sha-one", "images/1-a.png"));
}
