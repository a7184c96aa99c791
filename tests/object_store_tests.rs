use bytes::Bytes;
use score_shelf::object_store::{LocalStore, ObjectStore, ObjectStoreError};

const BASE_URL: &str = "http://localhost:8080";

#[tokio::test]
async fn test_local_store_put_get_nested_key() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path(), BASE_URL).unwrap();

    let data = Bytes::from("%PDF-1.7");
    store.put("scores/u1/song.pdf", data.clone()).await.unwrap();

    let retrieved = store.get("scores/u1/song.pdf").await.unwrap();
    assert_eq!(retrieved, data);
    assert!(dir.path().join("scores/u1/song.pdf").is_file());
}

#[tokio::test]
async fn test_local_store_exists() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path(), BASE_URL).unwrap();

    assert!(!store.exists("scores/u1/missing.pdf").await.unwrap());

    store
        .put("scores/u1/present.pdf", Bytes::from("data"))
        .await
        .unwrap();
    assert!(store.exists("scores/u1/present.pdf").await.unwrap());
    // A directory is not a blob
    assert!(!store.exists("scores/u1").await.unwrap());
}

#[tokio::test]
async fn test_local_store_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path(), BASE_URL).unwrap();

    store.put("scores/u1/a.pdf", Bytes::from("data")).await.unwrap();
    store.delete("scores/u1/a.pdf").await.unwrap();
    assert!(!store.exists("scores/u1/a.pdf").await.unwrap());

    // Deleting a nonexistent key should not error
    store.delete("scores/u1/a.pdf").await.unwrap();
}

#[tokio::test]
async fn test_local_store_get_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path(), BASE_URL).unwrap();

    let result = store.get("scores/u1/missing.pdf").await;
    assert!(matches!(result, Err(ObjectStoreError::NotFound(_))));
}

#[tokio::test]
async fn test_local_store_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path(), BASE_URL).unwrap();

    store.put("scores/u1/k.pdf", Bytes::from("first")).await.unwrap();
    store.put("scores/u1/k.pdf", Bytes::from("second")).await.unwrap();

    let data = store.get("scores/u1/k.pdf").await.unwrap();
    assert_eq!(data, Bytes::from("second"));
}

#[tokio::test]
async fn test_local_store_retrieval_url() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path(), "http://scores.example/").unwrap();

    store
        .put("scores/u1/Autumn Leaves.pdf", Bytes::from("data"))
        .await
        .unwrap();
    let url = store
        .retrieval_url("scores/u1/Autumn Leaves.pdf")
        .await
        .unwrap();
    assert_eq!(url, "http://scores.example/blobs/scores/u1/Autumn%20Leaves.pdf");
}

#[tokio::test]
async fn test_local_store_retrieval_url_requires_blob() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path(), BASE_URL).unwrap();

    let result = store.retrieval_url("scores/u1/nothing.pdf").await;
    assert!(matches!(result, Err(ObjectStoreError::NotFound(_))));
}

#[tokio::test]
async fn test_local_store_rejects_traversal() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path().join("root"), BASE_URL).unwrap();

    let result = store.put("../escape.pdf", Bytes::from("x")).await;
    assert!(matches!(result, Err(ObjectStoreError::InvalidKey(_))));
    assert!(!dir.path().join("escape.pdf").exists());
}
