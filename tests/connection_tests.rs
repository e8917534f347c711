mod common;

use common::{TEST_URI, open};
use tome_db::{Client, ClientConfig, ErrorKind, Filter, FindOptions, MemoryStore, TomeError};

#[tokio::test]
async fn test_open_and_ping() {
    let (store, client) = open().await;
    client.ping().await.unwrap();
    assert_eq!(store.get_stats().open_sessions, 1);
    assert_eq!(client.uri().port, 27017);
    assert_eq!(client.default_database().unwrap().name(), "library");
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_and_malformed_uris_fail() {
    let store = MemoryStore::new("localhost:27017");

    for uri in [
        "memory://localhost:27018/library",
        "memory://otherhost/library",
        "mongodb://localhost:27017/library",
        "localhost:27017",
        "memory://localhost:notaport",
        "memory:///library",
    ] {
        let err = Client::open(uri, &store).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection, "uri {}", uri);
    }
    assert_eq!(store.get_stats().open_sessions, 0);
}

#[tokio::test]
async fn test_default_port_and_database() {
    let store = MemoryStore::new("localhost:27017");
    let client = Client::open("memory://localhost", &store).await.unwrap();
    assert_eq!(client.default_database().unwrap().name(), "test");
    client.close().await.unwrap();

    let client = Client::open_with_config(&ClientConfig::new(TEST_URI), &store)
        .await
        .unwrap();
    assert_eq!(client.default_database().unwrap().name(), "library");
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_close_twice_is_noop_and_ops_after_close_fail() {
    let (store, client) = open().await;
    let books = common::library(&client).await;

    client.close().await.unwrap();
    client.close().await.unwrap();
    assert!(client.is_closed());
    assert_eq!(store.get_stats().open_sessions, 0);

    let err = books.find(Filter::all(), FindOptions::new()).await.unwrap_err();
    assert!(matches!(err, TomeError::Connection(_)));
    let err = client.ping().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);

    // the data outlives the client
    assert_eq!(store.get_stats().document_count, 5);
}

#[tokio::test]
async fn test_closing_a_clone_closes_the_connection() {
    let (_store, client) = open().await;
    let other = client.clone();
    other.close().await.unwrap();
    assert!(client.is_closed());
}

#[tokio::test]
async fn test_run_closes_on_success() {
    let store = MemoryStore::new("localhost:27017");
    let count = Client::run(TEST_URI, &store, |client| async move {
        let books = common::library(&client).await;
        books.count_documents(Filter::all()).await
    })
    .await
    .unwrap();
    assert_eq!(count, 5);
    assert_eq!(store.get_stats().open_sessions, 0);
}

#[tokio::test]
async fn test_run_closes_on_error_and_keeps_it() {
    let store = MemoryStore::new("localhost:27017");
    let err = Client::run(TEST_URI, &store, |client| async move {
        let books = common::books(&client).await;
        books.insert_many(Vec::new()).await
    })
    .await
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(store.get_stats().open_sessions, 0);
}

#[tokio::test]
async fn test_invalid_names_are_rejected() {
    let (_store, client) = open().await;
    assert_eq!(client.database("my.db").unwrap_err().kind(), ErrorKind::Validation);
    assert_eq!(client.database("").unwrap_err().kind(), ErrorKind::Validation);

    let db = client.default_database().unwrap();
    assert_eq!(db.collection("").unwrap_err().kind(), ErrorKind::Validation);
    assert_eq!(db.collection("a$b").unwrap_err().kind(), ErrorKind::Validation);
}
