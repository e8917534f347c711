mod common;

use common::{doc, library_books, open};
use serde_json::json;
use tome_db::{
    ErrorKind, Filter, FindOptions, InsertManyOptions, TomeError, UpdateSpec, Value,
};

#[tokio::test]
async fn test_insert_then_find_by_id_returns_the_document() {
    let (_store, client) = open().await;
    let books = common::books(&client).await;

    let originals = library_books();
    let result = books.insert_many(originals.clone()).await.unwrap();
    assert_eq!(result.inserted_count, 5);
    assert_eq!(result.inserted_ids.len(), 5);

    for (id, original) in result.inserted_ids.iter().zip(originals) {
        let found: Vec<_> = books
            .find(Filter::eq("_id", id.clone()), FindOptions::new())
            .await
            .unwrap()
            .collect();
        assert_eq!(found.len(), 1);

        let mut expected = original;
        expected.set_id(id.clone());
        assert_eq!(found[0], expected);
        // generated ids are placed first
        assert_eq!(found[0].keys().next().map(String::as_str), Some("_id"));
    }
}

#[tokio::test]
async fn test_insert_one_keeps_caller_id() {
    let (_store, client) = open().await;
    let users = client.default_database().unwrap().collection("users").unwrap();

    let result = users
        .insert_one(doc(json!({ "_id": 1, "name": "John Doe", "email": "john@example.com" })))
        .await
        .unwrap();
    assert_eq!(result.inserted_id, Value::Int(1));

    let err = users
        .insert_one(doc(json!({ "_id": 1, "name": "Someone Else" })))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Write);
}

#[tokio::test]
async fn test_ordered_insert_with_duplicate_inserts_nothing() {
    let (_store, client) = open().await;
    let products = client.default_database().unwrap().collection("products").unwrap();

    let batch = vec![
        doc(json!({ "_id": 101, "name": "Laptop", "price": 1200 })),
        doc(json!({ "_id": 102, "name": "Smartphone", "price": 800 })),
        doc(json!({ "_id": 101, "name": "Laptop again", "price": 1100 })),
        doc(json!({ "_id": 103, "name": "Tablet", "price": 600 })),
    ];
    let err = products.insert_many(batch).await.unwrap_err();
    assert!(matches!(err, TomeError::Write { applied: 0, .. }));
    assert_eq!(products.count_documents(Filter::all()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_unordered_insert_keeps_the_rest() {
    let (_store, client) = open().await;
    let products = client.default_database().unwrap().collection("products").unwrap();

    let batch = vec![
        doc(json!({ "_id": 101, "name": "Laptop", "price": 1200 })),
        doc(json!({ "_id": 102, "name": "Smartphone", "price": 800 })),
        doc(json!({ "_id": 101, "name": "Laptop again", "price": 1100 })),
        doc(json!({ "_id": 103, "name": "Tablet", "price": 600 })),
    ];
    let err = products
        .insert_many_with(batch, InsertManyOptions::unordered())
        .await
        .unwrap_err();
    assert!(matches!(err, TomeError::Write { applied: 3, .. }));
    assert_eq!(products.count_documents(Filter::all()).await.unwrap(), 3);

    let laptop = products
        .find_one(Filter::eq("_id", 101), FindOptions::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(laptop.get("name"), Some(&Value::from("Laptop")));
}

#[tokio::test]
async fn test_empty_insert_is_rejected() {
    let (_store, client) = open().await;
    let books = common::books(&client).await;
    let err = books.insert_many(vec![]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = books
        .insert_one(doc(json!({ "$title": "bad" })))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = books
        .insert_one(doc(json!({ "_id": [1, 2], "title": "bad" })))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(books.count_documents(Filter::all()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_update_one_reports_modified_only_on_change() {
    let (_store, client) = open().await;
    let books = common::library(&client).await;

    let result = books
        .update_one(
            Filter::eq("ISBN", "1234567890"),
            UpdateSpec::new().set("publishedYear", 2001),
        )
        .await
        .unwrap();
    assert_eq!((result.matched_count, result.modified_count), (1, 1));

    let result = books
        .update_one(
            Filter::eq("ISBN", "1234567890"),
            UpdateSpec::new().set("publishedYear", 2001),
        )
        .await
        .unwrap();
    assert_eq!((result.matched_count, result.modified_count), (1, 0));

    let result = books
        .update_one(Filter::eq("ISBN", "0000000000"), UpdateSpec::new().set("x", 1))
        .await
        .unwrap();
    assert_eq!((result.matched_count, result.modified_count), (0, 0));

    let book = books
        .find_one(Filter::eq("ISBN", "1234567890"), FindOptions::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(book.get("publishedYear"), Some(&Value::Int(2001)));
}

#[tokio::test]
async fn test_update_one_changes_exactly_one_of_many_matches() {
    let (_store, client) = open().await;
    let books = common::library(&client).await;

    let result = books
        .update_one(Filter::eq("genre", "Fiction"), UpdateSpec::new().set("featured", true))
        .await
        .unwrap();
    assert_eq!(result.modified_count, 1);
    assert_eq!(
        books.count_documents(Filter::eq("featured", true)).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn test_update_many_adds_field_to_every_document() {
    let (_store, client) = open().await;
    let books = common::library(&client).await;

    let result = books
        .update_many(Filter::all(), UpdateSpec::new().set("rating", 4.5))
        .await
        .unwrap();
    assert_eq!((result.matched_count, result.modified_count), (5, 5));
    assert_eq!(books.count_documents(Filter::eq("rating", 4.5)).await.unwrap(), 5);

    let result = books
        .update_many(
            Filter::eq("author", "Author A"),
            UpdateSpec::new().inc("publishedYear", 1).unset("ISBN"),
        )
        .await
        .unwrap();
    assert_eq!(result.modified_count, 2);
    assert_eq!(books.count_documents(Filter::exists("ISBN", false)).await.unwrap(), 2);
    assert_eq!(books.count_documents(Filter::eq("publishedYear", 2000)).await.unwrap(), 1);
}

#[tokio::test]
async fn test_invalid_update_is_rejected_before_dispatch() {
    let (store, client) = open().await;
    let books = common::library(&client).await;
    let before = store.get_stats().request_count;

    let err = books
        .update_many(Filter::all(), UpdateSpec::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = books
        .update_one(Filter::all(), UpdateSpec::new().set("_id", 9))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(store.get_stats().request_count, before);
}

#[tokio::test]
async fn test_delete_many_removes_only_matches() {
    let (_store, client) = open().await;
    let books = common::library(&client).await;

    let result = books.delete_many(Filter::eq("genre", "Fiction")).await.unwrap();
    assert_eq!(result.deleted_count, 3);
    assert_eq!(
        books
            .find(Filter::eq("genre", "Fiction"), FindOptions::new())
            .await
            .unwrap()
            .count(),
        0
    );
    assert_eq!(books.count_documents(Filter::all()).await.unwrap(), 2);
}

#[tokio::test]
async fn test_delete_one_removes_at_most_one() {
    let (_store, client) = open().await;
    let books = common::library(&client).await;

    let result = books.delete_one(Filter::eq("ISBN", "1234567894")).await.unwrap();
    assert_eq!(result.deleted_count, 1);
    let result = books.delete_one(Filter::eq("ISBN", "1234567894")).await.unwrap();
    assert_eq!(result.deleted_count, 0);

    let result = books.delete_one(Filter::eq("author", "Author A")).await.unwrap();
    assert_eq!(result.deleted_count, 1);
    assert_eq!(books.count_documents(Filter::all()).await.unwrap(), 3);
}

#[tokio::test]
async fn test_create_collection_twice_fails() {
    let (_store, client) = open().await;
    let db = client.default_database().unwrap();

    for name in ["users", "orders", "products"] {
        db.create_collection(name).await.unwrap();
    }
    let err = db.create_collection("users").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Write);

    assert_eq!(
        db.list_collection_names().await.unwrap(),
        vec!["orders", "products", "users"]
    );
    assert_eq!(db.create_collection("$cmd").await.unwrap_err().kind(), ErrorKind::Validation);
}
