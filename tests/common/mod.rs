#![allow(dead_code)]

use serde_json::json;
use tome_db::{Client, Collection, Document, MemoryStore};

pub const TEST_URI: &str = "memory://localhost:27017/library";

pub fn doc(value: serde_json::Value) -> Document {
    Document::from_json(value).unwrap()
}

/// Five books with years 1999, 2005, 2010, 2015, 2020 and genres
/// Fiction x3, Non-Fiction x1, Sci-Fi x1.
pub fn library_books() -> Vec<Document> {
    vec![
        doc(json!({ "title": "Book One", "author": "Author A", "publishedYear": 1999, "genre": "Fiction", "ISBN": "1234567890" })),
        doc(json!({ "title": "Book Two", "author": "Author B", "publishedYear": 2005, "genre": "Non-Fiction", "ISBN": "1234567891" })),
        doc(json!({ "title": "Book Three", "author": "Author A", "publishedYear": 2010, "genre": "Fiction", "ISBN": "1234567892" })),
        doc(json!({ "title": "Book Four", "author": "Author C", "publishedYear": 2015, "genre": "Sci-Fi", "ISBN": "1234567893" })),
        doc(json!({ "title": "Book Five", "author": "Author D", "publishedYear": 2020, "genre": "Fiction", "ISBN": "1234567894" })),
    ]
}

pub fn bookstore_books() -> Vec<Document> {
    vec![
        doc(json!({ "_id": 1, "title": "The Hobbit", "author": "J.R.R. Tolkien", "genre": "Fantasy", "year": 1937, "pages": 310, "price": 14.99 })),
        doc(json!({ "_id": 2, "title": "The Night Circus", "author": "Erin Morgenstern", "genre": "Fantasy", "year": 2011, "pages": 387, "price": 16.5 })),
        doc(json!({ "_id": 3, "title": "The Martian", "author": "Andy Weir", "genre": "Science Fiction", "year": 2014, "pages": 369, "price": 15.99 })),
        doc(json!({ "_id": 4, "title": "Project Hail Mary", "author": "Andy Weir", "genre": "Science Fiction", "year": 2021, "pages": 496, "price": 18.99 })),
        doc(json!({ "_id": 5, "title": "Artemis", "author": "Andy Weir", "genre": "Science Fiction", "year": 2017, "pages": 305, "price": 9.99 })),
        doc(json!({ "_id": 6, "title": "Coraline", "author": "Neil Gaiman", "genre": "Fantasy", "year": 2002, "pages": 162, "price": 7.5 })),
    ]
}

pub async fn open() -> (MemoryStore, Client) {
    let store = MemoryStore::new("localhost:27017");
    let client = Client::open(TEST_URI, &store).await.unwrap();
    (store, client)
}

pub async fn books(client: &Client) -> Collection {
    client.default_database().unwrap().collection("books").unwrap()
}

/// A `books` collection pre-loaded with [`library_books`].
pub async fn library(client: &Client) -> Collection {
    let books = books(client).await;
    books.insert_many(library_books()).await.unwrap();
    books
}

pub async fn bookstore(client: &Client) -> Collection {
    let books = client.database("bookstore").unwrap().collection("books").unwrap();
    books.insert_many(bookstore_books()).await.unwrap();
    books
}

pub fn strings(docs: &[Document], field: &str) -> Vec<String> {
    docs.iter()
        .filter_map(|d| d.get(field).and_then(|v| v.as_str()).map(str::to_string))
        .collect()
}
