use anyhow::Context;
use log::error;
use serde_json::json;
use std::process::ExitCode;
use tome_db::{
    Client, ClientConfig, Collection, Cursor, Database, Document, Expression, Filter, FindOptions,
    GroupSpec, IndexSpec, MemoryStore, Pipeline, ProjectSpec, Projection, QueryBuilder, SortSpec,
    UpdateSpec,
};

fn docs(values: serde_json::Value) -> anyhow::Result<Vec<Document>> {
    let serde_json::Value::Array(items) = values else {
        anyhow::bail!("fixture must be a JSON array");
    };
    items
        .into_iter()
        .map(|item| Document::from_json(item).map_err(Into::into))
        .collect()
}

fn print_all(cursor: Cursor) {
    for doc in cursor {
        println!("  {}", doc);
    }
}

async fn library(db: &Database) -> anyhow::Result<()> {
    println!("\n📚 Library ({})", db.name());

    let books = db.create_collection("books").await?;
    let inserted = books
        .insert_many(docs(json!([
            { "title": "Book One", "author": "Author A", "publishedYear": 1999, "genre": "Fiction", "ISBN": "1234567890" },
            { "title": "Book Two", "author": "Author B", "publishedYear": 2005, "genre": "Non-Fiction", "ISBN": "1234567891" },
            { "title": "Book Three", "author": "Author A", "publishedYear": 2010, "genre": "Fiction", "ISBN": "1234567892" },
            { "title": "Book Four", "author": "Author C", "publishedYear": 2015, "genre": "Sci-Fi", "ISBN": "1234567893" },
            { "title": "Book Five", "author": "Author D", "publishedYear": 2020, "genre": "Fiction", "ISBN": "1234567894" }
        ]))?)
        .await?;
    println!("Inserted {} book(s)", inserted.inserted_count);

    println!("\n=== All Books ===");
    print_all(books.find(Filter::all(), FindOptions::new()).await?);

    println!("\n=== Books by Author A ===");
    print_all(books.find(Filter::eq("author", "Author A"), FindOptions::new()).await?);

    println!("\n=== Books Published After 2000 ===");
    print_all(books.find(Filter::gt("publishedYear", 2000), FindOptions::new()).await?);

    let result = books
        .update_one(
            Filter::eq("ISBN", "1234567890"),
            UpdateSpec::new().set("publishedYear", 2001),
        )
        .await?;
    println!("\nUpdated publishedYear on {} book(s)", result.modified_count);

    let result = books
        .update_many(Filter::all(), UpdateSpec::new().set("rating", 4.5))
        .await?;
    println!("Added rating to {} book(s)", result.modified_count);

    // Aggregate before deleting.
    println!("\n=== Books per Genre ===");
    print_all(
        books
            .aggregate(Pipeline::new().group(GroupSpec::by("genre").count("count")))
            .await?,
    );

    println!("\n=== Average Published Year ===");
    print_all(
        books
            .aggregate(Pipeline::new().group(GroupSpec::all().avg("avgYear", "publishedYear")))
            .await?,
    );

    println!("\n=== Top-Rated Book ===");
    print_all(
        books
            .aggregate(Pipeline::new().sort(SortSpec::new().desc("rating")).limit(1))
            .await?,
    );

    println!("\n=== Indexing ===");
    let query = Filter::eq("author", "Author A");
    let before = books.explain(query.clone(), FindOptions::new()).await?;
    let name = books.create_index(IndexSpec::new().asc("author")).await?;
    let after = books.explain(query, FindOptions::new()).await?;
    println!("Before index: {}", before);
    println!("Created index '{}'", name);
    println!("After index:  {}", after);

    let deleted = books.delete_one(Filter::eq("ISBN", "1234567894")).await?;
    println!("\nDeleted {} book(s) by ISBN", deleted.deleted_count);
    let deleted = books.delete_many(Filter::eq("genre", "Fiction")).await?;
    println!("Deleted {} Fiction book(s)", deleted.deleted_count);

    for name in ["users", "orders", "products"] {
        db.create_collection(name).await?;
    }
    db.collection("users")?
        .insert_many(docs(json!([
            { "_id": 1, "name": "John Doe", "email": "john@example.com" },
            { "_id": 2, "name": "Jane Smith", "email": "jane@example.com" },
            { "_id": 3, "name": "Alice Johnson", "email": "alice@example.com" }
        ]))?)
        .await?;
    db.collection("products")?
        .insert_many(docs(json!([
            { "_id": 101, "name": "Laptop", "price": 1200 },
            { "_id": 102, "name": "Smartphone", "price": 800 },
            { "_id": 103, "name": "Tablet", "price": 600 }
        ]))?)
        .await?;
    db.collection("orders")?
        .insert_many(docs(json!([
            { "_id": 201, "userId": 1, "products": [{ "productId": 101, "quantity": 2 }] },
            { "_id": 202, "userId": 2, "products": [{ "productId": 102, "quantity": 1 }] },
            { "_id": 203, "userId": 3, "products": [{ "productId": 103, "quantity": 3 }] }
        ]))?)
        .await?;
    println!("\nCollections: {}", db.list_collection_names().await?.join(", "));
    Ok(())
}

async fn seed_bookstore(books: &Collection) -> anyhow::Result<()> {
    books
        .insert_many(docs(json!([
            { "title": "Harry Potter and the Sorcerer's Stone", "author": "J.K. Rowling", "genre": "Fantasy", "year": 1997, "pages": 309, "price": 10.99, "ISBN": "978-0590353427" },
            { "title": "Harry Potter and the Chamber of Secrets", "author": "J.K. Rowling", "genre": "Fantasy", "year": 1998, "pages": 341, "price": 11.99, "ISBN": "978-0439708180" },
            { "title": "The Hobbit", "author": "J.R.R. Tolkien", "genre": "Fantasy", "year": 1937, "pages": 310, "price": 14.99, "ISBN": "978-0547928227" },
            { "title": "The Night Circus", "author": "Erin Morgenstern", "genre": "Fantasy", "year": 2011, "pages": 387, "price": 16.5, "ISBN": "978-0307744432" },
            { "title": "The Martian", "author": "Andy Weir", "genre": "Science Fiction", "year": 2014, "pages": 369, "price": 15.99, "ISBN": "978-0553418026" },
            { "title": "Project Hail Mary", "author": "Andy Weir", "genre": "Science Fiction", "year": 2021, "pages": 496, "price": 18.99, "ISBN": "978-0593135204" },
            { "title": "Educated", "author": "Tara Westover", "genre": "Memoir", "year": 2018, "pages": 334, "price": 13.5, "ISBN": "978-0399590504" },
            { "title": "Sapiens", "author": "Yuval Noah Harari", "genre": "History", "year": 2014, "pages": 443, "price": 19.99, "ISBN": "978-0062316097" }
        ]))?)
        .await?;
    Ok(())
}

async fn bookstore(db: &Database) -> anyhow::Result<()> {
    println!("\n🛒 Bookstore ({})", db.name());
    let books = db.collection("books")?;
    seed_bookstore(&books).await?;

    println!("\n=== Books by J.K. Rowling ===");
    print_all(books.find(Filter::eq("author", "J.K. Rowling"), FindOptions::new()).await?);

    println!("\n=== Updating Book Price ===");
    let result = books
        .update_one(
            Filter::eq("title", "Harry Potter and the Sorcerer's Stone"),
            UpdateSpec::new().set("price", 12.99),
        )
        .await?;
    println!("Modified {} document(s)", result.modified_count);

    println!("\n=== Deleting Book ===");
    let result = books.delete_one(Filter::eq("ISBN", "978-0439708180")).await?;
    println!("Deleted {} document(s)", result.deleted_count);

    println!("\n=== Long Books After 2010 ===");
    let long_recent = QueryBuilder::new().gt("pages", 300).gt("year", 2010);
    print_all(books.find(long_recent, FindOptions::new()).await?);

    println!("\n=== Fantasy Books by Price ===");
    print_all(
        books
            .find(
                Filter::eq("genre", "Fantasy"),
                FindOptions::new().sort(SortSpec::new().desc("price")),
            )
            .await?,
    );

    println!("\n=== Books (Title & Author Only) ===");
    print_all(
        books
            .find(
                Filter::all(),
                FindOptions::new()
                    .projection(Projection::include(["title", "author"]).exclude_id())
                    .limit(5),
            )
            .await?,
    );

    println!("\n=== Book Count by Genre ===");
    print_all(
        books
            .aggregate(
                Pipeline::new()
                    .group(GroupSpec::by("genre").count("count"))
                    .sort(SortSpec::new().desc("count")),
            )
            .await?,
    );

    println!("\n=== Average Price by Genre ===");
    print_all(
        books
            .aggregate(
                Pipeline::new()
                    .group(GroupSpec::by("genre").avg("avgPrice", "price").count("count"))
                    .project(
                        ProjectSpec::new()
                            .include("_id")
                            .computed("avgPrice", Expression::round(Expression::field("avgPrice"), 2))
                            .include("count"),
                    ),
            )
            .await?,
    );

    println!("\n=== Most Prolific Author ===");
    print_all(
        books
            .aggregate(
                Pipeline::new()
                    .group(GroupSpec::by("author").count("bookCount"))
                    .sort(SortSpec::new().desc("bookCount"))
                    .limit(1),
            )
            .await?,
    );

    println!("\n=== Creating Index ===");
    let name = books.create_index(IndexSpec::new().asc("title")).await?;
    println!("Created index '{}' on 'title' field", name);

    println!("\n=== Query Explanation ===");
    let stats = books
        .explain(Filter::eq("title", "The Hobbit"), FindOptions::new())
        .await?;
    println!("{}", stats);
    Ok(())
}

async fn run(config: ClientConfig) -> anyhow::Result<()> {
    let uri = config.connection_uri()?;
    let store = MemoryStore::for_uri(&uri);
    Client::run(&config.uri, &store, |client| async move {
        println!("Connected to {}", client.uri());
        library(&client.default_database()?)
            .await
            .context("library script failed")?;
        bookstore(&client.database("bookstore")?)
            .await
            .context("bookstore script failed")?;
        Ok::<(), anyhow::Error>(())
    })
    .await?;
    println!("\nConnection closed");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    match run(ClientConfig::from_env()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
