use criterion::{Criterion, black_box, criterion_group, criterion_main};
use std::time::Duration;
use tokio::runtime::Runtime;
use tome_db::{
    Client, Collection, Document, Filter, FindOptions, GroupSpec, IndexSpec, MemoryStore,
    Pipeline, SortSpec,
};

const BULK_SIZE: i64 = 10_000;
const GENRES: [&str; 4] = ["Fiction", "Non-Fiction", "Sci-Fi", "Fantasy"];

fn setup(rt: &Runtime) -> Collection {
    rt.block_on(async {
        let store = MemoryStore::new("localhost:27017");
        let client = Client::open("memory://localhost:27017/bench", &store)
            .await
            .unwrap();
        let books = client
            .default_database()
            .unwrap()
            .collection("books")
            .unwrap();

        let docs: Vec<Document> = (0..BULK_SIZE)
            .map(|i| {
                Document::new()
                    .with("title", format!("Book {}", i))
                    .with("author", format!("Author {}", i % 100))
                    .with("genre", GENRES[(i % 4) as usize])
                    .with("publishedYear", 1950 + i % 75)
                    .with("price", 5.0 + (i % 40) as f64 * 0.5)
            })
            .collect();
        books.insert_many(docs).await.unwrap();
        books
    })
}

fn bench_find(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let books = setup(&rt);
    let mut group = c.benchmark_group("find");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("range_scan", |b| {
        b.to_async(&rt).iter(|| async {
            let cursor = books
                .find(black_box(Filter::gt("publishedYear", 2000)), FindOptions::new())
                .await
                .unwrap();
            black_box(cursor.len())
        })
    });

    group.bench_function("sorted_top_10", |b| {
        b.to_async(&rt).iter(|| async {
            let options = FindOptions::new()
                .sort(SortSpec::new().desc("price"))
                .limit(10);
            let cursor = books.find(Filter::all(), options).await.unwrap();
            black_box(cursor.len())
        })
    });

    group.bench_function("equality_collection_scan", |b| {
        b.to_async(&rt).iter(|| async {
            let n = books
                .count_documents(black_box(Filter::eq("author", "Author 42")))
                .await
                .unwrap();
            black_box(n)
        })
    });

    rt.block_on(books.create_index(IndexSpec::new().asc("author")))
        .unwrap();

    group.bench_function("equality_index_scan", |b| {
        b.to_async(&rt).iter(|| async {
            let n = books
                .count_documents(black_box(Filter::eq("author", "Author 42")))
                .await
                .unwrap();
            black_box(n)
        })
    });

    group.finish();
}

fn bench_aggregate(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let books = setup(&rt);
    let mut group = c.benchmark_group("aggregate");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("group_by_genre", |b| {
        b.to_async(&rt).iter(|| async {
            let pipeline = Pipeline::new()
                .group(GroupSpec::by("genre").count("count").avg("avgPrice", "price"))
                .sort(SortSpec::new().desc("count"));
            black_box(books.aggregate(pipeline).await.unwrap().len())
        })
    });

    group.bench_function("match_group_limit", |b| {
        b.to_async(&rt).iter(|| async {
            let pipeline = Pipeline::new()
                .match_filter(Filter::gte("publishedYear", 2000))
                .group(GroupSpec::by("author").count("bookCount"))
                .sort(SortSpec::new().desc("bookCount"))
                .limit(1);
            black_box(books.aggregate(pipeline).await.unwrap().len())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_find, bench_aggregate);
criterion_main!(benches);
