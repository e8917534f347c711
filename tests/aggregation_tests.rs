mod common;

use common::open;
use std::collections::HashMap;
use tome_db::{
    Accumulator, ErrorKind, Expression, Filter, GroupSpec, Pipeline, ProjectSpec, SortSpec, Value,
};

#[tokio::test]
async fn test_group_by_genre_counts() {
    let (_store, client) = open().await;
    let books = common::library(&client).await;

    let groups: HashMap<String, i64> = books
        .aggregate(Pipeline::new().group(GroupSpec::by("genre").count("count")))
        .await
        .unwrap()
        .map(|doc| {
            (
                doc.get("_id").and_then(Value::as_str).unwrap().to_string(),
                doc.get("count").and_then(Value::as_i64).unwrap(),
            )
        })
        .collect();

    let expected: HashMap<String, i64> = [("Fiction", 3), ("Sci-Fi", 1), ("Non-Fiction", 1)]
        .into_iter()
        .map(|(genre, n)| (genre.to_string(), n))
        .collect();
    assert_eq!(groups, expected);
}

#[tokio::test]
async fn test_group_then_sort_orders_by_count() {
    let (_store, client) = open().await;
    let books = common::library(&client).await;

    let docs = books
        .aggregate(
            Pipeline::new()
                .group(GroupSpec::by("genre").count("count"))
                .sort(SortSpec::new().desc("count").asc("_id")),
        )
        .await
        .unwrap()
        .into_vec();
    let ids: Vec<&str> = docs
        .iter()
        .filter_map(|d| d.get("_id").and_then(Value::as_str))
        .collect();
    assert_eq!(ids, vec!["Fiction", "Non-Fiction", "Sci-Fi"]);
}

#[tokio::test]
async fn test_average_published_year_over_all_books() {
    let (_store, client) = open().await;
    let books = common::library(&client).await;

    let docs = books
        .aggregate(Pipeline::new().group(GroupSpec::all().avg("avgYear", "publishedYear")))
        .await
        .unwrap()
        .into_vec();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].get("_id"), Some(&Value::Null));
    let avg = docs[0].get("avgYear").and_then(Value::as_f64).unwrap();
    assert!((avg - 2009.8).abs() < 1e-9);
}

#[tokio::test]
async fn test_average_price_rounded_to_two_places() {
    let (_store, client) = open().await;
    let books = common::bookstore(&client).await;

    let docs = books
        .aggregate(
            Pipeline::new()
                .group(GroupSpec::by("genre").avg("avgPrice", "price").count("count"))
                .project(
                    ProjectSpec::new()
                        .include("_id")
                        .computed("avgPrice", Expression::round(Expression::field("avgPrice"), 2))
                        .include("count"),
                )
                .sort(SortSpec::new().asc("_id")),
        )
        .await
        .unwrap()
        .into_vec();
    assert_eq!(docs.len(), 2);

    let fantasy = &docs[0];
    assert_eq!(fantasy.get("_id"), Some(&Value::from("Fantasy")));
    assert_eq!(fantasy.get("count"), Some(&Value::Int(3)));
    assert!((fantasy.get("avgPrice").and_then(Value::as_f64).unwrap() - 13.0).abs() < 1e-9);

    let scifi = &docs[1];
    assert_eq!(scifi.get("_id"), Some(&Value::from("Science Fiction")));
    assert!((scifi.get("avgPrice").and_then(Value::as_f64).unwrap() - 14.99).abs() < 1e-9);
}

#[tokio::test]
async fn test_most_prolific_author() {
    let (_store, client) = open().await;
    let books = common::bookstore(&client).await;

    let docs = books
        .aggregate(
            Pipeline::new()
                .group(GroupSpec::by("author").count("bookCount"))
                .sort(SortSpec::new().desc("bookCount"))
                .limit(1),
        )
        .await
        .unwrap()
        .into_vec();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].get("_id"), Some(&Value::from("Andy Weir")));
    assert_eq!(docs[0].get("bookCount"), Some(&Value::Int(3)));
}

#[tokio::test]
async fn test_match_then_sum_stays_integral() {
    let (_store, client) = open().await;
    let books = common::bookstore(&client).await;

    let docs = books
        .aggregate(
            Pipeline::new()
                .match_filter(Filter::eq("genre", "Fantasy"))
                .group(
                    GroupSpec::by("genre")
                        .sum("pages", "pages")
                        .min("cheapest", "price")
                        .max("newest", "year")
                        .accumulate("priceTotal", Accumulator::Sum(Expression::field("price"))),
                ),
        )
        .await
        .unwrap()
        .into_vec();
    assert_eq!(docs.len(), 1);
    let group = &docs[0];
    assert_eq!(group.get("pages"), Some(&Value::Int(859)));
    assert_eq!(group.get("cheapest"), Some(&Value::Float(7.5)));
    assert_eq!(group.get("newest"), Some(&Value::Int(2011)));
    assert!(matches!(group.get("priceTotal"), Some(Value::Float(_))));
}

#[tokio::test]
async fn test_top_rated_after_update() {
    let (_store, client) = open().await;
    let books = common::library(&client).await;
    books
        .update_one(
            Filter::eq("title", "Book Four"),
            tome_db::UpdateSpec::new().set("rating", 4.9),
        )
        .await
        .unwrap();

    let top = books
        .aggregate(Pipeline::new().sort(SortSpec::new().desc("rating")).limit(1))
        .await
        .unwrap()
        .into_vec();
    assert_eq!(top[0].get("title"), Some(&Value::from("Book Four")));
}

#[tokio::test]
async fn test_invalid_pipelines_are_rejected() {
    let (_store, client) = open().await;
    let books = common::library(&client).await;

    let invalid = [
        Pipeline::new().limit(0),
        Pipeline::new().sort(SortSpec::new()),
        Pipeline::new().group(GroupSpec::by("genre").count("a.b")),
        Pipeline::new().project(
            ProjectSpec::new().computed("x", Expression::round(Expression::field("price"), 101)),
        ),
    ];
    for pipeline in invalid {
        let err = books.aggregate(pipeline).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}

#[tokio::test]
async fn test_aggregate_missing_collection_is_empty() {
    let (_store, client) = open().await;
    let missing = client.default_database().unwrap().collection("nothing").unwrap();
    let cursor = missing
        .aggregate(Pipeline::new().group(GroupSpec::by("genre").count("count")))
        .await
        .unwrap();
    assert_eq!(cursor.len(), 0);
}
