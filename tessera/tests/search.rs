mod common;

use common::{insert_texts, setup, texts, Note};
use pretty_assertions::assert_eq;
use tessera::{field, PaginationOptions, TesseraError, VectorSearch};

#[tokio::test]
async fn test_search_with_filter_field() {
    let (runtime, _store) = setup();
    let db = runtime.mutation_ctx().db;
    db.insert(&Note::tagged("Hello, world!", "greeting")).await.unwrap();
    db.insert(&Note::tagged("Mexican burrito recipe", "recipe")).await.unwrap();

    let query = db
        .query::<Note>()
        .with_search_index("search_text", |q| q.search("text", "Hello").eq("tag", "greeting"));
    let rows = db.collect(&query).await.unwrap();
    assert_eq!(texts(&rows), vec!["Hello, world!"]);

    let wrong_tag = db
        .query::<Note>()
        .with_search_index("search_text", |q| q.search("text", "Hello").eq("tag", "recipe"));
    assert!(db.collect(&wrong_tag).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_search_ranks_by_relevance() {
    let (runtime, _store) = setup();
    insert_texts(&runtime, &["banana pie", "apple tart", "apple pie", "cherry"]).await;

    let db = runtime.query_ctx().db;
    let query = db
        .query::<Note>()
        .with_search_index("search_text", |q| q.search("text", "apple pie"));
    assert_eq!(
        texts(&db.collect(&query).await.unwrap()),
        vec!["apple pie", "banana pie", "apple tart"]
    );

    // Partially typed last word
    let partial = db
        .query::<Note>()
        .with_search_index("search_text", |q| q.search("text", "cher"));
    assert_eq!(texts(&db.collect(&partial).await.unwrap()), vec!["cherry"]);
}

#[tokio::test]
async fn test_search_with_post_filter() {
    let (runtime, _store) = setup();
    insert_texts(&runtime, &["pie one", "pie two", "pie three"]).await;

    let db = runtime.query_ctx().db;
    let query = db
        .query::<Note>()
        .with_search_index("search_text", |q| q.search("text", "pie"))
        .filter(field("text").neq("pie two"));
    assert_eq!(
        texts(&db.collect(&query).await.unwrap()),
        vec!["pie one", "pie three"]
    );
}

#[tokio::test]
async fn test_invalid_search_is_rejected() {
    let (runtime, _store) = setup();
    let db = runtime.query_ctx().db;

    let unknown = db
        .query::<Note>()
        .with_search_index("search_title", |q| q.search("text", "x"));
    assert!(matches!(
        db.collect(&unknown).await,
        Err(TesseraError::InvalidQuery(_))
    ));

    let undeclared_filter = db
        .query::<Note>()
        .with_search_index("search_text", |q| q.search("text", "x").eq("author", "Joe"));
    assert!(matches!(
        db.first(&undeclared_filter).await,
        Err(TesseraError::InvalidQuery(_))
    ));

    let no_term = db.query::<Note>().with_search_index("search_text", |q| q);
    assert!(matches!(
        db.first(&no_term).await,
        Err(TesseraError::InvalidQuery(_))
    ));
}

#[tokio::test]
async fn test_paginate_search_results() {
    let (runtime, _store) = setup();
    let names: Vec<String> = (1..=5).map(|i| format!("soup {i}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    insert_texts(&runtime, &refs).await;

    let db = runtime.query_ctx().db;
    let query = db
        .query::<Note>()
        .with_search_index("search_text", |q| q.search("text", "soup"));

    let first = db.paginate(&query, PaginationOptions::first(3)).await.unwrap();
    assert!(!first.is_done);
    let second = db
        .paginate(&query, PaginationOptions::after(3, first.continue_cursor))
        .await
        .unwrap();
    assert!(second.is_done);

    let mut seen = texts(&first.page);
    seen.extend(texts(&second.page));
    assert_eq!(seen, names);
}

async fn insert_vectors(runtime: &tessera::Runtime) {
    let db = runtime.mutation_ctx().db;
    for (vector, tag) in [
        ([1.0, 1.0, 1.0], "x"),
        ([0.0, 0.0, 0.0], "y"),
        ([1.0, 1.0, 0.0], "y"),
        ([1.0, 1.0, 0.0], "x"),
    ] {
        let mut note = Note::tagged(format!("{vector:?}"), tag);
        note.embedding = Some(vector.to_vec());
        db.insert(&note).await.unwrap();
    }
}

#[tokio::test]
async fn test_vector_search_nearest_first() {
    let (runtime, _store) = setup();
    insert_vectors(&runtime).await;

    let db = runtime.query_ctx().db;
    let results = db
        .vector_search(&VectorSearch::<Note>::new("by_embedding", vec![1.0, 1.0, 1.0]).limit(3))
        .await
        .unwrap();
    let distances: Vec<f64> = results.iter().map(|r| r.distance).collect();
    assert_eq!(distances, vec![0.0, 1.0, 1.0]);

    let nearest = db.get(&results[0].id).await.unwrap().unwrap();
    assert_eq!(nearest.tag.as_deref(), Some("x"));
}

#[tokio::test]
async fn test_vector_search_with_filter() {
    let (runtime, _store) = setup();
    insert_vectors(&runtime).await;

    let db = runtime.query_ctx().db;
    let search = VectorSearch::<Note>::new("by_embedding", vec![1.0, 1.0, 1.0])
        .limit(5)
        .filter("tag", "y");
    let results = db.vector_search(&search).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].distance, 1.0);
    assert!((results[1].distance - 3f64.sqrt()).abs() < 1e-9);
}

#[tokio::test]
async fn test_vector_search_arguments_are_checked() {
    let (runtime, _store) = setup();
    let db = runtime.query_ctx().db;
    let base = VectorSearch::<Note>::new("by_embedding", vec![1.0, 1.0, 1.0]);

    for search in [
        base.clone().limit(0),
        base.clone().limit(17),
        VectorSearch::new("by_embedding", vec![1.0, 1.0]),
        VectorSearch::new("by_other", vec![1.0, 1.0, 1.0]),
        base.clone().filter("text", "x"),
    ] {
        let err = db.vector_search(&search).await.unwrap_err();
        assert!(matches!(err, TesseraError::InvalidQuery(_)), "{search:?}");
    }
    assert!(db.vector_search(&base.limit(16)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_vector_search_from_action() {
    let (runtime, _store) = setup();
    insert_vectors(&runtime).await;

    let ctx = runtime.action_ctx();
    let results = ctx
        .vector_search(&VectorSearch::<Note>::new("by_embedding", vec![0.0, 0.0, 0.0]).limit(1))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].distance, 0.0);

    let id = results[0].id.clone();
    let text = ctx
        .run_query(|q| async move {
            let row = q.db.get(&id).await?;
            Ok::<_, TesseraError>(row.map(|row| row.into_data().text))
        })
        .await
        .unwrap();
    assert_eq!(text.as_deref(), Some("[0.0, 0.0, 0.0]"));
}
