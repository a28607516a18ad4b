mod common;

use common::{insert_texts, setup, texts, Note};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use tessera::{field, ContinueCursor, Cursor, Order, PaginationOptions, TesseraError};

/// Walk a cursor to the end, returning every page's texts.
async fn walk<C: Cursor<Doc = Note>>(
    db: &tessera::DatabaseReader,
    query: &C,
    page_size: usize,
) -> Vec<Vec<String>> {
    let mut pages = Vec::new();
    let mut options = PaginationOptions::first(page_size);
    loop {
        let result = db.paginate(query, options).await.unwrap();
        assert!(result.page.len() <= page_size);
        pages.push(texts(&result.page));
        if result.is_done {
            return pages;
        }
        options = PaginationOptions::after(page_size, result.continue_cursor);
    }
}

#[tokio::test]
async fn test_nine_rows_in_pages_of_five() {
    let (runtime, _store) = setup();
    let names: Vec<String> = (1..=9).map(|i| format!("note {i}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    insert_texts(&runtime, &refs).await;

    let db = runtime.query_ctx().db;
    let query = db.query::<Note>();

    let first = db.paginate(&query, PaginationOptions::first(5)).await.unwrap();
    assert_eq!(first.page.len(), 5);
    assert!(!first.is_done);

    let second = db
        .paginate(&query, PaginationOptions::after(5, first.continue_cursor.clone()))
        .await
        .unwrap();
    assert_eq!(second.page.len(), 4);
    assert!(second.is_done);

    let mut all = texts(&first.page);
    all.extend(texts(&second.page));
    assert_eq!(all, names);
}

#[tokio::test]
async fn test_every_row_exactly_once() {
    let (runtime, _store) = setup();
    let names: Vec<String> = (0..10).map(|i| format!("{i:02}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    insert_texts(&runtime, &refs).await;

    let db = runtime.query_ctx().db;
    for order in [Order::Asc, Order::Desc] {
        let query = db.query::<Note>().order(order);
        let expected = texts(&db.collect(&query).await.unwrap());

        for page_size in 1..=11 {
            let pages = walk(&db, &query, page_size).await;
            let seen: Vec<String> = pages.iter().flatten().cloned().collect();
            assert_eq!(seen, expected, "page size {page_size}, {order:?}");

            let unique: HashSet<&String> = seen.iter().collect();
            assert_eq!(unique.len(), seen.len());
        }
    }
}

#[tokio::test]
async fn test_exact_multiple_finishes_without_empty_page() {
    let (runtime, _store) = setup();
    insert_texts(&runtime, &["a", "b", "c", "d"]).await;

    let db = runtime.query_ctx().db;
    let pages = walk(&db, &db.query::<Note>(), 2).await;
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[1], vec!["c", "d"]);
}

#[tokio::test]
async fn test_empty_table_is_done_at_once() {
    let (runtime, _store) = setup();
    let db = runtime.query_ctx().db;
    let result = db
        .paginate(&db.query::<Note>(), PaginationOptions::first(5))
        .await
        .unwrap();
    assert!(result.page.is_empty());
    assert!(result.is_done);
}

#[tokio::test]
async fn test_paginate_with_filter_and_index() {
    let (runtime, _store) = setup();
    insert_texts(&runtime, &["keep 3", "drop", "keep 1", "keep 2", "drop"]).await;

    let db = runtime.query_ctx().db;
    let query = db
        .query::<Note>()
        .with_index("by_text", |r| r.gte("text", "keep"))
        .filter(field("text").neq("keep 2"));
    let pages = walk(&db, &query, 1).await;
    let seen: Vec<String> = pages.into_iter().flatten().collect();
    assert_eq!(seen, vec!["keep 1", "keep 3"]);
}

#[tokio::test]
async fn test_cursor_from_other_query_is_rejected() {
    let (runtime, _store) = setup();
    insert_texts(&runtime, &["a", "b", "c"]).await;

    let db = runtime.query_ctx().db;
    let asc = db.query::<Note>().order(Order::Asc);
    let desc = db.query::<Note>().order(Order::Desc);

    let page = db.paginate(&asc, PaginationOptions::first(1)).await.unwrap();
    let err = db
        .paginate(&desc, PaginationOptions::after(1, page.continue_cursor))
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::InvalidCursor(_)));
    assert_eq!(err.failure_tag(), None);
}

#[tokio::test]
async fn test_garbled_cursor_is_rejected() {
    let (runtime, _store) = setup();
    let db = runtime.query_ctx().db;
    let err = db
        .paginate(
            &db.query::<Note>(),
            PaginationOptions::after(5, ContinueCursor::new("garbage!")),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::InvalidCursor(_)));
}

#[tokio::test]
async fn test_page_size_bounds() {
    let (runtime, _store) = setup();
    let db = runtime.query_ctx().db;
    let query = db.query::<Note>();

    for size in [0, 101] {
        let err = db
            .paginate(&query, PaginationOptions::first(size))
            .await
            .unwrap_err();
        assert!(matches!(err, TesseraError::InvalidQuery(_)), "size {size}");
    }
    assert!(db.paginate(&query, PaginationOptions::first(100)).await.is_ok());
}

#[tokio::test]
async fn test_cursor_survives_serialization() {
    let (runtime, _store) = setup();
    insert_texts(&runtime, &["a", "b", "c"]).await;

    let db = runtime.query_ctx().db;
    let query = db.query::<Note>();
    let page = db.paginate(&query, PaginationOptions::first(2)).await.unwrap();

    let wire = serde_json::to_string(&page.continue_cursor).unwrap();
    let cursor: ContinueCursor = serde_json::from_str(&wire).unwrap();
    let next = db
        .paginate(&query, PaginationOptions::after(2, cursor))
        .await
        .unwrap();
    assert_eq!(texts(&next.page), vec!["c"]);
    assert!(next.is_done);
}
