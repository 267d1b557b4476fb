//! End-to-end scenarios against an in-process SQLite pool: the cheapest
//! real backend that exercises the full schema-probe/walker/canonicalizer
//! path without a network dependency.

use rowgraph::canon;
use rowgraph::db::{self, ConnectParams};
use rowgraph::dialect::Dialect;
use rowgraph::json;
use rowgraph::model::PkValue;
use rowgraph::orderer;
use rowgraph::schema::MetadataCache;
use rowgraph::walker::{self, ExportOptions};
use sqlx::any::AnyPool;

async fn memory_pool() -> AnyPool {
    db::connect(&ConnectParams {
        dialect: Dialect::Sqlite,
        url: "sqlite::memory:".to_string(),
        user: None,
        password: None,
    })
    .await
    .expect("in-memory sqlite connects")
}

async fn blog_schema(pool: &AnyPool) {
    sqlx::query("CREATE TABLE author (id INTEGER PRIMARY KEY, name TEXT)")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query(
        "CREATE TABLE blogpost (id INTEGER PRIMARY KEY, author_id INTEGER REFERENCES author(id), title TEXT)",
    )
    .execute(pool)
    .await
    .unwrap();
    sqlx::query(
        "CREATE TABLE comment (id INTEGER PRIMARY KEY, post_id INTEGER REFERENCES blogpost(id), body TEXT)",
    )
    .execute(pool)
    .await
    .unwrap();
}

#[tokio::test]
async fn two_table_chain_attaches_author_under_blogpost() {
    let pool = memory_pool().await;
    blog_schema(&pool).await;
    sqlx::query("INSERT INTO author (id, name) VALUES (1, 'Ada')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO blogpost (id, author_id, title) VALUES (2, 1, 'Hello')")
        .execute(&pool)
        .await
        .unwrap();

    let cache = MetadataCache::new();
    let result = walker::export(
        &pool,
        Dialect::Sqlite,
        &cache,
        "blogpost",
        PkValue::Int(2),
        &ExportOptions::new(),
    )
    .await
    .unwrap();

    let value = json::to_value(&result.root);
    assert_eq!(value["id"], 2);
    let authors = value["subRow"]["author"].as_array().unwrap();
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0]["name"], "Ada");
}

#[tokio::test]
async fn sibling_fan_out_collects_all_comments() {
    let pool = memory_pool().await;
    blog_schema(&pool).await;
    sqlx::query("INSERT INTO author (id, name) VALUES (1, 'Ada')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO blogpost (id, author_id, title) VALUES (2, 1, 'Hello')")
        .execute(&pool)
        .await
        .unwrap();
    for i in 1..=3 {
        sqlx::query("INSERT INTO comment (id, post_id, body) VALUES (?, 2, ?)")
            .bind(i)
            .bind(format!("comment {i}"))
            .execute(&pool)
            .await
            .unwrap();
    }

    let cache = MetadataCache::new();
    let result = walker::export(
        &pool,
        Dialect::Sqlite,
        &cache,
        "blogpost",
        PkValue::Int(2),
        &ExportOptions::new(),
    )
    .await
    .unwrap();

    let value = json::to_value(&result.root);
    assert_eq!(value["subRow"]["comment"].as_array().unwrap().len(), 3);
    assert_eq!(value["subRow"]["author"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn cycle_terminates_without_reattaching_the_root() {
    let pool = memory_pool().await;
    sqlx::query("CREATE TABLE a (id INTEGER PRIMARY KEY, b_id INTEGER REFERENCES b(id))")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("CREATE TABLE b (id INTEGER PRIMARY KEY, a_id INTEGER REFERENCES a(id))")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO a (id, b_id) VALUES (1, 1)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO b (id, a_id) VALUES (1, 1)")
        .execute(&pool)
        .await
        .unwrap();

    let cache = MetadataCache::new();
    let result = walker::export(
        &pool,
        Dialect::Sqlite,
        &cache,
        "a",
        PkValue::Int(1),
        &ExportOptions::new(),
    )
    .await
    .unwrap();

    let value = json::to_value(&result.root);
    let b_nodes = value["subRow"]["b"].as_array().unwrap();
    assert_eq!(b_nodes.len(), 1);
    assert!(b_nodes[0].get("subRow").is_none(), "b's re-visit of a must not re-attach");
}

#[tokio::test]
async fn stop_table_excluded_drops_the_comment_branch() {
    let pool = memory_pool().await;
    blog_schema(&pool).await;
    sqlx::query("INSERT INTO author (id, name) VALUES (1, 'Ada')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO blogpost (id, author_id, title) VALUES (2, 1, 'Hello')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO comment (id, post_id, body) VALUES (1, 2, 'hi')")
        .execute(&pool)
        .await
        .unwrap();

    let cache = MetadataCache::new();
    let opts = ExportOptions::new().with_excluded(["comment".to_string()]);
    let result = walker::export(&pool, Dialect::Sqlite, &cache, "blogpost", PkValue::Int(2), &opts)
        .await
        .unwrap();

    let value = json::to_value(&result.root);
    assert!(value["subRow"].get("comment").is_none());
    assert!(value["subRow"]["author"].is_array());
}

#[tokio::test]
async fn stop_table_included_narrows_to_author_only() {
    let pool = memory_pool().await;
    blog_schema(&pool).await;
    sqlx::query("INSERT INTO author (id, name) VALUES (1, 'Ada')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO blogpost (id, author_id, title) VALUES (2, 1, 'Hello')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO comment (id, post_id, body) VALUES (1, 2, 'hi')")
        .execute(&pool)
        .await
        .unwrap();

    let cache = MetadataCache::new();
    let opts = ExportOptions::new().with_included(["author".to_string()]);
    let result = walker::export(&pool, Dialect::Sqlite, &cache, "blogpost", PkValue::Int(2), &opts)
        .await
        .unwrap();

    let value = json::to_value(&result.root);
    assert!(value["subRow"].get("comment").is_none());
    assert_eq!(value["subRow"]["author"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn canonicalization_is_byte_identical_across_surrogate_id_sequences() {
    let pool_a = memory_pool().await;
    blog_schema(&pool_a).await;
    sqlx::query("INSERT INTO author (id, name) VALUES (1, 'Ada')")
        .execute(&pool_a)
        .await
        .unwrap();
    sqlx::query("INSERT INTO blogpost (id, author_id, title) VALUES (2, 1, 'Hello')")
        .execute(&pool_a)
        .await
        .unwrap();

    let pool_b = memory_pool().await;
    blog_schema(&pool_b).await;
    sqlx::query("INSERT INTO author (id, name) VALUES (501, 'Ada')")
        .execute(&pool_b)
        .await
        .unwrap();
    sqlx::query("INSERT INTO blogpost (id, author_id, title) VALUES (777, 501, 'Hello')")
        .execute(&pool_b)
        .await
        .unwrap();

    let cache = MetadataCache::new();

    let mut result_a = walker::export(
        &pool_a,
        Dialect::Sqlite,
        &cache,
        "blogpost",
        PkValue::Int(2),
        &ExportOptions::new(),
    )
    .await
    .unwrap();
    canon::canonicalize(&pool_a, Dialect::Sqlite, &cache, &mut result_a)
        .await
        .unwrap();

    let mut result_b = walker::export(
        &pool_b,
        Dialect::Sqlite,
        &cache,
        "blogpost",
        PkValue::Int(777),
        &ExportOptions::new(),
    )
    .await
    .unwrap();
    canon::canonicalize(&pool_b, Dialect::Sqlite, &cache, &mut result_b)
        .await
        .unwrap();

    assert_eq!(
        json::to_string(&result_a.root).unwrap(),
        json::to_string(&result_b.root).unwrap()
    );
}

#[tokio::test]
async fn case_insensitive_table_name_yields_the_same_tree() {
    let pool = memory_pool().await;
    blog_schema(&pool).await;
    sqlx::query("INSERT INTO author (id, name) VALUES (1, 'Ada')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO blogpost (id, author_id, title) VALUES (2, 1, 'Hello')")
        .execute(&pool)
        .await
        .unwrap();

    let cache = MetadataCache::new();
    let lower = walker::export(
        &pool,
        Dialect::Sqlite,
        &cache,
        "blogpost",
        PkValue::Int(2),
        &ExportOptions::new(),
    )
    .await
    .unwrap();
    let upper = walker::export(
        &pool,
        Dialect::Sqlite,
        &cache,
        "BLOGPOST",
        PkValue::Int(2),
        &ExportOptions::new(),
    )
    .await
    .unwrap();

    assert_eq!(
        json::to_string(&lower.root).unwrap(),
        json::to_string(&upper.root).unwrap()
    );
}

#[tokio::test]
async fn fk_cell_with_no_matching_row_attaches_an_empty_subrow() {
    let pool = memory_pool().await;
    blog_schema(&pool).await;
    sqlx::query("INSERT INTO blogpost (id, author_id, title) VALUES (2, 999, 'Orphan')")
        .execute(&pool)
        .await
        .unwrap();

    let cache = MetadataCache::new();
    let result = walker::export(
        &pool,
        Dialect::Sqlite,
        &cache,
        "blogpost",
        PkValue::Int(2),
        &ExportOptions::new(),
    )
    .await
    .unwrap();

    let author_cell = result.root.cell("author_id").unwrap();
    assert!(author_cell.sub_rows.get("author").map(|v| v.is_empty()).unwrap_or(true));
}

#[tokio::test]
async fn export_works_against_an_on_disk_database_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("blog.sqlite3");
    let url = format!("sqlite://{}?mode=rwc", db_path.display());

    let pool = db::connect(&ConnectParams {
        dialect: Dialect::Sqlite,
        url,
        user: None,
        password: None,
    })
    .await
    .expect("on-disk sqlite connects");
    blog_schema(&pool).await;
    sqlx::query("INSERT INTO author (id, name) VALUES (1, 'Ada')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO blogpost (id, author_id, title) VALUES (2, 1, 'Hello')")
        .execute(&pool)
        .await
        .unwrap();

    let cache = MetadataCache::new();
    let result = walker::export(
        &pool,
        Dialect::Sqlite,
        &cache,
        "blogpost",
        PkValue::Int(2),
        &ExportOptions::new(),
    )
    .await
    .unwrap();

    let value = json::to_value(&result.root);
    assert_eq!(value["subRow"]["author"][0]["name"], "Ada");
}

#[tokio::test]
async fn unknown_root_table_is_reported_as_not_found() {
    let pool = memory_pool().await;
    blog_schema(&pool).await;

    let cache = MetadataCache::new();
    let err = walker::export(
        &pool,
        Dialect::Sqlite,
        &cache,
        "nonexistent",
        PkValue::Int(1),
        &ExportOptions::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, rowgraph::error::Error::TableNotFound(_)));
}

#[tokio::test]
async fn insertion_order_places_author_before_blogpost_before_comment() {
    let pool = memory_pool().await;
    blog_schema(&pool).await;

    let cache = MetadataCache::new();
    let order = orderer::determine_insertion_order(&pool, Dialect::Sqlite, &cache, "comment", false)
        .await
        .unwrap();

    let author_pos = order.iter().position(|t| t == "author").unwrap();
    let blogpost_pos = order.iter().position(|t| t == "blogpost").unwrap();
    let comment_pos = order.iter().position(|t| t == "comment").unwrap();
    assert!(author_pos < blogpost_pos);
    assert!(blogpost_pos < comment_pos);
}

#[tokio::test]
async fn insertion_order_reports_cycle_in_strict_mode() {
    let pool = memory_pool().await;
    sqlx::query("CREATE TABLE a (id INTEGER PRIMARY KEY, b_id INTEGER REFERENCES b(id))")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("CREATE TABLE b (id INTEGER PRIMARY KEY, a_id INTEGER REFERENCES a(id))")
        .execute(&pool)
        .await
        .unwrap();

    let cache = MetadataCache::new();
    let err = orderer::determine_insertion_order(&pool, Dialect::Sqlite, &cache, "a", true)
        .await
        .unwrap_err();

    assert!(matches!(err, rowgraph::error::Error::CyclicDependencies(_)));
}
