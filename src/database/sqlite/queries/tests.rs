use super::*;
use serde_json::json;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tempfile::TempDir;

async fn create_test_pool() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(
            SqliteConnectOptions::new()
                .filename(&db_path)
                .create_if_missing(true)
                .foreign_keys(true),
        )
        .await
        .expect("Failed to create test pool");

    sqlx::migrate!("src/database/sqlite/migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    (temp_dir, pool)
}

fn new_document(source: &str) -> NewDocument {
    let mut metadata = MetadataMap::new();
    metadata.insert("origin".to_string(), json!("test"));
    NewDocument {
        title: format!("Title of {source}"),
        source: source.to_string(),
        source_type: "txt".to_string(),
        metadata,
    }
}

fn new_chunk(text: &str, embedding_id: i64) -> NewChunk {
    NewChunk {
        text: text.to_string(),
        embedding_id: Some(embedding_id),
        ..NewChunk::default()
    }
}

#[tokio::test]
async fn document_crud_operations() {
    let (_temp_dir, pool) = create_test_pool().await;

    let created = DocumentQueries::create(&pool, new_document("a.txt"))
        .await
        .expect("Failed to create document");
    assert_eq!(created.status, DocumentStatus::Pending);
    assert!(Uuid::parse_str(&created.id).is_ok());

    let retrieved = DocumentQueries::get_by_id(&pool, &created.id)
        .await
        .expect("Failed to get document")
        .expect("Document should exist");
    assert_eq!(retrieved.id, created.id);
    assert_eq!(retrieved.title, "Title of a.txt");
    assert_eq!(retrieved.metadata.0.get("origin"), Some(&json!("test")));
    assert_eq!(retrieved.status, DocumentStatus::Pending);

    let updated =
        DocumentQueries::set_status(&pool, &created.id, DocumentStatus::Failed, Some("boom"))
            .await
            .expect("Failed to update status");
    assert!(updated);

    let failed = DocumentQueries::get_by_id(&pool, &created.id)
        .await
        .expect("Failed to get document")
        .expect("Document should exist");
    assert_eq!(failed.status, DocumentStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("boom"));

    assert!(
        DocumentQueries::delete(&pool, &created.id)
            .await
            .expect("Failed to delete")
    );
    assert!(
        DocumentQueries::get_by_id(&pool, &created.id)
            .await
            .expect("Failed to get document")
            .is_none()
    );
    assert_eq!(DocumentQueries::count(&pool).await.expect("count"), 0);
}

#[tokio::test]
async fn set_status_on_missing_document() {
    let (_temp_dir, pool) = create_test_pool().await;
    let updated = DocumentQueries::set_status(&pool, "missing", DocumentStatus::Indexed, None)
        .await
        .expect("query runs");
    assert!(!updated);
}

#[tokio::test]
async fn chunk_batch_marks_document_indexed() {
    let (_temp_dir, pool) = create_test_pool().await;
    let document = DocumentQueries::create(&pool, new_document("b.txt"))
        .await
        .expect("Failed to create document");

    let chunks = ChunkQueries::create_batch_for_document(
        &pool,
        &document.id,
        vec![new_chunk("first", 0), new_chunk("second", 1)],
    )
    .await
    .expect("Failed to insert chunks");
    assert_eq!(chunks.len(), 2);

    let stored = ChunkQueries::list_by_document(&pool, &document.id)
        .await
        .expect("Failed to list chunks");
    let texts: Vec<&str> = stored.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second"]);

    let indexed = DocumentQueries::get_by_id(&pool, &document.id)
        .await
        .expect("Failed to get document")
        .expect("Document should exist");
    assert!(indexed.is_indexed());

    let embedding_ids: Vec<Option<i64>> = ChunkQueries::list_all(&pool)
        .await
        .expect("Failed to list all chunks")
        .iter()
        .map(|c| c.embedding_id)
        .collect();
    assert_eq!(embedding_ids, vec![Some(0), Some(1)]);
    assert_eq!(ChunkQueries::count(&pool).await.expect("count"), 2);
}

#[tokio::test]
async fn duplicate_embedding_id_rolls_back_whole_batch() {
    let (_temp_dir, pool) = create_test_pool().await;
    let document = DocumentQueries::create(&pool, new_document("c.txt"))
        .await
        .expect("Failed to create document");

    let result = ChunkQueries::create_batch_for_document(
        &pool,
        &document.id,
        vec![new_chunk("one", 5), new_chunk("two", 5)],
    )
    .await;
    assert!(result.is_err());

    assert_eq!(ChunkQueries::count(&pool).await.expect("count"), 0);
    let document = DocumentQueries::get_by_id(&pool, &document.id)
        .await
        .expect("Failed to get document")
        .expect("Document should exist");
    assert_eq!(document.status, DocumentStatus::Pending);
}

#[tokio::test]
async fn chunks_require_existing_document() {
    let (_temp_dir, pool) = create_test_pool().await;
    let result =
        ChunkQueries::create_batch_for_document(&pool, "no-such-document", vec![new_chunk("x", 0)])
            .await;
    assert!(result.is_err());
    assert_eq!(ChunkQueries::count(&pool).await.expect("count"), 0);
}

#[tokio::test]
async fn document_with_chunks_cannot_be_deleted() {
    let (_temp_dir, pool) = create_test_pool().await;
    let document = DocumentQueries::create(&pool, new_document("d.txt"))
        .await
        .expect("Failed to create document");
    ChunkQueries::create_batch_for_document(&pool, &document.id, vec![new_chunk("kept", 0)])
        .await
        .expect("Failed to insert chunks");

    assert!(DocumentQueries::delete(&pool, &document.id).await.is_err());
}

#[tokio::test]
async fn list_unindexed_skips_indexed_and_chunked_documents() {
    let (_temp_dir, pool) = create_test_pool().await;

    let pending = DocumentQueries::create(&pool, new_document("pending.txt"))
        .await
        .expect("create");
    let failed = DocumentQueries::create(&pool, new_document("failed.txt"))
        .await
        .expect("create");
    DocumentQueries::set_status(&pool, &failed.id, DocumentStatus::Failed, Some("provider"))
        .await
        .expect("update");
    let indexed = DocumentQueries::create(&pool, new_document("indexed.txt"))
        .await
        .expect("create");
    ChunkQueries::create_batch_for_document(&pool, &indexed.id, vec![new_chunk("text", 0)])
        .await
        .expect("insert");

    let unindexed = DocumentQueries::list_unindexed(&pool)
        .await
        .expect("Failed to list unindexed");
    let mut ids: Vec<String> = unindexed.into_iter().map(|d| d.id).collect();
    ids.sort();
    let mut expected = vec![pending.id, failed.id];
    expected.sort();
    assert_eq!(ids, expected);

    assert_eq!(
        DocumentQueries::list_all(&pool).await.expect("list").len(),
        3
    );
}
