use super::*;
use anyhow::Result;
use std::collections::HashSet;
use tempfile::TempDir;

async fn create_test_database() -> Result<(TempDir, Database)> {
    let temp_dir = TempDir::new()?;
    let database = Database::initialize_from_config_dir(temp_dir.path()).await?;
    Ok((temp_dir, database))
}

fn new_document(source: &str) -> NewDocument {
    NewDocument {
        title: source.to_string(),
        source: source.to_string(),
        source_type: "md".to_string(),
        metadata: models::MetadataMap::new(),
    }
}

#[tokio::test]
async fn integration_schema_migration() -> Result<()> {
    let (temp_dir, database) = create_test_database().await?;
    assert!(temp_dir.path().join("brain.db").exists());

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx%'",
    )
    .fetch_all(database.pool())
    .await?;

    let expected_tables: HashSet<&'static str> = ["documents", "chunks"].into_iter().collect();
    let actual_tables: HashSet<&str> = tables.iter().map(|t| t.as_str()).collect();
    assert_eq!(actual_tables, expected_tables);

    Ok(())
}

#[tokio::test]
async fn integration_reopen_keeps_data() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let id = {
        let database = Database::initialize_from_config_dir(temp_dir.path()).await?;
        let document = database.create_document(new_document("keep.md")).await?;
        database.pool().close().await;
        document.id
    };

    let database = Database::initialize_from_config_dir(temp_dir.path()).await?;
    let document = database
        .get_document(&id)
        .await?
        .expect("document survives reopen");
    assert_eq!(document.source, "keep.md");

    Ok(())
}

#[tokio::test]
async fn integration_document_lifecycle() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    let document = database.create_document(new_document("notes.md")).await?;
    assert_eq!(database.count_documents().await?, 1);
    assert_eq!(database.list_unindexed_documents().await?.len(), 1);

    database
        .insert_chunks(
            &document.id,
            vec![NewChunk {
                text: "chunk".to_string(),
                embedding_id: Some(0),
                ..NewChunk::default()
            }],
        )
        .await?;

    assert!(database.list_unindexed_documents().await?.is_empty());
    assert_eq!(database.count_chunks().await?, 1);
    assert_eq!(database.get_chunks_for_document(&document.id).await?.len(), 1);
    assert_eq!(database.list_chunks().await?[0].embedding_id, Some(0));

    Ok(())
}

#[tokio::test]
async fn integration_failed_document_can_be_deleted() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    let document = database.create_document(new_document("broken.md")).await?;
    assert!(
        database
            .mark_document_failed(&document.id, "HTTP 500: oops")
            .await?
    );

    let failed = database
        .get_document(&document.id)
        .await?
        .expect("document exists");
    assert!(failed.is_failed());
    assert_eq!(failed.error_message.as_deref(), Some("HTTP 500: oops"));

    assert!(database.delete_document(&document.id).await?);
    assert!(database.list_documents().await?.is_empty());

    Ok(())
}
