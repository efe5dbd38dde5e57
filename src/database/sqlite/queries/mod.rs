#[cfg(test)]
mod tests;

use super::models::*;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::types::Json;
use tracing::{debug, warn};
use uuid::Uuid;

const DOCUMENT_COLUMNS: &str =
    "id, title, source, source_type, status, error_message, metadata, created_at";
const CHUNK_COLUMNS: &str =
    "id, document_id, text, start_time, end_time, embedding_id, metadata, created_at";

pub struct DocumentQueries;

impl DocumentQueries {
    /// Insert a new document in the `pending` state
    #[inline]
    pub async fn create(pool: &SqlitePool, new_document: NewDocument) -> Result<Document> {
        let document = Document {
            id: Uuid::new_v4().to_string(),
            title: new_document.title,
            source: new_document.source,
            source_type: new_document.source_type,
            status: DocumentStatus::Pending,
            error_message: None,
            metadata: Json(new_document.metadata),
            created_at: Utc::now().naive_utc(),
        };

        sqlx::query(
            "INSERT INTO documents (id, title, source, source_type, status, metadata, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&document.id)
        .bind(&document.title)
        .bind(&document.source)
        .bind(&document.source_type)
        .bind(document.status)
        .bind(&document.metadata)
        .bind(document.created_at)
        .execute(pool)
        .await
        .context("Failed to create document")?;

        debug!("Created document {} for {}", document.id, document.source);
        Ok(document)
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Document>> {
        let query = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?");
        let result = sqlx::query_as::<_, Document>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get document by id")?;

        Ok(result)
    }

    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Document>> {
        let query =
            format!("SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY created_at DESC, id");
        let documents = sqlx::query_as::<_, Document>(&query)
            .fetch_all(pool)
            .await
            .context("Failed to list documents")?;

        Ok(documents)
    }

    /// Documents that never reached `indexed` and own no chunks
    #[inline]
    pub async fn list_unindexed(pool: &SqlitePool) -> Result<Vec<Document>> {
        let query = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents d
             WHERE d.status != 'indexed'
               AND NOT EXISTS (SELECT 1 FROM chunks c WHERE c.document_id = d.id)
             ORDER BY d.created_at, d.id"
        );
        let documents = sqlx::query_as::<_, Document>(&query)
            .fetch_all(pool)
            .await
            .context("Failed to list unindexed documents")?;

        Ok(documents)
    }

    #[inline]
    pub async fn set_status(
        pool: &SqlitePool,
        id: &str,
        status: DocumentStatus,
        error_message: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE documents SET status = ?, error_message = ? WHERE id = ?")
            .bind(status)
            .bind(error_message)
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to update document status")?;

        if result.rows_affected() == 0 {
            warn!("No document {} to mark {}", id, status);
        }
        Ok(result.rows_affected() > 0)
    }

    /// Delete a document. Fails if chunks still reference it.
    #[inline]
    pub async fn delete(pool: &SqlitePool, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to delete document {id}"))?;

        Ok(result.rows_affected() > 0)
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(pool)
            .await
            .context("Failed to count documents")?;

        Ok(count)
    }
}

pub struct ChunkQueries;

impl ChunkQueries {
    /// Insert every chunk of a document and mark it `indexed` in one transaction
    #[inline]
    pub async fn create_batch_for_document(
        pool: &SqlitePool,
        document_id: &str,
        new_chunks: Vec<NewChunk>,
    ) -> Result<Vec<Chunk>> {
        let mut tx = pool
            .begin()
            .await
            .context("Failed to begin chunk transaction")?;

        let created_at = Utc::now().naive_utc();
        let mut chunks = Vec::with_capacity(new_chunks.len());
        for new_chunk in new_chunks {
            let chunk = Chunk {
                id: Uuid::new_v4().to_string(),
                document_id: document_id.to_string(),
                text: new_chunk.text,
                start_time: new_chunk.start_time,
                end_time: new_chunk.end_time,
                embedding_id: new_chunk.embedding_id,
                metadata: Json(new_chunk.metadata),
                created_at,
            };

            sqlx::query(
                "INSERT INTO chunks (id, document_id, text, start_time, end_time, embedding_id, metadata, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(&chunk.text)
            .bind(chunk.start_time)
            .bind(chunk.end_time)
            .bind(chunk.embedding_id)
            .bind(&chunk.metadata)
            .bind(chunk.created_at)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert chunk for document {document_id}"))?;

            chunks.push(chunk);
        }

        let updated =
            sqlx::query("UPDATE documents SET status = ?, error_message = NULL WHERE id = ?")
                .bind(DocumentStatus::Indexed)
                .bind(document_id)
                .execute(&mut *tx)
                .await
                .context("Failed to mark document indexed")?;
        if updated.rows_affected() == 0 {
            anyhow::bail!("Document {document_id} does not exist");
        }

        tx.commit()
            .await
            .context("Failed to commit chunk transaction")?;

        debug!(
            "Stored {} chunks for document {}",
            chunks.len(),
            document_id
        );
        Ok(chunks)
    }

    #[inline]
    pub async fn list_by_document(pool: &SqlitePool, document_id: &str) -> Result<Vec<Chunk>> {
        let query = format!(
            "SELECT {CHUNK_COLUMNS} FROM chunks WHERE document_id = ? ORDER BY embedding_id, id"
        );
        let chunks = sqlx::query_as::<_, Chunk>(&query)
            .bind(document_id)
            .fetch_all(pool)
            .await
            .context("Failed to list chunks for document")?;

        Ok(chunks)
    }

    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Chunk>> {
        let query = format!("SELECT {CHUNK_COLUMNS} FROM chunks ORDER BY embedding_id, id");
        let chunks = sqlx::query_as::<_, Chunk>(&query)
            .fetch_all(pool)
            .await
            .context("Failed to list chunks")?;

        Ok(chunks)
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(pool)
            .await
            .context("Failed to count chunks")?;

        Ok(count)
    }
}
