use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::database::sqlite::models::{Chunk, Document, DocumentStatus, NewChunk, NewDocument};
use crate::database::sqlite::queries::{ChunkQueries, DocumentQueries};

#[cfg(test)]
mod tests;

pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    /// Open `brain.db` inside `base_dir`, creating the directory if needed
    #[inline]
    pub async fn initialize_from_config_dir(base_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(base_dir).with_context(|| {
            format!("Failed to create data directory: {}", base_dir.display())
        })?;

        Self::new(base_dir.join("brain.db")).await
    }

    // Document operations
    #[inline]
    pub async fn create_document(&self, document: NewDocument) -> Result<Document> {
        DocumentQueries::create(&self.pool, document).await
    }

    #[inline]
    pub async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        DocumentQueries::get_by_id(&self.pool, id).await
    }

    #[inline]
    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        DocumentQueries::list_all(&self.pool).await
    }

    #[inline]
    pub async fn list_unindexed_documents(&self) -> Result<Vec<Document>> {
        DocumentQueries::list_unindexed(&self.pool).await
    }

    #[inline]
    pub async fn mark_document_failed(&self, id: &str, error_message: &str) -> Result<bool> {
        DocumentQueries::set_status(&self.pool, id, DocumentStatus::Failed, Some(error_message))
            .await
    }

    #[inline]
    pub async fn delete_document(&self, id: &str) -> Result<bool> {
        DocumentQueries::delete(&self.pool, id).await
    }

    #[inline]
    pub async fn count_documents(&self) -> Result<i64> {
        DocumentQueries::count(&self.pool).await
    }

    // Chunk operations
    #[inline]
    pub async fn insert_chunks(&self, document_id: &str, chunks: Vec<NewChunk>) -> Result<Vec<Chunk>> {
        ChunkQueries::create_batch_for_document(&self.pool, document_id, chunks).await
    }

    #[inline]
    pub async fn get_chunks_for_document(&self, document_id: &str) -> Result<Vec<Chunk>> {
        ChunkQueries::list_by_document(&self.pool, document_id).await
    }

    #[inline]
    pub async fn list_chunks(&self) -> Result<Vec<Chunk>> {
        ChunkQueries::list_all(&self.pool).await
    }

    #[inline]
    pub async fn count_chunks(&self) -> Result<i64> {
        ChunkQueries::count(&self.pool).await
    }
}
