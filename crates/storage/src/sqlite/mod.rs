use std::sync::Arc;
use std::time::Duration;

use sqlx::{Row, SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{RowCounts, Storage, StorageError, SubjectRepository, TopicRepository};

mod mapping;
mod migrate;
mod subject_repo;
mod topic_repo;

#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Connect to `SQLite` using the given URL.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the connection cannot be established or if
    /// enforcing foreign key constraints fails during setup.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA foreign_keys = ON;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA journal_mode = WAL;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA busy_timeout = 5000;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;
        tracing::debug!(database_url, "connected to sqlite");
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }

    /// Current number of rows per entity.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the counts cannot be read.
    pub async fn row_counts(&self) -> Result<RowCounts, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                (SELECT COUNT(*) FROM subjects) AS subjects,
                (SELECT COUNT(*) FROM topic_groups) AS topic_groups,
                (SELECT COUNT(*) FROM topics) AS topics,
                (SELECT COUNT(*) FROM questions) AS questions,
                (SELECT COUNT(*) FROM answer_choices) AS choices
            ",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(mapping::storage_error)?;

        let count = |column: &'static str| -> Result<usize, StorageError> {
            let value: i64 = row.try_get(column).map_err(mapping::ser)?;
            usize::try_from(value)
                .map_err(|_| StorageError::Serialization(format!("invalid {column} count")))
        };
        Ok(RowCounts {
            subjects: count("subjects")?,
            topic_groups: count("topic_groups")?,
            topics: count("topics")?,
            questions: count("questions")?,
            choices: count("choices")?,
        })
    }
}

impl Storage {
    /// Build a `Storage` backed by `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        let subjects: Arc<dyn SubjectRepository> = Arc::new(repo.clone());
        let topics: Arc<dyn TopicRepository> = Arc::new(repo);
        Ok(Self { subjects, topics })
    }
}
