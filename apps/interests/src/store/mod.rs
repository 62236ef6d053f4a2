//! Post document store. Read-only access to the social app's posts.
//!
//! Posts are kept as JSON documents in `posts (id TEXT PRIMARY KEY, doc JSONB NOT NULL)`.
//! Documents leave the database as text and are decoded one by one by the caller,
//! so one undecodable post never fails a whole page.

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// One stored post: its row key and the undecoded JSON document.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RawPost {
    pub id: String,
    pub doc: String,
}

#[async_trait]
pub trait PostStore: Send + Sync {
    /// Returns the entire current corpus as raw documents.
    async fn fetch_all(&self) -> Result<Vec<RawPost>, StoreError>;

    /// Returns up to `limit` raw documents, for inspection.
    async fn sample(&self, limit: i64) -> Result<Vec<RawPost>, StoreError>;
}

pub struct PgPostStore {
    pool: PgPool,
    page_size: i64,
}

impl PgPostStore {
    pub fn new(pool: PgPool, page_size: i64) -> Self {
        Self { pool, page_size }
    }
}

#[async_trait]
impl PostStore for PgPostStore {
    /// Reads the corpus in keyset-paginated pages so a large table never
    /// needs one giant result set.
    async fn fetch_all(&self) -> Result<Vec<RawPost>, StoreError> {
        if self.pool.is_closed() {
            return Err(StoreError::Unavailable("connection pool closed".into()));
        }
        let mut docs = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page: Vec<RawPost> = sqlx::query_as(
                r#"
                SELECT id, doc::text AS doc FROM posts
                WHERE $1::text IS NULL OR id > $1
                ORDER BY id
                LIMIT $2
                "#,
            )
            .bind(cursor.as_deref())
            .bind(self.page_size)
            .fetch_all(&self.pool)
            .await?;

            let fetched = page.len();
            cursor = page.last().map(|row| row.id.clone());
            docs.extend(page);

            if (fetched as i64) < self.page_size {
                break;
            }
        }

        debug!(posts = docs.len(), "post corpus loaded");
        Ok(docs)
    }

    async fn sample(&self, limit: i64) -> Result<Vec<RawPost>, StoreError> {
        let docs: Vec<RawPost> =
            sqlx::query_as("SELECT id, doc::text AS doc FROM posts ORDER BY id LIMIT $1")
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
        Ok(docs)
    }
}
