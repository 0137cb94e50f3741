use crate::error::{Result, StorageError};
use async_trait::async_trait;
use snip_core::{ReadRepository, Repository, ShortId, UrlRecord};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Connection, Row};
use std::time::Duration;

const SCHEMA: &str = include_str!("../ddl/postgres/urls.sql");

/// PostgreSQL implementation of the repository contract.
///
/// Rows live in a single `urls` table keyed by `short_id` with a unique
/// constraint on `target`. Deletion is soft: `delete_batch` only flips the
/// `deleted` flag, and reads still return flagged rows.
#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a repository from an existing pool. The schema is not touched.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool against `database_url` and creates the schema if needed.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(map_sqlx_error)?;

        let repository = Self::new(pool);
        repository.migrate().await?;
        Ok(repository)
    }

    /// Creates the `urls` table if it does not exist yet.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn violated_constraint(err: &sqlx::Error) -> Option<&str> {
    err.as_database_error()
        .and_then(sqlx::error::DatabaseError::constraint)
}

/// Maps a failed insert of `record` to the storage error taxonomy.
///
/// Postgres names the constraints `urls_pkey` and `urls_target_key`; any
/// other unique violation is reported against the target.
fn map_insert_error(err: sqlx::Error, record: &UrlRecord) -> StorageError {
    if !is_unique_violation(&err) {
        return map_sqlx_error(err);
    }

    match violated_constraint(&err) {
        Some("urls_pkey") => StorageError::IdTaken(record.short_id.to_string()),
        _ => StorageError::Conflict(record.target.clone()),
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_) => StorageError::InvalidData(message),
        sqlx::Error::RowNotFound => StorageError::NotFound(message),
        _ => StorageError::Query(message),
    }
}

fn row_to_record(row: &PgRow) -> Result<UrlRecord> {
    let sequence: i64 = row.try_get("sequence").map_err(map_sqlx_error)?;
    let short_id: String = row.try_get("short_id").map_err(map_sqlx_error)?;

    Ok(UrlRecord {
        sequence: u64::try_from(sequence).map_err(|_| {
            StorageError::InvalidData(format!("negative sequence {} for '{}'", sequence, short_id))
        })?,
        short_id: ShortId::new_unchecked(short_id),
        target: row.try_get("target").map_err(map_sqlx_error)?,
        owner: row.try_get("owner").map_err(map_sqlx_error)?,
        deleted: row.try_get("deleted").map_err(map_sqlx_error)?,
    })
}

#[async_trait]
impl ReadRepository for PostgresRepository {
    async fn get(&self, id: &ShortId) -> Result<UrlRecord> {
        let row = sqlx::query(
            r#"
            SELECT sequence, short_id, target, owner, deleted
            FROM urls
            WHERE short_id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Err(StorageError::NotFound(id.to_string()));
        };

        row_to_record(&row)
    }

    async fn get_by_target(&self, target: &str) -> Result<UrlRecord> {
        let row = sqlx::query(
            r#"
            SELECT sequence, short_id, target, owner, deleted
            FROM urls
            WHERE target = $1
            "#,
        )
        .bind(target)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Err(StorageError::NotFound(target.to_string()));
        };

        row_to_record(&row)
    }

    async fn find_by_owner(&self, owner: &str) -> Result<Vec<UrlRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT sequence, short_id, target, owner, deleted
            FROM urls
            WHERE owner = $1
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(row_to_record).collect()
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn save(&self, record: UrlRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO urls (short_id, target, owner)
            VALUES ($1, $2, $3)
            ON CONFLICT (target) DO NOTHING
            "#,
        )
        .bind(record.short_id.as_str())
        .bind(&record.target)
        .bind(&record.owner)
        .execute(&self.pool)
        .await
        .map_err(|err| map_insert_error(err, &record))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict(record.target));
        }

        Ok(())
    }

    async fn save_batch(&self, records: Vec<UrlRecord>) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        for record in &records {
            sqlx::query(
                r#"
                INSERT INTO urls (short_id, target, owner)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(record.short_id.as_str())
            .bind(&record.target)
            .bind(&record.owner)
            .execute(&mut *tx)
            .await
            .map_err(|err| map_insert_error(err, record))?;
        }

        // Dropping `tx` on an early return rolls the whole batch back.
        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn delete_batch(&self, ids: &[ShortId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = ids.iter().map(ShortId::to_string).collect();

        sqlx::query(
            r#"
            UPDATE urls
            SET deleted = TRUE
            WHERE short_id = ANY($1)
            "#,
        )
        .bind(ids)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }

    async fn health_check(&self, timeout: Duration) -> Result<()> {
        let ping = async {
            let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
            conn.ping().await.map_err(map_sqlx_error)
        };

        tokio::time::timeout(timeout, ping)
            .await
            .map_err(|_| StorageError::Timeout(format!("database ping exceeded {:?}", timeout)))?
    }
}
