use super::CacheStore;
use crate::Database;
use crate::error::{Error, ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use sqlx::SqlitePool;
use time::UtcDateTime;

#[derive(sqlx::FromRow)]
struct EntryRow {
    namespace: String,
    content_hash: String,
    value: String,
    created_at: i64,
}

/// A stored resolution, as persisted in the `entries` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub namespace: String,
    pub content_hash: String,
    pub value: String,
    pub created_at: UtcDateTime,
}

impl TryFrom<EntryRow> for Entry {
    type Error = Error;
    fn try_from(row: EntryRow) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            namespace: row.namespace,
            content_hash: row.content_hash,
            value: row.value,
            created_at: UtcDateTime::from_unix_timestamp(row.created_at)
                .or_raise(|| ErrorKind::InvalidData("creation date"))?,
        })
    }
}

/// Cache namespace persisted in SQLite, shared across processes and builds.
///
/// All namespaces live in one table, partitioned by the `namespace` column.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    name: String,
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(db: &Database, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pool: db.pool().clone(),
        }
    }

    /// Full entry for `hash`, including when it was first stored.
    pub async fn entry(&self, hash: &str) -> Result<Option<Entry>> {
        let row: Option<EntryRow> = sqlx::query_as(include_str!("../../queries/get_entry.sql"))
            .bind(&self.name)
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Entry::try_from).transpose()
    }

    /// Number of entries in this namespace.
    pub async fn len(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as(include_str!("../../queries/count_entries.sql"))
            .bind(&self.name)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("entry count"))
    }
}

#[async_trait]
impl CacheStore for SqliteStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, hash: &str) -> Result<Option<String>> {
        Ok(self.entry(hash).await?.map(|entry| entry.value))
    }

    async fn set(&self, hash: &str, value: &str) -> Result<bool> {
        let result = sqlx::query(include_str!("../../queries/insert_entry.sql"))
            .bind(&self.name)
            .bind(hash)
            .bind(value)
            .bind(UtcDateTime::now().unix_timestamp())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() == 1)
    }
}
