//! # gb-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational model
//! and the `gb-core` domain models. Entry ids are stored as 16-byte BLOBs,
//! timestamps as sqlx's UTC text encoding.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gb_core::models::{EntryFilter, GuestbookEntry, NewEntry, ScanEvent, SiteStatus};
use gb_core::traits::{GuestbookRepo, ScanRepo, StatusRepo};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS guestbook_entries (
    id          BLOB PRIMARY KEY NOT NULL,
    name        TEXT NOT NULL,
    phone       TEXT,
    message     TEXT NOT NULL,
    photo_url   TEXT,
    published   INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_guestbook_published_created
    ON guestbook_entries (published, created_at DESC);

CREATE TABLE IF NOT EXISTS status (
    id          INTEGER PRIMARY KEY CHECK (id = 1),
    message     TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS scan_events (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    path        TEXT NOT NULL,
    ip_hash     TEXT NOT NULL,
    ua_hash     TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
"#;

const ENTRY_COLUMNS: &str = "id, name, phone, message, photo_url, published, created_at";

/// One pool serving all three repositories.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connects (creating the database file if needed) and bootstraps the schema.
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // Every connection to `:memory:` is a separate database, so pin one.
        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        info!("sqlite schema ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn entry_from_row(row: &SqliteRow) -> Result<GuestbookEntry, sqlx::Error> {
    Ok(GuestbookEntry {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        message: row.try_get("message")?,
        photo_url: row.try_get("photo_url")?,
        published: row.try_get("published")?,
        created_at: row.try_get("created_at")?,
    })
}

fn entries_from_rows(rows: Vec<SqliteRow>) -> anyhow::Result<Vec<GuestbookEntry>> {
    rows.iter()
        .map(|row| entry_from_row(row).map_err(Into::into))
        .collect()
}

#[async_trait]
impl GuestbookRepo for SqliteStore {
    async fn create_entry(&self, entry: NewEntry) -> anyhow::Result<GuestbookEntry> {
        let id = Uuid::now_v7();
        let created_at = Utc::now();

        sqlx::query(
            "INSERT INTO guestbook_entries (id, name, phone, message, photo_url, published, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(&entry.name)
        .bind(&entry.phone)
        .bind(&entry.message)
        .bind(&entry.photo_url)
        .bind(entry.published)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(GuestbookEntry {
            id,
            name: entry.name,
            phone: entry.phone,
            message: entry.message,
            photo_url: entry.photo_url,
            published: entry.published,
            created_at,
        })
    }

    async fn list_published(&self, limit: i64) -> anyhow::Result<Vec<GuestbookEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM guestbook_entries WHERE published = 1 \
             ORDER BY created_at DESC, id DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        entries_from_rows(rows)
    }

    async fn list_entries(
        &self,
        filter: EntryFilter,
        limit: i64,
    ) -> anyhow::Result<Vec<GuestbookEntry>> {
        let condition = match filter {
            EntryFilter::Unpublished => "WHERE published = 0",
            EntryFilter::All => "",
        };
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM guestbook_entries {condition} \
             ORDER BY created_at DESC, id DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        entries_from_rows(rows)
    }

    async fn set_published(
        &self,
        id: Uuid,
        published: bool,
    ) -> anyhow::Result<Option<GuestbookEntry>> {
        let row = sqlx::query(&format!(
            "UPDATE guestbook_entries SET published = ? WHERE id = ? RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(published)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(entry_from_row).transpose()?)
    }

    async fn get_entry(&self, id: Uuid) -> anyhow::Result<Option<GuestbookEntry>> {
        let row = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM guestbook_entries WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(entry_from_row).transpose()?)
    }

    async fn delete_entry(&self, id: Uuid) -> anyhow::Result<Option<GuestbookEntry>> {
        let row = sqlx::query(&format!(
            "DELETE FROM guestbook_entries WHERE id = ? RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(entry_from_row).transpose()?)
    }

    async fn count_entries(&self) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM guestbook_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn delete_all(&self) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM guestbook_entries")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl StatusRepo for SqliteStore {
    async fn get_status(&self) -> anyhow::Result<Option<SiteStatus>> {
        let row = sqlx::query("SELECT message, updated_at FROM status WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(SiteStatus {
                message: row.try_get("message")?,
                updated_at: row.try_get("updated_at")?,
            })),
            None => Ok(None),
        }
    }

    /// Upserts the singleton row.
    async fn set_status(&self, message: &str, at: DateTime<Utc>) -> anyhow::Result<SiteStatus> {
        sqlx::query(
            "INSERT INTO status (id, message, updated_at) VALUES (1, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET message = excluded.message, updated_at = excluded.updated_at",
        )
        .bind(message)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(SiteStatus {
            message: message.to_string(),
            updated_at: at,
        })
    }
}

#[async_trait]
impl ScanRepo for SqliteStore {
    async fn record_scan(&self, event: ScanEvent) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO scan_events (path, ip_hash, ua_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&event.path)
        .bind(&event.ip_hash)
        .bind(&event.ua_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count_scans(&self) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scan_events")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteStore {
        SqliteStore::new("sqlite::memory:").await.unwrap()
    }

    fn new_entry(name: &str, published: bool) -> NewEntry {
        NewEntry {
            name: name.into(),
            phone: None,
            message: "Hello from the lake".into(),
            photo_url: None,
            published,
        }
    }

    #[tokio::test]
    async fn create_and_list_published_newest_first() {
        let repo = store().await;
        let first = repo.create_entry(new_entry("Ana", true)).await.unwrap();
        repo.create_entry(new_entry("Hidden", false)).await.unwrap();
        let third = repo.create_entry(new_entry("Omar", true)).await.unwrap();

        let listed = repo.list_published(50).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![third.id, first.id]);
        assert_eq!(listed[1].name, "Ana");

        assert_eq!(repo.list_published(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn filters_pending_entries() {
        let repo = store().await;
        repo.create_entry(new_entry("Ana", true)).await.unwrap();
        let hidden = repo.create_entry(new_entry("Hidden", false)).await.unwrap();

        let pending = repo.list_entries(EntryFilter::Unpublished, 10).await.unwrap();
        let ids: Vec<_> = pending.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![hidden.id]);
        assert_eq!(repo.list_entries(EntryFilter::All, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn publish_and_delete_report_missing_rows() {
        let repo = store().await;
        let entry = repo.create_entry(new_entry("Ana", false)).await.unwrap();

        let updated = repo.set_published(entry.id, true).await.unwrap().unwrap();
        assert!(updated.published);
        assert!(repo.get_entry(entry.id).await.unwrap().unwrap().published);

        let deleted = repo.delete_entry(entry.id).await.unwrap().unwrap();
        assert_eq!(deleted.name, "Ana");
        assert!(repo.delete_entry(entry.id).await.unwrap().is_none());
        assert!(repo.set_published(entry.id, true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_all_counts_rows() {
        let repo = store().await;
        for name in ["a", "b", "c"] {
            repo.create_entry(new_entry(name, true)).await.unwrap();
        }
        assert_eq!(repo.count_entries().await.unwrap(), 3);
        assert_eq!(repo.delete_all().await.unwrap(), 3);
        assert_eq!(repo.count_entries().await.unwrap(), 0);
        assert_eq!(repo.delete_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn status_is_a_singleton() {
        let repo = store().await;
        assert!(repo.get_status().await.unwrap().is_none());

        repo.set_status("Closed for winter", Utc::now()).await.unwrap();
        repo.set_status("Open again", Utc::now()).await.unwrap();

        let status = repo.get_status().await.unwrap().unwrap();
        assert_eq!(status.message, "Open again");
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM status")
            .fetch_one(repo.pool())
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn scans_are_appended() {
        let repo = store().await;
        let event = ScanEvent {
            path: "/h".into(),
            ip_hash: "abc".into(),
            ua_hash: "def".into(),
        };
        repo.record_scan(event.clone()).await.unwrap();
        repo.record_scan(event).await.unwrap();
        assert_eq!(repo.count_scans().await.unwrap(), 2);
    }
}
