//! Dedup ledger: items rejected by the quality filter.
//!
//! A row keyed by TMDB id means "don't resolve or filter this again" until
//! an operator flips `reprocess` on. Every operation is one statement
//! against the pool, so writes from the control surface are visible to a
//! running pipeline immediately; nothing is cached in-process.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Row, Sqlite, SqlitePool};

use crate::enrichment::MetadataRecord;
use crate::error::Result;
use crate::model::{MediaCategory, StreamItem};

/// A persisted skip entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkipRecord {
    pub tmdb_id: i64,
    pub dispatcharr_id: i64,
    pub category: MediaCategory,
    pub group_name: String,
    pub name: String,
    pub reprocess: bool,
}

impl<'r> FromRow<'r, SqliteRow> for SkipRecord {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        let stream_type: String = row.try_get("stream_type")?;
        let category = stream_type
            .parse::<MediaCategory>()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "stream_type".to_string(),
                source: e.into(),
            })?;
        Ok(Self {
            tmdb_id: row.try_get("tmdb_id")?,
            dispatcharr_id: row.try_get("dispatcharr_id")?,
            category,
            group_name: row.try_get("group_name")?,
            name: row.try_get("name")?,
            reprocess: row.try_get("reprocess")?,
        })
    }
}

/// Storage seam for the ledger, so the pipeline can run against a stub.
#[async_trait]
pub trait SkipLedger: Send + Sync {
    /// True only when a row exists for `tmdb_id` with reprocess off.
    async fn is_skipped(&self, category: MediaCategory, tmdb_id: i64) -> Result<bool>;

    /// Same check keyed by upstream stream ids, used before any lookup.
    /// True when any of `stream_ids` belongs to a skipped row.
    async fn is_any_stream_skipped(&self, category: MediaCategory, stream_ids: &[i64]) -> Result<bool>;

    /// Upsert a skip row; always resets reprocess to false.
    async fn mark_skipped(
        &self,
        category: MediaCategory,
        group: &str,
        metadata: &MetadataRecord,
        item: &StreamItem,
    ) -> Result<()>;

    /// Toggle the reprocess flag. Returns false when no row exists.
    async fn set_reprocess(&self, tmdb_id: i64, allow: bool) -> Result<bool>;

    async fn get(&self, tmdb_id: i64) -> Result<Option<SkipRecord>>;

    async fn list(&self, category: Option<MediaCategory>) -> Result<Vec<SkipRecord>>;
}

const STREAM_ID_CHUNK: usize = 500;

/// SQLite-backed ledger.
#[derive(Debug, Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SkipLedger for SqliteLedger {
    async fn is_skipped(&self, category: MediaCategory, tmdb_id: i64) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM skipped_streams WHERE tmdb_id = ? AND stream_type = ? AND reprocess = FALSE",
        )
        .bind(tmdb_id)
        .bind(category.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn is_any_stream_skipped(&self, category: MediaCategory, stream_ids: &[i64]) -> Result<bool> {
        // Chunked to stay under SQLite's bound-parameter limit.
        for chunk in stream_ids.chunks(STREAM_ID_CHUNK) {
            let mut query: QueryBuilder<'_, Sqlite> =
                QueryBuilder::new("SELECT 1 FROM skipped_streams WHERE stream_type = ");
            query.push_bind(category.as_str());
            query.push(" AND reprocess = FALSE AND dispatcharr_id IN (");
            let mut ids = query.separated(", ");
            for id in chunk {
                ids.push_bind(*id);
            }
            ids.push_unseparated(") LIMIT 1");

            let row: Option<(i64,)> = query.build_query_as().fetch_optional(&self.pool).await?;
            if row.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn mark_skipped(
        &self,
        category: MediaCategory,
        group: &str,
        metadata: &MetadataRecord,
        item: &StreamItem,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO skipped_streams (tmdb_id, dispatcharr_id, stream_type, group_name, name, reprocess)
            VALUES (?, ?, ?, ?, ?, FALSE)
            ON CONFLICT(tmdb_id) DO UPDATE SET
                dispatcharr_id = excluded.dispatcharr_id,
                stream_type = excluded.stream_type,
                group_name = excluded.group_name,
                name = excluded.name,
                reprocess = FALSE
            "#,
        )
        .bind(metadata.id)
        .bind(item.id)
        .bind(category.as_str())
        .bind(group)
        .bind(&metadata.title)
        .execute(&self.pool)
        .await?;

        tracing::info!(
            target: "ledger",
            "Marked {} '{}' (tmdb {}) as skipped",
            category,
            metadata.title,
            metadata.id
        );
        Ok(())
    }

    async fn set_reprocess(&self, tmdb_id: i64, allow: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE skipped_streams SET reprocess = ? WHERE tmdb_id = ?")
            .bind(allow)
            .bind(tmdb_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, tmdb_id: i64) -> Result<Option<SkipRecord>> {
        let record = sqlx::query_as::<_, SkipRecord>(
            "SELECT tmdb_id, dispatcharr_id, stream_type, group_name, name, reprocess FROM skipped_streams WHERE tmdb_id = ?",
        )
        .bind(tmdb_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn list(&self, category: Option<MediaCategory>) -> Result<Vec<SkipRecord>> {
        let records = match category {
            Some(cat) => {
                sqlx::query_as::<_, SkipRecord>(
                    "SELECT tmdb_id, dispatcharr_id, stream_type, group_name, name, reprocess FROM skipped_streams WHERE stream_type = ? ORDER BY name",
                )
                .bind(cat.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, SkipRecord>(
                    "SELECT tmdb_id, dispatcharr_id, stream_type, group_name, name, reprocess FROM skipped_streams ORDER BY stream_type, name",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{mock_movie_record, mock_stream, temp_ledger};

    #[tokio::test]
    async fn test_mark_and_check_skipped() {
        let (ledger, _dir) = temp_ledger().await;
        let record = mock_movie_record(550, "Fight Club", 1999);
        let stream = mock_stream(12, "Fight Club (1999)", "Movies");

        assert!(!ledger.is_skipped(MediaCategory::Movie, 550).await.unwrap());

        ledger
            .mark_skipped(MediaCategory::Movie, "Movies", &record, &stream)
            .await
            .unwrap();

        assert!(ledger.is_skipped(MediaCategory::Movie, 550).await.unwrap());
        assert!(ledger.is_any_stream_skipped(MediaCategory::Movie, &[12]).await.unwrap());
        // Category is part of the key for lookups
        assert!(!ledger.is_skipped(MediaCategory::Episode, 550).await.unwrap());
    }

    #[tokio::test]
    async fn test_reprocess_flag_lifts_skip() {
        let (ledger, _dir) = temp_ledger().await;
        let record = mock_movie_record(1, "Film", 2001);
        let stream = mock_stream(2, "Film (2001)", "Movies");
        ledger
            .mark_skipped(MediaCategory::Movie, "Movies", &record, &stream)
            .await
            .unwrap();

        assert!(ledger.set_reprocess(1, true).await.unwrap());
        assert!(!ledger.is_skipped(MediaCategory::Movie, 1).await.unwrap());
        assert!(!ledger.is_any_stream_skipped(MediaCategory::Movie, &[2]).await.unwrap());

        // Unknown id reports no change
        assert!(!ledger.set_reprocess(999, true).await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_skipped_upserts_and_resets_reprocess() {
        let (ledger, _dir) = temp_ledger().await;
        let record = mock_movie_record(1, "Film", 2001);
        ledger
            .mark_skipped(MediaCategory::Movie, "Old Group", &record, &mock_stream(2, "Film", "Old Group"))
            .await
            .unwrap();
        ledger.set_reprocess(1, true).await.unwrap();

        ledger
            .mark_skipped(MediaCategory::Movie, "New Group", &record, &mock_stream(3, "Film", "New Group"))
            .await
            .unwrap();

        let row = ledger.get(1).await.unwrap().unwrap();
        assert_eq!(row.group_name, "New Group");
        assert_eq!(row.dispatcharr_id, 3);
        assert!(!row.reprocess);
        assert_eq!(ledger.list(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_filters_by_category() {
        let (ledger, _dir) = temp_ledger().await;
        ledger
            .mark_skipped(
                MediaCategory::Movie,
                "Movies",
                &mock_movie_record(1, "B Film", 2001),
                &mock_stream(1, "B Film", "Movies"),
            )
            .await
            .unwrap();
        ledger
            .mark_skipped(
                MediaCategory::Episode,
                "Shows",
                &mock_movie_record(2, "A Show", 2010),
                &mock_stream(2, "A Show S01E01", "Shows"),
            )
            .await
            .unwrap();

        let movies = ledger.list(Some(MediaCategory::Movie)).await.unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].name, "B Film");
        assert_eq!(movies[0].category, MediaCategory::Movie);

        let all = ledger.list(None).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_any_stream_matches_within_set() {
        let (ledger, _dir) = temp_ledger().await;
        let record = mock_movie_record(70523, "Dark", 2017);
        ledger
            .mark_skipped(MediaCategory::Episode, "Shows", &record, &mock_stream(100, "Dark S01E02", "Shows"))
            .await
            .unwrap();

        assert!(!ledger.is_any_stream_skipped(MediaCategory::Episode, &[]).await.unwrap());
        assert!(!ledger.is_any_stream_skipped(MediaCategory::Episode, &[99, 101]).await.unwrap());
        assert!(ledger.is_any_stream_skipped(MediaCategory::Episode, &[99, 100, 101]).await.unwrap());

        // Spans more than one chunk of bound ids.
        let many: Vec<i64> = (1000..2200).chain([100]).collect();
        assert!(ledger.is_any_stream_skipped(MediaCategory::Episode, &many).await.unwrap());
        assert!(!ledger.is_any_stream_skipped(MediaCategory::Movie, &many).await.unwrap());
    }
}
