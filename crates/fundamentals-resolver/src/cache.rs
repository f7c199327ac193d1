use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fscore_core::{CacheEntry, CacheError, FundamentalsRecord, PersistentCache};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;

/// Process-lifetime cache
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an entry as-is, keeping its timestamp
    pub fn put_entry(&self, entry: CacheEntry) {
        self.entries.insert(entry.company_key.clone(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl PersistentCache for MemoryCache {
    async fn get(&self, company_key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.entries.get(company_key).map(|e| e.value().clone()))
    }

    async fn put(&self, company_key: &str, record: &FundamentalsRecord) -> Result<CacheEntry, CacheError> {
        let entry = CacheEntry::new(company_key, record.clone());
        self.entries.insert(company_key.to_string(), entry.clone());
        Ok(entry)
    }
}

fn backend(e: sqlx::Error) -> CacheError {
    CacheError::Backend(e.to_string())
}

/// One row per company key holding the record as JSON
pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    /// Open (creating if needed) the database behind a `sqlite:` URL
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        if let Some(parent) = sqlite_file(url).and_then(|path| path.parent()) {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| CacheError::Backend(format!("creating {}: {}", parent.display(), e)))?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(url)
            .await
            .map_err(backend)?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, CacheError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS fundamentals_cache (
                company_key TEXT PRIMARY KEY,
                record_json TEXT NOT NULL,
                written_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .map_err(backend)?;

        Ok(Self { pool })
    }
}

/// File path of a `sqlite://path?opts` URL; `None` for in-memory databases
fn sqlite_file(url: &str) -> Option<&Path> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path.starts_with(":memory:") {
        return None;
    }
    Some(Path::new(path))
}

#[async_trait]
impl PersistentCache for SqliteCache {
    async fn get(&self, company_key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT record_json, written_at FROM fundamentals_cache WHERE company_key = ?",
        )
        .bind(company_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        let Some((record_json, written_at)) = row else {
            return Ok(None);
        };
        let record: FundamentalsRecord = serde_json::from_str(&record_json)?;
        let written_at = DateTime::parse_from_rfc3339(&written_at)
            .map_err(|e| CacheError::Backend(format!("bad written_at '{}': {}", written_at, e)))?
            .with_timezone(&Utc);

        Ok(Some(CacheEntry {
            company_key: company_key.to_string(),
            record,
            written_at,
        }))
    }

    async fn put(&self, company_key: &str, record: &FundamentalsRecord) -> Result<CacheEntry, CacheError> {
        let entry = CacheEntry::new(company_key, record.clone());
        let record_json = serde_json::to_string(&entry.record)?;

        sqlx::query(
            "INSERT INTO fundamentals_cache (company_key, record_json, written_at) VALUES (?, ?, ?)
             ON CONFLICT(company_key) DO UPDATE SET record_json = excluded.record_json, written_at = excluded.written_at",
        )
        .bind(company_key)
        .bind(&record_json)
        .bind(entry.written_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fscore_core::{PartialFundamentals, SourceKind};

    fn record(revenue: f64) -> FundamentalsRecord {
        let mut partial = PartialFundamentals::default();
        partial.revenue.current = Some(revenue);
        partial.report_period = Some("2024".into());
        partial.complete(SourceKind::MarketSite, Some("https://site.test/x".into()))
    }

    async fn memory_sqlite() -> SqliteCache {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory SQLite");
        SqliteCache::from_pool(pool).await.unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_round_trip_and_overwrite() {
        let cache = memory_sqlite().await;
        assert!(cache.get("saab").await.unwrap().is_none());

        let first = cache.put("saab", &record(100.0)).await.unwrap();
        let loaded = cache.get("saab").await.unwrap().unwrap();
        assert_eq!(loaded.record, first.record);
        assert_eq!(loaded.written_at, first.written_at);

        cache.put("saab", &record(200.0)).await.unwrap();
        let loaded = cache.get("saab").await.unwrap().unwrap();
        assert_eq!(loaded.record.revenue.current, 200.0);
        assert!(cache.get("bioarctic").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_corrupt_row_is_an_error() {
        let cache = memory_sqlite().await;
        sqlx::query("INSERT INTO fundamentals_cache VALUES ('saab', '{broken', '2024-01-01T00:00:00Z')")
            .execute(&cache.pool)
            .await
            .unwrap();
        assert!(matches!(cache.get("saab").await, Err(CacheError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_memory_cache_keeps_seeded_timestamp() {
        let cache = MemoryCache::new();
        let mut entry = CacheEntry::new("saab", record(1.0));
        entry.written_at = Utc::now() - chrono::Duration::days(30);
        let written_at = entry.written_at;
        cache.put_entry(entry);

        assert_eq!(cache.get("saab").await.unwrap().unwrap().written_at, written_at);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_sqlite_file_paths() {
        assert_eq!(sqlite_file("sqlite://cache/fscore.db?mode=rwc"), Some(Path::new("cache/fscore.db")));
        assert_eq!(sqlite_file("sqlite:fscore.db"), Some(Path::new("fscore.db")));
        assert_eq!(sqlite_file("sqlite::memory:"), None);
        assert_eq!(sqlite_file("postgres://x"), None);
    }
}
