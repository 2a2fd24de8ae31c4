use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{store_err_with, Result};

/// Metadata key for the pattern's normalized hash, written by the
/// library at storage time and read back for prefix lookups.
pub const META_NORMALIZED_HASH: &str = "normalized_hash";
/// Metadata key for the pattern's space-joined keyword set.
pub const META_KEYWORDS: &str = "keywords";

/// A previously successful task execution, keyed by its full hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPattern {
    pub task_hash: String,
    pub description: String,
    pub last_agent: String,
    pub success_count: u32,
    pub last_used: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
}

impl StoredPattern {
    pub fn normalized_hash(&self) -> Option<&str> {
        self.metadata.get(META_NORMALIZED_HASH).map(String::as_str)
    }

    pub fn keywords(&self) -> Vec<String> {
        self.metadata
            .get(META_KEYWORDS)
            .map(|joined| joined.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// Upsert payload for [`PatternStore::add_pattern`].
#[derive(Debug, Clone)]
pub struct NewPattern {
    pub task_hash: String,
    pub description: String,
    pub last_agent: String,
    pub metadata: HashMap<String, String>,
}

/// Persistent backing store of successful task executions.
///
/// Implementations must be safe for concurrent read access: the
/// execution-history search and an independent duplicate check may hit
/// the store at the same time.
#[async_trait]
pub trait PatternStore: Send + Sync {
    /// Upsert by task hash. Re-adding an existing hash increments its
    /// success count and refreshes the agent and last-used timestamp
    /// instead of duplicating the row.
    async fn add_pattern(&self, pattern: NewPattern) -> Result<()>;

    async fn get_pattern(&self, task_hash: &str) -> Result<Option<StoredPattern>>;

    /// Patterns whose normalized hash starts with `hash_prefix`.
    async fn similar_patterns(&self, hash_prefix: &str, limit: usize)
        -> Result<Vec<StoredPattern>>;

    /// Most-successful patterns overall.
    async fn top_patterns(&self, limit: usize) -> Result<Vec<StoredPattern>>;
}

/// In-process store backed by a `RwLock`ed map. The primary test double
/// and a valid lightweight store for hosts that persist elsewhere.
#[derive(Default)]
pub struct MemoryPatternStore {
    patterns: RwLock<HashMap<String, StoredPattern>>,
}

impl MemoryPatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.patterns.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.read().is_empty()
    }
}

#[async_trait]
impl PatternStore for MemoryPatternStore {
    async fn add_pattern(&self, pattern: NewPattern) -> Result<()> {
        let mut patterns = self.patterns.write();
        let now = Utc::now();

        match patterns.get_mut(&pattern.task_hash) {
            Some(existing) => {
                existing.success_count += 1;
                existing.last_agent = pattern.last_agent;
                existing.last_used = now;
                existing.metadata.extend(pattern.metadata);
            }
            None => {
                patterns.insert(
                    pattern.task_hash.clone(),
                    StoredPattern {
                        task_hash: pattern.task_hash,
                        description: pattern.description,
                        last_agent: pattern.last_agent,
                        success_count: 1,
                        last_used: now,
                        created_at: now,
                        metadata: pattern.metadata,
                    },
                );
            }
        }
        Ok(())
    }

    async fn get_pattern(&self, task_hash: &str) -> Result<Option<StoredPattern>> {
        Ok(self.patterns.read().get(task_hash).cloned())
    }

    async fn similar_patterns(
        &self,
        hash_prefix: &str,
        limit: usize,
    ) -> Result<Vec<StoredPattern>> {
        let patterns = self.patterns.read();
        let mut matches: Vec<StoredPattern> = patterns
            .values()
            .filter(|p| {
                p.normalized_hash()
                    .is_some_and(|h| h.starts_with(hash_prefix))
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.success_count.cmp(&a.success_count));
        matches.truncate(limit);
        Ok(matches)
    }

    async fn top_patterns(&self, limit: usize) -> Result<Vec<StoredPattern>> {
        let patterns = self.patterns.read();
        let mut all: Vec<StoredPattern> = patterns.values().cloned().collect();
        all.sort_by(|a, b| {
            b.success_count
                .cmp(&a.success_count)
                .then(b.last_used.cmp(&a.last_used))
        });
        all.truncate(limit);
        Ok(all)
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS patterns (
    task_hash       TEXT PRIMARY KEY,
    description     TEXT NOT NULL,
    last_agent      TEXT NOT NULL DEFAULT '',
    success_count   INTEGER NOT NULL DEFAULT 1,
    last_used       TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    normalized_hash TEXT NOT NULL DEFAULT '',
    metadata        TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_patterns_normalized_hash ON patterns(normalized_hash);
";

/// Raw pattern row before timestamp/metadata decoding.
/// Fields: (task_hash, description, last_agent, success_count, last_used, created_at, metadata)
type PatternRow = (String, String, String, u32, String, String, String);

/// Durable store on a single sqlite file. Calls run on the blocking
/// pool behind one mutexed connection; the scale of pattern traffic
/// (one write per completed task, a handful of reads per check) does
/// not warrant a pool.
pub struct SqlitePatternStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqlitePatternStore {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        conn.execute_batch(SCHEMA)?;
        debug!(path = %db_path.display(), "Opened pattern store");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn select_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PatternRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
        ))
    }

    fn decode_row(raw: PatternRow) -> Result<StoredPattern> {
        let (task_hash, description, last_agent, success_count, last_used, created_at, metadata) =
            raw;

        let parse_ts = |value: &str| -> Result<DateTime<Utc>> {
            DateTime::parse_from_rfc3339(value)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| store_err_with("invalid timestamp", e))
        };

        let metadata: HashMap<String, String> = serde_json::from_str(&metadata)
            .map_err(|e| store_err_with("invalid metadata json", e))?;

        Ok(StoredPattern {
            task_hash,
            description,
            last_agent,
            success_count,
            last_used: parse_ts(&last_used)?,
            created_at: parse_ts(&created_at)?,
            metadata,
        })
    }
}

#[async_trait]
impl PatternStore for SqlitePatternStore {
    async fn add_pattern(&self, pattern: NewPattern) -> Result<()> {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || -> Result<()> {
            let normalized_hash = pattern
                .metadata
                .get(META_NORMALIZED_HASH)
                .cloned()
                .unwrap_or_default();
            let metadata = serde_json::to_string(&pattern.metadata)?;
            let now = Utc::now().to_rfc3339();

            let conn = conn.lock();
            conn.execute(
                "INSERT INTO patterns
                     (task_hash, description, last_agent, success_count,
                      last_used, created_at, normalized_hash, metadata)
                 VALUES (?1, ?2, ?3, 1, ?4, ?4, ?5, ?6)
                 ON CONFLICT(task_hash) DO UPDATE SET
                     success_count = success_count + 1,
                     last_agent = excluded.last_agent,
                     last_used = excluded.last_used,
                     metadata = excluded.metadata",
                params![
                    pattern.task_hash,
                    pattern.description,
                    pattern.last_agent,
                    now,
                    normalized_hash,
                    metadata
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(|e| store_err_with("add_pattern task failed", e))?
    }

    async fn get_pattern(&self, task_hash: &str) -> Result<Option<StoredPattern>> {
        let conn = Arc::clone(&self.conn);
        let task_hash = task_hash.to_string();

        tokio::task::spawn_blocking(move || -> Result<Option<StoredPattern>> {
            let conn = conn.lock();
            let raw = conn
                .query_row(
                    "SELECT task_hash, description, last_agent, success_count,
                            last_used, created_at, metadata
                     FROM patterns WHERE task_hash = ?1",
                    params![task_hash],
                    Self::select_row,
                )
                .optional()?;
            raw.map(Self::decode_row).transpose()
        })
        .await
        .map_err(|e| store_err_with("get_pattern task failed", e))?
    }

    async fn similar_patterns(
        &self,
        hash_prefix: &str,
        limit: usize,
    ) -> Result<Vec<StoredPattern>> {
        // Hash prefixes are hex, so the LIKE pattern needs no escaping.
        let conn = Arc::clone(&self.conn);
        let pattern = format!("{}%", hash_prefix);

        tokio::task::spawn_blocking(move || -> Result<Vec<StoredPattern>> {
            let conn = conn.lock();
            let mut stmt = conn.prepare(
                "SELECT task_hash, description, last_agent, success_count,
                        last_used, created_at, metadata
                 FROM patterns
                 WHERE normalized_hash LIKE ?1
                 ORDER BY success_count DESC
                 LIMIT ?2",
            )?;
            let raws = stmt
                .query_map(params![pattern, limit as i64], Self::select_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            raws.into_iter().map(Self::decode_row).collect()
        })
        .await
        .map_err(|e| store_err_with("similar_patterns task failed", e))?
    }

    async fn top_patterns(&self, limit: usize) -> Result<Vec<StoredPattern>> {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || -> Result<Vec<StoredPattern>> {
            let conn = conn.lock();
            let mut stmt = conn.prepare(
                "SELECT task_hash, description, last_agent, success_count,
                        last_used, created_at, metadata
                 FROM patterns
                 ORDER BY success_count DESC, last_used DESC
                 LIMIT ?1",
            )?;
            let raws = stmt
                .query_map(params![limit as i64], Self::select_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            raws.into_iter().map(Self::decode_row).collect()
        })
        .await
        .map_err(|e| store_err_with("top_patterns task failed", e))?
    }
}
