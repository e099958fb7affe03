//! Chunk Store - rusqlite 기반 청크 저장소
//!
//! 오프라인 전처리 결과(문서 + 청크)를 저장합니다.
//! 저장 위치: ~/.geumyeon-rag/chunks.db
//!
//! 검색 코어는 [`ChunkStore`] 트레이트만 사용하며, 서버 측 전문 검색을 가정하지 않습니다.
//! 키워드/텍스트 필터링은 [`super::ChunkStoreAdapter`]가 클라이언트 측에서 수행합니다.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, Row};
use serde::Serialize;

use super::chunk::{dedup_keywords, truncate_chars, Chunk, ChunkLocation};
use crate::config::get_data_dir;

/// 저장 시 청크 본문 최대 길이 (문자 수)
pub const MAX_PERSISTED_CONTENT_CHARS: usize = 20_000;

// ============================================================================
// ChunkStore Trait
// ============================================================================

/// 청크 저장소 트레이트 (async)
///
/// 컬렉션 전체 조회(크기 제한)만 요구합니다.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// 청크 목록 조회 (document_id 지정 시 해당 문서만)
    async fn list_chunks(&self, document_id: Option<&str>, limit: usize) -> Result<Vec<Chunk>>;
}

// ============================================================================
// Types
// ============================================================================

/// 저장된 문서
#[derive(Debug, Clone, Serialize)]
pub struct StoredDocument {
    pub id: String,
    pub title: String,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

/// 저장소 통계
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub document_count: usize,
    pub chunk_count: usize,
    pub embedded_chunk_count: usize,
    pub total_content_chars: usize,
    pub db_path: PathBuf,
}

// ============================================================================
// SqliteChunkStore
// ============================================================================

/// SQLite 청크 저장소
pub struct SqliteChunkStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl SqliteChunkStore {
    /// 저장소 열기 (없으면 생성)
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create database directory")?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open SQLite database")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        };

        store.initialize()?;
        Ok(store)
    }

    /// 기본 위치에서 열기 (~/.geumyeon-rag/chunks.db)
    pub fn open_default() -> Result<Self> {
        Self::open(&get_data_dir().join("chunks.db"))
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))
    }

    /// 스키마 초기화
    fn initialize(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                content TEXT NOT NULL,
                keywords TEXT NOT NULL DEFAULT '[]',
                section TEXT NOT NULL DEFAULT 'general',
                page INTEGER,
                embedding TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id);
            "#,
        )
        .context("Failed to create schema")?;

        tracing::debug!("Chunk store initialized at {:?}", self.db_path);
        Ok(())
    }

    /// 문서 저장 (같은 ID면 제목만 갱신)
    pub fn upsert_document(&self, id: &str, title: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO documents (id, title, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET title = excluded.title",
            params![id, title, Utc::now().to_rfc3339()],
        )
        .context("Failed to upsert document")?;
        Ok(())
    }

    /// 청크 일괄 저장 (같은 ID면 덮어쓰기)
    ///
    /// 소속 문서가 없으면 `location.document`를 제목으로 함께 생성합니다.
    /// 본문이 빈 청크는 건너뛰며, 반환값은 실제로 기록된 청크 수입니다.
    pub fn insert_chunks(&self, chunks: &[Chunk]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().context("Failed to begin transaction")?;
        let mut written = 0;

        for chunk in chunks {
            if chunk.content.trim().is_empty() {
                tracing::warn!("Skipping empty chunk: {}", chunk.id);
                continue;
            }

            tx.execute(
                "INSERT OR IGNORE INTO documents (id, title, created_at) VALUES (?1, ?2, ?3)",
                params![
                    chunk.document_id,
                    chunk.location.document,
                    Utc::now().to_rfc3339()
                ],
            )?;

            let keywords = dedup_keywords(chunk.keywords.iter().cloned());
            let embedding = chunk
                .embedding
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;

            tx.execute(
                "INSERT OR REPLACE INTO chunks
                 (id, document_id, content, keywords, section, page, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    chunk.id,
                    chunk.document_id,
                    truncate_chars(&chunk.content, MAX_PERSISTED_CONTENT_CHARS),
                    serde_json::to_string(&keywords)?,
                    chunk.location.section,
                    chunk.location.page,
                    embedding,
                ],
            )
            .with_context(|| format!("Failed to insert chunk {}", chunk.id))?;
            written += 1;
        }

        tx.commit().context("Failed to commit chunks")?;
        Ok(written)
    }

    /// 청크 목록 조회 (동기)
    pub fn load_chunks(&self, document_id: Option<&str>, limit: usize) -> Result<Vec<Chunk>> {
        let conn = self.lock()?;

        let sql = "SELECT c.id, c.document_id, c.content, c.keywords, c.section, c.page,
                          c.embedding, d.title
                   FROM chunks c JOIN documents d ON d.id = c.document_id
                   WHERE (?1 IS NULL OR c.document_id = ?1)
                   ORDER BY c.document_id, c.rowid
                   LIMIT ?2";

        let mut stmt = conn.prepare(sql)?;
        let chunks = stmt
            .query_map(params![document_id, limit as i64], row_to_chunk)?
            .filter_map(|r| match r {
                Ok(chunk) => Some(chunk),
                Err(e) => {
                    tracing::warn!("Skipping unreadable chunk row: {}", e);
                    None
                }
            })
            .collect();

        Ok(chunks)
    }

    /// 문서 목록
    pub fn list_documents(&self, limit: usize) -> Result<Vec<StoredDocument>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT d.id, d.title, d.created_at, COUNT(c.id)
             FROM documents d LEFT JOIN chunks c ON c.document_id = d.id
             GROUP BY d.id
             ORDER BY d.created_at DESC
             LIMIT ?1",
        )?;

        let docs = stmt
            .query_map(params![limit as i64], |row| {
                Ok(StoredDocument {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    created_at: parse_datetime(row.get::<_, String>(2)?),
                    chunk_count: row.get::<_, i64>(3)? as usize,
                })
            })?
            .filter_map(|r| match r {
                Ok(doc) => Some(doc),
                Err(e) => {
                    tracing::warn!("Skipping unreadable document row: {}", e);
                    None
                }
            })
            .collect();

        Ok(docs)
    }

    /// 문서 삭제 (청크 포함)
    pub fn delete_document(&self, id: &str) -> Result<bool> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM chunks WHERE document_id = ?1", params![id])?;
        let rows = conn.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// 저장소 통계
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock()?;

        let count = |sql: &str| -> i64 {
            match conn.query_row(sql, [], |row| row.get(0)) {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!("Stats query failed ({}): {}", sql, e);
                    0
                }
            }
        };

        Ok(StoreStats {
            document_count: count("SELECT COUNT(*) FROM documents") as usize,
            chunk_count: count("SELECT COUNT(*) FROM chunks") as usize,
            embedded_chunk_count: count("SELECT COUNT(*) FROM chunks WHERE embedding IS NOT NULL")
                as usize,
            total_content_chars: count("SELECT COALESCE(SUM(LENGTH(content)), 0) FROM chunks")
                as usize,
            db_path: self.db_path.clone(),
        })
    }
}

#[async_trait]
impl ChunkStore for SqliteChunkStore {
    async fn list_chunks(&self, document_id: Option<&str>, limit: usize) -> Result<Vec<Chunk>> {
        self.load_chunks(document_id, limit)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn row_to_chunk(row: &Row<'_>) -> rusqlite::Result<Chunk> {
    let id: String = row.get(0)?;
    let keywords: String = row.get(3)?;
    let embedding: Option<String> = row.get(6)?;

    let mut location =
        ChunkLocation::new(row.get::<_, String>(7)?).with_section(row.get::<_, String>(4)?);
    location.page = row.get::<_, Option<u32>>(5)?;

    let keywords = serde_json::from_str(&keywords).unwrap_or_else(|e| {
        tracing::warn!("Ignoring malformed keywords for chunk {}: {}", id, e);
        Vec::new()
    });
    let embedding = embedding.and_then(|e| match serde_json::from_str(&e) {
        Ok(vector) => Some(vector),
        Err(err) => {
            tracing::warn!("Ignoring malformed embedding for chunk {}: {}", id, err);
            None
        }
    });

    Ok(Chunk {
        id,
        document_id: row.get(1)?,
        content: row.get(2)?,
        keywords,
        location,
        embedding,
    })
}

/// RFC3339 문자열을 DateTime<Utc>로 파싱
fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// ============================================================================
// Tests
// ============================================================================
