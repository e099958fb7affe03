//! Knowledge 모듈 - 청크 저장소 및 조회
//!
//! - Chunk: 문서 텍스트 조각 + 키워드 + 인용 위치
//! - Store: SQLite 청크 저장소 ([`ChunkStore`] 구현)
//! - Adapter: 키워드/텍스트 OR 매칭 조회, 저장소 장애 시 빈 결과
//! - Vector: 코사인 유사도

mod adapter;
mod chunk;
mod store;
mod vector;

// Re-exports
pub use adapter::{filter_by_keyword, filter_by_text, matches_any, ChunkStoreAdapter};
pub use chunk::{dedup_keywords, truncate_chars, Chunk, ChunkLocation, DEFAULT_SECTION};
pub use store::{
    ChunkStore, SqliteChunkStore, StoreStats, StoredDocument, MAX_PERSISTED_CONTENT_CHARS,
};
pub use vector::cosine_similarity;
