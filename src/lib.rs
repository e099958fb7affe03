//! geumyeon-rag - 금연 정책 문서 RAG 검색 코어
//!
//! 질문 분석(LLM) + 동의어 확장 + 다중 신호 점수화(키워드/동의어/시맨틱)로
//! 전처리된 청크를 찾아 길이 예산 안의 컨텍스트로 돌려줍니다.

pub mod answer;
pub mod cache;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod knowledge;
pub mod llm;
pub mod retrieval;

// Re-exports
pub use answer::{Answer, AnswerGenerator, Citation};
pub use config::{get_api_keys, get_data_dir, has_api_key, AppConfig};
pub use embedding::{EmbeddingProvider, GeminiEmbedding};
pub use error::SearchError;
pub use knowledge::{
    Chunk, ChunkLocation, ChunkStore, ChunkStoreAdapter, SqliteChunkStore, StoreStats,
    StoredDocument,
};
pub use llm::{CompletionProvider, GeminiCompletion, KeyPool};
pub use retrieval::{
    Category, Complexity, ContextOptimizer, KeywordExpander, MultiSignalScorer, QuestionAnalysis,
    QuestionAnalyzer, ScoredChunk, SearchMetrics, SearchResult, SynonymDictionary, UnifiedSearch,
};
