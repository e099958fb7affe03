//! Retrieval 모듈 - 질문 분석부터 컨텍스트 선택까지
//!
//! - Analyzer: LLM 기반 질문 구조화 (키 풀 순환 재시도)
//! - Synonyms: 금연 정책 동의어 확장
//! - Scorer: 키워드 0.4 + 동의어 0.3 + 시맨틱 0.3
//! - Ranker: ID 기준 중복 제거 + 점수 정렬
//! - Context: 길이 예산 안에서 greedy prefix 선택 + 품질 지표
//! - Search: 위 단계를 순차 실행하는 오케스트레이터

mod analyzer;
mod context;
mod ranker;
mod scorer;
mod search;
mod synonyms;

// Re-exports
pub use analyzer::{
    build_prompt, parse_analysis, strip_code_fences, Category, Complexity, QuestionAnalysis,
    QuestionAnalyzer,
};
pub use context::{ChunkQuality, ContextOptimizer, QualitySummary, QualityTier};
pub use ranker::rank;
pub use scorer::{semantic_score, MultiSignalScorer, ScoreBreakdown, ScoredChunk};
pub use search::{SearchMetrics, SearchResult, SearchStage, StageTiming, UnifiedSearch};
pub use synonyms::{KeywordExpander, SynonymDictionary};
