//! Multi-Signal Scorer - 키워드 / 동의어 / 시맨틱 점수 결합
//!
//! 각 신호는 [0, 1]로 정규화되고, 총점은 고정 가중치의 선형 결합입니다.
//!
//! ```text
//! total = 0.4 * keyword + 0.3 * synonym + 0.3 * semantic
//! ```
//!
//! 순수 함수입니다. 배치 처리는 결과에 영향을 주지 않습니다.

use serde::Serialize;

use super::analyzer::QuestionAnalysis;
use crate::config::ScoringConfig;
use crate::knowledge::{cosine_similarity, Chunk};

// ============================================================================
// Types
// ============================================================================

/// 신호별 점수
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub keyword: f32,
    pub synonym: f32,
    pub semantic: f32,
}

/// 점수가 매겨진 청크
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
    pub breakdown: ScoreBreakdown,
}

// ============================================================================
// MultiSignalScorer
// ============================================================================

/// 다중 신호 스코어러
#[derive(Debug, Clone)]
pub struct MultiSignalScorer {
    config: ScoringConfig,
}

impl Default for MultiSignalScorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

impl MultiSignalScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// 단일 청크 스코어링
    pub fn score(
        &self,
        chunk: &Chunk,
        analysis: &QuestionAnalysis,
        question_embedding: Option<&[f32]>,
    ) -> ScoredChunk {
        let breakdown = ScoreBreakdown {
            keyword: self.keyword_score(chunk, &analysis.keywords),
            synonym: self.synonym_score(chunk, analysis.expanded()),
            semantic: semantic_score(chunk, question_embedding),
        };

        ScoredChunk {
            chunk: chunk.clone(),
            score: self.combine(&breakdown),
            breakdown,
        }
    }

    /// 여러 청크를 배치 단위로 스코어링 (입력 순서 유지)
    pub fn score_all(
        &self,
        chunks: &[Chunk],
        analysis: &QuestionAnalysis,
        question_embedding: Option<&[f32]>,
    ) -> Vec<ScoredChunk> {
        let batch_size = self.config.batch_size.max(1);
        let mut scored = Vec::with_capacity(chunks.len());

        for (i, batch) in chunks.chunks(batch_size).enumerate() {
            tracing::debug!("Scoring batch {} ({} chunks)", i + 1, batch.len());
            scored.extend(
                batch
                    .iter()
                    .map(|chunk| self.score(chunk, analysis, question_embedding)),
            );
        }

        scored
    }

    /// 가중 합 (0..=1로 고정, 유한하지 않으면 0)
    pub fn combine(&self, breakdown: &ScoreBreakdown) -> f32 {
        let total = self.config.keyword_weight * breakdown.keyword
            + self.config.synonym_weight * breakdown.synonym
            + self.config.semantic_weight * breakdown.semantic;
        if total.is_finite() {
            total.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// 키워드 점수
    ///
    /// 청크 키워드 집합에 정확히 있으면 고정 가중치,
    /// 없으면 본문 등장 횟수 × 단위 (상한 있음).
    pub fn keyword_score(&self, chunk: &Chunk, keywords: &[String]) -> f32 {
        let terms = lowercase_terms(keywords);
        if terms.is_empty() {
            return 0.0;
        }

        let content = chunk.content.to_lowercase();
        let chunk_keywords: Vec<String> = chunk.keywords.iter().map(|k| k.to_lowercase()).collect();

        let sum: f32 = terms
            .iter()
            .map(|term| {
                if chunk_keywords.iter().any(|k| k == term) {
                    self.config.exact_match_weight
                } else {
                    self.occurrence_weight(&content, term)
                }
            })
            .sum();

        self.normalize(sum, terms.len())
    }

    /// 동의어 점수 (본문 등장 횟수만 사용)
    pub fn synonym_score(&self, chunk: &Chunk, expanded: &[String]) -> f32 {
        let terms = lowercase_terms(expanded);
        if terms.is_empty() {
            return 0.0;
        }

        let content = chunk.content.to_lowercase();
        let sum: f32 = terms
            .iter()
            .map(|term| self.occurrence_weight(&content, term))
            .sum();

        self.normalize(sum, terms.len())
    }

    fn occurrence_weight(&self, content_lower: &str, term_lower: &str) -> f32 {
        let count = content_lower.matches(term_lower).count() as f32;
        (count * self.config.occurrence_unit).min(self.config.occurrence_cap)
    }

    fn normalize(&self, sum: f32, term_count: usize) -> f32 {
        let denominator = term_count as f32 * self.config.occurrence_cap;
        if denominator <= 0.0 {
            return 0.0;
        }
        (sum / denominator).clamp(0.0, 1.0)
    }
}

/// 시맨틱 점수 (음수 유사도는 0)
///
/// 질문 또는 청크 임베딩이 없으면 0입니다.
pub fn semantic_score(chunk: &Chunk, question_embedding: Option<&[f32]>) -> f32 {
    match (question_embedding, chunk.embedding.as_deref()) {
        (Some(q), Some(c)) => cosine_similarity(q, c).clamp(0.0, 1.0),
        _ => 0.0,
    }
}

/// 빈 문자열 제거 + 소문자
fn lowercase_terms(terms: &[String]) -> Vec<String> {
    terms
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
