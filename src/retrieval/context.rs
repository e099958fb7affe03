//! Context Quality Optimizer
//!
//! 랭킹된 청크에서 최종 컨텍스트를 고릅니다.
//! - 청크별 길이 상한: 넘으면 잘라냄
//! - 전체 길이 예산: 순위대로 누적하다가 처음으로 예산을 넘는 청크에서 멈춤
//!   (뒤쪽의 더 짧은 청크는 보지 않음)
//! - `max_chunks`개를 채우면 멈춤
//!
//! 선택된 청크의 품질 지표(관련성/완결성/정확성/명료성)도 계산합니다.

use serde::Serialize;

use super::analyzer::{Complexity, QuestionAnalysis};
use super::scorer::ScoredChunk;
use crate::config::ContextConfig;

/// 이 길이 미만의 청크는 명료성이 비례해서 낮아짐
const MIN_CLEAR_CHARS: usize = 100;

/// 품질 등급 경계
const HIGH_QUALITY_THRESHOLD: f32 = 0.8;
const LOW_QUALITY_THRESHOLD: f32 = 0.5;

// ============================================================================
// Types
// ============================================================================

/// 품질 등급
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    High,
    Medium,
    Low,
}

impl QualityTier {
    pub fn from_overall(overall: f32) -> Self {
        if overall >= HIGH_QUALITY_THRESHOLD {
            QualityTier::High
        } else if overall < LOW_QUALITY_THRESHOLD {
            QualityTier::Low
        } else {
            QualityTier::Medium
        }
    }
}

/// 청크 하나의 품질 점수
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChunkQuality {
    pub relevance: f32,
    pub completeness: f32,
    pub accuracy: f32,
    pub clarity: f32,
    pub overall: f32,
    pub tier: QualityTier,
}

/// 선택된 컨텍스트 전체의 품질 요약
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualitySummary {
    pub chunk_count: usize,
    pub total_chars: usize,
    pub average_relevance: f32,
    pub average_completeness: f32,
    pub average_accuracy: f32,
    pub average_clarity: f32,
    pub average_overall: f32,
    pub high_quality: usize,
    pub medium_quality: usize,
    pub low_quality: usize,
}

// ============================================================================
// ContextOptimizer
// ============================================================================

/// 컨텍스트 최적화기
#[derive(Debug, Clone)]
pub struct ContextOptimizer {
    config: ContextConfig,
}

impl Default for ContextOptimizer {
    fn default() -> Self {
        Self::new(ContextConfig::default())
    }
}

impl ContextOptimizer {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// 예산 안에서 순위대로 청크 선택 (greedy prefix)
    ///
    /// 반환되는 청크의 본문은 청크별 상한으로 잘려 있을 수 있습니다.
    pub fn optimize(
        &self,
        ranked: &[ScoredChunk],
        analysis: &QuestionAnalysis,
        max_chunks: usize,
    ) -> Vec<ScoredChunk> {
        let mut selected = Vec::new();
        let mut used_chars = 0usize;

        for candidate in ranked {
            if selected.len() >= max_chunks {
                break;
            }

            let chunk = candidate.chunk.truncated(self.config.max_chunk_chars);
            let len = chunk.char_len();

            if used_chars + len > self.config.max_total_chars {
                tracing::debug!(
                    "Context budget reached at chunk {} ({} + {} > {})",
                    chunk.id,
                    used_chars,
                    len,
                    self.config.max_total_chars
                );
                break;
            }

            used_chars += len;
            selected.push(ScoredChunk {
                chunk,
                score: candidate.score,
                breakdown: candidate.breakdown,
            });
        }

        tracing::debug!(
            "Selected {} chunk(s), {} chars for {:?} question",
            selected.len(),
            used_chars,
            analysis.category
        );

        selected
    }

    /// 청크 하나의 품질
    pub fn chunk_quality(&self, scored: &ScoredChunk, analysis: &QuestionAnalysis) -> ChunkQuality {
        let chunk = &scored.chunk;
        let len = chunk.char_len();
        let content = chunk.content.to_lowercase();

        let relevance = scored.score;

        // 질문 키워드 커버리지 + 질문 복잡도 대비 분량
        let keywords: Vec<String> = analysis
            .keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        let coverage = if keywords.is_empty() {
            scored.breakdown.keyword
        } else {
            let hits = keywords
                .iter()
                .filter(|k| content.contains(k.as_str()))
                .count();
            hits as f32 / keywords.len() as f32
        };
        let length_factor = (len as f32 / ideal_length(analysis.complexity) as f32).min(1.0);
        let completeness = 0.5 * coverage + 0.5 * length_factor;

        let accuracy = scored.breakdown.keyword.max(scored.breakdown.semantic);

        let clarity = if len >= self.config.max_chunk_chars {
            // 상한에서 잘렸을 가능성
            0.6
        } else if len < MIN_CLEAR_CHARS {
            len as f32 / MIN_CLEAR_CHARS as f32
        } else {
            1.0
        };

        let overall = (relevance + completeness + accuracy + clarity) / 4.0;

        ChunkQuality {
            relevance,
            completeness,
            accuracy,
            clarity,
            overall,
            tier: QualityTier::from_overall(overall),
        }
    }

    /// 선택된 컨텍스트의 품질 요약 (비어 있으면 모두 0)
    pub fn quality_summary(
        &self,
        selected: &[ScoredChunk],
        analysis: &QuestionAnalysis,
    ) -> QualitySummary {
        if selected.is_empty() {
            return QualitySummary::default();
        }

        let qualities: Vec<ChunkQuality> = selected
            .iter()
            .map(|s| self.chunk_quality(s, analysis))
            .collect();
        let n = qualities.len() as f32;
        let avg = |f: fn(&ChunkQuality) -> f32| qualities.iter().map(f).sum::<f32>() / n;
        let count = |tier: QualityTier| qualities.iter().filter(|q| q.tier == tier).count();

        QualitySummary {
            chunk_count: selected.len(),
            total_chars: selected.iter().map(|s| s.chunk.char_len()).sum(),
            average_relevance: avg(|q| q.relevance),
            average_completeness: avg(|q| q.completeness),
            average_accuracy: avg(|q| q.accuracy),
            average_clarity: avg(|q| q.clarity),
            average_overall: avg(|q| q.overall),
            high_quality: count(QualityTier::High),
            medium_quality: count(QualityTier::Medium),
            low_quality: count(QualityTier::Low),
        }
    }
}

/// 복잡도별 적정 청크 길이 (문자 수)
fn ideal_length(complexity: Complexity) -> usize {
    match complexity {
        Complexity::Simple => 300,
        Complexity::Medium => 600,
        Complexity::Complex => 1000,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::Chunk;
    use crate::retrieval::scorer::ScoreBreakdown;
    use proptest::prelude::*;

    fn scored(id: &str, content: String, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk::new(id, "doc", content),
            score,
            breakdown: ScoreBreakdown {
                keyword: score,
                synonym: 0.0,
                semantic: 0.0,
            },
        }
    }

    fn optimizer(total: usize, per_chunk: usize) -> ContextOptimizer {
        ContextOptimizer::new(ContextConfig {
            max_total_chars: total,
            max_chunk_chars: per_chunk,
        })
    }

    fn analysis() -> QuestionAnalysis {
        QuestionAnalysis::with_keywords(["금연"])
    }

    #[test]
    fn test_greedy_prefix_stops_at_first_overflow() {
        let opt = optimizer(9000, 5000);
        let ranked = vec![
            scored("a", "가".repeat(4000), 0.9),
            scored("b", "나".repeat(4000), 0.8),
            scored("c", "다".repeat(4000), 0.7),
        ];
        let selected = opt.optimize(&ranked, &analysis(), 10);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].chunk.id, "a");
        assert_eq!(selected[1].chunk.id, "b");
    }

    #[test]
    fn test_shorter_later_chunk_is_not_considered() {
        let opt = optimizer(1000, 1000);
        let ranked = vec![
            scored("a", "가".repeat(600), 0.9),
            scored("b", "나".repeat(600), 0.8),
            scored("c", "다".repeat(10), 0.7),
        ];
        let selected = opt.optimize(&ranked, &analysis(), 10);
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn test_per_chunk_cap_truncates() {
        let opt = optimizer(10_000, 100);
        let ranked = vec![scored("a", "금".repeat(250), 0.9), scored("b", "짧다".to_string(), 0.5)];
        let selected = opt.optimize(&ranked, &analysis(), 10);
        assert_eq!(selected[0].chunk.char_len(), 100);
        assert_eq!(selected[1].chunk.content, "짧다");
        // 점수는 그대로
        assert_eq!(selected[0].score, 0.9);
    }

    #[test]
    fn test_budget_respected() {
        let opt = optimizer(1500, 400);
        let ranked: Vec<ScoredChunk> = (0..10)
            .map(|i| scored(&format!("c{i}"), "x".repeat(100 + i * 90), 1.0 - i as f32 / 10.0))
            .collect();
        let selected = opt.optimize(&ranked, &analysis(), 10);
        let total: usize = selected.iter().map(|s| s.chunk.char_len()).sum();
        assert!(total <= 1500);
        assert!(selected.iter().all(|s| s.chunk.char_len() <= 400));
    }

    #[test]
    fn test_max_chunks() {
        let opt = optimizer(10_000, 1000);
        let ranked: Vec<ScoredChunk> = (0..5)
            .map(|i| scored(&format!("c{i}"), "내용".repeat(10), 0.5))
            .collect();
        assert!(opt.optimize(&ranked, &analysis(), 0).is_empty());
        assert_eq!(opt.optimize(&ranked, &analysis(), 2).len(), 2);
        assert_eq!(opt.optimize(&ranked, &analysis(), 99).len(), 5);
    }

    #[test]
    fn test_first_chunk_over_budget_yields_empty() {
        let opt = optimizer(100, 1000);
        let ranked = vec![scored("a", "가".repeat(500), 0.9)];
        assert!(opt.optimize(&ranked, &analysis(), 5).is_empty());
    }

    #[test]
    fn test_quality_tiers() {
        assert_eq!(QualityTier::from_overall(0.85), QualityTier::High);
        assert_eq!(QualityTier::from_overall(0.8), QualityTier::High);
        assert_eq!(QualityTier::from_overall(0.6), QualityTier::Medium);
        assert_eq!(QualityTier::from_overall(0.49), QualityTier::Low);
    }

    #[test]
    fn test_quality_summary() {
        let opt = optimizer(10_000, 2000);
        let strong = ScoredChunk {
            chunk: Chunk::new("a", "doc", format!("금연 {}", "정책 ".repeat(100))),
            score: 1.0,
            breakdown: ScoreBreakdown {
                keyword: 1.0,
                synonym: 1.0,
                semantic: 1.0,
            },
        };
        let weak = scored("b", "무관".to_string(), 0.0);

        let summary = opt.quality_summary(&[strong, weak], &analysis());
        assert_eq!(summary.chunk_count, 2);
        assert_eq!(summary.high_quality, 1);
        assert_eq!(summary.low_quality, 1);
        assert!((0.0..=1.0).contains(&summary.average_overall));

        assert_eq!(opt.quality_summary(&[], &analysis()), QualitySummary::default());
    }

    proptest! {
        #[test]
        fn prop_selection_respects_budget_and_caps(
            lengths in prop::collection::vec(0usize..300, 0..12),
            total in 0usize..1200,
            per_chunk in 1usize..200,
            max_chunks in 0usize..15,
        ) {
            let opt = optimizer(total, per_chunk);
            let ranked: Vec<ScoredChunk> = lengths
                .iter()
                .enumerate()
                .map(|(i, &len)| scored(&format!("c{i}"), "금".repeat(len), 0.5))
                .collect();

            let selected = opt.optimize(&ranked, &analysis(), max_chunks);

            let used: usize = selected.iter().map(|s| s.chunk.char_len()).sum();
            prop_assert!(used <= total);
            prop_assert!(selected.iter().all(|s| s.chunk.char_len() <= per_chunk));
            prop_assert!(selected.len() <= max_chunks);
            if max_chunks == 0 {
                prop_assert!(selected.is_empty());
            }

            // 순위 순서의 앞부분만 선택
            for (picked, original) in selected.iter().zip(&ranked) {
                prop_assert_eq!(&picked.chunk.id, &original.chunk.id);
            }

            // max_chunks가 충분하면 예산에 맞는 가장 긴 prefix 전체
            if max_chunks >= ranked.len() {
                let mut budget_used = 0;
                let mut expected = 0;
                for &len in &lengths {
                    let capped = len.min(per_chunk);
                    if budget_used + capped > total {
                        break;
                    }
                    budget_used += capped;
                    expected += 1;
                }
                prop_assert_eq!(selected.len(), expected);
            }
        }
    }
}
