//! Unified Search - 검색 파이프라인 오케스트레이터
//!
//! ```text
//! Idle -> Analyzing -> Expanding -> Fetching -> Scoring -> Ranking -> Optimizing -> Done
//! ```
//!
//! 단계는 순차적으로 실행되며 되돌아가지 않습니다.
//! 질문 분석 실패만 검색을 중단시키고, 저장소/임베딩 실패는 빈 결과 또는 0점으로 흡수됩니다.
//! 측정값(시간, 신호별 평균)은 관측용이며 랭킹에 영향을 주지 않습니다.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use super::analyzer::{QuestionAnalysis, QuestionAnalyzer};
use super::context::{ContextOptimizer, QualitySummary};
use super::ranker::rank;
use super::scorer::{MultiSignalScorer, ScoreBreakdown, ScoredChunk};
use super::synonyms::KeywordExpander;
use crate::cache::{cache_key, ResultCache};
use crate::config::{AppConfig, RankingConfig, SearchConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::SearchError;
use crate::knowledge::{filter_by_keyword, filter_by_text, ChunkStore, ChunkStoreAdapter};

// ============================================================================
// Types
// ============================================================================

/// 파이프라인 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStage {
    Idle,
    Analyzing,
    Expanding,
    Fetching,
    Scoring,
    Ranking,
    Optimizing,
    Done,
}

/// 단계별 소요 시간
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageTiming {
    pub stage: SearchStage,
    pub millis: f64,
}

/// 검색 지표
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMetrics {
    /// 스코어링된 후보 수 (경로 간 중복 포함)
    pub total_processed: usize,
    /// 중복 제거 후 랭킹 결과 수
    pub unique_results: usize,
    /// 최종 청크 평균 점수
    pub average_relevance: f32,
    pub execution_time_ms: f64,
    /// 최종 청크의 신호별 평균
    pub score_breakdown: ScoreBreakdown,
    pub stage_timings: Vec<StageTiming>,
    pub quality: QualitySummary,
}

/// 검색 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub question: String,
    pub analysis: QuestionAnalysis,
    pub chunks: Vec<ScoredChunk>,
    pub metrics: SearchMetrics,
}

impl SearchResult {
    /// 컨텍스트가 비었는지 (예산 부족 또는 매칭 없음)
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

// ============================================================================
// Stage Clock
// ============================================================================

struct StageClock {
    stage: SearchStage,
    entered: Instant,
    started: Instant,
    timings: Vec<StageTiming>,
}

impl StageClock {
    fn start() -> Self {
        let now = Instant::now();
        Self {
            stage: SearchStage::Idle,
            entered: now,
            started: now,
            timings: Vec::new(),
        }
    }

    fn enter(&mut self, next: SearchStage) {
        if self.stage != SearchStage::Idle {
            self.timings.push(StageTiming {
                stage: self.stage,
                millis: millis(self.entered.elapsed()),
            });
        }
        tracing::debug!("Search stage: {:?} -> {:?}", self.stage, next);
        self.stage = next;
        self.entered = Instant::now();
    }

    fn finish(mut self) -> (Duration, Vec<StageTiming>) {
        self.enter(SearchStage::Done);
        (self.started.elapsed(), self.timings)
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

// ============================================================================
// UnifiedSearch
// ============================================================================

/// 통합 검색기
///
/// 저장소, 텍스트 생성, 임베딩 핸들은 생성 시점에 주입됩니다.
pub struct UnifiedSearch {
    analyzer: QuestionAnalyzer,
    expander: Arc<dyn KeywordExpander>,
    store: ChunkStoreAdapter,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    scorer: MultiSignalScorer,
    optimizer: ContextOptimizer,
    ranking: RankingConfig,
    settings: SearchConfig,
    cache: Option<ResultCache<SearchResult>>,
}

impl UnifiedSearch {
    pub fn new(
        analyzer: QuestionAnalyzer,
        expander: Arc<dyn KeywordExpander>,
        store: Arc<dyn ChunkStore>,
        config: &AppConfig,
    ) -> Self {
        Self {
            analyzer,
            expander,
            store: ChunkStoreAdapter::new(store, config.search.fetch_limit),
            embedder: None,
            scorer: MultiSignalScorer::new(config.scoring.clone()),
            optimizer: ContextOptimizer::new(config.context.clone()),
            ranking: config.ranking.clone(),
            settings: config.search.clone(),
            cache: None,
        }
    }

    /// 질문 임베딩 프로바이더 설정 (없으면 시맨틱 점수는 항상 0)
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// 결과 캐시 사용 (용량은 `search.cache_capacity`)
    pub fn with_cache(mut self, ttl: Duration) -> Self {
        self.cache = Some(ResultCache::new(ttl, self.settings.cache_capacity));
        self
    }

    pub fn default_max_chunks(&self) -> usize {
        self.settings.default_max_chunks
    }

    /// 전체 문서 대상 검색
    pub async fn search(
        &self,
        question: &str,
        max_chunks: usize,
    ) -> Result<SearchResult, SearchError> {
        self.search_in(question, None, max_chunks).await
    }

    /// 문서 범위를 지정한 검색
    pub async fn search_in(
        &self,
        question: &str,
        document_id: Option<&str>,
        max_chunks: usize,
    ) -> Result<SearchResult, SearchError> {
        let question = question.trim();
        let key = cache_key(&[
            question,
            document_id.unwrap_or_default(),
            &max_chunks.to_string(),
        ]);
        if let Some(hit) = self.cache.as_ref().and_then(|c| c.get(&key)) {
            tracing::debug!("Search cache hit: {}", question);
            return Ok(hit);
        }

        let result = self.run_pipeline(question, document_id, max_chunks).await?;

        if let Some(cache) = &self.cache {
            cache.insert(key, result.clone());
        }
        Ok(result)
    }

    async fn run_pipeline(
        &self,
        question: &str,
        document_id: Option<&str>,
        max_chunks: usize,
    ) -> Result<SearchResult, SearchError> {
        let mut clock = StageClock::start();

        // 1. 질문 분석 (실패 시 중단)
        clock.enter(SearchStage::Analyzing);
        let mut analysis = self.analyzer.analyze(question).await?;

        // 2. 키워드 확장
        clock.enter(SearchStage::Expanding);
        let expanded = self.expander.expand(&analysis.keywords);
        analysis.expanded_keywords = Some(expanded);

        // 3. 후보 조회: 저장소는 한 번만 읽고 경로별로 필터링
        clock.enter(SearchStage::Fetching);
        let (question_embedding, pool) = tokio::join!(
            self.embed_question(question),
            self.store.fetch_all(document_id)
        );
        let limit = self.settings.fetch_limit;

        let by_keyword = filter_by_keyword(&pool, analysis.expanded(), limit);
        let by_text = filter_by_text(&pool, question, limit);
        let by_semantic = if question_embedding.is_some() && self.settings.semantic_path {
            pool
        } else {
            Vec::new()
        };

        tracing::debug!(
            "Fetched candidates: keyword={}, text={}, semantic={}",
            by_keyword.len(),
            by_text.len(),
            by_semantic.len()
        );

        let candidates: Vec<_> = by_keyword
            .into_iter()
            .chain(by_text)
            .chain(by_semantic)
            .collect();

        // 4. 스코어링
        clock.enter(SearchStage::Scoring);
        let scored = self
            .scorer
            .score_all(&candidates, &analysis, question_embedding.as_deref());
        let total_processed = scored.len();
        let relevant: Vec<ScoredChunk> = scored
            .into_iter()
            .filter(|s| s.score > self.ranking.min_relevance)
            .collect();

        // 5. 중복 제거 + 랭킹
        clock.enter(SearchStage::Ranking);
        let ranked = rank(relevant, self.ranking.result_cap);
        let unique_results = ranked.len();

        // 6. 컨텍스트 최적화
        clock.enter(SearchStage::Optimizing);
        let chunks = self.optimizer.optimize(&ranked, &analysis, max_chunks);
        let quality = self.optimizer.quality_summary(&chunks, &analysis);

        let (elapsed, stage_timings) = clock.finish();

        let metrics = SearchMetrics {
            total_processed,
            unique_results,
            average_relevance: mean(chunks.iter().map(|c| c.score)),
            execution_time_ms: millis(elapsed),
            score_breakdown: ScoreBreakdown {
                keyword: mean(chunks.iter().map(|c| c.breakdown.keyword)),
                synonym: mean(chunks.iter().map(|c| c.breakdown.synonym)),
                semantic: mean(chunks.iter().map(|c| c.breakdown.semantic)),
            },
            stage_timings,
            quality,
        };

        tracing::info!(
            "Search completed: processed={}, unique={}, selected={}, avg_relevance={:.3}, {:.1}ms",
            metrics.total_processed,
            metrics.unique_results,
            chunks.len(),
            metrics.average_relevance,
            metrics.execution_time_ms
        );

        Ok(SearchResult {
            question: question.to_string(),
            analysis,
            chunks,
            metrics,
        })
    }

    /// 질문 임베딩 (실패 시 None - 시맨틱 점수 0)
    async fn embed_question(&self, question: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        match embedder.embed(question).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                let err = SearchError::EmbeddingUnavailable(format!("{:#}", e));
                tracing::warn!("{} - semantic scoring disabled for this query", err);
                None
            }
        }
    }
}

fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, count) = values.fold((0.0f32, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}

// ============================================================================
// Tests
// ============================================================================
