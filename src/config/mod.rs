//! 설정 모듈
//!
//! 기본값 → `config.toml` → `GEUMYEON_*` 환경변수 순서로 병합합니다.
//! 중첩 키는 `__`로 구분합니다 (예: `GEUMYEON_CONTEXT__MAX_TOTAL_CHARS=6000`).
//!
//! API 키는 설정 파일이 아닌 환경변수에서만 읽습니다.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// 환경변수 접두사
const ENV_PREFIX: &str = "GEUMYEON_";

/// 설정 파일 이름
const CONFIG_FILE: &str = "config.toml";

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.geumyeon-rag/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".geumyeon-rag")
}

// ============================================================================
// Config Sections
// ============================================================================

/// 다중 신호 스코어링 상수
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub keyword_weight: f32,
    pub synonym_weight: f32,
    pub semantic_weight: f32,
    /// 청크 키워드 집합에 정확히 일치할 때의 가중치
    pub exact_match_weight: f32,
    /// 본문 등장 1회당 가중치
    pub occurrence_unit: f32,
    /// 키워드 하나가 본문 등장으로 얻을 수 있는 최대치 (정규화 분모)
    pub occurrence_cap: f32,
    /// 배치 크기 (관측 가능한 결과에는 영향 없음)
    pub batch_size: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            keyword_weight: 0.4,
            synonym_weight: 0.3,
            semantic_weight: 0.3,
            exact_match_weight: 3.0,
            occurrence_unit: 1.0,
            occurrence_cap: 3.0,
            batch_size: 50,
        }
    }
}

/// 랭킹 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// 중복 제거 후 유지할 최대 결과 수
    pub result_cap: usize,
    /// 이 점수 이하의 후보는 랭킹 전에 버림
    pub min_relevance: f32,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            result_cap: 20,
            min_relevance: 0.0,
        }
    }
}

/// 컨텍스트 예산 설정 (문자 수 기준)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub max_total_chars: usize,
    pub max_chunk_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_total_chars: 8000,
            max_chunk_chars: 2000,
        }
    }
}

/// 검색 오케스트레이터 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// 저장소 1회 조회 상한
    pub fetch_limit: usize,
    pub default_max_chunks: usize,
    /// 질문 임베딩이 있을 때 전체 청크를 시맨틱 후보로 추가
    pub semantic_path: bool,
    /// 결과 캐시 TTL (0이면 캐시 사용 안 함)
    pub cache_ttl_secs: u64,
    /// 결과 캐시 최대 엔트리 수
    pub cache_capacity: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            fetch_limit: 1000,
            default_max_chunks: 5,
            semantic_path: true,
            cache_ttl_secs: 300,
            cache_capacity: 1000,
        }
    }
}

/// Gemini API 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub completion_model: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// 질문 임베딩 사용 여부
    pub use_embeddings: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            completion_model: "gemini-2.0-flash".to_string(),
            embedding_model: "gemini-embedding-001".to_string(),
            embedding_dimension: 768,
            temperature: 0.1,
            timeout_secs: 30,
            use_embeddings: true,
        }
    }
}

// ============================================================================
// AppConfig
// ============================================================================

/// 전체 애플리케이션 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub scoring: ScoringConfig,
    pub ranking: RankingConfig,
    pub context: ContextConfig,
    pub search: SearchConfig,
    pub llm: LlmConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: get_data_dir(),
            scoring: ScoringConfig::default(),
            ranking: RankingConfig::default(),
            context: ContextConfig::default(),
            search: SearchConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl AppConfig {
    /// 설정 로드
    ///
    /// `path`가 없으면 데이터 디렉토리의 `config.toml`을 사용합니다 (없어도 됨).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| get_data_dir().join(CONFIG_FILE));

        Self::figment(&file)
            .extract::<Self>()
            .with_context(|| format!("Failed to load configuration from {:?}", file))
            .and_then(|config| {
                config.validate()?;
                Ok(config)
            })
    }

    fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// 값 범위 검증
    pub fn validate(&self) -> Result<()> {
        let s = &self.scoring;
        for (name, w) in [
            ("keyword_weight", s.keyword_weight),
            ("synonym_weight", s.synonym_weight),
            ("semantic_weight", s.semantic_weight),
        ] {
            if !(0.0..=1.0).contains(&w) {
                anyhow::bail!("scoring.{} must be within [0, 1], got {}", name, w);
            }
        }
        if s.occurrence_cap <= 0.0 {
            anyhow::bail!("scoring.occurrence_cap must be positive");
        }
        if self.search.fetch_limit == 0 {
            anyhow::bail!("search.fetch_limit must be at least 1");
        }
        if self.context.max_chunk_chars == 0 {
            anyhow::bail!("context.max_chunk_chars must be at least 1");
        }
        Ok(())
    }

    /// SQLite DB 경로
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("chunks.db")
    }
}

// ============================================================================
// API Key Management
// ============================================================================

/// API 키 목록 로드 (환경변수에서)
///
/// 우선순위 순서대로 모두 합칩니다 (중복 제거):
/// 1. `GEMINI_API_KEYS` (쉼표 구분)
/// 2. `GEMINI_API_KEY`
/// 3. `GOOGLE_AI_API_KEY`
pub fn get_api_keys() -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();

    if let Ok(list) = std::env::var("GEMINI_API_KEYS") {
        keys.extend(parse_key_list(&list));
    }

    for var in ["GEMINI_API_KEY", "GOOGLE_AI_API_KEY"] {
        if let Ok(key) = std::env::var(var) {
            let key = key.trim();
            if !key.is_empty() {
                tracing::debug!("Using API key from {}", var);
                keys.push(key.to_string());
            }
        }
    }

    let mut seen = std::collections::HashSet::new();
    keys.retain(|k| seen.insert(k.clone()));
    keys
}

/// API 키 존재 여부 확인
pub fn has_api_key() -> bool {
    !get_api_keys().is_empty()
}

fn parse_key_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
