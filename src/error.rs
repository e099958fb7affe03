//! 검색 파이프라인 에러 타입
//!
//! 질문 분석 실패만 검색을 중단시킵니다.
//! 저장소/임베딩 실패는 각 단계에서 흡수되어 빈 결과 또는 0점으로 처리됩니다.

use thiserror::Error;

/// 검색 에러
#[derive(Debug, Error)]
pub enum SearchError {
    /// 모든 API 키로 질문 분석을 시도했지만 실패
    #[error("question analysis unavailable after {attempts} attempt(s): {last_error}")]
    AnalysisUnavailable { attempts: usize, last_error: String },

    /// 청크 저장소 호출 실패 (soft - 빈 결과로 대체됨)
    #[error("chunk store unavailable: {0}")]
    StoreUnavailable(String),

    /// 임베딩 서비스 호출 실패 (soft - 시맨틱 점수 0으로 대체됨)
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),
}

impl SearchError {
    /// 검색을 중단시키는 에러인지 여부
    pub fn is_fatal(&self) -> bool {
        matches!(self, SearchError::AnalysisUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_analysis_failure_is_fatal() {
        let fatal = SearchError::AnalysisUnavailable {
            attempts: 3,
            last_error: "boom".to_string(),
        };
        assert!(fatal.is_fatal());
        assert!(fatal.to_string().contains("3 attempt"));

        assert!(!SearchError::StoreUnavailable("down".to_string()).is_fatal());
        assert!(!SearchError::EmbeddingUnavailable("429".to_string()).is_fatal());
    }
}
