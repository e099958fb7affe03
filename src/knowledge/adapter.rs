//! Chunk Store Adapter - 키워드/텍스트 기반 후보 청크 조회
//!
//! 저장소에서 청크를 대량으로 읽은 뒤 클라이언트 측에서 필터링합니다.
//! 한 번 읽은 목록은 [`filter_by_keyword`] / [`filter_by_text`]로 여러 경로에 재사용할 수 있습니다.
//! - 대소문자 무시 부분 문자열 매칭 (토큰 매칭 아님)
//! - 검색어 중 하나라도 맞으면 포함 (OR)
//! - 결과 순서는 보장하지 않음
//!
//! 저장소 호출이 실패하면 에러를 전파하지 않고 빈 목록을 반환합니다.

use std::sync::Arc;

use super::chunk::Chunk;
use super::store::ChunkStore;
use crate::error::SearchError;

/// 저장소 어댑터
#[derive(Clone)]
pub struct ChunkStoreAdapter {
    store: Arc<dyn ChunkStore>,
    /// 저장소 1회 조회 상한 (필터링 전)
    fetch_limit: usize,
}

impl ChunkStoreAdapter {
    pub fn new(store: Arc<dyn ChunkStore>, fetch_limit: usize) -> Self {
        Self {
            store,
            fetch_limit: fetch_limit.max(1),
        }
    }

    /// 전체 청크 (문서 범위 지정 가능)
    pub async fn fetch_all(&self, document_id: Option<&str>) -> Vec<Chunk> {
        self.load(document_id, self.fetch_limit).await
    }

    /// 청크 키워드 집합 또는 본문에 검색어가 하나라도 포함된 청크
    pub async fn fetch_by_keyword(
        &self,
        keywords: &[String],
        document_id: Option<&str>,
        limit: usize,
    ) -> Vec<Chunk> {
        if !has_terms(keywords.iter().map(String::as_str)) || limit == 0 {
            return Vec::new();
        }
        filter_by_keyword(&self.fetch_all(document_id).await, keywords, limit)
    }

    /// 자유 텍스트를 공백 단위 검색어로 나눠 매칭
    pub async fn fetch_by_text(
        &self,
        text: &str,
        document_id: Option<&str>,
        limit: usize,
    ) -> Vec<Chunk> {
        if !has_terms(text.split_whitespace()) || limit == 0 {
            return Vec::new();
        }
        filter_by_text(&self.fetch_all(document_id).await, text, limit)
    }

    async fn load(&self, document_id: Option<&str>, limit: usize) -> Vec<Chunk> {
        match self.store.list_chunks(document_id, limit).await {
            Ok(chunks) => chunks,
            Err(e) => {
                let err = SearchError::StoreUnavailable(format!("{:#}", e));
                tracing::warn!("{} - continuing with no results from this path", err);
                Vec::new()
            }
        }
    }
}

/// 이미 읽은 청크 중 키워드가 하나라도 맞는 청크
pub fn filter_by_keyword(pool: &[Chunk], keywords: &[String], limit: usize) -> Vec<Chunk> {
    let terms = normalize_terms(keywords.iter().map(String::as_str));
    filter_matching(pool, &terms, limit)
}

/// 이미 읽은 청크 중 텍스트의 공백 단위 검색어가 하나라도 맞는 청크
pub fn filter_by_text(pool: &[Chunk], text: &str, limit: usize) -> Vec<Chunk> {
    let terms = normalize_terms(text.split_whitespace());
    filter_matching(pool, &terms, limit)
}

fn filter_matching(pool: &[Chunk], terms: &[String], limit: usize) -> Vec<Chunk> {
    if terms.is_empty() || limit == 0 {
        return Vec::new();
    }
    pool.iter()
        .filter(|chunk| matches_any(chunk, terms))
        .take(limit)
        .cloned()
        .collect()
}

fn has_terms<'a>(mut terms: impl Iterator<Item = &'a str>) -> bool {
    terms.any(|t| !t.trim().is_empty())
}

/// 검색어 정규화 (소문자, 공백 제거, 빈 값 제거)
fn normalize_terms<'a>(terms: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = terms
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// 청크가 검색어 중 하나라도 포함하는지 (terms는 소문자)
pub fn matches_any(chunk: &Chunk, terms: &[String]) -> bool {
    let content = chunk.content.to_lowercase();
    let keywords: Vec<String> = chunk.keywords.iter().map(|k| k.to_lowercase()).collect();

    terms.iter().any(|term| {
        content.contains(term.as_str()) || keywords.iter().any(|k| k.contains(term.as_str()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;

    struct FixedStore {
        chunks: Vec<Chunk>,
    }

    #[async_trait]
    impl ChunkStore for FixedStore {
        async fn list_chunks(
            &self,
            document_id: Option<&str>,
            limit: usize,
        ) -> Result<Vec<Chunk>> {
            Ok(self
                .chunks
                .iter()
                .filter(|c| document_id.map_or(true, |d| c.document_id == d))
                .take(limit)
                .cloned()
                .collect())
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl ChunkStore for BrokenStore {
        async fn list_chunks(&self, _: Option<&str>, _: usize) -> Result<Vec<Chunk>> {
            anyhow::bail!("connection refused")
        }
    }

    fn adapter() -> ChunkStoreAdapter {
        let chunks = vec![
            Chunk::new("a", "law", "공중이용시설은 전체를 금연구역으로 지정한다")
                .with_keywords(["금연구역"]),
            Chunk::new("b", "law", "담배 광고는 제한된다").with_keywords(["담배광고"]),
            Chunk::new("c", "guide", "Electronic Cigarette rules").with_keywords(["E-Cig"]),
        ];
        ChunkStoreAdapter::new(Arc::new(FixedStore { chunks }), 100)
    }

    fn ids(chunks: &[Chunk]) -> Vec<&str> {
        let mut ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn test_keyword_or_semantics() {
        let adapter = adapter();
        let keywords = vec!["금연구역".to_string(), "광고".to_string()];
        let found = adapter.fetch_by_keyword(&keywords, None, 10).await;
        assert_eq!(ids(&found), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_case_insensitive_substring_match() {
        let adapter = adapter();
        // 키워드 집합 "E-Cig"에 부분 일치
        let found = adapter.fetch_by_keyword(&["e-c".to_string()], None, 10).await;
        assert_eq!(ids(&found), vec!["c"]);

        let found = adapter.fetch_by_text("CIGARETTE 없는말", None, 10).await;
        assert_eq!(ids(&found), vec!["c"]);
    }

    #[tokio::test]
    async fn test_document_scope_and_limit() {
        let adapter = adapter();
        let found = adapter.fetch_by_text("금연구역 담배", Some("law"), 10).await;
        assert_eq!(ids(&found), vec!["a", "b"]);

        let found = adapter.fetch_by_text("금연구역 담배", Some("law"), 1).await;
        assert_eq!(found.len(), 1);

        assert!(adapter.fetch_by_text("금연구역", None, 0).await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_terms_return_nothing() {
        let adapter = adapter();
        assert!(adapter.fetch_by_keyword(&[], None, 10).await.is_empty());
        assert!(adapter.fetch_by_text("   ", None, 10).await.is_empty());
        assert_eq!(adapter.fetch_all(None).await.len(), 3);
    }

    #[tokio::test]
    async fn test_store_failure_degrades_to_empty() {
        let adapter = ChunkStoreAdapter::new(Arc::new(BrokenStore), 10);
        assert!(adapter.fetch_all(None).await.is_empty());
        assert!(adapter
            .fetch_by_keyword(&["금연".to_string()], None, 10)
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_filters_match_store_backed_fetches() {
        let adapter = adapter();
        let pool = adapter.fetch_all(None).await;
        let keywords = vec!["금연구역".to_string(), "광고".to_string()];

        assert_eq!(
            ids(&filter_by_keyword(&pool, &keywords, 10)),
            ids(&adapter.fetch_by_keyword(&keywords, None, 10).await)
        );
        assert_eq!(
            ids(&filter_by_text(&pool, "cigarette 담배", 10)),
            ids(&adapter.fetch_by_text("cigarette 담배", None, 10).await)
        );
        assert!(filter_by_text(&pool, "  ", 10).is_empty());
        assert!(filter_by_keyword(&pool, &keywords, 0).is_empty());
    }
}
