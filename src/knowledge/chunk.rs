//! 청크 데이터 모델
//!
//! 오프라인 전처리에서 생성된 문서 텍스트 조각입니다.
//! 검색 코어는 청크를 읽기만 하고 수정하지 않습니다.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// 섹션을 알 수 없을 때의 기본값
pub const DEFAULT_SECTION: &str = "general";

fn default_section() -> String {
    DEFAULT_SECTION.to_string()
}

/// 인용 위치 정보
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkLocation {
    /// 문서 이름 (사용자 표시용)
    pub document: String,
    #[serde(default = "default_section")]
    pub section: String,
    /// 조문 기반 법령 문서는 페이지가 없음
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl ChunkLocation {
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            section: default_section(),
            page: None,
        }
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        let section = section.into();
        self.section = if section.trim().is_empty() {
            default_section()
        } else {
            section
        };
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// 인용 문자열 (`문서 · 섹션 · p.N`)
    pub fn citation(&self) -> String {
        let mut parts = vec![self.document.clone()];
        if self.section != DEFAULT_SECTION {
            parts.push(self.section.clone());
        }
        if let Some(page) = self.page {
            parts.push(format!("p.{}", page));
        }
        parts.join(" · ")
    }
}

/// 문서 청크
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// 비어 있으면 가져오기 단계에서 UUID를 부여
    #[serde(default)]
    pub id: String,
    pub content: String,
    pub document_id: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub location: ChunkLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    /// 새 청크 생성 (location.document = document_id)
    pub fn new(
        id: impl Into<String>,
        document_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let document_id = document_id.into();
        Self {
            id: id.into(),
            content: content.into(),
            location: ChunkLocation::new(document_id.clone()),
            document_id,
            keywords: Vec::new(),
            embedding: None,
        }
    }

    /// 키워드 설정 (공백 제거, 대소문자 무시 중복 제거)
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = dedup_keywords(keywords.into_iter().map(Into::into));
        self
    }

    pub fn with_location(mut self, location: ChunkLocation) -> Self {
        self.location = location;
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// 본문 길이 (문자 수)
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    /// 본문을 `max_chars`자로 자른 사본 (늘리지는 않음)
    pub fn truncated(&self, max_chars: usize) -> Chunk {
        let mut chunk = self.clone();
        chunk.content = truncate_chars(&self.content, max_chars);
        chunk
    }
}

/// 문자 단위 자르기 (UTF-8 안전)
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// 키워드 정규화: 공백 제거, 빈 값 제거, 대소문자 무시 중복 제거 (첫 등장 순서 유지)
pub fn dedup_keywords<I>(keywords: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    keywords
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .filter(|k| seen.insert(k.to_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_deduplicated() {
        let chunk = Chunk::new("c1", "doc", "본문")
            .with_keywords(["금연구역", " 금연구역 ", "", "Vape", "vape"]);
        assert_eq!(chunk.keywords, vec!["금연구역", "Vape"]);
    }

    #[test]
    fn test_truncate_korean() {
        let chunk = Chunk::new("c1", "doc", "국민건강증진법");
        assert_eq!(chunk.truncated(4).content, "국민건강");
        assert_eq!(chunk.truncated(100).content, "국민건강증진법");
        assert_eq!(chunk.truncated(0).content, "");
    }

    #[test]
    fn test_citation_skips_default_section_and_missing_page() {
        let loc = ChunkLocation::new("국민건강증진법");
        assert_eq!(loc.citation(), "국민건강증진법");

        let loc = ChunkLocation::new("금연구역 지정 안내").with_section("제2장").with_page(12);
        assert_eq!(loc.citation(), "금연구역 지정 안내 · 제2장 · p.12");

        let loc = ChunkLocation::new("doc").with_section("  ");
        assert_eq!(loc.section, DEFAULT_SECTION);
    }

    #[test]
    fn test_deserialize_camel_case_with_defaults() {
        let json = r#"{
            "id": "c1",
            "content": "흡연 금지",
            "documentId": "law.pdf",
            "location": { "document": "국민건강증진법" }
        }"#;
        let chunk: Chunk = serde_json::from_str(json).unwrap();
        assert_eq!(chunk.document_id, "law.pdf");
        assert!(chunk.keywords.is_empty());
        assert_eq!(chunk.location.section, DEFAULT_SECTION);
        assert!(chunk.location.page.is_none());
        assert!(chunk.embedding.is_none());
    }
}
