//! Keyword/Synonym Expansion
//!
//! 분석된 키워드를 동의어/관련어로 확장합니다.
//! 같은 그룹 안에서는 양방향으로 조회됩니다 (`흡연` → `담배`, `담배` → `흡연`).

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::knowledge::dedup_keywords;

/// 키워드 확장 트레이트
///
/// 입력 키워드는 절대 제거하지 않으며, 결과는 중복이 없습니다.
pub trait KeywordExpander: Send + Sync {
    fn expand(&self, keywords: &[String]) -> Vec<String>;
}

/// 기본 금연 정책 동의어 그룹 (첫 항목이 대표어)
const DEFAULT_GROUPS: &[&[&str]] = &[
    &["금연구역", "금연 구역", "흡연금지구역", "금연장소"],
    &["흡연", "담배", "끽연"],
    &["흡연실", "흡연구역", "흡연시설"],
    &["전자담배", "궐련형 전자담배", "액상형 전자담배", "가열담배"],
    &["과태료", "벌금", "범칙금"],
    &["금연", "흡연 중단", "담배 끊기"],
    &["금연치료", "금연 치료", "니코틴 대체요법", "금연보조제"],
    &["금연상담", "금연상담전화", "금연지원센터"],
    &["국민건강증진법", "건강증진법"],
    &["공중이용시설", "다중이용시설", "공공시설"],
    &["청소년", "미성년자", "만 19세 미만"],
    &["담배광고", "담배 광고", "광고 규제"],
    &["경고그림", "건강경고", "경고문구"],
    &["지방자치단체", "지자체", "시·군·구"],
    &["보건소", "보건지소"],
    &["공동주택", "아파트"],
];

/// 동의어 사전
#[derive(Debug, Clone, Default)]
pub struct SynonymDictionary {
    groups: Vec<Vec<String>>,
    /// 소문자 용어 → 그룹 인덱스들
    index: HashMap<String, Vec<usize>>,
}

impl SynonymDictionary {
    /// 그룹 목록으로 사전 생성
    pub fn new(groups: Vec<Vec<String>>) -> Self {
        let groups: Vec<Vec<String>> = groups
            .into_iter()
            .map(dedup_keywords)
            .filter(|g| g.len() > 1)
            .collect();

        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, group) in groups.iter().enumerate() {
            for term in group {
                let entry = index.entry(term.to_lowercase()).or_default();
                if !entry.contains(&i) {
                    entry.push(i);
                }
            }
        }

        Self { groups, index }
    }

    /// 기본 금연 정책 사전
    pub fn korean_smoking_policy() -> Self {
        Self::new(
            DEFAULT_GROUPS
                .iter()
                .map(|g| g.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    /// JSON 파일에서 로드 (`[["대표어", "동의어", ...], ...]`)
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read synonym file: {:?}", path))?;
        let groups: Vec<Vec<String>> =
            serde_json::from_str(&text).context("Failed to parse synonym file")?;
        Ok(Self::new(groups))
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// 용어의 동의어 (자기 자신 포함, 사전 순서)
    pub fn synonyms_of(&self, term: &str) -> Vec<&str> {
        self.index
            .get(&term.trim().to_lowercase())
            .map(|ids| {
                ids.iter()
                    .flat_map(|&i| self.groups[i].iter().map(String::as_str))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl KeywordExpander for SynonymDictionary {
    fn expand(&self, keywords: &[String]) -> Vec<String> {
        let synonyms = keywords
            .iter()
            .flat_map(|k| self.synonyms_of(k))
            .map(str::to_string);

        // 입력 키워드가 먼저, 그다음 동의어
        dedup_keywords(keywords.iter().cloned().chain(synonyms))
    }
}
