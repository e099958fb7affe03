//! Question Analyzer - 질문 구조화
//!
//! 질문을 LLM에 보내 의도/키워드/카테고리/복잡도/개체를 담은 JSON으로 분해합니다.
//! 키 하나로 실패하면(네트워크, 빈 응답, JSON 파싱 실패) 즉시 다음 키로 넘어가며,
//! 풀의 모든 키를 한 번씩 시도한 뒤에야 실패를 반환합니다.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SearchError;
use crate::knowledge::dedup_keywords;
use crate::llm::{CompletionProvider, KeyPool};

// ============================================================================
// Types
// ============================================================================

/// 질문 카테고리
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Definition,
    Procedure,
    Regulation,
    Comparison,
    Analysis,
    General,
}

impl Category {
    /// 알 수 없는 값은 General
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "definition" => Category::Definition,
            "procedure" => Category::Procedure,
            "regulation" => Category::Regulation,
            "comparison" => Category::Comparison,
            "analysis" => Category::Analysis,
            _ => Category::General,
        }
    }
}

/// 질문 복잡도
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Medium,
    Complex,
}

impl Complexity {
    /// 알 수 없는 값은 Simple
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "medium" => Complexity::Medium,
            "complex" => Complexity::Complex,
            _ => Complexity::Simple,
        }
    }
}

/// 질문 분석 결과 (질문마다 새로 생성, 저장하지 않음)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAnalysis {
    pub intent: String,
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_keywords: Option<Vec<String>>,
    pub category: Category,
    pub complexity: Complexity,
    pub entities: Vec<String>,
    pub context: String,
}

impl QuestionAnalysis {
    /// 키워드만 지정한 분석 (나머지는 기본값)
    pub fn with_keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            intent: String::new(),
            keywords: dedup_keywords(keywords.into_iter().map(Into::into)),
            expanded_keywords: None,
            category: Category::General,
            complexity: Complexity::Simple,
            entities: Vec::new(),
            context: String::new(),
        }
    }

    /// 확장 키워드 (없으면 빈 슬라이스)
    pub fn expanded(&self) -> &[String] {
        self.expanded_keywords.as_deref().unwrap_or(&[])
    }
}

// ============================================================================
// Prompt
// ============================================================================

const ANALYSIS_PROMPT: &str = r#"당신은 한국 금연 정책 문서 검색을 위한 질문 분석기입니다.
다음 질문을 분석하여 아래 형식의 JSON 객체 하나만 출력하세요. 마크다운 코드 블록을 사용하지 마세요.

{
  "intent": "질문의 의도를 한 문장으로",
  "keywords": ["문서 검색에 쓸 핵심 용어"],
  "category": "definition | procedure | regulation | comparison | analysis | general 중 하나",
  "complexity": "simple | medium | complex 중 하나",
  "entities": ["질문에 언급된 기관, 법령, 장소 등"],
  "context": "질문의 의미를 풀어 쓴 문장"
}

질문: "#;

/// 분석 프롬프트 생성
pub fn build_prompt(question: &str) -> String {
    format!("{}{}", ANALYSIS_PROMPT, question.trim())
}

// ============================================================================
// Response Parsing
// ============================================================================

static FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*```[A-Za-z]*\s*").expect("valid fence regex"));
static FENCE_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*```\s*$").expect("valid fence regex"));

/// 앞뒤 코드 펜스 제거
pub fn strip_code_fences(text: &str) -> String {
    let opened = FENCE_OPEN.replace(text, "");
    FENCE_CLOSE.replace(&opened, "").trim().to_string()
}

/// LLM 응답을 분석 결과로 파싱
///
/// 누락된 필드는 기본값으로 채웁니다
/// (category → general, complexity → simple, 배열 → 빈 배열, 문자열 → "").
pub fn parse_analysis(response: &str) -> anyhow::Result<QuestionAnalysis> {
    let cleaned = strip_code_fences(response);
    if cleaned.is_empty() {
        anyhow::bail!("empty analysis response");
    }

    let value: Value = serde_json::from_str(&cleaned)
        .map_err(|e| anyhow::anyhow!("analysis response is not valid JSON: {}", e))?;

    let obj = value
        .as_object()
        .ok_or_else(|| anyhow::anyhow!("analysis response is not a JSON object"))?;

    let text = |key: &str| -> String {
        obj.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string()
    };
    let list = |key: &str| -> Vec<String> {
        let items = obj
            .get(key)
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        dedup_keywords(items)
    };

    Ok(QuestionAnalysis {
        intent: text("intent"),
        keywords: list("keywords"),
        expanded_keywords: None,
        category: Category::parse(&text("category")),
        complexity: Complexity::parse(&text("complexity")),
        entities: list("entities"),
        context: text("context"),
    })
}

// ============================================================================
// QuestionAnalyzer
// ============================================================================

/// 질문 분석기
#[derive(Clone)]
pub struct QuestionAnalyzer {
    completion: Arc<dyn CompletionProvider>,
    keys: Arc<KeyPool>,
}

impl QuestionAnalyzer {
    pub fn new(completion: Arc<dyn CompletionProvider>, keys: Arc<KeyPool>) -> Self {
        Self { completion, keys }
    }

    /// 질문 분석
    ///
    /// 키 풀을 현재 커서부터 한 바퀴 순차 시도합니다. 첫 성공이 결과입니다.
    pub async fn analyze(&self, question: &str) -> Result<QuestionAnalysis, SearchError> {
        let prompt = build_prompt(question);
        let rotation = self.keys.rotation();
        let mut last_error = String::from("no API keys configured");
        let mut attempts = 0;

        for (index, key) in rotation {
            attempts += 1;

            let outcome = match self.completion.complete(key, &prompt).await {
                Ok(response) => parse_analysis(&response),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(analysis) => {
                    tracing::debug!(
                        "Question analyzed with key {} (attempt {}): category={:?}, keywords={:?}",
                        KeyPool::masked(key),
                        attempts,
                        analysis.category,
                        analysis.keywords
                    );
                    return Ok(analysis);
                }
                Err(e) => {
                    tracing::warn!(
                        "Question analysis failed with key {}: {:#}",
                        KeyPool::masked(key),
                        e
                    );
                    last_error = format!("{:#}", e);
                    self.keys.mark_failed(index);
                }
            }
        }

        Err(SearchError::AnalysisUnavailable {
            attempts,
            last_error,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
