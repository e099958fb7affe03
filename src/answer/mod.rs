//! 답변 생성 모듈
//!
//! 검색된 청크를 번호 붙은 컨텍스트로 묶어 LLM에 전달하고, 인용 목록을 함께 반환합니다.
//! 컨텍스트가 비어 있으면 LLM을 호출하지 않고 고정 안내문을 돌려줍니다.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::llm::{CompletionProvider, KeyPool};
use crate::retrieval::SearchResult;

/// 컨텍스트가 없을 때의 답변
pub const NO_CONTEXT_ANSWER: &str = "제공된 문서에서 질문과 관련된 정보를 찾을 수 없습니다.";

/// 질문 분석 실패 시 사용자 안내문
pub const ANALYSIS_FAILED_MESSAGE: &str =
    "질문을 분석할 수 없습니다. 잠시 후 다시 시도하거나 질문을 바꿔 주세요.";

/// 인용
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    pub index: usize,
    pub chunk_id: String,
    pub document: String,
    pub section: String,
    pub page: Option<u32>,
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = crate::knowledge::ChunkLocation {
            document: self.document.clone(),
            section: self.section.clone(),
            page: self.page,
        };
        write!(f, "[{}] {}", self.index, location.citation())
    }
}

/// 답변
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub citations: Vec<Citation>,
    /// 컨텍스트 없이 고정 안내문으로 답했는지
    pub grounded: bool,
}

/// 인용 목록 생성 (검색 결과 순서)
pub fn citations(result: &SearchResult) -> Vec<Citation> {
    result
        .chunks
        .iter()
        .enumerate()
        .map(|(i, scored)| Citation {
            index: i + 1,
            chunk_id: scored.chunk.id.clone(),
            document: scored.chunk.location.document.clone(),
            section: scored.chunk.location.section.clone(),
            page: scored.chunk.location.page,
        })
        .collect()
}

/// 답변 프롬프트 생성
pub fn build_answer_prompt(question: &str, result: &SearchResult) -> String {
    let mut prompt = String::from(
        "다음은 금연 정책 문서에서 발췌한 내용입니다. 발췌문에 근거해서만 한국어로 답하고, \
         근거가 된 발췌문 번호를 [1]처럼 표시하세요. 발췌문에 없는 내용은 모른다고 답하세요.\n\n",
    );

    for (citation, scored) in citations(result).iter().zip(&result.chunks) {
        prompt.push_str(&format!("{}\n{}\n\n", citation, scored.chunk.content.trim()));
    }

    prompt.push_str(&format!("질문: {}\n답변:", question.trim()));
    prompt
}

/// 답변 생성기
pub struct AnswerGenerator {
    completion: Arc<dyn CompletionProvider>,
    keys: Arc<KeyPool>,
}

impl AnswerGenerator {
    pub fn new(completion: Arc<dyn CompletionProvider>, keys: Arc<KeyPool>) -> Self {
        Self { completion, keys }
    }

    /// 검색 결과를 근거로 답변 생성
    pub async fn answer(&self, question: &str, result: &SearchResult) -> Result<Answer> {
        if result.is_empty() {
            return Ok(Answer {
                text: NO_CONTEXT_ANSWER.to_string(),
                citations: Vec::new(),
                grounded: false,
            });
        }

        let prompt = build_answer_prompt(question, result);
        let mut last_error = anyhow::anyhow!("no API keys configured");

        for (index, key) in self.keys.rotation() {
            match self.completion.complete(key, &prompt).await {
                Ok(text) => {
                    return Ok(Answer {
                        text: text.trim().to_string(),
                        citations: citations(result),
                        grounded: true,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        "Answer generation failed with key {}: {:#}",
                        KeyPool::masked(key),
                        e
                    );
                    self.keys.mark_failed(index);
                    last_error = e;
                }
            }
        }

        Err(last_error.context("Answer generation failed for every API key"))
    }
}
