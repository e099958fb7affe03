//! LLM 모듈 - Gemini 텍스트 생성 + API 키 풀
//!
//! 텍스트 생성 호출은 키를 인자로 받습니다.
//! 키 순환은 호출하는 쪽([`KeyPool`] 소유자)이 담당합니다.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;

/// Gemini generateContent 엔드포인트 (모델명은 설정에서)
/// source: https://ai.google.dev/api/generate-content
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// 최대 출력 토큰
const MAX_OUTPUT_TOKENS: u32 = 2048;

// ============================================================================
// CompletionProvider Trait
// ============================================================================

/// 텍스트 생성 프로바이더 트레이트
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// 프롬프트에 대한 텍스트 생성 (주어진 API 키 사용)
    async fn complete(&self, api_key: &str, prompt: &str) -> Result<String>;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// KeyPool
// ============================================================================

/// API 키 풀 (라운드 로빈)
///
/// 커서는 마지막으로 실패하지 않은 키를 가리킵니다.
/// 한 번의 호출 안에서 모든 키를 정확히 한 번씩 시도합니다.
#[derive(Debug)]
pub struct KeyPool {
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl KeyPool {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys,
            cursor: AtomicUsize::new(0),
        }
    }

    /// 환경변수에서 키 로드
    pub fn from_env() -> Self {
        Self::new(crate::config::get_api_keys())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// 첫 번째 키 (임베딩 등 단일 키 사용처)
    pub fn primary(&self) -> Option<&str> {
        self.keys.first().map(String::as_str)
    }

    /// 이번 호출의 시도 순서 (현재 커서부터 한 바퀴)
    pub fn rotation(&self) -> Vec<(usize, &str)> {
        let n = self.keys.len();
        if n == 0 {
            return Vec::new();
        }
        let start = self.cursor.load(Ordering::Relaxed) % n;
        (0..n)
            .map(|offset| {
                let idx = (start + offset) % n;
                (idx, self.keys[idx].as_str())
            })
            .collect()
    }

    /// 실패한 키 다음으로 커서 이동
    pub fn mark_failed(&self, index: usize) {
        if !self.keys.is_empty() {
            self.cursor
                .store((index + 1) % self.keys.len(), Ordering::Relaxed);
        }
    }

    /// 키 마스킹 (로그용)
    pub fn masked(key: &str) -> String {
        let skip = key.chars().count().saturating_sub(4);
        let tail: String = key.chars().skip(skip).collect();
        format!("***{}", tail)
    }
}

// ============================================================================
// Google Gemini Completion
// ============================================================================

/// Gemini 텍스트 생성 구현체
#[derive(Debug)]
pub struct GeminiCompletion {
    client: reqwest::Client,
    model: String,
    temperature: f32,
}

impl GeminiCompletion {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            model: config.completion_model.clone(),
            temperature: config.temperature,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", GEMINI_API_BASE, self.model)
    }
}

/// Gemini API 요청 본문
#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

/// Gemini API 응답
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[async_trait]
impl CompletionProvider for GeminiCompletion {
    async fn complete(&self, api_key: &str, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send generateContent request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            anyhow::bail!("Gemini API error ({}): {}", status, body);
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).context("Failed to parse generateContent response")?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            anyhow::bail!("Gemini API returned an empty completion");
        }

        Ok(text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> KeyPool {
        KeyPool::new(vec!["k0".into(), "k1".into(), "k2".into()])
    }

    #[test]
    fn test_rotation_covers_every_key_once() {
        let pool = pool();
        let order: Vec<usize> = pool.rotation().into_iter().map(|(i, _)| i).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_mark_failed_advances_cursor() {
        let pool = pool();
        pool.mark_failed(0);
        let order: Vec<&str> = pool.rotation().into_iter().map(|(_, k)| k).collect();
        assert_eq!(order, vec!["k1", "k2", "k0"]);

        // 마지막 키 실패 시 처음으로 돌아감
        pool.mark_failed(2);
        assert_eq!(pool.rotation()[0].1, "k0");
    }

    #[test]
    fn test_empty_pool() {
        let pool = KeyPool::new(vec![]);
        assert!(pool.is_empty());
        assert!(pool.rotation().is_empty());
        assert!(pool.primary().is_none());
        pool.mark_failed(3);
    }

    #[test]
    fn test_masked_key() {
        assert_eq!(KeyPool::masked("AIzaSy-secret-abcd"), "***abcd");
        assert_eq!(KeyPool::masked("ab"), "***ab");
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"안녕"},{"text":"하세요"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        let text: String = parsed.candidates[0]
            .content
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect();
        assert_eq!(text, "안녕하세요");
    }

    #[test]
    fn test_endpoint_uses_model() {
        let completion = GeminiCompletion::new(&LlmConfig::default()).unwrap();
        assert!(completion.endpoint().ends_with("gemini-2.0-flash:generateContent"));
    }
}
