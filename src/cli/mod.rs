//! CLI 모듈
//!
//! geumyeon-rag CLI 명령어 정의 및 구현

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::answer::{AnswerGenerator, ANALYSIS_FAILED_MESSAGE};
use crate::config::{has_api_key, AppConfig};
use crate::embedding::GeminiEmbedding;
use crate::knowledge::{Chunk, SqliteChunkStore};
use crate::llm::{GeminiCompletion, KeyPool};
use crate::retrieval::{
    KeywordExpander, QuestionAnalyzer, SearchResult, SynonymDictionary, UnifiedSearch,
};

/// 사용자 동의어 사전 파일 (데이터 디렉토리 기준)
const SYNONYM_FILE: &str = "synonyms.json";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "geumyeon-rag")]
#[command(version, about = "금연 정책 문서 RAG 검색", long_about = None)]
pub struct Cli {
    /// 설정 파일 경로 (기본: 데이터 디렉토리의 config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 전처리된 청크 JSON 파일을 저장소로 가져오기
    Import {
        /// 청크 배열 JSON 파일
        #[arg(short, long)]
        file: PathBuf,
    },

    /// 질문으로 관련 청크 검색
    Search {
        /// 질문
        question: String,

        /// 최종 청크 수 상한
        #[arg(short, long)]
        max_chunks: Option<usize>,

        /// 특정 문서로 범위 제한
        #[arg(short, long)]
        document: Option<String>,

        /// 결과를 JSON으로 출력
        #[arg(long)]
        json: bool,
    },

    /// 검색 결과를 근거로 답변 생성
    Ask {
        /// 질문
        question: String,

        /// 최종 청크 수 상한
        #[arg(short, long)]
        max_chunks: Option<usize>,

        /// 특정 문서로 범위 제한
        #[arg(short, long)]
        document: Option<String>,
    },

    /// 저장된 문서 목록
    List {
        /// 결과 개수 제한
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// 문서 삭제 (청크 포함)
    Delete {
        /// 삭제할 문서 ID
        #[arg(short, long)]
        document: String,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Import { file } => cmd_import(&config, &file),
        Commands::Search {
            question,
            max_chunks,
            document,
            json,
        } => cmd_search(&config, &question, max_chunks, document.as_deref(), json).await,
        Commands::Ask {
            question,
            max_chunks,
            document,
        } => cmd_ask(&config, &question, max_chunks, document.as_deref()).await,
        Commands::List { limit } => cmd_list(&config, limit),
        Commands::Delete { document } => cmd_delete(&config, &document),
        Commands::Status => cmd_status(&config),
    }
}

// ============================================================================
// Wiring
// ============================================================================

/// 검색 파이프라인 구성요소
struct Pipeline {
    search: UnifiedSearch,
    answers: AnswerGenerator,
}

fn build_pipeline(config: &AppConfig) -> Result<Pipeline> {
    if !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export GEMINI_API_KEY=your-api-key\n  \
             또는 여러 키: export GEMINI_API_KEYS=key1,key2\n\n\
             API 키 발급: https://aistudio.google.com/app/apikey"
        );
    }

    let keys = Arc::new(KeyPool::from_env());
    let completion = Arc::new(GeminiCompletion::new(&config.llm)?);
    let store = Arc::new(
        SqliteChunkStore::open(&config.db_path()).context("SqliteChunkStore 열기 실패")?,
    );

    let mut search = UnifiedSearch::new(
        QuestionAnalyzer::new(completion.clone(), keys.clone()),
        load_expander(&config.data_dir)?,
        store,
        config,
    );

    if config.llm.use_embeddings {
        if let Some(key) = keys.primary() {
            let embedder = GeminiEmbedding::new(key.to_string(), &config.llm)?;
            search = search.with_embedder(Arc::new(embedder));
        }
    }

    if config.search.cache_ttl_secs > 0 {
        search = search.with_cache(Duration::from_secs(config.search.cache_ttl_secs));
    }

    Ok(Pipeline {
        search,
        answers: AnswerGenerator::new(completion, keys),
    })
}

/// 데이터 디렉토리에 synonyms.json이 있으면 사용, 없으면 기본 사전
fn load_expander(data_dir: &Path) -> Result<Arc<dyn KeywordExpander>> {
    let path = data_dir.join(SYNONYM_FILE);
    let dictionary = if path.exists() {
        tracing::info!("Using synonym dictionary: {:?}", path);
        SynonymDictionary::from_json_file(&path)?
    } else {
        SynonymDictionary::korean_smoking_policy()
    };
    Ok(Arc::new(dictionary))
}

async fn run_search(
    pipeline: &Pipeline,
    question: &str,
    max_chunks: Option<usize>,
    document: Option<&str>,
) -> Result<SearchResult> {
    let max_chunks = max_chunks.unwrap_or_else(|| pipeline.search.default_max_chunks());

    match pipeline.search.search_in(question, document, max_chunks).await {
        Ok(result) => Ok(result),
        Err(e) if e.is_fatal() => bail!("{}\n(원인: {})", ANALYSIS_FAILED_MESSAGE, e),
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 가져오기 명령어 (import)
fn cmd_import(config: &AppConfig, file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("파일 읽기 실패: {:?}", file))?;
    let mut chunks: Vec<Chunk> = serde_json::from_str(&text).context("청크 JSON 파싱 실패")?;

    for chunk in chunks.iter_mut().filter(|c| c.id.trim().is_empty()) {
        chunk.id = uuid::Uuid::new_v4().to_string();
    }

    let store = SqliteChunkStore::open(&config.db_path()).context("SqliteChunkStore 열기 실패")?;
    let count = store.insert_chunks(&chunks).context("청크 저장 실패")?;

    println!("[OK] {} 청크를 가져왔습니다", count);
    println!("     DB: {}", store.db_path().display());
    Ok(())
}

/// 검색 명령어 (search)
async fn cmd_search(
    config: &AppConfig,
    question: &str,
    max_chunks: Option<usize>,
    document: Option<&str>,
    json: bool,
) -> Result<()> {
    let pipeline = build_pipeline(config)?;

    if !json {
        println!("[*] 검색 중: \"{}\"", question);
    }

    let result = run_search(&pipeline, question, max_chunks, document).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if result.is_empty() {
        println!("\n[!] 관련 문서를 찾지 못했습니다.");
        return Ok(());
    }

    println!(
        "\n[OK] 검색 결과 ({} 건, 카테고리: {:?}):\n",
        result.chunks.len(),
        result.analysis.category
    );

    for (i, scored) in result.chunks.iter().enumerate() {
        println!(
            "{}. [점수: {:.3}] (키워드 {:.2} / 동의어 {:.2} / 의미 {:.2})",
            i + 1,
            scored.score,
            scored.breakdown.keyword,
            scored.breakdown.synonym,
            scored.breakdown.semantic
        );
        println!("   출처: {}", scored.chunk.location.citation());
        println!("   내용: {}", truncate_text(&scored.chunk.content, 200));
        println!();
    }

    let m = &result.metrics;
    println!(
        "[*] 처리 {} / 고유 {} / 평균 관련도 {:.3} / {:.1}ms",
        m.total_processed, m.unique_results, m.average_relevance, m.execution_time_ms
    );
    println!(
        "    품질: 상 {} / 중 {} / 하 {} ({} chars)",
        m.quality.high_quality,
        m.quality.medium_quality,
        m.quality.low_quality,
        m.quality.total_chars
    );

    Ok(())
}

/// 질문 명령어 (ask)
async fn cmd_ask(
    config: &AppConfig,
    question: &str,
    max_chunks: Option<usize>,
    document: Option<&str>,
) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    let result = run_search(&pipeline, question, max_chunks, document).await?;

    let answer = pipeline
        .answers
        .answer(question, &result)
        .await
        .context("답변 생성 실패")?;

    println!("{}\n", answer.text);

    if !answer.citations.is_empty() {
        println!("출처:");
        for citation in &answer.citations {
            println!("  {}", citation);
        }
    }

    Ok(())
}

/// 목록 명령어 (list)
fn cmd_list(config: &AppConfig, limit: usize) -> Result<()> {
    let store = SqliteChunkStore::open(&config.db_path()).context("SqliteChunkStore 열기 실패")?;
    let docs = store.list_documents(limit).context("문서 목록 조회 실패")?;

    if docs.is_empty() {
        println!("[!] 저장된 문서가 없습니다.");
        return Ok(());
    }

    println!("[OK] 저장된 문서 ({} 건):\n", docs.len());

    for doc in docs {
        println!("  {} - {}", doc.id, truncate_text(&doc.title, 40));
        println!(
            "        {} | {} chunks",
            doc.created_at.format("%Y-%m-%d %H:%M"),
            doc.chunk_count
        );
    }

    Ok(())
}

/// 삭제 명령어 (delete)
fn cmd_delete(config: &AppConfig, document: &str) -> Result<()> {
    let store = SqliteChunkStore::open(&config.db_path()).context("SqliteChunkStore 열기 실패")?;

    if store.delete_document(document).context("문서 삭제 실패")? {
        println!("[OK] 문서 {} 삭제됨", document);
    } else {
        println!("[!] 문서 {}를 찾을 수 없습니다", document);
    }

    Ok(())
}

/// 상태 명령어 (status)
fn cmd_status(config: &AppConfig) -> Result<()> {
    println!("geumyeon-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("[*] 데이터 디렉토리: {}", config.data_dir.display());

    let keys = KeyPool::from_env();
    if keys.is_empty() {
        println!("[!] API 키: 미설정");
        println!("    설정: export GEMINI_API_KEY=your-key");
    } else {
        println!("[OK] API 키: {} 개", keys.len());
    }

    match SqliteChunkStore::open(&config.db_path()).and_then(|s| s.stats()) {
        Ok(stats) => {
            println!("[OK] 문서: {} 건", stats.document_count);
            println!(
                "     청크: {} 건 (임베딩 {} 건)",
                stats.chunk_count, stats.embedded_chunk_count
            );
            println!("     총 콘텐츠: {} chars", stats.total_content_chars);
        }
        Err(e) => {
            println!("[!] 저장소 열기 실패: {}", e);
        }
    }

    println!(
        "[*] 가중치: 키워드 {} / 동의어 {} / 의미 {}",
        config.scoring.keyword_weight, config.scoring.synonym_weight, config.scoring.semantic_weight
    );
    println!(
        "[*] 컨텍스트 예산: 총 {} chars, 청크당 {} chars",
        config.context.max_total_chars, config.context.max_chunk_chars
    );

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

// ============================================================================
// Tests
// ============================================================================
