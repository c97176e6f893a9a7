pub mod api;
pub mod config;
pub mod crawl;
pub mod llm;
pub mod logging;
pub mod ocr;
pub mod pipeline;
pub mod prompts;
pub mod search;
pub mod verdict;

use async_openai::{config::OpenAIConfig, Client as OpenAIClient};
use std::time::Duration;

use crate::llm::GeminiClient;

pub const TARGET_WEB_REQUEST: &str = "web_request";
pub const TARGET_LLM_REQUEST: &str = "llm_request";
pub const TARGET_OCR_REQUEST: &str = "ocr_request";

/// Generative-AI backends the pipeline can talk to. The crawl extraction
/// path always uses Gemini; the verdict path is selectable.
#[derive(Clone, Debug)]
pub enum LlmClient {
    Gemini(GeminiClient),
    OpenAI(OpenAIClient<OpenAIConfig>),
}

/// Everything a single generation call needs, bundled so adapters hold one
/// value instead of reading configuration piecemeal.
#[derive(Clone, Debug)]
pub struct LlmParams {
    pub client: LlmClient,
    pub model: String,
    pub temperature: f32,
    pub require_json: bool,
    pub timeout: Duration,
}
