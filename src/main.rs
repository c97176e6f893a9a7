use anyhow::{Context, Result};
use async_openai::{config::OpenAIConfig, Client as OpenAIClient};
use clap::Parser;
use std::sync::Arc;

use truthlens::api::{self, AppState};
use truthlens::config::Config;
use truthlens::crawl::Crawler;
use truthlens::llm::GeminiClient;
use truthlens::logging::configure_logging;
use truthlens::ocr::OcrEngine;
use truthlens::pipeline::Pipeline;
use truthlens::search::SearchClient;
use truthlens::verdict::VerdictEngine;
use truthlens::{LlmClient, LlmParams};

const USER_AGENT: &str = "TruthLens-FactChecker/1.0 (Content Analysis Bot)";
const MAX_REDIRECTS: usize = 5;

#[derive(Parser, Debug)]
#[command(name = "truthlens", about = "Misinformation-checking pipeline server")]
struct Args {
    /// Port the HTTP API listens on.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    configure_logging();

    let args = Args::parse();
    let config = Config::from_env();
    config.audit_credentials();

    // One outbound client shared by every adapter: search, AI calls, and
    // page fetches all go through it. The redirect cap bounds crawl fetches.
    let http = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .gzip(true)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
        .context("Failed to build HTTP client")?;

    let search = SearchClient::new(
        http.clone(),
        config.serper_api_key.clone(),
        config.search_region.clone(),
        config.search_recency.clone(),
        config.search_timeout,
    );
    let engine = VerdictEngine::new(verdict_llm_params(&config, &http));

    let state = AppState {
        pipeline: Arc::new(Pipeline::new(search, engine)),
        crawler: Arc::new(Crawler::new(
            http.clone(),
            extraction_llm_params(&config, &http),
            config.fetch_timeout,
        )),
        ocr: Arc::new(OcrEngine::new(
            config.tesseract_command.clone(),
            config.ocr_timeout,
        )),
    };

    api::serve(state, args.port).await
}

/// Model parameters for verdict generation, or None when the selected
/// provider has no credential. The verdict path requests strict JSON output.
fn verdict_llm_params(config: &Config, http: &reqwest::Client) -> Option<LlmParams> {
    let (client, model) = if config.verdict_provider == "openai" {
        let key = config.openai_api_key.clone()?;
        let openai = OpenAIClient::with_config(OpenAIConfig::new().with_api_key(key));
        (LlmClient::OpenAI(openai), config.openai_model.clone())
    } else {
        let key = config.gemini_api_key.clone()?;
        (
            LlmClient::Gemini(GeminiClient::new(http.clone(), key)),
            config.verdict_model.clone(),
        )
    };

    Some(LlmParams {
        client,
        model,
        temperature: config.temperature,
        require_json: true,
        timeout: config.llm_timeout,
    })
}

/// Model parameters for crawl claim extraction (always Gemini), or None when
/// no key is configured, in which case the crawler uses heuristics only.
fn extraction_llm_params(config: &Config, http: &reqwest::Client) -> Option<LlmParams> {
    let key = config.gemini_api_key.clone()?;
    Some(LlmParams {
        client: LlmClient::Gemini(GeminiClient::new(http.clone(), key)),
        model: config.extraction_model.clone(),
        temperature: config.temperature,
        require_json: false,
        timeout: config.llm_timeout,
    })
}
