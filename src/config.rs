use std::env;
use std::time::Duration;
use tracing::warn;

/// Process configuration, read from the environment exactly once at startup
/// and passed into each adapter. Adapters never read the environment
/// themselves.
#[derive(Clone, Debug)]
pub struct Config {
    pub serper_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub verdict_provider: String,
    pub verdict_model: String,
    pub extraction_model: String,
    pub openai_model: String,
    pub temperature: f32,
    pub search_region: String,
    pub search_recency: String,
    pub search_timeout: Duration,
    pub llm_timeout: Duration,
    pub fetch_timeout: Duration,
    pub ocr_timeout: Duration,
    pub tesseract_command: String,
}

fn env_string(var: &str, default: &str) -> String {
    env::var(var).unwrap_or_else(|_| default.to_string())
}

fn env_secs(var: &str, default: u64) -> Duration {
    let secs = env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default);
    Duration::from_secs(secs)
}

/// Reads an optional credential, treating an empty value the same as an
/// unset one.
fn env_credential(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            serper_api_key: env_credential("SERPER_API_KEY"),
            gemini_api_key: env_credential("GEMINI_API_KEY"),
            openai_api_key: env_credential("OPENAI_API_KEY"),
            verdict_provider: env_string("VERDICT_PROVIDER", "gemini"),
            verdict_model: env_string("VERDICT_MODEL", "gemini-1.5-flash-latest"),
            extraction_model: env_string("EXTRACTION_MODEL", "gemini-pro"),
            openai_model: env_string("OPENAI_MODEL", "gpt-4o-mini"),
            temperature: env::var("LLM_TEMPERATURE")
                .ok()
                .and_then(|s| s.parse::<f32>().ok())
                .unwrap_or(0.0),
            search_region: env_string("SEARCH_REGION", "in"),
            search_recency: env_string("SEARCH_RECENCY", "qdr:w"),
            search_timeout: env_secs("SEARCH_TIMEOUT_SECONDS", 10),
            llm_timeout: env_secs("LLM_TIMEOUT_SECONDS", 60),
            fetch_timeout: env_secs("FETCH_TIMEOUT_SECONDS", 15),
            ocr_timeout: env_secs("OCR_TIMEOUT_SECONDS", 30),
            tesseract_command: env_string("TESSERACT_COMMAND", "tesseract"),
        }
    }

    /// Logs a warning per missing credential. Missing keys degrade the
    /// pipeline at runtime instead of aborting startup, so the server still
    /// answers every request with a well-formed payload.
    pub fn audit_credentials(&self) {
        if self.serper_api_key.is_none() {
            warn!("SERPER_API_KEY not set. Web search grounding is disabled.");
        }
        if self.gemini_api_key.is_none() {
            warn!("GEMINI_API_KEY not set. Crawl claim extraction will fall back to heuristics.");
        }
        if self.verdict_provider == "openai" && self.openai_api_key.is_none() {
            warn!("OPENAI_API_KEY not set. Verdicts will degrade to the Error sentinel.");
        } else if self.verdict_provider != "openai" && self.gemini_api_key.is_none() {
            warn!("GEMINI_API_KEY not set. Verdicts will degrade to the Error sentinel.");
        }
    }
}
