use anyhow::{anyhow, Context, Result};
use async_openai::types::{
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat,
};
use serde_json::{json, Value};
use std::fmt;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, error, info, warn};

use crate::{LlmClient, LlmParams, TARGET_LLM_REQUEST};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Thin client for the Gemini generateContent endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
}

impl fmt::Debug for GeminiClient {
    // The API key must not end up in logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient").finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, api_key: String) -> Self {
        GeminiClient { http, api_key }
    }

    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
        require_json: bool,
    ) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            GEMINI_API_BASE, model, self.api_key
        );

        let mut generation_config = json!({ "temperature": temperature });
        if require_json {
            generation_config["response_mime_type"] = json!("application/json");
        }
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": generation_config,
        });

        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Gemini API returned status {}", status));
        }

        let payload: Value = response.json().await?;
        payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|text| text.to_string())
            .context("Gemini response contained no candidate text")
    }
}

async fn generate_once(prompt: &str, params: &LlmParams) -> Result<String> {
    match &params.client {
        LlmClient::Gemini(gemini) => {
            gemini
                .generate(&params.model, prompt, params.temperature, params.require_json)
                .await
        }
        LlmClient::OpenAI(client) => {
            let mut builder = CreateChatCompletionRequestArgs::default();
            builder
                .model(params.model.clone())
                .temperature(params.temperature)
                .messages([ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()?
                    .into()]);
            if params.require_json {
                builder.response_format(ResponseFormat::JsonObject);
            }
            let request = builder.build()?;

            let response = client.chat().create(request).await?;
            response
                .choices
                .first()
                .and_then(|choice| choice.message.content.clone())
                .context("OpenAI response contained no message content")
        }
    }
}

/// Sends a prompt to the configured model, retrying transient failures with
/// exponential backoff. Returns None once all retries are exhausted; callers
/// decide what a missing response means for their stage.
pub async fn generate_llm_response(prompt: &str, params: &LlmParams) -> Option<String> {
    let max_retries = 3;
    let mut backoff = 2;

    for retry_count in 0..max_retries {
        debug!(target: TARGET_LLM_REQUEST, "Sending request to {} ({} chars of prompt)", params.model, prompt.len());

        match timeout(params.timeout, generate_once(prompt, params)).await {
            Ok(Ok(response)) => {
                debug!(target: TARGET_LLM_REQUEST, "Model {} replied with {} chars", params.model, response.len());
                return Some(response);
            }
            Ok(Err(e)) => {
                warn!(target: TARGET_LLM_REQUEST, "Error generating response: {}", e);
                if retry_count < max_retries - 1 {
                    info!(target: TARGET_LLM_REQUEST, "Retrying LLM request... ({}/{})", retry_count + 1, max_retries);
                } else {
                    error!(target: TARGET_LLM_REQUEST, "Failed to generate response after {} retries", max_retries);
                }
            }
            Err(_) => {
                warn!(target: TARGET_LLM_REQUEST, "LLM request timed out after {:?}", params.timeout);
                if retry_count < max_retries - 1 {
                    info!(target: TARGET_LLM_REQUEST, "Retrying LLM request... ({}/{})", retry_count + 1, max_retries);
                } else {
                    error!(target: TARGET_LLM_REQUEST, "Failed to generate response after {} retries due to timeouts", max_retries);
                }
            }
        }

        if retry_count < max_retries - 1 {
            sleep(Duration::from_secs(backoff)).await;
            backoff *= 2;
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_client_debug_hides_key() {
        let client = GeminiClient::new(reqwest::Client::new(), "secret-key".to_string());
        let rendered = format!("{:?}", client);
        assert!(!rendered.contains("secret-key"));
    }
}
