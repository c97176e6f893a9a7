use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::llm::generate_llm_response;
use crate::prompts;
use crate::search::SearchResult;
use crate::{LlmParams, TARGET_LLM_REQUEST};

/// Classification attached to every pipeline response. `NoClaims` is the
/// terminal label for crawls that surfaced nothing verifiable; `Error` is
/// the fail-soft sentinel for infrastructure failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerdictLabel {
    Real,
    Fake,
    Unverified,
    Error,
    #[serde(rename = "No Claims")]
    NoClaims,
}

/// The structured output of the fact-checking pipeline. Constructed fresh
/// per request and never mutated after the sources are attached.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub verdict: VerdictLabel,
    pub explanation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
}

impl Verdict {
    pub fn error(explanation: impl Into<String>) -> Self {
        Verdict {
            verdict: VerdictLabel::Error,
            explanation: explanation.into(),
            sources: None,
        }
    }

    pub fn no_claims() -> Self {
        Verdict {
            verdict: VerdictLabel::NoClaims,
            explanation: "No verifiable factual claims could be extracted from this webpage."
                .to_string(),
            sources: None,
        }
    }
}

/// Infrastructure failures the engine converts into the Error sentinel at
/// the HTTP boundary. The Display strings double as the user-facing
/// explanations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerdictError {
    #[error("Server is missing AI API key.")]
    MissingCredential,
    #[error("The AI analysis failed.")]
    Transport,
    #[error("The AI analysis returned malformed output.")]
    MalformedResponse,
}

/// Distinguishes a clean classification from one produced under degraded
/// conditions, and both from an infrastructure failure. Callers that only
/// need the fail-soft contract collapse this with [`VerdictOutcome::into_verdict`].
#[derive(Debug, PartialEq)]
pub enum VerdictOutcome {
    Ok(Verdict),
    Degraded(Verdict, String),
    Failed(VerdictError),
}

impl VerdictOutcome {
    /// Collapses the outcome into a verdict object, logging the degradation
    /// reason and converting failures into the Error sentinel.
    pub fn into_verdict(self) -> Verdict {
        match self {
            VerdictOutcome::Ok(verdict) => verdict,
            VerdictOutcome::Degraded(verdict, reason) => {
                warn!(target: TARGET_LLM_REQUEST, "Verdict produced under degraded conditions: {}", reason);
                verdict
            }
            VerdictOutcome::Failed(error) => {
                warn!(target: TARGET_LLM_REQUEST, "Verdict generation failed: {}", error);
                Verdict::error(error.to_string())
            }
        }
    }
}

/// Asks the configured model to classify a claim against search context.
/// Never raises past its own boundary.
pub struct VerdictEngine {
    params: Option<LlmParams>,
}

impl VerdictEngine {
    /// `params` is None when no AI credential was configured; every
    /// evaluation then fails with MissingCredential.
    pub fn new(params: Option<LlmParams>) -> Self {
        VerdictEngine { params }
    }

    pub async fn evaluate(&self, claim: &str, results: &[SearchResult]) -> VerdictOutcome {
        let params = match &self.params {
            Some(params) => params,
            None => return VerdictOutcome::Failed(VerdictError::MissingCredential),
        };

        let context = render_search_context(results);
        let prompt = prompts::verdict_prompt(claim, &context);

        let response = match generate_llm_response(&prompt, params).await {
            Some(response) => response,
            None => return VerdictOutcome::Failed(VerdictError::Transport),
        };

        match parse_verdict_response(&response) {
            Ok((verdict, Some(unrecognized))) => VerdictOutcome::Degraded(
                verdict,
                format!("model returned unrecognized verdict \"{}\"", unrecognized),
            ),
            Ok((verdict, None)) => {
                if results.is_empty() {
                    VerdictOutcome::Degraded(
                        verdict,
                        "no web search grounding was available".to_string(),
                    )
                } else {
                    VerdictOutcome::Ok(verdict)
                }
            }
            Err(error) => VerdictOutcome::Failed(error),
        }
    }
}

/// Renders numbered search snippets for the verdict prompt, or an explicit
/// placeholder when the search stage came back empty.
pub fn render_search_context(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No relevant web search results were found.".to_string();
    }
    results
        .iter()
        .enumerate()
        .map(|(i, result)| format!("[{}] {}: \"{}\"", i + 1, result.title, result.snippet))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Deserialize)]
struct RawVerdict {
    verdict: String,
    explanation: String,
}

/// Parses the model's reply into a verdict. A label outside the known enum
/// normalizes to Unverified; the raw label is returned alongside so the
/// caller can mark the outcome degraded.
pub fn parse_verdict_response(raw: &str) -> Result<(Verdict, Option<String>), VerdictError> {
    let cleaned = strip_code_fences(raw);
    let parsed: RawVerdict = serde_json::from_str(cleaned).map_err(|e| {
        warn!(target: TARGET_LLM_REQUEST, "Failed to parse verdict JSON: {}", e);
        VerdictError::MalformedResponse
    })?;

    let (label, unrecognized) = match parsed.verdict.as_str() {
        "Real" => (VerdictLabel::Real, None),
        "Fake" => (VerdictLabel::Fake, None),
        "Unverified" => (VerdictLabel::Unverified, None),
        other => (VerdictLabel::Unverified, Some(other.to_string())),
    };

    Ok((
        Verdict {
            verdict: label,
            explanation: parsed.explanation,
            sources: None,
        },
        unrecognized,
    ))
}

/// Strips a Markdown code fence the model may have wrapped around its JSON.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_verdict() {
        let raw = r#"{"verdict": "Fake", "explanation": "Scientific consensus confirms Earth is an ellipsoid."}"#;
        let (verdict, unrecognized) = parse_verdict_response(raw).unwrap();
        assert_eq!(verdict.verdict, VerdictLabel::Fake);
        assert_eq!(
            verdict.explanation,
            "Scientific consensus confirms Earth is an ellipsoid."
        );
        assert!(unrecognized.is_none());
    }

    #[test]
    fn strips_code_fences_before_parsing() {
        let raw = "```json\n{\"verdict\": \"Real\", \"explanation\": \"ok\"}\n```";
        let (verdict, _) = parse_verdict_response(raw).unwrap();
        assert_eq!(verdict.verdict, VerdictLabel::Real);
    }

    #[test]
    fn unknown_label_normalizes_to_unverified() {
        let raw = r#"{"verdict": "Probably True", "explanation": "hedging"}"#;
        let (verdict, unrecognized) = parse_verdict_response(raw).unwrap();
        assert_eq!(verdict.verdict, VerdictLabel::Unverified);
        assert_eq!(unrecognized.as_deref(), Some("Probably True"));
    }

    #[test]
    fn malformed_json_is_a_typed_failure() {
        let error = parse_verdict_response("the model rambled instead").unwrap_err();
        assert_eq!(error, VerdictError::MalformedResponse);
    }

    #[test]
    fn parsing_is_deterministic() {
        let raw = r#"{"verdict": "Real", "explanation": "same in, same out"}"#;
        let first = parse_verdict_response(raw).unwrap();
        let second = parse_verdict_response(raw).unwrap();
        assert_eq!(first.0, second.0);
    }

    #[test]
    fn renders_numbered_context() {
        let results = vec![
            SearchResult {
                title: "A".to_string(),
                snippet: "first".to_string(),
                link: "https://a".to_string(),
            },
            SearchResult {
                title: "B".to_string(),
                snippet: "second".to_string(),
                link: "https://b".to_string(),
            },
        ];
        let context = render_search_context(&results);
        assert_eq!(context, "[1] A: \"first\"\n[2] B: \"second\"");
    }

    #[test]
    fn empty_context_uses_placeholder() {
        assert_eq!(
            render_search_context(&[]),
            "No relevant web search results were found."
        );
    }

    #[test]
    fn failed_outcome_collapses_to_error_sentinel() {
        let verdict = VerdictOutcome::Failed(VerdictError::MissingCredential).into_verdict();
        assert_eq!(verdict.verdict, VerdictLabel::Error);
        assert_eq!(verdict.explanation, "Server is missing AI API key.");
    }

    #[test]
    fn no_claims_label_serializes_with_space() {
        let rendered = serde_json::to_string(&Verdict::no_claims()).unwrap();
        assert!(rendered.contains("\"No Claims\""));
        assert!(!rendered.contains("sources"));
    }

    #[tokio::test]
    async fn engine_without_credential_fails_typed() {
        let engine = VerdictEngine::new(None);
        let outcome = engine.evaluate("anything", &[]).await;
        assert_eq!(
            outcome,
            VerdictOutcome::Failed(VerdictError::MissingCredential)
        );
    }
}
