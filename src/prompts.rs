// prompts.rs

/// Prompt for classifying a claim against rendered web-search context.
/// The model must reply with a single JSON object.
pub fn verdict_prompt(claim: &str, search_context: &str) -> String {
    format!(
        r#"Analyze this claim: "{}"
Use this web search context:
---
{}
---
Respond ONLY with a valid JSON object in this exact format:
{{
  "verdict": "Real" | "Fake" | "Unverified",
  "explanation": "A concise, neutral summary of your conclusion."
}}"#,
        claim, search_context
    )
}

/// Prompt for pulling 1-3 verifiable claims out of cleaned page text.
pub fn claim_extraction_prompt(url: &str, page_text: &str) -> String {
    format!(
        r#"You are analyzing content from a web page to extract factual claims that can be verified.

URL: {}
Content: "{}"

Instructions:
1. Extract 1-3 main factual claims or statements from this content
2. Focus on verifiable facts, not opinions or subjective statements
3. Ignore advertisements, navigation, or irrelevant content
4. Make claims clear and concise
5. If no meaningful claims can be found, respond with "NO_CLAIMS"

Respond ONLY with a JSON object in this format:
{{
  "title": "Page title or main topic",
  "claims": ["First factual claim", "Second factual claim", "Third factual claim"],
  "summary": "Brief summary of the content"
}}

If no claims found:
{{
  "title": "Page title",
  "claims": [],
  "summary": "Content summary but no verifiable claims found"
}}"#,
        url, page_text
    )
}
