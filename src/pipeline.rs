use tracing::info;

use crate::search::{SearchClient, SearchResult};
use crate::verdict::{Verdict, VerdictEngine};

/// Claims are capped at the entry boundary; extracted text that exceeds the
/// cap is clamped before verification.
pub const MAX_CLAIM_CHARS: usize = 500;
/// Search links surfaced as verdict sources.
pub const MAX_SOURCES: usize = 3;

/// The claim-verification pipeline: search grounding followed by model
/// classification. All three entry points (text, OCR, crawl) call
/// [`Pipeline::verify_claim`] directly; there is no internal HTTP hop.
pub struct Pipeline {
    search: SearchClient,
    engine: VerdictEngine,
}

impl Pipeline {
    pub fn new(search: SearchClient, engine: VerdictEngine) -> Self {
        Pipeline { search, engine }
    }

    /// Verifies a single claim. Always returns a well-formed verdict object:
    /// search failures degrade to empty grounding and engine failures
    /// collapse into the Error sentinel.
    pub async fn verify_claim(&self, claim: &str) -> Verdict {
        info!("Processing claim: \"{}\"", claim);

        let results = self.search.search_claim(claim).await;
        let outcome = self.engine.evaluate(claim, &results).await;

        attach_sources(outcome.into_verdict(), &results)
    }
}

/// Returns the claim clamped to the boundary cap, on a char boundary.
pub fn clamp_claim(claim: &str) -> &str {
    match claim.char_indices().nth(MAX_CLAIM_CHARS) {
        Some((index, _)) => &claim[..index],
        None => claim,
    }
}

/// Validates a submitted claim at the entry boundary: non-empty once
/// trimmed, and at most MAX_CLAIM_CHARS characters.
pub fn validate_claim(claim: &str) -> Result<(), &'static str> {
    if claim.trim().is_empty() || claim.chars().count() > MAX_CLAIM_CHARS {
        return Err("Invalid claim provided.");
    }
    Ok(())
}

/// Attaches the top search links to a verdict as its sources.
pub fn attach_sources(mut verdict: Verdict, results: &[SearchResult]) -> Verdict {
    verdict.sources = Some(
        results
            .iter()
            .take(MAX_SOURCES)
            .map(|result| result.link.clone())
            .collect(),
    );
    verdict
}
