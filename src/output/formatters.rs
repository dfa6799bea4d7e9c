use anyhow::Result;
use serde_json::json;

use crate::engine::RetrievalOutcome;
use crate::utils::truncate_chars;

/// Plain text: the transcript itself, or the failure summary and optional trail
pub fn format_as_text(outcome: &RetrievalOutcome, max_chars: usize, include_trail: bool) -> String {
    match outcome {
        RetrievalOutcome::Success(retrieved) => truncate_chars(&retrieved.text, max_chars).to_string(),
        RetrievalOutcome::Failure(failure) => {
            let mut out = failure.summary();
            if include_trail && !failure.errors.is_empty() {
                out.push_str("\n\n");
                out.push_str(&failure.render_trail());
            }
            out
        }
    }
}

/// JSON document with classification, tier, winner and diagnostics
pub fn format_as_json(outcome: &RetrievalOutcome, max_chars: usize) -> Result<String> {
    let retrieved_at = chrono::Utc::now().to_rfc3339();

    let document = match outcome {
        RetrievalOutcome::Success(retrieved) => {
            let text = truncate_chars(&retrieved.text, max_chars);
            json!({
                "outcome": "success",
                "text": text,
                "truncated": text.len() < retrieved.text.len(),
                "tier": retrieved.tier,
                "strategy": retrieved.strategy,
                "wave": retrieved.wave,
                "elapsed_ms": retrieved.elapsed_ms,
                "retrieved_at": retrieved_at,
            })
        }
        RetrievalOutcome::Failure(failure) => json!({
            "outcome": "failure",
            "kind": failure.kind,
            "error": failure.summary(),
            "errors": failure.errors,
            "omitted": failure.omitted,
            "deadline_ms": failure.deadline_ms,
            "elapsed_ms": failure.elapsed_ms,
            "retrieved_at": retrieved_at,
        }),
    };

    Ok(serde_json::to_string_pretty(&document)?)
}
