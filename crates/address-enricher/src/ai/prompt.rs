//! Request prompts and response parsing for address extraction.
//!
//! Kept free of any HTTP types so every provider (and the tests) can share
//! the exact wording and the parsing rules.

use crate::error::{EnrichmentError, Result};
use crate::types::{AddressRecord, EnrichmentItem};

/// System instruction sent with every batch.
pub const SYSTEM_PROMPT: &str = "Anda adalah asisten yang ahli dalam ekstraksi informasi alamat \
Indonesia. Berikan response dalam format JSON yang valid.";

/// Build the user message embedding the batch and the target shape.
pub fn build_user_prompt(records: &[AddressRecord]) -> Result<String> {
    let payload = serde_json::to_string_pretty(records)?;

    Ok(format!(
        "Ekstrak informasi Kecamatan dan Desa/Kelurahan dari alamat berikut. \
         Berikan response dalam format JSON array.\n\n\
         Data alamat:\n{}\n\n\
         Response format:\n\
         [\n  {{\n    \"conversation_id\": \"id\",\n    \"kecamatan\": \"nama kecamatan\",\n    \
         \"kelurahan\": \"nama desa/kelurahan\"\n  }}\n]\n\n\
         Jika tidak dapat diekstrak, kosongkan field tersebut. Pastikan response valid JSON.",
        payload
    ))
}

/// Remove a surrounding Markdown code fence, if any.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse the model's message content into extraction items.
///
/// # Errors
///
/// Returns [`EnrichmentError::MalformedResponse`] when the content is not a
/// JSON array of items with an identifier.
pub fn parse_extraction(content: &str) -> Result<Vec<EnrichmentItem>> {
    let json = strip_code_fence(content);
    if json.is_empty() {
        return Err(EnrichmentError::MalformedResponse(
            "empty message content".to_string(),
        ));
    }

    serde_json::from_str::<Vec<EnrichmentItem>>(json)
        .map_err(|e| EnrichmentError::MalformedResponse(format!("invalid JSON array: {}", e)))
}
