//! Typed decoding of service responses.
//!
//! Every call type answers with a JSON array. Responses are often wrapped in
//! markdown fences or surrounded by prose; both are stripped before the
//! array is deserialised into the call's response struct.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{PipelineError, Result};
use crate::llm::CallKind;
use crate::models::Favorability;

/// One classified section in a classification response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationEntry {
    pub index: usize,
    pub provision_type: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub display_tier: Option<u8>,
    #[serde(default)]
    pub complexity: Option<String>,
}

/// One excerpt in a high or medium extraction response.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedExcerpt {
    #[serde(default)]
    pub category: String,
    pub text: String,
    #[serde(default)]
    pub favorability: Favorability,
}

/// One entry in a favorability response.
#[derive(Debug, Clone, Deserialize)]
pub struct FavorabilityEntry {
    pub index: usize,
    #[serde(default)]
    pub favorability: Favorability,
}

/// Decode a response body into a list of `T`.
pub fn decode_array<T: DeserializeOwned>(call: CallKind, content: &str) -> Result<Vec<T>> {
    let json = locate_array(content).ok_or_else(|| PipelineError::ResponseDecode {
        call: call.as_str(),
        message: "no JSON array found".into(),
    })?;

    serde_json::from_str(json).map_err(|e| PipelineError::ResponseDecode {
        call: call.as_str(),
        message: e.to_string(),
    })
}

/// Find the JSON array in a response, looking inside fences first.
fn locate_array(content: &str) -> Option<&str> {
    let trimmed = content.trim();
    let blocks = extract_fenced_blocks(trimmed);

    // Prefer the last fenced block holding an array (explanations tend to come first)
    let candidate = blocks
        .iter()
        .rev()
        .copied()
        .find(|b| b.trim_start().starts_with('['))
        .unwrap_or(trimmed);

    let start = candidate.find('[')?;
    let end = candidate.rfind(']')?;
    (end > start).then(|| &candidate[start..=end])
}

/// Extract all fenced code blocks from text.
fn extract_fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut remaining = text;

    while let Some(start) = remaining.find("```") {
        let after_fence = &remaining[start + 3..];
        // Skip optional language identifier on the same line
        let content_start = after_fence.find('\n').map_or(0, |i| i + 1);
        let content = &after_fence[content_start..];
        if let Some(end) = content.find("```") {
            blocks.push(&content[..end]);
            remaining = &content[end + 3..];
        } else {
            break;
        }
    }

    blocks
}
