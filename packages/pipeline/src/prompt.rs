use serde::Serialize;

use crate::catalog::CalibrationExample;
use crate::config::IngestConfig;
use crate::error::Result;
use crate::llm::{CallKind, LlmRequest, Message, Role};

const SYSTEM_CLASSIFY: &str = include_str!("../prompts/classify.txt");
const SYSTEM_EXTRACT_HIGH: &str = include_str!("../prompts/extract_high.txt");
const SYSTEM_EXTRACT_MEDIUM: &str = include_str!("../prompts/extract_medium.txt");
const SYSTEM_FAVORABILITY: &str = include_str!("../prompts/favorability.txt");

/// Characters of provision text sent for a favorability judgement.
const FAVORABILITY_TEXT_CHARS: usize = 2_000;

/// One section in a classification request.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifyItem {
    pub index: usize,
    pub heading: String,
    pub title: String,
    pub text_preview: String,
    pub sub_item_count: usize,
    pub char_count: usize,
}

/// One provision in a favorability request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavorabilityItem {
    pub index: usize,
    pub provision_type: String,
    pub category: String,
    pub text: String,
}

impl FavorabilityItem {
    pub fn new(index: usize, provision_type: &str, category: &str, text: &str) -> Self {
        Self {
            index,
            provision_type: provision_type.to_string(),
            category: category.to_string(),
            text: preview(text, FAVORABILITY_TEXT_CHARS),
        }
    }
}

/// First `max_chars` characters of `text`, marked when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.char_indices();
    match chars.nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn request(kind: CallKind, system: &str, user: String, config: &IngestConfig) -> LlmRequest {
    LlmRequest {
        kind,
        system: system.to_string(),
        messages: vec![Message {
            role: Role::User,
            content: user,
        }],
        max_tokens: config.max_tokens,
        temperature: config.temperature,
    }
}

/// Build a batch classification request.
pub fn build_classification_request(
    items: &[ClassifyItem],
    learned_rules: &[String],
    config: &IngestConfig,
) -> Result<LlmRequest> {
    let mut prompt = String::new();

    if !learned_rules.is_empty() {
        prompt.push_str("## Classification rules learned from earlier agreements:\n");
        for rule in learned_rules {
            prompt.push_str(&format!("- {rule}\n"));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!("## Sections to classify ({}):\n", items.len()));
    prompt.push_str(&serde_json::to_string_pretty(items)?);
    prompt.push_str("\n\nReturn ONLY the JSON array, one entry per index. No markdown fences.");

    Ok(request(CallKind::Classification, SYSTEM_CLASSIFY, prompt, config))
}

/// Build a per-section extraction request.
///
/// High complexity sections carry calibration examples; medium ones ask
/// for an exhaustive split along internal numbering.
pub fn build_extraction_request(
    kind: CallKind,
    provision_type: &str,
    category: &str,
    text: &str,
    examples: &[CalibrationExample],
    config: &IngestConfig,
) -> LlmRequest {
    let mut prompt = String::new();

    prompt.push_str(&format!("# Provision type: {provision_type}\n"));
    prompt.push_str(&format!("- Category: {category}\n\n"));

    let system = if kind == CallKind::HighExtraction {
        if !examples.is_empty() {
            prompt.push_str("## Calibration examples:\n");
            for example in examples {
                prompt.push_str(&format!(
                    "- [{}] {}: {}\n",
                    example.favorability,
                    example.category,
                    preview(&example.text, FAVORABILITY_TEXT_CHARS)
                ));
            }
            prompt.push('\n');
        }
        SYSTEM_EXTRACT_HIGH
    } else {
        SYSTEM_EXTRACT_MEDIUM
    };

    prompt.push_str("## Section text:\n");
    prompt.push_str(text);
    prompt.push_str(
        "\n\nReturn ONLY the JSON array. Every `text` must be copied verbatim from the section.",
    );

    request(kind, system, prompt, config)
}

/// Build a batch favorability request.
pub fn build_favorability_request(
    items: &[FavorabilityItem],
    config: &IngestConfig,
) -> Result<LlmRequest> {
    let mut prompt = format!("## Provisions ({}):\n", items.len());
    prompt.push_str(&serde_json::to_string_pretty(items)?);
    prompt.push_str("\n\nReturn ONLY the JSON array, one entry per index.");

    Ok(request(
        CallKind::Favorability,
        SYSTEM_FAVORABILITY,
        prompt,
        config,
    ))
}
