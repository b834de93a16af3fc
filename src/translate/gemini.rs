//! Gemini-based translation using the Generative AI API.

use crate::config::{BackendKind, TranslationConfig};
use crate::error::BackendError;
use crate::translate::session::{read_body, HttpSession};
use crate::translate::{BackendResult, DispatchMode, TranslationBackend, TranslationHints};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

pub const DEFAULT_PROMPT_TEMPLATE: &str = "Translate the following text from {source_language} to {target_language}. \
Please provide only the translated text, without any additional explanations or context. \
Maintain the original meaning and tone as much as possible.";

/// Stands in for line breaks inside one numbered segment.
const LINE_BREAK: &str = "<br>";

/// USD per 1,000 tokens as (input, output).
const PRICING: &[(&str, f64, f64)] = &[
    ("gemini-2.5-flash-preview-05-20", 0.000125, 0.000375),
    ("gemini-1.5-pro-latest", 0.00125, 0.00375),
];

/// Estimated cost of one call, for models with known pricing.
pub fn estimate_cost(model: &str, prompt_tokens: u64, candidate_tokens: u64) -> Option<f64> {
    PRICING
        .iter()
        .find(|(name, _, _)| *name == model)
        .map(|(_, input, output)| {
            (prompt_tokens as f64 / 1000.0) * input + (candidate_tokens as f64 / 1000.0) * output
        })
}

/// First and last four characters of a key, for logging.
fn mask_key(api_key: &str) -> String {
    let chars: Vec<char> = api_key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        "...".to_string()
    }
}

/// Translator using Google Gemini API.
pub struct GeminiBackend {
    session: HttpSession,
    base_url: String,
    api_key: String,
    model: String,
    prompt_template: String,
}

impl GeminiBackend {
    /// Create a new Gemini backend with the given API key.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            session: HttpSession::new(timeout),
            base_url: BackendKind::Generative.default_endpoint().to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }

    /// Set a different model (e.g., "gemini-1.5-pro").
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Template with `{source_language}`, `{target_language}` and `{tone}`
    /// placeholders.
    pub fn with_prompt_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = template.into();
        self
    }

    pub fn from_config(config: &TranslationConfig) -> BackendResult<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| BackendError::unavailable("Gemini API key not configured (GEMINI_API_KEY)"))?;

        info!("Using Gemini API key {}", mask_key(api_key));

        let mut backend = Self::new(api_key, config.timeout).with_base_url(config.endpoint_or_default());
        if let Some(model) = &config.model {
            backend = backend.with_model(model.clone());
        }
        if let Some(template) = &config.prompt_template {
            backend = backend.with_prompt_template(template.clone());
        }
        Ok(backend)
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    /// Build the translation prompt.
    fn build_prompt(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
        hints: &TranslationHints,
    ) -> String {
        let tone = hints.tone.as_deref().unwrap_or_default();
        let mut prompt = self
            .prompt_template
            .replace("{source_language}", source)
            .replace("{target_language}", target)
            .replace("{tone}", tone);

        if !tone.is_empty() && !self.prompt_template.contains("{tone}") {
            prompt.push_str(&format!(" Use a {} tone.", tone));
        }

        if texts.len() == 1 {
            format!("{}\n\nText to translate:\n{}", prompt, texts[0])
        } else {
            let numbered_texts: String = texts
                .iter()
                .enumerate()
                .map(|(i, t)| format!("{}. {}", i + 1, t.replace('\n', LINE_BREAK)))
                .collect::<Vec<_>>()
                .join("\n");

            format!(
                "{prompt}\n\nThe input has {count} numbered lines. Reply with exactly {count} lines, \
                 each starting with the same number followed by a period. Keep {br} markers where they appear.\n\n\
                 Texts to translate:\n{numbered_texts}",
                count = texts.len(),
                br = LINE_BREAK,
            )
        }
    }
}

/// Parse the model's free-text reply back into exactly `count` lines.
///
/// Numbering such as `3.`, `3)` or `[3]` is stripped. A short reply is
/// padded with the last parsed line (or an empty string when nothing
/// parsed); a long reply is truncated.
pub fn parse_numbered_reply(reply: &str, count: usize) -> Vec<String> {
    static NUMBERING: OnceLock<Regex> = OnceLock::new();
    let numbering = NUMBERING
        .get_or_init(|| Regex::new(r"^\s*(?:\[\d+\]|\d+[.)])\s*").expect("valid regex"));

    let mut results: Vec<String> = reply
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("```"))
        .map(|l| {
            numbering
                .replace(l, "")
                .replace(LINE_BREAK, "\n")
                .lines()
                .map(str::trim)
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect();

    if results.len() > count {
        warn!(
            "Model returned {} lines for {} segments, truncating",
            results.len(),
            count
        );
        results.truncate(count);
    } else if results.len() < count {
        warn!(
            "Model returned {} lines for {} segments, padding",
            results.len(),
            count
        );
        let filler = results.last().cloned().unwrap_or_default();
        results.resize(count, filler);
    }

    results
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize, Debug)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Deserialize, Debug)]
struct GeminiResponseContent {
    parts: Option<Vec<GeminiResponsePart>>,
}

#[derive(Deserialize, Debug)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    message: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
}

#[async_trait]
impl TranslationBackend for GeminiBackend {
    async fn translate_batch(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
        hints: &TranslationHints,
    ) -> BackendResult<Vec<String>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!("Translating {} text(s) to {}", texts.len(), target);

        let prompt = self.build_prompt(texts, source, target, hints);

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
        };

        let response = self
            .session
            .client()?
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let body = read_body(response, "Gemini").await?;

        let gemini_response: GeminiResponse = serde_json::from_str(&body).map_err(|e| {
            BackendError::protocol(format!("Failed to parse Gemini response: {}", e))
        })?;

        if let Some(error) = gemini_response.error {
            return Err(BackendError::protocol(format!(
                "Gemini error: {}",
                error.message
            )));
        }

        if let Some(usage) = &gemini_response.usage_metadata {
            let prompt_tokens = usage.prompt_token_count.unwrap_or(0);
            let candidate_tokens = usage.candidates_token_count.unwrap_or(0);
            let cost = estimate_cost(&self.model, prompt_tokens, candidate_tokens)
                .map(|cost| format!(" | Cost: ${:.6}", cost))
                .unwrap_or_default();
            info!(
                "Gemini token usage: {} (prompt) + {} (candidates) = {} total tokens{}",
                prompt_tokens,
                candidate_tokens,
                prompt_tokens + candidate_tokens,
                cost
            );
        }

        let translated_text = gemini_response
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content)
            .and_then(|c| c.parts)
            .and_then(|p| p.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| BackendError::protocol("Gemini response contained no text"))?;

        if texts.len() == 1 {
            Ok(vec![translated_text.trim().to_string()])
        } else {
            Ok(parse_numbered_reply(&translated_text, texts.len()))
        }
    }

    async fn close(&self) {
        self.session.close();
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Generative
    }

    fn name(&self) -> &'static str {
        "gemini"
    }

    fn dispatch_mode(&self) -> DispatchMode {
        DispatchMode::Concurrent
    }
}
