//! Commercial machine translation API (DeepL v2).

use crate::config::{BackendKind, TranslationConfig};
use crate::error::BackendError;
use crate::translate::response::normalize_deepl;
use crate::translate::session::{read_body, HttpSession};
use crate::translate::{ensure_aligned, BackendResult, TranslationBackend, TranslationHints};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

pub struct DeepLBackend {
    session: HttpSession,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct DeepLRequest<'a> {
    text: &'a [String],
    target_lang: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_lang: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    formality: Option<&'a str>,
}

impl DeepLBackend {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            session: HttpSession::new(timeout),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &TranslationConfig) -> BackendResult<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| BackendError::unavailable("DeepL API key not configured (DEEPL_API_KEY)"))?;
        Ok(Self::new(config.endpoint_or_default(), api_key, config.timeout))
    }

    fn url(&self) -> String {
        format!("{}/v2/translate", self.base_url.trim_end_matches('/'))
    }
}

/// DeepL only understands "more"/"less" formality.
fn formality(tone: Option<&str>) -> Option<&'static str> {
    match tone?.to_lowercase().as_str() {
        "formal" | "polite" => Some("prefer_more"),
        "casual" | "informal" => Some("prefer_less"),
        _ => None,
    }
}

#[async_trait]
impl TranslationBackend for DeepLBackend {
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

        debug!("Sending {} text(s) to DeepL ({} -> {})", texts.len(), source, target);

        let request = DeepLRequest {
            text: texts,
            target_lang: target,
            source_lang: (!source.is_empty()).then_some(source),
            formality: formality(hints.tone.as_deref()),
        };

        let response = self
            .session
            .client()?
            .post(self.url())
            .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let body = read_body(response, "DeepL").await?;
        let translations = normalize_deepl(&body)?;
        ensure_aligned(texts.len(), translations.len())?;
        Ok(translations)
    }

    async fn close(&self) {
        self.session.close();
    }

    fn kind(&self) -> BackendKind {
        BackendKind::CommercialMt
    }

    fn name(&self) -> &'static str {
        "DeepL"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::LanguageCode;

    #[test]
    fn test_formality_mapping() {
        assert_eq!(formality(Some("Formal")), Some("prefer_more"));
        assert_eq!(formality(Some("casual")), Some("prefer_less"));
        assert_eq!(formality(Some("pirate")), None);
        assert_eq!(formality(None), None);
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let config = TranslationConfig::new(BackendKind::CommercialMt, LanguageCode::new("deu_Latn"));
        assert!(DeepLBackend::from_config(&config).is_err());
    }

    #[test]
    fn test_url() {
        let config = TranslationConfig::new(BackendKind::CommercialMt, LanguageCode::new("deu_Latn"))
            .with_api_key("key:fx");
        let backend = DeepLBackend::from_config(&config).unwrap();
        assert_eq!(backend.url(), "https://api-free.deepl.com/v2/translate");
    }
}
