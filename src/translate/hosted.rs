//! Hosted inference API (Hugging Face style) with bearer-token auth.

use crate::config::{BackendKind, TranslationConfig};
use crate::error::BackendError;
use crate::translate::response::normalize_hosted;
use crate::translate::session::{read_body, HttpSession};
use crate::translate::{ensure_aligned, BackendResult, TranslationBackend, TranslationHints};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_MODEL: &str = "facebook/nllb-200-distilled-600M";

pub struct HostedInferenceBackend {
    session: HttpSession,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct HostedRequest<'a> {
    inputs: &'a [String],
    parameters: HostedParameters<'a>,
    options: HostedOptions,
}

#[derive(Serialize)]
struct HostedParameters<'a> {
    src_lang: &'a str,
    tgt_lang: &'a str,
}

#[derive(Serialize)]
struct HostedOptions {
    use_cache: bool,
    wait_for_model: bool,
}

impl HostedInferenceBackend {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            session: HttpSession::new(timeout),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn from_config(config: &TranslationConfig) -> BackendResult<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                BackendError::unavailable("Hosted inference API token not configured (HF_API_TOKEN)")
            })?;

        let mut backend = Self::new(config.endpoint_or_default(), api_key, config.timeout);
        if let Some(model) = &config.model {
            backend = backend.with_model(model.clone());
        }
        Ok(backend)
    }

    pub fn model_url(&self) -> String {
        format!("{}/models/{}", self.base_url.trim_end_matches('/'), self.model)
    }
}

#[async_trait]
impl TranslationBackend for HostedInferenceBackend {
    async fn translate_batch(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
        _hints: &TranslationHints,
    ) -> BackendResult<Vec<String>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let url = self.model_url();
        debug!("Requesting {} translation(s) from {}", texts.len(), url);

        let request = HostedRequest {
            inputs: texts,
            parameters: HostedParameters {
                src_lang: source,
                tgt_lang: target,
            },
            options: HostedOptions {
                use_cache: true,
                wait_for_model: true,
            },
        };

        let response = self
            .session
            .client()?
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let body = read_body(response, "Hosted inference").await?;
        let translations = normalize_hosted(&body)?;
        ensure_aligned(texts.len(), translations.len())?;
        Ok(translations)
    }

    async fn close(&self) {
        self.session.close();
    }

    fn kind(&self) -> BackendKind {
        BackendKind::HostedInference
    }

    fn name(&self) -> &'static str {
        "Hosted inference"
    }
}
