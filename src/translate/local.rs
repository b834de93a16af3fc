//! Self-hosted NLLB-style translation server.

use crate::config::{BackendKind, TranslationConfig};
use crate::translate::response::normalize_local;
use crate::translate::session::{read_body, HttpSession};
use crate::translate::{ensure_aligned, BackendResult, TranslationBackend, TranslationHints};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Posts JSON batches to a translation server on the local network.
pub struct LocalServerBackend {
    session: HttpSession,
    endpoint: String,
}

#[derive(Serialize)]
struct LocalServerRequest<'a> {
    source: &'a [String],
    src_lang: &'a str,
    tgt_lang: &'a str,
}

impl LocalServerBackend {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            session: HttpSession::new(timeout),
            endpoint: endpoint.into(),
        }
    }

    pub fn from_config(config: &TranslationConfig) -> BackendResult<Self> {
        Ok(Self::new(config.endpoint_or_default(), config.timeout))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn session(&self) -> &HttpSession {
        &self.session
    }
}

#[async_trait]
impl TranslationBackend for LocalServerBackend {
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

        debug!(
            "Posting {} segment(s) {} -> {} to {}",
            texts.len(),
            source,
            target,
            self.endpoint
        );

        let request = LocalServerRequest {
            source: texts,
            src_lang: source,
            tgt_lang: target,
        };

        let response = self
            .session
            .client()?
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?;

        let body = read_body(response, "Local server").await?;
        let translations = normalize_local(&body)?;
        ensure_aligned(texts.len(), translations.len())?;
        Ok(translations)
    }

    async fn close(&self) {
        self.session.close();
    }

    fn kind(&self) -> BackendKind {
        BackendKind::LocalServer
    }

    fn name(&self) -> &'static str {
        "Local NLLB server"
    }
}
