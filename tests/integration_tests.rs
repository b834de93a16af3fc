//! Integration tests for subtrans
//!
//! End-to-end document translation with in-process stub backends.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use subtrans::config::{BackendKind, TranslationConfig};
use subtrans::error::{BackendError, BackendErrorKind};
use subtrans::language::{LanguageCode, SourceLanguage};
use subtrans::pipeline::TranslationPipeline;
use subtrans::subtitle::{SubtitleBlock, SubtitleFile, SubtitleFormat, SubtitleTrack};
use subtrans::translate::{
    BackendRegistry, BackendResult, SegmentFailure, TranslationBackend, TranslationHints,
};
use tokio_test::{assert_err, assert_ok};

const HELLO_WORLD: &str =
    "1\n00:00:01,000 --> 00:00:02,000\nHello\n\n2\n00:00:03,000 --> 00:00:04,000\nWorld\n\n";

/// Looks every text up in a fixed dictionary.
struct DictionaryBackend {
    dictionary: HashMap<String, String>,
    fail_on: Option<String>,
    short_reply: bool,
    calls: AtomicUsize,
    languages: Mutex<Vec<(String, String)>>,
}

impl DictionaryBackend {
    fn new(pairs: &[(&str, &str)]) -> Self {
        Self {
            dictionary: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            fail_on: None,
            short_reply: false,
            calls: AtomicUsize::new(0),
            languages: Mutex::new(Vec::new()),
        }
    }

    fn french() -> Self {
        Self::new(&[("Hello", "Bonjour"), ("World", "Monde")])
    }

    fn failing_on(mut self, text: &str) -> Self {
        self.fail_on = Some(text.to_string());
        self
    }
}

#[async_trait]
impl TranslationBackend for DictionaryBackend {
    async fn translate_batch(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
        _hints: &TranslationHints,
    ) -> BackendResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.languages
            .lock()
            .unwrap()
            .push((source.to_string(), target.to_string()));

        if let Some(bad) = &self.fail_on {
            if texts.contains(bad) {
                return Err(BackendError::protocol("stub refused this chunk"));
            }
        }
        if self.short_reply {
            return Ok(vec!["?".to_string()]);
        }

        Ok(texts
            .iter()
            .map(|t| self.dictionary.get(t).cloned().unwrap_or_else(|| t.clone()))
            .collect())
    }

    async fn close(&self) {}

    fn kind(&self) -> BackendKind {
        BackendKind::LocalServer
    }

    fn name(&self) -> &'static str {
        "dictionary"
    }
}

fn french_config(batch_size: usize) -> TranslationConfig {
    TranslationConfig::new(BackendKind::LocalServer, LanguageCode::new("fra_Latn"))
        .with_source_language(SourceLanguage::Code(LanguageCode::new("eng_Latn")))
        .with_batch_size(batch_size)
        .with_retries(0, Duration::ZERO)
}

fn timed_indices(file: &SubtitleFile) -> Vec<String> {
    match file {
        SubtitleFile::Srt(doc) => doc
            .blocks()
            .iter()
            .filter_map(|b| match b {
                SubtitleBlock::Timed { index, .. } => Some(index.clone()),
                SubtitleBlock::Opaque { .. } => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

// ============================================================================
// Pipeline Scenarios
// ============================================================================

mod pipeline_tests {
    use super::*;

    #[tokio::test]
    async fn test_translates_whole_document() {
        let pipeline = TranslationPipeline::with_backend(
            french_config(2),
            Arc::new(DictionaryBackend::french()),
        );

        let result = assert_ok!(
            pipeline
                .translate_file(HELLO_WORLD.as_bytes(), SubtitleFormat::Srt)
                .await
        );

        assert_eq!(
            result.output(),
            "1\n00:00:01,000 --> 00:00:02,000\nBonjour\n\n2\n00:00:03,000 --> 00:00:04,000\nMonde\n\n"
        );
        assert_eq!(result.report.total_segments, 2);
        assert_eq!(result.report.translated, 2);
        assert!(result.report.is_complete());
        assert_eq!(result.report.stats.total_chunks, 1);
    }

    #[tokio::test]
    async fn test_failed_chunk_keeps_original_text() {
        let pipeline = TranslationPipeline::with_backend(
            french_config(1),
            Arc::new(DictionaryBackend::french().failing_on("World")),
        );

        let result = assert_ok!(
            pipeline
                .translate_file(HELLO_WORLD.as_bytes(), SubtitleFormat::Srt)
                .await
        );

        let segments: Vec<String> = result
            .translated
            .segments()
            .into_iter()
            .map(|s| s.text)
            .collect();
        assert_eq!(segments, vec!["Bonjour", "World"]);

        assert_eq!(result.report.failures.len(), 1);
        let failure = &result.report.failures[0];
        assert_eq!(failure.position, 1);
        assert_eq!(failure.label, "2");
        assert!(matches!(
            failure.reason,
            SegmentFailure::Backend { chunk: 1, .. }
        ));
        assert_eq!(result.report.unchanged, 1);
    }

    #[tokio::test]
    async fn test_short_reply_is_shape_mismatch() {
        let backend = DictionaryBackend {
            short_reply: true,
            ..DictionaryBackend::french()
        };
        let pipeline = TranslationPipeline::with_backend(french_config(2), Arc::new(backend));

        let result = assert_ok!(
            pipeline
                .translate_file(HELLO_WORLD.as_bytes(), SubtitleFormat::Srt)
                .await
        );

        assert_eq!(result.report.failures.len(), 2);
        for failure in &result.report.failures {
            match &failure.reason {
                SegmentFailure::Backend { error, .. } => {
                    assert_eq!(error.kind, BackendErrorKind::ShapeMismatch)
                }
                other => panic!("unexpected failure: {:?}", other),
            }
        }
        assert_eq!(result.output(), HELLO_WORLD);
    }

    #[tokio::test]
    async fn test_translating_twice_keeps_structure() {
        let pipeline = TranslationPipeline::with_backend(
            french_config(5),
            Arc::new(DictionaryBackend::new(&[("Hello", "Bonjour"), ("Bonjour", "Salut")])),
        );

        let first = assert_ok!(
            pipeline
                .translate_file(HELLO_WORLD.as_bytes(), SubtitleFormat::Srt)
                .await
        );
        let second = assert_ok!(pipeline.translate_document(first.translated.clone()).await);

        assert_eq!(timed_indices(&first.original), vec!["1", "2"]);
        assert_eq!(timed_indices(&second.translated), vec!["1", "2"]);
        assert_eq!(
            first.translated.segments().len(),
            second.translated.segments().len()
        );
        assert_eq!(second.translated.segments()[0].text, "Salut");
    }

    #[tokio::test]
    async fn test_auto_detection_falls_back_to_default() {
        let backend = Arc::new(DictionaryBackend::new(&[]));
        let config = french_config(5)
            .with_source_language(SourceLanguage::Auto)
            .with_default_language(LanguageCode::new("eng_Latn"));
        let pipeline = TranslationPipeline::with_backend(config, backend.clone());

        let greek = "1\n00:00:01,000 --> 00:00:02,000\nΚαλημέρα σας, τι κάνετε σήμερα το πρωί;\n\n\
                     2\n00:00:03,000 --> 00:00:04,000\nΕίμαι πολύ καλά, ευχαριστώ πολύ φίλε μου.\n\n";
        let result = assert_ok!(
            pipeline
                .translate_file(greek.as_bytes(), SubtitleFormat::Srt)
                .await
        );

        let detection = result.report.detection.expect("detection ran");
        assert!(detection.fallback);
        assert_eq!(result.report.source_language.as_str(), "eng_Latn");
        assert_eq!(
            backend.languages.lock().unwrap()[0],
            ("eng_Latn".to_string(), "fra_Latn".to_string())
        );
    }

    #[tokio::test]
    async fn test_auto_detection_recognises_english() {
        let backend = Arc::new(DictionaryBackend::new(&[]));
        let config = french_config(5)
            .with_source_language(SourceLanguage::Auto)
            .with_default_language(LanguageCode::new("nld_Latn"));
        let pipeline = TranslationPipeline::with_backend(config, backend);

        let english = "1\n00:00:01,000 --> 00:00:02,000\nI think we should leave before the storm arrives tonight.\n\n\
                       2\n00:00:03,000 --> 00:00:04,000\n<i>Nobody is going anywhere until the captain says so.</i>\n\n";
        let result = assert_ok!(
            pipeline
                .translate_file(english.as_bytes(), SubtitleFormat::Srt)
                .await
        );

        let detection = result.report.detection.expect("detection ran");
        assert!(!detection.fallback);
        assert_eq!(detection.code.as_str(), "eng_Latn");
    }

    #[tokio::test]
    async fn test_degraded_input_is_reported_and_kept() {
        let pipeline = TranslationPipeline::with_backend(
            french_config(5),
            Arc::new(DictionaryBackend::french()),
        );

        let raw = "1\n00:00:01,000 --> 00:00:02,000\nHello\n\n2\n00:00:03,000 --> 00:00:04,000\n";
        let result = assert_ok!(
            pipeline
                .translate_file(raw.as_bytes(), SubtitleFormat::Srt)
                .await
        );

        assert!(result.report.parse_degraded);
        assert_eq!(result.report.total_segments, 1);
        assert!(result.output().starts_with("1\n00:00:01,000 --> 00:00:02,000\nBonjour\n\n"));
        assert!(result.output().contains("00:00:03,000 --> 00:00:04,000"));
    }

    #[tokio::test]
    async fn test_vtt_document() {
        let pipeline = TranslationPipeline::with_backend(
            french_config(5),
            Arc::new(DictionaryBackend::french()),
        );

        let vtt = "WEBVTT\n\nNOTE kept as is\n\nintro\n00:00:01.000 --> 00:00:02.000 align:start\nHello\n\n00:00:03.000 --> 00:00:04.000\nWorld\n";
        let result = assert_ok!(
            pipeline
                .translate_file(vtt.as_bytes(), SubtitleFormat::Vtt)
                .await
        );

        assert_eq!(
            result.output(),
            "WEBVTT\n\nNOTE kept as is\n\nintro\n00:00:01.000 --> 00:00:02.000 align:start\nBonjour\n\n00:00:03.000 --> 00:00:04.000\nMonde\n"
        );
    }

    #[tokio::test]
    async fn test_ass_document() {
        let pipeline = TranslationPipeline::with_backend(
            french_config(5),
            Arc::new(DictionaryBackend::french()),
        );

        let ass = "[Script Info]\nScriptType: v4.00+\n\n[Events]\n\
                   Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n\
                   Dialogue: 0,0:00:01.00,0:00:02.00,Default,,0,0,0,,{\\an8}Hello\n\
                   Comment: 0,0:00:02.00,0:00:03.00,Default,,0,0,0,,Hello\n\
                   Dialogue: 0,0:00:03.00,0:00:04.00,Default,,0,0,0,,World\n";
        let result = assert_ok!(
            pipeline
                .translate_file(ass.as_bytes(), SubtitleFormat::Ass)
                .await
        );

        assert_eq!(result.report.total_segments, 2);
        assert_eq!(
            result.output(),
            "[Script Info]\nScriptType: v4.00+\n\n[Events]\n\
             Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n\
             Dialogue: 0,0:00:01.00,0:00:02.00,Default,,0,0,0,,{\\an8}Bonjour\n\
             Comment: 0,0:00:02.00,0:00:03.00,Default,,0,0,0,,Hello\n\
             Dialogue: 0,0:00:03.00,0:00:04.00,Default,,0,0,0,,Monde\n"
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let backend = Arc::new(DictionaryBackend::french());
        let pipeline = TranslationPipeline::with_backend(french_config(1), backend.clone());
        pipeline.cancel_handle().store(true, Ordering::SeqCst);

        let result = assert_ok!(
            pipeline
                .translate_file(HELLO_WORLD.as_bytes(), SubtitleFormat::Srt)
                .await
        );

        assert!(result.report.cancelled);
        assert_eq!(result.report.failures.len(), 2);
        assert_eq!(result.output(), HELLO_WORLD);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_server_going_away_keeps_earlier_chunks() {
        struct FlakyServer {
            inner: DictionaryBackend,
        }

        #[async_trait]
        impl TranslationBackend for FlakyServer {
            async fn translate_batch(
                &self,
                texts: &[String],
                source: &str,
                target: &str,
                hints: &TranslationHints,
            ) -> BackendResult<Vec<String>> {
                if texts.iter().any(|t| t == "World") {
                    return Err(BackendError::unavailable(
                        "connection failed: connection refused",
                    ));
                }
                self.inner.translate_batch(texts, source, target, hints).await
            }

            async fn close(&self) {}

            fn kind(&self) -> BackendKind {
                BackendKind::LocalServer
            }

            fn name(&self) -> &'static str {
                "flaky"
            }
        }

        let pipeline = TranslationPipeline::with_backend(
            french_config(1),
            Arc::new(FlakyServer {
                inner: DictionaryBackend::french(),
            }),
        );

        let result = assert_ok!(
            pipeline
                .translate_file(HELLO_WORLD.as_bytes(), SubtitleFormat::Srt)
                .await
        );

        assert_eq!(
            result.output(),
            "1\n00:00:01,000 --> 00:00:02,000\nBonjour\n\n2\n00:00:03,000 --> 00:00:04,000\nWorld\n\n"
        );
        assert_eq!(result.report.translated, 1);
        assert_eq!(result.report.failures.len(), 1);
        match &result.report.failures[0].reason {
            SegmentFailure::Backend { error, .. } => {
                assert_eq!(error.kind, BackendErrorKind::Unavailable)
            }
            other => panic!("unexpected failure: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unavailable_backend_fails_the_file() {
        struct OfflineBackend;

        #[async_trait]
        impl TranslationBackend for OfflineBackend {
            async fn translate_batch(
                &self,
                _texts: &[String],
                _source: &str,
                _target: &str,
                _hints: &TranslationHints,
            ) -> BackendResult<Vec<String>> {
                Err(BackendError::unavailable("connection refused"))
            }

            async fn close(&self) {}

            fn kind(&self) -> BackendKind {
                BackendKind::LocalServer
            }

            fn name(&self) -> &'static str {
                "offline"
            }
        }

        let pipeline = TranslationPipeline::with_backend(french_config(1), Arc::new(OfflineBackend));
        assert_err!(
            pipeline
                .translate_file(HELLO_WORLD.as_bytes(), SubtitleFormat::Srt)
                .await
        );
    }
}

// ============================================================================
// Registry Tests
// ============================================================================

mod registry_tests {
    use super::*;

    #[tokio::test]
    async fn test_pipeline_from_registered_plugin() {
        let mut registry = BackendRegistry::default();
        registry.register(
            "dictionary",
            Arc::new(|_: &TranslationConfig| {
                Ok::<_, BackendError>(
                    Arc::new(DictionaryBackend::french()) as Arc<dyn TranslationBackend>
                )
            }),
        );

        let pipeline = assert_ok!(TranslationPipeline::from_registry(
            french_config(2),
            &registry,
            "dictionary"
        ));
        let result = assert_ok!(
            pipeline
                .translate_file(HELLO_WORLD.as_bytes(), SubtitleFormat::Srt)
                .await
        );
        pipeline.close().await;

        assert!(result.output().contains("Monde"));
    }

    #[test]
    fn test_unknown_backend_key() {
        let registry = BackendRegistry::default();
        assert!(TranslationPipeline::from_registry(french_config(2), &registry, "nope").is_err());
    }
}
