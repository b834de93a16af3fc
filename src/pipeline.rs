use crate::config::TranslationConfig;
use crate::error::Result;
use crate::language::{Detection, LanguageCode, LanguageResolver, SourceLanguage};
use crate::subtitle::{SubtitleFile, SubtitleFormat, SubtitleTrack};
use crate::translate::{
    BackendRegistry, BatchOrchestrator, DispatchStats, SegmentFailure, TranslationBackend,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A segment that kept its original text.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedSegment {
    /// Index into the document's segment list.
    pub segment: usize,
    /// Block position inside the document.
    pub position: usize,
    /// SRT index or VTT cue identifier.
    pub label: String,
    pub reason: SegmentFailure,
}

/// What happened while translating one document.
#[derive(Debug, Clone)]
pub struct TranslationReport {
    pub source_language: LanguageCode,
    pub target_language: LanguageCode,
    /// Present when the source language was detected rather than given.
    pub detection: Option<Detection>,
    pub total_segments: usize,
    pub translated: usize,
    pub unchanged: usize,
    pub failures: Vec<FailedSegment>,
    pub cancelled: bool,
    /// The parser recovered from malformed input.
    pub parse_degraded: bool,
    pub stats: DispatchStats,
}

impl TranslationReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

/// Result of translating one document.
#[derive(Debug, Clone)]
pub struct TranslatedDocument {
    pub original: SubtitleFile,
    pub translated: SubtitleFile,
    pub report: TranslationReport,
}

impl TranslatedDocument {
    /// Serialized translated document.
    pub fn output(&self) -> String {
        self.translated.serialize()
    }
}

/// Parse, translate and reassemble subtitle documents. Performs no
/// filesystem access; the owner calls [`TranslationPipeline::close`] when
/// done.
pub struct TranslationPipeline {
    config: TranslationConfig,
    backend: Arc<dyn TranslationBackend>,
    resolver: LanguageResolver,
    show_progress: bool,
    cancel: Arc<AtomicBool>,
    concurrency_limit: Option<usize>,
}

impl TranslationPipeline {
    /// Build a pipeline for `config.backend` from the default registry.
    pub fn new(config: TranslationConfig) -> Result<Self> {
        let key = config.backend.key();
        Self::from_registry(config, &BackendRegistry::default(), key)
    }

    /// Build a pipeline for the backend registered under `key`.
    pub fn from_registry(
        config: TranslationConfig,
        registry: &BackendRegistry,
        key: &str,
    ) -> Result<Self> {
        config.validate()?;
        let backend = registry.create(key, &config)?;
        Ok(Self::with_backend(config, backend))
    }

    pub fn with_backend(config: TranslationConfig, backend: Arc<dyn TranslationBackend>) -> Self {
        info!(
            "Using {} backend, target {}",
            backend.name(),
            config.target_language
        );
        Self {
            resolver: LanguageResolver::new(config.default_language.clone()),
            config,
            backend,
            show_progress: false,
            cancel: Arc::new(AtomicBool::new(false)),
            concurrency_limit: None,
        }
    }

    /// Enable or disable progress bar display.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Share an externally owned cancellation flag.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = Some(limit);
        self
    }

    /// Setting the returned flag abandons chunks not yet dispatched.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub fn backend(&self) -> &Arc<dyn TranslationBackend> {
        &self.backend
    }

    /// Translate raw subtitle bytes.
    pub async fn translate_file(
        &self,
        bytes: &[u8],
        format: SubtitleFormat,
    ) -> Result<TranslatedDocument> {
        let document = SubtitleFile::from_bytes(format, bytes);
        self.translate_document(document).await
    }

    /// Translate an already parsed document.
    pub async fn translate_document(&self, document: SubtitleFile) -> Result<TranslatedDocument> {
        let parse_degraded = document.is_degraded();
        if parse_degraded {
            warn!("Subtitle input was malformed, some blocks are kept verbatim");
        }

        let segments = document.segments();
        let texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
        debug!("Extracted {} segments", segments.len());

        let (source_language, detection) = match &self.config.source_language {
            SourceLanguage::Code(code) => (code.clone(), None),
            SourceLanguage::Auto if texts.is_empty() => (self.resolver.default_code().clone(), None),
            SourceLanguage::Auto => {
                let detection = self.resolver.detect(&texts.join("\n"));
                info!(
                    "Detected source language: {}{}",
                    detection.code,
                    if detection.fallback { " (fallback)" } else { "" }
                );
                (detection.code.clone(), Some(detection))
            }
        };
        let target_language = self.config.target_language.clone();

        let kind = self.backend.kind();
        let source = LanguageResolver::normalize(&source_language, kind);
        let target = LanguageResolver::normalize(&target_language, kind);

        let mut orchestrator = BatchOrchestrator::from_config(self.backend.clone(), &self.config)
            .with_progress(self.show_progress)
            .with_cancellation(self.cancel.clone());
        if let Some(limit) = self.concurrency_limit {
            orchestrator = orchestrator.with_concurrency_limit(limit);
        }

        let outcome = orchestrator
            .translate_segments(&texts, &source, &target, self.config.batch_size)
            .await?;

        let mut translated = document.clone();
        let mut failures = Vec::new();
        let mut replaced = 0;

        for (i, (segment, result)) in segments.iter().zip(outcome.results).enumerate() {
            match result {
                Ok(text) => {
                    translated.set_segment_text(segment.position, &text);
                    replaced += 1;
                }
                Err(reason) => failures.push(FailedSegment {
                    segment: i,
                    position: segment.position,
                    label: segment.label.clone(),
                    reason,
                }),
            }
        }

        if !failures.is_empty() {
            warn!(
                "{} of {} segments left untranslated",
                failures.len(),
                segments.len()
            );
        }

        let report = TranslationReport {
            source_language,
            target_language,
            detection,
            total_segments: segments.len(),
            translated: replaced,
            unchanged: failures.len(),
            failures,
            cancelled: outcome.cancelled,
            parse_degraded,
            stats: outcome.stats,
        };

        Ok(TranslatedDocument {
            original: document,
            translated,
            report,
        })
    }

    /// Release the backend's connection resources.
    pub async fn close(&self) {
        debug!("Closing {} backend", self.backend.name());
        self.backend.close().await;
    }
}

/// Outcome of one input file in a CLI run.
#[derive(Debug)]
pub enum FileStatus {
    Translated(TranslationReport),
    Skipped(String),
    Failed(String),
}

#[derive(Debug)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub status: FileStatus,
}

/// Print a summary of a batch of files.
pub fn print_summary(reports: &[FileReport], elapsed: Duration) {
    let mut translated_files = 0;
    let mut skipped_files = 0;
    let mut failed_files = 0;
    let mut translated_lines = 0;
    let mut unchanged_lines = 0;

    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                    Subtitle Translation Complete               ");
    println!("═══════════════════════════════════════════════════════════════");
    println!();

    for report in reports {
        match &report.status {
            FileStatus::Translated(r) => {
                translated_files += 1;
                translated_lines += r.translated;
                unchanged_lines += r.unchanged;
                let output = report
                    .output
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                println!(
                    "  ✓ {} -> {} ({}/{} lines, {} -> {})",
                    report.input.display(),
                    output,
                    r.translated,
                    r.total_segments,
                    r.source_language,
                    r.target_language
                );
                if r.unchanged > 0 {
                    println!("      {} lines left unchanged", r.unchanged);
                }
                if r.cancelled {
                    println!("      cancelled before completion");
                }
            }
            FileStatus::Skipped(reason) => {
                skipped_files += 1;
                println!("  - {} skipped: {}", report.input.display(), reason);
            }
            FileStatus::Failed(reason) => {
                failed_files += 1;
                println!("  ✗ {} failed: {}", report.input.display(), reason);
            }
        }
    }

    println!();
    println!(
        "  Files:      {} translated, {} skipped, {} failed",
        translated_files, skipped_files, failed_files
    );
    println!(
        "  Lines:      {} translated, {} unchanged",
        translated_lines, unchanged_lines
    );
    println!("  Total:      {:.2}s", elapsed.as_secs_f64());
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}
