use crate::config::TranslationConfig;
use crate::error::{BackendError, BackendErrorKind};
use crate::translate::{ensure_aligned, DispatchMode, TranslationBackend, TranslationHints};
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Why a segment kept its original text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SegmentFailure {
    #[error("chunk {chunk} failed: {error}")]
    Backend { chunk: usize, error: BackendError },

    #[error("chunk {chunk} was cancelled")]
    Cancelled { chunk: usize },
}

impl SegmentFailure {
    pub fn chunk(&self) -> usize {
        match self {
            SegmentFailure::Backend { chunk, .. } | SegmentFailure::Cancelled { chunk } => *chunk,
        }
    }
}

/// Statistics from one dispatch.
#[derive(Debug, Clone, Default)]
pub struct DispatchStats {
    pub total_chunks: usize,
    pub successful_chunks: usize,
    pub failed_chunks: usize,
    pub cancelled_chunks: usize,
    pub retries: u32,
    pub total_time: Duration,
}

/// One result per input segment, in input order.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub results: Vec<Result<String, SegmentFailure>>,
    pub stats: DispatchStats,
    pub cancelled: bool,
}

impl BatchOutcome {
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.results.len() - self.success_count()
    }
}

/// Result of processing a single chunk.
struct ChunkResult {
    index: usize,
    outcome: ChunkOutcome,
    retries: u32,
}

enum ChunkOutcome {
    Translated(Vec<String>),
    Failed(BackendError),
    Cancelled,
}

impl ChunkResult {
    fn is_translated(&self) -> bool {
        matches!(self.outcome, ChunkOutcome::Translated(_))
    }

    fn is_unavailable(&self) -> bool {
        matches!(&self.outcome, ChunkOutcome::Failed(e) if e.kind == BackendErrorKind::Unavailable)
    }
}

/// Splits segments into chunks and sends them to a backend.
pub struct BatchOrchestrator {
    backend: Arc<dyn TranslationBackend>,
    call_timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
    hints: TranslationHints,
    show_progress: bool,
    cancel: Option<Arc<AtomicBool>>,
    concurrency_limit: Option<usize>,
}

impl BatchOrchestrator {
    pub fn new(backend: Arc<dyn TranslationBackend>) -> Self {
        Self {
            backend,
            call_timeout: Duration::from_secs(300),
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
            hints: TranslationHints::default(),
            show_progress: true,
            cancel: None,
            concurrency_limit: None,
        }
    }

    pub fn from_config(backend: Arc<dyn TranslationBackend>, config: &TranslationConfig) -> Self {
        Self::new(backend)
            .with_timeout(config.timeout)
            .with_retries(config.max_retries, config.retry_delay)
            .with_hints(TranslationHints {
                tone: config.tone.clone(),
            })
    }

    /// Upper bound for a single backend call, retries excluded.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_hints(mut self, hints: TranslationHints) -> Self {
        self.hints = hints;
        self
    }

    /// Enable or disable progress bar display.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Chunks not yet started when the flag is set are marked cancelled.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Cap on in-flight chunks for backends that dispatch concurrently.
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = Some(limit.max(1));
        self
    }

    /// Translate `segments` in chunks of `batch_size`.
    ///
    /// Chunk-level failures are recorded per segment and never abort the
    /// run. Only an unavailable backend returns `Err`.
    pub async fn translate_segments(
        &self,
        segments: &[String],
        source: &str,
        target: &str,
        batch_size: usize,
    ) -> Result<BatchOutcome, BackendError> {
        if segments.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let chunks: Vec<&[String]> = segments.chunks(batch_size.max(1)).collect();
        let total_chunks = chunks.len();
        let start_time = Instant::now();
        let mode = self.backend.dispatch_mode();

        info!(
            "Translating {} segments in {} chunks ({:?}) using {}",
            segments.len(),
            total_chunks,
            mode,
            self.backend.name()
        );

        let progress_bar = if self.show_progress {
            let pb = ProgressBar::new(total_chunks as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let results = match mode {
            DispatchMode::Sequential => {
                let mut results: Vec<ChunkResult> = Vec::with_capacity(total_chunks);
                let mut outage: Option<BackendError> = None;
                for (index, chunk) in chunks.iter().enumerate() {
                    let result = match &outage {
                        Some(e) => ChunkResult {
                            index,
                            outcome: ChunkOutcome::Failed(e.clone()),
                            retries: 0,
                        },
                        None => self.run_chunk(index, chunk, source, target).await,
                    };
                    if let Some(ref pb) = progress_bar {
                        pb.inc(1);
                    }
                    if outage.is_none() {
                        if let ChunkOutcome::Failed(ref e) = result.outcome {
                            if e.kind == BackendErrorKind::Unavailable {
                                if !results.iter().any(ChunkResult::is_translated) {
                                    abandon(progress_bar);
                                    return Err(e.clone());
                                }
                                warn!(
                                    "Backend became unavailable at chunk {}, keeping {} completed chunks",
                                    index,
                                    results.len()
                                );
                                outage = Some(e.clone());
                            }
                        }
                    }
                    results.push(result);
                }
                results
            }
            DispatchMode::Concurrent => {
                let limit = self.concurrency_limit.unwrap_or(total_chunks);
                let semaphore = Semaphore::new(limit);
                let backend_down = AtomicBool::new(false);
                let mut futures = FuturesUnordered::new();

                for (index, chunk) in chunks.iter().enumerate() {
                    let sem = &semaphore;
                    let down = &backend_down;
                    futures.push(async move {
                        // Semaphore is never closed.
                        let _permit = sem.acquire().await.ok();
                        if down.load(Ordering::SeqCst) {
                            return ChunkResult {
                                index,
                                outcome: ChunkOutcome::Failed(BackendError::unavailable(
                                    "not sent, backend became unavailable",
                                )),
                                retries: 0,
                            };
                        }
                        let result = self.run_chunk(index, chunk, source, target).await;
                        if result.is_unavailable() {
                            down.store(true, Ordering::SeqCst);
                        }
                        result
                    });
                }

                let mut results = Vec::with_capacity(total_chunks);
                let mut outage: Option<BackendError> = None;
                while let Some(result) = futures.next().await {
                    if let Some(ref pb) = progress_bar {
                        pb.inc(1);
                    }
                    if let ChunkOutcome::Failed(ref e) = result.outcome {
                        if e.kind == BackendErrorKind::Unavailable && outage.is_none() {
                            outage = Some(e.clone());
                        }
                    }
                    results.push(result);
                }

                if let Some(e) = outage {
                    if !results.iter().any(ChunkResult::is_translated) {
                        abandon(progress_bar);
                        return Err(e);
                    }
                    warn!("Backend became unavailable, keeping completed chunks");
                }

                // Sort results by chunk index to maintain order
                results.sort_by_key(|r| r.index);
                results
            }
        };

        if let Some(pb) = progress_bar {
            pb.finish_with_message("Translation complete");
        }

        let mut stats = DispatchStats {
            total_chunks,
            ..Default::default()
        };
        let mut segment_results = Vec::with_capacity(segments.len());

        for result in results {
            stats.retries += result.retries;
            let size = chunks[result.index].len();
            match result.outcome {
                ChunkOutcome::Translated(texts) => {
                    stats.successful_chunks += 1;
                    segment_results.extend(texts.into_iter().map(Ok));
                }
                ChunkOutcome::Failed(error) => {
                    stats.failed_chunks += 1;
                    let failure = SegmentFailure::Backend {
                        chunk: result.index,
                        error,
                    };
                    segment_results.extend(std::iter::repeat(Err(failure)).take(size));
                }
                ChunkOutcome::Cancelled => {
                    stats.cancelled_chunks += 1;
                    let failure = SegmentFailure::Cancelled {
                        chunk: result.index,
                    };
                    segment_results.extend(std::iter::repeat(Err(failure)).take(size));
                }
            }
        }

        stats.total_time = start_time.elapsed();

        info!(
            "Dispatch complete: {}/{} chunks successful, {} failed, {} cancelled in {:.2}s",
            stats.successful_chunks,
            total_chunks,
            stats.failed_chunks,
            stats.cancelled_chunks,
            stats.total_time.as_secs_f64()
        );

        Ok(BatchOutcome {
            results: segment_results,
            cancelled: stats.cancelled_chunks > 0,
            stats,
        })
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    async fn run_chunk(
        &self,
        index: usize,
        texts: &[String],
        source: &str,
        target: &str,
    ) -> ChunkResult {
        let mut retries = 0;

        loop {
            if self.is_cancelled() {
                debug!("Chunk {} skipped after cancellation", index);
                return ChunkResult {
                    index,
                    outcome: ChunkOutcome::Cancelled,
                    retries,
                };
            }

            let chunk_start = Instant::now();
            debug!("Starting chunk {} ({} segments)", index, texts.len());

            let call = self
                .backend
                .translate_batch(texts, source, target, &self.hints);
            let result = match tokio::time::timeout(self.call_timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(BackendError::timeout(format!(
                    "no response within {:.1}s",
                    self.call_timeout.as_secs_f64()
                ))),
            }
            .and_then(|translations| {
                ensure_aligned(texts.len(), translations.len())?;
                Ok(translations)
            });

            match result {
                Ok(translations) => {
                    debug!(
                        "Chunk {} completed in {}ms",
                        index,
                        chunk_start.elapsed().as_millis()
                    );
                    return ChunkResult {
                        index,
                        outcome: ChunkOutcome::Translated(translations),
                        retries,
                    };
                }
                Err(e) if e.kind.is_retryable() && retries < self.max_retries => {
                    retries += 1;
                    warn!(
                        "Chunk {} failed ({}), retry {}/{} in {:.1}s",
                        index,
                        e,
                        retries,
                        self.max_retries,
                        self.retry_delay.as_secs_f64()
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    warn!("Chunk {} failed: {}", index, e);
                    return ChunkResult {
                        index,
                        outcome: ChunkOutcome::Failed(e),
                        retries,
                    };
                }
            }
        }
    }
}

fn abandon(progress_bar: Option<ProgressBar>) {
    if let Some(pb) = progress_bar {
        pb.abandon_with_message("Backend unavailable");
    }
}
