pub mod deepl;
pub mod gemini;
pub mod hosted;
pub mod local;
pub mod orchestrator;
pub mod registry;
pub mod response;
pub mod session;

pub use deepl::DeepLBackend;
pub use gemini::GeminiBackend;
pub use hosted::HostedInferenceBackend;
pub use local::LocalServerBackend;
pub use orchestrator::{BatchOrchestrator, BatchOutcome, DispatchStats, SegmentFailure};
pub use registry::{BackendFactory, BackendRegistry};
pub use session::HttpSession;

use crate::config::BackendKind;
use crate::error::BackendError;
use async_trait::async_trait;

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Optional steering passed along with every batch.
#[derive(Debug, Clone, Default)]
pub struct TranslationHints {
    /// Desired register, e.g. "casual" or "formal".
    pub tone: Option<String>,
}

/// How the orchestrator may schedule the chunks of one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// One chunk at a time, in order.
    #[default]
    Sequential,
    /// Chunks are independent requests and may run at the same time.
    Concurrent,
}

/// A translation provider.
///
/// `source` and `target` are already in the spelling this backend expects
/// (see [`crate::language::LanguageResolver::normalize`]). On success the
/// returned vector has exactly one entry per input text, in input order.
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    async fn translate_batch(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
        hints: &TranslationHints,
    ) -> BackendResult<Vec<String>>;

    /// Release held connection resources. Idempotent.
    async fn close(&self);

    fn kind(&self) -> BackendKind;

    fn name(&self) -> &'static str;

    fn dispatch_mode(&self) -> DispatchMode {
        DispatchMode::Sequential
    }

    async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
        hints: &TranslationHints,
    ) -> BackendResult<String> {
        let mut results = self
            .translate_batch(&[text.to_string()], source, target, hints)
            .await?;
        ensure_aligned(1, results.len())?;
        Ok(results.remove(0))
    }
}

/// Fail with `ShapeMismatch` unless the provider returned one translation
/// per input.
pub fn ensure_aligned(expected: usize, got: usize) -> BackendResult<()> {
    if expected == got {
        Ok(())
    } else {
        Err(BackendError::shape_mismatch(expected, got))
    }
}
