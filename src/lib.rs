pub mod config;
pub mod error;
pub mod files;
pub mod language;
pub mod pipeline;
pub mod subtitle;
pub mod translate;

pub use config::{BackendKind, Config, TranslationConfig};
pub use error::{BackendError, BackendErrorKind, Result, SubtransError};
pub use language::{Detection, LanguageCode, LanguageResolver, SourceLanguage};
pub use pipeline::{
    print_summary, FailedSegment, FileReport, FileStatus, TranslatedDocument, TranslationPipeline,
    TranslationReport,
};
pub use subtitle::{SubtitleFile, SubtitleFormat, SubtitleTrack};
pub use translate::{BackendRegistry, TranslationBackend, TranslationHints};
