pub mod ass;
pub mod srt;
pub mod vtt;

pub use ass::{AssDocument, AssLine};
pub use srt::{SubtitleBlock, SubtitleDocument};
pub use vtt::{VttBlock, VttDocument};

use crate::error::{Result, SubtransError};
use std::path::Path;

/// One unit of translatable text extracted from a subtitle track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Block position inside the owning document.
    pub position: usize,
    /// Human-facing label: the SRT index, the VTT cue identifier or the
    /// ASS dialogue number.
    pub label: String,
    pub text: String,
}

/// Event-list view of a subtitle document: read the plain text of each
/// event, write it back, serialize.
pub trait SubtitleTrack {
    fn segments(&self) -> Vec<Segment>;
    fn set_segment_text(&mut self, position: usize, text: &str) -> bool;
    fn serialize(&self) -> String;

    fn is_degraded(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubtitleFormat {
    #[default]
    Srt,
    Vtt,
    /// ASS and its SSA predecessor share one model.
    Ass,
}

impl std::fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubtitleFormat::Srt => write!(f, "srt"),
            SubtitleFormat::Vtt => write!(f, "vtt"),
            SubtitleFormat::Ass => write!(f, "ass"),
        }
    }
}

impl std::str::FromStr for SubtitleFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_lowercase().as_str() {
            "srt" => Ok(SubtitleFormat::Srt),
            "vtt" => Ok(SubtitleFormat::Vtt),
            "ass" | "ssa" => Ok(SubtitleFormat::Ass),
            _ => Err(format!(
                "Unknown subtitle format: {}. Use 'srt', 'vtt', 'ass' or 'ssa'",
                s
            )),
        }
    }
}

impl SubtitleFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        ext.parse()
            .map_err(|_| SubtransError::UnsupportedFormat(path.display().to_string()))
    }
}

/// A parsed subtitle document of any supported format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubtitleFile {
    Srt(SubtitleDocument),
    Vtt(VttDocument),
    Ass(AssDocument),
}

impl SubtitleFile {
    pub fn parse(format: SubtitleFormat, raw: &str) -> Self {
        match format {
            SubtitleFormat::Srt => SubtitleFile::Srt(SubtitleDocument::parse(raw)),
            SubtitleFormat::Vtt => SubtitleFile::Vtt(VttDocument::parse(raw)),
            SubtitleFormat::Ass => SubtitleFile::Ass(AssDocument::parse(raw)),
        }
    }

    /// Decode bytes as UTF-8 (lossily) and parse them.
    pub fn from_bytes(format: SubtitleFormat, bytes: &[u8]) -> Self {
        Self::parse(format, &String::from_utf8_lossy(bytes))
    }

    pub fn format(&self) -> SubtitleFormat {
        match self {
            SubtitleFile::Srt(_) => SubtitleFormat::Srt,
            SubtitleFile::Vtt(_) => SubtitleFormat::Vtt,
            SubtitleFile::Ass(_) => SubtitleFormat::Ass,
        }
    }

    fn track(&self) -> &dyn SubtitleTrack {
        match self {
            SubtitleFile::Srt(doc) => doc,
            SubtitleFile::Vtt(doc) => doc,
            SubtitleFile::Ass(doc) => doc,
        }
    }

    fn track_mut(&mut self) -> &mut dyn SubtitleTrack {
        match self {
            SubtitleFile::Srt(doc) => doc,
            SubtitleFile::Vtt(doc) => doc,
            SubtitleFile::Ass(doc) => doc,
        }
    }
}

impl SubtitleTrack for SubtitleFile {
    fn segments(&self) -> Vec<Segment> {
        self.track().segments()
    }

    fn set_segment_text(&mut self, position: usize, text: &str) -> bool {
        self.track_mut().set_segment_text(position, text)
    }

    fn serialize(&self) -> String {
        self.track().serialize()
    }

    fn is_degraded(&self) -> bool {
        self.track().is_degraded()
    }
}

/// Drop blank lines and surrounding newlines so a replacement text cannot
/// split its block when the document is parsed again.
pub(crate) fn sanitize_text(text: &str) -> String {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_parsing() {
        assert_eq!("srt".parse::<SubtitleFormat>().unwrap(), SubtitleFormat::Srt);
        assert_eq!(".VTT".parse::<SubtitleFormat>().unwrap(), SubtitleFormat::Vtt);
        assert_eq!("ssa".parse::<SubtitleFormat>().unwrap(), SubtitleFormat::Ass);
        assert!("sub".parse::<SubtitleFormat>().is_err());
    }

    #[test]
    fn test_format_from_path() {
        let srt = SubtitleFormat::from_path(&PathBuf::from("/movies/film.en.srt")).unwrap();
        assert_eq!(srt, SubtitleFormat::Srt);
        let ass = SubtitleFormat::from_path(&PathBuf::from("episode.ASS")).unwrap();
        assert_eq!(ass, SubtitleFormat::Ass);
        assert!(SubtitleFormat::from_path(&PathBuf::from("notes.txt")).is_err());
    }

    #[test]
    fn test_sanitize_text() {
        assert_eq!(sanitize_text("a\n\nb\n"), "a\nb");
        assert_eq!(sanitize_text("Bonjour"), "Bonjour");
    }

    #[test]
    fn test_subtitle_file_dispatch() {
        let file = SubtitleFile::from_bytes(
            SubtitleFormat::Srt,
            b"1\n00:00:01,000 --> 00:00:02,000\nHello\n",
        );
        assert_eq!(file.format(), SubtitleFormat::Srt);
        assert_eq!(file.segments().len(), 1);
        assert!(!file.is_degraded());
    }
}
