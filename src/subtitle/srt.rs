// SRT subtitle document model
use super::{Segment, SubtitleTrack};
use std::fmt::Write as _;
use tracing::warn;

/// Time-range marker separating start and end timestamps.
pub const TIME_MARKER: &str = "-->";

/// One block of an SRT document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubtitleBlock {
    /// A spoken line with timing.
    Timed {
        index: String,
        start: String,
        end: String,
        text: String,
    },
    /// Any other non-blank line, kept verbatim.
    Opaque { raw: String },
}

impl SubtitleBlock {
    pub fn is_timed(&self) -> bool {
        matches!(self, SubtitleBlock::Timed { .. })
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            SubtitleBlock::Timed { text, .. } => Some(text),
            SubtitleBlock::Opaque { .. } => None,
        }
    }
}

/// Parsed SRT document.
///
/// Blank separator lines are not stored; [`SubtitleDocument::format`]
/// regenerates exactly one blank line after every timed block. Inputs with
/// non-canonical spacing therefore come back with normalised blank lines,
/// while indices, timestamps and text stay untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtitleDocument {
    blocks: Vec<SubtitleBlock>,
    degraded: bool,
}

impl SubtitleDocument {
    pub fn new(blocks: Vec<SubtitleBlock>) -> Self {
        Self {
            blocks,
            degraded: false,
        }
    }

    /// Parse raw SRT text. Never fails: anything that does not look like a
    /// timed block is kept as an opaque line.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
        let lines: Vec<&str> = raw.lines().collect();

        let mut blocks = Vec::new();
        let mut degraded = false;
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];
            let trimmed = line.trim();

            if trimmed.is_empty() {
                i += 1;
                continue;
            }

            let timing = lines.get(i + 1).filter(|next| next.contains(TIME_MARKER));

            if let (true, Some(timing)) = (is_index_line(trimmed), timing) {
                let mut text_lines = Vec::new();
                let mut j = i + 2;
                while j < lines.len() && !lines[j].trim().is_empty() {
                    text_lines.push(lines[j]);
                    j += 1;
                }

                if text_lines.is_empty() && j >= lines.len() {
                    warn!(
                        "Unterminated subtitle block {} at end of input, keeping it verbatim",
                        trimmed
                    );
                    degraded = true;
                    blocks.push(SubtitleBlock::Opaque {
                        raw: line.to_string(),
                    });
                    blocks.push(SubtitleBlock::Opaque {
                        raw: timing.to_string(),
                    });
                } else {
                    let (start, end) = split_timing(timing);
                    blocks.push(SubtitleBlock::Timed {
                        index: trimmed.to_string(),
                        start,
                        end,
                        text: text_lines.join("\n"),
                    });
                }

                i = j;
                continue;
            }

            blocks.push(SubtitleBlock::Opaque {
                raw: line.to_string(),
            });
            i += 1;
        }

        Self { blocks, degraded }
    }

    /// Serialize blocks back to SRT text. Every emitted line ends with a
    /// newline and each timed block is followed by one blank line.
    pub fn format(&self) -> String {
        let mut output = String::new();

        for block in &self.blocks {
            match block {
                SubtitleBlock::Timed {
                    index,
                    start,
                    end,
                    text,
                } => {
                    let _ = writeln!(output, "{}", index);
                    let _ = writeln!(output, "{} {} {}", start, TIME_MARKER, end);
                    let _ = writeln!(output, "{}", text);
                    output.push('\n');
                }
                SubtitleBlock::Opaque { raw } => {
                    let _ = writeln!(output, "{}", raw);
                }
            }
        }

        output
    }

    pub fn blocks(&self) -> &[SubtitleBlock] {
        &self.blocks
    }

    /// True when the parser had to fall back to opaque lines for a
    /// malformed block.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn timed_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_timed()).count()
    }

    /// Replace the text of the timed block at `position`. Returns false if
    /// there is no timed block there.
    pub fn set_text(&mut self, position: usize, new_text: &str) -> bool {
        match self.blocks.get_mut(position) {
            Some(SubtitleBlock::Timed { text, .. }) => {
                *text = super::sanitize_text(new_text);
                true
            }
            _ => false,
        }
    }
}

impl SubtitleTrack for SubtitleDocument {
    fn segments(&self) -> Vec<Segment> {
        self.blocks
            .iter()
            .enumerate()
            .filter_map(|(position, block)| match block {
                SubtitleBlock::Timed { index, text, .. } => Some(Segment {
                    position,
                    label: index.clone(),
                    text: text.clone(),
                }),
                SubtitleBlock::Opaque { .. } => None,
            })
            .collect()
    }

    fn set_segment_text(&mut self, position: usize, text: &str) -> bool {
        self.set_text(position, text)
    }

    fn serialize(&self) -> String {
        self.format()
    }

    fn is_degraded(&self) -> bool {
        self.degraded
    }
}

fn is_index_line(line: &str) -> bool {
    !line.is_empty() && line.chars().all(|c| c.is_ascii_digit())
}

fn split_timing(line: &str) -> (String, String) {
    match line.split_once(TIME_MARKER) {
        Some((start, end)) => (start.trim().to_string(), end.trim().to_string()),
        None => (line.trim().to_string(), String::new()),
    }
}
