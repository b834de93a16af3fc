// WebVTT subtitle document model
use super::{Segment, SubtitleTrack};
use super::srt::TIME_MARKER;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VttBlock {
    /// A cue with optional identifier. The timing line keeps its cue settings.
    Cue {
        identifier: Option<String>,
        timing: String,
        text: String,
    },
    /// Header, NOTE, STYLE, REGION or anything unrecognised.
    Raw { lines: Vec<String> },
}

/// Parsed WebVTT document. Blocks are separated by exactly one blank line
/// on output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VttDocument {
    blocks: Vec<VttBlock>,
}

impl VttDocument {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

        let mut blocks = Vec::new();
        let mut paragraph: Vec<&str> = Vec::new();

        for line in raw.lines() {
            if line.trim().is_empty() {
                if !paragraph.is_empty() {
                    blocks.push(parse_paragraph(&paragraph));
                    paragraph.clear();
                }
            } else {
                paragraph.push(line);
            }
        }
        if !paragraph.is_empty() {
            blocks.push(parse_paragraph(&paragraph));
        }

        Self { blocks }
    }

    pub fn format(&self) -> String {
        let paragraphs: Vec<String> = self
            .blocks
            .iter()
            .map(|block| match block {
                VttBlock::Cue {
                    identifier,
                    timing,
                    text,
                } => {
                    let mut lines = Vec::with_capacity(3);
                    if let Some(id) = identifier {
                        lines.push(id.as_str());
                    }
                    lines.push(timing.as_str());
                    if !text.is_empty() {
                        lines.push(text.as_str());
                    }
                    lines.join("\n")
                }
                VttBlock::Raw { lines } => lines.join("\n"),
            })
            .collect();

        if paragraphs.is_empty() {
            return String::new();
        }

        let mut output = paragraphs.join("\n\n");
        output.push('\n');
        output
    }

    pub fn blocks(&self) -> &[VttBlock] {
        &self.blocks
    }
}

fn parse_paragraph(lines: &[&str]) -> VttBlock {
    let first = lines[0].trim_start();
    let is_special = ["WEBVTT", "NOTE", "STYLE", "REGION"]
        .iter()
        .any(|kw| first.starts_with(kw));

    if !is_special {
        let timing_at = lines
            .iter()
            .take(2)
            .position(|l| l.contains(TIME_MARKER));

        if let Some(at) = timing_at {
            let identifier = (at == 1).then(|| lines[0].to_string());
            return VttBlock::Cue {
                identifier,
                timing: lines[at].to_string(),
                text: lines[at + 1..].join("\n"),
            };
        }
    }

    VttBlock::Raw {
        lines: lines.iter().map(|l| l.to_string()).collect(),
    }
}

impl SubtitleTrack for VttDocument {
    fn segments(&self) -> Vec<Segment> {
        self.blocks
            .iter()
            .enumerate()
            .filter_map(|(position, block)| match block {
                VttBlock::Cue {
                    identifier,
                    timing,
                    text,
                } => Some(Segment {
                    position,
                    label: identifier.clone().unwrap_or_else(|| timing.clone()),
                    text: text.clone(),
                }),
                VttBlock::Raw { .. } => None,
            })
            .collect()
    }

    fn set_segment_text(&mut self, position: usize, new_text: &str) -> bool {
        match self.blocks.get_mut(position) {
            Some(VttBlock::Cue { text, .. }) => {
                *text = super::sanitize_text(new_text);
                true
            }
            _ => false,
        }
    }

    fn serialize(&self) -> String {
        self.format()
    }
}
