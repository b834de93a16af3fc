// Advanced SubStation Alpha / SubStation Alpha document model
use super::{Segment, SubtitleTrack};
use regex::Regex;
use std::sync::OnceLock;

/// Field count of a `Dialogue:` line when the `[Events]` section has no
/// `Format:` line. Both v4 and v4+ use ten.
const DEFAULT_EVENT_FIELDS: usize = 10;

fn override_blocks() -> &'static Regex {
    static OVERRIDES: OnceLock<Regex> = OnceLock::new();
    OVERRIDES.get_or_init(|| Regex::new(r"\{[^}]*\}").expect("valid regex"))
}

fn leading_overrides() -> &'static Regex {
    static LEADING: OnceLock<Regex> = OnceLock::new();
    LEADING.get_or_init(|| Regex::new(r"^(?:\{[^}]*\})*").expect("valid regex"))
}

/// Vector drawings (`{\p1}` and up) are shapes, not words.
fn is_drawing(raw: &str) -> bool {
    static DRAWING: OnceLock<Regex> = OnceLock::new();
    let drawing = DRAWING.get_or_init(|| Regex::new(r"\\p[1-9]").expect("valid regex"));
    override_blocks()
        .find_iter(raw)
        .any(|block| drawing.is_match(block.as_str()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssLine {
    /// A `Dialogue:` event. `fields` holds everything before the text field,
    /// including the trailing comma.
    Dialogue { number: usize, fields: String, text: String },
    /// Script info, styles, comments, `Comment:` events and anything else.
    Raw(String),
}

/// Parsed ASS/SSA script. Only dialogue text is ever rewritten; every other
/// line is written back byte for byte.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssDocument {
    lines: Vec<AssLine>,
    trailing_newline: bool,
    degraded: bool,
}

impl AssDocument {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

        let mut lines = Vec::new();
        let mut degraded = false;
        let mut in_events = false;
        let mut field_count = DEFAULT_EVENT_FIELDS;
        let mut number = 0;

        for line in raw.lines() {
            let trimmed = line.trim();

            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                in_events = trimmed.eq_ignore_ascii_case("[events]");
                lines.push(AssLine::Raw(line.to_string()));
                continue;
            }

            if in_events {
                if let Some(format) = trimmed.strip_prefix("Format:") {
                    field_count = format.split(',').count().max(1);
                } else if trimmed.starts_with("Dialogue:") {
                    match split_dialogue(line, field_count) {
                        Some((fields, text)) => {
                            number += 1;
                            lines.push(AssLine::Dialogue {
                                number,
                                fields: fields.to_string(),
                                text: text.to_string(),
                            });
                            continue;
                        }
                        None => degraded = true,
                    }
                }
            }

            lines.push(AssLine::Raw(line.to_string()));
        }

        Self {
            lines,
            trailing_newline: raw.ends_with('\n'),
            degraded,
        }
    }

    pub fn format(&self) -> String {
        let mut output = self
            .lines
            .iter()
            .map(|line| match line {
                AssLine::Dialogue { fields, text, .. } => format!("{}{}", fields, text),
                AssLine::Raw(raw) => raw.clone(),
            })
            .collect::<Vec<_>>()
            .join("\n");
        if self.trailing_newline {
            output.push('\n');
        }
        output
    }

    pub fn lines(&self) -> &[AssLine] {
        &self.lines
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}

/// Split a dialogue line after its `field_count - 1`th comma. The text
/// field is last and may itself contain commas.
fn split_dialogue(line: &str, field_count: usize) -> Option<(&str, &str)> {
    let mut split_at = 0;
    for _ in 0..field_count.saturating_sub(1) {
        split_at += line[split_at..].find(',')? + 1;
    }
    Some(line.split_at(split_at))
}

/// Text as a viewer reads it: override blocks removed, hard breaks as
/// newlines, hard spaces as spaces.
pub fn plain_text(raw: &str) -> String {
    override_blocks()
        .replace_all(raw, "")
        .replace("\\N", "\n")
        .replace("\\n", "\n")
        .replace("\\h", " ")
}

impl SubtitleTrack for AssDocument {
    fn segments(&self) -> Vec<Segment> {
        self.lines
            .iter()
            .enumerate()
            .filter_map(|(position, line)| match line {
                AssLine::Dialogue { number, text, .. } => {
                    if is_drawing(text) {
                        return None;
                    }
                    let text = plain_text(text);
                    (!text.trim().is_empty()).then(|| Segment {
                        position,
                        label: number.to_string(),
                        text,
                    })
                }
                AssLine::Raw(_) => None,
            })
            .collect()
    }

    /// Leading override blocks such as `{\an8}` survive the replacement;
    /// inline ones cannot be placed in the new text and are dropped.
    fn set_segment_text(&mut self, position: usize, new_text: &str) -> bool {
        match self.lines.get_mut(position) {
            Some(AssLine::Dialogue { text, .. }) => {
                let prefix = leading_overrides()
                    .find(text)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                let body = super::sanitize_text(new_text).replace('\n', "\\N");
                *text = format!("{}{}", prefix, body);
                true
            }
            _ => false,
        }
    }

    fn serialize(&self) -> String {
        self.format()
    }

    fn is_degraded(&self) -> bool {
        self.degraded
    }
}
