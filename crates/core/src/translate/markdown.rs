//! Structure-preserving markdown segmentation.
//!
//! A document is cut into [`Segment`]s. Only [`Segment::Prose`] is ever
//! handed to a translation engine; everything else (code, URLs, block
//! markers, HTML tags, whitespace) is stitched back byte-for-byte by
//! [`reassemble`].

use regex::Regex;
use std::sync::LazyLock;

/// Leading block markers: indentation, blockquotes, headings, list bullets.
static BLOCK_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ ]{0,3}(?:>[ ]?)*(?:#{1,6}[ \t]+|[-*+][ \t]+|\d{1,9}[.)][ \t]+)?(?:\[[ xX]\][ \t]+)?").unwrap()
});
static FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[ ]{0,3}(`{3,}|~{3,})").unwrap());
static INLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?P<code>``[^\n]*?``|`[^`\n]*`)",
        r"|(?P<open>!?\[)(?P<text>[^\]\n]*)(?P<target>\]\([^)\n]*\))",
        r"|(?P<tag></?[A-Za-z][^>\n]*>|<[a-z]+://[^>\n]*>)",
        r"|(?P<url>https?://[^\s)>\]]+)",
    ))
    .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Reproduced exactly as written.
    Verbatim(&'a str),
    /// Human-readable text to translate.
    Prose(&'a str),
}
impl<'a> Segment<'a> {
    pub fn prose(&self) -> Option<&'a str> {
        match self {
            Self::Prose(text) => Some(text),
            Self::Verbatim(_) => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Previous {
    Blank,
    Code,
    Text,
}

struct Fence {
    marker: u8,
    len: usize,
}
impl Fence {
    fn open(line: &str) -> Option<Self> {
        let run = FENCE.captures(line)?.get(1)?.as_str();
        // Backtick fences may not carry backticks in their info string.
        if run.starts_with('`') && line.trim_start()[run.len()..].contains('`') {
            return None;
        }
        Some(Self { marker: run.as_bytes()[0], len: run.len() })
    }

    fn closes(&self, line: &str) -> bool {
        let trimmed = line.trim();
        trimmed.len() >= self.len && trimmed.bytes().all(|b| b == self.marker) && line.len() - line.trim_start().len() <= 3
    }
}

/// Split a markdown document into verbatim and prose segments.
pub fn segment(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut fence: Option<Fence> = None;
    let mut previous = Previous::Blank;

    for line in text.split_inclusive('\n') {
        let body = line.strip_suffix('\n').unwrap_or(line);
        let body = body.strip_suffix('\r').unwrap_or(body);
        let ending = &line[body.len()..];

        if let Some(open) = &fence {
            if open.closes(body) {
                fence = None;
            }
            segments.push(Segment::Verbatim(line));
            previous = Previous::Code;
            continue;
        }
        if let Some(open) = Fence::open(body) {
            fence = Some(open);
            segments.push(Segment::Verbatim(line));
            previous = Previous::Code;
            continue;
        }
        if body.trim().is_empty() {
            segments.push(Segment::Verbatim(line));
            previous = Previous::Blank;
            continue;
        }
        let indented = body.starts_with("    ") || body.starts_with('\t');
        if indented && previous != Previous::Text {
            segments.push(Segment::Verbatim(line));
            previous = Previous::Code;
            continue;
        }

        let prefix_len = BLOCK_PREFIX.find(body).map_or(0, |m| m.end());
        push_verbatim(&mut segments, &body[..prefix_len]);
        split_inline(&mut segments, &body[prefix_len..]);
        push_verbatim(&mut segments, ending);
        previous = Previous::Text;
    }
    segments
}

/// Stitch segments back together, substituting translated prose in order.
///
/// If `translated` runs short the remaining prose is kept untranslated.
pub fn reassemble<I>(segments: &[Segment<'_>], translated: I) -> String
where
    I: IntoIterator<Item = String>,
{
    let mut translated = translated.into_iter();
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Verbatim(text) => out.push_str(text),
            Segment::Prose(text) => match translated.next() {
                Some(replacement) => out.push_str(&replacement),
                None => out.push_str(text),
            },
        }
    }
    out
}

fn split_inline<'a>(segments: &mut Vec<Segment<'a>>, text: &'a str) {
    let mut cursor = 0;
    for caps in INLINE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        push_prose(segments, &text[cursor..whole.start()]);
        match (caps.name("open"), caps.name("text"), caps.name("target")) {
            (Some(open), Some(label), Some(target)) => {
                push_verbatim(segments, open.as_str());
                push_prose(segments, label.as_str());
                push_verbatim(segments, target.as_str());
            },
            _ => push_verbatim(segments, whole.as_str()),
        }
        cursor = whole.end();
    }
    push_prose(segments, &text[cursor..]);
}

/// Whitespace around prose and text with no letters stay verbatim.
fn push_prose<'a>(segments: &mut Vec<Segment<'a>>, text: &'a str) {
    let core = text.trim();
    if !core.chars().any(char::is_alphabetic) {
        push_verbatim(segments, text);
        return;
    }
    let lead = text.len() - text.trim_start().len();
    push_verbatim(segments, &text[..lead]);
    segments.push(Segment::Prose(core));
    push_verbatim(segments, &text[lead + core.len()..]);
}

fn push_verbatim<'a>(segments: &mut Vec<Segment<'a>>, text: &'a str) {
    if !text.is_empty() {
        segments.push(Segment::Verbatim(text));
    }
}
