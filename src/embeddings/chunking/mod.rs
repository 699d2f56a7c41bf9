
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::Page;

/// A contiguous span of one page's text, the unit that gets embedded and retrieved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The chunk text
    pub content: String,
    /// Identifier of the document the chunk was cut from
    pub source: String,
    /// 1-based page number within the source document
    pub page: usize,
    /// Position of this chunk within the document (0-based, across pages)
    pub chunk_index: usize,
}

/// Window sizes for the segmenter, measured in characters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk length
    pub chunk_size: usize,
    /// Characters shared between neighbouring chunks of the same page
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub const fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Windows only advance when the overlap is strictly smaller than the chunk size
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.chunk_size > 0 && self.chunk_overlap < self.chunk_size
    }
}

/// Boundary classes, most preferred first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Word,
}

const BOUNDARY_PREFERENCE: [Boundary; 4] = [
    Boundary::Paragraph,
    Boundary::Line,
    Boundary::Sentence,
    Boundary::Word,
];

/// Segment every page of a document into chunks.
///
/// Pages are segmented independently, so no chunk ever spans a page break.
/// Blank pages contribute nothing. Chunk indices run across the whole document.
#[inline]
pub fn chunk_pages(source: &str, pages: &[Page], config: &ChunkingConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for page in pages {
        for content in split_text(&page.text, config) {
            chunks.push(Chunk {
                content,
                source: source.to_string(),
                page: page.number,
                chunk_index: chunks.len(),
            });
        }
    }

    debug!(
        "Chunked '{}' ({} pages) into {} chunks (avg {} chars)",
        source,
        pages.len(),
        chunks.len(),
        chunks.iter().map(|c| c.content.chars().count()).sum::<usize>() / chunks.len().max(1)
    );

    chunks
}

/// Split text with a sliding window of `chunk_size` characters that advances by
/// roughly `chunk_size - chunk_overlap` characters per step.
///
/// Each window end is pulled back to the best natural boundary inside the window,
/// trying paragraph breaks, then line breaks, then sentence ends, then whitespace,
/// and only cutting mid-word when none exist. The next window starts `chunk_overlap`
/// characters before the previous end, nudged forward to the start of a word.
///
/// An invalid config (`chunk_overlap >= chunk_size`) is clamped to the largest
/// overlap that still advances.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let size = config.chunk_size.max(1);
    let overlap = config.chunk_overlap.min(size - 1);

    let mut pieces = Vec::new();
    let mut start = skip_whitespace(&chars, 0);

    while start < len {
        let window_end = (start + size).min(len);
        let end = if window_end == len {
            len
        } else {
            find_boundary(&chars, start, window_end, size, overlap)
        };

        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }

        if end >= len {
            break;
        }

        let next = align_to_word_start(&chars, end.saturating_sub(overlap), end);
        // Always make progress, even when the overlap swallows the whole window
        start = skip_whitespace(&chars, next.max(start + 1));
    }

    pieces
}

/// Choose where the window `[start, window_end)` should end.
///
/// Only positions past `start + max(overlap + 1, size / 2)` are considered so that
/// the next window begins after `start` and chunks do not collapse into slivers.
fn find_boundary(
    chars: &[char],
    start: usize,
    window_end: usize,
    size: usize,
    overlap: usize,
) -> usize {
    let min_end = (start + (overlap + 1).max(size / 2)).min(window_end);

    for boundary in BOUNDARY_PREFERENCE {
        if let Some(end) = last_boundary(chars, min_end, window_end, boundary) {
            return end;
        }
    }

    window_end
}

/// Last end position in `(min_end, window_end]` that closes a span at `boundary`
fn last_boundary(
    chars: &[char],
    min_end: usize,
    window_end: usize,
    boundary: Boundary,
) -> Option<usize> {
    (min_end + 1..=window_end)
        .rev()
        .find(|&end| is_boundary(chars, end, boundary))
}

/// Whether a chunk ending right before `chars[end]` ends on `boundary`
fn is_boundary(chars: &[char], end: usize, boundary: Boundary) -> bool {
    let Some(&next) = chars.get(end) else {
        return true;
    };

    match boundary {
        Boundary::Paragraph => next == '\n' && chars.get(end + 1) == Some(&'\n'),
        Boundary::Line => next == '\n',
        Boundary::Sentence => {
            next.is_whitespace()
                && end > 0
                && matches!(chars[end - 1], '.' | '!' | '?' | '。' | '！' | '？')
        }
        Boundary::Word => next.is_whitespace(),
    }
}

/// Move `pos` forward to the beginning of a word, staying before `limit`
fn align_to_word_start(chars: &[char], pos: usize, limit: usize) -> usize {
    if pos == 0 || chars[pos - 1].is_whitespace() {
        return pos;
    }

    (pos..limit)
        .find(|&i| chars[i].is_whitespace())
        .map_or(pos, |ws| ws + 1)
}

fn skip_whitespace(chars: &[char], mut pos: usize) -> usize {
    while pos < chars.len() && chars[pos].is_whitespace() {
        pos += 1;
    }
    pos
}
