use crate::config::ChunkingConfig;
use crate::ingest::loader::Document;

/// A sub-window of a document's content.
///
/// `chunk_index` is assigned from a monotonically increasing counter over the
/// entire ingestion batch, in emission order, so it is unique within one
/// upsert call even when several documents are chunked together.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub source_path: String,
    pub chunk_index: usize,
}

/// Split one document into overlapping chunks.
///
/// Greedily accumulates up to `chunk_size` bytes, preferring to break at
/// a paragraph, then sentence, then word boundary within the last 20% of the
/// window before falling back to a hard cut. Each subsequent chunk begins
/// `chunk_overlap` bytes before the previous chunk's end. All slicing is
/// clamped down to UTF-8 character boundaries, so on multibyte text a
/// hard-cut overlap can exceed `chunk_overlap` by up to one character's
/// width minus one byte; it is exactly `chunk_overlap` for single-byte text.
///
/// A document shorter than `chunk_size` yields exactly one chunk equal to its
/// full content; an empty document yields none.
pub fn chunk_document(
    doc: &Document,
    config: &ChunkingConfig,
    next_index: &mut usize,
) -> Vec<Chunk> {
    let source_path = doc.source_path.display().to_string();
    let mut chunks = Vec::new();

    for text in split_text(&doc.content, config.chunk_size, config.chunk_overlap) {
        chunks.push(Chunk {
            text,
            source_path: source_path.clone(),
            chunk_index: *next_index,
        });
        *next_index += 1;
    }

    chunks
}

/// Find the closest character boundary at or before `byte_pos`.
fn floor_char_boundary(text: &str, byte_pos: usize) -> usize {
    if byte_pos >= text.len() {
        return text.len();
    }
    let mut pos = byte_pos;
    while pos > 0 && !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

/// Find the closest character boundary at or after `byte_pos`.
fn ceil_char_boundary(text: &str, byte_pos: usize) -> usize {
    let mut pos = byte_pos;
    while pos < text.len() && !text.is_char_boundary(pos) {
        pos += 1;
    }
    pos.min(text.len())
}

/// Pick a break position within `(window_start, hard_end]`.
///
/// Preference order: after a blank line, after a sentence terminator, after
/// any whitespace. Returns None when the window contains no boundary, in
/// which case the caller hard-cuts at `hard_end`.
fn find_break(text: &str, window_start: usize, hard_end: usize) -> Option<usize> {
    let window = text.get(window_start..hard_end)?;

    if let Some(pos) = window.rfind("\n\n") {
        return Some(window_start + pos + 2);
    }

    if let Some((pos, c)) = window
        .char_indices()
        .rev()
        .find(|(_, c)| matches!(c, '.' | '!' | '?'))
    {
        return Some(window_start + pos + c.len_utf8());
    }

    if let Some((pos, c)) = window
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
    {
        return Some(window_start + pos + c.len_utf8());
    }

    None
}

fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    if text.len() <= chunk_size {
        return vec![text.to_string()];
    }

    let mut pieces = Vec::new();
    let mut start = 0;

    loop {
        let mut hard_end = floor_char_boundary(text, start + chunk_size);
        if hard_end <= start {
            // chunk_size smaller than the next character; take it whole
            // rather than looping forever.
            hard_end = ceil_char_boundary(text, start + 1);
        }

        let end = if hard_end < text.len() {
            // Only look for a boundary in the last 20% of the window so
            // chunks stay close to the target size.
            let window_start = floor_char_boundary(text, hard_end.saturating_sub(chunk_size / 5));
            match find_break(text, window_start.max(start), hard_end) {
                Some(b) if b > start => b,
                _ => hard_end,
            }
        } else {
            hard_end
        };

        pieces.push(text[start..end].to_string());

        if end >= text.len() {
            break;
        }

        let next_start = floor_char_boundary(text, end.saturating_sub(chunk_overlap));
        // Overlap must never move the window backwards past the previous start.
        start = if next_start > start { next_start } else { end };
    }

    pieces
}
