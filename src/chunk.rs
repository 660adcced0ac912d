//! Paragraph-boundary text chunker with word-aligned overlap.
//!
//! Splits extracted text on blank lines and greedily packs paragraphs into
//! chunks of at most `chunk_size` characters. When a chunk is emitted, the
//! trailing words that fit in `overlap` characters are carried into the next
//! chunk so a query straddling the cut still finds its context.
//!
//! A single paragraph longer than `chunk_size` is emitted whole; callers
//! must not assume a strict upper bound. Output is fully deterministic.

use crate::models::Chunk;

/// Separator placed between packed paragraphs.
const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Split text into overlap-preserving chunks with ids starting at 0.
///
/// Lengths are measured in characters, not bytes. Returns an empty list for
/// text with no non-blank paragraphs.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    let separator_len = PARAGRAPH_SEPARATOR.chars().count();
    let mut chunks = Vec::new();
    let mut current_buf = String::new();
    let mut current_len = 0usize;

    for para in text.split(PARAGRAPH_SEPARATOR) {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }
        let para_len = trimmed.chars().count();

        let would_be = if current_buf.is_empty() {
            para_len
        } else {
            current_len + separator_len + para_len
        };

        if would_be > chunk_size && !current_buf.is_empty() {
            let tail = overlap_tail(&current_buf, overlap);
            push_chunk(&mut chunks, &current_buf);
            current_buf = tail;
            current_len = current_buf.chars().count();
        }

        if !current_buf.is_empty() {
            current_buf.push_str(PARAGRAPH_SEPARATOR);
            current_len += separator_len;
        }
        current_buf.push_str(trimmed);
        current_len += para_len;
    }

    // Flush remaining
    if !current_buf.is_empty() {
        push_chunk(&mut chunks, &current_buf);
    }

    chunks
}

fn push_chunk(chunks: &mut Vec<Chunk>, text: &str) {
    chunks.push(Chunk {
        local_id: chunks.len(),
        text: text.to_string(),
        char_count: text.chars().count(),
    });
}

/// The trailing whitespace-delimited words of `text` whose space-joined
/// length fits in `overlap` characters. Empty when `overlap` is 0 or the
/// last word alone is longer than `overlap`.
pub fn overlap_tail(text: &str, overlap: usize) -> String {
    if overlap == 0 {
        return String::new();
    }

    let mut taken: Vec<&str> = Vec::new();
    let mut total = 0usize;
    for word in text.split_whitespace().rev() {
        let add = word.chars().count() + usize::from(total > 0);
        if total + add > overlap {
            break;
        }
        total += add;
        taken.push(word);
    }

    taken.reverse();
    taken.join(" ")
}
