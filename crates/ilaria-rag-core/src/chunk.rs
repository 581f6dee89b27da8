//! Markdown section chunker.
//!
//! Splits a Markdown document into [`Chunk`]s of at most `chunk_size`
//! characters, keeping the heading of the enclosing section as metadata.
//! Consecutive windows of one section overlap by `overlap` characters.
//!
//! # Algorithm
//!
//! 1. Cut the document into sections right before every heading line
//!    (one or more `#` followed by whitespace). Text before the first
//!    heading is its own section.
//! 2. Take each section's title from its heading, or `"Unknown"`.
//! 3. A section no longer than `chunk_size` becomes one chunk. Longer
//!    sections are cut into windows: propose `start + chunk_size` as the
//!    end, then snap back to just after the rightmost separator inside the
//!    window, trying `"\n\n"`, `"\n"`, `". "`, `"! "`, `"? "` in that order.
//!    Without a separator the raw cut is kept.
//! 4. The next window starts at `end - overlap`, but always strictly after
//!    the current start; if the overlap would stall the window it starts
//!    at `end` instead. The window that reaches the section end is the last.
//! 5. Pieces are trimmed, empty pieces dropped, and ids assigned densely
//!    in emission order across the whole document.
//!
//! Sizes are counted in characters, not bytes, so Georgian text (three
//! bytes per letter in UTF-8) gets the same window width as ASCII.
//!
//! # Example
//!
//! ```rust
//! use ilaria_rag_core::chunk::split_markdown;
//!
//! let doc = "# Intro\nHello.\n## Usage\nRun it.";
//! let chunks = split_markdown(doc, "guide.md", 1000, 200);
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[1].section_title, "Usage");
//! assert_eq!(chunks[1].id, 1);
//! ```

use std::path::Path;

use crate::error::{RagError, Result};
use crate::models::Chunk;

/// Section title used when a section has no heading.
pub const UNKNOWN_SECTION: &str = "Unknown";

/// Window boundaries, most preferred first.
const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", "! ", "? "];

/// Read the source document.
///
/// A missing file is reported as [`RagError::DocumentNotFound`]; any other
/// read failure as [`RagError::Io`].
pub fn load_document(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            tracing::info!(
                path = %path.display(),
                chars = content.chars().count(),
                "loaded document"
            );
            Ok(content)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RagError::DocumentNotFound {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(RagError::io(path, e)),
    }
}

/// Split a Markdown document into overlapping, section-tagged chunks.
///
/// Returns an empty vector for a document with no non-whitespace content.
/// `overlap` should be smaller than `chunk_size`; larger values only lose
/// the overlap, they never stall the loop.
pub fn split_markdown(
    text: &str,
    source_name: &str,
    chunk_size: usize,
    overlap: usize,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for section in split_sections(text) {
        let title = section_title(section);
        for piece in split_section(section, chunk_size, overlap) {
            chunks.push(Chunk {
                id: chunks.len(),
                content: piece.to_string(),
                section_title: title.clone(),
                source_name: source_name.to_string(),
            });
        }
    }

    chunks
}

/// Cut before every newline-preceded heading line. The newline itself is
/// dropped.
fn split_sections(text: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut start = 0;

    for (pos, _) in text.match_indices('\n') {
        if is_heading(&text[pos + 1..]) {
            sections.push(&text[start..pos]);
            start = pos + 1;
        }
    }
    sections.push(&text[start..]);

    sections
}

fn is_heading(line: &str) -> bool {
    let rest = line.trim_start_matches('#');
    rest.len() < line.len() && rest.starts_with(char::is_whitespace)
}

fn section_title(section: &str) -> String {
    if !is_heading(section) {
        return UNKNOWN_SECTION.to_string();
    }
    let first_line = section.lines().next().unwrap_or_default();
    let title = first_line.trim_start_matches('#').trim();
    if title.is_empty() {
        UNKNOWN_SECTION.to_string()
    } else {
        title.to_string()
    }
}

fn split_section(section: &str, chunk_size: usize, overlap: usize) -> Vec<&str> {
    let chunk_size = chunk_size.max(1);

    // Byte offset of every char, plus the end, so char positions map to
    // slice boundaries.
    let bounds: Vec<usize> = section
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(section.len()))
        .collect();
    let char_len = bounds.len() - 1;

    if char_len <= chunk_size {
        let trimmed = section.trim();
        return if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed]
        };
    }

    let mut pieces = Vec::new();
    let mut start = 0;

    loop {
        let mut end = (start + chunk_size).min(char_len);
        if end < char_len {
            end = snap_to_separator(section, &bounds, start, end);
        }

        let piece = section[bounds[start]..bounds[end]].trim();
        if !piece.is_empty() {
            pieces.push(piece);
        }

        if end >= char_len {
            break;
        }

        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }

    pieces
}

/// Move `end` back to just after the rightmost preferred separator in
/// `[start, end)`. Always returns a position greater than `start`.
fn snap_to_separator(section: &str, bounds: &[usize], start: usize, end: usize) -> usize {
    let window = &section[bounds[start]..bounds[end]];

    for sep in SEPARATORS {
        if let Some(pos) = window.rfind(sep) {
            let byte = bounds[start] + pos + sep.len();
            return match bounds.binary_search(&byte) {
                Ok(snapped) => snapped,
                Err(_) => end,
            };
        }
    }

    end
}
