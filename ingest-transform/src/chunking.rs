//! Recursive character text splitter, grounded on
//! `asana_task_document.py::to_embedding_chunks`'s use of
//! `langchain_text_splitters.RecursiveCharacterTextSplitter` with
//! `chunk_size=6000`, `chunk_overlap=100`, and the separator cascade
//! `["\n\n", "\n", ". ", " ", ""]`.

/// Default separator cascade, tried in order: paragraph break, line break,
/// sentence break, word break, then character-by-character as a last
/// resort (the empty-string separator).
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

pub const DEFAULT_CHUNK_SIZE: usize = 6000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Split `text` into chunks no larger than `chunk_size` characters, trying
/// each separator in `separators` in turn and recursing into oversized
/// pieces with the next separator down the cascade. Adjacent chunks are
/// stitched back together with `overlap` characters of trailing context
/// from the previous chunk, mirroring `RecursiveCharacterTextSplitter`'s
/// merge-then-overlap behavior.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize, separators: &[&str]) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let pieces = split_recursive(text, chunk_size, separators);
    merge_with_overlap(&pieces, chunk_size, overlap, separator_for(separators, 0))
}

fn separator_for<'a>(separators: &[&'a str], index: usize) -> &'a str {
    separators.get(index).copied().unwrap_or("")
}

/// Recursively split `text` on the first usable separator, descending to
/// the next separator for any resulting piece still over `chunk_size`.
fn split_recursive(text: &str, chunk_size: usize, separators: &[&str]) -> Vec<String> {
    if text.chars().count() <= chunk_size {
        return vec![text.to_string()];
    }

    let Some((sep, rest)) = separators.split_first() else {
        return vec![text.to_string()];
    };

    let pieces: Vec<&str> = if sep.is_empty() {
        // Last-resort separator: split one character at a time.
        return text.chars().collect::<Vec<char>>().chunks(chunk_size.max(1)).map(|c| c.iter().collect()).collect();
    } else {
        text.split(*sep).collect()
    };

    let mut out = Vec::new();
    for piece in pieces {
        if piece.is_empty() {
            continue;
        }
        if piece.chars().count() > chunk_size {
            out.extend(split_recursive(piece, chunk_size, rest));
        } else {
            out.push(piece.to_string());
        }
    }
    out
}

/// Greedily pack adjacent pieces into chunks up to `chunk_size`, carrying
/// `overlap` characters of trailing context from one chunk into the start
/// of the next so surrounding context survives a chunk boundary.
fn merge_with_overlap(pieces: &[String], chunk_size: usize, overlap: usize, joiner: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for piece in pieces {
        let candidate_len = if current.is_empty() {
            piece.chars().count()
        } else {
            current.chars().count() + joiner.chars().count() + piece.chars().count()
        };

        if !current.is_empty() && candidate_len > chunk_size {
            chunks.push(current.clone());
            let tail = take_trailing_chars(&current, overlap);
            current = if tail.is_empty() {
                String::new()
            } else {
                format!("{tail}{joiner}")
            };
        }

        if !current.is_empty() && !current.ends_with(joiner) {
            current.push_str(joiner);
        }
        current.push_str(piece);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn take_trailing_chars(s: &str, n: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    let start = chars.len().saturating_sub(n);
    chars[start..].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = split_text("short text", DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP, DEFAULT_SEPARATORS);
        assert_eq!(chunks, vec!["short text".to_string()]);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(split_text("", DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP, DEFAULT_SEPARATORS).is_empty());
    }

    #[test]
    fn splits_long_text_on_paragraph_boundaries() {
        let paragraph = "x".repeat(50);
        let text = std::iter::repeat(paragraph.clone()).take(10).collect::<Vec<_>>().join("\n\n");
        let chunks = split_text(&text, 120, 10, DEFAULT_SEPARATORS);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 120 + 10, "chunk exceeded size+overlap budget: {}", chunk.len());
        }
    }

    #[test]
    fn consecutive_chunks_share_overlap_context() {
        let paragraph = "word ".repeat(40);
        let text = std::iter::repeat(paragraph).take(4).collect::<Vec<_>>().join("\n\n");
        let chunks = split_text(&text, 100, 20, DEFAULT_SEPARATORS);
        assert!(chunks.len() > 1);
        let overlap_text = take_trailing_chars(&chunks[0], 20);
        assert!(chunks[1].starts_with(&overlap_text) || chunks[1].contains(overlap_text.trim()));
    }
}
