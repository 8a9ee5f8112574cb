//! Recursive character text chunker.
//!
//! Splits extracted document text into [`Chunk`]s of at most
//! `chunk_size` characters. Boundaries are chosen from a priority list of
//! separators (paragraph, line, word, character): the text is split on
//! the first separator it contains, small pieces are merged greedily, and
//! pieces that are still too large are split again with the next
//! separator. When a chunk is emitted, up to `chunk_overlap` characters of
//! its tail are carried into the next chunk.
//!
//! Lengths are counted in `char`s so multi-byte text never splits inside a
//! code point.

use std::collections::VecDeque;

use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::models::Chunk;

/// Separators in priority order. The empty separator splits into characters.
const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Split `text` into chunks tagged with `source`.
/// Returns chunks with contiguous indices starting at 0.
pub fn chunk_text(source: &str, text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    split_text(text, config.chunk_size, config.chunk_overlap)
        .into_iter()
        .enumerate()
        .map(|(index, piece)| Chunk {
            id: Uuid::new_v4().to_string(),
            source: source.to_string(),
            chunk_index: index,
            text: piece,
        })
        .collect()
}

/// Split `text` into trimmed, non-empty segments of at most `chunk_size`
/// characters with up to `chunk_overlap` characters shared between
/// neighbours.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let splitter = Splitter {
        chunk_size: chunk_size.max(1),
        chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
    };
    splitter.split(text, SEPARATORS)
}

struct Splitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Splitter {
    fn split(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut out = Vec::new();

        // First separator present in the text; "" always matches.
        let (separator, remaining) = separators
            .iter()
            .enumerate()
            .find(|(_, sep)| sep.is_empty() || text.contains(**sep))
            .map(|(i, sep)| (*sep, &separators[i + 1..]))
            .unwrap_or(("", &[][..]));

        let mut pending: Vec<String> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                out.extend(self.merge(&pending));
                pending.clear();
            }
            if remaining.is_empty() {
                out.push(piece.trim().to_string());
            } else {
                out.extend(self.split(&piece, remaining));
            }
        }
        if !pending.is_empty() {
            out.extend(self.merge(&pending));
        }

        out.retain(|s| !s.is_empty());
        out
    }

    /// Greedily pack pieces into chunks. Pieces already carry their leading
    /// separator, so they are joined with nothing in between.
    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_trimmed(&mut chunks, &window);
                // Keep at most `chunk_overlap` characters, and make room for `piece`.
                while total > self.chunk_overlap
                    || (total + len > self.chunk_size && total > 0)
                {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }
            window.push_back((piece.as_str(), len));
            total += len;
        }
        push_trimmed(&mut chunks, &window);
        chunks
    }
}

fn push_trimmed(chunks: &mut Vec<String>, window: &VecDeque<(&str, usize)>) {
    let joined: String = window.iter().map(|(s, _)| *s).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Split on `separator`, attaching it to the start of every piece after the
/// first. Empty pieces are dropped.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }
    let mut pieces = Vec::new();
    let mut rest = text;
    let mut first = true;
    loop {
        // Skip over the separator that starts every piece but the first.
        let search_from = if first { 0 } else { separator.len() };
        match rest[search_from..].find(separator) {
            Some(pos) => {
                let end = search_from + pos;
                pieces.push(rest[..end].to_string());
                rest = &rest[end..];
                first = false;
            }
            None => {
                pieces.push(rest.to_string());
                break;
            }
        }
    }
    pieces.retain(|p| !p.is_empty());
    pieces
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    fn word_ids(chunk: &str) -> Vec<usize> {
        chunk
            .split_whitespace()
            .map(|w| w.trim_start_matches('w').parse::<usize>().unwrap())
            .collect()
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("a.txt", "Hello, world!", &ChunkingConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].source, "a.txt");
    }

    #[test]
    fn test_whitespace_only_yields_nothing() {
        assert!(split_text("  \n\n \t ", 1500, 100).is_empty());
        assert!(split_text("", 1500, 100).is_empty());
    }

    #[test]
    fn test_paragraphs_merge_under_limit() {
        let text = "First paragraph.\n\nSecond paragraph.\n\nThird paragraph.";
        let chunks = split_text(text, 1500, 100);
        assert_eq!(chunks, vec![text.to_string()]);
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let para_a = "a".repeat(30);
        let para_b = "b".repeat(30);
        let text = format!("{}\n\n{}", para_a, para_b);
        let chunks = split_text(&text, 40, 5);
        assert_eq!(chunks, vec![para_a, para_b]);
    }

    #[test]
    fn test_falls_back_to_characters() {
        let text: String = ('a'..='y').collect();
        let chunks = split_text(&text, 10, 2);
        assert_eq!(chunks, vec!["abcdefghij", "ijklmnopqr", "qrstuvwxy"]);
        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().skip(pair[0].chars().count() - 2).collect();
            assert!(pair[1].starts_with(&tail), "{:?} does not overlap {:?}", pair[1], pair[0]);
        }
    }

    #[test]
    fn test_long_text_size_overlap_and_coverage() {
        let text = numbered_words(1200);
        assert!(text.chars().count() > 1500);
        let chunks = split_text(&text, 1500, 100);
        assert!(chunks.len() > 1);

        for c in &chunks {
            assert!(c.chars().count() <= 1500, "chunk too long: {}", c.len());
        }

        let ids: Vec<Vec<usize>> = chunks.iter().map(|c| word_ids(c)).collect();
        assert_eq!(ids.first().unwrap()[0], 0);
        assert_eq!(*ids.last().unwrap().last().unwrap(), 1199);
        for pair in ids.windows(2) {
            let prev_last = *pair[0].last().unwrap();
            let next_first = pair[1][0];
            // no gap, and the head of the next chunk repeats the tail of the previous one
            assert!(next_first <= prev_last, "gap between chunks");
            let shared: usize = pair[1]
                .iter()
                .take_while(|id| **id <= prev_last)
                .map(|id| format!(" w{}", id).len())
                .sum();
            assert!(shared >= 80, "overlap too small: {}", shared);
            assert!(shared <= 100 + 1, "overlap too large: {}", shared);
        }
    }

    #[test]
    fn test_multibyte_text_counts_chars() {
        let text = "é".repeat(3000);
        let chunks = split_text(&text, 1500, 100);
        for c in &chunks {
            assert!(c.chars().count() <= 1500);
        }
        assert!(chunks.len() >= 3);
    }

    #[test]
    fn test_chunk_indices_contiguous() {
        let text = numbered_words(2000);
        let chunks = chunk_text("doc.txt", &text, &ChunkingConfig::default());
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i, "Index mismatch at position {}", i);
            assert_eq!(c.source, "doc.txt");
        }
    }

    #[test]
    fn test_deterministic() {
        let text = numbered_words(900);
        let c1 = split_text(&text, 200, 20);
        let c2 = split_text(&text, 200, 20);
        assert_eq!(c1, c2);
    }

    #[test]
    fn test_split_keeping_separator() {
        assert_eq!(
            split_keeping_separator("a b  c", " "),
            vec!["a", " b", " ", " c"]
        );
        assert_eq!(split_keeping_separator("ab", ""), vec!["a", "b"]);
        assert_eq!(split_keeping_separator("\n\nx", "\n\n"), vec!["\n\nx"]);
    }
}
