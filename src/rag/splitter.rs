//! Recursive-descent text splitting for ingestion.
//!
//! Text is split along a priority list of separators (paragraph break,
//! line break, sentence punctuation, space, single characters), greedily
//! packed into segments of at most `chunk_size` characters. Oversized
//! segments are re-split with the next separator; the character fallback
//! always fits, so the work list shrinks on every step. Short neighbours
//! are merged afterwards, and overlap is injected in one final pass.
//!
//! All lengths are counted in characters, not bytes.

use std::sync::OnceLock;

use regex::Regex;

/// Separators in decreasing priority. The empty string is the terminal
/// character-by-character fallback.
const SEPARATORS: [&str; 10] = ["\n\n", "\n", "。", "！", "？", ".", "!", "?", " ", ""];

#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    /// Callers must keep `chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        debug_assert!(chunk_size > 0);
        debug_assert!(chunk_overlap < chunk_size);
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        split(text, self.chunk_size, self.chunk_overlap)
    }
}

/// Split `text` into chunks of at most `chunk_size` characters (plus the
/// injected `chunk_overlap`-character prefix on every chunk after the
/// first). Pure and deterministic.
pub fn split(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let text = normalize(text);
    if text.is_empty() {
        return Vec::new();
    }

    let mut segments = Vec::new();
    let mut stack = vec![(text, 0usize)];

    while let Some((piece, sep_idx)) = stack.pop() {
        if char_len(&piece) <= chunk_size || sep_idx >= SEPARATORS.len() {
            let trimmed = piece.trim();
            if !trimmed.is_empty() {
                segments.push(trimmed.to_string());
            }
            continue;
        }

        // Oversized: pack on the current separator, re-queue each packed
        // segment for the next one. Reversed push keeps reading order.
        let parts = pack(&piece, SEPARATORS[sep_idx], chunk_size);
        for part in parts.into_iter().rev() {
            stack.push((part, sep_idx + 1));
        }
    }

    let merged = merge_short(segments, chunk_size);
    apply_overlap(merged, chunk_overlap)
}

/// Collapse runs of blank lines and spaces, trim the ends.
fn normalize(text: &str) -> String {
    static NEWLINES: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();

    let newlines = NEWLINES.get_or_init(|| Regex::new(r"\n{3,}").unwrap());
    let spaces = SPACES.get_or_init(|| Regex::new(r" {2,}").unwrap());

    let collapsed = newlines.replace_all(text, "\n\n");
    let collapsed = spaces.replace_all(&collapsed, " ");
    collapsed.trim().to_string()
}

/// Split on `sep` and greedily accumulate the pieces (each re-suffixed
/// with the separator) into buffers of at most `chunk_size` characters.
/// A piece that alone exceeds `chunk_size` becomes its own buffer and is
/// handled by the caller with the next separator.
fn pack(text: &str, sep: &str, chunk_size: usize) -> Vec<String> {
    let pieces: Vec<String> = if sep.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        text.split(sep).map(|p| format!("{}{}", p, sep)).collect()
    };

    let mut parts = Vec::new();
    let mut buf = String::new();
    let mut buf_len = 0usize;

    for piece in pieces {
        let piece_len = char_len(&piece);
        if buf_len + piece_len <= chunk_size {
            buf.push_str(&piece);
            buf_len += piece_len;
        } else {
            if !buf.trim().is_empty() {
                parts.push(std::mem::take(&mut buf));
            } else {
                buf.clear();
            }
            buf.push_str(&piece);
            buf_len = piece_len;
        }
    }

    if !buf.trim().is_empty() {
        parts.push(buf);
    }

    parts
}

/// Merge adjacent segments whose combined length is under half of
/// `chunk_size`, joining with a line break.
fn merge_short(segments: Vec<String>, chunk_size: usize) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();

    for segment in segments {
        if segment.trim().is_empty() {
            continue;
        }
        match result.last_mut() {
            Some(last) if 2 * (char_len(last) + char_len(&segment)) < chunk_size => {
                last.push('\n');
                last.push_str(&segment);
            }
            _ => result.push(segment),
        }
    }

    result
}

/// Prefix every chunk after the first with the trailing `overlap`
/// characters of its predecessor's pre-overlap text, in one pass, so
/// overlaps never compound.
fn apply_overlap(chunks: Vec<String>, overlap: usize) -> Vec<String> {
    if overlap == 0 || chunks.len() < 2 {
        return chunks;
    }

    let mut out = Vec::with_capacity(chunks.len());
    out.push(chunks[0].clone());
    for i in 1..chunks.len() {
        let tail = tail_chars(&chunks[i - 1], overlap);
        out.push(format!("{}{}", tail, chunks[i]));
    }
    out
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn tail_chars(s: &str, k: usize) -> &str {
    let len = char_len(s);
    if len <= k {
        return s;
    }
    let start = s
        .char_indices()
        .nth(len - k)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &s[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_blank_input_yield_nothing() {
        assert!(split("", 100, 10).is_empty());
        assert!(split("   \n\n  \n ", 100, 10).is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = split("just a short sentence", 100, 10);
        assert_eq!(chunks, vec!["just a short sentence".to_string()]);
    }

    #[test]
    fn normalization_collapses_whitespace() {
        let chunks = split("  a\n\n\n\n\nb   c  ", 100, 0);
        assert_eq!(chunks, vec!["a\n\nb c".to_string()]);
    }

    #[test]
    fn paragraph_scenario_with_overlap() {
        let text = "Paragraph one.\n\nParagraph two is longer than the chunk and keeps going.";
        let base = split(text, 20, 0);
        let chunks = split(text, 20, 5);

        assert!(chunks.len() >= 2);
        assert_eq!(chunks.len(), base.len());
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 25, "oversized chunk: {:?}", chunk);
        }
        for i in 1..chunks.len() {
            let tail = tail_chars(&base[i - 1], 5);
            assert!(
                chunks[i].starts_with(tail),
                "chunk {} missing overlap prefix {:?}: {:?}",
                i,
                tail,
                chunks[i]
            );
            assert_eq!(chunks[i], format!("{}{}", tail, base[i]));
        }
    }

    #[test]
    fn chunks_never_exceed_size_before_overlap() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(40);
        for size in [15, 30, 64, 200] {
            for chunk in split(&text, size, 0) {
                assert!(
                    chunk.chars().count() <= size,
                    "size {}: oversized {:?}",
                    size,
                    chunk
                );
            }
        }
    }

    #[test]
    fn reading_order_is_preserved() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let chunks = split(text, 12, 0);
        let rejoined = chunks.join(" ");
        let words: Vec<&str> = rejoined.split_whitespace().collect();
        // the original words come back in reading order (the tail may
        // additionally carry re-suffixed separator characters)
        let expected = [
            "alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta", "iota",
        ];
        assert_eq!(&words[..expected.len()], expected);
        assert!(words[expected.len()].starts_with("kappa"));
    }

    #[test]
    fn splits_on_cjk_sentence_punctuation() {
        let text = "第一句话说明问题。第二句话补充细节。第三句话给出结论。";
        let chunks = split(text, 12, 0);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 12);
        }
    }

    #[test]
    fn character_fallback_handles_unbroken_text() {
        let text = "x".repeat(95);
        let chunks = split(&text, 10, 0);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 10);
        }
        let total: usize = chunks.iter().map(|c| c.chars().count()).sum();
        assert_eq!(total, 95);
    }

    #[test]
    fn character_fallback_is_char_safe_for_multibyte() {
        let text = "宇".repeat(35);
        let chunks = split(&text, 10, 0);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 10);
        }
    }

    #[test]
    fn short_neighbours_merge_below_half_size() {
        let segments = vec!["aaa".to_string(), "bbb".to_string(), "ccc".to_string()];
        let merged = merge_short(segments, 20);
        // 3 + 3 fits under half of 20, the running 7 + 3 no longer does
        assert_eq!(merged, vec!["aaa\nbbb".to_string(), "ccc".to_string()]);

        let segments = vec!["aaaaaaaaaa".to_string(), "bbbbbbbbbb".to_string()];
        assert_eq!(merge_short(segments.clone(), 20), segments);
    }

    #[test]
    fn merged_chunks_stay_within_size() {
        let text = format!("{}. Bb. Cc.", "A".repeat(120));
        let chunks = split(&text, 100, 0);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100, "oversized: {:?}", chunk);
        }
    }

    #[test]
    fn overlap_does_not_compound_across_chunks() {
        let text = "aaaa bbbb cccc dddd eeee ffff gggg hhhh iiii jjjj kkkk llll";
        let base = split(text, 12, 0);
        let chunks = split(text, 12, 4);
        assert!(base.len() >= 3);
        for i in 1..chunks.len() {
            // prefix comes from the pre-overlap predecessor, so total
            // length is bounded by size + overlap
            assert_eq!(chunks[i], format!("{}{}", tail_chars(&base[i - 1], 4), base[i]));
            assert!(chunks[i].chars().count() <= 16);
        }
    }

    #[test]
    fn splitting_is_deterministic() {
        let text = "Repeatable input. With two sentences.\n\nAnd a second paragraph.";
        assert_eq!(split(text, 25, 5), split(text, 25, 5));
    }
}
