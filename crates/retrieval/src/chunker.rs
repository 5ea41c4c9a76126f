//! Recursive character text splitter.
//!
//! Splits on the coarsest separator present (paragraphs, lines, sentences,
//! words, characters), then greedily merges pieces back into chunks of at
//! most `chunk_size` characters, carrying up to `chunk_overlap` characters of
//! trailing context into the next chunk.

use std::collections::VecDeque;

const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    /// Sizes are in characters. An overlap not smaller than the chunk size is
    /// clamped to `chunk_size - 1`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into trimmed, non-empty chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        let separators: Vec<&str> = self.separators.iter().map(String::as_str).collect();
        self.split_with(text, &separators)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let no_more: &[&str] = &[];
        let (separator, remaining) = match separators
            .iter()
            .position(|s| s.is_empty() || text.contains(*s))
        {
            Some(i) => (separators[i], &separators[i + 1..]),
            None => ("", no_more),
        };

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect()
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<String> = Vec::new();

        for piece in pieces {
            if char_len(&piece) <= self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending, separator));
                pending.clear();
            }
            if remaining.is_empty() {
                chunks.push(piece.trim().to_string());
            } else {
                chunks.extend(self.split_with(&piece, remaining));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending, separator));
        }

        chunks.retain(|c| !c.is_empty());
        chunks
    }

    fn merge(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            let joiner = |current: &VecDeque<&str>| if current.is_empty() { 0 } else { sep_len };

            if total + len + joiner(&current) > self.chunk_size && !current.is_empty() {
                push_joined(&mut docs, &current, separator);
                // Keep a tail of at most `chunk_overlap` chars that still
                // leaves room for the incoming piece.
                while total > self.chunk_overlap
                    || (total > 0 && total + len + joiner(&current) > self.chunk_size)
                {
                    let Some(first) = current.pop_front() else {
                        break;
                    };
                    total -= char_len(first) + joiner(&current);
                }
            }

            total += len + joiner(&current);
            current.push_back(piece);
        }

        push_joined(&mut docs, &current, separator);
        docs
    }
}

fn push_joined(docs: &mut Vec<String>, current: &VecDeque<&str>, separator: &str) {
    let joined = current.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        let splitter = TextSplitter::new(100, 20);
        assert_eq!(splitter.split("  Cuenta de ahorros sin comisiones.  "), vec!["Cuenta de ahorros sin comisiones."]);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        let splitter = TextSplitter::new(100, 20);
        assert!(splitter.split("").is_empty());
        assert!(splitter.split("\n\n  \n").is_empty());
    }

    #[test]
    fn paragraphs_split_at_blank_lines() {
        let first = "a".repeat(30);
        let second = "b".repeat(30);
        let splitter = TextSplitter::new(40, 0);
        let chunks = splitter.split(&format!("{first}\n\n{second}"));
        assert_eq!(chunks, vec![first, second]);
    }

    #[test]
    fn chunks_respect_size_and_overlap() {
        let text = (0..40).map(|i| format!("w{i:02}")).collect::<Vec<_>>().join(" ");
        let splitter = TextSplitter::new(30, 10);
        let chunks = splitter.split(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 30, "chunk too long: {chunk:?}");
        }
        for pair in chunks.windows(2) {
            let first_word = pair[1].split(' ').next().unwrap();
            assert!(pair[0].contains(first_word), "no overlap between {pair:?}");
        }
        assert!(chunks[0].starts_with("w00"));
        assert!(chunks.last().unwrap().ends_with("w39"));
    }

    #[test]
    fn unbroken_text_falls_back_to_characters() {
        let splitter = TextSplitter::new(10, 0);
        let chunks = splitter.split(&"x".repeat(25));
        assert_eq!(chunks.iter().map(|c| c.len()).collect::<Vec<_>>(), vec![10, 10, 5]);
    }

    #[test]
    fn sizes_count_characters_not_bytes() {
        let splitter = TextSplitter::new(5, 0);
        let chunks = splitter.split("ñáéíó úüñáé");
        assert_eq!(chunks, vec!["ñáéíó", "úüñáé"]);
    }

    #[test]
    fn overlap_is_clamped() {
        let splitter = TextSplitter::new(10, 50);
        assert_eq!(splitter.chunk_overlap(), 9);
    }
}
