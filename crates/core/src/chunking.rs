use crate::models::ChunkingOptions;

// Sliding window over characters; each window starts `overlap`
// characters before the previous one ended.
pub fn chunk_text(text: &str, options: &ChunkingOptions) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    let window = options.chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + window).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start = end.saturating_sub(options.overlap.min(window - 1));
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(chunk_size: usize, overlap: usize) -> ChunkingOptions {
        ChunkingOptions {
            chunk_size,
            overlap,
        }
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_text("", &options(10, 2)).is_empty());
        assert!(chunk_text("   \n\t ", &options(10, 2)).is_empty());
    }

    #[test]
    fn short_input_is_a_single_chunk() {
        let chunks = chunk_text("rice and beans", &options(100, 10));
        assert_eq!(chunks, vec!["rice and beans".to_string()]);
    }

    #[test]
    fn chunking_is_idempotent() {
        let text = "abcdefghijklmnopqrstuvwxyz".repeat(10);
        let first = chunk_text(&text, &options(40, 8));
        let second = chunk_text(&text, &options(40, 8));
        assert_eq!(first, second);
    }

    #[test]
    fn consecutive_chunks_share_exactly_the_overlap() {
        let text: String = ('a'..='z').cycle().take(200).collect();
        let overlap = 7;
        let chunks = chunk_text(&text, &options(50, overlap));
        assert!(chunks.len() > 1);

        for pair in chunks.windows(2) {
            let tail: String = pair[0]
                .chars()
                .rev()
                .take(overlap)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            let head: String = pair[1].chars().take(overlap).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn final_chunk_may_be_short_but_never_duplicated() {
        let text = "0123456789".repeat(5); // 50 chars
        let chunks = chunk_text(&text, &options(30, 5));
        // windows: [0..30), [25..50) -> exactly two
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].chars().count(), 25);
    }

    #[test]
    fn unique_coverage_reconstructs_the_input() {
        let text: String = ('a'..='z').cycle().take(123).collect();
        let overlap = 4;
        let chunks = chunk_text(&text, &options(20, overlap));

        let mut rebuilt = chunks[0].clone();
        for chunk in &chunks[1..] {
            rebuilt.extend(chunk.chars().skip(overlap));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn multibyte_text_does_not_split_characters() {
        let text = "œufs à la coque — déjeuner".repeat(4);
        let chunks = chunk_text(&text, &options(12, 3));
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 12);
        }
    }
}
