//! Page-to-chunk splitting (spec §4.4). Each page's content is split into
//! chunks of at most `target_size` characters with `overlap` characters of
//! repeated context between consecutive chunks. A split point is chosen by
//! walking backward from `target_size` and preferring, in order, a
//! paragraph break, a sentence end, plain whitespace, and finally a hard
//! character cut when none of the softer boundaries appear in range.

const BOUNDARY_SEARCH_WINDOW: usize = 200;

pub fn split_into_chunks(text: &str, target_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    if chars.len() <= target_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let ideal_end = (start + target_size).min(chars.len());
        let end = if ideal_end == chars.len() {
            ideal_end
        } else {
            find_boundary(&chars, start, ideal_end)
        };

        chunks.push(chars[start..end].iter().collect());

        if end == chars.len() {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

fn find_boundary(chars: &[char], start: usize, ideal_end: usize) -> usize {
    let window_start = ideal_end.saturating_sub(BOUNDARY_SEARCH_WINDOW).max(start + 1);

    if let Some(pos) = rfind_pattern(chars, window_start, ideal_end, &['\n', '\n']) {
        return pos;
    }
    if let Some(pos) = rfind_sentence_end(chars, window_start, ideal_end) {
        return pos;
    }
    if let Some(pos) = rfind_whitespace(chars, window_start, ideal_end) {
        return pos;
    }
    ideal_end
}

fn rfind_pattern(chars: &[char], window_start: usize, ideal_end: usize, pattern: &[char]) -> Option<usize> {
    let plen = pattern.len();
    if ideal_end < window_start + plen {
        return None;
    }
    for i in (window_start..=ideal_end - plen).rev() {
        if chars[i..i + plen] == *pattern {
            return Some(i + plen);
        }
    }
    None
}

fn rfind_sentence_end(chars: &[char], window_start: usize, ideal_end: usize) -> Option<usize> {
    for i in (window_start..ideal_end).rev() {
        if matches!(chars[i], '.' | '!' | '?') {
            let next_is_boundary = chars.get(i + 1).map(|c| c.is_whitespace()).unwrap_or(true);
            if next_is_boundary {
                return Some(i + 1);
            }
        }
    }
    None
}

fn rfind_whitespace(chars: &[char], window_start: usize, ideal_end: usize) -> Option<usize> {
    (window_start..ideal_end).rev().find(|&i| chars[i].is_whitespace()).map(|i| i + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = split_into_chunks("hello world", 100, 10);
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn prefers_sentence_boundary_over_hard_cut() {
        let text = format!("{}. {}", "a".repeat(50), "b".repeat(60));
        let chunks = split_into_chunks(&text, 55, 5);
        assert!(chunks[0].ends_with('.'));
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let text = "word ".repeat(100);
        let chunks = split_into_chunks(&text, 80, 20);
        assert!(chunks.len() > 1);
    }

    #[test]
    fn empty_text_produces_no_chunks() {
        assert!(split_into_chunks("", 100, 10).is_empty());
    }
}
