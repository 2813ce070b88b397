//! Sentence-aware, word-counted chunk splitting.
//!
//! A simplified scored-boundary approach (best boundary within a window,
//! trailing-short handling, merge-short-at-the-end) operating on word
//! counts over already-sectioned wiki text instead of character offsets
//! over raw file bytes.

const TRAILING_SHORT_SENTENCE_CHARS: usize = 50;

/// Splits `text` into sentences, keeping the terminating punctuation.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let chars: Vec<(usize, char)> = text.char_indices().collect();

    for (i, &(byte_idx, ch)) in chars.iter().enumerate() {
        if matches!(ch, '.' | '!' | '?' | '。' | '！' | '？') {
            let end = byte_idx + ch.len_utf8();
            let is_last = i + 1 == chars.len();
            let followed_by_space = chars
                .get(i + 1)
                .map(|&(_, c)| c.is_whitespace())
                .unwrap_or(true);
            if is_last || followed_by_space {
                let seg = text[start..end].trim();
                if !seg.is_empty() {
                    sentences.push(seg.to_string());
                }
                start = end;
            }
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    if sentences.is_empty() {
        sentences.push(String::new());
    }
    sentences
}

fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

/// Greedily groups sentences into word-bounded chunks with word overlap
/// carried from the tail of the previous chunk into the head of the next.
///
/// Edge cases (matching the boundary rules this generalizes):
/// - A chunk's trailing sentence shorter than 50 chars is pushed back to the
///   next chunk instead of being kept, as long as the chunk already has at
///   least one other sentence.
/// - A final chunk shorter than `min_words` is merged into the previous one.
pub fn chunk_sentences(
    sentences: &[String],
    min_words: usize,
    max_words: usize,
    overlap_words: usize,
) -> Vec<String> {
    if sentences.is_empty() || (sentences.len() == 1 && sentences[0].is_empty()) {
        return Vec::new();
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_words = 0usize;
    let mut i = 0usize;

    while i < sentences.len() {
        let sentence = &sentences[i];
        let words = word_count(sentence);

        if !current.is_empty() && current_words + words > max_words && current_words >= min_words {
            push_chunk(&mut chunks, &mut current, overlap_words);
            current_words = 0;
            continue;
        }

        current.push(sentence.clone());
        current_words += words;
        i += 1;

        if current_words >= max_words {
            push_chunk(&mut chunks, &mut current, overlap_words);
            current_words = 0;
        }
    }

    if !current.is_empty() {
        // Drop a short trailing sentence rather than ship an undersized tail alone.
        if current.len() >= 2 {
            if let Some(last) = current.last() {
                if last.chars().count() < TRAILING_SHORT_SENTENCE_CHARS {
                    current.pop();
                }
            }
        }
        push_chunk(&mut chunks, &mut current, overlap_words);
    }

    merge_short_final_chunk(&mut chunks, min_words, max_words);
    chunks
}

fn push_chunk(chunks: &mut Vec<String>, current: &mut Vec<String>, overlap_words: usize) {
    if current.is_empty() {
        return;
    }
    let text = current.join(" ");
    let carry = if overlap_words > 0 {
        let words: Vec<&str> = text.split_whitespace().collect();
        let start = words.len().saturating_sub(overlap_words);
        words[start..].join(" ")
    } else {
        String::new()
    };
    chunks.push(text);
    current.clear();
    if !carry.is_empty() {
        current.push(carry);
    }
}

fn merge_short_final_chunk(chunks: &mut Vec<String>, min_words: usize, max_words: usize) {
    if chunks.len() < 2 {
        return;
    }
    let last_words = word_count(chunks.last().unwrap());
    if last_words < min_words {
        let last = chunks.pop().unwrap();
        let prev = chunks.last_mut().unwrap();
        if word_count(prev) + last_words <= max_words * 2 {
            prev.push('\n');
            prev.push_str(&last);
        } else {
            chunks.push(last);
        }
    }
}
