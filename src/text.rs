//! Text normalization, tokenization, and n-gram helpers shared by feature extractors.

use std::hash::Hash;

use indexmap::IndexMap;

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_inline_whitespace<T: AsRef<str>>(text: T) -> String {
    let mut normalized = String::new();
    let mut seen_space = false;
    for ch in text.as_ref().chars() {
        if ch.is_whitespace() {
            if !seen_space {
                normalized.push(' ');
                seen_space = true;
            }
        } else {
            normalized.push(ch);
            seen_space = false;
        }
    }
    normalized.trim().to_string()
}

/// Replace newlines with spaces and collapse runs of two or more whitespace
/// characters into a single space. Leading and trailing space is kept.
pub fn normalize_whitespaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run: Vec<char> = Vec::new();
    for ch in text.chars() {
        if ch.is_whitespace() {
            run.push(ch);
        } else {
            flush_whitespace_run(&mut run, &mut out);
            out.push(ch);
        }
    }
    flush_whitespace_run(&mut run, &mut out);
    out
}

fn flush_whitespace_run(run: &mut Vec<char>, out: &mut String) {
    match run.as_slice() {
        [] => {}
        ['\n' | '\r'] => out.push(' '),
        [single] => out.push(*single),
        _ => out.push(' '),
    }
    run.clear();
}

/// Default normalization: lowercase, then [`normalize_whitespaces`].
pub fn normalize(text: &str) -> String {
    normalize_whitespaces(&text.to_lowercase())
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Split text into runs of word characters (letters, digits, underscore).
pub fn tokenize(text: &str) -> Vec<String> {
    tokenize_min_len(text, 1)
}

/// Like [`tokenize`], keeping only tokens of at least `min_len` characters.
pub fn tokenize_min_len(text: &str, min_len: usize) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    for ch in text.chars() {
        if is_word_char(ch) {
            current.push(ch);
            current_len += 1;
        } else if !current.is_empty() {
            if current_len >= min_len {
                tokens.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
            current_len = 0;
        }
    }
    if !current.is_empty() && current_len >= min_len {
        tokens.push(current);
    }
    tokens
}

/// Character n-grams of `text` for every `n` in `min_n..=max_n`, shortest first.
pub fn ngrams(text: &str, min_n: usize, max_n: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    windows(&chars, min_n, max_n)
        .into_iter()
        .map(|window| window.iter().collect())
        .collect()
}

/// Word n-grams of `tokens` joined with single spaces, shortest first.
pub fn token_ngrams<S: AsRef<str>>(tokens: &[S], min_n: usize, max_n: usize) -> Vec<String> {
    windows(tokens, min_n, max_n)
        .into_iter()
        .map(|window| {
            window
                .iter()
                .map(|token| token.as_ref())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn windows<T>(seq: &[T], min_n: usize, max_n: usize) -> Vec<&[T]> {
    let len = seq.len();
    let mut out = Vec::new();
    let min_n = min_n.max(1);
    let upper = max_n.min(len);
    for n in min_n..=upper {
        for start in 0..=(len - n) {
            out.push(&seq[start..start + n]);
        }
    }
    out
}

/// Shape signature for number-like text such as dates or phone prefixes.
///
/// When at least `ratio` of the characters are digits, digits become `X`,
/// letters become `C` and everything else is kept; otherwise the result is
/// empty.
pub fn number_pattern(text: &str, ratio: f64) -> String {
    let total = text.chars().count();
    if total == 0 {
        return String::new();
    }
    let digits = text.chars().filter(|ch| ch.is_numeric()).count();
    if (digits as f64) / (total as f64) < ratio {
        return String::new();
    }
    text.chars()
        .map(|ch| {
            if ch.is_numeric() {
                'X'
            } else if ch.is_alphabetic() {
                'C'
            } else {
                ch
            }
        })
        .collect()
}

/// Keep only entries whose probability is at least `threshold`, preserving order.
pub fn thresholded<K>(probs: &IndexMap<K, f64>, threshold: f64) -> IndexMap<K, f64>
where
    K: Clone + Eq + Hash,
{
    probs
        .iter()
        .filter(|(_, prob)| **prob >= threshold)
        .map(|(key, prob)| (key.clone(), *prob))
        .collect()
}
