use std::collections::BTreeSet;

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Lowercase, strip accents, turn punctuation into spaces, collapse whitespace.
pub fn normalize_name(input: &str) -> String {
    let folded = input
        .trim()
        .to_lowercase()
        .nfd()
        .filter(|character| !is_combining_mark(*character))
        .map(|character| {
            if character.is_ascii_alphanumeric() || character.is_whitespace() {
                character
            } else {
                ' '
            }
        })
        .collect::<String>();

    folded.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Words of an already normalized name longer than `min_token_len` characters.
pub fn name_tokens(normalized: &str, min_token_len: usize) -> BTreeSet<String> {
    normalized
        .split_whitespace()
        .filter(|token| token.chars().count() > min_token_len)
        .map(ToOwned::to_owned)
        .collect()
}
