//! Word extraction for click-to-lookup in assistant messages

use std::sync::LazyLock;

use regex::Regex;

static PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| {
    // static pattern, always valid
    Regex::new(r"[.,!?;:()]").unwrap()
});

/// Stripped tokens this short are rendered as plain text
const MIN_LOOKUP_CHARS: usize = 3;

/// One token of an assistant message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageToken {
    /// Token as displayed, punctuation included
    pub display: String,
    /// Dictionary key, `None` when the token is not clickable
    pub lookup: Option<String>,
}

/// Normalize a clicked token into a dictionary key
pub fn lookup_key(token: &str) -> Option<String> {
    let stripped = PUNCTUATION.replace_all(token, "");
    let key = stripped.trim().to_lowercase();
    (!key.is_empty()).then_some(key)
}

/// Split message content into tokens, marking the clickable ones
pub fn tokenize(content: &str) -> Vec<MessageToken> {
    content
        .split(' ')
        .map(|word| {
            let stripped = PUNCTUATION.replace_all(word, "");
            let lookup = if stripped.chars().count() < MIN_LOOKUP_CHARS {
                None
            } else {
                lookup_key(word)
            };
            MessageToken {
                display: word.to_string(),
                lookup,
            }
        })
        .collect()
}

/// Dictionary keys of every clickable word, in message order
pub fn clickable_words(content: &str) -> Vec<String> {
    tokenize(content)
        .into_iter()
        .filter_map(|token| token.lookup)
        .collect()
}
