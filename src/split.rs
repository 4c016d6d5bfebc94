//! Delimiter splitter
//!
//! Splits step text on delimiter characters into ordered phrases, each
//! carrying the delimiter that terminated it. The text is masked first (see
//! [`crate::mask`]) so delimiters inside quoted or bracketed spans never
//! cause a split; each phrase is unmasked on output.

use crate::error::StepError;
use crate::mask;

/// Default delimiter set: comma, semicolon, colon, period.
pub const DEFAULT_DELIMITERS: [char; 4] = [',', ';', ':', '.'];

/// An unmasked text segment plus the delimiter that terminated it.
/// The final phrase of a split carries `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phrase {
    pub text: String,
    pub delimiter: Option<char>,
}

impl Phrase {
    fn new(text: String, delimiter: Option<char>) -> Self {
        Self { text, delimiter }
    }
}

/// Split `text` on the default delimiter set.
pub fn split(text: &str) -> Vec<Phrase> {
    // The default set is non-empty, so this cannot fail
    split_with(text, &DEFAULT_DELIMITERS).expect("default delimiter set is non-empty")
}

/// Split `text` on a caller-supplied delimiter set.
///
/// An empty set is a configuration error: it would silently produce a single
/// phrase and hide the caller's mistake.
pub fn split_with(text: &str, delimiters: &[char]) -> Result<Vec<Phrase>, StepError> {
    if delimiters.is_empty() {
        return Err(StepError::configuration("delimiter set must not be empty"));
    }

    let masked = mask::mask(text);
    let mut phrases = Vec::new();
    let mut current = String::new();

    for ch in masked.text.chars() {
        if delimiters.contains(&ch) {
            let restored = mask::restore(&current, &masked.map);
            phrases.push(Phrase::new(restored, Some(ch)));
            current.clear();
        } else {
            current.push(ch);
        }
    }

    let restored = mask::restore(&current, &masked.map);
    phrases.push(Phrase::new(restored, None));
    Ok(phrases)
}
