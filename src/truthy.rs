//! Truthiness evaluator
//!
//! Decides boolean truth for condition values resolved from step text. The
//! rules are string-first and deliberately asymmetric — step text supplies
//! strings, not a type system — and their precedence is fixed:
//!
//! 1. null/absent → false
//! 2. boolean → itself
//! 3. a non-text collection → true unless empty
//! 4. otherwise the string rules in [`is_truthy_str`]

/// A condition value as resolved by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    /// Absent / null
    Null,
    /// An actual boolean
    Bool(bool),
    /// Step-text string
    Text(&'a str),
    /// A collection exposing an emptiness check
    Items(&'a [String]),
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(s: &'a str) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value<'_> {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<'a> From<Option<&'a str>> for Value<'a> {
    fn from(opt: Option<&'a str>) -> Self {
        match opt {
            Some(s) => Value::Text(s),
            None => Value::Null,
        }
    }
}

impl<'a> From<&'a [String]> for Value<'a> {
    fn from(items: &'a [String]) -> Self {
        Value::Items(items)
    }
}

/// Evaluate a resolved value for truth.
pub fn is_truthy(value: Value<'_>) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Items(items) => !items.is_empty(),
        Value::Text(s) => is_truthy_str(s),
    }
}

/// String truthiness, applied in order:
///
/// - empty or whitespace-only → false
/// - only digits/`.`/`,`/brackets and numerically or structurally empty
///   (`"0"`, `"0.0"`, `"[]"`, `"()"`) → false
/// - a `$`-prefixed, double-braced placeholder-looking token (`${{name}}`)
///   → false: it is an unresolved substitution, not a value
/// - `null`, `false`, or `no` after stripping non-letters, case-insensitive
///   → false
/// - anything else → true
pub fn is_truthy_str(s: &str) -> bool {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return false;
    }

    if trimmed.chars().all(is_numeric_shape) {
        // Truthy only if some nonzero digit is present
        return trimmed.chars().any(|c| c.is_ascii_digit() && c != '0');
    }

    if trimmed.starts_with("${{") && trimmed.ends_with("}}") {
        return false;
    }

    let letters: String = trimmed
        .chars()
        .filter(|c| c.is_alphabetic())
        .collect::<String>()
        .to_lowercase();
    if matches!(letters.as_str(), "null" | "false" | "no") {
        return false;
    }

    true
}

fn is_numeric_shape(c: char) -> bool {
    c.is_ascii_digit()
        || matches!(c, '.' | ',')
        || matches!(c, '[' | ']' | '(' | ')' | '{' | '}' | '<' | '>')
        || c.is_whitespace()
}
