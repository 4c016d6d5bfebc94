//! Masking tokenizer
//!
//! Replaces structurally significant spans — quoted text and bracketed text —
//! with opaque placeholder tokens so surrounding text can be processed without
//! disturbing the span contents. Two passes:
//!
//! 1. Quote pass: matching non-escaped bookend pairs from `'`, `"`, backtick,
//!    plus the triple-single-quote bookend, leftmost-first, non-overlapping.
//! 2. Bracket pass (on the quote pass output): for each of `()`, `{}`, `[]`,
//!    `<>`, innermost same-type spans are replaced first, repeated across all
//!    four types until a full pass produces no change, so arbitrarily deep
//!    nesting resolves leaves-first regardless of pair-type interleaving.
//!
//! Placeholder tokens are built from Private Use Area codepoints, which are
//! assumed absent from ordinary step text. Unterminated quotes and brackets
//! are left unmasked; masking never fails.

/// Opens a placeholder token
const MASK_OPEN: char = '\u{E000}';
/// Closes a placeholder token
const MASK_CLOSE: char = '\u{E001}';

/// The four bracket pair types handled by the bracket pass
const BRACKET_PAIRS: [(u8, u8); 4] = [(b'(', b')'), (b'{', b'}'), (b'[', b']'), (b'<', b'>')];

/// Single-character quote bookends handled by the quote pass
const QUOTE_CHARS: [u8; 3] = [b'\'', b'"', b'`'];

/// What a placeholder stands for — enough to restore the original span
#[derive(Debug, Clone, PartialEq, Eq)]
enum MaskKind {
    /// A span delimited by a single quote character; restore re-escapes
    /// exactly this character inside the content.
    Quote(char),
    /// A `'''...'''` span; content is stored verbatim.
    TripleQuote,
    /// A bracketed span; content excludes the bracket pair itself.
    Bracket(char, char),
}

/// Placeholder id → original span content, with monotonically numbered keys
/// unique to one masking pass.
#[derive(Debug, Default)]
pub struct PlaceholderMap {
    entries: Vec<(MaskKind, String)>,
}

impl PlaceholderMap {
    fn insert(&mut self, kind: MaskKind, content: String) -> String {
        let id = self.entries.len();
        self.entries.push((kind, content));
        format!("{}{}{}", MASK_OPEN, id, MASK_CLOSE)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of a masking pass: the masked text plus its placeholder map
#[derive(Debug)]
pub struct Masked {
    pub text: String,
    pub map: PlaceholderMap,
}

/// Mask quoted and bracketed spans in `text`.
pub fn mask(text: &str) -> Masked {
    let mut map = PlaceholderMap::default();
    let quoted = mask_quotes(text, &mut map);
    let masked = mask_brackets(quoted, &mut map);
    Masked { text: masked, map }
}

/// Mask only quoted spans (used by callers that must keep brackets visible,
/// such as the conditional rewriter's parenthesis grouping).
pub fn mask_quotes_only(text: &str) -> Masked {
    let mut map = PlaceholderMap::default();
    let text = mask_quotes(text, &mut map);
    Masked { text, map }
}

/// True if `text` still contains a placeholder token.
pub fn has_placeholder(text: &str) -> bool {
    text.contains(MASK_OPEN)
}

/// Restore all placeholders in `text`, re-wrapping each with its original
/// bookend or bracket pair. Substitution repeats until no placeholder
/// remains, which unwinds placeholders nested across passes.
pub fn restore(text: &str, map: &PlaceholderMap) -> String {
    let mut current = text.to_string();
    loop {
        let (next, replaced) = restore_once(&current, map);
        current = next;
        if !replaced {
            return current;
        }
    }
}

fn restore_once(text: &str, map: &PlaceholderMap) -> (String, bool) {
    let mut out = String::with_capacity(text.len());
    let mut replaced = false;
    let mut rest = text;
    while let Some(start) = rest.find(MASK_OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + MASK_OPEN.len_utf8()..];
        match after_open.find(MASK_CLOSE) {
            Some(id_end) => {
                let id: usize = match after_open[..id_end].parse() {
                    Ok(id) => id,
                    Err(_) => {
                        // Not one of ours; copy the sentinel through verbatim
                        out.push(MASK_OPEN);
                        rest = after_open;
                        continue;
                    }
                };
                if let Some((kind, content)) = map.entries.get(id) {
                    out.push_str(&rewrap(kind, content));
                    replaced = true;
                } else {
                    out.push(MASK_OPEN);
                    out.push_str(&after_open[..id_end]);
                    out.push(MASK_CLOSE);
                }
                rest = &after_open[id_end + MASK_CLOSE.len_utf8()..];
            }
            None => {
                out.push(MASK_OPEN);
                rest = after_open;
            }
        }
    }
    out.push_str(rest);
    (out, replaced)
}

fn rewrap(kind: &MaskKind, content: &str) -> String {
    match kind {
        MaskKind::Quote(q) => {
            let escaped = content.replace(*q, &format!("\\{}", q));
            format!("{}{}{}", q, escaped, q)
        }
        MaskKind::TripleQuote => format!("'''{}'''", content),
        MaskKind::Bracket(open, close) => format!("{}{}{}", open, content, close),
    }
}

/// Quote pass. The triple-single-quote bookend is tried before the single
/// quote at the same position so `'''x'''` is not read as `''` + `'x'` + `''`.
fn mask_quotes(text: &str, map: &mut PlaceholderMap) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i..].starts_with(b"'''") && !is_escaped(bytes, i) {
            if let Some(end) = find_sequence(bytes, i + 3, b"'''") {
                let inner = text[i + 3..end].to_string();
                out.push_str(&map.insert(MaskKind::TripleQuote, inner));
                i = end + 3;
                continue;
            }
        }
        let b = bytes[i];
        if QUOTE_CHARS.contains(&b) && !is_escaped(bytes, i) {
            if let Some(end) = find_unescaped(bytes, i + 1, b) {
                let inner = unescape(&text[i + 1..end], b as char);
                out.push_str(&map.insert(MaskKind::Quote(b as char), inner));
                i = end + 1;
                continue;
            }
            // Unterminated — leave the bookend in place
        }
        let ch_len = char_len(bytes[i]);
        out.push_str(&text[i..i + ch_len]);
        i += ch_len;
    }
    out
}

/// Bracket pass: innermost same-type spans first, per type, looped across all
/// types to a fixed point.
fn mask_brackets(text: String, map: &mut PlaceholderMap) -> String {
    let mut current = text;
    loop {
        let mut changed = false;
        for &(open, close) in &BRACKET_PAIRS {
            while let Some((start, end)) = innermost_span(current.as_bytes(), open, close) {
                let inner = current[start + 1..end].to_string();
                let token = map.insert(MaskKind::Bracket(open as char, close as char), inner);
                current.replace_range(start..end + 1, &token);
                changed = true;
            }
        }
        if !changed {
            return current;
        }
    }
}

/// Find the first close bracket that has an open bracket before it and return
/// the byte offsets of that (open, close) pair. The enclosed span contains no
/// same-type bracket, so it is innermost.
pub(crate) fn innermost_span(bytes: &[u8], open: u8, close: u8) -> Option<(usize, usize)> {
    let mut last_open: Option<usize> = None;
    for (i, &b) in bytes.iter().enumerate() {
        if b == open {
            last_open = Some(i);
        } else if b == close {
            if let Some(start) = last_open {
                return Some((start, i));
            }
            // Stray close with no matching open — keep scanning
        }
    }
    None
}

/// Find the next occurrence of `target` at or after `from` that is not
/// preceded by an odd number of backslashes.
fn find_unescaped(bytes: &[u8], from: usize, target: u8) -> Option<usize> {
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == target && !is_escaped(bytes, i) {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Find the next occurrence of a byte sequence whose first byte is unescaped.
fn find_sequence(bytes: &[u8], from: usize, seq: &[u8]) -> Option<usize> {
    let mut i = from;
    while i + seq.len() <= bytes.len() {
        if &bytes[i..i + seq.len()] == seq && !is_escaped(bytes, i) {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn is_escaped(bytes: &[u8], pos: usize) -> bool {
    let mut backslashes = 0;
    let mut i = pos;
    while i > 0 && bytes[i - 1] == b'\\' {
        backslashes += 1;
        i -= 1;
    }
    backslashes % 2 == 1
}

/// Un-escape the single bookend character inside a matched span.
fn unescape(content: &str, quote: char) -> String {
    content.replace(&format!("\\{}", quote), &quote.to_string())
}

/// Length in bytes of the UTF-8 character starting with `leading`.
fn char_len(leading: u8) -> usize {
    match leading {
        b if b < 0x80 => 1,
        b if b >= 0xF0 => 4,
        b if b >= 0xE0 => 3,
        _ => 2,
    }
}
