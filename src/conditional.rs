//! Conditional rewriter
//!
//! Compiles the `IF:/THEN:/ELSE-IF:/ELSE:` pseudo-syntax embedded in step
//! text into nested boolean-ternary expressions:
//!
//! ```text
//! IF: x > 3 THEN: small ELSE-IF: x > 10 THEN: big ELSE: none
//!   =>  bool(x > 3) ? small : bool(x > 10) ? big : none
//! ```
//!
//! The markers are literal and colon-terminated. Rewriting proceeds by
//! replacing markers with sentinel codepoints, masking quoted spans, then
//! rewriting innermost balanced-parenthesis groups first so nested
//! conditionals resolve before enclosing ones. Chains synthesize the pieces
//! the author left implicit: a run with a `THEN:` but no leading `IF:` wraps
//! its preceding fragment as the condition, a condition with no `THEN:` gets
//! `THEN: true`, and a chain with no final `ELSE:` gets `ELSE: false`.
//!
//! [`evaluate`] is a minimal evaluator for the rewriter's output grammar and
//! nothing more — the mini-language is deliberately limited to boolean
//! ternary chains.

use crate::mask;
use crate::truthy::{is_truthy, Value};

const S_IF: char = '\u{E010}';
const S_ELSE_IF: char = '\u{E011}';
const S_ELSE: char = '\u{E012}';
const S_THEN: char = '\u{E013}';

const ATOM_OPEN: char = '\u{E020}';
const ATOM_CLOSE: char = '\u{E021}';

/// Rewrite conditional markers in `text` into a ternary expression string.
/// Text without any marker is returned unchanged.
pub fn rewrite(text: &str) -> String {
    if !has_marker(text) {
        return text.to_string();
    }

    let masked = mask::mask_quotes_only(text);
    // ELSE-IF: first — it contains both ELSE: and IF: as substrings
    let mut work = masked
        .text
        .replace("ELSE-IF:", &S_ELSE_IF.to_string())
        .replace("ELSE:", &S_ELSE.to_string())
        .replace("IF:", &S_IF.to_string())
        .replace("THEN:", &S_THEN.to_string());

    // Innermost parenthesis groups first: groups holding markers are
    // rewritten and re-masked as atoms so enclosing chains see one token.
    let mut atoms: Vec<String> = Vec::new();
    while let Some((start, end)) = mask::innermost_span(work.as_bytes(), b'(', b')') {
        let inner = &work[start + 1..end];
        let content = if has_sentinel(inner) {
            format!("({})", rewrite_chain(inner))
        } else {
            format!("({})", inner)
        };
        let token = format!("{}{}{}", ATOM_OPEN, atoms.len(), ATOM_CLOSE);
        atoms.push(content);
        work.replace_range(start..end + 1, &token);
    }

    let result = if has_sentinel(&work) {
        rewrite_chain(&work)
    } else {
        work
    };
    let result = restore_atoms(result, &atoms);
    mask::restore(&result, &masked.map)
}

fn has_marker(text: &str) -> bool {
    text.contains("IF:") || text.contains("THEN:") || text.contains("ELSE:")
}

fn has_sentinel(text: &str) -> bool {
    text.chars()
        .any(|c| matches!(c, S_IF | S_ELSE_IF | S_ELSE | S_THEN))
}

fn restore_atoms(mut text: String, atoms: &[String]) -> String {
    // Atom contents may reference earlier atoms; substitute to a fixed point
    while text.contains(ATOM_OPEN) {
        let mut changed = false;
        for (id, content) in atoms.iter().enumerate() {
            let token = format!("{}{}{}", ATOM_OPEN, id, ATOM_CLOSE);
            if text.contains(&token) {
                text = text.replace(&token, content);
                changed = true;
            }
        }
        if !changed {
            return text;
        }
    }
    text
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    If,
    Else,
    Then,
    Text(String),
}

/// Rewrite one flat (paren-free) marker run into a ternary chain.
fn rewrite_chain(run: &str) -> String {
    let mut toks = tokenize(run);
    normalize(&mut toks);
    emit(&toks)
}

fn tokenize(run: &str) -> Vec<Tok> {
    let mut toks = Vec::new();
    let mut buf = String::new();
    let mut flush = |toks: &mut Vec<Tok>, buf: &mut String| {
        let text = buf.trim();
        if !text.is_empty() {
            toks.push(Tok::Text(text.to_string()));
        }
        buf.clear();
    };
    for ch in run.chars() {
        match ch {
            S_IF => {
                flush(&mut toks, &mut buf);
                toks.push(Tok::If);
            }
            S_ELSE_IF => {
                // ELSE-IF chains as ELSE followed by a fresh IF
                flush(&mut toks, &mut buf);
                toks.push(Tok::Else);
                toks.push(Tok::If);
            }
            S_ELSE => {
                flush(&mut toks, &mut buf);
                toks.push(Tok::Else);
            }
            S_THEN => {
                flush(&mut toks, &mut buf);
                toks.push(Tok::Then);
            }
            _ => buf.push(ch),
        }
    }
    flush(&mut toks, &mut buf);
    toks
}

fn normalize(toks: &mut Vec<Tok>) {
    // A run opening with `<fragment> THEN:` gets the fragment as its condition
    if toks.len() >= 2 && matches!(toks[0], Tok::Text(_)) && toks[1] == Tok::Then {
        toks.insert(0, Tok::If);
    }

    // Every condition must be followed by THEN, every THEN by a value
    let mut i = 0;
    while i < toks.len() {
        match toks[i] {
            Tok::If => {
                if matches!(toks.get(i + 1), Some(Tok::Text(_)))
                    && toks.get(i + 2) != Some(&Tok::Then)
                {
                    toks.insert(i + 2, Tok::Text("true".to_string()));
                    toks.insert(i + 2, Tok::Then);
                }
            }
            Tok::Then => {
                if !matches!(toks.get(i + 1), Some(Tok::Text(_))) {
                    toks.insert(i + 1, Tok::Text("true".to_string()));
                }
            }
            _ => {}
        }
        i += 1;
    }

    // A chain with no final ELSE evaluates its missing branch to false
    if toks.contains(&Tok::If) {
        let last_then = toks.iter().rposition(|t| *t == Tok::Then);
        let last_else = toks.iter().rposition(|t| *t == Tok::Else);
        let needs_else = match (last_then, last_else) {
            (Some(t), Some(e)) => e < t,
            (Some(_), None) => true,
            _ => false,
        };
        if needs_else {
            toks.push(Tok::Else);
            toks.push(Tok::Text("false".to_string()));
        }
    }
}

fn emit(toks: &[Tok]) -> String {
    let mut out = String::new();
    let mut i = 0;
    while i < toks.len() {
        match &toks[i] {
            Tok::If => {
                let cond = match toks.get(i + 1) {
                    Some(Tok::Text(t)) => {
                        i += 1;
                        t.as_str()
                    }
                    _ => "",
                };
                out.push_str("bool(");
                out.push_str(cond);
                out.push_str(") ? ");
                if toks.get(i + 1) == Some(&Tok::Then) {
                    i += 1;
                }
            }
            Tok::Then => out.push_str(" ? "),
            Tok::Else => out.push_str(" : "),
            Tok::Text(t) => {
                out.push_str(t);
                if matches!(toks.get(i + 1), Some(Tok::If)) {
                    out.push(' ');
                }
            }
        }
        i += 1;
    }
    out
}

/// Evaluate a rewritten ternary expression.
///
/// `resolve` maps a condition fragment to its value (`None` for absent);
/// truth is decided by [`is_truthy`]. The selected branch text is returned,
/// with nested parenthesized chains evaluated recursively. Only the
/// rewriter's output grammar is understood.
pub fn evaluate(expr: &str, resolve: &dyn Fn(&str) -> Option<String>) -> String {
    let masked = mask::mask_quotes_only(expr);
    let picked = eval_expr(&masked.text, &masked.map, resolve);
    mask::restore(&picked, &masked.map)
}

fn eval_expr(expr: &str, map: &mask::PlaceholderMap, resolve: &dyn Fn(&str) -> Option<String>) -> String {
    let t = expr.trim();
    if let Some(rest) = t.strip_prefix("bool(") {
        if let Some(close) = matching_paren(rest) {
            let cond = rest[..close].trim();
            let after = rest[close + 1..].trim_start();
            if let Some(after_q) = after.strip_prefix('?') {
                if let Some(split) = top_level_else(after_q) {
                    let then_branch = &after_q[..split];
                    let else_branch = &after_q[split + 3..];
                    let cond_text = mask::restore(cond, map);
                    let value = resolve(&cond_text);
                    return if is_truthy(Value::from(value.as_deref())) {
                        eval_expr(then_branch, map, resolve)
                    } else {
                        eval_expr(else_branch, map, resolve)
                    };
                }
            }
        }
    }
    // Atom: unwrap a single enclosing parenthesis group, else take verbatim
    if let Some(rest) = t.strip_prefix('(') {
        if let Some(close) = matching_paren(rest) {
            if close + 1 == rest.len() {
                return eval_expr(&rest[..close], map, resolve);
            }
        }
    }
    t.to_string()
}

/// Index of the `)` closing the group that the caller already entered.
fn matching_paren(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, b) in s.bytes().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    None
}

/// Byte offset of the first top-level ` : ` separator.
fn top_level_else(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i + 3 <= bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            _ => {
                if depth == 0 && &bytes[i..i + 3] == b" : " {
                    return Some(i);
                }
            }
        }
        i += 1;
    }
    None
}
