//! Byte-level scanning helpers shared by the extractors.
//!
//! All helpers work on ASCII structure only, so every offset they return is a
//! valid `char` boundary of the scanned string.

#[inline]
pub(crate) fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

#[inline]
pub(crate) fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Skip a quoted literal starting at `start` (which must be `'` or `"`).
/// Returns the index just past the closing quote, or `bytes.len()` when the
/// literal is unterminated.
pub(crate) fn skip_quoted(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    match bytes[start + 1..].iter().position(|&b| b == quote) {
        Some(rel) => start + 1 + rel + 1,
        None => bytes.len(),
    }
}

/// Whether the keyword `word` starts at `pos` as a whole word.
///
/// `$` and `@` count as word characters on the left so `$return` or
/// `@let` never match.
pub(crate) fn keyword_at(bytes: &[u8], pos: usize, word: &str) -> bool {
    let w = word.as_bytes();
    if pos + w.len() > bytes.len() || &bytes[pos..pos + w.len()] != w {
        return false;
    }
    let left_ok = pos == 0 || {
        let prev = bytes[pos - 1];
        !is_ident_char(prev) && prev != b'$' && prev != b'@' && prev != b'-'
    };
    let right_ok = bytes
        .get(pos + w.len())
        .is_none_or(|&next| !is_ident_char(next) && next != b'-');
    left_ok && right_ok
}

/// Find the first unquoted `let` keyword followed by whitespace.
/// Returns `(keyword_start, declarations_start)`.
pub(crate) fn find_let(xpath: &str) -> Option<(usize, usize)> {
    let bytes = xpath.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\'' || b == b'"' {
            i = skip_quoted(bytes, i);
            continue;
        }
        if b == b'l'
            && keyword_at(bytes, i, "let")
            && bytes.get(i + 3).is_some_and(|c| c.is_ascii_whitespace())
        {
            let mut j = i + 3;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            return Some((i, j));
        }
        i += 1;
    }
    None
}

/// Find the unquoted, depth-zero `return` that closes a `let` whose
/// declarations begin at `from`.
pub(crate) fn find_closing_return(xpath: &str, from: usize) -> Option<usize> {
    let bytes = xpath.as_bytes();
    let mut in_single = false;
    let mut in_double = false;
    let mut depth: i32 = 0;

    for i in from..bytes.len() {
        match bytes[i] {
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            _ if in_single || in_double => {}
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b'r' if depth <= 0 && keyword_at(bytes, i, "return") => return Some(i),
            _ => {}
        }
    }
    None
}

/// Byte range of the first `let ... return` declaration block, from the
/// `let` keyword up to (not including) the closing `return`.
pub(crate) fn let_declaration_span(xpath: &str) -> Option<std::ops::Range<usize>> {
    let (let_start, decl_start) = find_let(xpath)?;
    let ret = find_closing_return(xpath, decl_start)?;
    Some(let_start..ret)
}
