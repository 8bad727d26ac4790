//! Literal escaping for inlined SQL values
//!
//! Every string that ends up inside a quoted literal goes through
//! [`push_escaped`]. Both quote characters are always escaped, so the
//! result is safe whichever of `"` or `'` wraps it.

/// Quote characters accepted for string literals.
pub const VALID_QUOTES: [u8; 2] = [b'"', b'\''];

/// Whether `quote` may be used to wrap string literals.
pub fn is_valid_quote(quote: u8) -> bool {
    VALID_QUOTES.contains(&quote)
}

/// Backslash-escape syntax of the target server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// MySQL string literals; byte strings as `X'..'`
    #[default]
    MySql,
    /// PostgreSQL `E'..'` strings; byte strings through `decode(.., 'hex')`.
    ///
    /// PostgreSQL text cannot hold NUL: a `\0` escape is rejected by the
    /// server, so NUL characters are unsupported there.
    Postgres,
}

/// Append `s` to `out` with backslash escapes.
///
/// In numeric mode every ASCII letter is replaced by `0`, which defuses
/// text smuggled into a placeholder that was meant to hold a number.
pub fn push_escaped(out: &mut String, s: &str, numeric: bool) {
    push_escaped_for(out, s, numeric, Dialect::MySql);
}

/// [`push_escaped`] with the escapes of `dialect`.
pub fn push_escaped_for(out: &mut String, s: &str, numeric: bool, dialect: Dialect) {
    out.reserve(s.len());
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x1a' if dialect == Dialect::Postgres => out.push_str("\\x1a"),
            '\x1a' => out.push_str("\\Z"),
            '\\' => out.push_str("\\\\"),
            c if numeric && c.is_ascii_alphabetic() => out.push('0'),
            c => out.push(c),
        }
    }
}

/// Append `bytes` as a binary literal, e.g. `X'fffe'` on MySQL.
pub fn push_bytes(out: &mut String, bytes: &[u8], dialect: Dialect) {
    match dialect {
        Dialect::MySql => {
            out.push_str("X'");
            out.push_str(&hex::encode(bytes));
            out.push('\'');
        }
        Dialect::Postgres => {
            out.push_str("decode('");
            out.push_str(&hex::encode(bytes));
            out.push_str("', 'hex')");
        }
    }
}

/// Escape `s` into a new string.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    push_escaped(&mut out, s, false);
    out
}

/// Escape `s` in numeric mode.
pub fn escape_numeric(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    push_escaped(&mut out, s, true);
    out
}

/// Append `s` as a complete literal: optional prefix, quote, escaped body, quote.
pub fn push_literal(out: &mut String, s: &str, quote: u8, prefix: &str, dialect: Dialect) {
    let q = quote as char;
    out.push_str(prefix);
    out.push(q);
    push_escaped_for(out, s, false, dialect);
    out.push(q);
}

/// Wrap an identifier in `quote`, doubling any embedded quote byte.
pub fn quote_ident(name: &str, quote: Option<u8>) -> String {
    match quote {
        None => name.to_string(),
        Some(q) => {
            let q = q as char;
            let mut out = String::with_capacity(name.len() + 2);
            out.push(q);
            for c in name.chars() {
                if c == q {
                    out.push(q);
                }
                out.push(c);
            }
            out.push(q);
            out
        }
    }
}

/// Double every backslash that precedes one of `targets`.
///
/// Text that already carries JSON escapes (`\n`, `\t`, ...) keeps them
/// through a server-side unescape.
pub fn escape_payload(text: &str, targets: &[u8]) -> String {
    if targets.is_empty() {
        return text.to_string();
    }
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len() + 8);
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'\\' && bytes.get(i + 1).is_some_and(|next| targets.contains(next)) {
            out.push_str(&text[start..i]);
            out.push('\\');
            start = i;
        }
    }
    out.push_str(&text[start..]);
    out
}
