//! Placeholder expansion
//!
//! `?` quotes and escapes its argument, `?d` renders it in numeric mode and
//! `?v` splices it verbatim. Each placeholder consumes one argument; once
//! the arguments run out the remaining placeholders are left as they are.

use crate::escape::{push_bytes, push_escaped_for, push_literal, Dialect};
use crate::value::Value;

/// How a placeholder renders its argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// `?`: strings quoted and escaped
    Quoted,
    /// `?d`: strings escaped in numeric mode, never quoted
    Numeric,
    /// `?v`: spliced in as is
    Verbatim,
}

/// Literal quoting used while rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    /// Quote wrapping string literals, `"` or `'`
    pub quote: u8,
    /// Prefix written before a quoted literal, e.g. `E` for PostgreSQL
    /// escape strings
    pub prefix: &'static str,
    /// Quote wrapping identifiers, if the dialect uses one
    pub ident_quote: Option<u8>,
    /// Escape and byte-literal syntax
    pub dialect: Dialect,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            quote: crate::settings::get().quote_byte(),
            prefix: "",
            ident_quote: None,
            dialect: Dialect::MySql,
        }
    }
}

const UNDEFINED: &str = "undefined";

/// Expand `template` against `args`, appending the result to `out`.
pub(crate) fn expand(out: &mut String, template: &str, args: &[Value], style: &Style) {
    let bytes = template.as_bytes();
    let mut args = args.iter();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'?' {
            i += 1;
            continue;
        }
        let (mode, width) = match bytes.get(i + 1) {
            Some(b'd') => (Mode::Numeric, 2),
            Some(b'v') => (Mode::Verbatim, 2),
            _ => (Mode::Quoted, 1),
        };
        if let Some(arg) = args.next() {
            out.push_str(&template[start..i]);
            render(out, arg, mode, style);
            start = i + width;
        }
        i += width;
    }
    out.push_str(&template[start..]);
}

/// Expand into a fresh string.
pub(crate) fn expand_to_string(template: &str, args: &[Value], style: &Style) -> String {
    let mut out = String::with_capacity(template.len() + 16 * args.len());
    expand(&mut out, template, args, style);
    out
}

/// Render a single argument.
pub(crate) fn render(out: &mut String, value: &Value, mode: Mode, style: &Style) {
    match value {
        Value::Null => out.push_str("NULL"),
        Value::List(items) => render_list(out, items, mode, style),
        Value::F32(v) if !v.is_finite() => out.push_str(UNDEFINED),
        Value::F64(v) if !v.is_finite() => out.push_str(UNDEFINED),
        v if v.is_numeric() => {
            if let Some(text) = v.to_text() {
                out.push_str(&text);
            }
        }
        Value::Bool(v) => out.push_str(if *v { "true" } else { "false" }),
        Value::String(s) => render_text(out, s, mode, style.quote, style),
        Value::Bytes(b) => match std::str::from_utf8(b) {
            Ok(text) => render_text(out, text, mode, b'\'', style),
            // Binary data cannot pass through a text literal unchanged.
            Err(_) => push_bytes(out, b, style.dialect),
        },
        other => match other.to_text() {
            Some(text) => render_text(out, &text, mode, style.quote, style),
            None => out.push_str(UNDEFINED),
        },
    }
}

fn render_text(out: &mut String, text: &str, mode: Mode, quote: u8, style: &Style) {
    match mode {
        Mode::Quoted => push_literal(out, text, quote, style.prefix, style.dialect),
        Mode::Numeric => push_escaped_for(out, text, true, style.dialect),
        Mode::Verbatim => out.push_str(text),
    }
}

fn render_list(out: &mut String, items: &[Value], mode: Mode, style: &Style) {
    // An empty list still has to parse inside `IN (...)`.
    if items.is_empty() {
        out.push_str("NULL");
        return;
    }
    for (n, item) in items.iter().enumerate() {
        if n > 0 {
            out.push(',');
        }
        match item {
            Value::List(_) => out.push_str(UNDEFINED),
            item => render(out, item, mode, style),
        }
    }
}
